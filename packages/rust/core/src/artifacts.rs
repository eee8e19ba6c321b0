//! Candidate and validation result persistence.
//!
//! The validation file must always describe the candidate currently on disk:
//! it is removed before a new candidate is written and rewritten right after
//! validation.

use std::path::Path;

use tracing::debug;

use llmdocs_shared::fs::{write_atomic, write_json};
use llmdocs_shared::{LlmDocsError, Result, ValidationResult};

/// Persist the candidate document.
pub fn write_candidate(path: &Path, text: &str) -> Result<()> {
    write_atomic(path, text)
}

/// Read an existing candidate. Absence is a precondition failure.
pub fn read_candidate(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(LlmDocsError::precondition(format!(
            "{} not found",
            path.display()
        )));
    }
    std::fs::read_to_string(path).map_err(|e| LlmDocsError::io(path, e))
}

pub fn write_validation(path: &Path, result: &ValidationResult) -> Result<()> {
    write_json(path, result)
}

/// Remove a validation file left over from a previous candidate.
pub fn remove_stale_validation(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale validation result");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LlmDocsError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmdocs_shared::Recommendation;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("llmdocs-artifacts-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_candidate_is_precondition() {
        let dir = temp_dir();
        let err = read_candidate(&dir.join("absent.md")).unwrap_err();
        assert!(matches!(err, LlmDocsError::Precondition(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn validation_roundtrip_and_removal() {
        let dir = temp_dir();
        let path = dir.join("release/candidate.validation.json");

        let result = ValidationResult {
            recommendation: Recommendation::Review,
            ..ValidationResult::default()
        };
        write_validation(&path, &result).unwrap();
        let stored: ValidationResult = llmdocs_shared::fs::read_json(&path).unwrap();
        assert_eq!(stored.recommendation, Recommendation::Review);

        remove_stale_validation(&path).unwrap();
        assert!(!path.exists());
        // Removing twice is fine.
        remove_stale_validation(&path).unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }
}
