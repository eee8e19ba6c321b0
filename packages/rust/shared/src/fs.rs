//! Artifact file helpers.

use std::path::Path;

use crate::error::{LlmDocsError, Result};

/// Write `content` to `path` atomically (write to a temp sibling, then rename).
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LlmDocsError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".into());
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| LlmDocsError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| LlmDocsError::io(path, e))?;

    tracing::debug!(path = %path.display(), size = content.len(), "wrote artifact");
    Ok(())
}

/// Write a pretty-printed JSON file atomically.
pub fn write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    write_atomic(path, &json)
}

/// Read and deserialize a JSON file.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| LlmDocsError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        LlmDocsError::Serialization(format!("invalid JSON in {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("llmdocs-fs-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn write_atomic_creates_parents_and_leaves_no_temp() {
        let dir = temp_dir();
        let path = dir.join("nested").join("out.md");
        write_atomic(&path, "hello").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn json_roundtrip() {
        let dir = temp_dir();
        let path = dir.join("data.json");
        write_json(&path, &vec!["a", "b"]).unwrap();
        let back: Vec<String> = read_json(&path).unwrap();
        assert_eq!(back, vec!["a", "b"]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
