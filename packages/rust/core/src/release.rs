//! Release directory bookkeeping: `VERSION` tracking and archiving of the
//! previous candidate when the upstream language version changes.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use llmdocs_shared::fs::write_atomic;
use llmdocs_shared::{LlmDocsError, Result};

const VERSION_FILE: &str = "VERSION";

/// Version recorded in `<release_dir>/VERSION`, if any.
pub fn read_version(release_dir: &Path) -> Result<Option<String>> {
    let path = release_dir.join(VERSION_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let version = content.trim();
            Ok((!version.is_empty()).then(|| version.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LlmDocsError::io(path, e)),
    }
}

/// Record `upstream` as the current version.
///
/// When a different version was recorded before, each existing file in
/// `artifacts` is first copied to `<release_dir>/<old-version>/`. Returns the
/// archive directory when something was archived.
pub fn record_version(
    release_dir: &Path,
    upstream: &str,
    artifacts: &[&Path],
) -> Result<Option<PathBuf>> {
    let current = read_version(release_dir)?;
    let mut archived = None;

    if let Some(old) = current.as_deref().filter(|old| *old != upstream) {
        if is_plain_name(old) {
            let archive_dir = release_dir.join(old);
            std::fs::create_dir_all(&archive_dir)
                .map_err(|e| LlmDocsError::io(&archive_dir, e))?;

            for artifact in artifacts.iter().filter(|p| p.exists()) {
                let Some(name) = artifact.file_name() else {
                    continue;
                };
                let target = archive_dir.join(name);
                std::fs::copy(artifact, &target).map_err(|e| LlmDocsError::io(&target, e))?;
            }

            info!(from = old, to = upstream, dir = %archive_dir.display(), "archived previous release");
            archived = Some(archive_dir);
        } else {
            warn!(version = old, "recorded version is not a plain directory name, not archiving");
        }
    }

    write_atomic(&release_dir.join(VERSION_FILE), &format!("{upstream}\n"))?;
    Ok(archived)
}

fn is_plain_name(version: &str) -> bool {
    !version.is_empty()
        && version != "."
        && version != ".."
        && !version.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("llmdocs-release-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn first_run_only_writes_version() {
        let dir = temp_dir();
        assert_eq!(read_version(&dir).unwrap(), None);

        let archived = record_version(&dir, "0.9", &[]).unwrap();
        assert!(archived.is_none());
        assert_eq!(read_version(&dir).unwrap().as_deref(), Some("0.9"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn version_change_archives_existing_artifacts() {
        let dir = temp_dir();
        std::fs::write(dir.join("VERSION"), "0.8\n").unwrap();
        let candidate = dir.join("jac-llmdocs.md");
        std::fs::write(&candidate, "# old").unwrap();
        let validation = dir.join("jac-llmdocs.validation.json");

        let archived = record_version(&dir, "0.9", &[candidate.as_path(), validation.as_path()]).unwrap();
        let archive_dir = archived.expect("archived");
        assert_eq!(archive_dir, dir.join("0.8"));
        assert_eq!(
            std::fs::read_to_string(archive_dir.join("jac-llmdocs.md")).unwrap(),
            "# old"
        );
        assert!(!archive_dir.join("jac-llmdocs.validation.json").exists());
        assert_eq!(read_version(&dir).unwrap().as_deref(), Some("0.9"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn same_version_is_a_no_op() {
        let dir = temp_dir();
        std::fs::write(dir.join("VERSION"), "0.9\n").unwrap();
        assert!(record_version(&dir, "0.9", &[]).unwrap().is_none());
        assert!(!dir.join("0.9").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn traversal_in_recorded_version_not_archived() {
        let dir = temp_dir();
        std::fs::write(dir.join("VERSION"), "../x\n").unwrap();
        assert!(record_version(&dir, "0.9", &[]).unwrap().is_none());
        assert_eq!(read_version(&dir).unwrap().as_deref(), Some("0.9"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
