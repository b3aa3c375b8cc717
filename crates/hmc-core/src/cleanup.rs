use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CAPTURE_FILE_NAME: &str = "output.txt";
pub const RNG_CHECKPOINT_FILE_NAME: &str = "ckpoint_rng.1";
pub const LAT_CHECKPOINT_FILE_NAME: &str = "ckpoint_lat.1";

/// Files a single simulation run leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub capture: PathBuf,
    pub checkpoint_rng: PathBuf,
    pub checkpoint_lat: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            capture: dir.join(CAPTURE_FILE_NAME),
            checkpoint_rng: dir.join(RNG_CHECKPOINT_FILE_NAME),
            checkpoint_lat: dir.join(LAT_CHECKPOINT_FILE_NAME),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalStatus {
    Removed,
    AlreadyAbsent,
    Retained,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRemoval {
    pub path: String,
    pub status: RemovalStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupOutcome {
    pub removals: Vec<ArtifactRemoval>,
}

impl CleanupOutcome {
    pub fn has_failures(&self) -> bool {
        self.removals
            .iter()
            .any(|removal| matches!(removal.status, RemovalStatus::Failed(_)))
    }
}

/// Removes the checkpoint files unconditionally and the capture file only
/// after a passing run, so a failed run's output stays on disk for
/// inspection. Removal is best-effort and never fails the caller.
pub fn cleanup_artifacts(paths: &ArtifactPaths, passed: bool) -> CleanupOutcome {
    let capture = if passed {
        remove_artifact(&paths.capture)
    } else {
        debug!(path = %paths.capture.display(), "retaining capture file of failed run");
        ArtifactRemoval {
            path: normalize_path(&paths.capture),
            status: RemovalStatus::Retained,
        }
    };

    CleanupOutcome {
        removals: vec![
            capture,
            remove_artifact(&paths.checkpoint_rng),
            remove_artifact(&paths.checkpoint_lat),
        ],
    }
}

fn remove_artifact(path: &Path) -> ArtifactRemoval {
    let status = match fs::remove_file(path) {
        Ok(()) => RemovalStatus::Removed,
        Err(error) if error.kind() == ErrorKind::NotFound => RemovalStatus::AlreadyAbsent,
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to remove run artifact");
            RemovalStatus::Failed(error.to_string())
        }
    };

    ArtifactRemoval {
        path: normalize_path(path),
        status,
    }
}

pub(crate) fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::{ArtifactPaths, RemovalStatus, cleanup_artifacts};
    use std::fs;
    use tempfile::TempDir;

    fn write_artifacts(paths: &ArtifactPaths) {
        for path in [&paths.capture, &paths.checkpoint_rng, &paths.checkpoint_lat] {
            fs::write(path, "artifact\n").expect("artifact should be written");
        }
    }

    #[test]
    fn passing_run_removes_all_three_files() {
        let temp = TempDir::new().expect("tempdir should be created");
        let paths = ArtifactPaths::in_dir(temp.path());
        write_artifacts(&paths);

        let outcome = cleanup_artifacts(&paths, true);
        assert!(!paths.capture.exists());
        assert!(!paths.checkpoint_rng.exists());
        assert!(!paths.checkpoint_lat.exists());
        assert!(
            outcome
                .removals
                .iter()
                .all(|removal| removal.status == RemovalStatus::Removed)
        );
    }

    #[test]
    fn failing_run_keeps_capture_file() {
        let temp = TempDir::new().expect("tempdir should be created");
        let paths = ArtifactPaths::in_dir(temp.path());
        write_artifacts(&paths);

        let outcome = cleanup_artifacts(&paths, false);
        assert!(paths.capture.exists());
        assert!(!paths.checkpoint_rng.exists());
        assert!(!paths.checkpoint_lat.exists());
        assert_eq!(outcome.removals[0].status, RemovalStatus::Retained);
    }

    #[test]
    fn missing_files_are_not_an_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let paths = ArtifactPaths::in_dir(temp.path());

        let outcome = cleanup_artifacts(&paths, true);
        assert!(!outcome.has_failures());
        assert!(
            outcome
                .removals
                .iter()
                .all(|removal| removal.status == RemovalStatus::AlreadyAbsent)
        );

        let again = cleanup_artifacts(&paths, true);
        assert_eq!(again, outcome);
    }
}
