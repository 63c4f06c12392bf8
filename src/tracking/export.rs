//! File-backed run source
//!
//! A JSON array of [`TrackedRun`]s with the configuration already unwrapped.
//! Order in the file is treated as creation order.

use super::{RunSource, TrackedRun, TrackingError};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunExport {
    path: PathBuf,
}

impl RunExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write runs to `path` in the format [`RunExport`] reads.
    pub fn save(path: impl AsRef<Path>, runs: &[TrackedRun]) -> Result<(), TrackingError> {
        let path = path.as_ref();
        let body = serde_json::to_vec_pretty(runs).map_err(|source| TrackingError::Payload {
            context: path.display().to_string(),
            source,
        })?;
        fs::write(path, body).map_err(|source| TrackingError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl RunSource for RunExport {
    fn runs(&self, _project: &str) -> Result<Vec<TrackedRun>, TrackingError> {
        let content = fs::read_to_string(&self.path).map_err(|source| TrackingError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| TrackingError::Payload {
            context: self.path.display().to_string(),
            source,
        })
    }
}
