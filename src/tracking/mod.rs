//! Experiment-tracking sources
//!
//! The loader only needs read access to a project's runs in creation order.
//! [`WandbClient`] talks to the tracking service over HTTP; [`RunExport`]
//! reads the same run shape from a JSON file for offline use.

mod export;
mod wandb;

pub use export::RunExport;
pub use wandb::{WandbClient, DEFAULT_BASE_URL};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while fetching runs
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("HTTP request to tracking service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tracking service returned errors: {0}")]
    GraphQl(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Tracking service repeated page cursor '{0}'")]
    RepeatedCursor(String),

    #[error("Malformed payload in {context}: {source}")]
    Payload {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read run export {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle state reported by the tracking service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Finished,
    Running,
    Crashed,
    Failed,
    Killed,
    Preempted,
    #[serde(other)]
    Unknown,
}

/// One logged history row (`epoch`, `val/loss`, `train/<col>/auroc`, ...)
pub type HistoryRow = Map<String, Value>;

/// A run as fetched from the tracking service, before summarisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRun {
    pub id: String,
    pub state: RunState,
    /// Nested run configuration (`dataset.name`, `settings.feature_extractor`, ...)
    #[serde(default)]
    pub config: Value,
    /// Final summary values (`_runtime`, `test/<col>/auroc`, ...)
    #[serde(default)]
    pub summary: Map<String, Value>,
    #[serde(default)]
    pub history: Vec<HistoryRow>,
}

impl TrackedRun {
    pub fn is_finished(&self) -> bool {
        self.state == RunState::Finished
    }
}

/// Read access to a project's run collection.
pub trait RunSource {
    /// All runs of `project`, oldest first.
    fn runs(&self, project: &str) -> Result<Vec<TrackedRun>, TrackingError>;
}
