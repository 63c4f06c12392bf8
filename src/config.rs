// Runtime settings for loading and comparing experiment results
//
// Precedence: built-in defaults < TOML file < environment < CLI flags.
// The CLI layer is applied by the binary after `Settings::load`.

use crate::compare::DEFAULT_WORKERS;
use crate::loader::DEFAULT_PROJECT;
use crate::tracking::DEFAULT_BASE_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CACHE_DIR: &str = "HISTAUG_CACHE_DIR";
pub const ENV_WORKERS: &str = "HISTAUG_WORKERS";
pub const ENV_ENTITY: &str = "WANDB_ENTITY";
pub const ENV_BASE_URL: &str = "WANDB_BASE_URL";
pub const ENV_API_KEY: &str = "WANDB_API_KEY";

/// Settings shared by the loader, the builder and the cache
///
/// # Example
/// ```
/// use histaug::config::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.project, "histaug");
/// assert_eq!(settings.n_workers, 32);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tracking project holding the experiment runs
    pub project: String,

    /// Tracking entity (user or team); the service default when unset
    pub entity: Option<String>,

    pub base_url: String,

    /// Never read from the TOML file, only from the environment
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Root directory of memoised tables
    pub cache_dir: PathBuf,

    /// Worker threads used to build comparison tables
    pub n_workers: usize,

    /// Runs requested per page
    pub per_page: usize,

    /// History rows sampled per run
    pub history_samples: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: DEFAULT_PROJECT.to_string(),
            entity: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            cache_dir: PathBuf::from(".histaug-cache"),
            n_workers: DEFAULT_WORKERS,
            per_page: 1000,
            history_samples: 10_000,
        }
    }
}

impl Settings {
    /// Defaults, overlaid with `path` when given, then with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_toml(path)?,
            None => Self::default(),
        };
        settings.apply_env(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    /// Read a TOML settings file; absent keys keep their defaults.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read settings file: {}", path.as_ref().display())
        })?;
        toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse TOML settings: {}",
                path.as_ref().display()
            )
        })
    }

    /// Overlay variables resolved through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = var(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(workers) = var(ENV_WORKERS) {
            self.n_workers = workers
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer, got '{}'", ENV_WORKERS, workers))?;
        }
        if let Some(entity) = var(ENV_ENTITY) {
            self.entity = Some(entity);
        }
        if let Some(url) = var(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(key) = var(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.project.is_empty() {
            return Err("project must not be empty".to_string());
        }

        if self.n_workers == 0 {
            return Err(format!("n_workers must be >= 1, got {}", self.n_workers));
        }

        if self.per_page == 0 {
            return Err(format!("per_page must be >= 1, got {}", self.per_page));
        }

        if self.history_samples == 0 {
            return Err(format!(
                "history_samples must be >= 1, got {}",
                self.history_samples
            ));
        }

        Ok(())
    }
}
