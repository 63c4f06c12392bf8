//! Run summarisation: tracked run -> [`RunRecord`]
//!
//! Every configuration field is read through an explicit path so a missing
//! or mistyped entry reports exactly where it failed, e.g.
//! `dataset.targets[0].column`. The best epoch is the one with the lowest
//! validation loss; its train/val AUROC become the run's scores.

use crate::results::{RunKey, RunMetrics, RunRecord};
use crate::tracking::{HistoryRow, TrackedRun};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Magnification recorded for runs that predate the setting
pub const DEFAULT_MAGNIFICATION: &str = "low";

/// Why a single field could not be extracted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("missing field `{path}`")]
    Missing { path: String },

    #[error("field `{path}` is not {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
    },

    #[error("history has no rows with an epoch")]
    NoEpochs,

    #[error("history never logged `{column}`")]
    MissingHistoryColumn { column: String },
}

/// Summarisation failure, tagged with the offending run
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Error summarizing run {run_id}: {source}")]
pub struct SummaryError {
    pub run_id: String,
    #[source]
    pub source: FieldError,
}

/// Strip the `_mpp0.5` resolution suffix from a dataset name.
///
/// Only the standard resolution is dropped; datasets extracted at any other
/// resolution keep their suffix and stay distinct.
///
/// ```
/// use histaug::summary::format_dataset_name;
///
/// assert_eq!(format_dataset_name("CAMELYON16_mpp0.5"), "CAMELYON16");
/// assert_eq!(format_dataset_name("CAMELYON16"), "CAMELYON16");
/// assert_eq!(format_dataset_name("CAMELYON16_mpp1"), "CAMELYON16_mpp1");
/// ```
pub fn format_dataset_name(name: &str) -> String {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    let suffix = SUFFIX.get_or_init(|| {
        Regex::new(r"_mpp0\.5").expect("resolution suffix pattern is valid")
    });
    suffix.replace_all(name, "").into_owned()
}

/// One path segment into the nested configuration
#[derive(Debug, Clone, Copy)]
enum Seg<'a> {
    Key(&'a str),
    Index(usize),
}

fn render_path(path: &[Seg<'_>]) -> String {
    let mut out = String::new();
    for seg in path {
        match seg {
            Seg::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            Seg::Index(idx) => out.push_str(&format!("[{}]", idx)),
        }
    }
    out
}

fn lookup<'v>(root: &'v Value, path: &[Seg<'_>]) -> Option<&'v Value> {
    path.iter().try_fold(root, |node, seg| match seg {
        Seg::Key(key) => node.get(*key),
        Seg::Index(idx) => node.get(*idx),
    })
}

fn require<'v>(root: &'v Value, path: &[Seg<'_>]) -> Result<&'v Value, FieldError> {
    match lookup(root, path) {
        Some(Value::Null) | None => Err(FieldError::Missing {
            path: render_path(path),
        }),
        Some(value) => Ok(value),
    }
}

fn require_str<'v>(root: &'v Value, path: &[Seg<'_>]) -> Result<&'v str, FieldError> {
    require(root, path)?
        .as_str()
        .ok_or_else(|| FieldError::WrongType {
            path: render_path(path),
            expected: "a string",
        })
}

fn require_int(root: &Value, path: &[Seg<'_>]) -> Result<i64, FieldError> {
    let value = require(root, path)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .ok_or_else(|| FieldError::WrongType {
            path: render_path(path),
            expected: "an integer",
        })
}

/// Typed view of the configuration fields the index needs
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub target_column: String,
    pub magnification: String,
    pub train_dataset: String,
    pub test_dataset: String,
    pub model: String,
    pub feature_extractor: String,
    pub augmentations: String,
    pub seed: i64,
}

impl RunConfig {
    /// Extract from a nested run configuration.
    pub fn from_value(config: &Value) -> Result<Self, FieldError> {
        use Seg::{Index, Key};

        let settings = [Key("settings")];
        require(config, &settings)?;
        let magnification = match lookup(config, &[Key("settings"), Key("magnification")]) {
            None | Some(Value::Null) => DEFAULT_MAGNIFICATION.to_string(),
            Some(_) => require_str(config, &[Key("settings"), Key("magnification")])?.to_string(),
        };

        let model_target = require_str(config, &[Key("model"), Key("_target_")])?;
        let model = model_target
            .rsplit('.')
            .next()
            .unwrap_or(model_target)
            .to_string();

        Ok(Self {
            target_column: require_str(
                config,
                &[Key("dataset"), Key("targets"), Index(0), Key("column")],
            )?
            .to_string(),
            magnification,
            train_dataset: format_dataset_name(require_str(
                config,
                &[Key("dataset"), Key("name")],
            )?),
            test_dataset: format_dataset_name(require_str(
                config,
                &[Key("test"), Key("dataset"), Key("name")],
            )?),
            model,
            feature_extractor: require_str(config, &[Key("settings"), Key("feature_extractor")])?
                .to_string(),
            augmentations: require_str(
                config,
                &[Key("dataset"), Key("augmentations"), Key("name")],
            )?
            .to_string(),
            seed: require_int(config, &[Key("seed")])?,
        })
    }
}

/// Per-epoch values, first non-null per column within the epoch
#[derive(Debug, Clone, Default, PartialEq)]
struct EpochRow {
    values: BTreeMap<String, f64>,
}

fn epoch_of(row: &HistoryRow) -> Option<i64> {
    let epoch = row.get("epoch")?;
    epoch
        .as_i64()
        .or_else(|| epoch.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Group history by epoch, ascending; rows without an epoch are ignored.
fn group_by_epoch(history: &[HistoryRow], columns: &[&str]) -> BTreeMap<i64, EpochRow> {
    let mut epochs: BTreeMap<i64, EpochRow> = BTreeMap::new();
    for row in history {
        let Some(epoch) = epoch_of(row) else {
            continue;
        };
        let entry = epochs.entry(epoch).or_default();
        for column in columns {
            if entry.values.contains_key(*column) {
                continue;
            }
            if let Some(v) = row.get(*column).and_then(Value::as_f64) {
                entry.values.insert((*column).to_string(), v);
            }
        }
    }
    epochs
}

fn logged(history: &[HistoryRow], column: &str) -> Result<(), FieldError> {
    if history.iter().any(|row| row.contains_key(column)) {
        Ok(())
    } else {
        Err(FieldError::MissingHistoryColumn {
            column: column.to_string(),
        })
    }
}

/// Summarise one tracked run into a [`RunRecord`].
pub fn summarize_run(run: &TrackedRun) -> Result<RunRecord, SummaryError> {
    summarize_fields(run).map_err(|source| SummaryError {
        run_id: run.id.clone(),
        source,
    })
}

fn summarize_fields(run: &TrackedRun) -> Result<RunRecord, FieldError> {
    let config = RunConfig::from_value(&run.config)?;
    let column = &config.target_column;

    let train_col = format!("train/{}/auroc", column);
    let val_col = format!("val/{}/auroc", column);
    let test_col = format!("test/{}/auroc", column);
    let loss_col = "val/loss";

    for required in [loss_col, train_col.as_str(), val_col.as_str()] {
        logged(&run.history, required)?;
    }

    let epochs = group_by_epoch(
        &run.history,
        &[loss_col, train_col.as_str(), val_col.as_str(), test_col.as_str()],
    );
    // Null losses sort last; ties keep the earliest epoch
    let best = epochs
        .values()
        .min_by(|a, b| {
            let la = a.values.get(loss_col).copied().unwrap_or(f64::INFINITY);
            let lb = b.values.get(loss_col).copied().unwrap_or(f64::INFINITY);
            la.total_cmp(&lb)
        })
        .ok_or(FieldError::NoEpochs)?;

    let test_auroc = match run.summary.get(&test_col) {
        Some(entry) => {
            let best_path = format!("summary.{}.best", test_col);
            match entry.get("best") {
                None => return Err(FieldError::Missing { path: best_path }),
                // Logged but never evaluated
                Some(Value::Null) => None,
                Some(best) => Some(best.as_f64().ok_or(FieldError::WrongType {
                    path: best_path,
                    expected: "a number",
                })?),
            }
        }
        None => {
            logged(&run.history, &test_col)?;
            epochs
                .values()
                .filter_map(|epoch| epoch.values.get(&test_col).copied())
                .filter(|v| !v.is_nan())
                .reduce(f64::max)
        }
    };

    Ok(RunRecord {
        key: RunKey {
            magnification: config.magnification,
            target: config.target_column.clone(),
            train_dataset: config.train_dataset,
            test_dataset: config.test_dataset,
            model: config.model,
            feature_extractor: config.feature_extractor,
            augmentations: config.augmentations,
            seed: config.seed,
        },
        metrics: RunMetrics {
            run_id: run.id.clone(),
            train_auroc: best.values.get(&train_col).copied(),
            val_auroc: best.values.get(&val_col).copied(),
            test_auroc,
            runtime: run.summary.get("_runtime").and_then(Value::as_f64),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::RunState;
    use serde_json::{json, Map};

    fn config() -> Value {
        json!({
            "seed": 2,
            "dataset": {
                "name": "TCGA_CRC_mpp0.5",
                "targets": [{"column": "MSI"}],
                "augmentations": {"name": "Macenko_patchwise"}
            },
            "test": {"dataset": {"name": "CPTAC_CRC_mpp0.5"}},
            "model": {"_target_": "histaug.train.models.AttentionMIL"},
            "settings": {"feature_extractor": "ctranspath", "magnification": "high"}
        })
    }

    fn history() -> Vec<HistoryRow> {
        let rows = vec![
            json!({"epoch": 0, "val/loss": 0.69, "train/MSI/auroc": 0.60, "val/MSI/auroc": 0.58}),
            json!({"epoch": 0, "test/MSI/auroc": 0.55}),
            json!({"epoch": 1, "val/loss": 0.41, "train/MSI/auroc": 0.81, "val/MSI/auroc": 0.77}),
            json!({"epoch": 1, "test/MSI/auroc": 0.74}),
            json!({"epoch": 2, "val/loss": 0.52, "train/MSI/auroc": 0.90, "val/MSI/auroc": 0.75}),
            json!({"epoch": 2, "test/MSI/auroc": 0.79}),
            json!({"_step": 99, "test/MSI/auroc": 0.99}),
        ];
        rows.into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn run(config: Value, history: Vec<HistoryRow>, summary: Value) -> TrackedRun {
        TrackedRun {
            id: "run-42".to_string(),
            state: RunState::Finished,
            config,
            summary: summary.as_object().cloned().unwrap_or_else(Map::new),
            history,
        }
    }

    #[test]
    fn test_format_dataset_name() {
        assert_eq!(format_dataset_name("CAMELYON16_mpp0.5"), "CAMELYON16");
        assert_eq!(format_dataset_name("TCGA_BRCA"), "TCGA_BRCA");
        assert_eq!(format_dataset_name("TCGA_BRCA_mpp1"), "TCGA_BRCA_mpp1");
        assert_eq!(format_dataset_name("TCGA_BRCA_mpp0.25"), "TCGA_BRCA_mpp0.25");
        assert_ne!(format_dataset_name("X_mpp1"), format_dataset_name("X_mpp0.5"));
    }

    #[test]
    fn test_summarize_picks_lowest_val_loss_epoch() {
        let record = summarize_run(&run(config(), history(), json!({"_runtime": 1200.0}))).unwrap();

        assert_eq!(record.key.target, "MSI");
        assert_eq!(record.key.magnification, "high");
        assert_eq!(record.key.train_dataset, "TCGA_CRC");
        assert_eq!(record.key.test_dataset, "CPTAC_CRC");
        assert_eq!(record.key.model, "AttentionMIL");
        assert_eq!(record.key.feature_extractor, "ctranspath");
        assert_eq!(record.key.augmentations, "Macenko_patchwise");
        assert_eq!(record.key.seed, 2);

        assert_eq!(record.metrics.run_id, "run-42");
        assert_eq!(record.metrics.train_auroc, Some(0.81));
        assert_eq!(record.metrics.val_auroc, Some(0.77));
        assert_eq!(record.metrics.runtime, Some(1200.0));
    }

    #[test]
    fn test_test_auroc_falls_back_to_history_max() {
        let record = summarize_run(&run(config(), history(), json!({}))).unwrap();
        // The epoch-less 0.99 row is not part of any epoch
        assert_eq!(record.metrics.test_auroc, Some(0.79));
        assert_eq!(record.metrics.runtime, None);
    }

    #[test]
    fn test_test_auroc_prefers_summary_best() {
        let summary = json!({"test/MSI/auroc": {"best": 0.72, "max": 0.99}});
        let record = summarize_run(&run(config(), history(), summary)).unwrap();
        assert_eq!(record.metrics.test_auroc, Some(0.72));
    }

    #[test]
    fn test_summary_without_best_is_an_error() {
        let summary = json!({"test/MSI/auroc": 0.72});
        let err = summarize_run(&run(config(), history(), summary)).unwrap_err();
        assert_eq!(err.run_id, "run-42");
        assert_eq!(
            err.source,
            FieldError::Missing {
                path: "summary.test/MSI/auroc.best".to_string()
            }
        );
    }

    #[test]
    fn test_null_summary_best_is_missing_score() {
        let summary = json!({"test/MSI/auroc": {"best": null}});
        let record = summarize_run(&run(config(), history(), summary)).unwrap();
        assert_eq!(record.metrics.test_auroc, None);
        assert_eq!(record.metrics.val_auroc, Some(0.77));
    }

    #[test]
    fn test_non_numeric_summary_best_is_an_error() {
        let summary = json!({"test/MSI/auroc": {"best": "n/a"}});
        let err = summarize_run(&run(config(), history(), summary)).unwrap_err();
        assert!(matches!(
            err.source,
            FieldError::WrongType { ref path, .. } if path == "summary.test/MSI/auroc.best"
        ));
    }

    #[test]
    fn test_magnification_defaults_to_low() {
        let mut cfg = config();
        cfg["settings"]
            .as_object_mut()
            .unwrap()
            .remove("magnification");
        let record = summarize_run(&run(cfg, history(), json!({}))).unwrap();
        assert_eq!(record.key.magnification, "low");
    }

    #[test]
    fn test_missing_target_column_names_path_and_run() {
        let mut cfg = config();
        cfg["dataset"]["targets"] = json!([]);
        let err = summarize_run(&run(cfg, history(), json!({}))).unwrap_err();
        assert_eq!(
            err.source,
            FieldError::Missing {
                path: "dataset.targets[0].column".to_string()
            }
        );
        assert!(err.to_string().contains("run-42"));
    }

    #[test]
    fn test_seed_must_be_integer() {
        let mut cfg = config();
        cfg["seed"] = json!("two");
        let err = summarize_run(&run(cfg, history(), json!({}))).unwrap_err();
        assert!(matches!(err.source, FieldError::WrongType { ref path, .. } if path == "seed"));
    }

    #[test]
    fn test_history_without_epochs() {
        let rows = vec![json!({"val/loss": 0.3, "train/MSI/auroc": 0.8, "val/MSI/auroc": 0.7, "test/MSI/auroc": 0.7})
            .as_object()
            .cloned()
            .unwrap()];
        let err = summarize_run(&run(config(), rows, json!({}))).unwrap_err();
        assert_eq!(err.source, FieldError::NoEpochs);
    }

    #[test]
    fn test_history_missing_val_auroc_column() {
        let rows: Vec<HistoryRow> = history()
            .into_iter()
            .map(|mut row| {
                row.remove("val/MSI/auroc");
                row
            })
            .collect();
        let err = summarize_run(&run(config(), rows, json!({}))).unwrap_err();
        assert_eq!(
            err.source,
            FieldError::MissingHistoryColumn {
                column: "val/MSI/auroc".to_string()
            }
        );
    }

    #[test]
    fn test_null_losses_sort_last() {
        let rows = vec![
            json!({"epoch": 0, "val/loss": null, "train/MSI/auroc": 0.1, "val/MSI/auroc": 0.1, "test/MSI/auroc": 0.1}),
            json!({"epoch": 1, "val/loss": 0.9, "train/MSI/auroc": 0.6, "val/MSI/auroc": 0.6, "test/MSI/auroc": 0.6}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
        let record = summarize_run(&run(config(), rows, json!({}))).unwrap();
        assert_eq!(record.metrics.train_auroc, Some(0.6));
    }
}
