//! JSON output format for comparison tables
//!
//! Rows carry their fixed tuple as a `{dimension: value}` object and the
//! statistics as `{value: {mean, std}}`. NaN is not representable in JSON and
//! is written as `null`.

use crate::compare::{PivotTable, StatName};
use crate::results::{DimValue, Dimension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean and standard deviation of one cell pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonStats {
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

/// One fixed-dimension tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRow {
    pub key: BTreeMap<String, DimValue>,
    /// Keyed by the varying value's display form
    pub stats: BTreeMap<String, JsonStats>,
}

/// Root JSON output structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    pub format: String,
    pub fixed: Vec<Dimension>,
    pub vary: Dimension,
    pub rows: Vec<JsonRow>,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

impl JsonOutput {
    pub fn from_table(table: &PivotTable) -> Self {
        let rows = table
            .rows
            .iter()
            .map(|row| {
                let key = table
                    .fixed
                    .iter()
                    .zip(&row.key)
                    .map(|(dim, value)| (dim.name().to_string(), value.clone()))
                    .collect();

                let mut stats: BTreeMap<String, JsonStats> = BTreeMap::new();
                for (column, &cell) in table.columns.iter().zip(&row.cells) {
                    let entry = stats
                        .entry(column.value.to_string())
                        .or_insert(JsonStats {
                            mean: None,
                            std: None,
                        });
                    match column.stat {
                        StatName::Mean => entry.mean = finite(cell),
                        StatName::Std => entry.std = finite(cell),
                    }
                }

                JsonRow { key, stats }
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "histaug-deficits-v1".to_string(),
            fixed: table.fixed.clone(),
            vary: table.vary,
            rows,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
