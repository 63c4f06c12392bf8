// Pivoted comparison table
//
// Rows are fixed-dimension tuples, columns are (varying value, statistic)
// pairs. Both axes are sorted explicitly; a group without a statistic for a
// value gets NaN in those cells so every row has the same width.

use super::comparator::DeficitStats;
use crate::results::{DimValue, Dimension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Statistic stored in a pivot column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatName {
    Mean,
    Std,
}

impl StatName {
    pub const ALL: [StatName; 2] = [StatName::Mean, StatName::Std];

    pub fn name(&self) -> &'static str {
        match self {
            StatName::Mean => "mean",
            StatName::Std => "std",
        }
    }

    fn read(&self, stats: &DeficitStats) -> f64 {
        match self {
            StatName::Mean => stats.mean,
            StatName::Std => stats.std,
        }
    }
}

impl fmt::Display for StatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PivotColumn {
    pub value: DimValue,
    pub stat: StatName,
}

/// One fixed-dimension tuple and its cells, aligned with the table columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotRow {
    pub key: Vec<DimValue>,
    pub cells: Vec<f64>,
}

/// Cells compare bit for bit, so NaN cells equal each other.
impl PartialEq for PivotRow {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.cells.len() == other.cells.len()
            && self
                .cells
                .iter()
                .zip(&other.cells)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    pub fixed: Vec<Dimension>,
    pub vary: Dimension,
    pub columns: Vec<PivotColumn>,
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    /// Assemble from per-group comparator output in any order.
    pub fn from_groups<I>(fixed: Vec<Dimension>, vary: Dimension, groups: I) -> Self
    where
        I: IntoIterator<Item = (Vec<DimValue>, BTreeMap<DimValue, DeficitStats>)>,
    {
        let mut cells: BTreeMap<Vec<DimValue>, BTreeMap<PivotColumn, f64>> = BTreeMap::new();
        let mut values: BTreeSet<DimValue> = BTreeSet::new();

        for (combination, stats) in groups {
            let row = cells.entry(combination).or_default();
            for (value, stat_values) in stats {
                for stat in StatName::ALL {
                    row.insert(
                        PivotColumn {
                            value: value.clone(),
                            stat,
                        },
                        stat.read(&stat_values),
                    );
                }
                values.insert(value);
            }
        }

        let columns: Vec<PivotColumn> = values
            .into_iter()
            .flat_map(|value| {
                StatName::ALL.map(|stat| PivotColumn {
                    value: value.clone(),
                    stat,
                })
            })
            .collect();

        let rows = cells
            .into_iter()
            .map(|(key, row)| PivotRow {
                cells: columns
                    .iter()
                    .map(|c| row.get(c).copied().unwrap_or(f64::NAN))
                    .collect(),
                key,
            })
            .collect();

        Self {
            fixed,
            vary,
            columns,
            rows,
        }
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    /// Distinct varying values, in column order.
    pub fn values(&self) -> Vec<&DimValue> {
        let mut out: Vec<&DimValue> = self.columns.iter().map(|c| &c.value).collect();
        out.dedup();
        out
    }

    pub fn row(&self, key: &[DimValue]) -> Option<&PivotRow> {
        self.rows
            .binary_search_by(|r| r.key.as_slice().cmp(key))
            .ok()
            .map(|idx| &self.rows[idx])
    }

    /// Single cell lookup.
    pub fn get(&self, key: &[DimValue], value: &DimValue, stat: StatName) -> Option<f64> {
        let row = self.row(key)?;
        let col = self
            .columns
            .iter()
            .position(|c| &c.value == value && c.stat == stat)?;
        row.cells.get(col).copied()
    }

    /// Mean and std for one group and value.
    pub fn stats(&self, key: &[DimValue], value: &DimValue) -> Option<DeficitStats> {
        Some(DeficitStats {
            mean: self.get(key, value, StatName::Mean)?,
            std: self.get(key, value, StatName::Std)?,
        })
    }
}
