//! Exact expected deficit from the best value
//!
//! For one fixed-dimension group, every varying value (e.g. each feature
//! extractor) has one metric sample per seed. The comparator walks the full
//! Cartesian product that picks one sample per value, and for every pick
//! records `max(pick) - pick[value]` for each value. The mean and standard
//! deviation of those deficits describe how far each value sits from the
//! best, without assuming which seeds belong together.
//!
//! The walk costs `S^V` steps for S seeds and V values.

use crate::results::DimValue;
use crate::running_stats::{RunningStats, StatsSnapshot};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use thiserror::Error;

/// Mean and standard deviation of one value's deficit distribution
pub type DeficitStats = StatsSnapshot;

/// One comparator input row
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub seed: i64,
    /// Value of the varying dimension
    pub value: DimValue,
    pub metric: Option<f64>,
}

/// Comparator output for one group
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub stats: BTreeMap<DimValue, DeficitStats>,
    /// Number of enumerated combinations
    pub combinations: u64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompareError {
    #[error("seed {seed} has more than one result for '{value}'")]
    DuplicateCell { seed: i64, value: DimValue },

    #[error("number of combinations across {values} values overflows u64")]
    CombinationOverflow { values: usize },
}

/// Visit the deficit vector of every combination, last value varying fastest.
///
/// `samples[i]` holds the candidate metric values of the i-th varying value.
/// Returns the number of combinations visited, zero if any list is empty.
pub fn for_each_deficit<F>(samples: &[Vec<f64>], mut visit: F) -> u64
where
    F: FnMut(&[f64]),
{
    if samples.is_empty() || samples.iter().any(Vec::is_empty) {
        return 0;
    }

    let width = samples.len();
    let mut cursor = vec![0usize; width];
    let mut current: Vec<f64> = samples.iter().map(|s| s[0]).collect();
    let mut deficits = vec![0.0; width];
    let mut visited = 0u64;

    loop {
        let best = current.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for (deficit, x) in deficits.iter_mut().zip(&current) {
            *deficit = best - x;
        }
        visit(&deficits);
        visited += 1;

        // Odometer step
        let mut pos = width;
        loop {
            if pos == 0 {
                return visited;
            }
            pos -= 1;
            cursor[pos] += 1;
            if cursor[pos] < samples[pos].len() {
                current[pos] = samples[pos][cursor[pos]];
                break;
            }
            cursor[pos] = 0;
            current[pos] = samples[pos][0];
        }
    }
}

/// Number of combinations `for_each_deficit` would visit.
pub fn combination_count(samples: &[Vec<f64>]) -> Result<u64, CompareError> {
    if samples.is_empty() {
        return Ok(0);
    }
    samples
        .iter()
        .try_fold(1u64, |acc, s| acc.checked_mul(s.len() as u64))
        .ok_or(CompareError::CombinationOverflow {
            values: samples.len(),
        })
}

/// Expected deficit from the best value, per varying value.
///
/// Each value's samples are its non-missing metrics ordered by seed; values
/// may have different sample counts. A value without samples is excluded
/// from the enumeration and reported as [`DeficitStats::missing`].
pub fn compare_to_best(rows: &[GroupRow], show_progress: bool) -> Result<Comparison, CompareError> {
    let mut grid: BTreeMap<DimValue, BTreeMap<i64, Option<f64>>> = BTreeMap::new();
    for row in rows {
        let cells = grid.entry(row.value.clone()).or_default();
        if cells.insert(row.seed, row.metric).is_some() {
            return Err(CompareError::DuplicateCell {
                seed: row.seed,
                value: row.value.clone(),
            });
        }
    }

    let mut sampled: Vec<DimValue> = Vec::new();
    let mut samples: Vec<Vec<f64>> = Vec::new();
    let mut stats = BTreeMap::new();
    for (value, cells) in grid {
        let values: Vec<f64> = cells
            .into_values()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();
        if values.is_empty() {
            stats.insert(value, DeficitStats::missing());
        } else {
            sampled.push(value);
            samples.push(values);
        }
    }

    let total = combination_count(&samples)?;
    let progress = show_progress.then(|| {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} combinations")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb
    });

    const TICK: u64 = 4096;
    let mut accumulators = vec![RunningStats::new(); samples.len()];
    let mut since_tick = 0u64;
    let combinations = for_each_deficit(&samples, |deficits| {
        for (acc, &d) in accumulators.iter_mut().zip(deficits) {
            acc.update(d);
        }
        if let Some(pb) = &progress {
            since_tick += 1;
            if since_tick == TICK {
                pb.inc(TICK);
                since_tick = 0;
            }
        }
    });
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    for (value, acc) in sampled.into_iter().zip(&accumulators) {
        stats.insert(value, acc.compute());
    }

    Ok(Comparison {
        stats,
        combinations,
    })
}
