//! histaug - experiment result aggregation and statistical comparison
//!
//! This library loads finished experiment runs from a tracking service,
//! summarises them into an index-keyed result table, and computes the exact
//! expected AUROC deficit of each feature extractor, model or magnification
//! relative to the best one, in parallel over configuration groups.

pub mod cache;
pub mod cli;
pub mod compare;
pub mod config;
pub mod csv_output;
pub mod feature_store;
pub mod json_output;
pub mod loader;
pub mod results;
pub mod running_stats;
pub mod summary;
pub mod text_output;
pub mod tracking;
