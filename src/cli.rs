//! CLI argument parsing for histaug

use crate::compare::Preset;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for comparison tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned `mean ± std` table
    Text,
    /// CSV format for spreadsheet analysis
    Csv,
    /// JSON format for machine parsing
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Which dimension to compare within its fixed groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompareArg {
    FeatureExtractor,
    Model,
    Magnification,
}

impl From<CompareArg> for Preset {
    fn from(arg: CompareArg) -> Self {
        match arg {
            CompareArg::FeatureExtractor => Preset::FeatureExtractor,
            CompareArg::Model => Preset::Model,
            CompareArg::Magnification => Preset::Magnification,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "histaug")]
#[command(version)]
#[command(
    about = "Aggregate experiment runs and compare feature extractors, models and magnifications",
    long_about = None
)]
pub struct Cli {
    /// TOML settings file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tracking project to load runs from
    #[arg(long = "project")]
    pub project: Option<String>,

    /// Tracking entity (user or team)
    #[arg(long = "entity")]
    pub entity: Option<String>,

    /// Directory holding memoised tables
    #[arg(long = "cache-dir", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Worker threads for building comparison tables
    #[arg(short = 'j', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Read runs from a JSON export instead of the tracking service
    #[arg(long = "runs-file", value_name = "FILE")]
    pub runs_file: Option<PathBuf>,

    /// Recompute and overwrite cached tables
    #[arg(long = "refresh")]
    pub refresh: bool,

    /// Comparison to build (repeatable; default: feature-extractor and model)
    #[arg(long = "compare", value_enum, value_name = "DIMENSION")]
    pub compare: Vec<CompareArg>,

    /// Print each table to stdout in this format
    #[arg(long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Write each table to `<DIR>/<cache key>.<ext>`
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Show progress bars
    #[arg(long = "progress")]
    pub progress: bool,

    /// Enable debug tracing output
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Requested comparisons, or the defaults when none were given.
    pub fn presets(&self) -> Vec<Preset> {
        if self.compare.is_empty() {
            Preset::DEFAULTS.to_vec()
        } else {
            self.compare.iter().copied().map(Preset::from).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["histaug"]);
        assert!(cli.config.is_none());
        assert!(cli.runs_file.is_none());
        assert!(cli.format.is_none());
        assert!(cli.output_dir.is_none());
        assert!(!cli.refresh);
        assert!(!cli.debug);
        assert_eq!(cli.presets(), Preset::DEFAULTS.to_vec());
    }

    #[test]
    fn test_cli_repeated_compare() {
        let cli = Cli::parse_from([
            "histaug",
            "--compare",
            "magnification",
            "--compare",
            "model",
        ]);
        assert_eq!(cli.presets(), vec![Preset::Magnification, Preset::Model]);
    }

    #[test]
    fn test_cli_workers_and_format() {
        let cli = Cli::parse_from(["histaug", "-j", "4", "--format", "csv"]);
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.format, Some(OutputFormat::Csv));
    }

    #[test]
    fn test_cli_offline_source() {
        let cli = Cli::parse_from([
            "histaug",
            "--runs-file",
            "runs.json",
            "--cache-dir",
            "/tmp/histaug",
            "--refresh",
        ]);
        assert_eq!(cli.runs_file, Some(PathBuf::from("runs.json")));
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/histaug")));
        assert!(cli.refresh);
    }

    #[test]
    fn test_cli_rejects_unknown_comparison() {
        assert!(Cli::try_parse_from(["histaug", "--compare", "seed"]).is_err());
    }

    #[test]
    fn test_output_extensions() {
        assert_eq!(OutputFormat::Text.extension(), "txt");
        assert_eq!(OutputFormat::Csv.extension(), "csv");
        assert_eq!(OutputFormat::Json.extension(), "json");
    }
}
