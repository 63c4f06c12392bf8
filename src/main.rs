use anyhow::{Context, Result};
use clap::Parser;
use histaug::cache::{CachePolicy, DiskCache};
use histaug::cli::{Cli, OutputFormat};
use histaug::compare::{PivotTable, Preset, TableBuilder};
use histaug::config::{Settings, ENV_API_KEY};
use histaug::csv_output::CsvOutput;
use histaug::json_output::JsonOutput;
use histaug::loader::{load_results_cached, source_scope};
use histaug::results::Metric;
use histaug::text_output;
use histaug::tracking::{RunExport, RunSource, WandbClient};
use std::fs;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` forces TRACE
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults < TOML < environment < flags
fn resolve_settings(args: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(project) = &args.project {
        settings.project = project.clone();
    }
    if let Some(entity) = &args.entity {
        settings.entity = Some(entity.clone());
    }
    if let Some(dir) = &args.cache_dir {
        settings.cache_dir = dir.clone();
    }
    if let Some(workers) = args.workers {
        settings.n_workers = workers;
    }
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid settings: {}", e))?;
    Ok(settings)
}

fn open_source(args: &Cli, settings: &Settings) -> Result<Box<dyn RunSource>> {
    if let Some(path) = &args.runs_file {
        tracing::info!("Reading runs from {}", path.display());
        return Ok(Box::new(RunExport::new(path)));
    }

    let Some(api_key) = settings.api_key.clone() else {
        anyhow::bail!(
            "{} is not set. Set it to query the tracking service, or pass --runs-file.",
            ENV_API_KEY
        );
    };
    let client = WandbClient::new(&settings.base_url, api_key, settings.entity.clone())
        .context("Failed to create tracking client")?
        .with_page_size(settings.per_page)
        .with_history_samples(settings.history_samples);
    Ok(Box::new(client))
}

fn render(table: &PivotTable, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text_output::render(table)),
        OutputFormat::Csv => Ok(CsvOutput::new(table).to_csv()),
        OutputFormat::Json => JsonOutput::from_table(table).to_json(),
    }
}

fn emit(args: &Cli, preset: Preset, table: &PivotTable) -> Result<()> {
    if let Some(format) = args.format {
        print!("{}", render(table, format)?);
    }

    if let Some(dir) = &args.output_dir {
        let format = args.format.unwrap_or(OutputFormat::Csv);
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        let path = dir.join(format!("{}.{}", preset.cache_key(), format.extension()));
        fs::write(&path, render(table, format)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Wrote {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let settings = resolve_settings(&args)?;
    let policy = if args.refresh {
        CachePolicy::Refresh
    } else {
        CachePolicy::Reuse
    };
    let cache = DiskCache::new(&settings.cache_dir).with_policy(policy);
    let cache = match source_scope(
        args.runs_file.as_deref(),
        settings.entity.as_deref(),
        &settings.project,
    ) {
        Some(scope) => {
            tracing::debug!("Caching tables under scope '{}'", scope);
            cache.scoped(&scope)
        }
        None => cache,
    };

    let source = open_source(&args, &settings)?;
    let table = load_results_cached(&cache, source.as_ref(), &settings.project)?;
    tracing::info!("Loaded {} runs", table.len());

    let series = table.series(Metric::TestAuroc);
    let builder = TableBuilder::new(settings.n_workers).with_progress(args.progress);
    for preset in args.presets() {
        let pivot = builder
            .build_cached(&cache, &series, preset.fixed(), preset.vary())
            .with_context(|| format!("Failed to build the {} comparison", preset.vary()))?;
        let (rows, cols) = pivot.shape();
        tracing::info!(
            "Comparison of {}: {} groups x {} columns",
            preset.vary(),
            rows,
            cols
        );
        emit(&args, preset, &pivot)?;
    }

    Ok(())
}
