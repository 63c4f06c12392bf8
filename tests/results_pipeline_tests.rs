// End-to-end pipeline: run export -> result table -> comparison tables
//
// tests/fixtures/runs.json holds four finished runs (AttentionMIL, seeds 1-2,
// ctranspath and vit), one running run and one late duplicate of r1.

use histaug::cache::DiskCache;
use histaug::compare::{Preset, StatName, TableBuilder};
use histaug::loader::{load_results, load_results_cached, RESULTS_CACHE_KEY};
use histaug::results::{DimValue, Dimension, Metric, RunKey};
use histaug::tracking::RunExport;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture() -> RunExport {
    RunExport::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/runs.json"))
}

fn group_key() -> Vec<DimValue> {
    vec![
        "low".into(),
        "Macenko_patchwise".into(),
        "AttentionMIL".into(),
        "MSI".into(),
    ]
}

#[test]
fn test_load_filters_and_deduplicates() {
    let table = load_results(&fixture(), "histaug").unwrap();
    assert_eq!(table.len(), 4);

    let key = RunKey {
        magnification: "low".to_string(),
        target: "MSI".to_string(),
        train_dataset: "TCGA_CRC".to_string(),
        test_dataset: "CPTAC_CRC".to_string(),
        model: "AttentionMIL".to_string(),
        feature_extractor: "ctranspath".to_string(),
        augmentations: "Macenko_patchwise".to_string(),
        seed: 1,
    };
    let record = table.get(&key).unwrap();
    assert_eq!(record.metrics.run_id, "r1");
    assert_eq!(record.metrics.test_auroc, Some(0.80));
    assert_eq!(record.metrics.train_auroc, Some(0.83));
    assert_eq!(record.metrics.val_auroc, Some(0.74));

    assert!(table
        .query(&[(Dimension::FeatureExtractor, "swin".into())])
        .is_empty());
    assert_eq!(
        table.distinct(Dimension::Seed),
        vec![DimValue::Int(1), DimValue::Int(2)]
    );
}

#[test]
fn test_feature_extractor_comparison() {
    let table = load_results(&fixture(), "histaug").unwrap();
    let series = table.series(Metric::TestAuroc);
    let preset = Preset::FeatureExtractor;
    let pivot = TableBuilder::new(2)
        .build(&series, preset.fixed(), preset.vary())
        .unwrap();

    assert_eq!(pivot.shape(), (1, 4));
    for extractor in ["ctranspath", "vit"] {
        let mean = pivot
            .get(&group_key(), &extractor.into(), StatName::Mean)
            .unwrap();
        assert!((mean - 0.0375).abs() < 1e-12, "{}: {}", extractor, mean);
    }
}

#[test]
fn test_model_comparison_with_single_model() {
    let table = load_results(&fixture(), "histaug").unwrap();
    let series = table.series(Metric::TestAuroc);
    let preset = Preset::Model;
    let pivot = TableBuilder::new(1)
        .build(&series, preset.fixed(), preset.vary())
        .unwrap();

    // One group per extractor, a lone model is always the best
    assert_eq!(pivot.shape(), (2, 2));
    for row in &pivot.rows {
        assert_eq!(row.cells, vec![0.0, 0.0]);
    }
}

#[test]
fn test_cached_pipeline_skips_source() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::new(dir.path());

    let first = load_results_cached(&cache, &fixture(), "histaug").unwrap();
    assert!(cache.entry_path(RESULTS_CACHE_KEY).exists());

    // A source that cannot be read is never consulted on a hit
    let missing = RunExport::new(dir.path().join("absent.json"));
    let second = load_results_cached(&cache, &missing, "histaug").unwrap();
    assert_eq!(first, second);

    let builder = TableBuilder::new(2);
    let series = first.series(Metric::TestAuroc);
    let preset = Preset::FeatureExtractor;
    let built = builder
        .build_cached(&cache, &series, preset.fixed(), preset.vary())
        .unwrap();
    let reused = builder
        .build_cached(&cache, &series, preset.fixed(), preset.vary())
        .unwrap();
    assert_eq!(built, reused);
    assert!(cache.entry_path(&preset.cache_key()).exists());
}
