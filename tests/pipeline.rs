//! End-to-end pipeline tests
//!
//! Full scenarios across detection, training, serving, persistence, and
//! retraining — the contracts collaborating subsystems rely on.

use predecir::bundle::io::{load_bundle, save_bundle};
use predecir::data::RawDataset;
use predecir::predict::{InputRow, Predictor, RiskTier};
use predecir::retrain::ledger::{InMemoryBackend, UploadLedger};
use predecir::retrain::{RetrainConfig, RetrainOrchestrator, RetrainState};
use predecir::{ModelRegistry, SchemaDetector, TrainConfig, Trainer};
use std::sync::Arc;

/// 100 synthetic rows: categorical Contract, numerical tenure, ~30% positive
fn synthetic_dataset() -> RawDataset {
    let columns = vec![
        "customerID".to_string(),
        "Contract".to_string(),
        "tenure".to_string(),
        "Churn".to_string(),
    ];
    let rows = (0..100)
        .map(|i| {
            let churns = i % 10 < 3;
            vec![
                format!("C-{i:04}"),
                if churns { "Month-to-month" } else { "One year" }.to_string(),
                (i % 73).to_string(),
                if churns { "Yes" } else { "No" }.to_string(),
            ]
        })
        .collect();
    RawDataset::new(columns, rows).unwrap()
}

fn input_row(contract: &str, tenure: &str) -> InputRow {
    let mut row = InputRow::new();
    row.insert("Contract".to_string(), contract.to_string());
    row.insert("tenure".to_string(), tenure.to_string());
    row
}

#[test]
fn train_synthetic_scenario() {
    let dataset = synthetic_dataset();
    let schema = SchemaDetector::new().detect(&dataset).unwrap();
    let bundle = Trainer::new(TrainConfig::default())
        .fit(&dataset, &schema)
        .unwrap();

    assert_eq!(bundle.schema.feature_cols, vec!["Contract", "tenure"]);
    assert_eq!(
        bundle.schema.feature_cols.len(),
        bundle.schema.numerical_cols.len() + bundle.schema.categorical_cols.len()
    );
    assert!(bundle.metadata.roc_auc > 0.5);
    assert!((bundle.metadata.churn_rate - 0.3).abs() < 1e-9);
}

#[test]
fn serving_unseen_category_never_raises() {
    let dataset = synthetic_dataset();
    let schema = SchemaDetector::new().detect(&dataset).unwrap();
    let bundle = Trainer::new(TrainConfig::default())
        .fit(&dataset, &schema)
        .unwrap();
    let predictor = Predictor::load(Arc::new(bundle)).unwrap();

    let result = predictor.predict(&input_row("Two year", "12"));
    assert!((0.0..=1.0).contains(&result.churn_probability));
    assert_eq!(result.encoding_warnings.len(), 1);
    assert!(result.confidence_interval.lower <= result.churn_probability);
    assert!(result.churn_probability <= result.confidence_interval.upper);
}

#[test]
fn persist_reload_predict_round_trip() {
    let dataset = synthetic_dataset();
    let schema = SchemaDetector::new().detect(&dataset).unwrap();
    let bundle = Trainer::new(TrainConfig::default())
        .fit(&dataset, &schema)
        .unwrap();

    let row = input_row("Month-to-month", "5");
    let before = Predictor::load(Arc::new(bundle.clone()))
        .unwrap()
        .predict(&row)
        .churn_probability;

    let dir = tempfile::TempDir::new().unwrap();
    save_bundle(&bundle, dir.path()).unwrap();
    let reloaded = load_bundle(dir.path()).unwrap();
    let after = Predictor::load(Arc::new(reloaded))
        .unwrap()
        .predict(&row)
        .churn_probability;

    assert_eq!(before, after, "serialization round trip changed a prediction");
}

#[test]
fn registry_reload_serves_persisted_bundle() {
    let dataset = synthetic_dataset();
    let schema = SchemaDetector::new().detect(&dataset).unwrap();
    let bundle = Trainer::new(TrainConfig::default())
        .fit(&dataset, &schema)
        .unwrap();

    let dir = tempfile::TempDir::new().unwrap();
    save_bundle(&bundle, dir.path()).unwrap();

    let registry = ModelRegistry::new(dir.path());
    assert!(!registry.is_ready());
    registry.reload().unwrap();
    assert!(registry.is_ready());

    let metadata = registry.get_metadata().unwrap();
    assert_eq!(metadata.feature_cols, vec!["Contract", "tenure"]);
    let importance = registry.get_feature_importance().unwrap();
    assert!(importance[0].importance >= importance[1].importance);
}

#[test]
fn duplicate_upload_flagged_but_retrained() {
    let registry = Arc::new(ModelRegistry::new("models"));
    let ledger = UploadLedger::new(InMemoryBackend).unwrap();
    let mut orchestrator =
        RetrainOrchestrator::new(Arc::clone(&registry), ledger, RetrainConfig::default());

    let dataset = synthetic_dataset();
    let first = orchestrator.run(&dataset, "upload.csv").unwrap();
    let first_live = registry.get_metadata().unwrap();

    let second = orchestrator.run(&dataset, "upload.csv").unwrap();
    let second_live = registry.get_metadata().unwrap();

    assert!(!first.is_duplicate);
    assert!(second.is_duplicate);
    // Identical data retrains deterministically to identical metrics
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first_live.roc_auc, second_live.roc_auc);

    let entries = orchestrator.ledger().entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[1].is_duplicate);
    assert_eq!(
        entries[1].original_upload_timestamp,
        Some(entries[0].timestamp)
    );
}

#[test]
fn failed_retrain_keeps_serving_previous_bundle() {
    let registry = Arc::new(ModelRegistry::new("models"));
    let ledger = UploadLedger::new(InMemoryBackend).unwrap();
    let mut orchestrator =
        RetrainOrchestrator::new(Arc::clone(&registry), ledger, RetrainConfig::default());

    orchestrator.run(&synthetic_dataset(), "good.csv").unwrap();
    let row = input_row("One year", "30");
    let before = registry.predict(&row).unwrap();

    // A documentation sheet must abort before any training
    let sheet = RawDataset::new(
        vec!["Variable".to_string(), "Description".to_string()],
        vec![vec!["tenure".to_string(), "months subscribed".to_string()]],
    )
    .unwrap();
    assert!(orchestrator.run(&sheet, "dictionary.csv").is_err());
    assert_eq!(orchestrator.state(), RetrainState::Failed);

    assert_eq!(registry.predict(&row).unwrap(), before);
    assert_eq!(orchestrator.ledger().len(), 2);
}

#[test]
fn explanation_reconstructs_model_output() {
    let dataset = synthetic_dataset();
    let schema = SchemaDetector::new().detect(&dataset).unwrap();
    let bundle = Arc::new(
        Trainer::new(TrainConfig::default())
            .fit(&dataset, &schema)
            .unwrap(),
    );
    let predictor = Predictor::load(Arc::clone(&bundle)).unwrap();
    let explainer = predictor.explainer().unwrap();

    for (contract, tenure) in [("Month-to-month", "1"), ("One year", "60"), ("One year", "0")] {
        let (x, _) = predictor.prepare_single(&input_row(contract, tenure));
        let phi = explainer.explain(&x);
        let reconstructed = explainer.bias() + phi.iter().sum::<f64>();
        let margin = bundle.classifier.predict_margin(&x);
        assert!(
            (reconstructed - margin).abs() < 1e-9,
            "additive reconstruction broke: {reconstructed} vs {margin}"
        );
    }
}

#[test]
fn batch_predictions_match_single_path() {
    let dataset = synthetic_dataset();
    let schema = SchemaDetector::new().detect(&dataset).unwrap();
    let bundle = Trainer::new(TrainConfig::default())
        .fit(&dataset, &schema)
        .unwrap();
    let predictor = Predictor::load(Arc::new(bundle)).unwrap();

    let rows = dataset.row_maps();
    let outcome = predictor.batch_predict(&rows);
    assert_eq!(outcome.summary.total_rows, 100);
    assert_eq!(outcome.summary.predicted, 100);
    assert_eq!(outcome.summary.anomalies, 0);

    for prediction in &outcome.predictions {
        let single = predictor.predict(&rows[prediction.row_index]);
        assert!(
            (prediction.prediction.churn_probability - single.churn_probability).abs() < 1e-9
        );
        assert_eq!(prediction.prediction.risk_level, single.risk_level);
    }
}

#[test]
fn concurrent_predictions_across_hot_swaps() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    let registry = Arc::new(ModelRegistry::new("models"));
    let dataset = synthetic_dataset();
    let schema = SchemaDetector::new().detect(&dataset).unwrap();
    registry
        .install(
            Trainer::new(TrainConfig::default().with_n_trees(10))
                .fit(&dataset, &schema)
                .unwrap(),
        )
        .unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for t in 0..4 {
        let registry = Arc::clone(&registry);
        let stop = Arc::clone(&stop);
        readers.push(thread::spawn(move || {
            let row = input_row("Month-to-month", &t.to_string());
            let mut served = 0u32;
            loop {
                let result = registry.predict(&row).unwrap();
                assert!((0.0..=1.0).contains(&result.churn_probability));
                served += 1;
                if stop.load(Ordering::Relaxed) {
                    return served;
                }
            }
        }));
    }

    // Swap live bundles while readers hammer the registry
    for seed in 0..15 {
        let bundle = Trainer::new(TrainConfig::default().with_n_trees(10).with_seed(seed))
            .fit(&dataset, &schema)
            .unwrap();
        registry.install(bundle).unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

#[test]
fn risk_tier_boundaries_exact() {
    assert_eq!(RiskTier::from_probability(0.6999), RiskTier::Medium);
    assert_eq!(RiskTier::from_probability(0.7), RiskTier::High);
    assert_eq!(RiskTier::from_probability(0.2999), RiskTier::Low);
    assert_eq!(RiskTier::from_probability(0.3), RiskTier::Medium);
}
