//! Full sensitivity runs through the application container.

mod common;

use cserm::{
    adapters::{InMemoryArtifactRepository, SyntheticDataset},
    app::{App, ExperimentConfig, HStarConfig},
    experiment::{RoundMonitoring, SensitivitySweep, SweepReport},
    ports::ArtifactRepository,
};
use std::path::Path;
use tempfile::TempDir;

/// Default spam features with shortened fits.
fn reduced_default() -> ExperimentConfig {
    ExperimentConfig::default()
        .with_epochs(2)
        .with_max_partitions(1)
        .with_h_star(HStarConfig {
            epochs: 5,
            ..HStarConfig::default()
        })
}

#[test]
fn default_experiment_runs_one_partition() {
    let config = reduced_default();
    let source = SyntheticDataset::new(30_000, 15);
    let repo = InMemoryArtifactRepository::new();
    let app = App::for_testing()
        .with_repository(repo.clone())
        .with_default_seed(0)
        .build();

    let (report, path) = app
        .run_experiment(&config, &source, 0, None, Path::new("results"), &RoundMonitoring::default())
        .unwrap();

    assert_eq!(
        path,
        Path::new("results/sensitivity_exp_n_drops=0_seed=0.json")
    );
    assert!(repo.contains(&path));
    assert_eq!(report.artifact.len(), 1);
    assert_eq!(report.artifact.n_drops, 0);

    let outcome = &report.partitions[0];
    assert_eq!(outcome.partition.causal(), &[1, 8, 5]);
    assert_eq!(outcome.cserm_trajectory.len(), 10);
    assert!(outcome.cserm.chosen_round.is_some_and(|r| r <= 9));
    for acc in report
        .artifact
        .cserm_test_accs
        .iter()
        .chain(&report.artifact.serm_test_accs)
    {
        assert!((0.0..=1.0).contains(acc));
    }
    assert!((0.0..=1.0).contains(&outcome.h_star_accuracy));
}

#[test]
fn default_experiment_reruns_bit_identically() {
    let config = reduced_default();
    let source = SyntheticDataset::new(30_000, 15);
    let sweep = SensitivitySweep::new(&config, &source);

    let a = sweep.run(0, 0).unwrap();
    let b = sweep.run(0, 0).unwrap();

    let bits = |accs: &[f64]| accs.iter().map(|a| a.to_bits()).collect::<Vec<_>>();
    assert_eq!(
        bits(&a.artifact.cserm_test_accs),
        bits(&b.artifact.cserm_test_accs)
    );
    assert_eq!(
        bits(&a.artifact.serm_test_accs),
        bits(&b.artifact.serm_test_accs)
    );
    // shortest round-trip formatting is exact, and NaN serialises alike
    let rendered = |r: &SweepReport| {
        let o = &r.partitions[0];
        serde_json::to_string(&(&o.cserm, &o.cserm_trajectory, &o.cserm_model, &o.serm)).unwrap()
    };
    assert_eq!(rendered(&a), rendered(&b));
}

#[test]
fn same_seed_gives_the_same_artifact() {
    let config = common::small_config();
    let source = SyntheticDataset::new(2_000, 7);
    let sweep = SensitivitySweep::new(&config, &source);

    let a = sweep.run(1, 3).unwrap();
    let b = sweep.run(1, 3).unwrap();

    assert_eq!(a.artifact, b.artifact);
    assert_eq!(a.artifact.len(), 2);
    let partitions: Vec<_> = a.partitions.iter().map(|o| o.partition.clone()).collect();
    assert_eq!(partitions, sweep.partitions(1, 3).unwrap());
}

#[test]
fn artifacts_round_trip_through_disk() {
    let dir = TempDir::new().unwrap();
    let config = common::small_config();
    let source = SyntheticDataset::new(2_000, 7);
    let app = App::new();

    let (report, path) = app
        .run_experiment(&config, &source, 1, Some(5), dir.path(), &RoundMonitoring::default())
        .unwrap();

    assert!(path.ends_with("sensitivity_exp_n_drops=1_seed=5.json"));
    assert_eq!(app.load_artifact(&path).unwrap(), report.artifact);
    assert_eq!(app.load_artifacts(dir.path()).unwrap(), vec![report.artifact]);
}

#[test]
fn configuration_errors_write_nothing() {
    let dir = TempDir::new().unwrap();
    let config = common::small_config();
    let source = SyntheticDataset::new(2_000, 7);
    let app = App::new();

    let err = app
        .run_experiment(&config, &source, 4, Some(0), dir.path(), &RoundMonitoring::default())
        .unwrap_err();
    assert!(err.is_configuration());

    let wrong_width = SyntheticDataset::new(2_000, 9);
    assert!(
        app.run_experiment(&config, &wrong_width, 0, Some(0), dir.path(), &RoundMonitoring::default())
            .is_err()
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn missing_seed_is_rejected() {
    let config = common::small_config();
    let source = SyntheticDataset::new(2_000, 7);
    let repo = InMemoryArtifactRepository::new();
    let app = App::for_testing().with_repository(repo.clone()).build();

    let err = app
        .run_experiment(&config, &source, 0, None, Path::new("out"), &RoundMonitoring::default())
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(repo.count(), 0);
    assert!(!repo.contains(&repo.artifact_path(Path::new("out"), 0, 0)));
}
