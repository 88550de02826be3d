//! Feature-drop sensitivity sweep: CSERM against SERM on every sampled partition

use std::{
    fs,
    path::{Path, PathBuf},
};

use rand::{SeedableRng, rngs::StdRng};
use tracing::info;

use super::{
    artifact::SweepArtifact,
    setup::{PreparedData, data_setup},
};
use crate::{
    Error, Result,
    app::ExperimentConfig,
    causal::{BestResponseSolver, CostModel},
    data::{generate_partitions_for_feature_drops, sample_partitions},
    distribution::SequentialPopulationDistribution,
    model::{ModelSpec, SavedClassifier},
    pipeline::{
        CausalData, CausalEnvironment, ChosenStats, IterativeCausalStrategicTrainer,
        JsonlObserver, ProgressObserver, StrategicTrainer, Trajectory, labelled_observed,
    },
    ports::{DatasetSource, ResultsSource},
    types::FeaturePartition,
};

/// Result of both trainers on one partition.
#[derive(Debug, Clone)]
pub struct PartitionOutcome {
    pub partition: FeaturePartition,
    pub h_star_accuracy: f64,
    pub cserm: ChosenStats,
    pub cserm_trajectory: Trajectory,
    pub cserm_model: SavedClassifier,
    pub serm: ChosenStats,
}

/// Everything a sweep produced; the artifact is what gets persisted.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub artifact: SweepArtifact,
    pub partitions: Vec<PartitionOutcome>,
}

/// How CSERM rounds are reported while they train.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundMonitoring {
    /// Show a round progress bar.
    pub progress: bool,
    /// Directory receiving one JSONL round log per partition.
    pub jsonl_dir: Option<PathBuf>,
}

/// Runs the sensitivity experiment for one `(n_drops, seed)` pair.
pub struct SensitivitySweep<'a> {
    config: &'a ExperimentConfig,
    source: &'a dyn DatasetSource,
    monitoring: RoundMonitoring,
}

impl<'a> SensitivitySweep<'a> {
    pub fn new(config: &'a ExperimentConfig, source: &'a dyn DatasetSource) -> Self {
        Self {
            config,
            source,
            monitoring: RoundMonitoring::default(),
        }
    }

    pub fn with_monitoring(mut self, monitoring: RoundMonitoring) -> Self {
        self.monitoring = monitoring;
        self
    }

    /// Round log of partition `index`, named after the run artifact.
    pub fn round_log_path(dir: &Path, n_drops: usize, seed: u64, index: usize) -> PathBuf {
        let stem = SweepArtifact::file_stem(n_drops, seed);
        dir.join(format!("{stem}_partition={index}.jsonl"))
    }

    /// Partitions this run evaluates: every way of dropping `n_drops` causal
    /// features, sampled down to `max_partitions` with the run seed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid base partition or when
    /// `n_drops` exceeds the causal block.
    pub fn partitions(&self, n_drops: usize, seed: u64) -> Result<Vec<FeaturePartition>> {
        let base = self.config.partition()?;
        let all = generate_partitions_for_feature_drops(&base, n_drops)?;
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(sample_partitions(all, self.config.max_partitions, &mut rng))
    }

    /// Run every sampled partition.
    ///
    /// Configuration problems surface before any training starts; a failure
    /// in any partition aborts the whole run.
    pub fn run(&self, n_drops: usize, seed: u64) -> Result<SweepReport> {
        self.config.validate()?;
        let partitions = self.partitions(n_drops, seed)?;
        info!(
            n_drops,
            seed,
            partitions = partitions.len(),
            source = %self.source.describe(),
            "starting sensitivity run"
        );

        let mut artifact = SweepArtifact::new(n_drops, seed);
        let mut outcomes = Vec::with_capacity(partitions.len());
        if let Some(dir) = &self.monitoring.jsonl_dir {
            fs::create_dir_all(dir).map_err(|source| Error::Io {
                operation: format!("create directory {dir:?}"),
                source,
            })?;
        }
        for (index, partition) in partitions.iter().enumerate() {
            let log = self
                .monitoring
                .jsonl_dir
                .as_deref()
                .map(|dir| Self::round_log_path(dir, n_drops, seed, index));
            let outcome = self.train_partition(partition, seed, log.as_deref())?;
            artifact.push(
                outcome.cserm.accuracy_test()?,
                outcome.serm.accuracy_test()?,
            );
            outcomes.push(outcome);
        }
        Ok(SweepReport {
            artifact,
            partitions: outcomes,
        })
    }

    /// Train and evaluate CSERM and SERM on one partition.
    pub fn run_partition(&self, partition: &FeaturePartition, seed: u64) -> Result<PartitionOutcome> {
        self.train_partition(partition, seed, None)
    }

    fn train_partition(
        &self,
        partition: &FeaturePartition,
        seed: u64,
        round_log: Option<&Path>,
    ) -> Result<PartitionOutcome> {
        let prepared = data_setup(self.config, self.source, partition)?;
        let PreparedData {
            mechanism,
            labeler,
            h_star_accuracy,
            data,
            full_train,
            pool,
            ..
        } = prepared;

        let mut rng = StdRng::seed_from_u64(seed);
        let cost = CostModel::random(partition.causal_dim(), self.config.cost_scale, &mut rng)?;
        let solver = BestResponseSolver::new(cost, self.config.solver_config())?;
        let env = CausalEnvironment::new(solver.clone(), mechanism, labeler);

        let mut cserm = IterativeCausalStrategicTrainer::new(
            self.config.trainer_config(seed),
            env.clone(),
            SequentialPopulationDistribution::new(pool),
            data.clone(),
        )?;
        if self.monitoring.progress {
            cserm = cserm.with_observer(Box::new(ProgressObserver::new()));
        }
        if let Some(path) = round_log {
            cserm = cserm.with_observer(Box::new(JsonlObserver::new(path)?));
        }
        let results = cserm.train(&self.config.schedule())?;
        let cserm_model = results.chosen_model.clone();
        let (cserm_stats, cserm_trajectory) = cserm.collect_results("CSERM")?;

        let f = ModelSpec::new(self.config.f_arch, partition.classifier_dim(), seed).build()?;
        let mut serm = StrategicTrainer::new(
            f,
            solver,
            labelled_observed(&full_train)?,
            labelled_observed(&data.val)?,
            self.config.fit_config(),
            seed,
        );
        serm.train(self.config.epochs, self.config.early_stop)?;
        let full = CausalData {
            train: full_train,
            val: data.val,
            test: data.test,
        };
        serm.collect_trainer_results(&env, &full)?;
        let (serm_stats, _) = serm.collect_results("SERM")?;

        info!(
            partition = %partition,
            cserm = cserm_stats.accuracy_test()?,
            serm = serm_stats.accuracy_test()?,
            chosen_round = ?cserm_stats.chosen_round,
            "partition finished"
        );
        Ok(PartitionOutcome {
            partition: partition.clone(),
            h_star_accuracy,
            cserm: cserm_stats,
            cserm_trajectory,
            cserm_model,
            serm: serm_stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SyntheticDataset;

    fn config() -> ExperimentConfig {
        ExperimentConfig::default()
            .with_features(vec![0, 1, 2], vec![3, 4], 7)
            .with_samples(40, 10, 20, 30)
            .with_time_steps(2)
            .with_epochs(2)
            .with_h_arch(None)
            .with_max_partitions(2)
    }

    #[test]
    fn partitions_are_sampled_down() {
        let config = config();
        let source = SyntheticDataset::new(700, 7);
        let sweep = SensitivitySweep::new(&config, &source);
        assert_eq!(sweep.partitions(0, 1).unwrap().len(), 1);
        assert_eq!(sweep.partitions(1, 1).unwrap().len(), 2);
        assert_eq!(sweep.partitions(1, 1).unwrap(), sweep.partitions(1, 1).unwrap());
    }

    #[test]
    fn too_many_drops_fail_before_training() {
        let config = config();
        let source = SyntheticDataset::new(700, 7);
        let err = SensitivitySweep::new(&config, &source).run(4, 0).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn run_pairs_accuracies_per_partition() {
        let config = config();
        let source = SyntheticDataset::new(700, 7);
        let report = SensitivitySweep::new(&config, &source).run(1, 3).unwrap();
        assert_eq!(report.artifact.len(), 2);
        assert_eq!(report.artifact.serm_test_accs.len(), 2);
        assert_eq!(report.artifact.n_drops, 1);
        for (outcome, &acc) in report.partitions.iter().zip(&report.artifact.cserm_test_accs) {
            assert_eq!(outcome.partition.causal_dim(), 2);
            assert!((0.0..=1.0).contains(&acc));
            assert!(outcome.cserm_trajectory.len() <= 2);
        }
    }
}
