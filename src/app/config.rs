//! Configuration types for the feature-drop sensitivity experiment.

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    causal::{SolverConfig, TrickyFeature},
    model::Arch,
    pipeline::{FitConfig, RoundSchedule, TrainerConfig},
    types::FeaturePartition,
};

/// Settings for fitting the ground-truth base model `h*`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HStarConfig {
    pub lr: f64,
    pub epochs: usize,
    pub early_stop: Option<usize>,
}

impl Default for HStarConfig {
    fn default() -> Self {
        Self {
            lr: 0.001,
            epochs: 100,
            early_stop: Some(10),
        }
    }
}

/// Configuration for one sensitivity run.
///
/// Defaults reproduce the spam experiment. Every field can be
/// overridden from a JSON file, and the CLI overrides individual fields on
/// top of that.
///
/// # Examples
///
/// ```
/// use cserm::app::ExperimentConfig;
///
/// let config = ExperimentConfig::default()
///     .with_time_steps(3)
///     .with_epochs(5)
///     .with_max_partitions(2);
/// assert_eq!(config.schedule().time_steps, 3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Width of the raw dataset.
    pub total_dim: usize,
    /// Raw columns agents can move.
    pub causal_features: Vec<usize>,
    /// Raw columns whose values the structural mechanism rewrites.
    pub effect_features: Vec<usize>,
    /// Upper bound on partitions evaluated per run.
    pub max_partitions: usize,
    pub batch_size: usize,
    pub lr: f64,
    /// Learning rate of the auxiliary outcome model.
    pub lr_h: f64,
    pub epochs: usize,
    pub early_stop: Option<usize>,
    pub tau: usize,
    pub time_steps: usize,
    pub n_clean: usize,
    pub per_round: usize,
    pub n_val: usize,
    pub n_test: usize,
    pub cost_scale: f64,
    pub f_arch: Arch,
    pub h_arch: Option<Arch>,
    pub h_star: HStarConfig,
    pub tricky: TrickyFeature,
    /// Seed of the data pipeline; independent of the run seed.
    pub data_seed: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            total_dim: 15,
            causal_features: vec![1, 8, 5],
            effect_features: vec![2, 3],
            max_partitions: 30,
            batch_size: 64,
            lr: 0.01,
            lr_h: 0.01,
            epochs: 100,
            early_stop: FitConfig::default().early_stop,
            tau: 4,
            time_steps: 10,
            n_clean: 1000,
            per_round: 200,
            n_val: 500,
            n_test: 2000,
            cost_scale: 40.0,
            f_arch: Arch::Linear,
            h_arch: Some(Arch::Mlp {
                hidden: 10,
                layers: 3,
            }),
            h_star: HStarConfig::default(),
            tricky: TrickyFeature::default(),
            data_seed: 0,
        }
    }
}

impl ExperimentConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            operation: format!("open config {path:?}"),
            source,
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|source| Error::Io {
            operation: format!("create config {path:?}"),
            source,
        })?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn with_features(
        mut self,
        causal: Vec<usize>,
        effect: Vec<usize>,
        total_dim: usize,
    ) -> Self {
        self.causal_features = causal;
        self.effect_features = effect;
        self.total_dim = total_dim;
        self
    }

    pub fn with_time_steps(mut self, time_steps: usize) -> Self {
        self.time_steps = time_steps;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_max_partitions(mut self, max_partitions: usize) -> Self {
        self.max_partitions = max_partitions;
        self
    }

    /// Set the sample counts: clean seed set, agents per round, validation and test.
    pub fn with_samples(
        mut self,
        n_clean: usize,
        per_round: usize,
        n_val: usize,
        n_test: usize,
    ) -> Self {
        self.n_clean = n_clean;
        self.per_round = per_round;
        self.n_val = n_val;
        self.n_test = n_test;
        self
    }

    pub fn with_h_star(mut self, h_star: HStarConfig) -> Self {
        self.h_star = h_star;
        self
    }

    pub fn with_h_arch(mut self, h_arch: Option<Arch>) -> Self {
        self.h_arch = h_arch;
        self
    }

    /// Check everything that can be checked before data is loaded.
    pub fn validate(&self) -> Result<()> {
        self.partition()?;
        self.fit_config().validate()?;
        self.fit_config().with_lr(self.lr_h).validate()?;
        self.h_star_fit_config().validate()?;
        if !(self.cost_scale.is_finite() && self.cost_scale > 0.0) {
            return Err(Error::InvalidConfiguration {
                message: format!("cost scale must be positive, got {}", self.cost_scale),
            });
        }
        if self.max_partitions == 0 {
            return Err(Error::InvalidConfiguration {
                message: "max_partitions must be positive".to_string(),
            });
        }
        if self.n_clean == 0 || self.n_val == 0 || self.n_test == 0 {
            return Err(Error::InvalidConfiguration {
                message: "clean, validation and test sample counts must be positive".to_string(),
            });
        }
        if self.tricky.index >= self.effect_features.len() {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "tricky feature index {} is outside the {} effect features",
                    self.tricky.index,
                    self.effect_features.len()
                ),
            });
        }
        Ok(())
    }

    /// Base partition before any causal feature is dropped; remaining columns
    /// are unobserved in ascending order.
    pub fn partition(&self) -> Result<FeaturePartition> {
        FeaturePartition::with_remaining_unobserved(
            self.causal_features.clone(),
            self.effect_features.clone(),
            self.total_dim,
        )
    }

    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            epochs: self.epochs,
            early_stop: self.early_stop,
            batch_size: self.batch_size,
            lr: self.lr,
        }
    }

    pub fn h_star_fit_config(&self) -> FitConfig {
        FitConfig {
            epochs: self.h_star.epochs,
            early_stop: self.h_star.early_stop,
            batch_size: self.batch_size,
            lr: self.h_star.lr,
        }
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            tau: self.tau,
            step_size: None,
        }
    }

    pub fn trainer_config(&self, seed: u64) -> TrainerConfig {
        TrainerConfig {
            f_arch: self.f_arch,
            h_arch: self.h_arch,
            seed,
            fit: self.fit_config(),
            lr_h: self.lr_h,
            ..TrainerConfig::default()
        }
    }

    pub fn schedule(&self) -> RoundSchedule {
        RoundSchedule {
            time_steps: self.time_steps,
            n_samples_per_round: self.per_round,
        }
    }

    /// Number of training rows: the clean seed set plus every round's arrivals.
    pub fn n_train(&self) -> usize {
        self.n_clean + self.time_steps * self.per_round
    }

    /// `(val_test_frac, test_frac)`: the tail fraction split off the balanced
    /// data for validation plus test, and the tail of that kept for test.
    pub fn split_fractions(&self) -> (f64, f64) {
        let val_test = self.n_val + self.n_test;
        let total = self.n_train() + val_test;
        (
            val_test as f64 / total as f64,
            self.n_test as f64 / val_test as f64,
        )
    }
}
