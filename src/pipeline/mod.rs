//! Training and evaluation pipelines
//!
//! This module provides:
//! - [`IterativeCausalStrategicTrainer`]: the round-based retraining loop
//! - [`NonStrategicTrainer`] and [`StrategicTrainer`]: single-shot baselines
//! - [`CausalEnvironment`]: strategic evaluation of a deployed classifier
//! - Round records, statistics tables and observers

pub mod environment;
pub mod fit;
pub mod iterative;
pub mod non_strategic;
pub mod observers;
pub mod records;
pub mod strategic;

#[cfg(test)]
pub(crate) mod fixtures;

pub use environment::{CausalEnvironment, clean_evaluation, labelled_observed};
pub use fit::{Evaluation, FitConfig, FitSummary, LabelledSet};
pub use iterative::{
    IterativeCausalStrategicTrainer, RoundSchedule, TrainerConfig, TrainerPhase, TrainerResults,
};
pub use non_strategic::NonStrategicTrainer;
pub use observers::{JsonlObserver, MetricsObserver, MetricsSummary, ProgressObserver, RoundObservation};
pub use records::{
    ChosenStats, ResultsTable, RoundRecord, RoundStats, RoundStatus, StatsMap, Trajectory,
    select_best,
};
pub use strategic::{CausalData, StrategicTrainer};

pub use crate::ports::{ResultsSource, RoundObserver};
