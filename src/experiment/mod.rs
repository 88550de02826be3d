//! The feature-drop sensitivity experiment
//!
//! For each way of hiding `n_drops` causal features, [`data_setup`] builds a
//! causal world from a raw dataset, then [`SensitivitySweep`] trains the
//! iterative causal-strategic trainer (CSERM) and the strategic baseline
//! (SERM) in it and records their chosen-model test accuracies in a
//! [`SweepArtifact`].

pub mod artifact;
pub mod setup;
pub mod sweep;

pub use artifact::SweepArtifact;
pub use setup::{PreparedData, data_setup};
pub use sweep::{PartitionOutcome, RoundMonitoring, SensitivitySweep, SweepReport};
