//! Causal strategic classification simulator
//!
//! This crate provides:
//! - A causal world of agents: movable causal features, effect features
//!   produced by a fixed structural mechanism, and a ground-truth labeler
//! - Bounded-rationality best responses under quadratic movement cost
//! - Iterative causal-strategic retraining (CSERM) with per-round model
//!   selection, plus non-strategic and strategic (SERM) baselines
//! - The feature-drop sensitivity experiment, its artifacts and summaries

pub mod adapters;
pub mod agents;
pub mod analysis;
pub mod app;
pub mod causal;
pub mod cli;
pub mod data;
pub mod distribution;
pub mod error;
pub mod experiment;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod ports;
pub mod types;
pub mod utils;

pub use agents::{Agent, AgentBatch};
pub use causal::{BestResponseSolver, CostModel, GroundTruthLabeler, StructuralMechanism};
pub use distribution::SequentialPopulationDistribution;
pub use error::{Error, Result};
pub use pipeline::{IterativeCausalStrategicTrainer, RoundSchedule, TrainerConfig};
pub use types::{FeatureLayout, FeaturePartition, Label};
