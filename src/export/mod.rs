//! Export functionality for analysis and research
//!
//! This module provides functionality to export run data in various formats.
//! Currently supports CSV export of per-round trajectories.

mod trajectory_csv;

pub use trajectory_csv::{LabelledTrajectory, TrajectoryCsvExporter};
