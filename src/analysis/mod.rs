//! Analysis of finished sensitivity runs
//!
//! This module aggregates persisted sweep artifacts into per-`n_drops`
//! summaries comparing the iterative trainer with the strategic baseline.

pub mod stats;

pub use stats::{AccuracySummary, DropSummary, summarize};
