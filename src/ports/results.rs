//! Results port - uniform access to a trained model's statistics

use crate::{
    Result,
    pipeline::{ChosenStats, Trajectory},
};

/// Anything that can report its chosen model and per-round trajectory.
///
/// The iterative trainer reports one trajectory row per completed round; the
/// single-shot baselines report a one-row trajectory.
pub trait ResultsSource {
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfiguration`] if called before training.
    fn collect_results(&self, label: &str) -> Result<(ChosenStats, Trajectory)>;
}
