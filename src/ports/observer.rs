//! Observer port - abstraction for watching the retraining loop
//!
//! This port lets progress bars, JSONL writers and metric collectors follow
//! a run without the trainer knowing about any output format.

use crate::{
    Result,
    pipeline::{RoundRecord, RoundStats},
};

/// Observer of the iterative retraining loop.
///
/// # Event Sequence
///
/// 1. `on_training_start(total_rounds)` - once, after the configuration checks
/// 2. `on_initial_fit(stats)` - once, after the fit on the clean seed set
/// 3. For each round:
///    - `on_round_start(round)`
///    - `on_round_end(record)` - also for a diverged round, before the error
///      is returned
/// 4. `on_training_end()` - once, after model selection
///
/// # Examples
///
/// ```
/// use cserm::{pipeline::RoundRecord, ports::RoundObserver};
///
/// struct RoundCounter {
///     rounds: usize,
/// }
///
/// impl RoundObserver for RoundCounter {
///     fn on_round_end(&mut self, _record: &RoundRecord) -> cserm::Result<()> {
///         self.rounds += 1;
///         Ok(())
///     }
/// }
/// ```
pub trait RoundObserver: Send {
    fn on_training_start(&mut self, _total_rounds: usize) -> Result<()> {
        Ok(())
    }

    /// Called with the statistics of the clean-seed fit.
    fn on_initial_fit(&mut self, _stats: &RoundStats) -> Result<()> {
        Ok(())
    }

    fn on_round_start(&mut self, _round: usize) -> Result<()> {
        Ok(())
    }

    /// Called once the round is recorded, whether it completed or diverged.
    fn on_round_end(&mut self, _record: &RoundRecord) -> Result<()> {
        Ok(())
    }

    /// Called after the chosen model has been selected.
    fn on_training_end(&mut self) -> Result<()> {
        Ok(())
    }
}
