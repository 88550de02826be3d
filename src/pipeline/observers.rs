//! Observer implementations for the retraining loop
//!
//! Observers allow composable data collection during training without coupling
//! the trainer to specific output formats.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use super::records::{RoundRecord, RoundStats, RoundStatus, StatsMap};
use crate::{Result, error::Error, ports::RoundObserver};

/// One JSONL line per round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundObservation {
    /// `None` for the clean-seed fit
    pub round: Option<usize>,
    pub status: String,
    /// Agents drawn in the round
    pub batch_size: usize,
    pub stats: StatsMap,
}

/// Progress bar observer - Shows rounds and the latest validation accuracy
pub struct ProgressObserver {
    progress_bar: Option<ProgressBar>,
    last_accuracy_val: Option<f64>,
}

impl ProgressObserver {
    /// Create a new progress observer
    pub fn new() -> Self {
        Self {
            progress_bar: None,
            last_accuracy_val: None,
        }
    }

    fn message(&self) -> String {
        match self.last_accuracy_val {
            Some(acc) => format!("{acc:.3}"),
            None => "-".to_string(),
        }
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundObserver for ProgressObserver {
    fn on_training_start(&mut self, total_rounds: usize) -> Result<()> {
        let pb = ProgressBar::new(total_rounds as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} rounds (val acc: {msg})")
                .map_err(|e| Error::ProgressBarTemplate {
                    message: e.to_string(),
                })?
                .progress_chars("=>-"),
        );
        self.progress_bar = Some(pb);
        Ok(())
    }

    fn on_initial_fit(&mut self, stats: &RoundStats) -> Result<()> {
        self.last_accuracy_val = Some(stats.accuracy_val);
        if let Some(pb) = &self.progress_bar {
            pb.set_message(self.message());
        }
        Ok(())
    }

    fn on_round_end(&mut self, record: &RoundRecord) -> Result<()> {
        if let Some(stats) = &record.stats {
            self.last_accuracy_val = Some(stats.accuracy_val);
        }
        if let Some(pb) = &self.progress_bar {
            pb.set_position(record.round as u64 + 1);
            pb.set_message(self.message());
        }
        Ok(())
    }

    fn on_training_end(&mut self) -> Result<()> {
        if let Some(pb) = &self.progress_bar {
            pb.finish_with_message(self.message());
        }
        Ok(())
    }
}

/// Metrics observer - Collects the per-round validation and test accuracies.
///
/// Clones share their storage, so a clone kept by the caller can read what the
/// trainer's copy recorded.
#[derive(Clone, Default)]
pub struct MetricsObserver {
    inner: Arc<Mutex<MetricsSummary>>,
}

/// Summary of training metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_rounds: usize,
    pub completed_rounds: usize,
    pub diverged_rounds: usize,
    pub initial_accuracy_val: Option<f64>,
    pub accuracy_val: Vec<f64>,
    pub accuracy_test: Vec<f64>,
    pub mean_cost: Vec<f64>,
}

impl MetricsSummary {
    /// Best validation accuracy seen in any completed round
    pub fn best_accuracy_val(&self) -> Option<f64> {
        self.accuracy_val.iter().copied().reduce(f64::max)
    }
}

impl MetricsObserver {
    /// Create a new metrics observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Get metrics summary
    pub fn summary(&self) -> MetricsSummary {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RoundObserver for MetricsObserver {
    fn on_training_start(&mut self, total_rounds: usize) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *inner = MetricsSummary {
            total_rounds,
            ..MetricsSummary::default()
        };
        Ok(())
    }

    fn on_initial_fit(&mut self, stats: &RoundStats) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.initial_accuracy_val = Some(stats.accuracy_val);
        Ok(())
    }

    fn on_round_end(&mut self, record: &RoundRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match (&record.status, &record.stats) {
            (RoundStatus::Completed, Some(stats)) => {
                inner.completed_rounds += 1;
                inner.accuracy_val.push(stats.accuracy_val);
                inner.accuracy_test.push(stats.accuracy_test);
                if let Some(cost) = stats.mean_cost {
                    inner.mean_cost.push(cost);
                }
            }
            _ => inner.diverged_rounds += 1,
        }
        Ok(())
    }
}

/// JSONL observer - Exports one JSON object per round
pub struct JsonlObserver {
    writer: BufWriter<File>,
}

impl JsonlObserver {
    /// Create a new JSONL observer
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::Io {
            operation: format!("create file {path:?}"),
            source,
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write(&mut self, observation: &RoundObservation) -> Result<()> {
        serde_json::to_writer(&mut self.writer, observation)?;
        writeln!(&mut self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl RoundObserver for JsonlObserver {
    fn on_initial_fit(&mut self, stats: &RoundStats) -> Result<()> {
        self.write(&RoundObservation {
            round: None,
            status: "initial".to_string(),
            batch_size: 0,
            stats: stats.to_map(),
        })
    }

    fn on_round_end(&mut self, record: &RoundRecord) -> Result<()> {
        let status = match record.status {
            RoundStatus::Completed => "completed",
            RoundStatus::Diverged { .. } => "diverged",
        };
        self.write(&RoundObservation {
            round: Some(record.round),
            status: status.to_string(),
            batch_size: record.batch.len(),
            stats: record.stats_map().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        distribution::SequentialPopulationDistribution,
        pipeline::{
            CausalData, FitConfig, IterativeCausalStrategicTrainer, RoundSchedule, TrainerConfig,
            fixtures,
        },
    };

    fn trainer() -> IterativeCausalStrategicTrainer {
        let env = fixtures::environment();
        let data = CausalData {
            train: fixtures::agents(&env, 40, 1),
            val: fixtures::agents(&env, 20, 2),
            test: fixtures::agents(&env, 20, 3),
        };
        let distribution = SequentialPopulationDistribution::new(fixtures::agents(&env, 30, 4));
        let config = TrainerConfig::default()
            .with_fit(FitConfig::default().with_epochs(2))
            .with_h_arch(None);
        IterativeCausalStrategicTrainer::new(config, env, distribution, data).unwrap()
    }

    const SCHEDULE: RoundSchedule = RoundSchedule {
        time_steps: 3,
        n_samples_per_round: 10,
    };

    #[test]
    fn metrics_observer_sees_every_round() {
        let metrics = MetricsObserver::new();
        let mut t = trainer().with_observer(Box::new(metrics.clone()));
        t.train(&SCHEDULE).unwrap();

        let summary = metrics.summary();
        assert_eq!(summary.total_rounds, 3);
        assert_eq!(summary.completed_rounds, 3);
        assert_eq!(summary.accuracy_val.len(), 3);
        assert!(summary.initial_accuracy_val.is_some());
        assert!(summary.best_accuracy_val().is_some_and(|a| (0.0..=1.0).contains(&a)));
    }

    #[test]
    fn jsonl_observer_writes_initial_and_round_lines() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("rounds.jsonl");
        let mut t = trainer().with_observer(Box::new(JsonlObserver::new(&path).unwrap()));
        t.train(&SCHEDULE).unwrap();
        drop(t);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<RoundObservation> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].round, None);
        assert_eq!(lines[3].round, Some(2));
        assert_eq!(lines[3].status, "completed");
        assert!(lines[3].stats.contains_key("accuracy_test"));
    }

    #[test]
    fn progress_observer_runs_headless() {
        let mut t = trainer().with_observer(Box::new(ProgressObserver::new()));
        assert!(t.train(&SCHEDULE).is_ok());
    }
}
