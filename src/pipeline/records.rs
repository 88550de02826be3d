//! Per-round records and the statistics tables built from them

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, agents::AgentBatch, model::SavedClassifier};

/// One row of named statistics.
pub type StatsMap = BTreeMap<String, f64>;

/// Statistics for every completed round, in round order.
pub type Trajectory = Vec<StatsMap>;

/// Evaluation of one deployed classifier.
///
/// The `accuracy_*`/`loss_*` fields on validation and test are strategic:
/// measured after the agents of a fresh copy of the set best-respond to the
/// classifier and are relabelled by ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStats {
    /// Rows in the training set after this round.
    pub n_train: usize,
    pub epochs_run: usize,
    pub train_loss: f64,
    pub loss_val: f64,
    pub accuracy_val: f64,
    pub loss_test: f64,
    pub accuracy_test: f64,
    /// Accuracy on the unmanipulated test set.
    pub accuracy_test_clean: f64,
    pub h_accuracy_val: Option<f64>,
    pub h_accuracy_test: Option<f64>,
    /// Mean movement cost paid by this round's agents.
    pub mean_cost: Option<f64>,
    /// Fraction of this round's agents labelled positive after responding.
    pub positive_rate: Option<f64>,
}

impl RoundStats {
    /// Flatten into a name → value map; absent optional values are skipped.
    pub fn to_map(&self) -> StatsMap {
        let mut map = StatsMap::new();
        map.insert("n_train".into(), self.n_train as f64);
        map.insert("epochs_run".into(), self.epochs_run as f64);
        map.insert("train_loss".into(), self.train_loss);
        map.insert("loss_val".into(), self.loss_val);
        map.insert("accuracy_val".into(), self.accuracy_val);
        map.insert("loss_test".into(), self.loss_test);
        map.insert("accuracy_test".into(), self.accuracy_test);
        map.insert("accuracy_test_clean".into(), self.accuracy_test_clean);
        for (key, value) in [
            ("h_accuracy_val", self.h_accuracy_val),
            ("h_accuracy_test", self.h_accuracy_test),
            ("mean_cost", self.mean_cost),
            ("positive_rate", self.positive_rate),
        ] {
            if let Some(value) = value {
                map.insert(key.into(), value);
            }
        }
        map
    }
}

/// Outcome of a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoundStatus {
    Completed,
    /// Retraining produced a non-finite loss; the round's rows were rolled back.
    Diverged { loss: f64 },
}

/// Everything recorded about one round of the retraining loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: usize,
    /// The drawn agents after responding and relabelling.
    pub batch: AgentBatch,
    /// The classifier the agents responded to.
    pub deployed: SavedClassifier,
    /// The classifier after retraining (the candidate for selection).
    pub retrained: Option<SavedClassifier>,
    pub stats: Option<RoundStats>,
    pub status: RoundStatus,
}

impl RoundRecord {
    pub fn is_completed(&self) -> bool {
        self.status == RoundStatus::Completed
    }

    /// Trajectory row: the statistics plus the round index.
    pub fn stats_map(&self) -> Option<StatsMap> {
        self.stats.as_ref().map(|stats| {
            let mut map = stats.to_map();
            map.insert("round".into(), self.round as f64);
            map
        })
    }
}

/// Statistics of the selected model, labelled with the method name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChosenStats {
    pub label: String,
    /// `None` when the chosen model is the clean-seed fit.
    pub chosen_round: Option<usize>,
    #[serde(flatten)]
    pub stats: StatsMap,
}

impl ChosenStats {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.stats.get(key).copied()
    }

    /// Test accuracy of the chosen model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the statistic is missing.
    pub fn accuracy_test(&self) -> Result<f64> {
        self.get("accuracy_test")
            .ok_or_else(|| Error::InvalidConfiguration {
                message: format!("{} results carry no accuracy_test", self.label),
            })
    }
}

/// Table of evaluated models with one of them marked as chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub rows: Vec<RoundStats>,
    pub chosen: usize,
}

impl ResultsTable {
    /// A single evaluated model.
    pub fn single(stats: RoundStats) -> Self {
        Self {
            rows: vec![stats],
            chosen: 0,
        }
    }

    /// Chosen statistics under `label`.
    pub fn calc_stats(&self, label: &str) -> Result<ChosenStats> {
        let row = self.rows.get(self.chosen).ok_or_else(|| Error::InvalidConfiguration {
            message: format!("results table has no row {}", self.chosen),
        })?;
        Ok(ChosenStats {
            label: label.to_string(),
            chosen_round: Some(self.chosen),
            stats: row.to_map(),
        })
    }

    pub fn trajectory(&self) -> Trajectory {
        self.rows.iter().map(RoundStats::to_map).collect()
    }
}

/// Index of the best validation accuracy; the earliest wins ties.
pub fn select_best<'a, I>(accuracies: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, &acc) in accuracies.into_iter().enumerate() {
        match best {
            Some((_, best_acc)) if acc <= best_acc => {}
            _ => best = Some((i, acc)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(accuracy_val: f64) -> RoundStats {
        RoundStats {
            n_train: 10,
            epochs_run: 3,
            train_loss: 0.4,
            loss_val: 0.5,
            accuracy_val,
            loss_test: 0.6,
            accuracy_test: 0.7,
            accuracy_test_clean: 0.75,
            h_accuracy_val: Some(0.8),
            h_accuracy_test: None,
            mean_cost: None,
            positive_rate: None,
        }
    }

    #[test]
    fn ties_go_to_earliest() {
        assert_eq!(select_best(&[0.5, 0.9, 0.9, 0.1]), Some(1));
        assert_eq!(select_best(&[0.3]), Some(0));
        assert_eq!(select_best(&[] as &[f64]), None);
    }

    #[test]
    fn stats_map_skips_missing_optionals() {
        let map = stats(0.6).to_map();
        assert_eq!(map["accuracy_val"], 0.6);
        assert_eq!(map["h_accuracy_val"], 0.8);
        assert!(!map.contains_key("h_accuracy_test"));
    }

    #[test]
    fn chosen_stats_flatten_into_json() {
        let chosen = ResultsTable::single(stats(0.6)).calc_stats("SERM").unwrap();
        let json = serde_json::to_value(&chosen).unwrap();
        assert_eq!(json["label"], "SERM");
        assert_eq!(json["accuracy_test"], 0.7);
        assert_eq!(json["chosen_round"], 0);
        assert_eq!(chosen.accuracy_test().unwrap(), 0.7);
    }
}
