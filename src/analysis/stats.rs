//! Aggregate statistics over sweep artifacts

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::experiment::SweepArtifact;

/// Mean, sample standard deviation and count of a set of accuracies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub mean: f64,
    /// Zero when fewer than two values are available.
    pub std_dev: f64,
    pub count: usize,
}

impl AccuracySummary {
    /// `None` for an empty slice.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let std_dev = if values.len() > 1 {
            values.iter().std_dev()
        } else {
            0.0
        };
        Some(Self {
            mean: values.iter().mean(),
            std_dev,
            count: values.len(),
        })
    }
}

/// CSERM against SERM for one number of dropped features, pooled over seeds
/// and partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropSummary {
    pub n_drops: usize,
    /// Number of artifacts (runs) pooled.
    pub runs: usize,
    pub cserm: Option<AccuracySummary>,
    pub serm: Option<AccuracySummary>,
}

impl DropSummary {
    /// Mean CSERM accuracy minus mean SERM accuracy.
    pub fn mean_gap(&self) -> Option<f64> {
        Some(self.cserm?.mean - self.serm?.mean)
    }
}

/// Group artifacts by `n_drops`, in ascending order.
pub fn summarize(artifacts: &[SweepArtifact]) -> Vec<DropSummary> {
    let mut groups: BTreeMap<usize, (usize, Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for artifact in artifacts {
        let (runs, cserm, serm) = groups.entry(artifact.n_drops).or_default();
        *runs += 1;
        cserm.extend(&artifact.cserm_test_accs);
        serm.extend(&artifact.serm_test_accs);
    }
    groups
        .into_iter()
        .map(|(n_drops, (runs, cserm, serm))| DropSummary {
            n_drops,
            runs,
            cserm: AccuracySummary::of(&cserm),
            serm: AccuracySummary::of(&serm),
        })
        .collect()
}
