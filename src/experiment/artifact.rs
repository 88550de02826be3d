//! Persisted result of one sensitivity run

use serde::{Deserialize, Serialize};

/// Chosen-model test accuracies, one entry per evaluated partition.
///
/// `cserm_test_accs[i]` and `serm_test_accs[i]` belong to the same partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepArtifact {
    pub cserm_test_accs: Vec<f64>,
    pub serm_test_accs: Vec<f64>,
    #[serde(default)]
    pub n_drops: usize,
    #[serde(default)]
    pub seed: u64,
}

impl SweepArtifact {
    pub fn new(n_drops: usize, seed: u64) -> Self {
        Self {
            n_drops,
            seed,
            ..Self::default()
        }
    }

    pub fn push(&mut self, cserm: f64, serm: f64) {
        self.cserm_test_accs.push(cserm);
        self.serm_test_accs.push(serm);
    }

    pub fn len(&self) -> usize {
        self.cserm_test_accs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cserm_test_accs.is_empty()
    }

    /// File name without extension for a `(n_drops, seed)` run.
    pub fn file_stem(n_drops: usize, seed: u64) -> String {
        format!("sensitivity_exp_n_drops={n_drops}_seed={seed}")
    }
}
