//! Core value types: labels, feature partitions and the layout metadata
//! carried alongside every feature matrix.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A binary outcome in `{-1, +1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Negative,
    Positive,
}

impl Label {
    /// Label from a real-valued score (`>= 0` is positive).
    pub fn from_score(score: f64) -> Self {
        if score >= 0.0 {
            Label::Positive
        } else {
            Label::Negative
        }
    }

    /// Parse a stored label value. Accepts `±1` and `0/1` encodings.
    pub fn from_value(value: f64) -> Result<Self> {
        if value == 1.0 {
            Ok(Label::Positive)
        } else if value == -1.0 || value == 0.0 {
            Ok(Label::Negative)
        } else {
            Err(Error::InvalidDataset {
                message: format!("label value {value} is not one of -1, 0, 1"),
            })
        }
    }

    /// Signed value (`-1.0` or `1.0`).
    pub fn value(self) -> f64 {
        match self {
            Label::Negative => -1.0,
            Label::Positive => 1.0,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Negative => write!(f, "-1"),
            Label::Positive => write!(f, "+1"),
        }
    }
}

/// Disjoint assignment of dataset columns to the causal, effect and
/// unobserved blocks.
///
/// Invariant: `causal ∪ effect ∪ unobserved == 0..total_dim`, each index
/// appearing exactly once. `causal` and `effect` are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturePartition {
    causal: Vec<usize>,
    effect: Vec<usize>,
    unobserved: Vec<usize>,
    total_dim: usize,
}

impl FeaturePartition {
    /// Create a validated partition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPartition`] when the sets overlap, leave a
    /// column uncovered, reference a column outside `0..total_dim`, or when
    /// the causal or effect block is empty.
    pub fn new(
        causal: Vec<usize>,
        effect: Vec<usize>,
        unobserved: Vec<usize>,
        total_dim: usize,
    ) -> Result<Self> {
        if causal.is_empty() {
            return Err(Error::InvalidPartition {
                message: "causal block is empty".to_string(),
            });
        }
        if effect.is_empty() {
            return Err(Error::InvalidPartition {
                message: "effect block is empty".to_string(),
            });
        }

        let mut seen = BTreeSet::new();
        for (block, indices) in [
            ("causal", &causal),
            ("effect", &effect),
            ("unobserved", &unobserved),
        ] {
            for &idx in indices {
                if idx >= total_dim {
                    return Err(Error::InvalidPartition {
                        message: format!(
                            "{block} index {idx} is outside 0..{total_dim}"
                        ),
                    });
                }
                if !seen.insert(idx) {
                    return Err(Error::InvalidPartition {
                        message: format!("feature index {idx} appears more than once"),
                    });
                }
            }
        }
        if seen.len() != total_dim {
            let missing: Vec<usize> = (0..total_dim).filter(|i| !seen.contains(i)).collect();
            return Err(Error::InvalidPartition {
                message: format!("feature indices {missing:?} are not assigned to any block"),
            });
        }

        Ok(Self {
            causal,
            effect,
            unobserved,
            total_dim,
        })
    }

    /// Build a partition from causal and effect lists; every remaining column
    /// becomes unobserved, in ascending order.
    pub fn with_remaining_unobserved(
        causal: Vec<usize>,
        effect: Vec<usize>,
        total_dim: usize,
    ) -> Result<Self> {
        let taken: BTreeSet<usize> = causal.iter().chain(effect.iter()).copied().collect();
        let unobserved = (0..total_dim).filter(|i| !taken.contains(i)).collect();
        Self::new(causal, effect, unobserved, total_dim)
    }

    pub fn causal(&self) -> &[usize] {
        &self.causal
    }

    pub fn effect(&self) -> &[usize] {
        &self.effect
    }

    pub fn unobserved(&self) -> &[usize] {
        &self.unobserved
    }

    pub fn total_dim(&self) -> usize {
        self.total_dim
    }

    pub fn causal_dim(&self) -> usize {
        self.causal.len()
    }

    pub fn effect_dim(&self) -> usize {
        self.effect.len()
    }

    /// Number of latent factors: the raw parents of the effect features
    /// followed by the unobserved columns.
    pub fn latent_dim(&self) -> usize {
        self.effect.len() + self.unobserved.len()
    }

    /// Input dimensionality of the deployed classifier (`causal | effect`).
    pub fn classifier_dim(&self) -> usize {
        self.causal.len() + self.effect.len()
    }

    /// Column order the dataset loader must produce: `causal ++ effect ++ unobserved`.
    pub fn column_order(&self) -> Vec<usize> {
        self.causal
            .iter()
            .chain(self.effect.iter())
            .chain(self.unobserved.iter())
            .copied()
            .collect()
    }

    /// Layout metadata for agent matrices built from this partition.
    pub fn layout(&self) -> FeatureLayout {
        FeatureLayout {
            causal: self.causal.clone(),
            effect: self.effect.clone(),
            latent: self
                .effect
                .iter()
                .chain(self.unobserved.iter())
                .copied()
                .collect(),
        }
    }
}

impl fmt::Display for FeaturePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "causal={:?} effect={:?} unobserved={:?}",
            self.causal, self.effect, self.unobserved
        )
    }
}

/// Dataset-column metadata for each position of the `[causal | effect | latent]`
/// blocks of an agent matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    /// Dataset column of each causal position.
    pub causal: Vec<usize>,
    /// Dataset column whose raw value parents each effect position.
    pub effect: Vec<usize>,
    /// Dataset column of each latent position (effect parents first).
    pub latent: Vec<usize>,
}

impl FeatureLayout {
    pub fn causal_dim(&self) -> usize {
        self.causal.len()
    }

    pub fn effect_dim(&self) -> usize {
        self.effect.len()
    }

    pub fn latent_dim(&self) -> usize {
        self.latent.len()
    }

    /// Columns seen by the deployed classifier, in input order.
    pub fn classifier_columns(&self) -> Vec<usize> {
        self.causal.iter().chain(self.effect.iter()).copied().collect()
    }

    /// Columns seen by the ground-truth scoring model, in input order.
    pub fn labeler_columns(&self) -> Vec<usize> {
        self.causal.iter().chain(self.latent.iter()).copied().collect()
    }
}
