//! Margin losses over `±1` labels

use ndarray::{Array1, ArrayView1, Zip};
use serde::{Deserialize, Serialize};

use crate::utils::{sigmoid, softplus};

/// Loss used to fit a scoring model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    /// `mean(max(0, 1 - y·s))`, used for the deployed classifier.
    Hinge,
    /// `mean(ln(1 + e^{-y·s}))`, used for outcome models.
    Logistic,
}

impl Loss {
    /// Mean loss. Empty inputs give `0.0`.
    pub fn value(self, scores: ArrayView1<f64>, labels: ArrayView1<f64>) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        let total: f64 = Zip::from(&scores)
            .and(&labels)
            .fold(0.0, |acc, &s, &y| acc + self.pointwise(s, y));
        total / scores.len() as f64
    }

    /// Gradient of the mean loss with respect to each score.
    pub fn score_gradient(self, scores: ArrayView1<f64>, labels: ArrayView1<f64>) -> Array1<f64> {
        let n = scores.len().max(1) as f64;
        Zip::from(&scores)
            .and(&labels)
            .map_collect(|&s, &y| match self {
                Loss::Hinge => {
                    if 1.0 - y * s > 0.0 {
                        -y / n
                    } else {
                        0.0
                    }
                }
                Loss::Logistic => -y * sigmoid(-y * s) / n,
            })
    }

    fn pointwise(self, s: f64, y: f64) -> f64 {
        match self {
            Loss::Hinge => (1.0 - y * s).max(0.0),
            Loss::Logistic => softplus(-y * s),
        }
    }
}
