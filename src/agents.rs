//! Agent records and their vectorised batch form

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate, s};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    types::{FeatureLayout, Label},
};

/// One labelled agent: `[causal | effect | latent]` plus its true outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub causal: Vec<f64>,
    pub effect: Vec<f64>,
    pub latent: Vec<f64>,
    pub label: Label,
}

/// A batch of agents stored block-wise, with the column metadata that
/// describes every position.
///
/// Batches are values: manipulation and relabelling build new batches,
/// leaving the source intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBatch {
    layout: FeatureLayout,
    causal: Array2<f64>,
    effect: Array2<f64>,
    latent: Array2<f64>,
    labels: Array1<f64>,
}

impl AgentBatch {
    /// Assemble a batch, checking every block against the layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] on inconsistent row counts or block widths.
    pub fn new(
        layout: FeatureLayout,
        causal: Array2<f64>,
        effect: Array2<f64>,
        latent: Array2<f64>,
        labels: Array1<f64>,
    ) -> Result<Self> {
        let rows = causal.nrows();
        for (context, got) in [
            ("effect rows", effect.nrows()),
            ("latent rows", latent.nrows()),
            ("label count", labels.len()),
        ] {
            if got != rows {
                return Err(Error::DimensionMismatch {
                    context: context.to_string(),
                    expected: rows,
                    got,
                });
            }
        }
        for (context, expected, got) in [
            ("causal width", layout.causal_dim(), causal.ncols()),
            ("effect width", layout.effect_dim(), effect.ncols()),
            ("latent width", layout.latent_dim(), latent.ncols()),
        ] {
            if expected != got {
                return Err(Error::DimensionMismatch {
                    context: context.to_string(),
                    expected,
                    got,
                });
            }
        }
        Ok(Self {
            layout,
            causal,
            effect,
            latent,
            labels,
        })
    }

    /// An empty batch with the given layout.
    pub fn empty(layout: FeatureLayout) -> Self {
        Self {
            causal: Array2::zeros((0, layout.causal_dim())),
            effect: Array2::zeros((0, layout.effect_dim())),
            latent: Array2::zeros((0, layout.latent_dim())),
            labels: Array1::zeros(0),
            layout,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn causal(&self) -> ArrayView2<'_, f64> {
        self.causal.view()
    }

    pub fn effect(&self) -> ArrayView2<'_, f64> {
        self.effect.view()
    }

    pub fn latent(&self) -> ArrayView2<'_, f64> {
        self.latent.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, f64> {
        self.labels.view()
    }

    /// Classifier inputs: `[causal | effect]`.
    pub fn observed(&self) -> Array2<f64> {
        concatenate![Axis(1), self.causal, self.effect]
    }

    /// Ground-truth scoring inputs: `[causal | latent]`.
    pub fn causal_and_latent(&self) -> Array2<f64> {
        concatenate![Axis(1), self.causal, self.latent]
    }

    /// The same agents with a different causal block and re-derived effect
    /// block and labels.
    pub fn with_manipulation(
        &self,
        causal: Array2<f64>,
        effect: Array2<f64>,
        labels: Array1<f64>,
    ) -> Result<Self> {
        Self::new(
            self.layout.clone(),
            causal,
            effect,
            self.latent.clone(),
            labels,
        )
    }

    /// Rows `start..end` as a new batch.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        Self {
            layout: self.layout.clone(),
            causal: self.causal.slice(s![start..end, ..]).to_owned(),
            effect: self.effect.slice(s![start..end, ..]).to_owned(),
            latent: self.latent.slice(s![start..end, ..]).to_owned(),
            labels: self.labels.slice(s![start..end]).to_owned(),
        }
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            layout: self.layout.clone(),
            causal: self.causal.select(Axis(0), indices),
            effect: self.effect.select(Axis(0), indices),
            latent: self.latent.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }

    /// Append `other` below this batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the layouts differ.
    pub fn append(&mut self, other: &AgentBatch) -> Result<()> {
        if self.layout != other.layout {
            return Err(Error::InvalidConfiguration {
                message: "cannot append agent batches with different feature layouts".to_string(),
            });
        }
        for (dst, src) in [
            (&mut self.causal, &other.causal),
            (&mut self.effect, &other.effect),
            (&mut self.latent, &other.latent),
        ] {
            dst.append(Axis(0), src.view())
                .map_err(|e| Error::InvalidConfiguration {
                    message: format!("failed to append agent rows: {e}"),
                })?;
        }
        self.labels
            .append(Axis(0), other.labels.view())
            .map_err(|e| Error::InvalidConfiguration {
                message: format!("failed to append labels: {e}"),
            })?;
        Ok(())
    }

    /// Drop every row past `len`.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len() {
            return;
        }
        *self = self.slice(0, len);
    }

    /// Number of positive labels.
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&y| y > 0.0).count()
    }

    /// The agent at `row`, if any.
    pub fn agent(&self, row: usize) -> Option<Agent> {
        if row >= self.len() {
            return None;
        }
        Some(Agent {
            causal: self.causal.row(row).to_vec(),
            effect: self.effect.row(row).to_vec(),
            latent: self.latent.row(row).to_vec(),
            label: Label::from_score(self.labels[row]),
        })
    }
}
