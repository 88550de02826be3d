//! Ground-truth labelling: a causal base score plus a spurious gate on one
//! effect feature

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip, concatenate};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    agents::AgentBatch,
    model::{Classifier, SavedClassifier},
    types::Label,
    utils::sigmoid,
};

/// Smoothed threshold on a single effect feature (the "tricky" feature).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrickyFeature {
    /// Index into the effect block.
    pub index: usize,
    pub threshold: f64,
    /// Steepness of the sigmoid gate.
    pub slope: f64,
    /// Gate opens above the threshold when `true`, below it when `false`.
    pub greater_than: bool,
}

impl Default for TrickyFeature {
    fn default() -> Self {
        Self {
            index: 0,
            threshold: -0.05,
            slope: 20.0,
            greater_than: false,
        }
    }
}

impl TrickyFeature {
    /// Gate activation in `[0, 1]`.
    pub fn gate(&self, value: f64) -> f64 {
        let margin = if self.greater_than {
            value - self.threshold
        } else {
            self.threshold - value
        };
        sigmoid(self.slope * margin)
    }
}

/// True outcome model.
///
/// The probability of a positive outcome is `σ(h*(causal, latent)) · (1 − gate(effect_k))`:
/// the base model carries the causal relationship, and the gate pushes the
/// outcome negative whenever the tricky effect feature crosses its threshold.
#[derive(Debug)]
pub struct GroundTruthLabeler {
    base: Box<dyn Classifier>,
    tricky: TrickyFeature,
}

impl Clone for GroundTruthLabeler {
    fn clone(&self) -> Self {
        Self {
            base: self.base.boxed_clone(),
            tricky: self.tricky,
        }
    }
}

impl GroundTruthLabeler {
    pub fn new(base: Box<dyn Classifier>, tricky: TrickyFeature) -> Self {
        Self { base, tricky }
    }

    pub fn tricky(&self) -> &TrickyFeature {
        &self.tricky
    }

    pub fn base(&self) -> &dyn Classifier {
        self.base.as_ref()
    }

    /// Frozen copy of the base scoring model.
    pub fn saved_base(&self) -> SavedClassifier {
        SavedClassifier::capture(self.base.as_ref())
    }

    /// Probability of a positive outcome for each row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when the blocks disagree with the
    /// base model width, and [`Error::InvalidConfiguration`] when the tricky
    /// index falls outside the effect block.
    pub fn probabilities(
        &self,
        causal: ArrayView2<f64>,
        effect: ArrayView2<f64>,
        latent: ArrayView2<f64>,
    ) -> Result<Array1<f64>> {
        let width = causal.ncols() + latent.ncols();
        if width != self.base.input_dim() {
            return Err(Error::DimensionMismatch {
                context: "ground-truth base model input".to_string(),
                expected: self.base.input_dim(),
                got: width,
            });
        }
        if self.tricky.index >= effect.ncols() {
            return Err(Error::InvalidConfiguration {
                message: format!(
                    "tricky feature index {} is outside the effect block of width {}",
                    self.tricky.index,
                    effect.ncols()
                ),
            });
        }

        let inputs = concatenate![Axis(1), causal, latent];
        let base = self.base.scores(inputs.view());
        let tricky = effect.column(self.tricky.index);
        Ok(Zip::from(&base)
            .and(&tricky)
            .map_collect(|&s, &e| sigmoid(s) * (1.0 - self.tricky.gate(e))))
    }

    /// `±1` labels for each row.
    pub fn label_batch(
        &self,
        causal: ArrayView2<f64>,
        effect: ArrayView2<f64>,
        latent: ArrayView2<f64>,
    ) -> Result<Array1<f64>> {
        Ok(self
            .probabilities(causal, effect, latent)?
            .mapv(|p| if p > 0.5 { 1.0 } else { -1.0 }))
    }

    /// Label a single agent.
    pub fn label(&self, causal: &[f64], effect: &[f64], latent: &[f64]) -> Result<Label> {
        let labels = self.label_batch(
            single_row(causal)?.view(),
            single_row(effect)?.view(),
            single_row(latent)?.view(),
        )?;
        Ok(Label::from_score(labels[0]))
    }

    /// Labels for the agents of `batch` as they currently stand.
    pub fn relabel(&self, batch: &AgentBatch) -> Result<Array1<f64>> {
        self.label_batch(batch.causal(), batch.effect(), batch.latent())
    }
}

fn single_row(values: &[f64]) -> Result<Array2<f64>> {
    Array2::from_shape_vec((1, values.len()), values.to_vec()).map_err(|e| {
        Error::InvalidConfiguration {
            message: format!("invalid agent row: {e}"),
        }
    })
}
