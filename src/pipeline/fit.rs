//! Mini-batch gradient fitting shared by every trainer

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    Error, Result,
    data::permutation,
    model::{Adam, Classifier, Loss},
    utils::{accuracy, all_finite},
};

/// Optimisation settings for one supervised fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    pub epochs: usize,
    /// Stop after this many epochs without a validation-loss improvement.
    pub early_stop: Option<usize>,
    pub batch_size: usize,
    pub lr: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            early_stop: Some(7),
            batch_size: 64,
            lr: 0.01,
        }
    }
}

impl FitConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for a zero batch size or a
    /// non-positive learning rate.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfiguration {
                message: "batch size must be positive".to_string(),
            });
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::InvalidConfiguration {
                message: format!("learning rate must be positive and finite, got {}", self.lr),
            });
        }
        if self.early_stop == Some(0) {
            return Err(Error::InvalidConfiguration {
                message: "early-stop patience must be at least one epoch".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_early_stop(mut self, early_stop: Option<usize>) -> Self {
        self.early_stop = early_stop;
        self
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }
}

/// Loss and accuracy of a model on one labelled set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
}

impl Evaluation {
    pub fn of(model: &dyn Classifier, x: ArrayView2<f64>, y: ArrayView1<f64>, loss: Loss) -> Self {
        let scores = model.scores(x);
        Self {
            loss: loss.value(scores.view(), y),
            accuracy: accuracy(scores.view(), y),
        }
    }
}

/// Feature rows with `±1` labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledSet {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

impl LabelledSet {
    pub fn new(x: Array2<f64>, y: Array1<f64>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(Error::DimensionMismatch {
                context: "labelled set".to_string(),
                expected: x.nrows(),
                got: y.len(),
            });
        }
        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Summary of a completed fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub epochs_run: usize,
    pub train_loss: f64,
    pub best_val_loss: f64,
    pub stopped_early: bool,
}

/// How a fit ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitOutcome {
    Converged(FitSummary),
    /// Loss or parameters became non-finite; the model is left as it was
    /// before the fit started.
    Diverged { epoch: usize, loss: f64 },
}

/// Gradient of the mean loss with respect to the parameters, evaluated at `x`.
pub(crate) fn loss_gradient(
    model: &dyn Classifier,
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    loss: Loss,
) -> (f64, Array1<f64>) {
    let scores = model.scores(x);
    let value = if all_finite(scores.iter()) {
        loss.value(scores.view(), y)
    } else {
        f64::NAN
    };
    let upstream = loss.score_gradient(scores.view(), y);
    (value, model.parameter_gradients(x, upstream.view()))
}

/// Iterator over shuffled mini-batch index blocks.
pub(crate) fn mini_batches(n: usize, batch_size: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    permutation(n, rng)
        .chunks(batch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}

/// What a fit minimises on each mini-batch, and the inputs validation loss is
/// measured on.
pub(crate) trait Objective {
    /// Mean loss of `model` on the batch and its parameter gradient.
    fn batch_gradient(
        &mut self,
        model: &dyn Classifier,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<(f64, Array1<f64>)>;

    fn validation_inputs(&mut self, model: &dyn Classifier, x: ArrayView2<f64>)
    -> Result<Array2<f64>>;
}

/// Ordinary empirical risk on the given inputs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Supervised(pub Loss);

impl Objective for Supervised {
    fn batch_gradient(
        &mut self,
        model: &dyn Classifier,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<(f64, Array1<f64>)> {
        Ok(loss_gradient(model, x, y, self.0))
    }

    fn validation_inputs(
        &mut self,
        _model: &dyn Classifier,
        x: ArrayView2<f64>,
    ) -> Result<Array2<f64>> {
        Ok(x.to_owned())
    }
}

/// Fit `model` in place with Adam, mini-batches and optional early stopping
/// on validation loss. The best validation parameters are restored at the
/// end. Parameters are not reset first, so repeated fits warm-start.
pub(crate) fn fit_with<O: Objective>(
    model: &mut dyn Classifier,
    train: &LabelledSet,
    val: &LabelledSet,
    loss: Loss,
    config: &FitConfig,
    rng: &mut StdRng,
    objective: &mut O,
) -> Result<FitOutcome> {
    config.validate()?;
    let initial = model.parameters();
    let mut optimizer = Adam::new(config.lr, model.num_parameters());
    let mut best_params = initial.clone();
    let mut best_val = f64::INFINITY;
    let mut since_best = 0;
    let mut summary = FitSummary {
        epochs_run: 0,
        train_loss: f64::NAN,
        best_val_loss: f64::INFINITY,
        stopped_early: false,
    };

    for epoch in 0..config.epochs {
        let mut total = 0.0;
        for rows in mini_batches(train.len(), config.batch_size, rng) {
            let xb = train.x.select(Axis(0), &rows);
            let yb = train.y.select(Axis(0), &rows);
            let (value, grads) = objective.batch_gradient(&*model, xb.view(), yb.view())?;
            if !value.is_finite() || !all_finite(grads.iter()) {
                model.set_parameters(initial.view())?;
                return Ok(FitOutcome::Diverged { epoch, loss: value });
            }
            total += value * rows.len() as f64;
            let mut params = model.parameters();
            optimizer.step(&mut params, grads.view());
            if !all_finite(params.iter()) {
                model.set_parameters(initial.view())?;
                return Ok(FitOutcome::Diverged { epoch, loss: value });
            }
            model.set_parameters(params.view())?;
        }
        summary.epochs_run = epoch + 1;
        summary.train_loss = total / train.len().max(1) as f64;

        let val_x = objective.validation_inputs(&*model, val.x.view())?;
        let val_loss = Evaluation::of(&*model, val_x.view(), val.y.view(), loss).loss;
        if !val_loss.is_finite() {
            model.set_parameters(initial.view())?;
            return Ok(FitOutcome::Diverged {
                epoch,
                loss: val_loss,
            });
        }
        trace!(epoch, train_loss = summary.train_loss, val_loss, "epoch finished");

        if val_loss < best_val {
            best_val = val_loss;
            best_params = model.parameters();
            since_best = 0;
        } else {
            since_best += 1;
            if config.early_stop.is_some_and(|patience| since_best >= patience) {
                debug!(epoch, best_val, "early stopping");
                summary.stopped_early = true;
                break;
            }
        }
    }

    if summary.epochs_run > 0 {
        model.set_parameters(best_params.view())?;
    }
    summary.best_val_loss = best_val;
    Ok(FitOutcome::Converged(summary))
}

/// Plain supervised fit.
pub(crate) fn fit(
    model: &mut dyn Classifier,
    train: &LabelledSet,
    val: &LabelledSet,
    loss: Loss,
    config: &FitConfig,
    rng: &mut StdRng,
) -> Result<FitOutcome> {
    fit_with(model, train, val, loss, config, rng, &mut Supervised(loss))
}
