//! Plain supervised trainer (used to fit the ground-truth model)

use rand::{SeedableRng, rngs::StdRng};
use tracing::info;

use super::fit::{Evaluation, FitConfig, FitOutcome, FitSummary, LabelledSet, fit};
use crate::{
    Error, Result,
    model::{Classifier, Loss},
};

/// Mini-batch Adam training with early stopping on validation loss.
///
/// The best-validation parameters are restored when training ends.
#[derive(Debug)]
pub struct NonStrategicTrainer {
    model: Box<dyn Classifier>,
    train: LabelledSet,
    val: LabelledSet,
    test: LabelledSet,
    loss: Loss,
    config: FitConfig,
    rng: StdRng,
}

impl NonStrategicTrainer {
    pub fn new(
        model: Box<dyn Classifier>,
        train: LabelledSet,
        val: LabelledSet,
        test: LabelledSet,
        loss: Loss,
        config: FitConfig,
        seed: u64,
    ) -> Self {
        Self {
            model,
            train,
            val,
            test,
            loss,
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Train for at most `epochs` epochs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NumericalDivergence`] if the loss becomes non-finite;
    /// the model keeps its pre-training parameters in that case.
    pub fn train(&mut self, epochs: usize, early_stop: Option<usize>) -> Result<FitSummary> {
        let config = self
            .config
            .with_epochs(epochs)
            .with_early_stop(early_stop);
        match fit(
            self.model.as_mut(),
            &self.train,
            &self.val,
            self.loss,
            &config,
            &mut self.rng,
        )? {
            FitOutcome::Converged(summary) => {
                info!(
                    epochs = summary.epochs_run,
                    val_loss = summary.best_val_loss,
                    early = summary.stopped_early,
                    "non-strategic training finished"
                );
                Ok(summary)
            }
            FitOutcome::Diverged { epoch, loss } => Err(Error::NumericalDivergence {
                context: format!("non-strategic training at epoch {epoch} (loss {loss})"),
            }),
        }
    }

    /// Loss and accuracy on the held-out test set.
    pub fn test(&self) -> Evaluation {
        let eval = Evaluation::of(self.model.as_ref(), self.test.x.view(), self.test.y.view(), self.loss);
        info!(loss = eval.loss, accuracy = eval.accuracy, "test evaluation");
        eval
    }

    pub fn validate(&self) -> Evaluation {
        Evaluation::of(self.model.as_ref(), self.val.x.view(), self.val.y.view(), self.loss)
    }

    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    pub fn into_model(self) -> Box<dyn Classifier> {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2};
    use rand::Rng;
    use rand_distr::StandardNormal;

    use super::*;
    use crate::model::{Arch, ModelSpec};

    fn gaussian_set(n: usize, seed: u64) -> LabelledSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let x: Array2<f64> = Array2::from_shape_simple_fn((n, 3), || rng.sample(StandardNormal));
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| if 2.0 * r[0] - r[2] >= 0.0 { 1.0 } else { -1.0 })
            .collect();
        LabelledSet::new(x, y).unwrap()
    }

    #[test]
    fn learns_linear_rule_and_reports_test_accuracy() {
        let model = ModelSpec::new(Arch::Linear, 3, 0).build().unwrap();
        let mut trainer = NonStrategicTrainer::new(
            model,
            gaussian_set(400, 1),
            gaussian_set(100, 2),
            gaussian_set(200, 3),
            Loss::Logistic,
            FitConfig::default().with_lr(0.05),
            0,
        );
        let summary = trainer.train(60, Some(10)).unwrap();
        assert!(summary.epochs_run >= 1);
        assert!(trainer.test().accuracy > 0.9);
        assert!(trainer.validate().loss <= summary.best_val_loss + 1e-12);
    }

    #[test]
    fn training_is_reproducible() {
        let run = || {
            let model = ModelSpec::new(Arch::Mlp { hidden: 4, layers: 1 }, 3, 9).build().unwrap();
            let mut trainer = NonStrategicTrainer::new(
                model,
                gaussian_set(100, 1),
                gaussian_set(50, 2),
                gaussian_set(50, 3),
                Loss::Logistic,
                FitConfig::default(),
                4,
            );
            trainer.train(5, None).unwrap();
            trainer.into_model().parameters()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn divergence_is_an_error() {
        let model = ModelSpec::new(Arch::Linear, 3, 0).build().unwrap();
        let before = model.parameters();
        let mut trainer = NonStrategicTrainer::new(
            model,
            gaussian_set(50, 1),
            gaussian_set(20, 2),
            gaussian_set(20, 3),
            Loss::Logistic,
            FitConfig::default().with_lr(1e308),
            0,
        );
        let err = trainer.train(50, None).unwrap_err();
        assert!(err.is_numerical());
        assert_eq!(trainer.model().parameters(), before);
    }
}
