//! Strategic empirical risk minimisation (SERM) baseline
//!
//! SERM anticipates manipulation but not its causal consequences: each
//! mini-batch is moved by the agents' best response to the current model and
//! scored against the original labels. The loss gradient flows through the
//! response, since the moves themselves depend on the model parameters.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::{SeedableRng, rngs::StdRng};
use tracing::info;

use super::{
    environment::{CausalEnvironment, clean_evaluation},
    fit::{FitConfig, FitOutcome, FitSummary, LabelledSet, Objective, fit_with},
    records::{ChosenStats, ResultsTable, RoundStats, Trajectory},
};
use crate::{
    Error, Result,
    agents::AgentBatch,
    causal::BestResponseSolver,
    model::{Classifier, Loss, SavedClassifier},
    ports::ResultsSource,
};

/// Splits a causal trainer or evaluator works with.
#[derive(Debug, Clone, PartialEq)]
pub struct CausalData {
    pub train: AgentBatch,
    pub val: AgentBatch,
    pub test: AgentBatch,
}

/// Single-shot strategic baseline.
#[derive(Debug)]
pub struct StrategicTrainer {
    model: Box<dyn Classifier>,
    solver: BestResponseSolver,
    train: LabelledSet,
    val: LabelledSet,
    loss: Loss,
    config: FitConfig,
    rng: StdRng,
    summary: Option<FitSummary>,
    results: Option<ResultsTable>,
}

impl StrategicTrainer {
    /// `train` and `val` hold classifier inputs `[causal | effect]`.
    pub fn new(
        model: Box<dyn Classifier>,
        solver: BestResponseSolver,
        train: LabelledSet,
        val: LabelledSet,
        config: FitConfig,
        seed: u64,
    ) -> Self {
        Self {
            model,
            solver,
            train,
            val,
            loss: Loss::Hinge,
            config,
            rng: StdRng::seed_from_u64(seed),
            summary: None,
            results: None,
        }
    }

    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    /// Train with best responses recomputed against the current model for
    /// every mini-batch and for validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NumericalDivergence`] if the loss or the responses
    /// become non-finite.
    pub fn train(&mut self, epochs: usize, early_stop: Option<usize>) -> Result<FitSummary> {
        let config = self
            .config
            .with_epochs(epochs)
            .with_early_stop(early_stop);
        let mut objective = ThroughResponse {
            solver: &self.solver,
            loss: self.loss,
        };
        let outcome = fit_with(
            self.model.as_mut(),
            &self.train,
            &self.val,
            self.loss,
            &config,
            &mut self.rng,
            &mut objective,
        )?;
        match outcome {
            FitOutcome::Converged(summary) => {
                info!(
                    epochs = summary.epochs_run,
                    val_loss = summary.best_val_loss,
                    "strategic training finished"
                );
                self.summary = Some(summary);
                Ok(summary)
            }
            FitOutcome::Diverged { epoch, loss } => Err(Error::NumericalDivergence {
                context: format!("strategic training at epoch {epoch} (loss {loss})"),
            }),
        }
    }

    /// Evaluate the trained model in the causal world: agents respond, their
    /// effect features are re-derived and they are relabelled by ground truth.
    ///
    /// The result is kept for [`ResultsSource::collect_results`].
    pub fn collect_trainer_results(
        &mut self,
        env: &CausalEnvironment,
        data: &CausalData,
    ) -> Result<ResultsTable> {
        let f = self.model.as_ref();
        let val = env.strategic_evaluation(f, &data.val, self.loss)?;
        let test = env.strategic_evaluation(f, &data.test, self.loss)?;
        let clean = clean_evaluation(f, &data.test, self.loss);
        let summary = self.summary.unwrap_or(FitSummary {
            epochs_run: 0,
            train_loss: f64::NAN,
            best_val_loss: f64::NAN,
            stopped_early: false,
        });
        let table = ResultsTable::single(RoundStats {
            n_train: self.train.len(),
            epochs_run: summary.epochs_run,
            train_loss: summary.train_loss,
            loss_val: val.loss,
            accuracy_val: val.accuracy,
            loss_test: test.loss,
            accuracy_test: test.accuracy,
            accuracy_test_clean: clean.accuracy,
            h_accuracy_val: None,
            h_accuracy_test: None,
            mean_cost: Some(env.mean_cost(f, &data.test)?),
            positive_rate: None,
        });
        self.results = Some(table.clone());
        Ok(table)
    }

    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    pub fn snapshot(&self) -> SavedClassifier {
        SavedClassifier::capture(self.model.as_ref())
    }
}

/// Risk after the agents respond to the model being fitted.
struct ThroughResponse<'a> {
    solver: &'a BestResponseSolver,
    loss: Loss,
}

impl Objective for ThroughResponse<'_> {
    fn batch_gradient(
        &mut self,
        model: &dyn Classifier,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<(f64, Array1<f64>)> {
        self.solver.response_loss_gradient(x, y, model, self.loss)
    }

    fn validation_inputs(
        &mut self,
        model: &dyn Classifier,
        x: ArrayView2<f64>,
    ) -> Result<Array2<f64>> {
        self.solver.manipulate(x, Some(model))
    }
}

impl ResultsSource for StrategicTrainer {
    fn collect_results(&self, label: &str) -> Result<(ChosenStats, Trajectory)> {
        let table = self.results.as_ref().ok_or_else(|| Error::InvalidConfiguration {
            message: "strategic trainer has not been evaluated yet".to_string(),
        })?;
        Ok((table.calc_stats(label)?, table.trajectory()))
    }
}
