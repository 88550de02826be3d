//! Iterative causal-strategic retraining (CSERM)
//!
//! The deployer repeatedly publishes a classifier, a fresh batch of agents
//! best-responds to it, the structural mechanism and ground truth react, and
//! the manipulated agents are added to the training set before the classifier
//! is retrained. The round with the best strategic validation accuracy wins.

use ndarray::Array1;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    environment::{CausalEnvironment, clean_evaluation, labelled_observed},
    fit::{Evaluation, FitConfig, FitOutcome, FitSummary, fit},
    records::{
        ChosenStats, RoundRecord, RoundStats, RoundStatus, Trajectory, select_best,
    },
    strategic::CausalData,
};
use crate::{
    Error, Result,
    agents::AgentBatch,
    causal::BestResponseSolver,
    distribution::SequentialPopulationDistribution,
    model::{Arch, Classifier, ClassifierSnapshot, Loss, ModelSpec, SavedClassifier},
    ports::{ResultsSource, RoundObserver},
};

/// Trainer-level hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Architecture of the deployed classifier `f`.
    pub f_arch: Arch,
    /// Architecture of the auxiliary outcome model `h`; `None` disables it.
    pub h_arch: Option<Arch>,
    /// Seeds model initialisation and mini-batch shuffling.
    pub seed: u64,
    pub fit: FitConfig,
    pub lr_h: f64,
    pub loss_f: Loss,
    pub loss_h: Loss,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            f_arch: Arch::Linear,
            h_arch: Some(Arch::Mlp {
                hidden: 10,
                layers: 3,
            }),
            seed: 0,
            fit: FitConfig::default(),
            lr_h: 0.01,
            loss_f: Loss::Hinge,
            loss_h: Loss::Logistic,
        }
    }
}

impl TrainerConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_fit(mut self, fit: FitConfig) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_h_arch(mut self, h_arch: Option<Arch>) -> Self {
        self.h_arch = h_arch;
        self
    }

    fn h_fit(&self) -> FitConfig {
        self.fit.with_lr(self.lr_h)
    }
}

/// How many rounds to run and how many agents arrive per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSchedule {
    pub time_steps: usize,
    pub n_samples_per_round: usize,
}

impl Default for RoundSchedule {
    fn default() -> Self {
        Self {
            time_steps: 10,
            n_samples_per_round: 200,
        }
    }
}

/// Lifecycle of the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainerPhase {
    Initialized,
    RoundActive { round: usize },
    Finalized,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerResults {
    /// Statistics of the clean-seed fit.
    pub initial: RoundStats,
    pub initial_model: SavedClassifier,
    pub records: Vec<RoundRecord>,
    /// `None` when no round completed and the clean-seed fit is chosen.
    pub chosen_round: Option<usize>,
    pub chosen_model: SavedClassifier,
}

impl TrainerResults {
    pub fn chosen_stats(&self) -> &RoundStats {
        self.chosen_round
            .and_then(|round| self.records.iter().find(|r| r.round == round))
            .and_then(|r| r.stats.as_ref())
            .unwrap_or(&self.initial)
    }

    pub fn completed(&self) -> impl Iterator<Item = &RoundRecord> {
        self.records.iter().filter(|r| r.is_completed())
    }
}

/// Iterative causal-strategic trainer.
///
/// Owns the live classifier, the cumulative training set and the population
/// pool exclusively. Responding agents only ever see a
/// [`ClassifierSnapshot`] of the classifier.
pub struct IterativeCausalStrategicTrainer {
    config: TrainerConfig,
    env: CausalEnvironment,
    distribution: SequentialPopulationDistribution,
    val: AgentBatch,
    test: AgentBatch,
    training_set: AgentBatch,
    f: Box<dyn Classifier>,
    h: Option<Box<dyn Classifier>>,
    phase: TrainerPhase,
    records: Vec<RoundRecord>,
    results: Option<TrainerResults>,
    observers: Vec<Box<dyn RoundObserver>>,
    rng: StdRng,
}

impl IterativeCausalStrategicTrainer {
    /// `data.train` is the clean seed set; the pool feeds the rounds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the sets disagree on their feature
    /// layout, if the solver or mechanism widths do not match it, or if the
    /// optimisation settings are invalid.
    pub fn new(
        config: TrainerConfig,
        env: CausalEnvironment,
        distribution: SequentialPopulationDistribution,
        data: CausalData,
    ) -> Result<Self> {
        config.fit.validate()?;
        config.h_fit().validate()?;
        let layout = data.train.layout().clone();
        if data.val.layout() != &layout || data.test.layout() != &layout {
            return Err(Error::InvalidConfiguration {
                message: "clean, validation and test sets use different feature layouts".to_string(),
            });
        }
        if env.solver.causal_dim() != layout.causal_dim() {
            return Err(Error::DimensionMismatch {
                context: "cost model over the causal block".to_string(),
                expected: layout.causal_dim(),
                got: env.solver.causal_dim(),
            });
        }
        if env.mechanism.effect_dim() != layout.effect_dim() {
            return Err(Error::DimensionMismatch {
                context: "structural mechanism over the effect block".to_string(),
                expected: layout.effect_dim(),
                got: env.mechanism.effect_dim(),
            });
        }

        let input_dim = layout.causal_dim() + layout.effect_dim();
        let f = ModelSpec::new(config.f_arch, input_dim, config.seed).build()?;
        let h = config
            .h_arch
            .map(|arch| ModelSpec::new(arch, input_dim, config.seed).build())
            .transpose()?;

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            env,
            distribution,
            val: data.val,
            test: data.test,
            training_set: data.train,
            f,
            h,
            phase: TrainerPhase::Initialized,
            records: Vec::new(),
            results: None,
            observers: Vec::new(),
        })
    }

    /// Add an observer to the trainer
    pub fn with_observer(mut self, observer: Box<dyn RoundObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    pub fn training_set(&self) -> &AgentBatch {
        &self.training_set
    }

    pub fn records(&self) -> &[RoundRecord] {
        &self.records
    }

    pub fn results(&self) -> Option<&TrainerResults> {
        self.results.as_ref()
    }

    pub fn distribution(&self) -> &SequentialPopulationDistribution {
        &self.distribution
    }

    /// The live classifier.
    pub fn classifier(&self) -> &dyn Classifier {
        self.f.as_ref()
    }

    /// Run the whole loop: clean-seed fit, `schedule.time_steps` rounds, then
    /// model selection.
    ///
    /// # Errors
    ///
    /// * [`Error::InsufficientPool`] before anything runs if the pool cannot
    ///   feed every round.
    /// * [`Error::TrainingDiverged`] if a round's responses, retraining or
    ///   evaluation go non-finite; that round is recorded as diverged, its
    ///   rows are removed and both models are restored.
    /// * [`Error::InvalidConfiguration`] if the trainer already ran.
    pub fn train(&mut self, schedule: &RoundSchedule) -> Result<&TrainerResults> {
        if self.phase != TrainerPhase::Initialized {
            return Err(Error::InvalidConfiguration {
                message: format!("trainer cannot start from phase {:?}", self.phase),
            });
        }
        self.distribution
            .ensure_capacity(schedule.time_steps, schedule.n_samples_per_round)?;
        info!(
            rounds = schedule.time_steps,
            per_round = schedule.n_samples_per_round,
            clean = self.training_set.len(),
            pool = self.distribution.remaining(),
            "starting iterative causal-strategic training"
        );

        for observer in &mut self.observers {
            observer.on_training_start(schedule.time_steps)?;
        }

        let summary = match self.fit_f()? {
            FitOutcome::Converged(summary) => summary,
            FitOutcome::Diverged { epoch, loss } => {
                return Err(Error::NumericalDivergence {
                    context: format!("clean-seed fit at epoch {epoch} (loss {loss})"),
                });
            }
        };
        if let FitOutcome::Diverged { epoch, loss } = self.fit_h()? {
            return Err(Error::NumericalDivergence {
                context: format!("outcome model fit at epoch {epoch} (loss {loss})"),
            });
        }
        let initial = self.evaluate(&summary, None, None)?;
        let initial_model = SavedClassifier::capture(self.f.as_ref());
        info!(
            accuracy_val = initial.accuracy_val,
            accuracy_test = initial.accuracy_test,
            "clean-seed fit"
        );
        for observer in &mut self.observers {
            observer.on_initial_fit(&initial)?;
        }

        for round in 0..schedule.time_steps {
            self.phase = TrainerPhase::RoundActive { round };
            for observer in &mut self.observers {
                observer.on_round_start(round)?;
            }
            self.run_round(round, schedule.n_samples_per_round)?;
        }

        let completed: Vec<&RoundRecord> =
            self.records.iter().filter(|r| r.is_completed()).collect();
        let accuracies: Vec<f64> = completed
            .iter()
            .map(|r| r.stats.as_ref().map_or(f64::NEG_INFINITY, |s| s.accuracy_val))
            .collect();
        let chosen_round = select_best(&accuracies).map(|i| completed[i].round);
        let chosen_model = chosen_round
            .and_then(|round| self.records.iter().find(|r| r.round == round))
            .and_then(|r| r.retrained.clone())
            .unwrap_or_else(|| initial_model.clone());
        if let Some(round) = chosen_round {
            self.f = chosen_model.restore()?;
            info!(round, "selected round by validation accuracy");
        } else {
            self.f = initial_model.restore()?;
            info!("no rounds ran; keeping the clean-seed fit");
        }

        self.phase = TrainerPhase::Finalized;
        for observer in &mut self.observers {
            observer.on_training_end()?;
        }

        let results = TrainerResults {
            initial,
            initial_model,
            records: self.records.clone(),
            chosen_round,
            chosen_model,
        };
        Ok(&*self.results.insert(results))
    }

    fn run_round(&mut self, round: usize, per_round: usize) -> Result<()> {
        // 1. snapshot the deployed classifier
        let deployed = ClassifierSnapshot::of(self.f.as_ref());
        let deployed_h = self.h.as_deref().map(|h| SavedClassifier::capture(h));
        // 2. draw fresh agents
        let drawn = self.distribution.next_batch(per_round)?;
        let prior_len = self.training_set.len();

        let mut moved = None;
        let stats = match self.advance_round(round, &drawn, deployed.classifier(), &mut moved) {
            Ok(stats) => stats,
            Err(setback) => {
                self.training_set.truncate(prior_len);
                self.f = deployed.saved().restore()?;
                if let (Some(h), Some(saved)) = (self.h.as_mut(), &deployed_h) {
                    *h = saved.restore()?;
                }
                let loss = match setback {
                    Setback::Diverged { loss } => loss,
                    Setback::Failed(err) => {
                        warn!(round, %err, "round failed; rolled back");
                        return Err(err);
                    }
                };
                warn!(round, loss, "round diverged; rolled back");
                self.records.push(RoundRecord {
                    round,
                    batch: moved.unwrap_or(drawn),
                    deployed: deployed.saved(),
                    retrained: None,
                    stats: None,
                    status: RoundStatus::Diverged { loss },
                });
                self.notify_round_end()?;
                return Err(Error::TrainingDiverged { round, loss });
            }
        };

        info!(
            round,
            n_train = stats.n_train,
            accuracy_val = stats.accuracy_val,
            accuracy_test = stats.accuracy_test,
            "round complete"
        );
        self.records.push(RoundRecord {
            round,
            batch: moved.unwrap_or(drawn),
            deployed: deployed.saved(),
            retrained: Some(SavedClassifier::capture(self.f.as_ref())),
            stats: Some(stats),
            status: RoundStatus::Completed,
        });
        self.notify_round_end()
    }

    /// Steps 3-8 of a round. On a setback the caller rolls back; `moved`
    /// holds the responded batch once it exists.
    fn advance_round(
        &mut self,
        round: usize,
        drawn: &AgentBatch,
        deployed: &dyn Classifier,
        moved: &mut Option<AgentBatch>,
    ) -> std::result::Result<RoundStats, Setback> {
        // 3-5. best response, effect re-derivation, relabelling
        let deltas = self.env.solver.best_response(drawn, Some(deployed))?;
        let costs: Array1<f64> = self.env.solver.cost().batch_cost(deltas.view());
        let batch = moved.insert(BestResponseSolver::apply(
            drawn,
            deltas.view(),
            &self.env.mechanism,
            &self.env.labeler,
        )?);
        debug!(round, mean_cost = costs.mean().unwrap_or(0.0), "agents responded");
        let positive_rate = batch.positives() as f64 / batch.len().max(1) as f64;

        // 6. append
        self.training_set.append(batch)?;

        // 7. retrain
        let summary = match self.fit_f()? {
            FitOutcome::Converged(summary) => summary,
            FitOutcome::Diverged { loss, .. } => return Err(Setback::Diverged { loss }),
        };
        if let FitOutcome::Diverged { loss, .. } = self.fit_h()? {
            return Err(Setback::Diverged { loss });
        }

        // 8. evaluate
        Ok(self.evaluate(&summary, costs.mean(), Some(positive_rate))?)
    }

    fn notify_round_end(&mut self) -> Result<()> {
        if let Some(record) = self.records.last() {
            for observer in &mut self.observers {
                observer.on_round_end(record)?;
            }
        }
        Ok(())
    }

    fn fit_f(&mut self) -> Result<FitOutcome> {
        let train = labelled_observed(&self.training_set)?;
        let val = labelled_observed(&self.val)?;
        fit(
            self.f.as_mut(),
            &train,
            &val,
            self.config.loss_f,
            &self.config.fit,
            &mut self.rng,
        )
    }

    fn fit_h(&mut self) -> Result<FitOutcome> {
        let Some(h) = self.h.as_mut() else {
            return Ok(FitOutcome::Converged(FitSummary {
                epochs_run: 0,
                train_loss: 0.0,
                best_val_loss: 0.0,
                stopped_early: false,
            }));
        };
        let train = labelled_observed(&self.training_set)?;
        let val = labelled_observed(&self.val)?;
        fit(
            h.as_mut(),
            &train,
            &val,
            self.config.loss_h,
            &self.config.h_fit(),
            &mut self.rng,
        )
    }

    fn evaluate(
        &self,
        summary: &FitSummary,
        mean_cost: Option<f64>,
        positive_rate: Option<f64>,
    ) -> Result<RoundStats> {
        let f = self.f.as_ref();
        let loss = self.config.loss_f;
        let val = self.env.strategic_evaluation(f, &self.val, loss)?;
        let test = self.env.strategic_evaluation(f, &self.test, loss)?;
        let clean = clean_evaluation(f, &self.test, loss);
        let h_eval = |set: &AgentBatch| {
            self.h
                .as_ref()
                .map(|h| clean_evaluation(h.as_ref(), set, self.config.loss_h))
                .map(|e: Evaluation| e.accuracy)
        };
        Ok(RoundStats {
            n_train: self.training_set.len(),
            epochs_run: summary.epochs_run,
            train_loss: summary.train_loss,
            loss_val: val.loss,
            accuracy_val: val.accuracy,
            loss_test: test.loss,
            accuracy_test: test.accuracy,
            accuracy_test_clean: clean.accuracy,
            h_accuracy_val: h_eval(&self.val),
            h_accuracy_test: h_eval(&self.test),
            mean_cost,
            positive_rate,
        })
    }
}

impl ResultsSource for IterativeCausalStrategicTrainer {
    fn collect_results(&self, label: &str) -> Result<(ChosenStats, Trajectory)> {
        let results = self.results.as_ref().ok_or_else(|| Error::InvalidConfiguration {
            message: "iterative trainer has not finished training".to_string(),
        })?;
        let chosen = ChosenStats {
            label: label.to_string(),
            chosen_round: results.chosen_round,
            stats: results.chosen_stats().to_map(),
        };
        let trajectory = results
            .completed()
            .filter_map(RoundRecord::stats_map)
            .collect();
        Ok((chosen, trajectory))
    }
}

/// Why a round stopped short.
enum Setback {
    /// Training or agent responses went non-finite.
    Diverged { loss: f64 },
    Failed(Error),
}

impl From<Error> for Setback {
    fn from(err: Error) -> Self {
        if err.is_numerical() {
            Setback::Diverged { loss: f64::NAN }
        } else {
            Setback::Failed(err)
        }
    }
}
