//! The causal world a classifier is deployed into, and evaluation within it

use ndarray::Array1;

use super::fit::{Evaluation, LabelledSet};
use crate::{
    Result,
    agents::AgentBatch,
    causal::{BestResponseSolver, GroundTruthLabeler, StructuralMechanism},
    model::{Classifier, Loss},
};

/// Best-response solver, structural mechanism and ground truth bundled
/// together; everything needed to see how agents react to a classifier.
#[derive(Debug, Clone)]
pub struct CausalEnvironment {
    pub solver: BestResponseSolver,
    pub mechanism: StructuralMechanism,
    pub labeler: GroundTruthLabeler,
}

impl CausalEnvironment {
    pub fn new(
        solver: BestResponseSolver,
        mechanism: StructuralMechanism,
        labeler: GroundTruthLabeler,
    ) -> Self {
        Self {
            solver,
            mechanism,
            labeler,
        }
    }

    /// A fresh copy of `agents` after they respond to `f`, relabelled.
    pub fn respond(&self, agents: &AgentBatch, f: Option<&dyn Classifier>) -> Result<AgentBatch> {
        self.solver
            .respond(agents, f, &self.mechanism, &self.labeler)
    }

    /// Loss and accuracy of `f` once the agents of `set` respond to it.
    ///
    /// `set` itself is not modified.
    pub fn strategic_evaluation(
        &self,
        f: &dyn Classifier,
        set: &AgentBatch,
        loss: Loss,
    ) -> Result<Evaluation> {
        let moved = self.respond(set, Some(f))?;
        Ok(Evaluation::of(f, moved.observed().view(), moved.labels(), loss))
    }

    /// Mean movement cost the agents of `set` pay when responding to `f`.
    pub fn mean_cost(&self, f: &dyn Classifier, set: &AgentBatch) -> Result<f64> {
        let deltas = self.solver.best_response(set, Some(f))?;
        let costs: Array1<f64> = self.solver.cost().batch_cost(deltas.view());
        Ok(costs.mean().unwrap_or(0.0))
    }
}

/// Loss and accuracy of `f` on the agents as they stand.
pub fn clean_evaluation(f: &dyn Classifier, set: &AgentBatch, loss: Loss) -> Evaluation {
    Evaluation::of(f, set.observed().view(), set.labels(), loss)
}

/// Classifier inputs and labels of a batch.
pub fn labelled_observed(set: &AgentBatch) -> Result<LabelledSet> {
    LabelledSet::new(set.observed(), set.labels().to_owned())
}
