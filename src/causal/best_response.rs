//! Bounded-rationality best response under quadratic movement cost

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{CostModel, GroundTruthLabeler, StructuralMechanism};
use crate::{
    Error, Result,
    agents::AgentBatch,
    model::{Classifier, Loss},
    utils::{all_finite, ensure_finite},
};

/// Solver hyper-parameters bound at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Number of gradient-ascent steps per response.
    pub tau: usize,
    /// Ascent step size; `None` uses `1 / cost.lipschitz()`.
    pub step_size: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tau: 4,
            step_size: None,
        }
    }
}

/// Computes how agents move their causal features against a deployed classifier.
///
/// Each agent maximises `f([c + Δ | e]) − cost(Δ)` by exactly `tau` steps of
/// gradient ascent from `Δ = 0`. Only the causal block moves. Without a
/// classifier the solver is inert and returns zero moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestResponseSolver {
    cost: CostModel,
    tau: usize,
    step_size: f64,
}

impl BestResponseSolver {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for a non-positive or non-finite step size.
    pub fn new(cost: CostModel, config: SolverConfig) -> Result<Self> {
        let step_size = config.step_size.unwrap_or_else(|| 1.0 / cost.lipschitz());
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(Error::InvalidConfiguration {
                message: format!("best-response step size must be positive, got {step_size}"),
            });
        }
        Ok(Self {
            cost,
            tau: config.tau,
            step_size,
        })
    }

    pub fn cost(&self) -> &CostModel {
        &self.cost
    }

    pub fn tau(&self) -> usize {
        self.tau
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn causal_dim(&self) -> usize {
        self.cost.dim()
    }

    /// Causal moves for rows of classifier inputs `[causal | effect]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the inputs are narrower than the
    /// causal block or disagree with the classifier width, and
    /// [`Error::NumericalDivergence`] if the ascent produces non-finite moves.
    pub fn deltas(
        &self,
        observed: ArrayView2<f64>,
        f: Option<&dyn Classifier>,
    ) -> Result<Array2<f64>> {
        let k = self.causal_dim();
        if observed.ncols() < k {
            return Err(Error::DimensionMismatch {
                context: "best-response inputs".to_string(),
                expected: k,
                got: observed.ncols(),
            });
        }
        let Some(f) = f else {
            return Ok(Array2::zeros((observed.nrows(), k)));
        };
        self.check_classifier(observed, f)?;
        let (delta, _) = self.ascend(observed, f, |_| ());
        ensure_finite(delta.view(), "best-response gradient ascent")?;
        Ok(delta)
    }

    /// Loss of `f` on the responded inputs and its gradient with respect to
    /// the parameters of `f`, differentiating through every ascent step.
    ///
    /// The moves depend on the parameters, so the gradient carries the
    /// direct term at the moved inputs plus the adjoint of the `tau` unrolled
    /// steps `Δ ← Δ + η (∇ₓf − 2 scale M Δ)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] on width or label-count mismatch
    /// and [`Error::NumericalDivergence`] if the ascent produces non-finite moves.
    pub fn response_loss_gradient(
        &self,
        observed: ArrayView2<f64>,
        labels: ArrayView1<f64>,
        f: &dyn Classifier,
        loss: Loss,
    ) -> Result<(f64, Array1<f64>)> {
        let k = self.causal_dim();
        if labels.len() != observed.nrows() {
            return Err(Error::DimensionMismatch {
                context: "best-response loss labels".to_string(),
                expected: observed.nrows(),
                got: labels.len(),
            });
        }
        if observed.ncols() < k {
            return Err(Error::DimensionMismatch {
                context: "best-response inputs".to_string(),
                expected: k,
                got: observed.ncols(),
            });
        }
        self.check_classifier(observed, f)?;

        let mut visited = Vec::with_capacity(self.tau);
        let (delta, moved) = self.ascend(observed, f, |state| visited.push(state.to_owned()));
        ensure_finite(delta.view(), "best-response gradient ascent")?;

        let scores = f.scores(moved.view());
        let value = if all_finite(scores.iter()) {
            loss.value(scores.view(), labels)
        } else {
            f64::NAN
        };
        let upstream = loss.score_gradient(scores.view(), labels);
        let mut grads = f.parameter_gradients(moved.view(), upstream.view());

        // adjoint of the loss with respect to the current move, walked backwards
        let mut adjoint = &f.input_gradients(moved.view()).slice(s![.., ..k])
            * &upstream.view().insert_axis(Axis(1));
        let mut direction = Array2::<f64>::zeros(observed.raw_dim());
        for state in visited.iter().rev() {
            direction.slice_mut(s![.., ..k]).assign(&adjoint);
            grads.scaled_add(
                self.step_size,
                &f.input_gradient_parameter_vjp(state.view(), direction.view()),
            );
            let curvature = f.input_hessian_vector(state.view(), direction.view());
            // M is symmetric, so the cost gradient is its own adjoint
            let back = &curvature.slice(s![.., ..k]) - &self.cost.batch_gradient(adjoint.view());
            adjoint.scaled_add(self.step_size, &back);
        }
        Ok((value, grads))
    }

    fn check_classifier(&self, observed: ArrayView2<f64>, f: &dyn Classifier) -> Result<()> {
        if f.input_dim() != observed.ncols() {
            return Err(Error::DimensionMismatch {
                context: "classifier input for best response".to_string(),
                expected: f.input_dim(),
                got: observed.ncols(),
            });
        }
        Ok(())
    }

    /// Run the ascent, handing every pre-step input to `visit`.
    /// Returns the final moves and the final inputs.
    fn ascend(
        &self,
        observed: ArrayView2<f64>,
        f: &dyn Classifier,
        mut visit: impl FnMut(ArrayView2<f64>),
    ) -> (Array2<f64>, Array2<f64>) {
        let k = self.causal_dim();
        let mut delta = Array2::<f64>::zeros((observed.nrows(), k));
        let mut moved = observed.to_owned();
        for step in 0..self.tau {
            visit(moved.view());
            let score_grad = f.input_gradients(moved.view());
            let ascent = &score_grad.slice(s![.., ..k]) - &self.cost.batch_gradient(delta.view());
            delta.scaled_add(self.step_size, &ascent);
            moved
                .slice_mut(s![.., ..k])
                .assign(&(&observed.slice(s![.., ..k]) + &delta));
            trace!(step, "best-response ascent step");
        }
        (delta, moved)
    }

    /// Causal moves for a batch of agents.
    pub fn best_response(
        &self,
        agents: &AgentBatch,
        f: Option<&dyn Classifier>,
    ) -> Result<Array2<f64>> {
        self.deltas(agents.observed().view(), f)
    }

    /// Classifier inputs after the agents respond to `f`.
    pub fn manipulate(
        &self,
        observed: ArrayView2<f64>,
        f: Option<&dyn Classifier>,
    ) -> Result<Array2<f64>> {
        let k = self.causal_dim();
        let delta = self.deltas(observed, f)?;
        let mut moved = observed.to_owned();
        let shifted = &moved.slice(s![.., ..k]) + &delta;
        moved.slice_mut(s![.., ..k]).assign(&shifted);
        Ok(moved)
    }

    /// The agents after responding to `f`: moved causal block, effect block
    /// re-derived through `mechanism`, labels re-drawn from `labeler`.
    ///
    /// The input batch is left untouched.
    pub fn respond(
        &self,
        agents: &AgentBatch,
        f: Option<&dyn Classifier>,
        mechanism: &StructuralMechanism,
        labeler: &GroundTruthLabeler,
    ) -> Result<AgentBatch> {
        let delta = self.best_response(agents, f)?;
        Self::apply(agents, delta.view(), mechanism, labeler)
    }

    /// Move the agents by precomputed causal `deltas`, then re-derive their
    /// effect block and labels.
    pub fn apply(
        agents: &AgentBatch,
        deltas: ArrayView2<f64>,
        mechanism: &StructuralMechanism,
        labeler: &GroundTruthLabeler,
    ) -> Result<AgentBatch> {
        if deltas.dim() != agents.causal().dim() {
            return Err(Error::DimensionMismatch {
                context: "causal moves".to_string(),
                expected: agents.causal().ncols(),
                got: deltas.ncols(),
            });
        }
        let causal = &agents.causal() + &deltas;
        let effect = mechanism.derive_effect(agents.latent())?;
        let labels = labeler.label_batch(causal.view(), effect.view(), agents.latent())?;
        agents.with_manipulation(causal, effect, labels)
    }

    /// Agent utility `f(x + Δ) − cost(Δ)` for each row.
    pub fn objective(
        &self,
        observed: ArrayView2<f64>,
        delta: ArrayView2<f64>,
        f: &dyn Classifier,
    ) -> Array1<f64> {
        let k = self.causal_dim();
        let mut moved = observed.to_owned();
        let shifted = &moved.slice(s![.., ..k]) + &delta;
        moved.slice_mut(s![.., ..k]).assign(&shifted);
        f.scores(moved.view()) - self.cost.batch_cost(delta)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::model::{Arch, ModelSpec};

    fn linear(weights: &[f64], bias: f64) -> Box<dyn Classifier> {
        let mut model = ModelSpec::new(Arch::Linear, weights.len(), 0)
            .build()
            .unwrap();
        let mut params = weights.to_vec();
        params.push(bias);
        model.set_parameters(Array1::from(params).view()).unwrap();
        model
    }

    fn solver(tau: usize) -> BestResponseSolver {
        BestResponseSolver::new(
            CostModel::isotropic(2, 1.0).unwrap(),
            SolverConfig {
                tau,
                step_size: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn inert_without_classifier() {
        let x = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let delta = solver(10).deltas(x.view(), None).unwrap();
        assert_eq!(delta, Array2::<f64>::zeros((2, 2)));
    }

    #[test]
    fn moves_only_causal_columns() {
        let f = linear(&[1.0, 1.0, 5.0], 0.0);
        let x = array![[0.0, 0.0, 0.0]];
        let moved = solver(4).manipulate(x.view(), Some(f.as_ref())).unwrap();
        assert!(moved[[0, 0]] > 0.0);
        assert!(moved[[0, 1]] > 0.0);
        assert_eq!(moved[[0, 2]], 0.0);
    }

    #[test]
    fn converges_towards_closed_form_for_linear_scores() {
        // optimum of w·Δ − s‖Δ‖² is Δ* = w / (2s)
        let f = linear(&[1.0, -2.0, 0.0], 0.0);
        let x = array![[0.3, 0.3, 0.3]];
        let delta = solver(200).deltas(x.view(), Some(f.as_ref())).unwrap();
        assert!((delta[[0, 0]] - 0.5).abs() < 1e-6);
        assert!((delta[[0, 1]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn objective_improves_with_budget() {
        let f = linear(&[1.5, 0.5, 0.0], 0.0);
        let x = array![[0.0, 0.0, 0.0]];
        let mut previous = f64::NEG_INFINITY;
        for tau in 0..6 {
            let s = solver(tau);
            let delta = s.deltas(x.view(), Some(f.as_ref())).unwrap();
            let value = s.objective(x.view(), delta.view(), f.as_ref())[0];
            assert!(value >= previous - 1e-12, "tau={tau}");
            previous = value;
        }
    }

    #[test]
    fn zero_budget_returns_zero_moves() {
        let f = linear(&[1.0, 1.0, 1.0], 0.0);
        let delta = solver(0)
            .deltas(array![[1.0, 1.0, 1.0]].view(), Some(f.as_ref()))
            .unwrap();
        assert_eq!(delta, Array2::<f64>::zeros((1, 2)));
    }

    #[test]
    fn width_mismatch_is_reported() {
        let f = linear(&[1.0, 1.0], 0.0);
        let err = solver(2)
            .deltas(array![[1.0, 1.0, 1.0]].view(), Some(f.as_ref()))
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn divergent_step_is_surfaced() {
        let f = linear(&[1.0, 1.0, 0.0], 0.0);
        let s = BestResponseSolver::new(
            CostModel::isotropic(2, 1.0).unwrap(),
            SolverConfig {
                tau: 2000,
                step_size: Some(10.0),
            },
        )
        .unwrap();
        let err = s
            .deltas(array![[0.0, 0.0, 0.0]].view(), Some(f.as_ref()))
            .unwrap_err();
        assert!(err.is_numerical());
    }

    /// Hinge loss of `f_θ` on the inputs after responding to `f_θ`.
    fn responded_loss(
        s: &BestResponseSolver,
        f: &mut dyn Classifier,
        theta: &Array1<f64>,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> f64 {
        f.set_parameters(theta.view()).unwrap();
        let moved = s.manipulate(x.view(), Some(&*f)).unwrap();
        Loss::Hinge.value(f.scores(moved.view()).view(), y.view())
    }

    fn assert_matches_central_differences(mut f: Box<dyn Classifier>, s: &BestResponseSolver) {
        let x = array![[0.2, -0.5, 1.0], [-1.0, 0.3, 0.4], [0.5, 0.5, -0.8]];
        let y = array![1.0, 1.0, 1.0];
        let theta = f.parameters();
        let (value, grad) = s
            .response_loss_gradient(x.view(), y.view(), f.as_ref(), Loss::Hinge)
            .unwrap();
        assert!((value - responded_loss(s, f.as_mut(), &theta, &x, &y)).abs() < 1e-12);

        let h = 1e-6;
        for i in 0..theta.len() {
            let mut up = theta.clone();
            up[i] += h;
            let mut down = theta.clone();
            down[i] -= h;
            let numeric = (responded_loss(s, f.as_mut(), &up, &x, &y)
                - responded_loss(s, f.as_mut(), &down, &x, &y))
                / (2.0 * h);
            assert!(
                (numeric - grad[i]).abs() < 1e-4,
                "parameter {i}: numeric {numeric}, analytic {}",
                grad[i]
            );
        }
    }

    #[test]
    fn response_gradient_matches_central_differences_for_linear_scores() {
        let f = linear(&[0.7, -0.4, 0.3], 0.1);
        // the moves shift with the weights, so the causal weights differ
        // from the gradient at fixed moves
        let s = solver(4);
        let x = array![[0.2, -0.5, 1.0], [-1.0, 0.3, 0.4], [0.5, 0.5, -0.8]];
        let moved = s.manipulate(x.view(), Some(f.as_ref())).unwrap();
        let fixed = f.parameter_gradients(
            moved.view(),
            Loss::Hinge
                .score_gradient(f.scores(moved.view()).view(), array![1.0, 1.0, 1.0].view())
                .view(),
        );
        let (_, through) = s
            .response_loss_gradient(
                x.view(),
                array![1.0, 1.0, 1.0].view(),
                f.as_ref(),
                Loss::Hinge,
            )
            .unwrap();
        assert!((fixed[0] - through[0]).abs() > 1e-3);
        assert!((fixed[3] - through[3]).abs() < 1e-12);

        assert_matches_central_differences(f, &s);
    }

    #[test]
    fn response_gradient_matches_central_differences_for_mlp_scores() {
        let f = ModelSpec::new(Arch::Mlp { hidden: 5, layers: 1 }, 3, 3)
            .build()
            .unwrap();
        let s = BestResponseSolver::new(
            CostModel::isotropic(2, 2.0).unwrap(),
            SolverConfig {
                tau: 3,
                step_size: None,
            },
        )
        .unwrap();
        assert_matches_central_differences(f, &s);
    }

    #[test]
    fn response_gradient_without_steps_is_the_plain_gradient() {
        let f = linear(&[0.7, -0.4, 0.3], 0.1);
        let x = array![[0.2, -0.5, 1.0], [-1.0, 0.3, 0.4]];
        let y = array![1.0, -1.0];
        let upstream = Loss::Hinge.score_gradient(f.scores(x.view()).view(), y.view());
        let (_, grad) = solver(0)
            .response_loss_gradient(x.view(), y.view(), f.as_ref(), Loss::Hinge)
            .unwrap();
        assert_eq!(grad, f.parameter_gradients(x.view(), upstream.view()));
    }

    #[test]
    fn invalid_step_size_is_rejected() {
        let err = BestResponseSolver::new(
            CostModel::isotropic(2, 1.0).unwrap(),
            SolverConfig {
                tau: 1,
                step_size: Some(0.0),
            },
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
