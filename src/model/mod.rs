//! Differentiable scoring models
//!
//! This module provides the generic model plumbing the trainers work with:
//! - [`Classifier`]: the trait every scoring model implements
//! - [`LinearModel`] and [`Mlp`]: the two architectures used by the experiments
//! - [`ModelSpec`]: an immutable `(architecture, seed)` builder replacing model factories
//! - [`Adam`] and [`Loss`]: optimisation primitives over flat parameter vectors

pub mod linear;
pub mod losses;
pub mod mlp;
pub mod optimizer;

use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

pub use linear::LinearModel;
pub use losses::Loss;
pub use mlp::Mlp;
pub use optimizer::Adam;

use crate::{Error, Result};

/// A real-valued scoring function over feature rows.
///
/// Parameters are exposed as one flat vector so optimisers and snapshots do
/// not need to know the architecture.
pub trait Classifier: Send + fmt::Debug {
    /// Number of input features per row.
    fn input_dim(&self) -> usize;

    /// Score every row of `x`.
    fn scores(&self, x: ArrayView2<f64>) -> Array1<f64>;

    /// Gradient of each row's score with respect to that row's inputs.
    fn input_gradients(&self, x: ArrayView2<f64>) -> Array2<f64>;

    /// Gradient of `Σ_i upstream[i] · score(x_i)` with respect to the flat parameters.
    fn parameter_gradients(&self, x: ArrayView2<f64>, upstream: ArrayView1<f64>) -> Array1<f64>;

    /// Gradient of `Σ_i ∇ₓscore(x_i) · v_i` with respect to the flat parameters.
    ///
    /// This is how the input gradients along `v` move with the parameters;
    /// it carries the parameter dependence of gradient-based best responses.
    /// The default takes central differences of [`parameter_gradients`]
    /// along `v`, which is exact for models that are affine in the inputs
    /// and for piecewise-linear models away from their kinks.
    ///
    /// [`parameter_gradients`]: Classifier::parameter_gradients
    fn input_gradient_parameter_vjp(&self, x: ArrayView2<f64>, v: ArrayView2<f64>) -> Array1<f64> {
        let eps = difference_step(v);
        let ones = Array1::<f64>::ones(x.nrows());
        let plus = self.parameter_gradients((&x + &(&v * eps)).view(), ones.view());
        let minus = self.parameter_gradients((&x - &(&v * eps)).view(), ones.view());
        (plus - minus) / (2.0 * eps)
    }

    /// Row-wise input Hessian-vector products `∇²ₓscore(x_i) · v_i`.
    ///
    /// The default takes central differences of [`input_gradients`] along `v`.
    ///
    /// [`input_gradients`]: Classifier::input_gradients
    fn input_hessian_vector(&self, x: ArrayView2<f64>, v: ArrayView2<f64>) -> Array2<f64> {
        let eps = difference_step(v);
        let plus = self.input_gradients((&x + &(&v * eps)).view());
        let minus = self.input_gradients((&x - &(&v * eps)).view());
        (plus - minus) / (2.0 * eps)
    }

    /// Current parameters, flattened.
    fn parameters(&self) -> Array1<f64>;

    /// Replace all parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `params` has the wrong length.
    fn set_parameters(&mut self, params: ArrayView1<f64>) -> Result<()>;

    fn num_parameters(&self) -> usize;

    /// Clone behind a box; used for read-only snapshots.
    fn boxed_clone(&self) -> Box<dyn Classifier>;

    fn spec(&self) -> &ModelSpec;
}

/// Model architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Arch {
    /// Single affine map to one output.
    Linear,
    /// ReLU feed-forward network with `layers` hidden layers of width `hidden`.
    Mlp { hidden: usize, layers: usize },
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Linear => write!(f, "linear"),
            Arch::Mlp { hidden, layers } => write!(f, "mlp({hidden}x{layers})"),
        }
    }
}

/// Immutable model recipe: architecture, input width and initialisation seed.
///
/// # Examples
///
/// ```
/// use cserm::model::{Arch, ModelSpec};
///
/// let spec = ModelSpec::new(Arch::Linear, 5, 7);
/// let a = spec.build()?;
/// let b = spec.build()?;
/// assert_eq!(a.parameters(), b.parameters());
/// # Ok::<(), cserm::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub arch: Arch,
    pub input_dim: usize,
    pub seed: u64,
}

impl ModelSpec {
    pub fn new(arch: Arch, input_dim: usize, seed: u64) -> Self {
        Self {
            arch,
            input_dim,
            seed,
        }
    }

    /// Build a freshly initialised model. Same spec, same parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for zero-width inputs or layers.
    pub fn build(&self) -> Result<Box<dyn Classifier>> {
        if self.input_dim == 0 {
            return Err(Error::InvalidConfiguration {
                message: "model input dimension must be positive".to_string(),
            });
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        match self.arch {
            Arch::Linear => Ok(Box::new(LinearModel::init(*self, &mut rng))),
            Arch::Mlp { hidden, layers } => {
                if hidden == 0 || layers == 0 {
                    return Err(Error::InvalidConfiguration {
                        message: format!("invalid MLP shape {}", self.arch),
                    });
                }
                Ok(Box::new(Mlp::init(*self, hidden, layers, &mut rng)))
            }
        }
    }
}

/// Uniform `(-1/√fan_in, 1/√fan_in)` initialisation.
pub(crate) fn uniform_init(rng: &mut StdRng, fan_in: usize) -> f64 {
    let bound = 1.0 / (fan_in as f64).sqrt();
    rng.random_range(-bound..bound)
}

/// Serializable frozen copy of a classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedClassifier {
    pub spec: ModelSpec,
    pub parameters: Vec<f64>,
}

impl SavedClassifier {
    pub fn capture(model: &dyn Classifier) -> Self {
        Self {
            spec: *model.spec(),
            parameters: model.parameters().to_vec(),
        }
    }

    /// Rebuild the classifier with the captured parameters.
    pub fn restore(&self) -> Result<Box<dyn Classifier>> {
        let mut model = self.spec.build()?;
        model.set_parameters(ArrayView1::from(&self.parameters[..]))?;
        Ok(model)
    }
}

/// Read-only copy of a live classifier, handed to responding agents.
#[derive(Debug)]
pub struct ClassifierSnapshot(Box<dyn Classifier>);

impl ClassifierSnapshot {
    pub fn of(model: &dyn Classifier) -> Self {
        Self(model.boxed_clone())
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.0.as_ref()
    }

    pub fn saved(&self) -> SavedClassifier {
        SavedClassifier::capture(self.0.as_ref())
    }
}

/// Central-difference step along `v`, relative to its largest entry.
fn difference_step(v: ArrayView2<f64>) -> f64 {
    const STEP: f64 = 1e-6;
    let largest = v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    STEP / largest.max(1.0)
}

pub(crate) fn check_width(context: &str, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            context: context.to_string(),
            expected,
            got,
        })
    }
}
