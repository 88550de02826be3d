//! Affine scoring model `s(x) = w·x + b`

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use rand::rngs::StdRng;

use super::{Classifier, ModelSpec, check_width, uniform_init};
use crate::Result;

/// Linear classifier with one output.
#[derive(Debug, Clone)]
pub struct LinearModel {
    spec: ModelSpec,
    weights: Array1<f64>,
    bias: f64,
}

impl LinearModel {
    pub(crate) fn init(spec: ModelSpec, rng: &mut StdRng) -> Self {
        let d = spec.input_dim;
        let weights = Array1::from_shape_fn(d, |_| uniform_init(rng, d));
        let bias = uniform_init(rng, d);
        Self {
            spec,
            weights,
            bias,
        }
    }

    pub fn weights(&self) -> ArrayView1<'_, f64> {
        self.weights.view()
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }
}

impl Classifier for LinearModel {
    fn input_dim(&self) -> usize {
        self.spec.input_dim
    }

    fn scores(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.dot(&self.weights) + self.bias
    }

    fn input_gradients(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut grads = Array2::zeros(x.raw_dim());
        for mut row in grads.rows_mut() {
            row.assign(&self.weights);
        }
        grads
    }

    fn parameter_gradients(&self, x: ArrayView2<f64>, upstream: ArrayView1<f64>) -> Array1<f64> {
        let d = self.spec.input_dim;
        let mut grads = Array1::zeros(d + 1);
        grads.slice_mut(s![..d]).assign(&x.t().dot(&upstream));
        grads[d] = upstream.sum();
        grads
    }

    // ∇ₓs = w, so only the weights move the input gradients
    fn input_gradient_parameter_vjp(&self, _x: ArrayView2<f64>, v: ArrayView2<f64>) -> Array1<f64> {
        let d = self.spec.input_dim;
        let mut grads = Array1::zeros(d + 1);
        grads.slice_mut(s![..d]).assign(&v.sum_axis(Axis(0)));
        grads
    }

    fn input_hessian_vector(&self, x: ArrayView2<f64>, _v: ArrayView2<f64>) -> Array2<f64> {
        Array2::zeros(x.raw_dim())
    }

    fn parameters(&self) -> Array1<f64> {
        let d = self.spec.input_dim;
        let mut params = Array1::zeros(d + 1);
        params.slice_mut(s![..d]).assign(&self.weights);
        params[d] = self.bias;
        params
    }

    fn set_parameters(&mut self, params: ArrayView1<f64>) -> Result<()> {
        let d = self.spec.input_dim;
        check_width("linear model parameters", d + 1, params.len())?;
        self.weights.assign(&params.slice(s![..d]));
        self.bias = params[d];
        Ok(())
    }

    fn num_parameters(&self) -> usize {
        self.spec.input_dim + 1
    }

    fn boxed_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }

    fn spec(&self) -> &ModelSpec {
        &self.spec
    }
}
