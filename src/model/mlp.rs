//! ReLU feed-forward network with a scalar output

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;

use super::{Classifier, ModelSpec, check_width, uniform_init};
use crate::Result;

#[derive(Debug, Clone)]
struct Dense {
    /// `fan_in x fan_out`
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Dense {
    fn init(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Self {
        Self {
            weights: Array2::from_shape_fn((fan_in, fan_out), |_| uniform_init(rng, fan_in)),
            bias: Array1::from_shape_fn(fan_out, |_| uniform_init(rng, fan_in)),
        }
    }

    fn len(&self) -> usize {
        self.weights.len() + self.bias.len()
    }
}

/// Pre-activations and activations of one forward pass.
struct Trace {
    /// `activations[0]` is the input; `activations[l]` the output of layer `l`.
    activations: Vec<Array2<f64>>,
    /// Pre-activation of each layer.
    pre: Vec<Array2<f64>>,
}

/// Multi-layer perceptron `in -> hidden (x layers) -> 1`.
#[derive(Debug, Clone)]
pub struct Mlp {
    spec: ModelSpec,
    layers: Vec<Dense>,
}

impl Mlp {
    pub(crate) fn init(spec: ModelSpec, hidden: usize, depth: usize, rng: &mut StdRng) -> Self {
        let mut widths = Vec::with_capacity(depth + 2);
        widths.push(spec.input_dim);
        widths.extend(std::iter::repeat_n(hidden, depth));
        widths.push(1);

        let layers = widths
            .windows(2)
            .map(|pair| Dense::init(pair[0], pair[1], rng))
            .collect();
        Self { spec, layers }
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    fn forward(&self, x: ArrayView2<f64>) -> Trace {
        let mut activations = vec![x.to_owned()];
        let mut pre = Vec::with_capacity(self.layers.len());
        let last = self.layers.len() - 1;
        for (idx, layer) in self.layers.iter().enumerate() {
            let z = activations[idx].dot(&layer.weights) + &layer.bias;
            let a = if idx == last {
                z.clone()
            } else {
                z.mapv(|v| v.max(0.0))
            };
            pre.push(z);
            activations.push(a);
        }
        Trace { activations, pre }
    }

    /// Backpropagate `upstream` (d objective / d score, one per row).
    ///
    /// Returns the flat parameter gradient and the gradient with respect to the inputs.
    fn backward(&self, trace: &Trace, upstream: ArrayView1<f64>) -> (Array1<f64>, Array2<f64>) {
        let mut delta = upstream.to_owned().insert_axis(Axis(1));
        let mut layer_grads: Vec<(Array2<f64>, Array1<f64>)> = Vec::with_capacity(self.layers.len());

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let input = &trace.activations[idx];
            layer_grads.push((input.t().dot(&delta), delta.sum_axis(Axis(0))));

            let mut back = delta.dot(&layer.weights.t());
            if idx > 0 {
                let relu_mask = trace.pre[idx - 1].mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                back *= &relu_mask;
            }
            delta = back;
        }
        layer_grads.reverse();

        let mut flat = Vec::with_capacity(self.num_parameters());
        for (w, b) in &layer_grads {
            flat.extend(w.iter().copied());
            flat.extend(b.iter().copied());
        }
        (Array1::from(flat), delta)
    }
}

impl Classifier for Mlp {
    fn input_dim(&self) -> usize {
        self.spec.input_dim
    }

    fn scores(&self, x: ArrayView2<f64>) -> Array1<f64> {
        let trace = self.forward(x);
        trace
            .activations
            .last()
            .map(|out| out.column(0).to_owned())
            .unwrap_or_else(|| Array1::zeros(x.nrows()))
    }

    fn input_gradients(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let trace = self.forward(x);
        let ones = Array1::ones(x.nrows());
        self.backward(&trace, ones.view()).1
    }

    fn parameter_gradients(&self, x: ArrayView2<f64>, upstream: ArrayView1<f64>) -> Array1<f64> {
        let trace = self.forward(x);
        self.backward(&trace, upstream).0
    }

    fn parameters(&self) -> Array1<f64> {
        let mut flat = Vec::with_capacity(self.num_parameters());
        for layer in &self.layers {
            flat.extend(layer.weights.iter().copied());
            flat.extend(layer.bias.iter().copied());
        }
        Array1::from(flat)
    }

    fn set_parameters(&mut self, params: ArrayView1<f64>) -> Result<()> {
        check_width("mlp parameters", self.num_parameters(), params.len())?;
        let mut offset = 0;
        for layer in &mut self.layers {
            for w in layer.weights.iter_mut() {
                *w = params[offset];
                offset += 1;
            }
            for b in layer.bias.iter_mut() {
                *b = params[offset];
                offset += 1;
            }
        }
        Ok(())
    }

    fn num_parameters(&self) -> usize {
        self.layers.iter().map(Dense::len).sum()
    }

    fn boxed_clone(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }

    fn spec(&self) -> &ModelSpec {
        &self.spec
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::model::Arch;

    fn mlp() -> Box<dyn Classifier> {
        ModelSpec::new(Arch::Mlp { hidden: 5, layers: 3 }, 3, 4)
            .build()
            .unwrap()
    }

    #[test]
    fn parameter_count_matches_shape() {
        // 3*5+5 + 5*5+5 + 5*5+5 + 5*1+1
        assert_eq!(mlp().num_parameters(), 20 + 30 + 30 + 6);
    }

    #[test]
    fn input_gradient_matches_finite_difference() {
        let model = mlp();
        let x = array![[0.3, -0.7, 1.1], [-0.2, 0.4, 0.05]];
        let grads = model.input_gradients(x.view());
        let h = 1e-6;
        for row in 0..x.nrows() {
            for col in 0..x.ncols() {
                let mut plus = x.clone();
                plus[[row, col]] += h;
                let mut minus = x.clone();
                minus[[row, col]] -= h;
                let numeric =
                    (model.scores(plus.view())[row] - model.scores(minus.view())[row]) / (2.0 * h);
                assert!(
                    (numeric - grads[[row, col]]).abs() < 1e-5,
                    "row {row} col {col}: {numeric} vs {}",
                    grads[[row, col]]
                );
            }
        }
    }

    #[test]
    fn parameter_gradient_matches_finite_difference() {
        let mut model = mlp();
        let x = array![[0.3, -0.7, 1.1], [-0.2, 0.4, 0.05], [1.0, 1.0, -1.0]];
        let upstream = array![0.5, -1.0, 2.0];
        let grads = model.parameter_gradients(x.view(), upstream.view());
        let base = model.parameters();
        let h = 1e-6;
        for idx in [0, 7, 21, 50, base.len() - 1] {
            let mut plus = base.clone();
            plus[idx] += h;
            model.set_parameters(plus.view()).unwrap();
            let up = model.scores(x.view()).dot(&upstream);
            let mut minus = base.clone();
            minus[idx] -= h;
            model.set_parameters(minus.view()).unwrap();
            let down = model.scores(x.view()).dot(&upstream);
            let numeric = (up - down) / (2.0 * h);
            assert!((numeric - grads[idx]).abs() < 1e-5, "param {idx}");
        }
        model.set_parameters(base.view()).unwrap();
    }

    #[test]
    fn parameters_roundtrip_through_flat_vector() {
        let mut model = mlp();
        let params = model.parameters().mapv(|p| p * 2.0);
        model.set_parameters(params.view()).unwrap();
        assert_eq!(model.parameters(), params);
    }
}
