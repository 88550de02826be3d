//! Adam over flat parameter vectors

use ndarray::{Array1, ArrayView1, Zip};

/// Adam optimiser state (β₁ = 0.9, β₂ = 0.999, ε = 1e-8).
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    m: Array1<f64>,
    v: Array1<f64>,
    t: i32,
}

impl Adam {
    pub fn new(lr: f64, num_parameters: usize) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            m: Array1::zeros(num_parameters),
            v: Array1::zeros(num_parameters),
            t: 0,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.lr
    }

    /// Apply one update in place.
    pub fn step(&mut self, params: &mut Array1<f64>, grads: ArrayView1<f64>) {
        self.t += 1;
        let (b1, b2) = (self.beta1, self.beta2);
        let correction1 = 1.0 - b1.powi(self.t);
        let correction2 = 1.0 - b2.powi(self.t);
        let (lr, eps) = (self.lr, self.eps);

        Zip::from(params)
            .and(&mut self.m)
            .and(&mut self.v)
            .and(&grads)
            .for_each(|p, m, v, &g| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                let m_hat = *m / correction1;
                let v_hat = *v / correction2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
    }
}
