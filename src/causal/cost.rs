//! Quadratic movement cost over the causal block

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// `cost(Δ) = scale · Δᵀ M Δ` with `M` symmetric positive definite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    matrix: Array2<f64>,
    scale: f64,
}

impl CostModel {
    /// Create a validated cost model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCostModel`] if the matrix is empty, not square,
    /// not symmetric, not positive definite, or if `scale` is not a positive
    /// finite number.
    pub fn new(matrix: Array2<f64>, scale: f64) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::InvalidCostModel {
                message: format!("scale must be positive and finite, got {scale}"),
            });
        }
        let (rows, cols) = matrix.dim();
        if rows == 0 || rows != cols {
            return Err(Error::InvalidCostModel {
                message: format!("cost matrix must be square and non-empty, got {rows}x{cols}"),
            });
        }
        for i in 0..rows {
            for j in (i + 1)..cols {
                if (matrix[[i, j]] - matrix[[j, i]]).abs() > SYMMETRY_TOLERANCE {
                    return Err(Error::InvalidCostModel {
                        message: format!("cost matrix is not symmetric at ({i}, {j})"),
                    });
                }
            }
        }
        if !is_positive_definite(matrix.view()) {
            return Err(Error::InvalidCostModel {
                message: "cost matrix is not positive definite".to_string(),
            });
        }
        Ok(Self { matrix, scale })
    }

    /// Identity-matrix cost, `scale · ‖Δ‖²`.
    pub fn isotropic(dim: usize, scale: f64) -> Result<Self> {
        Self::new(Array2::eye(dim), scale)
    }

    /// Random cost `M = B Bᵀ / dim + I` with `B ~ U[0, 1)`.
    pub fn random(dim: usize, scale: f64, rng: &mut StdRng) -> Result<Self> {
        let b = Array2::from_shape_fn((dim, dim), |_| rng.random::<f64>());
        let denom = dim.max(1) as f64;
        let mut matrix = b.dot(&b.t()) / denom + Array2::<f64>::eye(dim);
        // enforce exact symmetry after floating-point accumulation
        for i in 0..dim {
            for j in (i + 1)..dim {
                let avg = 0.5 * (matrix[[i, j]] + matrix[[j, i]]);
                matrix[[i, j]] = avg;
                matrix[[j, i]] = avg;
            }
        }
        Self::new(matrix, scale)
    }

    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    /// Cost of a single move.
    pub fn cost(&self, delta: ArrayView1<f64>) -> f64 {
        self.scale * delta.dot(&self.matrix.dot(&delta))
    }

    /// Cost of every row of `deltas`.
    pub fn batch_cost(&self, deltas: ArrayView2<f64>) -> Array1<f64> {
        let projected = deltas.dot(&self.matrix);
        (&projected * &deltas).sum_axis(Axis(1)) * self.scale
    }

    /// `∇cost(Δ) = 2 · scale · M Δ`.
    pub fn gradient(&self, delta: ArrayView1<f64>) -> Array1<f64> {
        self.matrix.dot(&delta) * (2.0 * self.scale)
    }

    /// Row-wise gradient for a batch of moves.
    pub fn batch_gradient(&self, deltas: ArrayView2<f64>) -> Array2<f64> {
        deltas.dot(&self.matrix) * (2.0 * self.scale)
    }

    /// Upper bound on the Lipschitz constant of the gradient (`2 · scale · ‖M‖_F`).
    pub fn lipschitz(&self) -> f64 {
        let frobenius = self.matrix.iter().map(|v| v * v).sum::<f64>().sqrt();
        2.0 * self.scale * frobenius
    }
}

/// Cholesky attempt: succeeds iff the symmetric matrix is positive definite.
fn is_positive_definite(matrix: ArrayView2<f64>) -> bool {
    let n = matrix.nrows();
    let mut lower = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[[i, j]];
            for k in 0..j {
                sum -= lower[[i, k]] * lower[[j, k]];
            }
            if i == j {
                if !(sum.is_finite() && sum > 0.0) {
                    return false;
                }
                lower[[i, i]] = sum.sqrt();
            } else {
                lower[[i, j]] = sum / lower[[j, j]];
            }
        }
    }
    true
}
