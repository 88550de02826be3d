//! Fixed structural mechanism producing effect features from latent factors

use ndarray::{Array2, ArrayView2, s};
use rand::{Rng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Linear mechanism `effect = A · latent[..effect_dim]`.
///
/// The matrix is drawn once and never re-estimated. Effect features are always
/// recomputed through this map, never copied from observed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralMechanism {
    /// `effect_dim x effect_dim`
    matrix: Array2<f64>,
}

impl StructuralMechanism {
    /// Mechanism with an explicit square matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the matrix is empty, not
    /// square or holds non-finite entries.
    pub fn new(matrix: Array2<f64>) -> Result<Self> {
        let (rows, cols) = matrix.dim();
        if rows == 0 || rows != cols {
            return Err(Error::InvalidConfiguration {
                message: format!("mechanism matrix must be square and non-empty, got {rows}x{cols}"),
            });
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfiguration {
                message: "mechanism matrix holds non-finite entries".to_string(),
            });
        }
        Ok(Self { matrix })
    }

    /// Draw `A ~ U[0, 1)^{effect_dim x effect_dim}` from `rng`.
    pub fn random(effect_dim: usize, rng: &mut StdRng) -> Result<Self> {
        Self::new(Array2::from_shape_fn((effect_dim, effect_dim), |_| {
            rng.random::<f64>()
        }))
    }

    pub fn effect_dim(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    /// Effect block for each row of `latent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `latent` has fewer columns than
    /// the effect dimension.
    pub fn derive_effect(&self, latent: ArrayView2<f64>) -> Result<Array2<f64>> {
        let k = self.effect_dim();
        if latent.ncols() < k {
            return Err(Error::DimensionMismatch {
                context: "latent block for structural mechanism".to_string(),
                expected: k,
                got: latent.ncols(),
            });
        }
        let parents = latent.slice(s![.., ..k]);
        Ok(parents.dot(&self.matrix.t()))
    }
}
