//! Tabular datasets, row splits and feature-partition enumeration

pub mod partitions;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use rand::{rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

pub use partitions::{generate_partitions_for_feature_drops, sample_partitions};

use crate::{Error, Result};

/// Feature matrix with `±1` labels.
///
/// Columns are stored in the order the loader was asked for, so position `j`
/// holds dataset column `column_order[j]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Array1<f64>,
    column_order: Vec<usize>,
}

impl Dataset {
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if rows and labels disagree or the
    /// column order does not match the feature width.
    pub fn new(features: Array2<f64>, labels: Array1<f64>, column_order: Vec<usize>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(Error::DimensionMismatch {
                context: "dataset labels".to_string(),
                expected: features.nrows(),
                got: labels.len(),
            });
        }
        if features.ncols() != column_order.len() {
            return Err(Error::DimensionMismatch {
                context: "dataset column order".to_string(),
                expected: features.ncols(),
                got: column_order.len(),
            });
        }
        Ok(Self {
            features,
            labels,
            column_order,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> ArrayView1<'_, f64> {
        self.labels.view()
    }

    pub fn column_order(&self) -> &[usize] {
        &self.column_order
    }

    /// Split off the trailing `frac` of the rows; returns `(head, tail)`.
    pub fn split(&self, frac: f64) -> Result<(Dataset, Dataset)> {
        let (head, tail) = split_point(self.len(), frac)?;
        Ok((self.rows(0, head), self.rows(head, head + tail)))
    }

    fn rows(&self, start: usize, end: usize) -> Dataset {
        Dataset {
            features: self.features.slice(s![start..end, ..]).to_owned(),
            labels: self.labels.slice(s![start..end]).to_owned(),
            column_order: self.column_order.clone(),
        }
    }
}

/// Reorder dataset columns: result column `j` is input column `order[j]`.
///
/// # Errors
///
/// Returns [`Error::InvalidDataset`] if `order` references a missing column.
pub fn reorder_columns(features: ArrayView2<f64>, order: &[usize]) -> Result<Array2<f64>> {
    if let Some(&bad) = order.iter().find(|&&c| c >= features.ncols()) {
        return Err(Error::InvalidDataset {
            message: format!(
                "column {bad} requested but the data has {} columns",
                features.ncols()
            ),
        });
    }
    Ok(features.select(Axis(1), order))
}

/// Standardise every column in place to zero mean and unit variance.
/// Constant columns are only centred.
pub fn standardize_columns(features: &mut Array2<f64>) {
    for mut column in features.columns_mut() {
        let n = column.len().max(1) as f64;
        let mean = column.sum() / n;
        let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        if std > f64::EPSILON {
            column.mapv_inplace(|v| (v - mean) / std);
        } else {
            column.mapv_inplace(|v| v - mean);
        }
    }
}

/// `(head, tail)` row counts when the trailing `frac` of `n` rows is split
/// off. The tail gets `floor(n · frac)` rows.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] unless `0 <= frac <= 1`.
pub fn split_point(n: usize, frac: f64) -> Result<(usize, usize)> {
    if !(0.0..=1.0).contains(&frac) {
        return Err(Error::InvalidConfiguration {
            message: format!("split fraction must lie in [0, 1], got {frac}"),
        });
    }
    let tail = (n as f64 * frac).floor() as usize;
    Ok((n - tail, tail))
}

/// A uniformly random permutation of `0..n`.
pub fn permutation(n: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices
}
