//! Numeric helpers shared by the models, losses and evaluators

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use crate::{Error, Result};

/// Logistic sigmoid, evaluated without overflow for large `|x|`.
///
/// # Examples
///
/// ```
/// use cserm::utils::sigmoid;
///
/// assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
/// assert!(sigmoid(800.0) <= 1.0);
/// assert!(sigmoid(-800.0) >= 0.0);
/// ```
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^x)` computed stably.
///
/// # Examples
///
/// ```
/// use cserm::utils::softplus;
///
/// assert!((softplus(0.0) - std::f64::consts::LN_2).abs() < 1e-12);
/// assert!((softplus(1000.0) - 1000.0).abs() < 1e-9);
/// ```
pub fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// Map scores to `±1` predictions (`>= 0` is positive).
pub fn predict_labels(scores: ArrayView1<f64>) -> Array1<f64> {
    scores.mapv(|s| if s >= 0.0 { 1.0 } else { -1.0 })
}

/// Fraction of rows where the sign of `scores` matches `labels`.
///
/// Returns `0.0` for empty inputs.
pub fn accuracy(scores: ArrayView1<f64>, labels: ArrayView1<f64>) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let hits = scores
        .iter()
        .zip(labels.iter())
        .filter(|&(&s, &y)| (s >= 0.0) == (y > 0.0))
        .count();
    hits as f64 / scores.len() as f64
}

/// Whether every element is finite.
pub fn all_finite<'a, I>(values: I) -> bool
where
    I: IntoIterator<Item = &'a f64>,
{
    values.into_iter().all(|v| v.is_finite())
}

/// Fail with [`Error::NumericalDivergence`] if the matrix holds NaN or infinity.
pub fn ensure_finite(values: ArrayView2<f64>, context: &str) -> Result<()> {
    if all_finite(values.iter()) {
        Ok(())
    } else {
        Err(Error::NumericalDivergence {
            context: context.to_string(),
        })
    }
}

/// Copy the listed rows of `matrix` into a new matrix.
pub fn select_rows(matrix: ArrayView2<f64>, rows: &[usize]) -> ndarray::Array2<f64> {
    matrix.select(Axis(0), rows)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn sigmoid_is_symmetric() {
        for x in [-5.0, -0.3, 0.0, 0.7, 12.0] {
            assert!((sigmoid(x) + sigmoid(-x) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn softplus_matches_naive_formula_in_safe_range() {
        for x in [-3.0, -0.5, 0.0, 0.5, 3.0] {
            let naive = (1.0 + f64::exp(x)).ln();
            assert!((softplus(x) - naive).abs() < 1e-12);
        }
    }

    #[test]
    fn accuracy_counts_sign_agreement() {
        let scores = array![0.5, -0.2, 0.0, -1.0];
        let labels = array![1.0, 1.0, 1.0, -1.0];
        assert!((accuracy(scores.view(), labels.view()) - 0.75).abs() < 1e-12);
        assert_eq!(accuracy(Array1::zeros(0).view(), Array1::zeros(0).view()), 0.0);
    }

    #[test]
    fn ensure_finite_flags_nan() {
        let m = array![[1.0, f64::NAN]];
        let err = ensure_finite(m.view(), "test").unwrap_err();
        assert!(err.is_numerical());
    }

    #[test]
    fn predictions_are_signed() {
        let preds = predict_labels(array![0.1, -0.1, 0.0].view());
        assert_eq!(preds, array![1.0, -1.0, 1.0]);
    }
}
