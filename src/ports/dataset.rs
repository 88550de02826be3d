//! Dataset port - where raw feature rows come from

use crate::{Result, data::Dataset};

/// Source of labelled feature rows.
///
/// Implementations return the columns listed in `column_order`, in that
/// order, with `±1` labels. The same `(seed, column_order)` must always give
/// the same dataset.
///
/// # Examples
///
/// ```
/// use cserm::adapters::SyntheticDataset;
/// use cserm::ports::DatasetSource;
///
/// let source = SyntheticDataset::new(200, 4);
/// let data = source.load(0, &[3, 1, 0, 2])?;
/// assert_eq!(data.dim(), 4);
/// assert_eq!(data.len(), 200);
/// # Ok::<(), cserm::Error>(())
/// ```
pub trait DatasetSource: Send + Sync {
    /// Load the dataset with columns in `column_order`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying data cannot be read, is malformed,
    /// or does not contain every requested column.
    fn load(&self, seed: u64, column_order: &[usize]) -> Result<Dataset>;

    /// Total number of feature columns available.
    fn total_dim(&self) -> usize;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}
