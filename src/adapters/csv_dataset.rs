//! CSV dataset adapter: numeric feature columns followed by a label column

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, Axis};
use rand::{SeedableRng, rngs::StdRng};
use tracing::info;

use crate::{
    Result,
    data::{Dataset, permutation, reorder_columns, standardize_columns},
    error::Error,
    ports::DatasetSource,
    types::Label,
};

/// Numeric CSV file whose last column holds `0/1` or `±1` labels.
///
/// Rows are shuffled with the load seed and every feature column is
/// standardised before the requested columns are selected.
#[derive(Debug, Clone)]
pub struct CsvDataset {
    path: PathBuf,
    has_headers: bool,
    total_dim: usize,
}

impl CsvDataset {
    /// Open a headerless CSV file and check its shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has fewer than two columns.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_headers(path, false)
    }

    pub fn open_with_headers(path: impl AsRef<Path>, has_headers: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = reader(&path, has_headers)?;
        let width = match reader.records().next() {
            Some(record) => record?.len(),
            None => 0,
        };
        if width < 2 {
            return Err(Error::InvalidDataset {
                message: format!("{path:?} needs at least one feature column and a label column"),
            });
        }
        Ok(Self {
            path,
            has_headers,
            total_dim: width - 1,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<(Array2<f64>, Array1<f64>)> {
        let mut reader = reader(&self.path, self.has_headers)?;
        let mut values = Vec::new();
        let mut labels = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != self.total_dim + 1 {
                return Err(Error::InvalidDataset {
                    message: format!(
                        "row {row} has {} fields, expected {}",
                        record.len(),
                        self.total_dim + 1
                    ),
                });
            }
            for (col, field) in record.iter().enumerate() {
                let value: f64 = field.trim().parse().map_err(|_| Error::InvalidDataset {
                    message: format!("row {row} column {col}: {field:?} is not a number"),
                })?;
                if col == self.total_dim {
                    labels.push(Label::from_value(value)?.value());
                } else {
                    values.push(value);
                }
            }
        }
        if labels.is_empty() {
            return Err(Error::InvalidDataset {
                message: format!("{:?} holds no rows", self.path),
            });
        }
        let features = Array2::from_shape_vec((labels.len(), self.total_dim), values).map_err(
            |e| Error::InvalidDataset {
                message: format!("ragged CSV data: {e}"),
            },
        )?;
        Ok((features, Array1::from(labels)))
    }
}

fn reader(path: &Path, has_headers: bool) -> Result<csv::Reader<std::fs::File>> {
    let file = std::fs::File::open(path).map_err(|source| Error::Io {
        operation: format!("open dataset {path:?}"),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .from_reader(file))
}

impl DatasetSource for CsvDataset {
    fn load(&self, seed: u64, column_order: &[usize]) -> Result<Dataset> {
        let (mut features, labels) = self.read_all()?;
        standardize_columns(&mut features);
        let order = permutation(labels.len(), &mut StdRng::seed_from_u64(seed));
        let features = reorder_columns(features.view(), column_order)?.select(Axis(0), &order);
        let labels = labels.select(Axis(0), &order);
        info!(
            path = ?self.path,
            rows = labels.len(),
            columns = column_order.len(),
            "loaded CSV dataset"
        );
        Dataset::new(features, labels, column_order.to_vec())
    }

    fn total_dim(&self) -> usize {
        self.total_dim
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_reordered_standardised_columns() {
        let file = write_csv("1,10,0\n2,20,1\n3,30,1\n4,40,0\n");
        let source = CsvDataset::open(file.path()).unwrap();
        assert_eq!(source.total_dim(), 2);

        let data = source.load(0, &[1, 0]).unwrap();
        assert_eq!(data.len(), 4);
        assert_eq!(data.column_order(), &[1, 0]);
        // both columns are affine in the row index, so they standardise equally
        for row in data.features().rows() {
            assert!((row[0] - row[1]).abs() < 1e-12);
        }
        assert!(data.labels().iter().all(|&y| y == 1.0 || y == -1.0));
        assert_eq!(data.labels().iter().filter(|&&y| y > 0.0).count(), 2);
    }

    #[test]
    fn same_seed_gives_same_rows() {
        let file = write_csv("1,0\n2,1\n3,1\n4,0\n5,1\n");
        let source = CsvDataset::open(file.path()).unwrap();
        assert_eq!(source.load(3, &[0]).unwrap(), source.load(3, &[0]).unwrap());
    }

    #[test]
    fn bad_label_is_rejected() {
        let file = write_csv("1,2\n");
        let source = CsvDataset::open(file.path()).unwrap();
        assert!(matches!(
            source.load(0, &[0]).unwrap_err(),
            Error::InvalidDataset { .. }
        ));
    }

    #[test]
    fn headers_are_skipped_when_requested() {
        let file = write_csv("a,b,label\n1,2,1\n3,4,-1\n");
        let source = CsvDataset::open_with_headers(file.path(), true).unwrap();
        assert_eq!(source.load(0, &[0, 1]).unwrap().len(), 2);
    }

    #[test]
    fn missing_column_is_rejected() {
        let file = write_csv("1,0\n2,1\n");
        let source = CsvDataset::open(file.path()).unwrap();
        assert!(source.load(0, &[0, 1]).is_err());
    }
}
