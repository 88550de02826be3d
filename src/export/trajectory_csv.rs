//! CSV export of per-round trajectories
//!
//! One row per round, with the partition and method it belongs to, so the
//! trajectories of a whole run can be concatenated into one file.

use std::{collections::BTreeSet, path::Path};

use csv::Writer;

use crate::{
    Result,
    error::Error,
    pipeline::{StatsMap, Trajectory},
};

/// One trajectory and the run it came from.
#[derive(Debug, Clone)]
pub struct LabelledTrajectory<'a> {
    pub label: &'a str,
    /// Index of the partition inside its run.
    pub partition: usize,
    pub rows: &'a Trajectory,
}

/// Exporter for trajectory CSV files
pub struct TrajectoryCsvExporter;

impl TrajectoryCsvExporter {
    /// Write every trajectory to `path`, replacing any existing file.
    ///
    /// Columns are `label`, `partition`, `round`, then every other statistic
    /// in name order. Statistics missing from a row are left empty.
    pub fn export(path: &Path, trajectories: &[LabelledTrajectory<'_>]) -> Result<()> {
        let columns = Self::columns(trajectories.iter().flat_map(|t| t.rows.iter()));
        let mut writer = Writer::from_path(path)?;

        let mut header = vec!["label".to_string(), "partition".to_string()];
        header.extend(columns.iter().cloned());
        writer.write_record(&header)?;

        for trajectory in trajectories {
            for row in trajectory.rows {
                let mut record = vec![trajectory.label.to_string(), trajectory.partition.to_string()];
                record.extend(columns.iter().map(|c| Self::cell(row, c)));
                writer.write_record(&record)?;
            }
        }
        writer.flush().map_err(|source| Error::Io {
            operation: format!("flush trajectory CSV {path:?}"),
            source,
        })?;
        Ok(())
    }

    /// Statistic names across all rows, `round` first.
    fn columns<'a>(rows: impl Iterator<Item = &'a StatsMap>) -> Vec<String> {
        let names: BTreeSet<&String> = rows.flat_map(|r| r.keys()).collect();
        let mut columns = Vec::with_capacity(names.len());
        if names.iter().any(|n| n.as_str() == "round") {
            columns.push("round".to_string());
        }
        columns.extend(
            names
                .into_iter()
                .filter(|n| n.as_str() != "round")
                .cloned(),
        );
        columns
    }

    fn cell(row: &StatsMap, column: &str) -> String {
        match row.get(column) {
            None => String::new(),
            Some(&v) if column == "round" || column.starts_with("n_") || column == "epochs_run" => {
                format!("{}", v as i64)
            }
            Some(&v) => Self::fmt_float(v),
        }
    }

    /// Format float for CSV (handles NaN/Inf)
    fn fmt_float(value: f64) -> String {
        if value.is_nan() {
            "nan".to_string()
        } else if value.is_infinite() {
            if value.is_sign_positive() {
                "inf".to_string()
            } else {
                "-inf".to_string()
            }
        } else {
            format!("{value:.6}")
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn row(round: f64, acc: f64) -> StatsMap {
        StatsMap::from([
            ("round".to_string(), round),
            ("accuracy_val".to_string(), acc),
            ("n_train".to_string(), 1200.0),
        ])
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("trajectory.csv");
        let rows = vec![row(0.0, 0.75), row(1.0, f64::NAN)];
        TrajectoryCsvExporter::export(
            &path,
            &[LabelledTrajectory {
                label: "CSERM",
                partition: 2,
                rows: &rows,
            }],
        )
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "label,partition,round,accuracy_val,n_train");
        assert_eq!(lines[1], "CSERM,2,0,0.750000,1200");
        assert_eq!(lines[2], "CSERM,2,1,nan,1200");
    }

    #[test]
    fn missing_statistics_leave_empty_cells() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("trajectory.csv");
        let full = vec![row(0.0, 0.5)];
        let partial = vec![StatsMap::from([("round".to_string(), 0.0)])];
        TrajectoryCsvExporter::export(
            &path,
            &[
                LabelledTrajectory {
                    label: "CSERM",
                    partition: 0,
                    rows: &full,
                },
                LabelledTrajectory {
                    label: "CSERM",
                    partition: 1,
                    rows: &partial,
                },
            ],
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().nth(2), Some("CSERM,1,0,,"));
    }
}
