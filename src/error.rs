//! Error types for the causal strategic simulator

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid feature partition: {message}")]
    InvalidPartition { message: String },

    #[error("invalid cost model: {message}")]
    InvalidCostModel { message: String },

    #[error(
        "cannot drop {n_drops} of {available} causal features: at least one must stay observed"
    )]
    TooManyDrops { n_drops: usize, available: usize },

    #[error(
        "population pool holds {available} agents but {rounds} rounds x {per_round} agents were requested"
    )]
    InsufficientPool {
        available: usize,
        rounds: usize,
        per_round: usize,
    },

    #[error("population pool exhausted: requested {requested} agents, {remaining} remaining")]
    PoolExhausted { requested: usize, remaining: usize },

    #[error("dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("non-finite values produced by {context}")]
    NumericalDivergence { context: String },

    #[error("training diverged in round {round}: loss = {loss}")]
    TrainingDiverged { round: usize, loss: f64 },

    #[error("dataset is empty or unusable: {message}")]
    InvalidDataset { message: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to {operation}: {message}")]
    SerializationContext { operation: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("progress bar template error: {message}")]
    ProgressBarTemplate { message: String },
}

impl Error {
    /// Whether the error is a configuration problem detected before any work ran.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidPartition { .. }
                | Error::InvalidCostModel { .. }
                | Error::TooManyDrops { .. }
                | Error::InsufficientPool { .. }
                | Error::DimensionMismatch { .. }
                | Error::InvalidConfiguration { .. }
        )
    }

    /// Whether the error reports a numerical failure (NaN/inf) during optimisation.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            Error::NumericalDivergence { .. } | Error::TrainingDiverged { .. }
        )
    }
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            operation: "IO operation".to_string(),
            source,
        }
    }
}
