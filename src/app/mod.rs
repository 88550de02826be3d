//! Experiment wiring: configuration plus the [`App`] container.
//!
//! [`App`] owns the artifact repository and a default seed. A run flows
//! through it like this:
//!
//! ```text
//!   ExperimentConfig ──► App::run_experiment
//!                           │
//!            DatasetSource ─┤ (CsvDataset | SyntheticDataset)
//!                           ▼
//!                    SensitivitySweep ──► CSERM + SERM per partition
//!                           │
//!                           ▼
//!                    SweepArtifact ──► ArtifactRepository
//!                                      (json | msgpack | in-memory)
//! ```
//!
//! Tests swap the repository for [`InMemoryArtifactRepository`](crate::adapters::InMemoryArtifactRepository):
//!
//! ```
//! use cserm::adapters::InMemoryArtifactRepository;
//! use cserm::app::App;
//!
//! let app = App::for_testing()
//!     .with_repository(InMemoryArtifactRepository::new())
//!     .with_default_seed(42)
//!     .build();
//! assert_eq!(app.resolve_seed(None).unwrap(), 42);
//! ```

pub mod config;
pub mod container;

pub use config::{ExperimentConfig, HStarConfig};
pub use container::{App, AppBuilder};
