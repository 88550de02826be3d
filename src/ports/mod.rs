//! Ports (trait boundaries) for external dependencies.
//!
//! This module defines the interfaces between the simulation core and
//! infrastructure. Following hexagonal architecture, these traits are owned by
//! the core and implemented by adapters or by the trainers themselves.

pub mod dataset;
pub mod observer;
pub mod repository;
pub mod results;

pub use dataset::DatasetSource;
pub use observer::RoundObserver;
pub use repository::ArtifactRepository;
pub use results::ResultsSource;
