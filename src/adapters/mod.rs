//! Adapters implementing domain ports.
//!
//! This module contains infrastructure implementations of the traits defined
//! in the ports module. Following hexagonal architecture, adapters depend on
//! domain ports, not the other way around.

pub mod csv_dataset;
pub mod in_memory_repository;
pub mod json_repository;
pub mod msgpack_repository;
pub mod synthetic_dataset;

pub use csv_dataset::CsvDataset;
pub use in_memory_repository::InMemoryArtifactRepository;
pub use json_repository::JsonArtifactRepository;
pub use msgpack_repository::{MsgPackArtifactRepository, load_classifier, save_classifier};
pub use synthetic_dataset::SyntheticDataset;
