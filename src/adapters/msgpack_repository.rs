//! MessagePack implementation of the artifact repository.
//!
//! This adapter uses rmp_serde for compact binary serialization. It also
//! stores frozen classifiers for `--save-model`.

use std::{fs::File, path::Path};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Result, error::Error, experiment::SweepArtifact, model::SavedClassifier,
    ports::ArtifactRepository,
};

/// MessagePack-based artifact repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackArtifactRepository;

impl MsgPackArtifactRepository {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactRepository for MsgPackArtifactRepository {
    fn extension(&self) -> &'static str {
        "msgpack"
    }

    fn save(&self, artifact: &SweepArtifact, path: &Path) -> Result<()> {
        write_msgpack(artifact, path, "sweep artifact")
    }

    fn load(&self, path: &Path) -> Result<SweepArtifact> {
        read_msgpack(path, "sweep artifact")
    }
}

/// Persist a frozen classifier.
pub fn save_classifier(model: &SavedClassifier, path: &Path) -> Result<()> {
    write_msgpack(model, path, "classifier")
}

/// Load a classifier written by [`save_classifier`].
pub fn load_classifier(path: &Path) -> Result<SavedClassifier> {
    read_msgpack(path, "classifier")
}

fn write_msgpack<T: Serialize>(value: &T, path: &Path, what: &str) -> Result<()> {
    let mut file = File::create(path).map_err(|source| Error::Io {
        operation: format!("create file {path:?}"),
        source,
    })?;

    rmp_serde::encode::write_named(&mut file, value).map_err(|e| Error::SerializationContext {
        operation: format!("serialize {what} to MessagePack"),
        message: e.to_string(),
    })
}

fn read_msgpack<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file = File::open(path).map_err(|source| Error::Io {
        operation: format!("open file {path:?}"),
        source,
    })?;

    rmp_serde::decode::from_read(&file).map_err(|e| Error::SerializationContext {
        operation: format!("deserialize {what} from MessagePack"),
        message: e.to_string(),
    })
}
