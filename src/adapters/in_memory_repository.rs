//! In-memory artifact repository for testing.
//!
//! This adapter keeps artifacts in a shared map, enabling fast tests of the
//! experiment driver without any file system I/O.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{Result, error::Error, experiment::SweepArtifact, ports::ArtifactRepository};

/// In-memory repository for testing.
///
/// All clones share the same underlying storage.
///
/// # Examples
///
/// ```
/// use cserm::adapters::InMemoryArtifactRepository;
/// use cserm::experiment::SweepArtifact;
/// use cserm::ports::ArtifactRepository;
/// use std::path::Path;
///
/// let repo = InMemoryArtifactRepository::new();
/// repo.save(&SweepArtifact::new(0, 1), Path::new("run"))?;
/// assert!(repo.contains(Path::new("run")));
/// # Ok::<(), cserm::Error>(())
/// ```
#[derive(Clone, Default)]
pub struct InMemoryArtifactRepository {
    storage: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of artifacts currently stored.
    pub fn count(&self) -> usize {
        self.storage().len()
    }

    pub fn clear(&self) {
        self.storage().clear();
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.storage().contains_key(&key(path))
    }

    fn storage(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

impl ArtifactRepository for InMemoryArtifactRepository {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn save(&self, artifact: &SweepArtifact, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(artifact)?;
        self.storage().insert(key(path), bytes);
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<SweepArtifact> {
        let storage = self.storage();
        let bytes = storage.get(&key(path)).ok_or_else(|| Error::Io {
            operation: format!("load artifact from in-memory storage at {path:?}"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "key not found in memory"),
        })?;
        Ok(serde_json::from_slice(bytes)?)
    }
}
