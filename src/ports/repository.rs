//! Repository port for sweep artifact persistence.
//!
//! This module defines the trait boundary between the experiment driver and
//! the storage format of its results.

use std::path::{Path, PathBuf};

use crate::{Result, experiment::SweepArtifact};

/// Port for persisting and loading sweep artifacts.
///
/// This trait abstracts the storage mechanism, allowing different formats
/// (JSON, MessagePack, memory) without coupling the driver to any of them.
///
/// # Examples
///
/// ```no_run
/// use cserm::experiment::SweepArtifact;
/// use cserm::ports::ArtifactRepository;
/// use std::path::Path;
///
/// fn store<R: ArtifactRepository>(repo: &R, artifact: &SweepArtifact) -> cserm::Result<()> {
///     let path = repo.artifact_path(Path::new("results"), artifact.n_drops, artifact.seed);
///     repo.save(artifact, &path)
/// }
/// ```
pub trait ArtifactRepository {
    /// File extension written by this repository, without the dot.
    fn extension(&self) -> &'static str;

    /// Save an artifact, replacing any existing one at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be written or serialization fails.
    fn save(&self, artifact: &SweepArtifact, path: &Path) -> Result<()>;

    /// Load an artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be decoded.
    fn load(&self, path: &Path) -> Result<SweepArtifact>;

    /// Canonical artifact location for a run inside `dir`.
    fn artifact_path(&self, dir: &Path, n_drops: usize, seed: u64) -> PathBuf {
        dir.join(format!(
            "{}.{}",
            SweepArtifact::file_stem(n_drops, seed),
            self.extension()
        ))
    }
}
