//! JSON implementation of the artifact repository.
//!
//! This is the default format: the artifact is a small object with the
//! per-partition test accuracies, readable by any downstream tool.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use crate::{Result, error::Error, experiment::SweepArtifact, ports::ArtifactRepository};

/// Pretty-printed JSON artifact repository.
///
/// # Examples
///
/// ```no_run
/// use cserm::adapters::JsonArtifactRepository;
/// use cserm::experiment::SweepArtifact;
/// use cserm::ports::ArtifactRepository;
/// use std::path::Path;
///
/// let repo = JsonArtifactRepository::new();
/// let artifact = SweepArtifact::new(0, 1);
/// let path = repo.artifact_path(Path::new("results"), 0, 1);
/// repo.save(&artifact, &path)?;
/// # Ok::<(), cserm::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArtifactRepository;

impl JsonArtifactRepository {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactRepository for JsonArtifactRepository {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn save(&self, artifact: &SweepArtifact, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                operation: format!("create directory {parent:?}"),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| Error::Io {
            operation: format!("create file {path:?}"),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, artifact)?;
        writer.write_all(b"\n").map_err(|source| Error::Io {
            operation: format!("write file {path:?}"),
            source,
        })?;
        writer.flush().map_err(|source| Error::Io {
            operation: format!("flush file {path:?}"),
            source,
        })?;
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<SweepArtifact> {
        let file = File::open(path).map_err(|source| Error::Io {
            operation: format!("open file {path:?}"),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
