//! Dependency injection container for the simulator.
//!
//! The container owns infrastructure dependencies (the artifact repository
//! and a default seed) and runs experiments with them.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, info};

use super::config::ExperimentConfig;
use crate::{
    Error, Result,
    adapters::JsonArtifactRepository,
    experiment::{RoundMonitoring, SensitivitySweep, SweepArtifact, SweepReport},
    ports::{ArtifactRepository, DatasetSource},
};

/// Application with dependency injection.
///
/// # Examples
///
/// ## Production usage
///
/// ```no_run
/// use cserm::adapters::SyntheticDataset;
/// use cserm::app::{App, ExperimentConfig};
/// use cserm::experiment::RoundMonitoring;
/// use std::path::Path;
///
/// let app = App::new();
/// let (report, path) = app.run_experiment(
///     &ExperimentConfig::default(),
///     &SyntheticDataset::default(),
///     1,
///     Some(0),
///     Path::new("results"),
///     &RoundMonitoring::default(),
/// )?;
/// # Ok::<(), cserm::Error>(())
/// ```
///
/// ## Testing with dependency injection
///
/// ```
/// use cserm::adapters::InMemoryArtifactRepository;
/// use cserm::app::App;
///
/// let app = App::for_testing()
///     .with_repository(InMemoryArtifactRepository::new())
///     .with_default_seed(42)
///     .build();
/// assert_eq!(app.default_seed(), Some(42));
/// ```
pub struct App {
    /// Repository for sweep artifacts
    artifact_repository: Arc<dyn ArtifactRepository + Send + Sync>,
    /// Seed used when a run does not name one
    default_seed: Option<u64>,
}

impl App {
    /// Create a new app with production defaults.
    ///
    /// Uses:
    /// - `JsonArtifactRepository` for artifacts
    /// - No default seed (every run must name one)
    pub fn new() -> Self {
        Self {
            artifact_repository: Arc::new(JsonArtifactRepository::new()),
            default_seed: None,
        }
    }

    /// Create a builder for constructing app with custom dependencies.
    pub fn for_testing() -> AppBuilder {
        AppBuilder::new()
    }

    /// Get the artifact repository.
    pub fn artifact_repository(&self) -> Arc<dyn ArtifactRepository + Send + Sync> {
        Arc::clone(&self.artifact_repository)
    }

    pub fn default_seed(&self) -> Option<u64> {
        self.default_seed
    }

    /// Resolve the seed of a run: the explicit one, else the container default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] when neither is set.
    pub fn resolve_seed(&self, seed: Option<u64>) -> Result<u64> {
        seed.or(self.default_seed)
            .ok_or_else(|| Error::InvalidConfiguration {
                message: "no seed given and no default seed configured".to_string(),
            })
    }

    /// Run the sensitivity experiment and persist its artifact in `dir`.
    ///
    /// Nothing is written to `dir` unless every partition finished, so
    /// configuration errors and diverged runs leave it untouched. Round logs
    /// requested through `monitoring` are written as the rounds end.
    ///
    /// Returns the full report and the artifact path.
    pub fn run_experiment(
        &self,
        config: &ExperimentConfig,
        source: &dyn DatasetSource,
        n_drops: usize,
        seed: Option<u64>,
        dir: &Path,
        monitoring: &RoundMonitoring,
    ) -> Result<(SweepReport, PathBuf)> {
        let seed = self.resolve_seed(seed)?;
        let report = SensitivitySweep::new(config, source)
            .with_monitoring(monitoring.clone())
            .run(n_drops, seed)?;
        let path = self.save_artifact(&report.artifact, dir)?;
        Ok((report, path))
    }

    /// Save an artifact under its canonical name in `dir`.
    pub fn save_artifact(&self, artifact: &SweepArtifact, dir: &Path) -> Result<PathBuf> {
        let path = self
            .artifact_repository
            .artifact_path(dir, artifact.n_drops, artifact.seed);
        self.artifact_repository.save(artifact, &path)?;
        info!(path = %path.display(), partitions = artifact.len(), "saved sweep artifact");
        Ok(path)
    }

    pub fn load_artifact(&self, path: &Path) -> Result<SweepArtifact> {
        self.artifact_repository.load(path)
    }

    /// Load every artifact in `dir` written in this repository's format,
    /// ordered by file name.
    pub fn load_artifacts(&self, dir: &Path) -> Result<Vec<SweepArtifact>> {
        let extension = self.artifact_repository.extension();
        let entries = fs::read_dir(dir).map_err(|source| Error::Io {
            operation: format!("read directory {dir:?}"),
            source,
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_artifact = path.extension().is_some_and(|ext| ext == extension)
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.starts_with("sensitivity_exp_"));
            if is_artifact {
                paths.push(path);
            }
        }
        paths.sort();
        debug!(count = paths.len(), dir = %dir.display(), "found sweep artifacts");
        paths.iter().map(|p| self.load_artifact(p)).collect()
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing app with custom dependencies.
///
/// # Examples
///
/// ```
/// use cserm::adapters::InMemoryArtifactRepository;
/// use cserm::app::AppBuilder;
///
/// let app = AppBuilder::new()
///     .with_repository(InMemoryArtifactRepository::new())
///     .with_default_seed(42)
///     .build();
/// ```
pub struct AppBuilder {
    artifact_repository: Option<Arc<dyn ArtifactRepository + Send + Sync>>,
    default_seed: Option<u64>,
}

impl AppBuilder {
    /// Create a new app builder.
    pub fn new() -> Self {
        Self {
            artifact_repository: None,
            default_seed: None,
        }
    }

    /// Set a custom artifact repository.
    pub fn with_repository<R: ArtifactRepository + Send + Sync + 'static>(
        mut self,
        repo: R,
    ) -> Self {
        self.artifact_repository = Some(Arc::new(repo));
        self
    }

    /// Set a default seed for runs that do not name one.
    pub fn with_default_seed(mut self, seed: u64) -> Self {
        self.default_seed = Some(seed);
        self
    }

    /// Build the app with the configured dependencies.
    ///
    /// If no repository was specified, uses `JsonArtifactRepository` by default.
    pub fn build(self) -> App {
        App {
            artifact_repository: self
                .artifact_repository
                .unwrap_or_else(|| Arc::new(JsonArtifactRepository::new())),
            default_seed: self.default_seed,
        }
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
