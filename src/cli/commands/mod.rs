//! Subcommands of the `cserm` binary

pub mod run;
pub mod summarize;

use clap::ValueEnum;

use crate::{
    adapters::{JsonArtifactRepository, MsgPackArtifactRepository},
    app::{App, AppBuilder},
};

/// On-disk format of sweep artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ArtifactFormat {
    #[default]
    Json,
    Msgpack,
}

impl ArtifactFormat {
    /// App wired with the repository for this format.
    pub fn app(self) -> App {
        match self {
            ArtifactFormat::Json => AppBuilder::new()
                .with_repository(JsonArtifactRepository::new())
                .build(),
            ArtifactFormat::Msgpack => AppBuilder::new()
                .with_repository(MsgPackArtifactRepository::new())
                .build(),
        }
    }
}
