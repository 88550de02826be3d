//! Summarize command - Aggregate sweep artifacts per number of dropped features

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;

use super::ArtifactFormat;
use crate::{
    analysis::summarize,
    cli::output::{print_drop_table, print_section},
};

#[derive(Parser, Debug)]
#[command(about = "Summarize result artifacts: mean, std and count per n_drops")]
pub struct SummarizeArgs {
    /// Directory holding the result artifacts
    pub dir: PathBuf,

    /// Artifact format to read
    #[arg(long, value_enum, default_value_t = ArtifactFormat::Json)]
    pub format: ArtifactFormat,

    /// Print the summary as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: SummarizeArgs) -> Result<()> {
    let app = args.format.app();
    let artifacts = app.load_artifacts(&args.dir)?;
    if artifacts.is_empty() {
        return Err(anyhow!(
            "No result artifacts found in {}",
            args.dir.display()
        ));
    }

    let summaries = summarize(&artifacts);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        print_section(&format!("{} artifacts in {}", artifacts.len(), args.dir.display()));
        print_drop_table(&summaries);
    }
    Ok(())
}
