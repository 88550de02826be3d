//! Run command - Feature-drop sensitivity experiment

use std::{fs, path::PathBuf};

use anyhow::{Result, anyhow};
use clap::Parser;

use super::ArtifactFormat;
use crate::{
    adapters::{CsvDataset, SyntheticDataset, save_classifier},
    app::ExperimentConfig,
    cli::output::{format_accuracy, print_kv, print_section},
    experiment::{RoundMonitoring, SweepArtifact, SweepReport},
    export::{LabelledTrajectory, TrajectoryCsvExporter},
    ports::DatasetSource,
};

#[derive(Parser, Debug)]
#[command(about = "Compare CSERM and SERM with n_drops causal features hidden")]
pub struct RunArgs {
    /// Number of causal features moved to the unobserved block
    pub n_drops: usize,

    /// Seed for partition sampling, model initialisation and the cost model
    pub seed: u64,

    /// Directory receiving the result artifact
    pub path: PathBuf,

    /// CSV dataset (label in the last column); synthetic data when omitted
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// The CSV file starts with a header row
    #[arg(long)]
    pub headers: bool,

    /// Rows of synthetic data when no CSV is given
    #[arg(long, default_value_t = 30_000)]
    pub synthetic_rows: usize,

    /// JSON experiment configuration; defaults reproduce the spam experiment
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the number of retraining rounds
    #[arg(long)]
    pub time_steps: Option<usize>,

    /// Override the epoch cap of every fit
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Override the number of partitions evaluated
    #[arg(long)]
    pub max_partitions: Option<usize>,

    /// Artifact format
    #[arg(long, value_enum, default_value_t = ArtifactFormat::Json)]
    pub format: ArtifactFormat,

    /// Write every CSERM round trajectory to this CSV file
    #[arg(long)]
    pub trajectory_csv: Option<PathBuf>,

    /// Directory receiving the chosen CSERM classifier of each partition
    #[arg(long)]
    pub save_model: Option<PathBuf>,

    /// Show a progress bar over rounds
    #[arg(long)]
    pub progress: bool,

    /// Directory receiving a JSONL log of every CSERM round, one file per partition
    #[arg(long)]
    pub jsonl: Option<PathBuf>,
}

impl RunArgs {
    fn experiment_config(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::load(path)
                .map_err(|e| anyhow!("Failed to load config {}: {e}", path.display()))?,
            None => ExperimentConfig::default(),
        };
        if let Some(time_steps) = self.time_steps {
            config = config.with_time_steps(time_steps);
        }
        if let Some(epochs) = self.epochs {
            config = config.with_epochs(epochs);
        }
        if let Some(max) = self.max_partitions {
            config = config.with_max_partitions(max);
        }
        config
            .validate()
            .map_err(|e| anyhow!("Invalid experiment configuration: {e}"))?;
        Ok(config)
    }

    fn dataset(&self, config: &ExperimentConfig) -> Result<Box<dyn DatasetSource>> {
        match &self.data {
            Some(path) => {
                let source = CsvDataset::open_with_headers(path, self.headers)
                    .map_err(|e| anyhow!("Failed to open dataset {}: {e}", path.display()))?;
                Ok(Box::new(source))
            }
            None => Ok(Box::new(SyntheticDataset::new(
                self.synthetic_rows,
                config.total_dim,
            ))),
        }
    }
}

pub fn execute(args: RunArgs) -> Result<()> {
    let config = args.experiment_config()?;
    let source = args.dataset(&config)?;
    let app = args.format.app();

    println!(
        "{}",
        SweepArtifact::file_stem(args.n_drops, args.seed)
    );
    let (report, path) = app.run_experiment(
        &config,
        source.as_ref(),
        args.n_drops,
        Some(args.seed),
        &args.path,
        &RoundMonitoring {
            progress: args.progress,
            jsonl_dir: args.jsonl.clone(),
        },
    )?;

    if let Some(csv_path) = &args.trajectory_csv {
        let trajectories: Vec<LabelledTrajectory<'_>> = report
            .partitions
            .iter()
            .enumerate()
            .map(|(i, outcome)| LabelledTrajectory {
                label: "CSERM",
                partition: i,
                rows: &outcome.cserm_trajectory,
            })
            .collect();
        TrajectoryCsvExporter::export(csv_path, &trajectories)?;
    }

    if let Some(dir) = &args.save_model {
        fs::create_dir_all(dir)
            .map_err(|e| anyhow!("Failed to create model directory {}: {e}", dir.display()))?;
        for (i, outcome) in report.partitions.iter().enumerate() {
            let stem = SweepArtifact::file_stem(args.n_drops, args.seed);
            save_classifier(
                &outcome.cserm_model,
                &dir.join(format!("{stem}_partition={i}.msgpack")),
            )?;
        }
    }

    print_report(&report);
    print_kv("Artifact", &path.display().to_string());
    Ok(())
}

fn print_report(report: &SweepReport) {
    print_section("Sensitivity run");
    for (i, outcome) in report.partitions.iter().enumerate() {
        println!("\nPartition {i}: {}", outcome.partition);
        print_kv("h* accuracy", &format_accuracy(outcome.h_star_accuracy));
        print_kv(
            "CSERM accuracy",
            &outcome
                .cserm
                .accuracy_test()
                .map(format_accuracy)
                .unwrap_or_else(|_| "-".to_string()),
        );
        print_kv(
            "SERM accuracy",
            &outcome
                .serm
                .accuracy_test()
                .map(format_accuracy)
                .unwrap_or_else(|_| "-".to_string()),
        );
        print_kv(
            "Chosen round",
            &outcome
                .cserm
                .chosen_round
                .map_or_else(|| "clean fit".to_string(), |r| r.to_string()),
        );
    }
}
