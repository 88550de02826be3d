//! Command-line entry points driven in-process.

mod common;

use std::fs;

use clap::Parser;
use cserm::cli::commands::{
    run::{self, RunArgs},
    summarize::{self, SummarizeArgs},
};
use tempfile::TempDir;

fn run_args(dir: &TempDir, n_drops: &str, seed: &str, extra: &[&str]) -> RunArgs {
    let config = dir.path().join("config.json");
    common::small_config().save(&config).unwrap();
    let out = dir.path().join("results");
    let mut argv = vec![
        "run".to_string(),
        n_drops.to_string(),
        seed.to_string(),
        out.display().to_string(),
        "--synthetic-rows".to_string(),
        "2000".to_string(),
        "--config".to_string(),
        config.display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    RunArgs::parse_from(argv)
}

#[test]
fn run_writes_named_artifact_with_both_accuracy_lists() {
    let dir = TempDir::new().unwrap();
    run::execute(run_args(&dir, "1", "0", &[])).unwrap();

    let path = dir
        .path()
        .join("results/sensitivity_exp_n_drops=1_seed=0.json");
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let cserm = raw["cserm_test_accs"].as_array().unwrap();
    let serm = raw["serm_test_accs"].as_array().unwrap();
    assert_eq!(cserm.len(), 2);
    assert_eq!(serm.len(), 2);
}

#[test]
fn rerun_overwrites_the_artifact() {
    let dir = TempDir::new().unwrap();
    run::execute(run_args(&dir, "0", "2", &[])).unwrap();
    let path = dir
        .path()
        .join("results/sensitivity_exp_n_drops=0_seed=2.json");
    let first = fs::read_to_string(&path).unwrap();

    run::execute(run_args(&dir, "0", "2", &[])).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), first);
    assert_eq!(fs::read_dir(dir.path().join("results")).unwrap().count(), 1);
}

#[test]
fn too_many_drops_leaves_no_artifact() {
    let dir = TempDir::new().unwrap();
    assert!(run::execute(run_args(&dir, "3", "0", &[])).is_err());
    assert!(!dir.path().join("results").exists());
}

#[test]
fn optional_outputs_are_written() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("trajectory.csv");
    let models = dir.path().join("models");
    run::execute(run_args(
        &dir,
        "1",
        "1",
        &[
            "--trajectory-csv",
            csv.to_str().unwrap(),
            "--save-model",
            models.to_str().unwrap(),
            "--max-partitions",
            "1",
        ],
    ))
    .unwrap();

    let text = fs::read_to_string(&csv).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.starts_with("label,partition,round,"));
    assert!(text.lines().skip(1).all(|l| l.starts_with("CSERM,0,")));
    assert!(
        models
            .join("sensitivity_exp_n_drops=1_seed=1_partition=0.msgpack")
            .exists()
    );
}

#[test]
fn jsonl_flag_logs_every_round_per_partition() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("rounds");
    run::execute(run_args(
        &dir,
        "1",
        "0",
        &["--jsonl", logs.to_str().unwrap()],
    ))
    .unwrap();

    for partition in 0..2 {
        let path = logs.join(format!(
            "sensitivity_exp_n_drops=1_seed=0_partition={partition}.jsonl"
        ));
        let lines: Vec<serde_json::Value> = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 1 + 3);
        assert_eq!(lines[0]["status"], "initial");
        for (round, line) in lines[1..].iter().enumerate() {
            assert_eq!(line["round"], round);
            assert_eq!(line["status"], "completed");
        }
    }
    assert_eq!(fs::read_dir(&logs).unwrap().count(), 2);
}

#[test]
fn summarize_reads_what_run_wrote() {
    let dir = TempDir::new().unwrap();
    run::execute(run_args(&dir, "0", "0", &[])).unwrap();
    run::execute(run_args(&dir, "1", "0", &[])).unwrap();

    let results = dir.path().join("results");
    summarize::execute(SummarizeArgs::parse_from([
        "summarize",
        results.to_str().unwrap(),
    ]))
    .unwrap();
    summarize::execute(SummarizeArgs::parse_from([
        "summarize",
        results.to_str().unwrap(),
        "--json",
    ]))
    .unwrap();

    let empty = TempDir::new().unwrap();
    assert!(
        summarize::execute(SummarizeArgs::parse_from([
            "summarize",
            empty.path().to_str().unwrap(),
        ]))
        .is_err()
    );
}
