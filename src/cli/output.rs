//! Output formatting for CLI

use crate::analysis::{AccuracySummary, DropSummary};

/// Print a section header
pub fn print_section(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{title}");
    println!("{}", "=".repeat(60));
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:20} {}", format!("{}:", key), value);
}

/// Format an accuracy as a percentage
pub fn format_accuracy(accuracy: f64) -> String {
    format!("{:.2}%", accuracy * 100.0)
}

fn format_summary(summary: Option<AccuracySummary>) -> String {
    match summary {
        Some(s) => format!("{:.4} ± {:.4} (n={})", s.mean, s.std_dev, s.count),
        None => "-".to_string(),
    }
}

/// Print one line per drop count comparing CSERM with SERM
pub fn print_drop_table(summaries: &[DropSummary]) {
    println!(
        "  {:>7}  {:>4}  {:<28}  {:<28}  {:>8}",
        "n_drops", "runs", "CSERM", "SERM", "gap"
    );
    for s in summaries {
        let gap = s
            .mean_gap()
            .map(|g| format!("{g:+.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>7}  {:>4}  {:<28}  {:<28}  {:>8}",
            s.n_drops,
            s.runs,
            format_summary(s.cserm),
            format_summary(s.serm),
            gap
        );
    }
}
