//! Colored terminal summary printed after a run.

use colored::Colorize;

use super::ReportOutcome;
use crate::scan::{ComponentSummary, SeverityCounts};

pub fn write_pretty(
    target: &str,
    analyzed: usize,
    summaries: &[ComponentSummary],
    outcome: &ReportOutcome,
) {
    // Header
    println!();
    print!("  ");
    print!("{}", "repocheck".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanning:   ".dimmed());
    println!("{}", target);
    print!("  {}", "Components: ".dimmed());
    println!("{} analyzed, {} with findings", analyzed, summaries.len());
    println!();

    if !summaries.is_empty() {
        write_components(summaries);
        println!();
    }

    write_outcome(outcome);
    println!();

    write_final_status(summaries);
    println!();
}

fn write_components(summaries: &[ComponentSummary]) {
    println!("  {}", "Components:".bold());
    println!();

    let width = summaries
        .iter()
        .map(|s| s.component.relative_path.len())
        .max()
        .unwrap_or(0)
        .min(48);

    for s in summaries {
        let path = format!("{:<width$}", s.component.relative_path, width = width);
        print!("    {}  ", path.blue());
        write_counts(&s.counts);
        println!();
    }
}

fn write_counts(counts: &SeverityCounts) {
    let parts: Vec<String> = counts
        .labels()
        .into_iter()
        .map(|label| {
            let n = counts.get(label).unwrap_or(0);
            format!("{} {}", colored_count(label, n), label.dimmed())
        })
        .collect();
    print!("{}", parts.join("  "));
}

fn colored_count(severity: &str, n: usize) -> colored::ColoredString {
    let s = n.to_string();
    match severity {
        "error" => s.red().bold(),
        "warning" => s.yellow(),
        "performance" | "portability" => s.magenta(),
        "style" => s.cyan(),
        _ => s.normal(),
    }
}

fn write_outcome(outcome: &ReportOutcome) {
    print!("  {}", "Reports:    ".dimmed());
    print!("{} written", outcome.written.len());
    if !outcome.failed.is_empty() {
        print!(", {}", format!("{} failed", outcome.failed.len()).red());
    }
    println!();

    if let Some(dir) = outcome.written.first().and_then(|p| p.parent()) {
        print!("  {}", "Output:     ".dimmed());
        println!("{}", dir.display());
    }
}

fn write_final_status(summaries: &[ComponentSummary]) {
    let mut total = SeverityCounts::default();
    for s in summaries {
        total.merge(&s.counts);
    }

    if total.total() == 0 {
        println!("  {}", "✓ No findings".green());
        return;
    }

    print!("  {}", format!("✗ {} findings", total.total()).red());
    print!("  ");
    write_counts(&total);
    println!();
}
