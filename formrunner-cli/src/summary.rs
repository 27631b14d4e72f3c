use std::path::Path;

use colored::*;
use formrunner::{RunOutcome, RunReport};

/// Print a run report for humans.
pub fn display(report: &RunReport, saved_to: Option<&Path>) {
    println!();
    println!("{}", "═".repeat(60));
    match report.outcome() {
        RunOutcome::Success => println!("{} {}", "✅ SUCCESS:".green().bold(), report.sheet),
        RunOutcome::Partial => println!(
            "{} {} ({} failed cells)",
            "⚠️  PARTIAL:".yellow().bold(),
            report.sheet,
            report.failures.len()
        ),
    }

    println!("{}", "─".repeat(60));
    println!("📊 Run Details:");
    println!("   • Rows visited: {}", report.rows_visited);
    println!("   • Commands dispatched: {}", report.commands_dispatched);
    println!("   • Subsequences: {}", report.subsequences.len());
    println!("   • Duration: {:.2}s", report.duration_ms as f64 / 1000.0);
    if let Some(path) = &report.artifact_path {
        println!("   • Artifact: {path}");
    }
    if let Some(path) = saved_to {
        println!("   • Saved to: {}", path.display());
    }

    if !report.writes.is_empty() {
        println!("{}", "─".repeat(60));
        println!("📝 Computed cells:");
        for write in &report.writes {
            println!("   {} {} = {}", write.cell.cyan(), write.field, write.value);
        }
    }

    if !report.failures.is_empty() {
        println!("{}", "─".repeat(60));
        println!("{}", "Failures:".red().bold());
        for failure in &report.failures {
            println!(
                "  {} {} [{}] {}: {}",
                "✗".red(),
                failure.cell,
                failure.header,
                failure.command,
                failure.error
            );
        }
    }
    println!("{}", "═".repeat(60));
}
