//! Statistics reporting.

use console::style;

use crate::download::{RunResult, RunStats};
use crate::fs::RelocationReport;

/// Print per-kind download counts for a run.
pub fn print_run_stats(stats: &RunStats) {
    println!();
    println!("{}", style("Statistics:").bold());
    for (kind, count) in &stats.downloaded {
        println!("  {:<11} {}", format!("{}:", kind), count);
    }
    println!("  Duplicates: {}", stats.duplicate_count);
    println!("  Skipped:    {} (not requested or filtered)", stats.skipped_count);
    println!("  No media:   {}", stats.no_media_count);
    println!("  Total:      {} downloaded", stats.total_downloaded());
}

/// Print the end-of-run summary.
pub fn print_run_summary(result: &RunResult) {
    print_run_stats(&result.stats);

    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!(
        "Processed {} message(s) in {} batch(es), up to message {}",
        result.processed(),
        result.stats.batches,
        result.last_processed
    );
    if !result.missing.is_empty() {
        println!(
            "  {} backlog message(s) no longer exist and were dropped",
            style(result.missing.len()).yellow()
        );
    }
    if result.failed.is_empty() {
        println!("  {}", style("No failed downloads").green());
    } else {
        println!(
            "  {} download(s) failed and were written to the retry backlog",
            style(result.failed.len()).red()
        );
    }
    if result.cancelled {
        println!("  {}", style("Stopped early on request").yellow());
    }
    println!("{}", style("═".repeat(50)).dim());
}

/// Print a summary line for an archive relocation.
pub fn print_relocation_summary(report: &RelocationReport) {
    println!(
        "Archived: {} moved ({} already present)",
        style(report.moved.len()).green(),
        style(report.already_archived.len()).yellow()
    );
}
