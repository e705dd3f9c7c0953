//! Human-readable run statistics
//!
//! This module renders a finished [`CrawlReport`] for the terminal.

use crate::crawler::CrawlReport;
use std::fmt::Write;

/// Renders a report as an indented text block
///
/// # Arguments
///
/// * `report` - The report returned by the crawler
///
/// # Returns
///
/// The text printed by [`print_report`]
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = String::new();
    let status = report
        .status
        .map(|status| status.to_db_string())
        .unwrap_or("unknown");

    let _ = writeln!(out, "=== Crawl Statistics ===\n");
    let _ = writeln!(out, "Overview:");
    if let Some(run_id) = report.run_id {
        let _ = writeln!(out, "  Run: {} ({})", run_id, status);
    } else {
        let _ = writeln!(out, "  Status: {}", status);
    }
    let _ = writeln!(out, "  Duration: {:.1}s", report.elapsed.as_secs_f64());
    let _ = writeln!(out, "  URLs enqueued: {}", report.enqueued);
    let _ = writeln!(out, "  Pages fetched: {}", report.fetched);
    let _ = writeln!(out, "  Fetch failures: {}", report.fetch_failed);
    if report.robots_denied > 0 {
        let _ = writeln!(out, "  Denied by robots.txt: {}", report.robots_denied);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Items:");
    let _ = writeln!(out, "  Extracted: {}", report.extracted);
    let _ = writeln!(out, "  Committed: {}", report.committed);
    let _ = writeln!(out, "  Exported: {}", report.exported);
    let _ = writeln!(out, "  Duplicates: {}", report.duplicates);
    let _ = writeln!(out);

    if !report.dropped.is_empty() {
        let _ = writeln!(out, "Dropped ({}):", report.total_dropped());
        // Most frequent reason first
        let mut reasons: Vec<_> = report.dropped.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (reason, count) in reasons {
            let _ = writeln!(out, "  {}: {}", reason, count);
        }
        let _ = writeln!(out);
    }

    if let Some(fatal) = &report.fatal {
        let _ = writeln!(out, "Fatal error: {}", fatal);
        let _ = writeln!(out);
    }

    let commit_rate = if report.extracted > 0 {
        (report.committed as f64 / report.extracted as f64) * 100.0
    } else {
        0.0
    };
    let _ = writeln!(
        out,
        "Commit Rate: {:.1}% ({} / {} extracted records committed)",
        commit_rate, report.committed, report.extracted
    );

    out
}

/// Prints a report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}
