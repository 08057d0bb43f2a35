use std::fmt::Write as _;

use anyhow::{Context as _, Result};
use podlogs_core::{Outcome, Report};

pub fn print(report: &Report, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(report).context("failed to serialize report")?;
        println!("{rendered}");
    } else {
        print!("{}", render_text(report));
    }
    Ok(())
}

/// One line per fragment followed by a totals line.
#[must_use]
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    for entry in report.entries() {
        let pod = entry.pod.as_deref().unwrap_or("-");
        let detail = match &entry.outcome {
            Outcome::Persisted { path, bytes } => {
                format!("wrote {} ({bytes} bytes)", path.display())
            }
            Outcome::FetchFailed { error } => format!("fetch failed: {error}"),
            Outcome::WriteFailed { error } => format!("write failed: {error}"),
            Outcome::NotFound => "no pod name contains this fragment".to_owned(),
        };
        let _ = writeln!(out, "{} -> {pod}: {detail}", entry.fragment);
    }

    let _ = writeln!(
        out,
        "finished downloading logs from {}: {} written, {} failed, {} not found",
        report.namespace(),
        report.persisted_count(),
        report.failed_count(),
        report.not_found_count()
    );
    out
}
