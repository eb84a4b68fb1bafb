//! Markdown health report rendering and persistence.

use std::fmt::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::CheckupError;
use crate::runner::{ServiceResult, ServiceStatus};
use crate::suite::Severity;

/// Per-status counts across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub success: usize,
    pub warning: usize,
    pub error: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_results(results: &[ServiceResult]) -> Self {
        let mut summary = Summary {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                ServiceStatus::Success => summary.success += 1,
                ServiceStatus::Warning => summary.warning += 1,
                ServiceStatus::Error => summary.error += 1,
                ServiceStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}

/// A rendered report, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub generated_at: DateTime<Utc>,
    pub summary: Summary,
    pub markdown: String,
}

fn status_marker(status: ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Success => "✅",
        ServiceStatus::Warning => "⚠️",
        ServiceStatus::Error => "❌",
        ServiceStatus::Skipped => "⏭️",
    }
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => "✅",
        Severity::Warning => "⚠️",
        Severity::Error => "❌",
    }
}

/// Render results as markdown. Output depends only on the inputs.
pub fn render(results: &[ServiceResult], generated_at: DateTime<Utc>) -> ReportDocument {
    let summary = Summary::from_results(results);
    let mut out = String::with_capacity(1024);

    // Writing to a String cannot fail.
    let _ = writeln!(out, "# MCP Health Check Report\n");
    let _ = writeln!(
        out,
        "Generated: {}\n",
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    );

    out.push_str("## Summary\n\n");
    let _ = writeln!(out, "- Total MCP Servers: {}", summary.total);
    let _ = writeln!(out, "- ✅ Success: {}", summary.success);
    let _ = writeln!(out, "- ⚠️ Warning: {}", summary.warning);
    let _ = writeln!(out, "- ❌ Error: {}", summary.error);
    if summary.skipped > 0 {
        let _ = writeln!(out, "- ⏭️ Skipped: {}", summary.skipped);
    }
    out.push('\n');

    out.push_str("## Detailed Results\n\n");
    for result in results {
        let _ = writeln!(
            out,
            "### {} {} ({})\n",
            status_marker(result.status),
            result.display_name,
            result.service_name
        );

        for test in &result.tests {
            let outcome = &test.outcome;
            let _ = writeln!(out, "- {} {}", severity_marker(outcome.severity()), test.name);
            if let Some(warning) = &outcome.warning {
                let _ = writeln!(out, "  - Warning: {warning}");
            }
            if let Some(error) = &outcome.error {
                let _ = writeln!(out, "  - Error: {error}");
            }
            if let Some(details) = &outcome.details {
                let _ = writeln!(out, "  - Details: `{details}`");
            }
        }

        if !result.troubleshooting.is_empty() {
            out.push_str("\n**Troubleshooting:**\n");
            for tip in &result.troubleshooting {
                let _ = writeln!(out, "- {tip}");
            }
        }
        out.push('\n');
    }

    ReportDocument {
        generated_at,
        summary,
        markdown: out,
    }
}

/// Write the report, replacing any existing file at `path`.
pub async fn persist(doc: &ReportDocument, path: &Path) -> crate::Result<()> {
    tokio::fs::write(path, doc.markdown.as_bytes())
        .await
        .map_err(|e| CheckupError::ReportWrite(path.to_path_buf(), e.to_string()))?;
    tracing::info!(path = ?path, "report written");
    Ok(())
}
