//! The checkup command: discover, filter, run, report.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::config::{load_services, ServiceEntry};
use crate::error::CheckupError;
use crate::invoke::ToolInvoker;
use crate::report::{persist, render, ReportDocument, Summary};
use crate::runner::{select_services, Runner, ServiceResult, ServiceStatus};
use crate::suite::Severity;

/// Config file name looked up by default.
pub const DEFAULT_CONFIG_FILE: &str = "opencode.jsonc";

/// Report file name written next to the config by default.
pub const DEFAULT_REPORT_FILE: &str = "mcpTest.md";

/// Parameters of one checkup invocation.
#[derive(Debug, Clone, Default)]
pub struct CheckupRequest {
    /// Name of one configured server; `None` or `"all"` tests every server.
    pub server: Option<String>,
    /// Keep full result payloads in the report.
    pub verbose: bool,
}

/// Where to read the config and write the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckupPaths {
    pub config: PathBuf,
    pub report: PathBuf,
}

impl CheckupPaths {
    /// Report goes next to the config file.
    pub fn beside_config(config: impl Into<PathBuf>) -> Self {
        let config = config.into();
        let report = config_dir(&config).join(DEFAULT_REPORT_FILE);
        Self { config, report }
    }

    /// Directory holding the config file.
    pub fn config_dir(&self) -> PathBuf {
        config_dir(&self.config)
    }
}

fn config_dir(config: &Path) -> PathBuf {
    match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load the config and apply the `server` filter.
///
/// Fails with `NoServicesConfigured` when nothing is enabled and with
/// `UnknownService` when the filter matches nothing.
pub async fn discover(
    paths: &CheckupPaths,
    request: &CheckupRequest,
) -> crate::Result<Vec<ServiceEntry>> {
    let services = load_services(&paths.config).await?;
    if services.is_empty() {
        return Err(CheckupError::NoServicesConfigured);
    }
    select_services(services, request.server.as_deref())
}

/// Everything a finished checkup produced.
#[derive(Debug, Clone)]
pub struct CheckupOutcome {
    pub services: Vec<ServiceEntry>,
    pub results: Vec<ServiceResult>,
    pub report: ReportDocument,
    pub report_path: PathBuf,
}

/// Run the suites for already-discovered services and persist the report.
///
/// `clock` is read once, after the last test, for the report timestamp.
pub async fn execute<I, C>(
    services: Vec<ServiceEntry>,
    paths: &CheckupPaths,
    verbose: bool,
    invoker: &I,
    clock: C,
) -> crate::Result<CheckupOutcome>
where
    I: ToolInvoker,
    C: FnOnce() -> DateTime<Utc>,
{
    let runner = Runner::new(verbose, paths.config_dir());
    let results = runner.run(&services, invoker).await;
    let report = render(&results, clock());
    persist(&report, &paths.report).await?;

    Ok(CheckupOutcome {
        services,
        results,
        report,
        report_path: paths.report.clone(),
    })
}

/// `discover` followed by `execute`.
pub async fn run_checkup<I, C>(
    paths: &CheckupPaths,
    request: &CheckupRequest,
    invoker: &I,
    clock: C,
) -> crate::Result<CheckupOutcome>
where
    I: ToolInvoker,
    C: FnOnce() -> DateTime<Utc>,
{
    let services = discover(paths, request).await?;
    execute(services, paths, request.verbose, invoker, clock).await
}

/// One-line, user-facing description of a failed checkup.
pub fn describe_failure(err: &CheckupError) -> String {
    match err {
        CheckupError::NoServicesConfigured => {
            "❌ No MCP servers found in configuration".to_string()
        }
        CheckupError::UnknownService(name) => {
            format!("❌ Server '{name}' not found in configuration")
        }
        other => format!("❌ Error running MCP tests: {other}"),
    }
}

impl CheckupOutcome {
    pub fn summary(&self) -> Summary {
        self.report.summary
    }

    /// Console transcript: what was found, how each test went, where the
    /// report is, and the totals.
    pub fn console_summary(&self) -> String {
        let mut out = String::from("🔍 MCP Health Check & Troubleshoot Tool\n\n");

        let _ = writeln!(out, "Found {} MCP server(s) to test:", self.services.len());
        for service in &self.services {
            let _ = writeln!(out, "  - {} ({})", service.name, service.category);
        }

        for result in &self.results {
            if result.status == ServiceStatus::Skipped {
                let _ = writeln!(out, "\n## Skipping {}", result.service_name);
            } else {
                let _ = writeln!(
                    out,
                    "\n## Testing {} ({})",
                    result.display_name, result.service_name
                );
            }
            for test in &result.tests {
                let outcome = &test.outcome;
                let _ = match outcome.severity() {
                    Severity::Success => writeln!(out, "    ✅ {}: Success", test.name),
                    Severity::Warning => writeln!(
                        out,
                        "    ⚠️ {}: {}",
                        test.name,
                        outcome.warning.as_deref().unwrap_or_default()
                    ),
                    Severity::Error => match &outcome.error {
                        Some(error) => writeln!(out, "    ❌ {}: Failed - {}", test.name, error),
                        None => writeln!(out, "    ❌ {}: Failed", test.name),
                    },
                };
                if let Some(details) = &outcome.details {
                    let pretty = serde_json::to_string_pretty(details).unwrap_or_default();
                    let _ = writeln!(out, "    Details: {pretty}");
                }
            }
            if !result.troubleshooting.is_empty() {
                out.push_str("\n  Troubleshooting Tips:\n");
                for tip in &result.troubleshooting {
                    let _ = writeln!(out, "    - {tip}");
                }
            }
        }

        let summary = self.summary();
        let _ = writeln!(out, "\n📄 Report saved to: {}", self.report_path.display());
        out.push_str("\nSummary:\n");
        let _ = writeln!(out, "- Total: {} servers", summary.total);
        let _ = writeln!(out, "- Success: {}", summary.success);
        let _ = writeln!(out, "- Warning: {}", summary.warning);
        let _ = writeln!(out, "- Error: {}", summary.error);
        if summary.skipped > 0 {
            let _ = writeln!(out, "- Skipped: {}", summary.skipped);
        }
        out
    }
}
