//! Sequential test runner: executes each service's suite in order and
//! aggregates per-service status.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use futures::FutureExt;

use crate::config::ServiceEntry;
use crate::error::CheckupError;
use crate::invoke::ToolInvoker;
use crate::suite::{suite_for, ProbeContext, Severity, TestOutcome};

/// Display name used for services with no registered suite.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown MCP Server";

/// Troubleshooting note attached to skipped services.
pub const NO_SUITE_TIP: &str = "No test suite available for this server type";

/// Aggregate status of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Success,
    Warning,
    Error,
    Skipped,
}

impl ServiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Success => "success",
            ServiceStatus::Warning => "warning",
            ServiceStatus::Error => "error",
            ServiceStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Severity> for ServiceStatus {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Success => ServiceStatus::Success,
            Severity::Warning => ServiceStatus::Warning,
            Severity::Error => ServiceStatus::Error,
        }
    }
}

/// A named test outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRecord {
    pub name: String,
    pub outcome: TestOutcome,
}

/// Everything recorded for one service during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResult {
    pub service_name: String,
    pub display_name: String,
    pub tests: Vec<TestRecord>,
    pub status: ServiceStatus,
    pub troubleshooting: Vec<String>,
}

impl ServiceResult {
    fn skipped(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            display_name: UNKNOWN_DISPLAY_NAME.to_string(),
            tests: Vec::new(),
            status: ServiceStatus::Skipped,
            troubleshooting: vec![NO_SUITE_TIP.to_string()],
        }
    }

    /// Highest severity seen so far, or `None` before any test ran.
    fn severity(&self) -> Option<Severity> {
        self.tests.iter().map(|t| t.outcome.severity()).max()
    }
}

/// Apply the `server` filter. `None` and `"all"` select everything.
pub fn select_services(
    services: Vec<ServiceEntry>,
    filter: Option<&str>,
) -> crate::Result<Vec<ServiceEntry>> {
    let name = match filter {
        None | Some("all") => return Ok(services),
        Some(name) => name,
    };
    let selected: Vec<ServiceEntry> = services.into_iter().filter(|s| s.name == name).collect();
    if selected.is_empty() {
        return Err(CheckupError::UnknownService(name.to_string()));
    }
    Ok(selected)
}

/// Runs suites one service at a time, one test at a time.
#[derive(Debug, Clone)]
pub struct Runner {
    verbose: bool,
    config_dir: PathBuf,
}

impl Runner {
    /// `config_dir` is handed to probes that need a known-good filesystem root.
    pub fn new(verbose: bool, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            verbose,
            config_dir: config_dir.into(),
        }
    }

    /// Run every enabled service in order.
    pub async fn run<I: ToolInvoker>(
        &self,
        services: &[ServiceEntry],
        invoker: &I,
    ) -> Vec<ServiceResult> {
        let mut results = Vec::with_capacity(services.len());
        for service in services.iter().filter(|s| s.enabled) {
            results.push(self.run_service(service, invoker).await);
        }
        results
    }

    /// Run one service's suite, or mark it skipped when it has none.
    pub async fn run_service<I: ToolInvoker>(
        &self,
        service: &ServiceEntry,
        invoker: &I,
    ) -> ServiceResult {
        let Some(suite) = suite_for(service.category) else {
            tracing::info!(
                service = %service.name,
                category = %service.category,
                "no test suite for category, skipping"
            );
            return ServiceResult::skipped(&service.name);
        };

        tracing::info!(service = %service.name, suite = suite.display_name, "testing MCP server");

        let mut result = ServiceResult {
            service_name: service.name.clone(),
            display_name: suite.display_name.to_string(),
            tests: Vec::with_capacity(suite.tests.len()),
            status: ServiceStatus::Success,
            troubleshooting: Vec::new(),
        };
        let ctx = ProbeContext {
            service: &service.name,
            config_dir: &self.config_dir,
        };

        for case in suite.tests {
            tracing::debug!(service = %service.name, test = case.name, "running test");

            let mut outcome = AssertUnwindSafe(case.probe.run(invoker, ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| TestOutcome::failed(panic_message(panic.as_ref())));

            let severity = outcome.severity();
            match severity {
                Severity::Success => {
                    tracing::debug!(service = %service.name, test = case.name, "test passed");
                }
                Severity::Warning | Severity::Error => {
                    tracing::warn!(
                        service = %service.name,
                        test = case.name,
                        warning = outcome.warning.as_deref().unwrap_or_default(),
                        error = outcome.error.as_deref().unwrap_or_default(),
                        "test did not pass cleanly"
                    );
                    if let Some(tip) = suite.tip_for(&outcome) {
                        result.troubleshooting.push(tip.to_string());
                    }
                }
            }

            if !self.verbose {
                outcome.details = None;
            }
            result.tests.push(TestRecord {
                name: case.name.to_string(),
                outcome,
            });
        }

        result.status = result
            .severity()
            .map(ServiceStatus::from)
            .unwrap_or(ServiceStatus::Skipped);
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("Error - {detail}")
}
