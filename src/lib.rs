//! mcp-checkup: health checks for configured MCP servers
//! Reads an OpenCode-style JSONC config, classifies each server, runs a
//! category-specific probe suite through an MCP client, and writes a
//! markdown report with troubleshooting tips.

pub mod category;
pub mod checkup;
pub mod config;
pub mod error;
pub mod invoke;
pub mod namespace;
pub mod notify;
pub mod report;
pub mod runner;
pub mod suite;
pub mod transport;

pub use category::{classify, Category};
pub use checkup::{
    describe_failure, discover, execute, run_checkup, CheckupOutcome, CheckupPaths,
    CheckupRequest, DEFAULT_CONFIG_FILE, DEFAULT_REPORT_FILE,
};
pub use config::{
    discover_services, load_services, parse_config, parse_env_ref, resolve_env_vars,
    strip_jsonc, CheckupConfig, LaunchSpec, ServiceEntry,
};
pub use error::{CheckupError, Result};
pub use invoke::{InvokeError, ToolInvoker};
pub use notify::{dispatch, LifecycleEvent, Notification, Notifier, NotifySend};
pub use report::{render, ReportDocument, Summary};
pub use runner::{select_services, Runner, ServiceResult, ServiceStatus, TestRecord};
pub use suite::{suite_for, Cause, Probe, Severity, TestCase, TestOutcome, TestSuite};
pub use transport::McpInvoker;
