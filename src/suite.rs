//! Static test registry: one suite of smoke tests per [`Category`].
//!
//! Each test case is a [`Probe`] that calls one or more tools through a
//! [`ToolInvoker`] and classifies what comes back. Probes never return an
//! error: invocation failures are folded into a failing [`TestOutcome`].

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::category::Category;
use crate::checkup::DEFAULT_CONFIG_FILE;
use crate::invoke::{is_empty_collection, is_truthy, InvokeError, ToolInvoker};
use crate::namespace::namespaced_tool_name;

/// Result of a single probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestOutcome {
    pub success: bool,
    pub warning: Option<String>,
    pub error: Option<String>,
    pub details: Option<Value>,
}

/// Severity of a test outcome or service result, ordered by escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl TestOutcome {
    /// Success decided by `success`, with no warning or error text.
    fn checked(success: bool, details: Value) -> Self {
        Self {
            success,
            details: Some(details),
            ..Default::default()
        }
    }

    /// Failing outcome carrying an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// A warning outranks a failed `success` flag; a failure without a
    /// warning is an error.
    pub fn severity(&self) -> Severity {
        if self.warning.is_some() {
            Severity::Warning
        } else if self.success {
            Severity::Success
        } else {
            Severity::Error
        }
    }
}

/// Failure cause keys used to pick a troubleshooting tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    ConnectionError,
    ConnectionClosed,
    PermissionDenied,
    Timeout,
    DatabaseLocked,
    RateLimited,
    PortInUse,
    ServerNotInstalled,
    NoResults,
    NoTables,
    NoContent,
    InvalidUrl,
    UnknownOperations,
    AutoStart,
}

/// Ordered (needle, cause) table matched against lowercased messages.
const CAUSE_KEYWORDS: &[(&str, Cause)] = &[
    ("connection closed", Cause::ConnectionClosed),
    ("connection", Cause::ConnectionError),
    ("permission", Cause::PermissionDenied),
    ("timeout", Cause::Timeout),
    ("timed out", Cause::Timeout),
    ("locked", Cause::DatabaseLocked),
    ("rate limit", Cause::RateLimited),
    ("429", Cause::RateLimited),
    ("address already in use", Cause::PortInUse),
    ("eaddrinuse", Cause::PortInUse),
    ("not installed", Cause::ServerNotInstalled),
    ("not found", Cause::ServerNotInstalled),
    ("no such file", Cause::ServerNotInstalled),
    ("no results", Cause::NoResults),
    ("no content", Cause::NoContent),
    ("invalid url", Cause::InvalidUrl),
    ("manual testing", Cause::UnknownOperations),
];

impl Cause {
    /// First cause whose keyword appears in `message`, case-insensitively.
    pub fn detect(message: &str) -> Option<Cause> {
        let lowered = message.to_lowercase();
        CAUSE_KEYWORDS
            .iter()
            .find(|(needle, _)| lowered.contains(needle))
            .map(|(_, cause)| *cause)
    }
}

/// What a probe gets to know about the service under test.
#[derive(Debug, Clone, Copy)]
pub struct ProbeContext<'a> {
    pub service: &'a str,
    /// Directory holding the config file; used as a known-good search root.
    pub config_dir: &'a Path,
}

/// The closed set of smoke tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    ListAllowedDirectories,
    SearchFiles,
    BasicSearch,
    ListTables,
    SqliteRoundTrip,
    ChromaListCollections,
    ChromaCrud,
    DeepWikiFetch,
    GenericOperation,
}

/// Candidate operation suffixes tried by the generic probe, in order.
const GENERIC_OPERATIONS: &[&str] = &["list", "get", "query", "status"];

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Probe {
    /// Run the probe. Invocation errors become a failing outcome.
    pub async fn run<I: ToolInvoker>(self, invoker: &I, ctx: ProbeContext<'_>) -> TestOutcome {
        let result = match self {
            Probe::ListAllowedDirectories => {
                truthy_call(invoker, ctx.service, "list_allowed_directories", json!({})).await
            }
            Probe::SearchFiles => {
                let params = json!({
                    "path": ctx.config_dir.display().to_string(),
                    "pattern": DEFAULT_CONFIG_FILE,
                });
                truthy_call(invoker, ctx.service, "search_files", params).await
            }
            Probe::BasicSearch => basic_search(invoker, ctx.service).await,
            Probe::ListTables => truthy_call(invoker, ctx.service, "list_tables", json!({})).await,
            Probe::SqliteRoundTrip => sqlite_round_trip(invoker, ctx.service).await,
            Probe::ChromaListCollections => {
                truthy_call(invoker, ctx.service, "chroma_list_collections", json!({})).await
            }
            Probe::ChromaCrud => chroma_crud(invoker, ctx.service).await,
            Probe::DeepWikiFetch => deepwiki_fetch(invoker, ctx.service).await,
            Probe::GenericOperation => return generic_operation(invoker, ctx.service).await,
        };
        result.unwrap_or_else(|e| TestOutcome::failed(e.to_string()))
    }
}

async fn truthy_call<I: ToolInvoker>(
    invoker: &I,
    service: &str,
    tool: &str,
    params: Value,
) -> Result<TestOutcome, InvokeError> {
    let result = invoker
        .call_tool(&namespaced_tool_name(service, tool), args(params))
        .await?;
    Ok(TestOutcome::checked(is_truthy(&result), result))
}

async fn basic_search<I: ToolInvoker>(
    invoker: &I,
    service: &str,
) -> Result<TestOutcome, InvokeError> {
    let result = invoker
        .call_tool(
            &namespaced_tool_name(service, "one_search"),
            args(json!({"query": "test", "limit": 5})),
        )
        .await?;
    let mut outcome = TestOutcome::checked(is_truthy(&result), result.clone());
    if !is_truthy(&result) || is_empty_collection(&result) {
        outcome.warning = Some("No results returned".to_string());
    }
    Ok(outcome)
}

async fn sqlite_round_trip<I: ToolInvoker>(
    invoker: &I,
    service: &str,
) -> Result<TestOutcome, InvokeError> {
    let write_query = namespaced_tool_name(service, "write_query");
    invoker
        .call_tool(
            &namespaced_tool_name(service, "create_table"),
            args(json!({
                "query": "CREATE TABLE IF NOT EXISTS mcp_test (id INTEGER PRIMARY KEY, name TEXT)"
            })),
        )
        .await?;
    invoker
        .call_tool(
            &write_query,
            args(json!({
                "query": "INSERT OR REPLACE INTO mcp_test (id, name) VALUES (1, 'test')"
            })),
        )
        .await?;
    let result = invoker
        .call_tool(
            &namespaced_tool_name(service, "read_query"),
            args(json!({"query": "SELECT * FROM mcp_test WHERE id = 1"})),
        )
        .await?;
    invoker
        .call_tool(
            &write_query,
            args(json!({"query": "DROP TABLE IF EXISTS mcp_test"})),
        )
        .await?;
    let success = is_truthy(&result) && !is_empty_collection(&result);
    Ok(TestOutcome::checked(success, result))
}

async fn chroma_crud<I: ToolInvoker>(
    invoker: &I,
    service: &str,
) -> Result<TestOutcome, InvokeError> {
    let collection = format!("mcp_test_{}", chrono::Utc::now().timestamp_millis());

    invoker
        .call_tool(
            &namespaced_tool_name(service, "chroma_create_collection"),
            args(json!({"collection_name": collection})),
        )
        .await?;
    invoker
        .call_tool(
            &namespaced_tool_name(service, "chroma_add_documents"),
            args(json!({
                "collection_name": collection,
                "documents": ["Test document 1", "Test document 2"],
                "ids": ["test1", "test2"],
                "metadatas": [{"type": "test"}, {"type": "test"}],
            })),
        )
        .await?;
    let query = invoker
        .call_tool(
            &namespaced_tool_name(service, "chroma_query_documents"),
            args(json!({
                "collection_name": collection,
                "query_texts": ["Test"],
                "n_results": 2,
            })),
        )
        .await?;
    invoker
        .call_tool(
            &namespaced_tool_name(service, "chroma_delete_collection"),
            args(json!({"collection_name": collection})),
        )
        .await?;

    let success = query.get("documents").is_some_and(is_truthy);
    Ok(TestOutcome::checked(
        success,
        json!("All CRUD operations successful"),
    ))
}

async fn deepwiki_fetch<I: ToolInvoker>(
    invoker: &I,
    service: &str,
) -> Result<TestOutcome, InvokeError> {
    let result = invoker
        .call_tool(
            &namespaced_tool_name(service, "deepwiki_fetch"),
            args(json!({"url": "vercel/next.js", "maxDepth": 0, "mode": "aggregate"})),
        )
        .await?;
    let empty = !is_truthy(&result) || is_empty_collection(&result);
    let mut outcome = TestOutcome::checked(!empty, result);
    if empty {
        outcome.warning = Some("No content fetched".to_string());
    }
    Ok(outcome)
}

/// Try `<service>_list`, `_get`, `_query`, `_status`; the first operation
/// that exists decides the outcome.
async fn generic_operation<I: ToolInvoker>(invoker: &I, service: &str) -> TestOutcome {
    for suffix in GENERIC_OPERATIONS {
        let tool = namespaced_tool_name(service, suffix);
        match invoker.call_tool(&tool, Map::new()).await {
            Ok(result) => return TestOutcome::checked(is_truthy(&result), result),
            Err(InvokeError::NotFound(_)) => {
                tracing::debug!(service = %service, tool = %tool, "candidate operation not found");
            }
            Err(e) => return TestOutcome::failed(e.to_string()),
        }
    }
    TestOutcome {
        success: false,
        warning: Some("Manual testing required".to_string()),
        error: None,
        details: Some(json!("No recognizable operations found")),
    }
}

/// A named smoke test.
#[derive(Debug)]
pub struct TestCase {
    pub name: &'static str,
    pub probe: Probe,
}

/// Test suite for one category.
#[derive(Debug)]
pub struct TestSuite {
    pub display_name: &'static str,
    pub tests: &'static [TestCase],
    pub troubleshoot: &'static [(Cause, &'static str)],
}

impl TestSuite {
    /// Tip registered for `cause`, if any.
    pub fn tip(&self, cause: Cause) -> Option<&'static str> {
        self.troubleshoot
            .iter()
            .find(|(c, _)| *c == cause)
            .map(|(_, tip)| *tip)
    }

    /// Tip for a warning or failing outcome.
    ///
    /// Matches the error text (or the warning text when there is none)
    /// against known cause keywords, falling back to the connection-error tip.
    pub fn tip_for(&self, outcome: &TestOutcome) -> Option<&'static str> {
        outcome
            .error
            .as_deref()
            .or(outcome.warning.as_deref())
            .and_then(Cause::detect)
            .and_then(|cause| self.tip(cause))
            .or_else(|| self.tip(Cause::ConnectionError))
    }
}

static FILESYSTEM: TestSuite = TestSuite {
    display_name: "Filesystem MCP",
    tests: &[
        TestCase {
            name: "List allowed directories",
            probe: Probe::ListAllowedDirectories,
        },
        TestCase {
            name: "Search files",
            probe: Probe::SearchFiles,
        },
    ],
    troubleshoot: &[
        (
            Cause::ConnectionError,
            "Check if mcp-server-filesystem is installed: npm install -g @modelcontextprotocol/server-filesystem",
        ),
        (
            Cause::PermissionDenied,
            "Verify the path in opencode.jsonc is readable and writable",
        ),
        (
            Cause::NoResults,
            "Check if the specified path exists and contains files",
        ),
    ],
};

static SEARCH_SERVER: TestSuite = TestSuite {
    display_name: "Search-Server MCP",
    tests: &[TestCase {
        name: "Perform basic search",
        probe: Probe::BasicSearch,
    }],
    troubleshoot: &[
        (
            Cause::ConnectionError,
            "Check if one-search-mcp is running: npm install -g one-search-mcp",
        ),
        (
            Cause::NoResults,
            "Search index may be empty or query too specific",
        ),
        (
            Cause::Timeout,
            "Increase timeout or check network connectivity",
        ),
    ],
};

static SQLITE: TestSuite = TestSuite {
    display_name: "SQLite MCP",
    tests: &[
        TestCase {
            name: "List tables",
            probe: Probe::ListTables,
        },
        TestCase {
            name: "Create and query test table",
            probe: Probe::SqliteRoundTrip,
        },
    ],
    troubleshoot: &[
        (
            Cause::ConnectionError,
            "Check if mcp-server-sqlite is installed: npm install -g @modelcontextprotocol/server-sqlite",
        ),
        (
            Cause::DatabaseLocked,
            "Another process may be using the database - close other connections",
        ),
        (
            Cause::PermissionDenied,
            "Verify db-path in opencode.jsonc is writable",
        ),
        (
            Cause::NoTables,
            "Database is empty - this is normal for a fresh installation",
        ),
    ],
};

static CHROMA: TestSuite = TestSuite {
    display_name: "Chroma MCP",
    tests: &[
        TestCase {
            name: "Check Chroma server connection",
            probe: Probe::ChromaListCollections,
        },
        TestCase {
            name: "Full CRUD operations",
            probe: Probe::ChromaCrud,
        },
    ],
    troubleshoot: &[
        (
            Cause::ConnectionError,
            "Chroma server not running - start with: systemctl --user start chroma",
        ),
        (
            Cause::PortInUse,
            "Port 8000 is occupied - check with: lsof -i :8000",
        ),
        (
            Cause::ServerNotInstalled,
            "Install chroma: pip install chromadb && pip install mcp-server-chroma",
        ),
        (
            Cause::ConnectionClosed,
            "Chroma server crashed - check logs: journalctl --user -u chroma",
        ),
        (
            Cause::AutoStart,
            "Enable auto-start: systemctl --user enable chroma",
        ),
    ],
};

static DEEPWIKI: TestSuite = TestSuite {
    display_name: "DeepWiki MCP",
    tests: &[TestCase {
        name: "Fetch documentation",
        probe: Probe::DeepWikiFetch,
    }],
    troubleshoot: &[
        (
            Cause::ConnectionError,
            "Check if mcp-deepwiki is installed: npx -y mcp-deepwiki@latest",
        ),
        (
            Cause::NoContent,
            "deepwiki.com may be down or blocking requests - try again later",
        ),
        (
            Cause::RateLimited,
            "Too many requests - wait a few minutes before retrying",
        ),
        (
            Cause::InvalidUrl,
            "Use format: owner/repo (e.g., \"vercel/next.js\")",
        ),
    ],
};

static GENERIC: TestSuite = TestSuite {
    display_name: "Generic MCP Server",
    tests: &[TestCase {
        name: "Attempt generic list operation",
        probe: Probe::GenericOperation,
    }],
    troubleshoot: &[
        (
            Cause::ConnectionError,
            "Check if the MCP server is installed and command path is correct",
        ),
        (
            Cause::UnknownOperations,
            "Consult the MCP server documentation for available operations",
        ),
    ],
};

/// Suite registered for a category. `Docker` has none.
pub fn suite_for(category: Category) -> Option<&'static TestSuite> {
    match category {
        Category::Filesystem => Some(&FILESYSTEM),
        Category::SearchServer => Some(&SEARCH_SERVER),
        Category::Sqlite => Some(&SQLITE),
        Category::ChromaVectorStore => Some(&CHROMA),
        Category::DeepWiki => Some(&DEEPWIKI),
        Category::Generic => Some(&GENERIC),
        Category::Docker => None,
    }
}
