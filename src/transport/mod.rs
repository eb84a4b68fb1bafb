//! MCP-client backed [`ToolInvoker`].
//!
//! Connects to each configured server the first time one of its tools is
//! called, caches the connection (or the connection failure) for the rest of
//! the run, and routes `<service>_<tool>` names to the right server.

mod http;
mod stdio;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use rmcp::model::{CallToolRequestParams, CallToolResult, RawContent};
use rmcp::service::RunningService;
use rmcp::RoleClient;
use serde_json::{Map, Value};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::{LaunchSpec, ServiceEntry};
use crate::invoke::{InvokeError, ToolInvoker};
use crate::namespace::split_tool_name;

/// Default bound on the MCP handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// A live client connection to one server.
struct Connection {
    running: RunningService<RoleClient, ()>,
    /// Tool names advertised by the server; `None` if listing failed.
    tools: Option<HashSet<String>>,
    /// Kept alive for local servers; killed on shutdown.
    child: Option<Child>,
}

enum Slot {
    Ready(Connection),
    Failed(String),
}

/// Calls tools on real MCP servers described by the config.
pub struct McpInvoker {
    services: HashMap<String, ServiceEntry>,
    names: Vec<String>,
    slots: Mutex<HashMap<String, Slot>>,
    handshake_timeout: Duration,
    cancel: CancellationToken,
}

impl McpInvoker {
    pub fn new(services: &[ServiceEntry]) -> Self {
        Self {
            services: services
                .iter()
                .map(|s| (s.name.clone(), s.clone()))
                .collect(),
            names: services.iter().map(|s| s.name.clone()).collect(),
            slots: Mutex::new(HashMap::new()),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    async fn connect(&self, entry: &ServiceEntry) -> crate::Result<Connection> {
        let cancel = self.cancel.child_token();
        let (running, child) = match entry.launch_spec()? {
            LaunchSpec::Local { program, args, env } => {
                tracing::info!(
                    service = %entry.name,
                    program = %program,
                    "spawning local MCP server"
                );
                let (running, child) = stdio::connect(
                    &entry.name,
                    &program,
                    &args,
                    &env,
                    self.handshake_timeout,
                    cancel,
                )
                .await?;
                (running, Some(child))
            }
            LaunchSpec::Remote { url, headers } => {
                tracing::info!(
                    service = %entry.name,
                    url = %url,
                    header_count = headers.len(),
                    "connecting to remote MCP server"
                );
                let running = http::connect(
                    &entry.name,
                    &url,
                    &headers,
                    self.handshake_timeout,
                    cancel,
                )
                .await?;
                (running, None)
            }
        };

        let tools = match running.peer().list_all_tools().await {
            Ok(tools) => {
                tracing::info!(service = %entry.name, tool_count = tools.len(), "tools discovered");
                Some(tools.into_iter().map(|t| t.name.to_string()).collect())
            }
            Err(e) => {
                tracing::warn!(
                    service = %entry.name,
                    error = %e,
                    "failed to list tools after handshake"
                );
                None
            }
        };

        Ok(Connection {
            running,
            tools,
            child,
        })
    }

    /// Cancel every connection and kill spawned servers.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut slots = self.slots.lock().await;
        for (service, slot) in slots.drain() {
            if let Slot::Ready(conn) = slot {
                let _ = conn.running.cancel().await;
                if let Some(mut child) = conn.child {
                    let _ = child.kill().await;
                }
                tracing::debug!(service = %service, "connection closed");
            }
        }
    }
}

impl ToolInvoker for McpInvoker {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, InvokeError> {
        let (service, tool) = split_tool_name(name, &self.names)
            .ok_or_else(|| InvokeError::NotFound(name.to_string()))?;
        let entry = self
            .services
            .get(service)
            .ok_or_else(|| InvokeError::NotFound(name.to_string()))?;

        let peer = {
            let mut slots = self.slots.lock().await;
            if !slots.contains_key(service) {
                let slot = match self.connect(entry).await {
                    Ok(conn) => Slot::Ready(conn),
                    Err(e) => {
                        tracing::warn!(service = %service, error = %e, "connection failed");
                        Slot::Failed(e.to_string())
                    }
                };
                slots.insert(service.to_string(), slot);
            }
            match slots.get(service) {
                Some(Slot::Ready(conn)) => {
                    if conn.tools.as_ref().is_some_and(|tools| !tools.contains(tool)) {
                        return Err(InvokeError::NotFound(name.to_string()));
                    }
                    conn.running.peer().clone()
                }
                Some(Slot::Failed(message)) => return Err(InvokeError::Failed(message.clone())),
                None => return Err(InvokeError::NotFound(name.to_string())),
            }
        };

        let params = CallToolRequestParams {
            name: tool.to_string().into(),
            arguments: Some(arguments),
            task: None,
            meta: None,
        };
        let result = peer
            .call_tool(params)
            .await
            .map_err(|e| InvokeError::Failed(e.to_string()))?;
        result_to_value(result)
    }
}

/// Convert a tool result into the JSON value probes inspect.
///
/// Structured content wins; otherwise each text block is parsed as JSON when
/// possible and kept as a string when not. Several blocks become an array.
fn result_to_value(result: CallToolResult) -> Result<Value, InvokeError> {
    let texts: Vec<String> = result
        .content
        .iter()
        .filter_map(|content| match &content.raw {
            RawContent::Text(text) => Some(text.text.clone()),
            _ => None,
        })
        .collect();

    if result.is_error == Some(true) {
        let message = if texts.is_empty() {
            "tool reported an error".to_string()
        } else {
            texts.join("\n")
        };
        return Err(InvokeError::Failed(message));
    }

    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }

    let mut values: Vec<Value> = texts
        .into_iter()
        .map(|text| serde_json::from_str(&text).unwrap_or(Value::String(text)))
        .collect();
    Ok(match values.len() {
        1 => values.remove(0),
        _ => Value::Array(values),
    })
}
