//! The tool-invocation capability consumed by probes.
//!
//! Probes never talk to MCP servers directly; they call tools by their
//! host-namespaced name (`<service>_<tool>`) through a [`ToolInvoker`]. The
//! runner is generic over the invoker so tests can script outcomes.

use std::future::Future;

use serde_json::{Map, Value};
use thiserror::Error;

/// Why a tool call produced no result.
///
/// `NotFound` and `Failed` are kept apart so probes that guess operation
/// names can tell "unsupported" from "broken".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// No tool with this name is exposed
    #[error("tool '{0}' not found")]
    NotFound(String),

    /// The tool exists but the call failed
    #[error("{0}")]
    Failed(String),
}

/// Calls a named tool with structured arguments.
pub trait ToolInvoker {
    fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = Result<Value, InvokeError>> + Send;
}

/// Host truthiness: `null`, `false`, `0`, and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// True for an empty array, object, or string.
pub fn is_empty_collection(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
