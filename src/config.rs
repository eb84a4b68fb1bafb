//! opencode.jsonc loading: comment stripping, parsing, and MCP server discovery.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::category::{classify, Category};
use crate::error::CheckupError;

fn block_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"))
}

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("valid regex"))
}

/// Turn a JSONC document into strict JSON text.
///
/// Line comments are cut at the first `//` unless the text before the marker
/// ends with a colon or mentions an `http:`/`https:` scheme. This is a
/// heuristic, not a tokenizer: a `//` inside an ordinary string value is still
/// treated as a comment. Block comments and trailing commas before `}`/`]`
/// are removed afterwards.
pub fn strip_jsonc(text: &str) -> String {
    let without_line_comments = text
        .split('\n')
        .map(|line| match line.find("//") {
            Some(idx) => {
                let before = &line[..idx];
                let keeps_marker = before.trim().ends_with(':')
                    || before.contains("http:")
                    || before.contains("https:");
                if keeps_marker { line } else { before }
            }
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n");

    let without_blocks = block_comment_re().replace_all(&without_line_comments, "");
    trailing_comma_re()
        .replace_all(&without_blocks, "$1")
        .into_owned()
}

/// The parts of opencode.jsonc this tool reads. Everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckupConfig {
    /// Server name → opaque server config, in document order.
    #[serde(default)]
    pub mcp: Map<String, Value>,
}

/// Parse JSONC text into a [`CheckupConfig`].
pub fn parse_config(text: &str) -> crate::Result<CheckupConfig> {
    let stripped = strip_jsonc(text);
    serde_json::from_str(&stripped).map_err(|e| CheckupError::ConfigParse(e.to_string()))
}

/// A configured MCP server discovered from the config.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEntry {
    pub name: String,
    pub raw_config: Map<String, Value>,
    pub category: Category,
    pub enabled: bool,
}

impl ServiceEntry {
    /// Build an entry for `name`, classifying it and reading its `enabled` flag.
    pub fn new(name: impl Into<String>, raw_config: Map<String, Value>) -> Self {
        let name = name.into();
        let enabled = raw_config.get("enabled") != Some(&Value::Bool(false));
        Self {
            category: classify(&name),
            name,
            raw_config,
            enabled,
        }
    }

    /// Typed launch parameters for connecting to this server.
    pub fn launch_spec(&self) -> crate::Result<LaunchSpec> {
        LaunchSpec::from_raw(&self.name, &self.raw_config)
    }
}

/// Every enabled server under `mcp`, in document order.
///
/// A server is included unless its `enabled` field is exactly `false`.
pub fn discover_services(config: &CheckupConfig) -> Vec<ServiceEntry> {
    config
        .mcp
        .iter()
        .map(|(name, value)| {
            let raw = value.as_object().cloned().unwrap_or_default();
            ServiceEntry::new(name.clone(), raw)
        })
        .filter(|entry| {
            if !entry.enabled {
                tracing::debug!(service = %entry.name, "skipping disabled server");
            }
            entry.enabled
        })
        .collect()
}

/// Read, strip, parse, and discover in one step.
pub async fn load_services(path: &Path) -> crate::Result<Vec<ServiceEntry>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CheckupError::ConfigRead(path.to_path_buf(), e.to_string()))?;
    let config = parse_config(&content)?;
    let services = discover_services(&config);
    tracing::debug!(path = ?path, count = services.len(), "discovered MCP servers");
    Ok(services)
}

/// How to reach a configured server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchSpec {
    /// Spawned subprocess speaking MCP over stdio.
    Local {
        program: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    /// Streamable HTTP endpoint, with headers sent on every request.
    Remote {
        url: String,
        headers: HashMap<String, String>,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawLaunch {
    Local {
        #[serde(default)]
        command: Vec<String>,
        #[serde(default)]
        environment: HashMap<String, String>,
    },
    Remote {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl LaunchSpec {
    fn from_raw(name: &str, raw: &Map<String, Value>) -> crate::Result<Self> {
        let parsed: RawLaunch = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| CheckupError::InvalidConfig(name.to_string(), e.to_string()))?;
        match parsed {
            RawLaunch::Local {
                command,
                environment,
            } => {
                let mut parts = command.into_iter();
                let program = parts.next().filter(|p| !p.is_empty()).ok_or_else(|| {
                    CheckupError::InvalidConfig(
                        name.to_string(),
                        "local server requires a non-empty 'command'".to_string(),
                    )
                })?;
                Ok(LaunchSpec::Local {
                    program,
                    args: parts.collect(),
                    env: resolve_env_vars(&environment),
                })
            }
            RawLaunch::Remote { url, headers } => Ok(LaunchSpec::Remote {
                url,
                headers: resolve_env_vars(&headers),
            }),
        }
    }
}

/// Strip an env var reference to its variable name.
///
/// Accepts opencode's `{env:VAR}` form and shell-style `${VAR}`.
pub fn parse_env_ref(value: &str) -> Option<&str> {
    value
        .strip_prefix("{env:")
        .or_else(|| value.strip_prefix("${"))
        .and_then(|s| s.strip_suffix('}'))
}

/// Resolve env-var references in a server's environment map.
///
/// Literal values pass through unchanged; unknown variables resolve to the
/// empty string.
pub fn resolve_env_vars(env: &HashMap<String, String>) -> HashMap<String, String> {
    env.iter()
        .map(|(k, v)| {
            let resolved = match parse_env_ref(v) {
                Some(var_name) => std::env::var(var_name).unwrap_or_default(),
                None => v.clone(),
            };
            (k.clone(), resolved)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(services: &[ServiceEntry]) -> Vec<&str> {
        services.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_strip_line_comment_and_trailing_comma() {
        let stripped = strip_jsonc("{\"a\": 1, // trailing comment\n \"b\": 2,}");
        let value: Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_strip_keeps_urls() {
        let text = r#"{
            // remote endpoint
            "url": "https://example.com/mcp",
            "schema": "http://opencode.ai/config.json"
        }"#;
        let value: Value = serde_json::from_str(&strip_jsonc(text)).unwrap();
        assert_eq!(value["url"], "https://example.com/mcp");
        assert_eq!(value["schema"], "http://opencode.ai/config.json");
    }

    #[test]
    fn test_strip_keeps_marker_after_bare_colon() {
        // A line whose prefix ends with ':' is left untouched.
        assert_eq!(strip_jsonc("\"key\": // value"), "\"key\": // value");
    }

    #[test]
    fn test_strip_leaves_comment_after_url_in_place() {
        // Known limitation of the heuristic: the scheme check keeps the whole line.
        let line = r#""url": "https://example.com", // remote"#;
        assert_eq!(strip_jsonc(line), line);
    }

    #[test]
    fn test_strip_block_comments_across_lines() {
        let text = "{\n/* first\n second */\n\"a\": [1, 2, /* inline */ 3,],\n}";
        let value: Value = serde_json::from_str(&strip_jsonc(text)).unwrap();
        assert_eq!(value, json!({"a": [1, 2, 3]}));
    }

    #[test]
    fn test_strip_whole_line_comment() {
        let text = "// header\n{\"a\": true}";
        let value: Value = serde_json::from_str(&strip_jsonc(text)).unwrap();
        assert_eq!(value, json!({"a": true}));
    }

    #[test]
    fn test_parse_config_rejects_malformed() {
        let result = parse_config("{\"mcp\": {\"a\": }");
        assert!(matches!(result, Err(CheckupError::ConfigParse(_))));
    }

    #[test]
    fn test_parse_config_without_mcp_section() {
        let config = parse_config("{\"theme\": \"dark\"}").unwrap();
        assert!(discover_services(&config).is_empty());
    }

    #[test]
    fn test_discover_skips_disabled_only_when_false() {
        let config = parse_config(
            r#"{
              "mcp": {
                "filesystem": { "type": "local", "command": ["mcp-fs"] },
                "chroma": { "enabled": false },
                "sqlite": { "enabled": true },
                "deepwiki": { "enabled": "no" },
              }
            }"#,
        )
        .unwrap();
        let services = discover_services(&config);
        assert_eq!(names(&services), vec!["filesystem", "sqlite", "deepwiki"]);
        assert!(services.iter().all(|s| s.enabled));
    }

    #[test]
    fn test_discover_classifies_entries() {
        let config = parse_config(r#"{"mcp": {"my-sqlite": {"enabled": true}}}"#).unwrap();
        let services = discover_services(&config);
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "my-sqlite");
        assert_eq!(services[0].category, Category::Sqlite);
    }

    #[test]
    fn test_discover_non_object_entry_has_empty_config() {
        let config = parse_config(r#"{"mcp": {"odd": true}}"#).unwrap();
        let services = discover_services(&config);
        assert_eq!(names(&services), vec!["odd"]);
        assert!(services[0].raw_config.is_empty());
    }

    #[tokio::test]
    async fn test_load_services_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_services(&dir.path().join("opencode.jsonc")).await;
        assert!(matches!(result, Err(CheckupError::ConfigRead(_, _))));
    }

    #[tokio::test]
    async fn test_load_services_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opencode.jsonc");
        let body = concat!(
            "{\n",
            "  // servers\n",
            "  \"mcp\": {\n",
            "    \"deepwiki\": {\"type\": \"remote\",\n",
            "                 \"url\": \"https://mcp.deepwiki.com/mcp\"},\n",
            "  },\n",
            "}\n",
        );
        std::fs::write(&path, body).unwrap();
        let services = load_services(&path).await.unwrap();
        assert_eq!(names(&services), vec!["deepwiki"]);
        assert_eq!(services[0].category, Category::DeepWiki);
    }

    #[test]
    fn test_launch_spec_local() {
        let entry = ServiceEntry::new(
            "sqlite",
            json!({"type": "local", "command": ["uvx", "mcp-server-sqlite", "--db-path", "x.db"]})
                .as_object()
                .unwrap()
                .clone(),
        );
        match entry.launch_spec().unwrap() {
            LaunchSpec::Local { program, args, env } => {
                assert_eq!(program, "uvx");
                assert_eq!(args, vec!["mcp-server-sqlite", "--db-path", "x.db"]);
                assert!(env.is_empty());
            }
            other => panic!("expected local launch, got {other:?}"),
        }
    }

    #[test]
    fn test_launch_spec_remote() {
        let entry = ServiceEntry::new(
            "deepwiki",
            json!({"type": "remote", "url": "https://mcp.deepwiki.com/mcp"})
                .as_object()
                .unwrap()
                .clone(),
        );
        assert_eq!(
            entry.launch_spec().unwrap(),
            LaunchSpec::Remote {
                url: "https://mcp.deepwiki.com/mcp".to_string(),
                headers: HashMap::new(),
            }
        );
    }

    #[test]
    fn test_launch_spec_remote_headers_resolve_env() {
        // SAFETY: test-only, no concurrent threads depend on this env var.
        unsafe { std::env::set_var("CHECKUP_TEST_API_KEY", "secret-token") };
        let entry = ServiceEntry::new(
            "context7",
            json!({
                "type": "remote",
                "url": "https://mcp.context7.com/mcp",
                "headers": {
                    "Authorization": "{env:CHECKUP_TEST_API_KEY}",
                    "X-Client": "mcp-checkup"
                }
            })
            .as_object()
            .unwrap()
            .clone(),
        );
        match entry.launch_spec().unwrap() {
            LaunchSpec::Remote { url, headers } => {
                assert_eq!(url, "https://mcp.context7.com/mcp");
                assert_eq!(headers.len(), 2);
                assert_eq!(headers["Authorization"], "secret-token");
                assert_eq!(headers["X-Client"], "mcp-checkup");
            }
            other => panic!("expected remote launch, got {other:?}"),
        }
        // SAFETY: test-only cleanup.
        unsafe { std::env::remove_var("CHECKUP_TEST_API_KEY") };
    }

    #[test]
    fn test_launch_spec_empty_command_rejected() {
        let entry = ServiceEntry::new(
            "broken",
            json!({"type": "local", "command": []}).as_object().unwrap().clone(),
        );
        let result = entry.launch_spec();
        assert!(matches!(
            result,
            Err(CheckupError::InvalidConfig(name, msg))
                if name == "broken" && msg.contains("command")
        ));
    }

    #[test]
    fn test_launch_spec_missing_type_rejected() {
        let entry = ServiceEntry::new("bare", Map::new());
        assert!(matches!(
            entry.launch_spec(),
            Err(CheckupError::InvalidConfig(name, _)) if name == "bare"
        ));
    }

    #[test]
    fn test_parse_env_ref() {
        assert_eq!(parse_env_ref("{env:HOME}"), Some("HOME"));
        assert_eq!(parse_env_ref("${TOKEN}"), Some("TOKEN"));
        assert_eq!(parse_env_ref("$TOKEN"), None);
        assert_eq!(parse_env_ref("literal"), None);
    }

    #[test]
    fn test_resolve_env_vars() {
        // SAFETY: test-only, no concurrent threads depend on this env var.
        unsafe { std::env::set_var("CHECKUP_TEST_VAR", "resolved_value") };
        let mut env = HashMap::new();
        env.insert("KEY".to_string(), "{env:CHECKUP_TEST_VAR}".to_string());
        env.insert("PLAIN".to_string(), "literal".to_string());
        let resolved = resolve_env_vars(&env);
        assert_eq!(resolved.get("KEY").unwrap(), "resolved_value");
        assert_eq!(resolved.get("PLAIN").unwrap(), "literal");
        // SAFETY: test-only cleanup.
        unsafe { std::env::remove_var("CHECKUP_TEST_VAR") };
    }
}
