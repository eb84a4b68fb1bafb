//! Remote (Streamable HTTP) MCP servers.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::service::RunningService;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};
use tokio_util::sync::CancellationToken;

use crate::error::CheckupError;

/// Build the default header map sent with every request to `service`.
fn header_map(service: &str, headers: &HashMap<String, String>) -> crate::Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            CheckupError::InvalidConfig(service.to_string(), format!("header '{name}': {e}"))
        })?;
        let mut header_value = HeaderValue::from_str(value).map_err(|e| {
            CheckupError::InvalidConfig(service.to_string(), format!("header '{name}': {e}"))
        })?;
        header_value.set_sensitive(true);
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Connect to a remote server and perform the MCP handshake.
pub async fn connect(
    service: &str,
    url: &str,
    headers: &HashMap<String, String>,
    handshake_timeout: Duration,
    cancel: CancellationToken,
) -> crate::Result<RunningService<RoleClient, ()>> {
    let client = reqwest::Client::builder()
        .default_headers(header_map(service, headers)?)
        .build()
        .map_err(|e| CheckupError::Transport(service.to_string(), e.to_string()))?;
    let transport = StreamableHttpClientTransport::with_client(
        client,
        StreamableHttpClientTransportConfig::with_uri(url),
    );

    let handshake_result =
        tokio::time::timeout(handshake_timeout, ().serve_with_ct(transport, cancel)).await;

    match handshake_result {
        Err(_elapsed) => Err(CheckupError::InitializationFailed(
            service.to_string(),
            format!(
                "HTTP MCP handshake timed out after {}s",
                handshake_timeout.as_secs()
            ),
        )),
        Ok(Err(e)) => Err(CheckupError::InitializationFailed(
            service.to_string(),
            e.to_string(),
        )),
        Ok(Ok(running)) => Ok(running),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_carries_configured_headers() {
        let headers = HashMap::from([
            ("Authorization".to_string(), "Bearer abc".to_string()),
            ("X-Client".to_string(), "mcp-checkup".to_string()),
        ]);
        let map = header_map("context7", &headers).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["authorization"], "Bearer abc");
        assert!(map["authorization"].is_sensitive());
        assert_eq!(map["x-client"], "mcp-checkup");
    }

    #[test]
    fn test_header_map_rejects_bad_name() {
        let headers = HashMap::from([("bad header".to_string(), "x".to_string())]);
        assert!(matches!(
            header_map("context7", &headers),
            Err(CheckupError::InvalidConfig(service, msg))
                if service == "context7" && msg.contains("bad header")
        ));
    }

    #[test]
    fn test_header_map_rejects_bad_value() {
        let headers = HashMap::from([("X-Token".to_string(), "line\nbreak".to_string())]);
        assert!(matches!(
            header_map("context7", &headers),
            Err(CheckupError::InvalidConfig(_, _))
        ));
    }

    #[tokio::test]
    async fn test_connect_refused_reports_service() {
        // Port 9 (discard) on localhost is not an MCP endpoint.
        let result = connect(
            "deepwiki",
            "http://127.0.0.1:9/mcp",
            &HashMap::new(),
            Duration::from_secs(5),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            result,
            Err(CheckupError::InitializationFailed(service, _)) if service == "deepwiki"
        ));
    }
}
