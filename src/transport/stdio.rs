//! Local (subprocess) MCP servers.
//!
//! Servers are spawned with a raw `tokio::process::Command` so their stdout
//! can be screened: only lines that parse as JSON reach the rmcp client,
//! which keeps banner-printing servers from breaking the handshake. Stderr
//! is logged at debug and its last line is quoted in handshake failures.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rmcp::service::RunningService;
use rmcp::{RoleClient, ServiceExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use crate::error::CheckupError;

/// In-memory pipe size between the stdout screen and rmcp.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Most recent non-blank stderr line of a child.
#[derive(Debug, Clone, Default)]
struct LastLine(Arc<Mutex<Option<String>>>);

impl LastLine {
    fn record(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(line.to_string());
        }
    }

    fn get(&self) -> Option<String> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }
}

/// True when a stdout line is a JSON document worth forwarding to rmcp.
fn is_json_line(line: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(line).is_ok()
}

fn spawn_child(
    service: &str,
    program: &str,
    args: &[String],
    env: &HashMap<String, String>,
) -> crate::Result<Child> {
    Command::new(program)
        .args(args)
        .envs(env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CheckupError::Transport(service.to_string(), e.to_string()))
}

/// Copy JSON lines from `stdout` into a pipe; the returned end is read by rmcp.
///
/// The pipe reaches EOF when the child closes stdout or `cancel` fires.
fn screen_stdout(stdout: ChildStdout, service: String, cancel: CancellationToken) -> DuplexStream {
    let (reader, mut writer) = tokio::io::duplex(PIPE_CAPACITY);
    tokio::spawn(async move {
        cancel
            .run_until_cancelled(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !is_json_line(&line) {
                        tracing::debug!(
                            service = %service,
                            line = %line,
                            "dropping non-JSON stdout"
                        );
                        continue;
                    }
                    let framed = format!("{line}\n");
                    if writer.write_all(framed.as_bytes()).await.is_err() {
                        break;
                    }
                }
            })
            .await;
    });
    reader
}

fn watch_stderr(stderr: ChildStderr, service: String, last: LastLine, cancel: CancellationToken) {
    tokio::spawn(async move {
        cancel
            .run_until_cancelled(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(service = %service, line = %line, "server stderr");
                    last.record(&line);
                }
            })
            .await;
    });
}

/// Spawn a local server and perform the MCP handshake.
///
/// Returns the running client together with the `Child`, which must be kept
/// alive for as long as the connection is in use.
pub async fn connect(
    service: &str,
    program: &str,
    args: &[String],
    env: &HashMap<String, String>,
    handshake_timeout: Duration,
    cancel: CancellationToken,
) -> crate::Result<(RunningService<RoleClient, ()>, Child)> {
    let mut child = spawn_child(service, program, args, env)?;
    let pipe_error =
        |pipe: &str| CheckupError::Transport(service.to_string(), format!("no {pipe} pipe"));

    let stdin = child.stdin.take().ok_or_else(|| pipe_error("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| pipe_error("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| pipe_error("stderr"))?;

    let last_stderr = LastLine::default();
    let screened = screen_stdout(stdout, service.to_string(), cancel.clone());
    watch_stderr(stderr, service.to_string(), last_stderr.clone(), cancel.clone());

    let handshake =
        tokio::time::timeout(handshake_timeout, ().serve_with_ct((screened, stdin), cancel))
            .await;

    let failure = match handshake {
        Ok(Ok(running)) => return Ok((running, child)),
        Ok(Err(e)) => e.to_string(),
        Err(_elapsed) => format!(
            "MCP handshake timed out after {}s",
            handshake_timeout.as_secs()
        ),
    };

    let _ = child.kill().await;
    let message = match last_stderr.get() {
        Some(stderr) => format!("{failure} (stderr: {stderr})"),
        None => failure,
    };
    Err(CheckupError::InitializationFailed(service.to_string(), message))
}
