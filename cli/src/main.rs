//! mcp-checkup: health checks for the MCP servers in an OpenCode config.
//!
//! Two subcommands:
//! - `mcp-checkup run`: test every configured server and write `mcpTest.md`
//! - `mcp-checkup notify`: desktop notification for a host lifecycle event

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use mcp_checkup::{
    describe_failure, discover, dispatch, execute, CheckupPaths, CheckupRequest, McpInvoker,
    NotifySend, DEFAULT_CONFIG_FILE,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Health checks for configured MCP servers.
#[derive(Parser)]
#[command(
    name = "mcp-checkup",
    version,
    about = "Health checks and troubleshooting tips for configured MCP servers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test configured MCP servers and write a markdown report
    Run {
        /// Path to opencode.jsonc [default: ./opencode.jsonc or ~/.config/opencode/opencode.jsonc]
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Report path [default: mcpTest.md next to the config]
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Test only this server ("all" tests every server)
        #[arg(short, long)]
        server: Option<String>,
        /// Include full tool results in the report
        #[arg(short, long)]
        verbose: bool,
    },
    /// Send the desktop notification for a lifecycle event
    Notify {
        /// Event kind, e.g. session.complete, permission.request, session.error
        event: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("interrupted, shutting down");
        cancel_for_signal.cancel();
    });

    match cli.command {
        Commands::Run {
            config,
            output,
            server,
            verbose,
        } => {
            let config = resolve_config(config)?;
            let mut paths = CheckupPaths::beside_config(config);
            if let Some(output) = output {
                paths.report = output;
            }
            let request = CheckupRequest { server, verbose };
            run_checkup(paths, request, cancel).await?;
        }
        Commands::Notify { event } => {
            let sent = dispatch(&event, &NotifySend::default())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to send notification: {}", e))?;
            if !sent {
                tracing::info!(event = %event, "event has no notification");
            }
        }
    }

    Ok(())
}

/// Discover, test, report; print the transcript to stdout.
///
/// Spawned servers are shut down whether the run completes, fails, or is
/// interrupted.
async fn run_checkup(
    paths: CheckupPaths,
    request: CheckupRequest,
    cancel: CancellationToken,
) -> Result<()> {
    let services = match discover(&paths, &request).await {
        Ok(services) => services,
        Err(e) => {
            println!("{}", describe_failure(&e));
            return Err(e.into());
        }
    };

    let invoker = McpInvoker::new(&services);
    let outcome = tokio::select! {
        outcome = execute(services, &paths, request.verbose, &invoker, Utc::now) => Some(outcome),
        _ = cancel.cancelled() => None,
    };
    invoker.shutdown().await;

    match outcome {
        Some(Ok(outcome)) => {
            print!("{}", outcome.console_summary());
            Ok(())
        }
        Some(Err(e)) => {
            println!("{}", describe_failure(&e));
            Err(e.into())
        }
        None => Err(anyhow::anyhow!("Checkup interrupted before the report was written")),
    }
}

/// Resolve config file path: explicit flag, then ./opencode.jsonc, then
/// ~/.config/opencode/opencode.jsonc.
fn resolve_config(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let local = Path::new(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Ok(local.to_path_buf());
    }

    if let Some(config_dir) = dirs::config_dir() {
        let xdg = config_dir.join("opencode").join(DEFAULT_CONFIG_FILE);
        if xdg.exists() {
            return Ok(xdg);
        }
    }

    Err(anyhow::anyhow!(
        "No {DEFAULT_CONFIG_FILE} found. Searched ./{DEFAULT_CONFIG_FILE} and \
         ~/.config/opencode/{DEFAULT_CONFIG_FILE}. Use --config to specify a path."
    ))
}
