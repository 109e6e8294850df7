//! ccbridge binary entry point.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use ccbridge_core::tracing_init::init_tracing;
use ccbridge_server::BridgeConfig;
use ccbridge_server::server::{self, AppState};
use ccbridge_server::subprocess::DEFAULT_MAX_LINE_BYTES;

#[derive(Parser)]
#[command(name = "ccbridge", version, about = "OpenAI-compatible API over the claude CLI")]
struct Args {
    /// Interface to listen on
    #[arg(long, default_value = "0.0.0.0", env = "CCBRIDGE_HOST")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = 8080, env = "PORT")]
    port: u16,

    /// Path to the claude binary
    #[arg(long, default_value = "claude", env = "CLAUDE_PATH")]
    claude_path: PathBuf,

    /// Model name reported in responses
    #[arg(long, default_value = "claude-cli", env = "CCBRIDGE_MODEL")]
    model_label: String,

    /// Tools pre-approved for the CLI (comma-separated)
    #[arg(
        long,
        default_value = "WebFetch,WebSearch",
        env = "CCBRIDGE_ALLOWED_TOOLS",
        value_delimiter = ','
    )]
    allowed_tools: Vec<String>,

    /// Longest stdout line accepted from the CLI, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_BYTES, env = "CCBRIDGE_MAX_LINE_BYTES")]
    max_line_bytes: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CCBRIDGE_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "CCBRIDGE_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            claude_bin: self.claude_path.clone(),
            allowed_tools: self
                .allowed_tools
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            model_label: self.model_label.clone(),
            max_line_bytes: self.max_line_bytes,
            ..BridgeConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json);

    let addr = SocketAddr::new(args.host, args.port);
    let state = AppState::new(args.bridge_config());
    info!(
        %addr,
        claude = %state.config.claude_bin.display(),
        model = %state.config.model_label,
        allowed_tools = ?state.config.allowed_tools,
        "starting ccbridge"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // `true` unsets $NOTIFY_SOCKET so claude subprocesses don't inherit it.
    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    info!(%addr, "HTTP server ready");
    server::serve(listener, state, shutdown_signal()).await?;

    info!("ccbridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        () = sigterm => {
            info!("Received SIGTERM shutdown signal");
        }
    }
}
