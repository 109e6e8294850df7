//! axum router, shared state and the serve loop.

pub mod error;
pub mod handlers;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::subprocess::ClaudeExecutor;

/// How long shutdown waits for open connections, then again for sessions.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub executor: Arc<ClaudeExecutor>,
    /// Tracks streaming sessions so shutdown can wait for them.
    pub sessions: TaskTracker,
    /// Parent of every session's cancellation token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: BridgeConfig) -> Self {
        let executor = ClaudeExecutor::from_config(&config);
        Self {
            config: Arc::new(config),
            executor: Arc::new(executor),
            sessions: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the router for all OpenAI-compatible routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            post(handlers::chat_completions).fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/completions",
            post(handlers::completions).fallback(handlers::method_not_allowed),
        )
        .route(
            "/v1/models",
            get(handlers::models).fallback(handlers::method_not_allowed),
        )
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `signal` resolves, then shut down within bounded time.
///
/// The signal cancels every streaming session, which kills its child and
/// ends its body. Connections still open after [`SHUTDOWN_GRACE`] are
/// abandoned; they go away with the runtime, and the children of their
/// non-streaming requests are killed on drop.
pub async fn serve<F>(listener: TcpListener, state: AppState, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = state.shutdown.clone();
    let sessions = state.sessions.clone();

    let trigger = shutdown.clone();
    let server = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            signal.await;
            info!("Shutting down, cancelling streaming sessions");
            trigger.cancel();
        })
        .into_future();

    let grace_expired = async {
        shutdown.cancelled().await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };
    tokio::select! {
        result = server => result?,
        () = grace_expired => warn!("Timed out waiting for connections to close"),
    }

    sessions.close();
    if tokio::time::timeout(SHUTDOWN_GRACE, sessions.wait())
        .await
        .is_err()
    {
        warn!(
            remaining = sessions.len(),
            "Timed out waiting for streaming sessions"
        );
    }
    Ok(())
}
