//! API server lifecycle: bind, serve the router in a background task,
//! and stop gracefully on request.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::router::api_router;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind API server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("API server error: {0}")]
    Serve(#[from] std::io::Error),
    #[error("API server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Metadata for a running server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerSession {
    pub session_id: Uuid,
    pub server_addr: SocketAddr,
    pub started_at: DateTime<Utc>,
}

/// Handle to a running API server.
pub struct ApiServer {
    pub session: ServerSession,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), std::io::Error>>,
}

impl ApiServer {
    pub fn port(&self) -> u16 {
        self.session.server_addr.port()
    }

    /// Ask the server to stop. In-flight requests complete first.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait until the server task exits.
    pub async fn wait(self) -> Result<(), ServerError> {
        self.task.await??;
        Ok(())
    }
}

/// Start the API server on the configured bind address.
pub async fn start_server(core: Arc<CoreState>) -> Result<ApiServer, ServerError> {
    let addr = core.config.bind_addr;
    start_server_on(core, addr).await
}

/// Start the API server on `addr`. Port 0 picks an ephemeral port.
pub async fn start_server_on(
    core: Arc<CoreState>,
    addr: SocketAddr,
) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let server_addr = listener.local_addr()?;

    let app = api_router(core);

    let session = ServerSession {
        session_id: Uuid::new_v4(),
        server_addr,
        started_at: Utc::now(),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(addr = %server_addr, "API server started");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await;
        if let Err(e) = &result {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
        result
    });

    Ok(ApiServer {
        session,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}
