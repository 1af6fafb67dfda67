//! IPC server side of the daemon channel.
//!
//! Binds an ephemeral localhost port, publishes the assigned port number to a
//! discovery file, and serves `POST /rpc`. The caller-supplied handler is
//! synchronous and runs on a blocking worker so a slow request cannot stall
//! the accept loop or the daemon's periodic tasks.

use super::protocol::{IpcRequest, IpcResponse, PingReply, METHOD_PING, METHOD_SHUTDOWN};
use super::shutdown::ShutdownHandle;
use crate::error::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Synchronous request handler. A returned `Err` becomes a `{error}` response
/// with HTTP 500; it never tears down the transport.
pub type IpcHandler =
    Arc<dyn Fn(IpcRequest) -> std::result::Result<Value, String> + Send + Sync + 'static>;

pub struct IpcServer {
    port_path: PathBuf,
    handler: IpcHandler,
}

struct ServerState {
    handler: IpcHandler,
    started_at: Instant,
    version: String,
    shutdown: ShutdownHandle,
}

impl IpcServer {
    pub fn new(port_path: impl Into<PathBuf>, handler: IpcHandler) -> Self {
        Self {
            port_path: port_path.into(),
            handler,
        }
    }

    /// Bind `127.0.0.1:0` and persist the assigned port to the discovery file.
    pub async fn bind(self) -> Result<BoundIpcServer> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        if let Some(parent) = self.port_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.port_path, format!("{port}\n"))?;
        info!(port = port, path = %self.port_path.display(), "IPC server bound");

        Ok(BoundIpcServer {
            listener,
            port,
            port_path: self.port_path,
            handler: self.handler,
        })
    }
}

pub struct BoundIpcServer {
    listener: tokio::net::TcpListener,
    port: u16,
    port_path: PathBuf,
    handler: IpcHandler,
}

impl BoundIpcServer {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until the shutdown signal fires, then delete the port file.
    pub async fn serve(self, shutdown: ShutdownHandle) -> Result<()> {
        let state = Arc::new(ServerState {
            handler: self.handler,
            started_at: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            shutdown: shutdown.clone(),
        });

        let app = Router::new()
            .route("/rpc", post(rpc_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let wait = shutdown.clone();
        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { wait.wait().await })
            .await?;

        if std::fs::remove_file(&self.port_path).is_ok() {
            debug!(path = %self.port_path.display(), "Port file removed");
        }
        info!("IPC server stopped");
        Ok(())
    }
}

async fn rpc_handler(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> (StatusCode, Json<IpcResponse>) {
    let request: IpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejecting malformed IPC payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(IpcResponse::err(format!("malformed request: {e}"))),
            );
        }
    };
    debug!(method = %request.method, "Handling IPC request");

    match request.method.as_str() {
        METHOD_PING => {
            let reply = PingReply {
                uptime_secs: state.started_at.elapsed().as_secs(),
                version: state.version.clone(),
            };
            let result = serde_json::to_value(reply).unwrap_or(Value::Null);
            (StatusCode::OK, Json(IpcResponse::ok(result)))
        }
        METHOD_SHUTDOWN => {
            info!("Shutdown requested over IPC");
            state.shutdown.shutdown();
            (
                StatusCode::OK,
                Json(IpcResponse::ok(serde_json::json!({ "stopping": true }))),
            )
        }
        _ => {
            let handler = Arc::clone(&state.handler);
            match tokio::task::spawn_blocking(move || handler(request)).await {
                Ok(Ok(result)) => (StatusCode::OK, Json(IpcResponse::ok(result))),
                Ok(Err(message)) => {
                    warn!(error = %message, "IPC handler reported an error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(IpcResponse::err(message)),
                    )
                }
                Err(e) => {
                    warn!(error = %e, "IPC handler panicked");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(IpcResponse::err(format!("handler failed: {e}"))),
                    )
                }
            }
        }
    }
}
