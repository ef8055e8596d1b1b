//! HTTP server wiring: router, start and graceful stop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use super::config::ApiConfig;
use super::error::ServerError;
use super::handlers::{get_latest_message, publish_message, AppState, MessageBackend};

/// Build the API router
pub fn router<B: MessageBackend>(backend: Arc<B>, config: ApiConfig) -> Router {
    let timeout = config.request_timeout();
    let state = Arc::new(AppState::new(backend, config));

    Router::new()
        .route("/api/v1/messages", post(publish_message::<B>))
        .route("/api/v1/messages/latest", get(get_latest_message::<B>))
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP server for the API
pub struct Server {
    config: ApiConfig,
    app: Router,
}

impl Server {
    pub fn new<B: MessageBackend>(config: ApiConfig, backend: Arc<B>) -> Self {
        let app = router(backend, config.clone());
        Self { config, app }
    }

    /// Address the server binds to by default
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.config.port))
    }

    /// Bind to the configured port
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        Ok(TcpListener::bind(self.addr()).await?)
    }

    /// Start serving on `listener` in the background
    pub fn start(self, listener: TcpListener) -> Result<RunningServer, ServerError> {
        let Server { config, app } = self;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tracing::info!(addr = %local_addr, "Starting HTTP server");

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(RunningServer {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
            shutdown_timeout: config.shutdown_timeout,
        })
    }
}

/// Handle to a server started with [`Server::start`]
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
    shutdown_timeout: std::time::Duration,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests, bounded
    /// by the shutdown timeout
    pub async fn stop(mut self) -> Result<(), ServerError> {
        tracing::info!("Shutting down HTTP server...");

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        match tokio::time::timeout(self.shutdown_timeout, &mut self.task).await {
            Ok(Ok(result)) => result.map_err(ServerError::from),
            Ok(Err(e)) => Err(ServerError::Task(e.to_string())),
            Err(_) => {
                self.task.abort();
                Err(ServerError::ShutdownTimeout(self.shutdown_timeout))
            }
        }
    }
}
