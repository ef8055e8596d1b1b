//! Optional diagnostics HTTP server.
//!
//! Enabled with `ENABLE_PPROF=true`, listening on `PPROF_PORT` (default 6060).
//! It never takes the process down: bind or serve failures are only logged.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use tokio::task::JoinHandle;

/// Default diagnostics port
pub const DEFAULT_DEBUG_PORT: u16 = 6060;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugConfig {
    pub enabled: bool,
    pub port: u16,
}

impl DebugConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("ENABLE_PPROF").as_deref() == Some("true");

        let port = match lookup("PPROF_PORT").filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %raw,
                    default = DEFAULT_DEBUG_PORT,
                    "Invalid PPROF_PORT value, using default"
                );
                DEFAULT_DEBUG_PORT
            }),
            None => DEFAULT_DEBUG_PORT,
        };

        Self { enabled, port }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_DEBUG_PORT,
        }
    }
}

/// Diagnostics routes
pub fn router(started: Instant) -> Router {
    Router::new()
        .route("/debug/health", get(health))
        .route("/debug/runtime", get(runtime))
        .with_state(started)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn runtime(State(started): State<Instant>) -> Json<serde_json::Value> {
    let metrics = tokio::runtime::Handle::current().metrics();

    Json(serde_json::json!({
        "pid": std::process::id(),
        "uptime_secs": started.elapsed().as_secs(),
        "workers": metrics.num_workers(),
    }))
}

/// Start the diagnostics server if enabled
pub fn spawn(config: &DebugConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        return None;
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(Instant::now());

    Some(tokio::spawn(async move {
        tracing::info!(addr = %addr, "Starting debug server");

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(addr = %addr, error = %e, "debug server failed");
                return;
            }
        };

        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "debug server failed");
        }
    }))
}
