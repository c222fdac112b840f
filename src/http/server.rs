//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with a single fallback into the gateway pipeline
//! - Wire up request tracing
//! - Buffer bodies and give every request its own execution context
//! - Swap in a new gateway snapshot when the config file changes
//! - Drain deferred work before returning from `run`

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{extract::State, http::StatusCode, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::DispatchResult;
use crate::http::dispatcher::Gateway;
use crate::http::request::buffer_request;
use crate::http::{response, Response};
use crate::lifecycle::{DeferredTracker, ExecutionContext};

/// Upper bound on how long shutdown waits for deferred work.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ArcSwap<Gateway>>,
    pub tracker: Arc<DeferredTracker>,
    pub max_body_bytes: usize,
}

/// HTTP server for the room gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: GatewayConfig,
}

impl HttpServer {
    /// Server around a pre-built gateway.
    pub fn new(config: GatewayConfig, gateway: Gateway) -> Self {
        let state = AppState {
            gateway: Arc::new(ArcSwap::from_pointee(gateway)),
            tracker: Arc::new(DeferredTracker::new()),
            max_body_bytes: config.listener.max_body_bytes,
        };
        let router = Self::build_router(state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    /// Server forwarding to the configured room backend.
    pub fn from_config(config: GatewayConfig) -> DispatchResult<Self> {
        let gateway = Gateway::from_config(&config)?;
        Ok(Self::new(config, gateway))
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The request deadline is enforced by the dispatcher, not a layer, so an
    /// expired request still gets CORS headers and an error report.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Validated configs arriving on `config_updates` replace the gateway
    /// snapshot. Listener settings are fixed at startup.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reload = tokio::spawn(reload_loop(
            self.state.gateway.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;
        reload.abort();

        let in_flight = self.state.tracker.in_flight();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for deferred work");
        }
        if !self.state.tracker.drain(DRAIN_TIMEOUT).await {
            tracing::warn!(
                timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "Deferred work still running at shutdown deadline"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn reload_loop(
    gateway: Arc<ArcSwap<Gateway>>,
    mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = config_updates.recv() => {
                let Some(config) = update else { break };
                match Gateway::from_config(&config) {
                    Ok(next) => {
                        gateway.store(Arc::new(next));
                        tracing::info!(
                            is_local = config.environment.is_local,
                            reporting = config.environment.sentry_dsn.is_some(),
                            "Gateway configuration reloaded"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected reloaded config. Keeping current gateway.");
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Entry point for every request.
async fn gateway_handler(State(state): State<AppState>, request: axum::extract::Request) -> Response {
    let gateway = state.gateway.load_full();
    let request = match buffer_request(request, state.max_body_bytes).await {
        Ok(request) => request,
        Err(unread) => {
            let too_large = unread.is_too_large();
            tracing::warn!(too_large, error = %unread.error, "Failed to read request body");
            let rejection = if too_large {
                response::text(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
            } else {
                response::text(StatusCode::BAD_REQUEST, "Bad request")
            };
            return gateway.reject(&unread.request, rejection);
        }
    };

    let ctx = Arc::new(ExecutionContext::new());
    let response = gateway.fetch(&request, &ctx).await;

    if ctx.pending() > 0 {
        state.tracker.track(ctx);
    }
    response
}
