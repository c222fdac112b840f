//! Per-request pipeline.
//!
//! # Data Flow
//! ```text
//! Request
//!     → ErrorReporter bound to (request, ctx)
//!     → ErrorBoundary { timeout(RouteTable::handle) }   (500 on failure, panic or deadline)
//!     → CorsReconciler                                   (every response, 500 included)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - `fetch` cannot fail; it always yields exactly one response
//! - The request deadline lives inside the boundary so an expired request is
//!   reported and answered like any other failure
//! - A [`Gateway`] is an immutable snapshot of everything built from one config,
//!   so a reload swaps it whole

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{Environment, GatewayConfig};
use crate::error::{DispatchError, DispatchResult};
use crate::http::{Request, Response};
use crate::lifecycle::ExecutionContext;
use crate::observability::metrics;
use crate::observability::reporting::sink_from_env;
use crate::observability::{ErrorReporter, ErrorSink};
use crate::resilience::ErrorBoundary;
use crate::rooms::{self, HttpRoomBackend, RoomBackend};
use crate::routing::RouteTable;
use crate::security::{policy_from_env, CorsHeaders, CorsReconciler, OriginGuard, Preflight};

/// Binding name recorded for responses produced by the error boundary.
const BOUNDARY_BINDING: &str = "error-boundary";

/// Binding name recorded for requests rejected before routing.
const BODY_READ_BINDING: &str = "body-read";

/// Runs the route table for one request and finishes the response.
pub struct Dispatcher {
    table: RouteTable,
    cors: CorsReconciler,
    sink: Arc<dyn ErrorSink>,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        table: RouteTable,
        cors: CorsReconciler,
        sink: Arc<dyn ErrorSink>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            table,
            cors,
            sink,
            request_timeout,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Produce the response for `request`.
    pub async fn fetch(
        &self,
        request: &Request,
        env: &Environment,
        ctx: &ExecutionContext,
    ) -> Response {
        let start = Instant::now();
        let reporter = ErrorReporter::new(self.sink.clone(), request, ctx);

        let deadline = self.request_timeout;
        let handled = async {
            tokio::time::timeout(deadline, self.table.handle(request, env, ctx))
                .await
                .map_err(|_| DispatchError::Timeout(deadline))?
        };

        let (binding, response) = match ErrorBoundary::catch(handled, &reporter).await {
            Ok(handled) => handled,
            Err(internal_error) => (BOUNDARY_BINDING, internal_error),
        };

        let response = self.cors.reconcile(request, response);

        tracing::debug!(
            method = %request.method(),
            path = %request.uri().path(),
            binding,
            status = response.status().as_u16(),
            "Request dispatched"
        );
        metrics::record_request(
            request.method().as_str(),
            response.status().as_u16(),
            binding,
            start,
        );
        response
    }

    /// Finish a response produced before routing, such as a body-read rejection.
    ///
    /// `request` carries the original head so CORS headers match the caller.
    pub fn reject(&self, request: &Request, response: Response) -> Response {
        let response = self.cors.reconcile(request, response);
        metrics::record_request(
            request.method().as_str(),
            response.status().as_u16(),
            BODY_READ_BINDING,
            Instant::now(),
        );
        response
    }
}

/// Everything built from one configuration snapshot.
pub struct Gateway {
    env: Arc<Environment>,
    dispatcher: Dispatcher,
}

impl Gateway {
    /// Wire the standard pipeline around `backend` and `sink`.
    pub fn new(
        config: &GatewayConfig,
        backend: Arc<dyn RoomBackend>,
        sink: Arc<dyn ErrorSink>,
    ) -> DispatchResult<Self> {
        let env = config.environment.clone();
        let policy = policy_from_env(&env);
        let cors = Arc::new(CorsHeaders::from_config(&config.cors, policy.clone()));

        let table = rooms::route_table(
            Arc::new(Preflight::new(cors.clone())),
            Arc::new(OriginGuard::new(policy)),
            backend,
        )
        .map_err(|e| DispatchError::Internal(e.to_string()))?;

        Ok(Self {
            env: Arc::new(env),
            dispatcher: Dispatcher::new(
                table,
                CorsReconciler::new(cors),
                sink,
                Duration::from_secs(config.listener.request_timeout_secs),
            ),
        })
    }

    /// Replace the request deadline taken from `listener.request_timeout_secs`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher.request_timeout = timeout;
        self
    }

    /// Gateway forwarding to the configured HTTP room backend and reporting to
    /// the configured sink.
    pub fn from_config(config: &GatewayConfig) -> DispatchResult<Self> {
        let backend = Arc::new(HttpRoomBackend::new(&config.rooms)?);
        let sink = sink_from_env(&config.environment);
        Self::new(config, backend, sink)
    }

    pub fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispatch `request` against this snapshot's environment.
    pub async fn fetch(&self, request: &Request, ctx: &ExecutionContext) -> Response {
        self.dispatcher.fetch(request, &self.env, ctx).await
    }

    /// Answer a request that never reached the route table.
    pub fn reject(&self, request: &Request, response: Response) -> Response {
        self.dispatcher.reject(request, response)
    }
}
