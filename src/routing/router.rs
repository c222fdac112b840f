//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store bindings in registration order
//! - Run matching bindings top to bottom until one responds
//! - Resolve the endpoint that would handle a method/path pair
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc without locks)
//! - O(n) linear scan (the table is small and fixed)
//! - A table must end in a catch-all endpoint, so "no match" cannot happen at runtime

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use thiserror::Error;

use crate::config::Environment;
use crate::error::{DispatchError, DispatchResult};
use crate::http::{Request, Response};
use crate::lifecycle::ExecutionContext;
use crate::routing::matcher::{MethodFilter, Params, PathPattern};

/// Everything a handler sees for one request.
pub struct RouteRequest<'a> {
    pub request: &'a Request,
    pub env: &'a Environment,
    pub ctx: &'a ExecutionContext,
    pub params: Params,
}

/// What a binding decided to do with a request.
#[derive(Debug)]
pub enum Outcome {
    /// Let the next matching binding handle the request.
    Continue,
    /// Stop routing and send this response.
    Respond(Response),
}

/// A route handler or middleware.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, route: RouteRequest<'_>) -> DispatchResult<Outcome>;
}

/// Middleware may pass a request on; endpoints always answer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Middleware,
    Endpoint,
}

/// One (method, pattern) → handler entry.
pub struct Binding {
    pub name: &'static str,
    pub kind: BindingKind,
    pub method: MethodFilter,
    pub pattern: PathPattern,
    handler: Arc<dyn Handler>,
}

impl Binding {
    fn matches(&self, method: &Method, path: &str) -> Option<Params> {
        if !self.method.matches(method) {
            return None;
        }
        self.pattern.matches(path)
    }

    fn is_fallback(&self) -> bool {
        self.kind == BindingKind::Endpoint
            && self.method == MethodFilter::Any
            && self.pattern.is_catch_all()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Error building a route table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route table must end with a catch-all endpoint")]
    MissingFallback,
}

/// Ordered route table, first responding binding wins.
#[derive(Debug)]
pub struct RouteTable {
    bindings: Vec<Binding>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// First endpoint matching `method` and `path`, with its captured parameters.
    ///
    /// Middleware is skipped. Always `Some` for a built table.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<(&Binding, Params)> {
        self.bindings
            .iter()
            .filter(|b| b.kind == BindingKind::Endpoint)
            .find_map(|b| b.matches(method, path).map(|params| (b, params)))
    }

    /// Run matching bindings in order until one responds.
    ///
    /// Returns the responding binding's name with its response.
    pub async fn handle(
        &self,
        request: &Request,
        env: &Environment,
        ctx: &ExecutionContext,
    ) -> DispatchResult<(&'static str, Response)> {
        let method = request.method();
        let path = request.uri().path();

        for binding in &self.bindings {
            let Some(params) = binding.matches(method, path) else {
                continue;
            };

            let route = RouteRequest {
                request,
                env,
                ctx,
                params,
            };
            match binding.handler.call(route).await? {
                Outcome::Respond(response) => return Ok((binding.name, response)),
                Outcome::Continue => {
                    tracing::trace!(binding = binding.name, "Binding passed request on");
                }
            }
        }

        Err(DispatchError::Internal(format!(
            "no binding answered {method} {path}"
        )))
    }
}

/// Builder preserving registration order.
#[derive(Default)]
pub struct RouteTableBuilder {
    bindings: Vec<Binding>,
}

impl RouteTableBuilder {
    /// Register middleware for every method and path.
    pub fn middleware(mut self, name: &'static str, handler: Arc<dyn Handler>) -> Self {
        self.bindings.push(Binding {
            name,
            kind: BindingKind::Middleware,
            method: MethodFilter::Any,
            pattern: PathPattern::parse("*"),
            handler,
        });
        self
    }

    /// Register an endpoint.
    pub fn route(
        mut self,
        name: &'static str,
        method: MethodFilter,
        pattern: &str,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.bindings.push(Binding {
            name,
            kind: BindingKind::Endpoint,
            method,
            pattern: PathPattern::parse(pattern),
            handler,
        });
        self
    }

    pub fn get(self, name: &'static str, pattern: &str, handler: Arc<dyn Handler>) -> Self {
        self.route(name, MethodFilter::Only(Method::GET), pattern, handler)
    }

    pub fn post(self, name: &'static str, pattern: &str, handler: Arc<dyn Handler>) -> Self {
        self.route(name, MethodFilter::Only(Method::POST), pattern, handler)
    }

    pub fn all(self, name: &'static str, pattern: &str, handler: Arc<dyn Handler>) -> Self {
        self.route(name, MethodFilter::Any, pattern, handler)
    }

    /// Freeze the table. The last binding must be a catch-all endpoint.
    pub fn build(self) -> Result<RouteTable, RouteTableError> {
        match self.bindings.last() {
            Some(last) if last.is_fallback() => Ok(RouteTable {
                bindings: self.bindings,
            }),
            _ => Err(RouteTableError::MissingFallback),
        }
    }
}
