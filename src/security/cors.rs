//! Cross-origin response handling.
//!
//! # Responsibilities
//! - Answer pre-flight probes before routing
//! - Add CORS headers to every outgoing response
//! - Keep multi-valued headers (`set-cookie`) intact across augmentation
//!
//! # Design Decisions
//! - Augmentation is a trait so the header policy can be swapped
//! - The reconciler never trusts the augmenter with multi-valued headers: it
//!   captures every value before, and restores them verbatim after
//! - Responses that already carry `access-control-allow-origin`, and protocol
//!   upgrades, are passed through untouched

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode};

use crate::config::CorsConfig;
use crate::error::DispatchResult;
use crate::http::request::header_str;
use crate::http::{response, Request, Response};
use crate::routing::{Handler, Outcome, RouteRequest};
use crate::security::origin::OriginPolicy;

/// Generic CORS augmentation of a finished response.
pub trait CorsAugment: Send + Sync {
    fn augment(&self, request: &Request, response: Response) -> Response;
}

/// Header-based CORS policy built from `[cors]`.
pub struct CorsHeaders {
    policy: Arc<dyn OriginPolicy>,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: Option<HeaderValue>,
    max_age: HeaderValue,
    allow_credentials: bool,
}

impl CorsHeaders {
    pub fn from_config(config: &CorsConfig, policy: Arc<dyn OriginPolicy>) -> Self {
        let mut methods: Vec<String> = vec![Method::OPTIONS.to_string()];
        for m in &config.allow_methods {
            let m = m.to_uppercase();
            if !methods.contains(&m) {
                methods.push(m);
            }
        }

        Self {
            policy,
            allow_methods: list_value(&methods),
            allow_headers: list_value(&config.allow_headers),
            expose_headers: (!config.expose_headers.is_empty())
                .then(|| list_value(&config.expose_headers)),
            max_age: HeaderValue::from(config.max_age_secs),
            allow_credentials: config.allow_credentials,
        }
    }

    /// Allowed Origin of `request`, if any.
    fn allowed_origin(&self, request: &Request) -> Option<HeaderValue> {
        let origin = request.headers().get(header::ORIGIN)?;
        let allowed = origin
            .to_str()
            .map(|o| self.policy.allows(o))
            .unwrap_or(false);
        allowed.then(|| origin.clone())
    }

    fn apply(&self, request: &Request, headers: &mut HeaderMap) {
        if let Some(origin) = self.allowed_origin(request) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        if let Some(expose) = &self.expose_headers {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }
        // Vary may already list other request headers.
        headers.append(header::VARY, HeaderValue::from_static("origin"));
    }

    /// The empty response sent for a pre-flight probe.
    pub fn preflight(&self, request: &Request) -> Response {
        let mut response = response::empty(StatusCode::NO_CONTENT);
        let headers = response.headers_mut();
        self.apply(request, headers);

        let allow_headers = request
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned()
            .unwrap_or_else(|| self.allow_headers.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);

        tracing::debug!(
            origin = header_str(request, header::ORIGIN).unwrap_or_default(),
            path = %request.uri().path(),
            "Answered pre-flight"
        );
        response
    }
}

impl CorsAugment for CorsHeaders {
    fn augment(&self, request: &Request, mut response: Response) -> Response {
        if response.status() == StatusCode::SWITCHING_PROTOCOLS
            || response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        {
            return response;
        }
        self.apply(request, response.headers_mut());
        response
    }
}

fn list_value(items: &[String]) -> HeaderValue {
    HeaderValue::from_str(&items.join(", ")).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Middleware answering every OPTIONS request before it reaches a route.
pub struct Preflight {
    cors: Arc<CorsHeaders>,
}

impl Preflight {
    pub fn new(cors: Arc<CorsHeaders>) -> Self {
        Self { cors }
    }
}

#[async_trait]
impl Handler for Preflight {
    async fn call(&self, route: RouteRequest<'_>) -> DispatchResult<Outcome> {
        if route.request.method() == Method::OPTIONS {
            return Ok(Outcome::Respond(self.cors.preflight(route.request)));
        }
        Ok(Outcome::Continue)
    }
}

/// Applies CORS augmentation while preserving multi-valued headers.
pub struct CorsReconciler {
    augment: Arc<dyn CorsAugment>,
    preserved: Vec<HeaderName>,
}

impl CorsReconciler {
    /// Reconciler preserving `set-cookie`.
    pub fn new(augment: Arc<dyn CorsAugment>) -> Self {
        Self {
            augment,
            preserved: vec![header::SET_COOKIE],
        }
    }

    /// Also preserve `name` (e.g. `link`) across augmentation.
    pub fn preserve(mut self, name: HeaderName) -> Self {
        if !self.preserved.contains(&name) {
            self.preserved.push(name);
        }
        self
    }

    /// Augment `response`, then restore every captured value of each preserved header.
    ///
    /// Headers with no values before augmentation are left as the augmenter set them.
    pub fn reconcile(&self, request: &Request, response: Response) -> Response {
        let captured: Vec<(HeaderName, Vec<HeaderValue>)> = self
            .preserved
            .iter()
            .map(|name| {
                let values = response.headers().get_all(name).iter().cloned().collect();
                (name.clone(), values)
            })
            .filter(|(_, values): &(HeaderName, Vec<HeaderValue>)| !values.is_empty())
            .collect();

        let mut augmented = self.augment.augment(request, response);
        if captured.is_empty() {
            return augmented;
        }

        let headers = augmented.headers_mut();
        for (name, values) in captured {
            headers.remove(&name);
            for value in values {
                headers.append(name.clone(), value);
            }
        }
        augmented
    }
}
