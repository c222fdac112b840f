//! Origin admission.
//!
//! # Responsibilities
//! - Decide whether a request may reach the room routes
//! - Expose the allow-list predicate shared with CORS
//!
//! # Policy (in order)
//! 1. `sec-fetch-site: same-origin` is always allowed
//! 2. `/auth/callback` is always allowed (it is verified by its own cookie)
//! 3. Outside local mode, a missing or disallowed Origin is rejected with 403
//! 4. Everything else is allowed

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use regex::Regex;

use crate::config::Environment;
use crate::error::DispatchResult;
use crate::http::request::{header_str, SEC_FETCH_SITE};
use crate::http::{response, Request, Response};
use crate::observability::metrics;
use crate::routing::{Handler, Outcome, RouteRequest};

/// Path exempt from Origin enforcement.
pub const AUTH_CALLBACK_PATH: &str = "/auth/callback";

/// Allow-list predicate for Origin header values.
pub trait OriginPolicy: Send + Sync {
    fn allows(&self, origin: &str) -> bool;
}

/// Accepts every origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAnyOrigin;

impl OriginPolicy for AllowAnyOrigin {
    fn allows(&self, _origin: &str) -> bool {
        true
    }
}

/// Exact origins plus regular expressions, as configured in `[environment]`.
#[derive(Debug, Clone)]
pub struct OriginAllowList {
    exact: Vec<String>,
    patterns: Vec<Regex>,
}

impl OriginAllowList {
    pub fn new(exact: Vec<String>, patterns: Vec<Regex>) -> Self {
        Self {
            exact: exact.into_iter().map(|o| normalize(&o)).collect(),
            patterns,
        }
    }
}

impl OriginPolicy for OriginAllowList {
    fn allows(&self, origin: &str) -> bool {
        let origin = normalize(origin);
        self.exact.iter().any(|o| *o == origin) || self.patterns.iter().any(|re| re.is_match(&origin))
    }
}

// Scheme and host are case-insensitive; a trailing slash is not part of an origin.
fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Build the policy described by an environment.
///
/// `"*"` in `allowed_origins` selects [`AllowAnyOrigin`]. Patterns are assumed
/// valid (config validation rejects bad ones); any that fail to compile are skipped.
pub fn policy_from_env(env: &Environment) -> Arc<dyn OriginPolicy> {
    if env.allowed_origins.iter().any(|o| o == "*") {
        return Arc::new(AllowAnyOrigin);
    }

    let patterns = env
        .allowed_origin_patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "Skipping invalid origin pattern");
                None
            }
        })
        .collect();
    Arc::new(OriginAllowList::new(env.allowed_origins.clone(), patterns))
}

/// Outcome of an admission check.
#[derive(Debug)]
pub enum Admission {
    Allow,
    Deny(Response),
}

/// Rejects cross-origin requests from unknown origins.
#[derive(Clone)]
pub struct OriginGuard {
    policy: Arc<dyn OriginPolicy>,
}

impl OriginGuard {
    pub fn new(policy: Arc<dyn OriginPolicy>) -> Self {
        Self { policy }
    }

    pub fn check(&self, request: &Request, env: &Environment) -> Admission {
        if header_str(request, SEC_FETCH_SITE) == Some("same-origin") {
            return Admission::Allow;
        }

        if request.uri().path() == AUTH_CALLBACK_PATH {
            return Admission::Allow;
        }

        let origin = header_str(request, header::ORIGIN);
        if env.is_local {
            return Admission::Allow;
        }

        let reason = match origin {
            None => "missing origin",
            Some(o) if !self.policy.allows(o) => "origin not allowed",
            Some(_) => return Admission::Allow,
        };

        tracing::warn!(
            reason,
            origin = origin.unwrap_or_default(),
            is_local = env.is_local,
            method = %request.method(),
            path = %request.uri().path(),
            "Attempting to connect from an invalid origin"
        );
        metrics::record_origin_rejection(reason);
        Admission::Deny(response::text(StatusCode::FORBIDDEN, "Not allowed"))
    }
}

#[async_trait]
impl Handler for OriginGuard {
    async fn call(&self, route: RouteRequest<'_>) -> DispatchResult<Outcome> {
        Ok(match self.check(route.request, route.env) {
            Admission::Allow => Outcome::Continue,
            Admission::Deny(response) => Outcome::Respond(response),
        })
    }
}
