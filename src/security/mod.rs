//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs Preflight (OPTIONS answered here, never routed)
//!     → origin.rs OriginGuard (403 for unknown cross-origin callers)
//!     → Pass to room routes
//!
//! Outgoing response:
//!     → cors.rs CorsReconciler (add CORS headers, restore set-cookie values)
//! ```
//!
//! # Design Decisions
//! - One OriginPolicy instance is shared by the guard and CORS
//! - Fail closed: a missing Origin is rejected outside local mode

pub mod cors;
pub mod origin;

pub use cors::{CorsAugment, CorsHeaders, CorsReconciler, Preflight};
pub use origin::{
    policy_from_env, Admission, AllowAnyOrigin, OriginAllowList, OriginGuard, OriginPolicy,
    AUTH_CALLBACK_PATH,
};
