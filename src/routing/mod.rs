//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (walk bindings in registration order)
//!     → matcher.rs (method filter + path pattern, capture :params)
//!     → handler: Continue (middleware passes) or Respond (stop)
//!
//! Table construction (at startup):
//!     middleware (*) → endpoints → catch-all fallback
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Deterministic: same input always matches same binding
//! - First match wins (registration order, no priorities)
//! - The fallback makes every request end in a response

pub mod matcher;
pub mod router;

pub use matcher::{MethodFilter, Params, PathPattern};
pub use router::{
    Binding, BindingKind, Handler, Outcome, RouteRequest, RouteTable, RouteTableBuilder,
    RouteTableError,
};
