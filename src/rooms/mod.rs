//! Room routes.
//!
//! # Route table (evaluated top to bottom, first response wins)
//! ```text
//! ANY  *                               → preflight (answers OPTIONS)
//! ANY  *                               → origin guard (403 or pass)
//! POST /new-room                       → create-room
//! POST /snapshots                      → create-snapshot
//! GET  /snapshot/:roomId               → get-snapshot
//! GET  /r/:roomId                      → join-room
//! GET  /r/:roomId/history              → get-history
//! GET  /r/:roomId/history/:timestamp   → get-history-snapshot
//! POST /r/:roomId/restore              → forward-to-room
//! ANY  *                               → not-found
//! ```

pub mod backend;
pub mod handlers;

use std::sync::Arc;

pub use backend::{HttpRoomBackend, RoomAction, RoomBackend};
pub use handlers::{NotFound, RoomRoute};

use crate::routing::{Handler, RouteTable, RouteTableError};

/// Assemble the gateway's route table.
pub fn route_table(
    preflight: Arc<dyn Handler>,
    origin_guard: Arc<dyn Handler>,
    backend: Arc<dyn RoomBackend>,
) -> Result<RouteTable, RouteTableError> {
    RouteTable::builder()
        .middleware("preflight", preflight)
        .middleware("origin-guard", origin_guard)
        .post("create-room", "/new-room", Arc::new(RoomRoute::create_room(backend.clone())))
        .post(
            "create-snapshot",
            "/snapshots",
            Arc::new(RoomRoute::create_snapshot(backend.clone())),
        )
        .get(
            "get-snapshot",
            "/snapshot/:roomId",
            Arc::new(RoomRoute::get_snapshot(backend.clone())),
        )
        .get("join-room", "/r/:roomId", Arc::new(RoomRoute::join_room(backend.clone())))
        .get(
            "get-history",
            "/r/:roomId/history",
            Arc::new(RoomRoute::get_history(backend.clone())),
        )
        .get(
            "get-history-snapshot",
            "/r/:roomId/history/:timestamp",
            Arc::new(RoomRoute::get_history_snapshot(backend.clone())),
        )
        .post(
            "forward-to-room",
            "/r/:roomId/restore",
            Arc::new(RoomRoute::restore(backend)),
        )
        .all("not-found", "*", Arc::new(NotFound))
        .build()
}
