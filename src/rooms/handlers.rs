//! Room route handlers.
//!
//! Each handler turns path parameters into a [`RoomAction`] and forwards the
//! request to the room backend. None of them look at the body.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{DispatchError, DispatchResult};
use crate::http::response;
use crate::rooms::backend::{RoomAction, RoomBackend};
use crate::routing::{Handler, Outcome, Params, RouteRequest};

/// Builds the action from path parameters, or says what is missing.
type ActionFn = fn(&Params) -> Result<RoomAction, String>;

/// Forwards one kind of room request.
pub struct RoomRoute {
    name: &'static str,
    action: ActionFn,
    backend: Arc<dyn RoomBackend>,
}

impl RoomRoute {
    fn new(name: &'static str, action: ActionFn, backend: Arc<dyn RoomBackend>) -> Self {
        Self {
            name,
            action,
            backend,
        }
    }

    /// `POST /new-room`
    pub fn create_room(backend: Arc<dyn RoomBackend>) -> Self {
        Self::new(
            "create-room",
            |_| {
                Ok(RoomAction::CreateRoom {
                    room_id: Uuid::new_v4().simple().to_string(),
                })
            },
            backend,
        )
    }

    /// `POST /snapshots`
    pub fn create_snapshot(backend: Arc<dyn RoomBackend>) -> Self {
        Self::new("create-snapshot", |_| Ok(RoomAction::CreateSnapshot), backend)
    }

    /// `GET /snapshot/:roomId`
    pub fn get_snapshot(backend: Arc<dyn RoomBackend>) -> Self {
        Self::new(
            "get-snapshot",
            |p| {
                Ok(RoomAction::GetSnapshot {
                    room_id: param(p, "roomId")?,
                })
            },
            backend,
        )
    }

    /// `GET /r/:roomId`
    pub fn join_room(backend: Arc<dyn RoomBackend>) -> Self {
        Self::new(
            "join-room",
            |p| {
                Ok(RoomAction::Join {
                    room_id: param(p, "roomId")?,
                })
            },
            backend,
        )
    }

    /// `GET /r/:roomId/history`
    pub fn get_history(backend: Arc<dyn RoomBackend>) -> Self {
        Self::new(
            "get-history",
            |p| {
                Ok(RoomAction::History {
                    room_id: param(p, "roomId")?,
                })
            },
            backend,
        )
    }

    /// `GET /r/:roomId/history/:timestamp`
    pub fn get_history_snapshot(backend: Arc<dyn RoomBackend>) -> Self {
        Self::new(
            "get-history-snapshot",
            |p| {
                Ok(RoomAction::HistorySnapshot {
                    room_id: param(p, "roomId")?,
                    timestamp: param(p, "timestamp")?,
                })
            },
            backend,
        )
    }

    /// `POST /r/:roomId/restore`
    pub fn restore(backend: Arc<dyn RoomBackend>) -> Self {
        Self::new(
            "forward-to-room",
            |p| {
                Ok(RoomAction::Restore {
                    room_id: param(p, "roomId")?,
                })
            },
            backend,
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn param(params: &Params, name: &str) -> Result<String, String> {
    params
        .get(name)
        .map(str::to_string)
        .ok_or_else(|| format!("route is missing `:{name}`"))
}

#[async_trait]
impl Handler for RoomRoute {
    async fn call(&self, route: RouteRequest<'_>) -> DispatchResult<Outcome> {
        let action = (self.action)(&route.params)
            .map_err(|message| DispatchError::handler(self.name, message))?;
        if let Some(room_id) = action.room_id() {
            route.ctx.set_extra("roomId", Value::from(room_id));
        }
        route.ctx.set_extra("route", Value::from(self.name));

        let response = self.backend.forward(action, route.request).await?;
        Ok(Outcome::Respond(response))
    }
}

/// Terminal fallback for anything no route claimed.
#[derive(Debug, Default)]
pub struct NotFound;

#[async_trait]
impl Handler for NotFound {
    async fn call(&self, _route: RouteRequest<'_>) -> DispatchResult<Outcome> {
        Ok(Outcome::Respond(response::text(StatusCode::NOT_FOUND, "Not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::http::{Request, Response};
    use crate::lifecycle::ExecutionContext;
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<RoomAction>>);

    #[async_trait]
    impl RoomBackend for Recorder {
        async fn forward(&self, action: RoomAction, _request: &Request) -> DispatchResult<Response> {
            self.0.lock().unwrap().push(action);
            Ok(response::empty(StatusCode::OK))
        }
    }

    async fn call(route: &RoomRoute, params: Params) -> (Outcome, ExecutionContext) {
        let req = axum::http::Request::builder().body(Bytes::new()).unwrap();
        let env = Environment::default();
        let ctx = ExecutionContext::new();
        let outcome = route
            .call(RouteRequest {
                request: &req,
                env: &env,
                ctx: &ctx,
                params,
            })
            .await
            .unwrap();
        (outcome, ctx)
    }

    #[tokio::test]
    async fn test_history_snapshot_action() {
        let backend = Arc::new(Recorder::default());
        let route = RoomRoute::get_history_snapshot(backend.clone());
        let mut params = Params::new();
        params.insert("roomId", "abc");
        params.insert("timestamp", "1700000000");

        let (outcome, ctx) = call(&route, params).await;
        assert!(matches!(outcome, Outcome::Respond(_)));
        assert_eq!(
            backend.0.lock().unwrap()[0],
            RoomAction::HistorySnapshot {
                room_id: "abc".into(),
                timestamp: "1700000000".into()
            }
        );
        assert_eq!(ctx.extras().get("roomId"), Some(&Value::from("abc")));
    }

    #[tokio::test]
    async fn test_create_room_assigns_fresh_ids() {
        let backend = Arc::new(Recorder::default());
        let route = RoomRoute::create_room(backend.clone());
        call(&route, Params::new()).await;
        call(&route, Params::new()).await;

        let actions = backend.0.lock().unwrap();
        let ids: Vec<_> = actions.iter().filter_map(|a| a.room_id()).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(ids[0].len(), 32);
    }

    #[tokio::test]
    async fn test_missing_param_is_handler_error() {
        let route = RoomRoute::join_room(Arc::new(Recorder::default()));
        let req = axum::http::Request::builder().body(Bytes::new()).unwrap();
        let env = Environment::default();
        let ctx = ExecutionContext::new();
        let err = route
            .call(RouteRequest {
                request: &req,
                env: &env,
                ctx: &ctx,
                params: Params::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Handler { handler: "join-room", ref message } if message.contains(":roomId")
        ));
        assert_eq!(err.kind(), "handler");
    }
}
