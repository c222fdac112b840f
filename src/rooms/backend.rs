//! Room backend abstraction.
//!
//! # Responsibilities
//! - Name every operation the gateway forwards ([`RoomAction`])
//! - Forward a request to the room backend and pass its response back untouched
//!
//! # Design Decisions
//! - The backend is opaque; the gateway never inspects bodies
//! - Hop-by-hop headers are stripped, everything else (cookies included) is forwarded
//! - A join that asks for an upgrade keeps its `upgrade` header; on 101 the two
//!   upgraded connections are spliced byte for byte
//! - Transport failures are errors for the error boundary, not synthesized responses

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{self, HeaderName};
use axum::http::{HeaderValue, StatusCode, Uri};
use hyper::body::Incoming;
use hyper::upgrade::OnUpgrade;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo},
};
use url::Url;

use crate::config::RoomsConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::http::{Request, Response};

/// Operation requested of the room backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    CreateRoom { room_id: String },
    CreateSnapshot,
    GetSnapshot { room_id: String },
    Join { room_id: String },
    History { room_id: String },
    HistorySnapshot { room_id: String, timestamp: String },
    Restore { room_id: String },
}

impl RoomAction {
    /// Room this action targets, if any.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            RoomAction::CreateSnapshot => None,
            RoomAction::CreateRoom { room_id }
            | RoomAction::GetSnapshot { room_id }
            | RoomAction::Join { room_id }
            | RoomAction::History { room_id }
            | RoomAction::HistorySnapshot { room_id, .. }
            | RoomAction::Restore { room_id } => Some(room_id),
        }
    }

    /// Unencoded path segments on the backend.
    pub fn backend_segments(&self) -> Vec<&str> {
        match self {
            RoomAction::CreateRoom { room_id } => vec!["r", room_id, "create"],
            RoomAction::CreateSnapshot => vec!["snapshots"],
            RoomAction::GetSnapshot { room_id } => vec!["snapshot", room_id],
            RoomAction::Join { room_id } => vec!["r", room_id],
            RoomAction::History { room_id } => vec!["r", room_id, "history"],
            RoomAction::HistorySnapshot { room_id, timestamp } => {
                vec!["r", room_id, "history", timestamp]
            }
            RoomAction::Restore { room_id } => vec!["r", room_id, "restore"],
        }
    }
}

/// The per-room backend every room route ends up at.
#[async_trait]
pub trait RoomBackend: Send + Sync {
    async fn forward(&self, action: RoomAction, request: &Request) -> DispatchResult<Response>;
}

const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// True when the client sent `connection: upgrade` together with an `upgrade` protocol.
fn wants_upgrade(request: &Request) -> bool {
    let connection_upgrade = request
        .headers()
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && request.headers().contains_key(header::UPGRADE)
}

/// Copy bytes between the client and the room until either side closes.
async fn splice(client: OnUpgrade, backend: OnUpgrade, room_id: String) {
    let (client, backend) = match tokio::try_join!(client, backend) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(error = %e, room_id = %room_id, "Live session upgrade failed");
            return;
        }
    };

    let mut client = TokioIo::new(client);
    let mut backend = TokioIo::new(backend);
    match tokio::io::copy_bidirectional(&mut client, &mut backend).await {
        Ok((to_room, to_client)) => {
            tracing::debug!(room_id = %room_id, to_room, to_client, "Live session closed");
        }
        Err(e) => {
            tracing::debug!(error = %e, room_id = %room_id, "Live session ended");
        }
    }
}

/// Forwards room actions over HTTP.
#[derive(Clone)]
pub struct HttpRoomBackend {
    base_url: Url,
    client: Client<HttpConnector, Body>,
}

impl HttpRoomBackend {
    pub fn new(config: &RoomsConfig) -> DispatchResult<Self> {
        let base_url = Url::parse(&config.backend_url)
            .map_err(|e| DispatchError::Internal(format!("invalid room backend URL: {e}")))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self { base_url, client })
    }

    /// Backend URL for `action`, carrying over the inbound query string.
    pub fn target_url(&self, action: &RoomAction, query: Option<&str>) -> DispatchResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DispatchError::Internal("room backend URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(action.backend_segments());
        url.set_query(query);
        Ok(url)
    }

    /// The request sent to the backend for `action`.
    ///
    /// Hop-by-hop headers are dropped unless `upgrade` is set, in which case
    /// the `upgrade` header survives and `connection` is reduced to `upgrade`.
    pub fn outbound_request(
        &self,
        action: &RoomAction,
        request: &Request,
        upgrade: bool,
    ) -> DispatchResult<axum::http::Request<Body>> {
        let url = self.target_url(action, request.uri().query())?;
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| DispatchError::BadRequest(format!("backend URI: {e}")))?;

        let mut builder = axum::http::Request::builder()
            .method(request.method().clone())
            .uri(uri);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in request.headers() {
                if name == header::HOST || HOP_BY_HOP.contains(name) {
                    continue;
                }
                headers.append(name.clone(), value.clone());
            }
            if upgrade {
                if let Some(protocol) = request.headers().get(header::UPGRADE) {
                    headers.insert(header::UPGRADE, protocol.clone());
                    headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
                }
            }
        }
        Ok(builder.body(Body::from(request.body().clone()))?)
    }
}

#[async_trait]
impl RoomBackend for HttpRoomBackend {
    async fn forward(&self, action: RoomAction, request: &Request) -> DispatchResult<Response> {
        let client_upgrade = match &action {
            RoomAction::Join { .. } if wants_upgrade(request) => {
                request.extensions().get::<OnUpgrade>().cloned()
            }
            _ => None,
        };
        let upstream = self.outbound_request(&action, request, client_upgrade.is_some())?;

        tracing::debug!(action = ?action, uri = %upstream.uri(), "Forwarding to room backend");
        let mut response: axum::http::Response<Incoming> = self
            .client
            .request(upstream)
            .await
            .map_err(|e| DispatchError::Backend(e.to_string()))?;

        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
            if let Some(client) = client_upgrade {
                let backend = hyper::upgrade::on(&mut response);
                let room_id = action.room_id().unwrap_or_default().to_string();
                tokio::spawn(splice(client, backend, room_id));

                let (parts, _) = response.into_parts();
                return Ok(Response::from_parts(parts, Body::empty()));
            }
        }

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
