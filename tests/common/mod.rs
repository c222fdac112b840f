//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use room_gateway::config::GatewayConfig;
use room_gateway::lifecycle::{ExecutionContext, Shutdown};
use room_gateway::observability::{ErrorReport, ErrorSink, ReportError};
use room_gateway::rooms::HttpRoomBackend;
use room_gateway::{Gateway, HttpServer};

pub const ALLOWED_ORIGIN: &str = "https://www.example.com";

/// Cookies every mock room response sets, in order.
pub const ROOM_COOKIES: [&str; 2] = [
    "room_session=abc123; Path=/; HttpOnly; Secure",
    "room_pref=dark; Path=/; Max-Age=3600",
];

/// Error sink that keeps every report.
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<ErrorReport>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn capture(&self, report: &ErrorReport, _ctx: &ExecutionContext) -> Result<(), ReportError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// A mock room backend that counts hits.
///
/// Every response is 200 with body `"<METHOD> <path-and-query>"` and both
/// [`ROOM_COOKIES`] as separate `set-cookie` headers.
pub struct MockRoomBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockRoomBackend {
    pub async fn start() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let app = Router::new().fallback(move |request: Request| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                room_response(request)
            }
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, hits }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn room_response(request: Request) -> Response {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    let mut response = (StatusCode::OK, format!("{} {}", request.method(), target)).into_response();
    for cookie in ROOM_COOKIES {
        response
            .headers_mut()
            .append(header::SET_COOKIE, HeaderValue::from_static(cookie));
    }
    response
}

/// A room backend whose join route accepts WebSocket sessions and echoes
/// every data frame back.
pub struct MockLiveRoom {
    pub addr: SocketAddr,
}

impl MockLiveRoom {
    pub async fn start() -> Self {
        let app = Router::new().route(
            "/r/{room_id}",
            get(|ws: WebSocketUpgrade| async move { ws.on_upgrade(echo) }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn echo(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        if matches!(message, Message::Text(_) | Message::Binary(_))
            && socket.send(message).await.is_err()
        {
            break;
        }
    }
}

/// A running gateway. Dropping it shuts the server down.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub sink: Arc<RecordingSink>,
    _shutdown: Shutdown,
}

impl TestGateway {
    pub async fn start(config: GatewayConfig) -> Self {
        let sink = Arc::new(RecordingSink::default());
        let backend = Arc::new(HttpRoomBackend::new(&config.rooms).unwrap());
        let gateway = Gateway::new(&config, backend, sink.clone()).unwrap();
        let server = HttpServer::new(config, gateway);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.subscribe();
        let (_, config_updates) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let _ = server.run(listener, config_updates, server_shutdown).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            sink,
            _shutdown: shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Gateway config pointing at `backend_url`, outside local mode.
pub fn config_for(backend_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.rooms.backend_url = backend_url.to_string();
    config.rooms.connect_timeout_secs = 1;
    config.environment.allowed_origins = vec![ALLOWED_ORIGIN.to_string()];
    config
}

/// HTTP client that never pools or proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Every `set-cookie` value on a response, in order.
pub fn cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}
