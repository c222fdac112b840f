//! End-to-end tests: reqwest → gateway → mock room backend.

use axum::http::{header, StatusCode};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

mod common;

use common::{
    client, config_for, cookies, MockLiveRoom, MockRoomBackend, TestGateway, ALLOWED_ORIGIN,
    ROOM_COOKIES,
};

#[tokio::test]
async fn test_new_room_from_allowed_origin() {
    let backend = MockRoomBackend::start().await;
    let gateway = TestGateway::start(config_for(&backend.url())).await;

    let res = client()
        .post(gateway.url("/new-room"))
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
    assert_eq!(cookies(&res), ROOM_COOKIES);

    let body = res.text().await.unwrap();
    let path = body.strip_prefix("POST /r/").expect("forwarded to a room");
    let room_id = path.strip_suffix("/create").expect("create action");
    assert_eq!(room_id.len(), 32);
    assert!(room_id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_history_snapshot_forwarded_with_query() {
    let backend = MockRoomBackend::start().await;
    let gateway = TestGateway::start(config_for(&backend.url())).await;

    let res = client()
        .get(gateway.url("/r/abc/history/1700000000?format=json"))
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.text().await.unwrap(),
        "GET /r/abc/history/1700000000?format=json"
    );
}

#[tokio::test]
async fn test_missing_origin_is_rejected_before_backend() {
    let backend = MockRoomBackend::start().await;
    let gateway = TestGateway::start(config_for(&backend.url())).await;

    let res = client().get(gateway.url("/r/abc")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(res
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    assert_eq!(res.text().await.unwrap(), "Not allowed");

    let res = client()
        .get(gateway.url("/r/abc"))
        .header(header::ORIGIN, "https://evil.example")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(!res
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_same_origin_needs_no_origin_header() {
    let backend = MockRoomBackend::start().await;
    let gateway = TestGateway::start(config_for(&backend.url())).await;

    let res = client()
        .get(gateway.url("/snapshot/abc"))
        .header("sec-fetch-site", "same-origin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_auth_callback_bypasses_origin_check() {
    let backend = MockRoomBackend::start().await;
    let gateway = TestGateway::start(config_for(&backend.url())).await;

    // No route owns the callback, so it lands on the fallback instead of the guard.
    let res = client().get(gateway.url("/auth/callback")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "Not found");
}

#[tokio::test]
async fn test_local_mode_allows_missing_origin() {
    let backend = MockRoomBackend::start().await;
    let mut config = config_for(&backend.url());
    config.environment.is_local = true;
    let gateway = TestGateway::start(config).await;

    let res = client()
        .post(gateway.url("/snapshots"))
        .body("{\"doc\":1}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "POST /snapshots");
}

#[tokio::test]
async fn test_preflight_is_answered_by_gateway() {
    let backend = MockRoomBackend::start().await;
    let gateway = TestGateway::start(config_for(&backend.url())).await;

    let res = client()
        .request(reqwest::Method::OPTIONS, gateway.url("/r/abc/restore"))
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
    assert_eq!(
        res.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "content-type"
    );
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_unknown_path_is_404_with_cors() {
    let backend = MockRoomBackend::start().await;
    let gateway = TestGateway::start(config_for(&backend.url())).await;

    let res = client()
        .get(gateway.url("/unknown/path"))
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_unreachable_backend_is_reported_once() {
    // Reserve a port, then free it so nothing is listening there.
    let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let gateway = TestGateway::start(config_for(&format!("http://{dead_addr}"))).await;

    let res = client()
        .get(gateway.url("/r/abc?debug=1"))
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .header(header::USER_AGENT, "room-client/2.0")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    let body = res.text().await.unwrap();
    assert_eq!(body, "Something went wrong");
    assert!(!body.contains(&dead_addr.to_string()));

    let reports = gateway.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, "backend");
    assert_eq!(reports[0].method, "GET");
    assert!(reports[0].url.ends_with("/r/abc?debug=1"));
    assert_eq!(reports[0].user_agent.as_deref(), Some("room-client/2.0"));
    assert_eq!(
        reports[0].extras.get("roomId"),
        Some(&serde_json::Value::from("abc"))
    );
}

#[tokio::test]
async fn test_join_upgrades_to_live_session() {
    let room = MockLiveRoom::start().await;
    let gateway = TestGateway::start(config_for(&room.url())).await;

    let mut request = format!("ws://{}/r/abc", gateway.addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert(header::ORIGIN, ALLOWED_ORIGIN.parse().unwrap());

    let (mut socket, response) = tokio_tungstenite::connect_async(request)
        .await
        .expect("join did not upgrade");
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

    socket.send(Message::Text("hello".into())).await.unwrap();
    let reply = socket.next().await.unwrap().unwrap();
    assert_eq!(reply.to_text().unwrap(), "hello");

    socket.send(Message::Text("second".into())).await.unwrap();
    let reply = socket.next().await.unwrap().unwrap();
    assert_eq!(reply.to_text().unwrap(), "second");
    assert!(gateway.sink.reports().is_empty());
}

#[tokio::test]
async fn test_join_upgrade_still_needs_allowed_origin() {
    let room = MockLiveRoom::start().await;
    let gateway = TestGateway::start(config_for(&room.url())).await;

    let mut request = format!("ws://{}/r/abc", gateway.addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://evil.example".parse().unwrap());

    let err = tokio_tungstenite::connect_async(request).await.unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
        other => panic!("unexpected error: {other}"),
    }
}
