//! Request/response channel against a live server.

use axum::http::StatusCode;
use tilesync_client::{
    ClientError, HttpBackend, HttpTransport, Method, OwnershipsGetter, Ownerships, TileClicker,
    Transport, TransportError,
};

use crate::harness::TestServer;

fn sample() -> Ownerships {
    let mut ownerships = Ownerships::new();
    ownerships.insert(5, "US".into());
    ownerships.insert(12, "CA".into());
    ownerships
}

#[tokio::test]
async fn test_snapshot_roundtrip() {
    let server = TestServer::start(sample()).await;
    let backend = HttpBackend::connect(&server.config()).unwrap();

    let ownerships = backend.get_current_ownerships().await.unwrap();
    assert_eq!(ownerships, sample());
}

#[tokio::test]
async fn test_empty_snapshot() {
    let server = TestServer::start(Ownerships::new()).await;
    let backend = HttpBackend::connect(&server.config()).unwrap();

    assert!(backend.get_current_ownerships().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_click_reaches_server() {
    let server = TestServer::start(Ownerships::new()).await;
    let backend = HttpBackend::connect(&server.config()).unwrap();

    backend.click_tile(3, "DE").await.unwrap();

    let clicks = server.state.clicks.lock().unwrap().clone();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].tile_id, 3);
    assert_eq!(clicks[0].country_id, "DE");

    let ownerships = backend.get_current_ownerships().await.unwrap();
    assert_eq!(ownerships.get(&3).map(String::as_str), Some("DE"));
}

#[tokio::test]
async fn test_click_accepted_with_text_body() {
    let server = TestServer::start(Ownerships::new()).await;
    server.reply_to_clicks("accepted");
    let backend = HttpBackend::connect(&server.config()).unwrap();

    backend.click_tile(3, "DE").await.unwrap();
    assert_eq!(server.state.clicks.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_click_server_error() {
    let server = TestServer::start(sample()).await;
    server.fail_clicks(StatusCode::INTERNAL_SERVER_ERROR, "overloaded");
    let backend = HttpBackend::connect(&server.config()).unwrap();

    let err = backend.click_tile(3, "DE").await.unwrap_err();
    assert!(err.to_string().contains("overloaded"));
    match err {
        ClientError::Transport(TransportError::Status { status, message, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "overloaded");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The failed click changed nothing.
    assert!(server.state.clicks.lock().unwrap().is_empty());
    assert_eq!(backend.get_current_ownerships().await.unwrap(), sample());
}

#[tokio::test]
async fn test_empty_response_is_absent() {
    let server = TestServer::start(Ownerships::new()).await;
    let transport = HttpTransport::new(&server.config()).unwrap();

    let body = tilesync_protocol::encode(&tilesync_protocol::ClickRequest {
        tile_id: 1,
        country_id: "US".into(),
    });
    let reply = transport
        .send(Method::POST, "/app/click", Some(&body))
        .await
        .unwrap();
    assert_eq!(reply, None);
}

#[tokio::test]
async fn test_unknown_path_is_status_error() {
    let server = TestServer::start(Ownerships::new()).await;
    let transport = HttpTransport::new(&server.config()).unwrap();

    let err = transport
        .send(Method::GET, "/app/nowhere", None)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_unreachable_server_is_request_error() {
    // Bind and drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend =
        HttpBackend::connect(&tilesync_client::ClientConfig::new(format!("http://{addr}"))).unwrap();
    let err = backend.get_current_ownerships().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Request { .. })
    ));
}
