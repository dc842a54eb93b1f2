//! Loopback tests for the HTTP bootstrap surface.
//!
//! Requests are written by hand over a `TcpStream` with
//! `Connection: close`, so the whole response can be read to EOF and
//! inspected as text.  The surface shares its port with the session
//! channel, which is checked here too.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use localdesk_core::{
    protocol::session::{decode_server_message, PairResponse},
    ServerMessage,
};
use localdesk_host::application::{dispatch::SessionDispatcher, testing::TestHost};
use localdesk_host::infrastructure::network::server::HostServer;
use localdesk_host::platform::AudioControl;

async fn start(host: &TestHost) -> (SocketAddr, Arc<AtomicBool>) {
    let dispatcher = Arc::new(SessionDispatcher::new(host.state.clone()));
    let server = HostServer::bind("127.0.0.1:0".parse().unwrap(), host.state.clone(), dispatcher)
        .await
        .expect("bind must succeed on an ephemeral port");
    let addr = server.local_addr();
    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(server.run(Arc::clone(&running)));
    (addr, running)
}

/// Sends one request and returns `(status line, JSON body)`.
async fn request(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> (String, Value) {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let body = body.unwrap_or("");
    let head = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\
         Content-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await.expect("write head");
    stream.write_all(body.as_bytes()).await.expect("write body");

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.expect("read response");
    let (headers, payload) = raw.split_once("\r\n\r\n").expect("header/body separator");
    let status = headers.lines().next().unwrap_or_default().to_string();
    let json = serde_json::from_str(payload).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_device_info_and_health() {
    // Arrange
    let host = TestHost::new();
    let (addr, running) = start(&host).await;

    // Act
    let (info_status, info) = request(addr, "GET", "/device-info", None).await;
    let (health_status, health) = request(addr, "GET", "/health", None).await;

    // Assert
    assert!(info_status.contains("200"), "{info_status}");
    assert_eq!(info["id"], "host-under-test");
    assert_eq!(info["type"], "desktop");
    assert!(health_status.contains("200"));
    assert_eq!(health["status"], "ok");

    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_pages_and_legacy_shortcuts() {
    let host = TestHost::new();
    let (addr, running) = start(&host).await;

    let (_, pages) = request(addr, "GET", "/pages", None).await;
    let (_, shortcuts) = request(addr, "GET", "/shortcuts", None).await;

    assert_eq!(pages.as_array().map(Vec::len), Some(1));
    assert_eq!(shortcuts, pages[0]["shortcuts"]);

    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_post_volume_clamps_and_applies() {
    // Arrange
    let host = TestHost::new();
    let (addr, running) = start(&host).await;

    // Act
    let (status, reply) = request(addr, "POST", "/volume", Some(r#"{"volume":140}"#)).await;

    // Assert
    assert!(status.contains("200"), "{status}");
    assert_eq!(reply["volume"], 100);
    assert_eq!(reply["success"], true);
    assert_eq!(host.backends.audio.volume().unwrap(), 100);

    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_unknown_screen_is_not_found() {
    let host = TestHost::new();
    let (addr, running) = start(&host).await;

    let (status, _) = request(addr, "GET", "/screen-info?sourceId=screen:9:0", None).await;

    assert!(status.contains("404"), "{status}");

    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_pages_and_session_share_the_advertised_port() {
    // Arrange: a trusted phone and one listener.
    let host = TestHost::with_trusted(&["phone"]);
    let (addr, running) = start(&host).await;

    // Act: fetch pages over HTTP, then open the session on the same port.
    let (status, pages) = request(addr, "GET", "/pages", None).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}"))
        .await
        .expect("the HTTP port must also accept the WebSocket handshake");
    ws.send(Message::Text(
        r#"{"event":"pair-request","data":{"deviceId":"phone","deviceName":"Phone","deviceType":"android"}}"#
            .to_string(),
    ))
    .await
    .expect("send");
    let reply = loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for the pairing reply")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            break decode_server_message(&text).expect("host frames must decode");
        }
    };

    // Assert
    assert!(status.contains("200"), "{status}");
    assert_eq!(pages.as_array().map(Vec::len), Some(1));
    assert_eq!(reply, ServerMessage::PairResponse(PairResponse::auto_granted()));

    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_plain_get_on_root_is_not_upgraded() {
    let host = TestHost::new();
    let (addr, running) = start(&host).await;

    let (status, _) = request(addr, "GET", "/", None).await;

    assert!(!status.contains("101"), "{status}");
    assert!(host.state.connected_clients().await.is_empty());

    running.store(false, Ordering::Relaxed);
}
