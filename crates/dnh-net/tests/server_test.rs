#![allow(clippy::unwrap_used)]
// Integration tests for `HubServer` over real loopback sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value as Json, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use dnh_core::TracingSink;
use dnh_net::{Error, HubAddrs, HubServer, ServerStatus};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Helpers ─────────────────────────────────────────────────────────

async fn start() -> (HubServer, HubAddrs) {
    let server = HubServer::new(Arc::new(TracingSink), 64);
    let loopback: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let addrs = server
        .start(HubAddrs {
            http: loopback,
            ws: loopback,
        })
        .await
        .unwrap();
    (server, addrs)
}

async fn connect(addrs: HubAddrs, path: &str) -> Result<Ws, tungstenite::Error> {
    tokio_tungstenite::connect_async(format!("ws://{}{path}", addrs.ws))
        .await
        .map(|(ws, _)| ws)
}

async fn send(ws: &mut Ws, message: &Json) {
    ws.send(Message::text(message.to_string())).await.unwrap();
}

async fn recv(ws: &mut Ws) -> Json {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn register(addrs: HubAddrs, name: &str) -> (Ws, String) {
    let mut ws = connect(addrs, "/realtime").await.unwrap();
    send(
        &mut ws,
        &json!({"apity": "register", "type": "lamp", "name": name}),
    )
    .await;
    let reply = recv(&mut ws).await;
    assert_eq!(reply["status"], "success");
    (ws, reply["guid"].as_str().unwrap().to_owned())
}

// ── WebSocket ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_register_and_roster_broadcast() {
    let (server, addrs) = start().await;
    assert_eq!(server.status(), ServerStatus::Running);

    let (mut first, _) = register(addrs, "one").await;
    let (_second, second_guid) = register(addrs, "two").await;

    assert_eq!(
        recv(&mut first).await,
        json!({"apity": "changedroster", "change": "add", "guid": second_guid, "name": "two", "type": "lamp"})
    );

    server.shutdown().await;
    assert_eq!(server.status(), ServerStatus::Stopped);
}

#[tokio::test]
async fn test_trailing_slash_is_accepted() {
    let (server, addrs) = start().await;
    let mut ws = connect(addrs, "/realtime/").await.unwrap();
    send(&mut ws, &json!({"apity": "status"})).await;
    assert_eq!(
        recv(&mut ws).await["reason"],
        "Connection must be registered to submit request."
    );
    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_path_is_rejected_with_404() {
    let (server, addrs) = start().await;
    match connect(addrs, "/elsewhere").await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 404),
        other => panic!("expected HTTP 404, got {other:?}"),
    }
    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_announces_removal() {
    let (server, addrs) = start().await;
    let (mut watcher, _) = register(addrs, "watcher").await;
    let (mut leaver, leaver_guid) = register(addrs, "leaver").await;
    recv(&mut watcher).await;

    leaver.close(None).await.unwrap();
    assert_eq!(
        recv(&mut watcher).await,
        json!({"apity": "changedroster", "change": "rem", "guid": leaver_guid})
    );
    server.shutdown().await;
}

#[tokio::test]
async fn test_binary_frames_are_ignored() {
    let (server, addrs) = start().await;
    let (mut ws, _) = register(addrs, "bin").await;
    ws.send(Message::binary(vec![1_u8, 2, 3])).await.unwrap();
    send(&mut ws, &json!({"apity": "status", "postage": "after"})).await;
    assert_eq!(recv(&mut ws).await["postage"], "after");
    server.shutdown().await;
}

#[tokio::test]
async fn test_pinger_reaches_pending_connections() {
    let (server, addrs) = start().await;
    let mut ws = connect(addrs, "/realtime").await.unwrap();
    server.spawn_pinger(Duration::from_millis(50));
    assert_eq!(recv(&mut ws).await, json!({"apity": "ping"}));
    server.shutdown().await;
}

#[tokio::test]
async fn test_second_start_fails() {
    let (server, addrs) = start().await;
    assert!(matches!(server.start(addrs).await, Err(Error::AlreadyRunning)));
    server.shutdown().await;
    assert!(matches!(server.start(addrs).await, Err(Error::ShutDown)));
}

// ── HTTP ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_http_equipment_is_pretty_json() {
    let (server, addrs) = start().await;
    let (_ws, guid) = register(addrs, "lit").await;

    let response = reqwest::get(format!("http://{}/equipment", addrs.http))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("\n    \"equipment\""));

    let parsed: Json = serde_json::from_str(&body).unwrap();
    let list = parsed["equipment"].as_array().unwrap();
    assert_eq!(list[0]["guid"], guid.as_str());
    assert_eq!(list[1]["guid"], "system");
    server.shutdown().await;
}

#[tokio::test]
async fn test_http_system_and_status() {
    let (server, addrs) = start().await;
    let (_ws, guid) = register(addrs, "sys").await;

    let system: Json = reqwest::get(format!("http://{}/system", addrs.http))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(system["apity"], "system");
    assert_eq!(system["equipment"], json!([{"name": "sys", "guid": guid}]));

    let status: Json = reqwest::get(format!("http://{}/status", addrs.http))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        status,
        json!({"apity": "status", "UNIMPLEMENTED": "UNIMPLEMENTED"})
    );

    let missing = reqwest::get(format!("http://{}/nothing", addrs.http))
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    server.shutdown().await;
}
