#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use tableside_gateway::auth::tokens;
use tableside_gateway::auth::Identity;
use tableside_gateway::config::{Config, DEFAULT_STAFF_ROLES};
use tableside_gateway::gateway::bus::PubSubBus;
use tableside_gateway::gateway::emitter::Emitter;
use tableside_gateway::gateway::Gateway;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TEST_SECRET: &str = "test-secret-do-not-use-in-production";
pub const ALLOWED_ORIGIN: &str = "https://pos.tableside.test";

pub fn test_config() -> Config {
    Config {
        jwt_secret: TEST_SECRET.to_string(),
        port: 0,
        gateway_path: "/ws".to_string(),
        allowed_origins: vec![ALLOWED_ORIGIN.to_string()],
        staff_roles: DEFAULT_STAFF_ROLES.iter().map(|r| r.to_string()).collect::<HashSet<_>>(),
        redis_url: None,
    }
}

/// Start a gateway on an ephemeral port. The server runs in the background.
pub async fn start_gateway(bus: Option<Arc<dyn PubSubBus>>) -> (SocketAddr, Gateway) {
    let config = test_config();
    let gateway = Gateway::start(&config, bus, Emitter::new())
        .await
        .expect("start gateway");
    let app = tableside_gateway::routes::router(&config.gateway_path).with_state(gateway.app_state(config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, gateway)
}

pub fn mint_token(role: &str) -> String {
    let identity = Identity {
        id: format!("usr_{role}"),
        email: format!("{role}@tableside.test"),
        role: role.to_string(),
    };
    tokens::mint(TEST_SECRET, &identity, chrono::Duration::minutes(5)).expect("mint test token")
}

/// Open a WebSocket to `path` with the allowed origin and an optional bearer
/// header, returning the handshake error as-is.
pub async fn try_connect(
    addr: SocketAddr,
    path: &str,
    origin: Option<&str>,
    bearer: Option<&str>,
) -> Result<Client, tungstenite::Error> {
    let mut request = format!("ws://{addr}{path}").into_client_request().unwrap();
    if let Some(origin) = origin {
        request
            .headers_mut()
            .insert("origin", HeaderValue::from_str(origin).unwrap());
    }
    if let Some(token) = bearer {
        request.headers_mut().insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
    }
    tokio_tungstenite::connect_async(request).await.map(|(ws, _)| ws)
}

/// Connect and consume the hello frame.
pub async fn connect(addr: SocketAddr, bearer: Option<&str>) -> (Client, Value) {
    let mut ws = try_connect(addr, "/ws", Some(ALLOWED_ORIGIN), bearer)
        .await
        .expect("ws connect");
    let hello = recv_json(&mut ws).await;
    assert_eq!(hello["type"], "hello");
    (ws, hello)
}

pub async fn send_json(ws: &mut Client, frame: Value) {
    send_text(ws, &frame.to_string()).await;
}

pub async fn send_text(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.expect("ws send");
}

/// Next text frame as JSON, skipping control frames.
pub async fn recv_json(ws: &mut Client) -> Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("frame is json");
        }
    }
}

/// Assert nothing arrives within a short window.
pub async fn assert_silent(ws: &mut Client) {
    if let Ok(Some(Ok(Message::Text(text)))) = time::timeout(Duration::from_millis(300), ws.next()).await {
        panic!("unexpected frame: {text}");
    }
}

/// Join a restaurant room as whoever `ws` is and consume the reply.
pub async fn join(ws: &mut Client, restaurant_id: Value) -> Value {
    send_json(ws, serde_json::json!({ "type": "join", "restaurantId": restaurant_id })).await;
    recv_json(ws).await
}

/// Poll until `check` holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
