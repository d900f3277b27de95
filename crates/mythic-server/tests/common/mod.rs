use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use mythic_core::player::{PlayerId, PlayerRecord};
use mythic_server::SessionServer;
use mythic_server::config::ServerConfig;
use mythic_server::identity::issue_token;
use mythic_server::state::Services;
use mythic_server::store::{MemoryStore, PlayerStore};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const SECRET: &str = "integration-secret";
pub const ALICE: &str = "0xa11ce";
pub const BOB: &str = "0xb0b";

/// A session server on an ephemeral port with two seeded players.
pub struct TestServer {
    pub server: SessionServer,
    pub store: Arc<MemoryStore>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_config(ServerConfig::default()).await
    }

    /// Fast heartbeat for liveness tests.
    pub async fn with_heartbeat(ping_interval_ms: u64, pong_timeout_ms: u64) -> Self {
        let mut config = ServerConfig::default();
        config.heartbeat.ping_interval_ms = ping_interval_ms;
        config.heartbeat.pong_timeout_ms = pong_timeout_ms;
        Self::with_config(config).await
    }

    pub async fn with_config(mut config: ServerConfig) -> Self {
        config.listen_addr = "127.0.0.1:0".to_string();
        config.auth.token_secret = Some(SECRET.to_string());

        let store = Arc::new(MemoryStore::new());
        store.insert_player(PlayerRecord::new(PlayerId::from(ALICE)));
        store.insert_player(PlayerRecord::new(PlayerId::from(BOB)));

        let services = Services::from_config(&config, Arc::clone(&store) as Arc<dyn PlayerStore>);
        let server = SessionServer::start(config, services).await.unwrap();

        // Give the listener a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self { server, store }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.server.local_addr())
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.server.local_addr())
    }

    pub fn player(&self, id: &str) -> PlayerRecord {
        self.store.player(&PlayerId::from(id)).unwrap()
    }
}

pub fn token_for(player: &str) -> String {
    let expires_at = chrono::Utc::now().timestamp() + 3_600;
    issue_token(SECRET, &PlayerId::from(player), expires_at)
}

/// Connect with the given `jwt` cookie value, or no cookie at all.
pub async fn ws_connect_with(url: &str, cookie: Option<&str>) -> WsStream {
    let mut request = url.into_client_request().unwrap();
    if let Some(token) = cookie {
        let value = HeaderValue::from_str(&format!("jwt={token}")).unwrap();
        request.headers_mut().insert("cookie", value);
    }
    let (stream, _) = tokio_tungstenite::connect_async(request).await.unwrap();
    stream
}

/// Connect as `player` and consume the initial `player_data` snapshot.
pub async fn ws_connect_as(server: &TestServer, player: &str) -> (WsStream, serde_json::Value) {
    let mut stream = ws_connect_with(&server.ws_url(), Some(&token_for(player))).await;
    let snapshot = ws_read_json(&mut stream).await;
    assert_eq!(snapshot["type"], "player_data", "expected snapshot, got {snapshot}");
    (stream, snapshot)
}

pub async fn ws_send_json(stream: &mut WsStream, value: serde_json::Value) {
    stream
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Read the next JSON text frame, skipping control frames and heartbeat
/// pings (5s timeout).
pub async fn ws_read_json(stream: &mut WsStream) -> serde_json::Value {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                    if value["type"] == "ping" {
                        continue;
                    }
                    return value;
                },
                Some(Ok(Message::Close(frame))) => panic!("WebSocket closed unexpectedly: {frame:?}"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for a JSON message")
}

/// Read until the server closes; returns the close code and reason.
pub async fn ws_read_close(stream: &mut WsStream) -> (u16, String) {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(Some(frame)))) => {
                    return (u16::from(frame.code), frame.reason.as_str().to_owned());
                },
                Some(Ok(Message::Close(None))) => panic!("Close frame without a code"),
                Some(Err(e)) => panic!("WebSocket error before close: {e}"),
                None => panic!("WebSocket stream ended without a close frame"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for a close frame")
}

/// Assert that no JSON frame arrives within `wait`.
pub async fn ws_expect_silence(stream: &mut WsStream, wait: Duration) {
    let res = tokio::time::timeout(wait, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                    if value["type"] != "ping" {
                        return value;
                    }
                },
                Some(Ok(_)) => continue,
                other => panic!("Unexpected end of stream: {other:?}"),
            }
        }
    })
    .await;
    if let Ok(value) = res {
        panic!("Expected no reply, got {value}");
    }
}

/// Poll until `check` holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
