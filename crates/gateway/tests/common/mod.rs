//! In-memory gateway server shared by the connection and manager tests.
//!
//! Every `connect` creates a `tokio::io::duplex` pair wrapped in websocket
//! framing on both ends; the server end is handed to the test, which then
//! plays the gateway's side of the protocol by hand.

#![allow(dead_code)]

use async_trait::async_trait;
use concord_cache::Cache;
use concord_core::Intents;
use concord_gateway::{
    BoxSocket, Connector, EventBus, GatewayConfig, GatewayConnection, GatewayError,
    IDENTIFY_DELAY, IdentifyQueue, ShardContext, ShardHandle,
};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};

pub const HEARTBEAT_MS: u64 = 41_250;

pub fn gateway_config() -> GatewayConfig {
    GatewayConfig::new("token", Intents::GUILDS | Intents::GUILD_MEMBERS)
        .with_url("wss://gateway.test")
}

pub fn user(id: u64) -> Value {
    json!({"id": id.to_string(), "username": format!("user{id}")})
}

pub fn ready(user_id: u64, session_id: &str, resume_url: Option<&str>) -> Value {
    json!({
        "v": 10,
        "user": user(user_id),
        "guilds": [{"id": "1", "unavailable": true}],
        "session_id": session_id,
        "resume_gateway_url": resume_url,
    })
}

pub fn guild_create(guild_id: u64, member_ids: &[u64]) -> Value {
    let members: Vec<Value> = member_ids
        .iter()
        .map(|id| json!({"user": user(*id), "roles": []}))
        .collect();
    json!({
        "id": guild_id.to_string(),
        "name": format!("guild{guild_id}"),
        "member_count": member_ids.len(),
        "channels": [{"id": (guild_id * 10).to_string(), "type": 0, "name": "general"}],
        "roles": [{"id": guild_id.to_string(), "name": "@everyone", "permissions": "0"}],
        "members": members,
    })
}

// ============================================================================
// Connector
// ============================================================================

pub struct TestConnector {
    servers: mpsc::UnboundedSender<Server>,
    pub urls: Mutex<Vec<String>>,
}

impl TestConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Server>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            servers,
            urls: Mutex::new(Vec::new()),
        });
        (connector, accepted)
    }
}

#[async_trait]
impl Connector for TestConnector {
    async fn connect(&self, url: &str) -> Result<BoxSocket, GatewayError> {
        let (client, server) = tokio::io::duplex(1 << 16);
        let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
        self.urls.lock().push(url.to_string());
        self.servers
            .send(Server {
                ws: server,
                url: url.to_string(),
            })
            .map_err(|_| GatewayError::Transport("test server gone".into()))?;
        Ok(Box::new(client))
    }
}

// ============================================================================
// Server side of one connection
// ============================================================================

pub struct Server {
    ws: WebSocketStream<DuplexStream>,
    pub url: String,
}

impl Server {
    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("client hung up");
    }

    pub async fn send_binary(&mut self, bytes: Vec<u8>) {
        self.ws
            .send(Message::Binary(bytes.into()))
            .await
            .expect("client hung up");
    }

    pub async fn hello(&mut self, interval_ms: u64) {
        self.send_json(json!({"op": 10, "d": {"heartbeat_interval": interval_ms}}))
            .await;
    }

    pub async fn dispatch(&mut self, seq: u64, name: &str, d: Value) {
        self.send_json(json!({"op": 0, "s": seq, "t": name, "d": d}))
            .await;
    }

    pub async fn heartbeat_ack(&mut self) {
        self.send_json(json!({"op": 11})).await;
    }

    /// Next JSON payload, or `Err(close code)` once the client closed
    pub async fn recv(&mut self) -> Result<Value, Option<u16>> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(text.as_str()).expect("client sent invalid JSON"));
                }
                Some(Ok(Message::Close(frame))) => return Err(frame.map(|f| u16::from(f.code))),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return Err(None),
            }
        }
    }

    /// Wait for a payload with `op`. Heartbeats are skipped unless asked for.
    pub async fn expect_op(&mut self, op: u64) -> Value {
        loop {
            match self.recv().await {
                Ok(payload) if payload["op"] == op => return payload,
                Ok(payload) if payload["op"] == 1 => continue,
                Ok(payload) => panic!("expected op {op}, got {payload}"),
                Err(code) => panic!("closed with {code:?} while waiting for op {op}"),
            }
        }
    }

    /// Skip payloads until the client closes; returns its close code
    pub async fn expect_close(&mut self) -> Option<u16> {
        loop {
            if let Err(code) = self.recv().await {
                return code;
            }
        }
    }

    pub async fn close(&mut self, code: u16) {
        let frame = CloseFrame {
            code: code.into(),
            reason: String::new().into(),
        };
        let _ = self.ws.close(Some(frame)).await;
    }

    /// Acknowledge heartbeats until the client goes away
    pub async fn serve_heartbeats(mut self) {
        while let Ok(payload) = self.recv().await {
            if payload["op"] == 1 && self.ws.send(Message::Text(json!({"op": 11}).to_string().into())).await.is_err() {
                break;
            }
        }
    }
}

/// Server half of a zlib-stream: one context, sync flush per message
pub struct Deflater(ZlibEncoder<Vec<u8>>);

impl Deflater {
    pub fn new() -> Self {
        Self(ZlibEncoder::new(Vec::new(), Compression::default()))
    }

    pub fn message(&mut self, value: &Value) -> Vec<u8> {
        self.0.write_all(value.to_string().as_bytes()).unwrap();
        self.0.flush().unwrap();
        std::mem::take(self.0.get_mut())
    }
}

// ============================================================================
// Single-shard harness
// ============================================================================

pub struct Harness {
    pub cache: Cache,
    pub bus: EventBus,
    pub connector: Arc<TestConnector>,
    pub identify: Arc<IdentifyQueue>,
    accepted: mpsc::UnboundedReceiver<Server>,
    shutdown: watch::Sender<bool>,
}

impl Harness {
    pub fn new() -> Self {
        let (connector, accepted) = TestConnector::new();
        let (shutdown, _) = watch::channel(false);
        Self {
            cache: Cache::new(),
            bus: EventBus::new(64),
            connector,
            identify: Arc::new(IdentifyQueue::new(1, IDENTIFY_DELAY)),
            accepted,
            shutdown,
        }
    }

    pub fn spawn_shard(
        &self,
        config: GatewayConfig,
        shard_id: u32,
        shard_count: u32,
    ) -> (ShardHandle, JoinHandle<Result<(), GatewayError>>) {
        let context = ShardContext {
            shard_id,
            shard_count,
            config: Arc::new(config),
            connector: self.connector.clone(),
            cache: self.cache.clone(),
            bus: self.bus.clone(),
            identify: Arc::clone(&self.identify),
        };
        GatewayConnection::spawn(context, self.shutdown.subscribe())
    }

    /// Server end of the next client connection
    pub async fn accept(&mut self) -> Server {
        self.accepted.recv().await.expect("connector dropped")
    }

    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
