//! Client bootstrap against a scripted API and an in-memory gateway.

use async_trait::async_trait;
use concord_core::{Classified, ErrorClass, Id};
use concord_gateway::{BoxSocket, ConnectionState, Connector, GatewayError};
use concord_http::{HttpError, HttpResponse, Request, Transport};
use concord_runner::{Client, ClientConfig, ClientError, ShardCount, ShardPlan};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;

// ============================================================================
// Scripted API
// ============================================================================

struct GatewayBot {
    paths: Mutex<Vec<String>>,
}

impl GatewayBot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            paths: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transport for GatewayBot {
    async fn send(&self, request: &Request) -> Result<HttpResponse, HttpError> {
        self.paths.lock().push(request.route.path().to_string());
        let body = json!({
            "url": "wss://recommended.test",
            "shards": 3,
            "session_start_limit": {
                "total": 1000, "remaining": 999, "reset_after": 14_400_000, "max_concurrency": 2
            }
        });
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        })
    }
}

// ============================================================================
// In-memory gateway
// ============================================================================

/// Every connection gets HELLO, READY and one GUILD_CREATE for its shard
struct Gateway {
    urls: Mutex<Vec<String>>,
}

impl Gateway {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            urls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Connector for Gateway {
    async fn connect(&self, url: &str) -> Result<BoxSocket, GatewayError> {
        self.urls.lock().push(url.to_string());
        let (client, server) = tokio::io::duplex(1 << 16);
        let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
        tokio::spawn(serve(server));
        Ok(Box::new(client))
    }
}

async fn send(ws: &mut WebSocketStream<DuplexStream>, value: Value) {
    let _ = ws.send(Message::Text(value.to_string().into())).await;
}

async fn serve(mut ws: WebSocketStream<DuplexStream>) {
    send(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 41_250}})).await;
    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let payload: Value = serde_json::from_str(text.as_str()).unwrap();
        match payload["op"].as_u64() {
            Some(1) => send(&mut ws, json!({"op": 11})).await,
            Some(2) => {
                let shard = payload["d"]["shard"][0].as_u64().unwrap();
                let ready = json!({
                    "user": {"id": "42", "username": "concord", "bot": true},
                    "guilds": [],
                    "session_id": format!("session-{shard}"),
                });
                send(&mut ws, json!({"op": 0, "s": 1, "t": "READY", "d": ready})).await;
                let guild = json!({
                    "id": (shard + 10).to_string(),
                    "name": format!("guild-{shard}"),
                    "members": [{"user": {"id": "42", "username": "concord"}, "roles": []}],
                });
                send(&mut ws, json!({"op": 0, "s": 2, "t": "GUILD_CREATE", "d": guild})).await;
            }
            _ => {}
        }
    }
}

fn config(shard_count: ShardCount) -> ClientConfig {
    let mut config = ClientConfig::new("token");
    config.sharding.shard_count = shard_count;
    config
}

// ============================================================================
// Shard planning
// ============================================================================

#[tokio::test]
async fn test_fixed_plan_skips_gateway_bot() {
    let api = GatewayBot::new();
    let client = Client::with_transport(config(ShardCount::Fixed(2)), api.clone()).unwrap();

    let plan = client.shard_plan().await.unwrap();
    assert_eq!(
        plan,
        ShardPlan {
            shard_count: 2,
            max_concurrency: 1,
            gateway_url: "wss://gateway.discord.gg".to_string(),
        }
    );
    assert!(api.paths.lock().is_empty());
}

#[tokio::test]
async fn test_auto_plan_uses_gateway_bot() {
    let api = GatewayBot::new();
    let client = Client::with_transport(config(ShardCount::Auto), api.clone()).unwrap();

    let plan = client.shard_plan().await.unwrap();
    assert_eq!(plan.shard_count, 3);
    assert_eq!(plan.max_concurrency, 2);
    assert_eq!(plan.gateway_url, "wss://recommended.test");
    assert_eq!(*api.paths.lock(), vec!["/gateway/bot".to_string()]);
}

#[tokio::test]
async fn test_auto_plan_keeps_configured_overrides() {
    let mut config = config(ShardCount::Auto);
    config.gateway.url = "wss://proxy.test".to_string();
    config.sharding.max_concurrency = Some(1);
    let client = Client::with_transport(config, GatewayBot::new()).unwrap();

    let plan = client.shard_plan().await.unwrap();
    assert_eq!(plan.shard_count, 3);
    assert_eq!(plan.max_concurrency, 1);
    assert_eq!(plan.gateway_url, "wss://proxy.test");
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = Client::with_transport(ClientConfig::new(""), GatewayBot::new())
        .err()
        .unwrap();
    assert!(matches!(err, ClientError::Config(_)));
    assert_eq!(err.classification(), ErrorClass::Fatal);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_fills_cache_and_shuts_down() {
    let gateway = Gateway::new();
    let mut client = Client::with_transport(config(ShardCount::Auto), GatewayBot::new())
        .unwrap()
        .with_connector(gateway.clone());
    let mut events = client.events().subscribe();

    client.start().await.unwrap();

    // Three shards in two identify groups.
    let shards = client.shards().unwrap();
    assert_eq!(shards.shards().count(), 3);
    assert!(shards
        .shards()
        .all(|s| s.state() == ConnectionState::Connected));
    assert!(gateway
        .urls
        .lock()
        .iter()
        .all(|url| url.starts_with("wss://recommended.test/?v=10")));

    // READY + GUILD_CREATE per shard.
    for _ in 0..6 {
        events.recv().await.unwrap();
    }
    let cache = client.cache().snapshot();
    assert_eq!(cache.current_user().map(|u| u.id), Some(Id::new(42)));
    for guild in [10, 11, 12] {
        assert!(cache.guild(Id::new(guild)).is_some(), "guild {guild}");
    }
    assert!(cache.member(Id::new(11), Id::new(42)).is_some());

    let stats = client.stats();
    assert_eq!(stats.shards.len(), 3);
    assert_eq!(stats.cache.guilds, 3);
    assert_eq!(stats.cache.per_shard.len(), 3);

    assert!(matches!(client.start().await, Err(ClientError::AlreadyStarted)));
    client.shutdown().await.unwrap();
    assert!(client.shards().is_none());
}

#[tokio::test]
async fn test_wait_before_start() {
    let mut client = Client::with_transport(config(ShardCount::Fixed(1)), GatewayBot::new()).unwrap();
    assert!(matches!(client.wait().await, Err(ClientError::NotStarted)));
    client.shutdown().await.unwrap();
}
