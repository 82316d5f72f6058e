//! Concord Runner
//!
//! Wires the runtime together for one process:
//!
//! ```text
//!   ClientConfig (JSON + CONCORD_* env)
//!         │
//!         ▼
//!      Client ──► HttpDispatcher ──► GET /gateway/bot (shard_count = "auto")
//!         │
//!         ├──► ShardManager ──► GatewayConnection × N ──► Cache
//!         │                                           └─► EventBus ──► consumers
//!         └──► cache() / events() / http() for application code
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::{Client, ClientStats, ShardPlan};
pub use config::{
    BackoffSettings, ClientConfig, DEFAULT_API_URL, GatewaySettings, HttpSettings, ShardCount,
    ShardingSettings,
};
pub use error::{ClientError, ConfigError, Result};
