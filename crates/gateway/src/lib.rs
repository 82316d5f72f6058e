//! Concord Gateway
//!
//! One persistent websocket per shard, each driven by its own task.
//!
//! ```text
//!                  ShardManager (groups of max_concurrency, 5 s apart)
//!                        │ spawn
//!        ┌───────────────┼───────────────┐
//!        ▼               ▼               ▼
//!   GatewayConnection  GatewayConnection  ...     one task per shard
//!        │ frame ─► inflate ─► decode ─► seq ─► Cache::apply ─► EventBus::publish
//!        │ heartbeat timer, command queue (mpsc), shutdown (watch)
//!        ▼
//!   EventBus ──► broadcast ──► Pipeline of Checks ──► handler
//! ```
//!
//! Sessions resume after resumable closes and re-identify after
//! session-discarding ones; fatal close codes end the shard and surface
//! through the manager.

pub mod error;
mod backoff;
mod bus;
mod command;
mod config;
mod identify;
mod inflater;
mod manager;
mod pipeline;
mod protocol;
mod session;
mod shard;
mod socket;

pub use backoff::{Backoff, BackoffConfig};
pub use bus::{Dispatch, EventBus};
pub use command::{ShardCommand, ShardStats};
pub use config::{DEFAULT_GATEWAY_URL, GatewayConfig};
pub use error::{GatewayError, Result};
pub use identify::{IDENTIFY_DELAY, IdentifyQueue};
pub use inflater::Inflater;
pub use manager::{ShardManager, ShardManagerConfig};
pub use pipeline::{Check, ConsumerStats, Flow, Pipeline, spawn_orchestrator};
pub use protocol::{
    Activity, CloseClass, ConnectionProperties, OpCode, Presence, RequestGuildMembers, Status,
    VoiceStateUpdate, classify_close, close_code, gateway_url,
};
pub use session::{ConnectionState, Session};
pub use shard::{GatewayConnection, ShardContext, ShardHandle};
pub use socket::{BoxSocket, Connector, Socket, TungsteniteConnector};
