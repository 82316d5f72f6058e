use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::dispatcher::HttpDispatcher;
use crate::error::Result;
use crate::route::Route;

/// Response of `GET /gateway/bot`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets
    pub reset_after: u64,
    /// Shards that may IDENTIFY within the same 5 s window
    pub max_concurrency: u32,
}

impl SessionStartLimit {
    pub fn reset_after(&self) -> Duration {
        Duration::from_millis(self.reset_after)
    }
}

impl HttpDispatcher {
    /// Gateway URL, recommended shard count and identify concurrency
    pub async fn gateway_info(&self) -> Result<GatewayInfo> {
        self.get(Route::gateway_bot()).await
    }
}
