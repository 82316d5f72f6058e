use concord_cache::{Cache, CacheStats};
use concord_gateway::{
    Connector, DEFAULT_GATEWAY_URL, EventBus, ShardManager, ShardStats, TungsteniteConnector,
};
use concord_http::{HttpDispatcher, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{ClientConfig, ShardCount};
use crate::error::{ClientError, Result};

/// How many shards to run and how fast they may identify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    pub shard_count: u32,
    pub max_concurrency: u32,
    pub gateway_url: String,
}

#[derive(Debug, Clone)]
pub struct ClientStats {
    pub cache: CacheStats,
    pub shards: Vec<ShardStats>,
}

/// Composition root: one HTTP dispatcher, one cache and one event bus shared
/// by every shard this process runs.
pub struct Client {
    config: ClientConfig,
    http: HttpDispatcher,
    cache: Cache,
    bus: EventBus,
    connector: Arc<dyn Connector>,
    shards: Option<ShardManager>,
}

impl Client {
    /// Client over `reqwest` and real websockets
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = HttpDispatcher::with_reqwest(
            &config.http.api_url,
            &config.token,
            Duration::from_secs(config.http.timeout_secs),
            config.http_config(),
        )?;
        Ok(Self::assemble(config, http))
    }

    /// Client whose API calls go through `transport`
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let http = HttpDispatcher::new(transport, config.http_config());
        Ok(Self::assemble(config, http))
    }

    fn assemble(config: ClientConfig, http: HttpDispatcher) -> Self {
        let bus = EventBus::new(config.event_capacity);
        Self {
            config,
            http,
            cache: Cache::new(),
            bus,
            connector: Arc::new(TungsteniteConnector),
            shards: None,
        }
    }

    /// Replace the websocket connector used by shards started later
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Resolve the shard count, asking `GET /gateway/bot` when it is `auto`.
    ///
    /// The recommended gateway URL only replaces the configured one when the
    /// configuration still holds the default.
    pub async fn shard_plan(&self) -> Result<ShardPlan> {
        let sharding = &self.config.sharding;
        let configured_url = self.config.gateway.url.clone();

        if let ShardCount::Fixed(shard_count) = sharding.shard_count {
            return Ok(ShardPlan {
                shard_count,
                max_concurrency: sharding.max_concurrency.unwrap_or(1),
                gateway_url: configured_url,
            });
        }

        let info = self.http.gateway_info().await?;
        let limit = &info.session_start_limit;
        info!(
            recommended_shards = info.shards,
            max_concurrency = limit.max_concurrency,
            remaining = limit.remaining,
            "gateway info"
        );
        if limit.remaining == 0 {
            warn!(reset_after = ?limit.reset_after(), "session start limit exhausted, identifies will be rejected until reset");
        }

        let gateway_url = if configured_url == DEFAULT_GATEWAY_URL {
            info.url
        } else {
            configured_url
        };
        Ok(ShardPlan {
            shard_count: info.shards.max(1),
            max_concurrency: sharding
                .max_concurrency
                .unwrap_or(limit.max_concurrency)
                .max(1),
            gateway_url,
        })
    }

    /// Plan the shards and start them group by group
    pub async fn start(&mut self) -> Result<()> {
        if self.shards.is_some() {
            return Err(ClientError::AlreadyStarted);
        }

        let plan = self.shard_plan().await?;
        info!(
            shard_count = plan.shard_count,
            max_concurrency = plan.max_concurrency,
            url = %plan.gateway_url,
            "Starting client"
        );

        let gateway = self.config.gateway_config().with_url(plan.gateway_url);
        let mut manager = ShardManager::new(
            gateway,
            self.config
                .shard_manager_config(plan.shard_count, plan.max_concurrency),
            self.cache.clone(),
            self.bus.clone(),
        )
        .with_connector(Arc::clone(&self.connector));

        manager.start().await?;
        self.shards = Some(manager);
        Ok(())
    }

    /// Wait until every shard has stopped; returns the first failure
    pub async fn wait(&mut self) -> Result<()> {
        let shards = self.shards.as_mut().ok_or(ClientError::NotStarted)?;
        shards.wait().await?;
        Ok(())
    }

    /// Close every shard with a normal close. A no-op before `start`.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut shards) = self.shards.take() {
            shards.shutdown().await?;
        }
        info!("Client shutdown complete");
        Ok(())
    }

    pub fn http(&self) -> &HttpDispatcher {
        &self.http
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn shards(&self) -> Option<&ShardManager> {
        self.shards.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            cache: self.cache.stats(),
            shards: self.shards.as_ref().map(ShardManager::stats).unwrap_or_default(),
        }
    }
}
