use concord_cache::Cache;
use concord_core::Id;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::command::ShardStats;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::identify::{IDENTIFY_DELAY, IdentifyQueue};
use crate::shard::{GatewayConnection, ShardContext, ShardHandle};
use crate::socket::{Connector, TungsteniteConnector};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the shard manager
#[derive(Debug, Clone)]
pub struct ShardManagerConfig {
    /// Total shards across every process
    pub shard_count: u32,
    /// Shards run by this process; all of `0..shard_count` when empty
    pub shard_ids: Vec<u32>,
    /// Shards allowed to IDENTIFY at once
    pub max_concurrency: u32,
    /// Minimum time between IDENTIFYs in one concurrency slot
    pub identify_delay: Duration,
    /// How long a group may take to reach `Connected` before the next starts
    pub startup_timeout: Duration,
}

impl Default for ShardManagerConfig {
    fn default() -> Self {
        Self {
            shard_count: 1,
            shard_ids: Vec::new(),
            max_concurrency: 1,
            identify_delay: IDENTIFY_DELAY,
            startup_timeout: Duration::from_secs(60),
        }
    }
}

impl ShardManagerConfig {
    pub fn with_shard_count(mut self, n: u32) -> Self {
        self.shard_count = n;
        self
    }

    pub fn with_shard_ids(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.shard_ids = ids.into_iter().collect();
        self
    }

    pub fn with_max_concurrency(mut self, k: u32) -> Self {
        self.max_concurrency = k;
        self
    }

    pub fn with_identify_delay(mut self, delay: Duration) -> Self {
        self.identify_delay = delay;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn shard_ids(&self) -> Vec<u32> {
        if self.shard_ids.is_empty() {
            (0..self.shard_count).collect()
        } else {
            self.shard_ids.clone()
        }
    }
}

// ============================================================================
// Shard Manager
// ============================================================================

type Joined = std::result::Result<Result<()>, tokio::task::JoinError>;

/// Starts shards in identify-concurrency groups and owns their tasks
pub struct ShardManager {
    config: ShardManagerConfig,
    gateway: Arc<GatewayConfig>,
    connector: Arc<dyn Connector>,
    cache: Cache,
    bus: EventBus,
    identify: Arc<IdentifyQueue>,
    shutdown: watch::Sender<bool>,
    shards: BTreeMap<u32, ShardHandle>,
    tasks: BTreeMap<u32, JoinHandle<Result<()>>>,
}

impl ShardManager {
    pub fn new(
        gateway: GatewayConfig,
        config: ShardManagerConfig,
        cache: Cache,
        bus: EventBus,
    ) -> Self {
        let identify = Arc::new(IdentifyQueue::new(
            config.max_concurrency,
            config.identify_delay,
        ));
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            gateway: Arc::new(gateway),
            connector: Arc::new(TungsteniteConnector),
            cache,
            bus,
            identify,
            shutdown,
            shards: BTreeMap::new(),
            tasks: BTreeMap::new(),
        }
    }

    /// Replace the websocket connector
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Start every shard, `max_concurrency` at a time.
    ///
    /// Each group waits for its shards to connect (or for the startup
    /// timeout), and the next group starts no earlier than the identify
    /// delay after the group's first IDENTIFY. A fatal failure of any shard
    /// started so far stops every shard and is returned; later groups never
    /// start.
    pub async fn start(&mut self) -> Result<()> {
        let ids = self.config.shard_ids();
        let group_size = self.identify.max_concurrency() as usize;
        let mut previous_identify: Option<Instant> = None;

        for (group, shard_ids) in ids.chunks(group_size).enumerate() {
            if let Some(first) = previous_identify {
                let ready = first + self.config.identify_delay;
                if ready > Instant::now() {
                    debug!(group, wait = ?(ready - Instant::now()), "waiting for next identify window");
                    let exited = tokio::select! {
                        biased;
                        exited = next_exit(&mut self.tasks) => Some(exited),
                        _ = sleep_until(ready) => None,
                    };
                    if let Some((shard_id, joined)) = exited {
                        return self.abort_startup(shard_id, joined).await;
                    }
                }
            }

            let started = Instant::now();
            info!(group, shards = ?shard_ids, "Starting shard group");
            for &shard_id in shard_ids {
                self.spawn_shard(shard_id);
            }

            let deadline = started + self.config.startup_timeout;
            if let Some((shard_id, joined)) = self.await_group(shard_ids, deadline).await {
                return self.abort_startup(shard_id, joined).await;
            }

            previous_identify = self.identify.first_identify_since(started).or(Some(started));
        }

        info!(shards = ids.len(), "All shards started");
        Ok(())
    }

    fn spawn_shard(&mut self, shard_id: u32) {
        let context = ShardContext {
            shard_id,
            shard_count: self.config.shard_count,
            config: Arc::clone(&self.gateway),
            connector: Arc::clone(&self.connector),
            cache: self.cache.clone(),
            bus: self.bus.clone(),
            identify: Arc::clone(&self.identify),
        };
        let (handle, task) = GatewayConnection::spawn(context, self.shutdown.subscribe());
        self.shards.insert(shard_id, handle);
        self.tasks.insert(shard_id, task);
    }

    /// Wait for a group to connect or for its deadline. Returns the first
    /// shard task to end meanwhile, from this group or an earlier one.
    async fn await_group(&mut self, shard_ids: &[u32], deadline: Instant) -> Option<(u32, Joined)> {
        let mut states: Vec<_> = shard_ids
            .iter()
            .filter_map(|id| self.shards.get(id).map(|h| (*id, h.watch_state())))
            .collect();

        let connected = async {
            for (shard_id, state) in states.iter_mut() {
                if state.wait_for(|s| s.is_connected()).await.is_err() {
                    // State sender gone: the task is finishing and will be
                    // reported as an exit.
                    std::future::pending::<()>().await;
                }
                debug!(shard_id = *shard_id, "shard connected");
            }
        };

        tokio::select! {
            biased;
            exited = next_exit(&mut self.tasks) => return Some(exited),
            _ = connected => {}
            _ = sleep_until(deadline) => {
                for &shard_id in shard_ids {
                    if let Some(handle) = self.shards.get(&shard_id)
                        && !handle.state().is_connected()
                    {
                        warn!(shard_id, "shard not connected within the startup timeout, continuing");
                    }
                }
            }
        }
        None
    }

    async fn abort_startup(&mut self, shard_id: u32, joined: Joined) -> Result<()> {
        let err = match joined {
            Ok(Ok(())) => GatewayError::Shutdown(shard_id),
            Ok(Err(e)) => e,
            Err(e) => GatewayError::TaskFailed(e.to_string()),
        };
        error!(shard_id, error = %err, "shard failed during startup, aborting");
        if let Err(e) = self.shutdown().await {
            debug!(error = %e, "error while stopping remaining shards");
        }
        Err(err)
    }

    /// Wait until every shard task has ended. Returns the first failure.
    ///
    /// Cancel-safe: dropping the future leaves the shards running.
    pub async fn wait(&mut self) -> Result<()> {
        while !self.tasks.is_empty() {
            let (shard_id, joined) = next_exit(&mut self.tasks).await;
            match joined {
                Ok(Ok(())) => debug!(shard_id, "shard task finished"),
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(GatewayError::TaskFailed(e.to_string())),
            }
        }
        Ok(())
    }

    /// Signal every shard to close with 1000 and wait for them
    pub async fn shutdown(&mut self) -> Result<()> {
        self.shutdown.send_replace(true);
        let mut first_error = None;
        for (shard_id, task) in std::mem::take(&mut self.tasks) {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(GatewayError::TaskFailed(e.to_string())),
            };
            if let Err(e) = result {
                debug!(shard_id, error = %e, "shard ended with error");
                first_error.get_or_insert(e);
            }
        }
        info!("Shard manager shutdown complete");
        first_error.map_or(Ok(()), Err)
    }

    pub fn shard(&self, shard_id: u32) -> Option<&ShardHandle> {
        self.shards.get(&shard_id)
    }

    pub fn shards(&self) -> impl Iterator<Item = &ShardHandle> {
        self.shards.values()
    }

    /// Shard that receives events for `guild_id`
    pub fn shard_for_guild(&self, guild_id: Id) -> Option<&ShardHandle> {
        let shard_count = u64::from(self.config.shard_count.max(1));
        let shard_id = (guild_id.get() >> 22) % shard_count;
        self.shards.get(&(shard_id as u32))
    }

    pub fn stats(&self) -> Vec<ShardStats> {
        self.shards.values().map(ShardHandle::stats).collect()
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &ShardManagerConfig {
        &self.config
    }
}

impl Drop for ShardManager {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// First shard task to end, removed from `tasks`. Pends forever when no
/// task is running.
async fn next_exit(tasks: &mut BTreeMap<u32, JoinHandle<Result<()>>>) -> (u32, Joined) {
    if tasks.is_empty() {
        return std::future::pending().await;
    }
    let (shard_id, joined) = {
        let pending = tasks
            .iter_mut()
            .map(|(id, task)| Box::pin(async move { (*id, task.await) }));
        futures_util::future::select_all(pending).await.0
    };
    tasks.remove(&shard_id);
    (shard_id, joined)
}
