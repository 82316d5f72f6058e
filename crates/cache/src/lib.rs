//! Concord Cache
//!
//! In-memory mirror of server state, kept consistent with the dispatch
//! stream.
//!
//! Architecture:
//! - `ArcSwap`: lock-free reads of the current immutable [`CacheState`]
//! - single writer: each write clones the state, modifies the copy and
//!   swaps it in. Stores are sharded maps of `Arc` shards, so the clone and
//!   the write copy only the shards an event touches
//!
//! ```text
//! Reader 1 ──► snapshot() ──► Arc<CacheState> ──► read (never blocked)
//! Reader 2 ──► snapshot() ──► Arc<CacheState> ──► read (never blocked)
//! Shard    ──► apply(event) ──► lock writer ──► clone + modify + store()
//! ```

mod arena;
mod cow;
mod entity;
mod state;

pub use entity::{CachedEntity, CachedMember, Entity, EntityKey};
pub use state::CacheState;

use arc_swap::ArcSwap;
use concord_core::{Event, Id};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Entry counts and write statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub guilds: usize,
    pub channels: usize,
    pub roles: usize,
    pub users: usize,
    pub members: usize,
    pub pinned: usize,
    pub events_applied: u64,
    /// Events applied per shard
    pub per_shard: BTreeMap<u32, u64>,
}

#[derive(Default)]
struct WriteLog {
    events_applied: u64,
    per_shard: BTreeMap<u32, u64>,
}

struct Inner {
    current: ArcSwap<CacheState>,
    /// Serializes writers across the whole cache
    writer: Mutex<WriteLog>,
}

/// Shared handle to the cache. Cloning is cheap.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

impl Cache {
    pub fn new() -> Self {
        Cache {
            inner: Arc::new(Inner {
                current: ArcSwap::from_pointee(CacheState::default()),
                writer: Mutex::new(WriteLog::default()),
            }),
        }
    }

    /// Current immutable state. Later writes never affect it.
    pub fn snapshot(&self) -> Arc<CacheState> {
        self.inner.current.load_full()
    }

    fn write<R>(&self, f: impl FnOnce(&mut CacheState, &mut WriteLog) -> R) -> R {
        let mut log = self.inner.writer.lock();
        let mut next = CacheState::clone(&self.inner.current.load());
        let result = f(&mut next, &mut log);
        self.inner.current.store(Arc::new(next));
        result
    }

    /// Apply one decoded dispatch from `shard_id` as a single atomic write.
    /// Returns whether the cache changed.
    pub fn apply(&self, shard_id: u32, event: &Event) -> bool {
        self.write(|state, log| {
            log.events_applied += 1;
            *log.per_shard.entry(shard_id).or_default() += 1;
            let changed = state.apply_event(event);
            trace!(shard_id, event = event.name(), changed, "cache apply");
            changed
        })
    }

    pub fn upsert(&self, entity: Entity) {
        self.write(|state, _| match entity {
            Entity::Guild(guild) => state.upsert_guild(guild),
            Entity::Channel(channel) => state.upsert_channel(channel),
            Entity::Role { guild_id, role } => state.upsert_role(guild_id, role),
            Entity::User(user) => state.upsert_user(user),
            Entity::Member { guild_id, member } => state.upsert_member(guild_id, &member),
        });
    }

    /// Remove an entity and unlink what it owns.
    ///
    /// Users are shared by their memberships and are only removed when no
    /// membership references them and they are not pinned.
    pub fn remove(&self, key: EntityKey) -> bool {
        self.write(|state, _| match key {
            EntityKey::Guild(id) => state.remove_guild(id),
            EntityKey::Channel(id) => state.remove_channel(id),
            EntityKey::Role(id) => state.remove_role(id),
            EntityKey::User(id) => state.remove_user(id),
            EntityKey::Member { guild_id, user_id } => state.remove_member(guild_id, user_id),
        })
    }

    pub fn get(&self, key: EntityKey) -> Option<CachedEntity> {
        self.snapshot().get(key)
    }

    pub fn children_of(&self, parent: Id) -> Vec<EntityKey> {
        self.snapshot().children_of(parent)
    }

    /// Keep the client's own user resident regardless of memberships
    pub fn set_current_user(&self, user: concord_core::User) {
        self.write(|state, _| state.set_current_user(user));
    }

    pub fn stats(&self) -> CacheStats {
        let log = self.inner.writer.lock();
        let [guilds, channels, roles, users, members, pinned] = self.snapshot().counts();
        CacheStats {
            guilds,
            channels,
            roles,
            users,
            members,
            pinned,
            events_applied: log.events_applied,
            per_shard: log.per_shard.clone(),
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [guilds, channels, roles, users, members, _] = self.snapshot().counts();
        f.debug_struct("Cache")
            .field("guilds", &guilds)
            .field("channels", &channels)
            .field("roles", &roles)
            .field("users", &users)
            .field("members", &members)
            .finish()
    }
}
