use std::hash::Hash;
use std::sync::Arc;

use crate::cow::CowMap;

#[derive(Debug, Clone, PartialEq)]
struct Slot<V> {
    value: Arc<V>,
    /// Number of owning relationships (parent links)
    refs: u32,
    /// Kept resident even with no owners
    pinned: bool,
}

/// Id-keyed storage with explicit reference counts.
///
/// Slots live in a sharded copy-on-write map, so cloning a whole cache
/// state is cheap and a write copies only the shard it touches.
#[derive(Debug, Clone)]
pub(crate) struct Arena<K, V> {
    slots: CowMap<K, Slot<V>>,
}

impl<K: Eq + Hash, V: PartialEq> PartialEq for Arena<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl<K, V> Default for Arena<K, V> {
    fn default() -> Self {
        Self {
            slots: CowMap::default(),
        }
    }
}

impl<K, V> Arena<K, V>
where
    K: Copy + Eq + Hash,
    V: Clone,
{
    pub(crate) fn get(&self, key: &K) -> Option<Arc<V>> {
        self.slots.get(key).map(|slot| Arc::clone(&slot.value))
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn refs(&self, key: &K) -> u32 {
        self.slots.get(key).map_or(0, |slot| slot.refs)
    }

    /// Insert or replace the value, keeping its reference count.
    /// Returns true when the key was not present.
    pub(crate) fn upsert(&mut self, key: K, value: V) -> bool {
        let value = Arc::new(value);
        match self.slots.get_mut(&key) {
            Some(slot) => {
                slot.value = value;
                false
            }
            None => {
                self.slots.insert(
                    key,
                    Slot {
                        value,
                        refs: 0,
                        pinned: false,
                    },
                );
                true
            }
        }
    }

    /// Rewrite a stored value in place
    pub(crate) fn modify(&mut self, key: &K, f: impl FnOnce(&mut V)) -> bool {
        match self.slots.get_mut(key) {
            Some(slot) => {
                f(Arc::make_mut(&mut slot.value));
                true
            }
            None => false,
        }
    }

    pub(crate) fn retain(&mut self, key: &K) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.refs += 1;
        }
    }

    /// Drop one owning reference. Returns true if the entry was evicted.
    pub(crate) fn release(&mut self, key: &K) -> bool {
        let Some(slot) = self.slots.get_mut(key) else {
            return false;
        };
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs == 0 && !slot.pinned {
            self.slots.remove(key);
            return true;
        }
        false
    }

    /// Remove only if nothing owns or pins the entry
    pub(crate) fn remove_unowned(&mut self, key: &K) -> bool {
        match self.slots.get(key) {
            Some(slot) if slot.refs == 0 && !slot.pinned => {
                self.slots.remove(key);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn set_pinned(&mut self, key: &K, pinned: bool) {
        let Some(slot) = self.slots.get_mut(key) else {
            return;
        };
        slot.pinned = pinned;
        if !pinned && slot.refs == 0 {
            self.slots.remove(key);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn pinned_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.pinned).count()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Arc<V>> {
        self.slots.values().map(|slot| &slot.value)
    }

    #[cfg(test)]
    pub(crate) fn shared_shards(&self, other: &Self) -> usize {
        self.slots.shared_shards(&other.slots)
    }
}
