use concord_core::{Event, EventKind, Sequence};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// One decoded dispatch, as seen by consumers
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub shard_id: u32,
    pub sequence: Sequence,
    pub event: Arc<Event>,
}

impl Dispatch {
    pub fn new(shard_id: u32, sequence: Sequence, event: Event) -> Self {
        Self {
            shard_id,
            sequence,
            event: Arc::new(event),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

/// Broadcast-based event bus
///
/// Uses tokio broadcast channels to fan dispatches out to any number of
/// subscribers. Supports both global subscriptions and per-kind
/// subscriptions. Publishing never waits: slow subscribers lag and are told
/// how many dispatches they missed.
#[derive(Clone)]
pub struct EventBus {
    /// Global broadcast channel for all dispatches
    global_tx: broadcast::Sender<Dispatch>,
    /// Per-kind broadcast channels, created on first subscription
    kind_channels: Arc<DashMap<EventKind, broadcast::Sender<Dispatch>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (global_tx, _) = broadcast::channel(capacity);

        EventBus {
            global_tx,
            kind_channels: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Subscribe to every dispatch
    pub fn subscribe(&self) -> broadcast::Receiver<Dispatch> {
        self.global_tx.subscribe()
    }

    /// Subscribe to dispatches of one kind
    pub fn subscribe_kind(&self, kind: EventKind) -> broadcast::Receiver<Dispatch> {
        self.kind_channels
            .entry(kind)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish to the global channel and to the dispatch's kind channel.
    /// Returns how many receivers were handed the dispatch.
    pub fn publish(&self, dispatch: Dispatch) -> usize {
        let mut delivered = 0;
        if let Some(tx) = self.kind_channels.get(&dispatch.kind()) {
            delivered += tx.send(dispatch.clone()).unwrap_or(0);
        }
        // Ignore send errors (no subscribers)
        delivered + self.global_tx.send(dispatch).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.global_tx.receiver_count()
            + self
                .kind_channels
                .iter()
                .map(|entry| entry.value().receiver_count())
                .sum::<usize>()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
