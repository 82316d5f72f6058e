use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// Minimum spacing between two IDENTIFYs in the same concurrency slot
pub const IDENTIFY_DELAY: Duration = Duration::from_secs(5);

/// Paces IDENTIFY across shards.
///
/// The platform allows `max_concurrency` identifies per window; shard `n`
/// uses slot `n % max_concurrency`. Waiters on a slot are served in
/// arrival order.
#[derive(Debug)]
pub struct IdentifyQueue {
    delay: Duration,
    turns: Vec<tokio::sync::Mutex<()>>,
    last: Mutex<Vec<Option<Instant>>>,
}

impl IdentifyQueue {
    pub fn new(max_concurrency: u32, delay: Duration) -> Self {
        let slots = max_concurrency.max(1) as usize;
        Self {
            delay,
            turns: (0..slots).map(|_| tokio::sync::Mutex::new(())).collect(),
            last: Mutex::new(vec![None; slots]),
        }
    }

    pub fn max_concurrency(&self) -> u32 {
        self.turns.len() as u32
    }

    /// Wait until `shard_id` may IDENTIFY and claim the slot
    pub async fn wait_turn(&self, shard_id: u32) {
        let slot = shard_id as usize % self.turns.len();
        let _turn = self.turns[slot].lock().await;
        let previous = self.last.lock()[slot];
        if let Some(at) = previous {
            let ready = at + self.delay;
            if ready > Instant::now() {
                debug!(shard_id, slot, wait = ?(ready - Instant::now()), "waiting for identify slot");
                sleep_until(ready).await;
            }
        }
        self.last.lock()[slot] = Some(Instant::now());
    }

    /// Earliest IDENTIFY at or after `since`
    pub fn first_identify_since(&self, since: Instant) -> Option<Instant> {
        self.last
            .lock()
            .iter()
            .flatten()
            .filter(|at| **at >= since)
            .min()
            .copied()
    }
}
