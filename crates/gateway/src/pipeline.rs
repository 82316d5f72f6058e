//! Consumer pipelines: a list of pure checks that gate a handler.
//!
//! ```text
//! EventBus ──► receiver ──► orchestrator task ──► check 1 ──► check 2 ──► handler
//!                                                   │ Stop       │ Stop
//!                                                   ▼            ▼
//!                                                 skipped      skipped
//! ```

use concord_core::{EventKind, Id};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bus::Dispatch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop(String),
}

type CheckFn = dyn Fn(&Dispatch) -> Flow + Send + Sync;

/// Named predicate over a dispatch
#[derive(Clone)]
pub struct Check {
    name: String,
    run: Arc<CheckFn>,
}

impl Check {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&Dispatch) -> Flow + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Arc::new(run),
        }
    }

    /// Pass only the listed kinds
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        let kinds: Vec<EventKind> = kinds.into_iter().collect();
        Self::new("kinds", move |dispatch| {
            if kinds.contains(&dispatch.kind()) {
                Flow::Continue
            } else {
                Flow::Stop(format!("kind {} not handled", dispatch.kind()))
            }
        })
    }

    /// Pass only events belonging to `guild_id`
    pub fn guild(guild_id: Id) -> Self {
        Self::new("guild", move |dispatch| match dispatch.event.guild_id() {
            Some(id) if id == guild_id => Flow::Continue,
            Some(id) => Flow::Stop(format!("guild {id}")),
            None => Flow::Stop("no guild".to_string()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&self, dispatch: &Dispatch) -> Flow {
        (self.run)(dispatch)
    }
}

impl std::fmt::Debug for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Check").field(&self.name).finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    checks: Vec<Check>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Shorthand for `check(Check::new(name, run))`
    pub fn with(
        self,
        name: impl Into<String>,
        run: impl Fn(&Dispatch) -> Flow + Send + Sync + 'static,
    ) -> Self {
        self.check(Check::new(name, run))
    }

    /// Run checks in order; the first `Stop` wins and is prefixed with the
    /// name of the check that produced it.
    pub fn evaluate(&self, dispatch: &Dispatch) -> Flow {
        for check in &self.checks {
            if let Flow::Stop(reason) = check.run(dispatch) {
                return Flow::Stop(format!("{}: {reason}", check.name));
            }
        }
        Flow::Continue
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// What an orchestrator did before its receiver closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub handled: u64,
    pub stopped: u64,
    pub lagged: u64,
}

/// Spawn a task that runs `pipeline` on every dispatch from `receiver` and
/// awaits `handler` for those that pass. Dispatches are handled one at a
/// time in the order received. The task ends when the bus is dropped.
pub fn spawn_orchestrator<H, Fut>(
    name: impl Into<String>,
    mut receiver: broadcast::Receiver<Dispatch>,
    pipeline: Pipeline,
    mut handler: H,
) -> JoinHandle<ConsumerStats>
where
    H: FnMut(Dispatch) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let name = name.into();
    tokio::spawn(async move {
        let mut stats = ConsumerStats::default();
        loop {
            match receiver.recv().await {
                Ok(dispatch) => match pipeline.evaluate(&dispatch) {
                    Flow::Continue => {
                        handler(dispatch).await;
                        stats.handled += 1;
                    }
                    Flow::Stop(reason) => {
                        debug!(consumer = %name, seq = dispatch.sequence, %reason, "dispatch skipped");
                        stats.stopped += 1;
                    }
                },
                Err(RecvError::Lagged(missed)) => {
                    warn!(consumer = %name, missed, "consumer lagged behind the event bus");
                    stats.lagged += missed;
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(consumer = %name, ?stats, "consumer finished");
        stats
    })
}
