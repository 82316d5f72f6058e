use concord_core::Sequence;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::protocol::{OpCode, Presence, RequestGuildMembers, VoiceStateUpdate};
use crate::session::ConnectionState;

/// Commands that can be sent to a shard's connection task
#[derive(Debug)]
pub enum ShardCommand {
    /// Opcode 3
    UpdatePresence(Presence),
    /// Opcode 4
    UpdateVoiceState(VoiceStateUpdate),
    /// Opcode 8; answered by GUILD_MEMBERS_CHUNK dispatches
    RequestGuildMembers(RequestGuildMembers),
    /// Arbitrary outbound payload, paced like the typed commands
    Send { op: OpCode, d: Value },
    /// Close with a resumable code and RESUME on a new socket
    Reconnect,
}

impl ShardCommand {
    pub fn op(&self) -> Option<OpCode> {
        match self {
            Self::UpdatePresence(_) => Some(OpCode::PresenceUpdate),
            Self::UpdateVoiceState(_) => Some(OpCode::VoiceStateUpdate),
            Self::RequestGuildMembers(_) => Some(OpCode::RequestGuildMembers),
            Self::Send { op, .. } => Some(*op),
            Self::Reconnect => None,
        }
    }
}

/// Statistics for a shard
#[derive(Debug, Clone, PartialEq)]
pub struct ShardStats {
    pub shard_id: u32,
    pub state: ConnectionState,
    pub sequence: Option<Sequence>,
    /// Last heartbeat round-trip
    pub latency: Option<Duration>,
    pub dispatches: u64,
    pub reconnects: u64,
    pub commands_sent: u64,
    pub commands_in_queue: usize,
}

/// Counters written by the connection task and read through handles
#[derive(Debug, Default)]
pub(crate) struct ShardMetrics {
    dispatches: AtomicU64,
    reconnects: AtomicU64,
    commands_sent: AtomicU64,
    /// 0 until the first dispatch
    sequence: AtomicU64,
    /// Microseconds, 0 until the first ACK
    latency_us: AtomicU64,
}

impl ShardMetrics {
    pub(crate) fn record_dispatch(&self, sequence: Sequence) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
        self.sequence.store(sequence, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_command(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_latency(&self, latency: Duration) {
        let micros = latency.as_micros().clamp(1, u64::MAX as u128) as u64;
        self.latency_us.store(micros, Ordering::Relaxed);
    }

    pub(crate) fn reset_sequence(&self) {
        self.sequence.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        shard_id: u32,
        state: ConnectionState,
        commands_in_queue: usize,
    ) -> ShardStats {
        let sequence = self.sequence.load(Ordering::Relaxed);
        let latency = self.latency_us.load(Ordering::Relaxed);
        ShardStats {
            shard_id,
            state,
            sequence: (sequence > 0).then_some(sequence),
            latency: (latency > 0).then(|| Duration::from_micros(latency)),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_in_queue,
        }
    }
}
