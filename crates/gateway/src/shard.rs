use concord_cache::Cache;
use concord_core::{Classified, ErrorClass, Event, Sequence};
use concord_ratelimit::Throttle;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep, sleep_until};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, error, info, trace, warn};

use crate::backoff::Backoff;
use crate::bus::{Dispatch, EventBus};
use crate::command::{ShardCommand, ShardMetrics, ShardStats};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::identify::IdentifyQueue;
use crate::inflater::Inflater;
use crate::protocol::{
    CloseClass, Hello, Identify, OpCode, Presence, RawPayload, RequestGuildMembers, Resume,
    VoiceStateUpdate, classify_close, close_code, encode, gateway_url,
};
use crate::session::{ConnectionState, ReadySession, Session};
use crate::socket::{BoxSocket, Connector};

/// Everything a shard needs from the process, handed over at spawn
#[derive(Clone)]
pub struct ShardContext {
    pub shard_id: u32,
    pub shard_count: u32,
    pub config: Arc<GatewayConfig>,
    pub connector: Arc<dyn Connector>,
    pub cache: Cache,
    pub bus: EventBus,
    pub identify: Arc<IdentifyQueue>,
}

/// Handle to communicate with a shard
#[derive(Clone)]
pub struct ShardHandle {
    shard_id: u32,
    sender: mpsc::Sender<ShardCommand>,
    state: watch::Receiver<ConnectionState>,
    metrics: Arc<ShardMetrics>,
}

impl ShardHandle {
    pub fn id(&self) -> u32 {
        self.shard_id
    }

    /// Queue a command; it is sent once the shard is connected
    pub async fn send(&self, command: ShardCommand) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| GatewayError::Shutdown(self.shard_id))
    }

    pub async fn update_presence(&self, presence: Presence) -> Result<()> {
        self.send(ShardCommand::UpdatePresence(presence)).await
    }

    pub async fn update_voice_state(&self, update: VoiceStateUpdate) -> Result<()> {
        self.send(ShardCommand::UpdateVoiceState(update)).await
    }

    pub async fn request_guild_members(&self, request: RequestGuildMembers) -> Result<()> {
        self.send(ShardCommand::RequestGuildMembers(request)).await
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.send(ShardCommand::Reconnect).await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait for `Connected`. False on timeout or if the shard stopped.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut state = self.state.clone();
        let connected = tokio::time::timeout(timeout, state.wait_for(|s| s.is_connected())).await;
        matches!(connected, Ok(Ok(_)))
    }

    pub fn stats(&self) -> ShardStats {
        let queued = self.sender.max_capacity() - self.sender.capacity();
        self.metrics.snapshot(self.shard_id, self.state(), queued)
    }

    /// Check if the shard task is still running
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }
}

impl std::fmt::Debug for ShardHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardHandle")
            .field("shard_id", &self.shard_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Why a socket ended
#[derive(Debug)]
enum Outcome {
    Shutdown,
    Reconnect {
        resumable: bool,
        /// Overrides the backoff delay
        wait: Option<Duration>,
        reason: String,
    },
    Fatal(GatewayError),
}

impl Outcome {
    fn reconnect(resumable: bool, reason: impl Into<String>) -> Self {
        Self::Reconnect {
            resumable,
            wait: None,
            reason: reason.into(),
        }
    }
}

struct Heartbeat {
    interval: Interval,
    awaiting_ack: bool,
    sent_at: Option<Instant>,
}

/// State of one socket, from open to close
struct Link {
    heartbeat: Option<Heartbeat>,
    /// Identify slot being waited for; the socket keeps being served meanwhile
    identify_turn: Option<BoxFuture<'static, ()>>,
    ready: bool,
    deadline: Instant,
}

enum Step {
    Shutdown,
    HandshakeTimeout,
    Heartbeat,
    IdentifyTurn,
    Frame(Option<std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>),
    Command(ShardCommand),
}

/// One shard's gateway connection: a task owning the socket, the session
/// and the heartbeat timer.
pub struct GatewayConnection {
    shard_id: u32,
    shard_count: u32,
    config: Arc<GatewayConfig>,
    connector: Arc<dyn Connector>,
    cache: Cache,
    bus: EventBus,
    identify: Arc<IdentifyQueue>,
    commands: mpsc::Receiver<ShardCommand>,
    shutdown: watch::Receiver<bool>,
    state: watch::Sender<ConnectionState>,
    metrics: Arc<ShardMetrics>,
    session: Option<Session>,
    backoff: Backoff,
    inflater: Inflater,
    send_limiter: Throttle,
}

impl GatewayConnection {
    /// Start the connection task and return its handle
    pub fn spawn(
        context: ShardContext,
        shutdown: watch::Receiver<bool>,
    ) -> (ShardHandle, JoinHandle<Result<()>>) {
        let (sender, commands) = mpsc::channel(context.config.command_buffer_size.max(1));
        let (state, state_rx) = watch::channel(ConnectionState::Disconnected);
        let metrics = Arc::new(ShardMetrics::default());

        let handle = ShardHandle {
            shard_id: context.shard_id,
            sender,
            state: state_rx,
            metrics: Arc::clone(&metrics),
        };

        let connection = GatewayConnection {
            shard_id: context.shard_id,
            shard_count: context.shard_count,
            backoff: Backoff::new(context.config.backoff),
            send_limiter: Throttle::new(
                context.config.command_limit.max(1),
                context.config.command_window,
            ),
            config: context.config,
            connector: context.connector,
            cache: context.cache,
            bus: context.bus,
            identify: context.identify,
            commands,
            shutdown,
            state,
            metrics,
            session: None,
            inflater: Inflater::new(),
        };

        (handle, tokio::spawn(connection.run()))
    }

    /// Connect, and keep reconnecting until shutdown or a fatal close
    async fn run(mut self) -> Result<()> {
        info!(shard_id = self.shard_id, shard_count = self.shard_count, "Shard started");
        let mut delay: Option<Duration> = None;

        loop {
            if let Some(wait) = delay.take()
                && !wait.is_zero()
            {
                debug!(shard_id = self.shard_id, ?wait, "waiting before reconnect");
                tokio::select! {
                    _ = shutdown_signal(&mut self.shutdown) => {}
                    _ = sleep(wait) => {}
                }
            }
            if *self.shutdown.borrow() {
                self.set_state(ConnectionState::Disconnected);
                info!(shard_id = self.shard_id, "Shard shutdown complete");
                return Ok(());
            }

            match self.connect_once().await {
                Outcome::Shutdown => {
                    self.set_state(ConnectionState::Disconnected);
                    info!(shard_id = self.shard_id, "Shard shutdown complete");
                    return Ok(());
                }
                Outcome::Fatal(err) => {
                    self.set_state(ConnectionState::Disconnected);
                    error!(shard_id = self.shard_id, error = %err, "Shard stopped");
                    return Err(err);
                }
                Outcome::Reconnect {
                    resumable,
                    wait,
                    reason,
                } => {
                    if !resumable {
                        self.discard_session();
                    }
                    let resumable = self.session.as_ref().is_some_and(Session::can_resume);
                    self.set_state(ConnectionState::Reconnecting { resumable });
                    self.metrics.record_reconnect();
                    self.backoff.disconnected();
                    let wait = wait.unwrap_or_else(|| self.backoff.next_delay());
                    warn!(
                        shard_id = self.shard_id,
                        resumable,
                        attempt = self.backoff.attempts(),
                        ?wait,
                        %reason,
                        "gateway connection lost"
                    );
                    delay = Some(wait);
                }
            }
        }
    }

    fn connect_url(&self) -> Result<String> {
        let resume_url = self
            .session
            .as_ref()
            .filter(|s| s.can_resume())
            .and_then(|s| s.resume_url.as_deref());
        if let Some(url) = resume_url {
            match gateway_url(url, self.config.compress) {
                Ok(url) => return Ok(url),
                Err(e) => warn!(shard_id = self.shard_id, error = %e, "ignoring resume url"),
            }
        }
        gateway_url(&self.config.url, self.config.compress)
    }

    /// Run one socket from open to close
    async fn connect_once(&mut self) -> Outcome {
        let url = match self.connect_url() {
            Ok(url) => url,
            Err(e) => return Outcome::Fatal(e),
        };

        self.set_state(ConnectionState::Connecting);
        self.inflater.reset();

        let mut socket = tokio::select! {
            _ = shutdown_signal(&mut self.shutdown) => return Outcome::Shutdown,
            connected = self.connector.connect(&url) => match connected {
                Ok(socket) => socket,
                Err(e) => return Outcome::reconnect(true, e.to_string()),
            },
        };
        debug!(shard_id = self.shard_id, %url, "socket open");
        self.set_state(ConnectionState::AwaitingHello);

        let mut link = Link {
            heartbeat: None,
            identify_turn: None,
            ready: false,
            deadline: Instant::now() + self.config.handshake_timeout,
        };

        loop {
            let step = tokio::select! {
                _ = shutdown_signal(&mut self.shutdown) => Step::Shutdown,
                _ = sleep_until(link.deadline), if !link.ready && link.identify_turn.is_none() => {
                    Step::HandshakeTimeout
                }
                _ = next_tick(&mut link.heartbeat) => Step::Heartbeat,
                _ = next_turn(&mut link.identify_turn) => Step::IdentifyTurn,
                frame = socket.next() => Step::Frame(frame),
                Some(command) = self.commands.recv(), if link.ready => Step::Command(command),
            };

            let outcome = match step {
                Step::Shutdown => {
                    close_socket(&mut socket, close_code::NORMAL).await;
                    Some(Outcome::Shutdown)
                }
                Step::HandshakeTimeout => {
                    let err = GatewayError::HandshakeTimeout(self.config.handshake_timeout);
                    close_socket(&mut socket, close_code::UNKNOWN_ERROR).await;
                    Some(Outcome::reconnect(true, err.to_string()))
                }
                Step::Heartbeat => self.on_heartbeat_tick(&mut socket, &mut link).await,
                Step::IdentifyTurn => {
                    link.identify_turn = None;
                    link.deadline = Instant::now() + self.config.handshake_timeout;
                    info!(shard_id = self.shard_id, shard_count = self.shard_count, "identifying");
                    self.send_payload(&mut socket, OpCode::Identify, &self.identify_payload())
                        .await
                        .err()
                        .map(|e| Outcome::reconnect(true, e.to_string()))
                }
                Step::Frame(None) => Some(Outcome::reconnect(true, "stream ended without close")),
                Step::Frame(Some(Err(e))) => Some(Outcome::reconnect(true, e.to_string())),
                Step::Frame(Some(Ok(message))) => {
                    self.on_message(&mut socket, &mut link, message).await
                }
                Step::Command(command) => self.on_command(&mut socket, command).await,
            };

            if let Some(outcome) = outcome {
                return outcome;
            }
        }
    }

    async fn on_heartbeat_tick(&self, socket: &mut BoxSocket, link: &mut Link) -> Option<Outcome> {
        let heartbeat = link.heartbeat.as_mut()?;
        if heartbeat.awaiting_ack {
            warn!(shard_id = self.shard_id, "no heartbeat ACK since the last beat, connection is zombied");
            close_socket(socket, close_code::UNKNOWN_ERROR).await;
            return Some(Outcome::reconnect(true, "zombied connection"));
        }
        self.send_heartbeat(socket, heartbeat)
            .await
            .err()
            .map(|e| Outcome::reconnect(true, e.to_string()))
    }

    async fn on_message(
        &mut self,
        socket: &mut BoxSocket,
        link: &mut Link,
        message: Message,
    ) -> Option<Outcome> {
        match message {
            Message::Text(text) => self.on_payload(socket, link, text.as_bytes()).await,
            Message::Binary(bytes) if self.config.compress => match self.inflater.push(&bytes) {
                Ok(Some(inflated)) => self.on_payload(socket, link, &inflated).await,
                Ok(None) => None,
                Err(e) => {
                    warn!(shard_id = self.shard_id, error = %e, "dropping corrupt compressed stream");
                    close_socket(socket, close_code::UNKNOWN_ERROR).await;
                    Some(Outcome::reconnect(true, e.to_string()))
                }
            },
            Message::Binary(bytes) => self.on_payload(socket, link, &bytes).await,
            Message::Close(frame) => {
                let code = frame.as_ref().map(|f| u16::from(f.code));
                let reason = frame.map(|f| f.reason.as_str().to_owned()).unwrap_or_default();
                Some(self.on_close(code, reason))
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
        }
    }

    fn on_close(&self, code: Option<u16>, reason: String) -> Outcome {
        match classify_close(code) {
            CloseClass::Fatal => {
                let code = code.unwrap_or_default();
                error!(shard_id = self.shard_id, close_code = code, %reason, "fatal gateway close");
                Outcome::Fatal(GatewayError::FatalClose { code, reason })
            }
            class => {
                let resumable = class == CloseClass::Resumable;
                let err = GatewayError::Closed { code, reason };
                warn!(
                    shard_id = self.shard_id,
                    close_code = ?code,
                    class = %err.classification(),
                    "gateway closed by server"
                );
                Outcome::reconnect(resumable, err.to_string())
            }
        }
    }

    async fn on_payload(
        &mut self,
        socket: &mut BoxSocket,
        link: &mut Link,
        bytes: &[u8],
    ) -> Option<Outcome> {
        let payload: RawPayload = match serde_json::from_slice(bytes) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(shard_id = self.shard_id, error = %e, "undecodable gateway payload");
                return None;
            }
        };

        match OpCode::from_u8(payload.op) {
            Some(OpCode::Dispatch) => {
                self.on_dispatch(link, payload);
                None
            }
            Some(OpCode::Hello) => self.on_hello(socket, link, &payload.d).await,
            Some(OpCode::HeartbeatAck) => {
                if let Some(heartbeat) = link.heartbeat.as_mut() {
                    heartbeat.awaiting_ack = false;
                    if let Some(sent_at) = heartbeat.sent_at {
                        let latency = sent_at.elapsed();
                        self.metrics.record_latency(latency);
                        trace!(shard_id = self.shard_id, ?latency, "heartbeat ACK");
                    }
                }
                None
            }
            Some(OpCode::Heartbeat) => {
                debug!(shard_id = self.shard_id, "server requested a heartbeat");
                let sent = match link.heartbeat.as_mut() {
                    Some(heartbeat) => self.send_heartbeat(socket, heartbeat).await,
                    None => self.send_payload(socket, OpCode::Heartbeat, &self.sequence()).await,
                };
                sent.err().map(|e| Outcome::reconnect(true, e.to_string()))
            }
            Some(OpCode::Reconnect) => {
                info!(shard_id = self.shard_id, "server requested reconnect");
                close_socket(socket, close_code::UNKNOWN_ERROR).await;
                Some(Outcome::reconnect(true, "server requested reconnect"))
            }
            Some(OpCode::InvalidSession) => {
                let resumable = payload.d.as_bool().unwrap_or(false);
                warn!(shard_id = self.shard_id, resumable, "session invalidated");
                if resumable {
                    close_socket(socket, close_code::UNKNOWN_ERROR).await;
                    return Some(Outcome::reconnect(true, "invalid session (resumable)"));
                }
                close_socket(socket, close_code::NORMAL).await;
                let wait = Duration::from_millis(rand::thread_rng().gen_range(1_000..=5_000));
                Some(Outcome::Reconnect {
                    resumable: false,
                    wait: Some(wait),
                    reason: "invalid session".to_string(),
                })
            }
            _ => {
                debug!(shard_id = self.shard_id, op = payload.op, "ignoring opcode");
                None
            }
        }
    }

    async fn on_hello(
        &mut self,
        socket: &mut BoxSocket,
        link: &mut Link,
        data: &Value,
    ) -> Option<Outcome> {
        let hello = match Hello::deserialize(data) {
            Ok(hello) => hello,
            Err(e) => {
                close_socket(socket, close_code::DECODE_ERROR).await;
                return Some(Outcome::reconnect(true, format!("malformed HELLO: {e}")));
            }
        };

        // First beat one full interval after HELLO.
        let every = Duration::from_millis(hello.heartbeat_interval.max(1));
        let mut interval = interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        link.heartbeat = Some(Heartbeat {
            interval,
            awaiting_ack: false,
            sent_at: None,
        });
        debug!(shard_id = self.shard_id, interval_ms = hello.heartbeat_interval, "HELLO");

        let sent = match self.session.clone().filter(Session::can_resume) {
            Some(session) => {
                self.set_state(ConnectionState::Resuming);
                info!(
                    shard_id = self.shard_id,
                    session_id = %session.session_id,
                    seq = ?session.sequence,
                    "resuming session"
                );
                let resume = Resume {
                    token: self.config.token.clone(),
                    session_id: session.session_id,
                    seq: session.sequence,
                };
                self.send_payload(socket, OpCode::Resume, &resume).await
            }
            None => {
                self.set_state(ConnectionState::Identifying);
                let identify = Arc::clone(&self.identify);
                let shard_id = self.shard_id;
                link.identify_turn =
                    Some(async move { identify.wait_turn(shard_id).await }.boxed());
                Ok(())
            }
        };
        sent.err().map(|e| Outcome::reconnect(true, e.to_string()))
    }

    fn on_dispatch(&mut self, link: &mut Link, payload: RawPayload) {
        let Some(name) = payload.t else {
            warn!(shard_id = self.shard_id, "dispatch without an event name");
            return;
        };
        let seq = payload.s;
        if let (Some(seq), Some(last)) = (seq, self.sequence())
            && seq <= last
        {
            debug!(shard_id = self.shard_id, seq, last, event = %name, "duplicate dispatch dropped");
            return;
        }

        // The session sequence moves before anyone sees the event.
        match name.as_str() {
            "READY" => match ReadySession::deserialize(&payload.d) {
                Ok(info) => {
                    let session = Session::from_ready(info, seq);
                    info!(shard_id = self.shard_id, session_id = %session.session_id, "READY");
                    self.session = Some(session);
                    self.mark_connected(link);
                }
                Err(e) => warn!(shard_id = self.shard_id, error = %e, "READY without a session"),
            },
            "RESUMED" => {
                self.advance_sequence(seq);
                info!(shard_id = self.shard_id, seq = ?self.sequence(), "session resumed");
                self.mark_connected(link);
            }
            _ => self.advance_sequence(seq),
        }
        if let Some(seq) = seq {
            self.metrics.record_dispatch(seq);
        }

        let event = match Event::from_dispatch(&name, &payload.d) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    shard_id = self.shard_id,
                    seq = ?seq,
                    event = %name,
                    error = %e,
                    "failed to decode dispatch, publishing it raw"
                );
                Event::Unknown {
                    name,
                    data: payload.d,
                }
            }
        };

        let changed = self.cache.apply(self.shard_id, &event);
        trace!(shard_id = self.shard_id, seq = ?seq, event = event.name(), changed, "dispatch");
        self.bus
            .publish(Dispatch::new(self.shard_id, seq.unwrap_or_default(), event));
    }

    async fn on_command(&mut self, socket: &mut BoxSocket, command: ShardCommand) -> Option<Outcome> {
        let sent = match command {
            ShardCommand::Reconnect => {
                info!(shard_id = self.shard_id, "reconnect requested");
                close_socket(socket, close_code::UNKNOWN_ERROR).await;
                return Some(Outcome::Reconnect {
                    resumable: true,
                    wait: Some(Duration::ZERO),
                    reason: "reconnect requested".to_string(),
                });
            }
            ShardCommand::UpdatePresence(presence) => {
                self.send_command(socket, OpCode::PresenceUpdate, &presence).await
            }
            ShardCommand::UpdateVoiceState(update) => {
                self.send_command(socket, OpCode::VoiceStateUpdate, &update).await
            }
            ShardCommand::RequestGuildMembers(request) => {
                self.send_command(socket, OpCode::RequestGuildMembers, &request)
                    .await
            }
            ShardCommand::Send { op, d } => self.send_command(socket, op, &d).await,
        };

        match sent {
            Ok(()) => None,
            Err(e) if e.classification() == ErrorClass::Transient => {
                Some(Outcome::reconnect(true, e.to_string()))
            }
            Err(e) => {
                warn!(shard_id = self.shard_id, error = %e, "command dropped");
                None
            }
        }
    }

    async fn send_command<T: Serialize>(
        &self,
        socket: &mut BoxSocket,
        op: OpCode,
        d: &T,
    ) -> Result<()> {
        let waited = self.send_limiter.acquire().await;
        if !waited.is_zero() {
            debug!(shard_id = self.shard_id, ?waited, ?op, "command paced by send limiter");
        }
        self.send_payload(socket, op, d).await?;
        self.metrics.record_command();
        Ok(())
    }

    async fn send_heartbeat(&self, socket: &mut BoxSocket, heartbeat: &mut Heartbeat) -> Result<()> {
        let seq = self.sequence();
        self.send_payload(socket, OpCode::Heartbeat, &seq).await?;
        heartbeat.awaiting_ack = true;
        heartbeat.sent_at = Some(Instant::now());
        trace!(shard_id = self.shard_id, seq = ?seq, "heartbeat");
        Ok(())
    }

    async fn send_payload<T: Serialize>(
        &self,
        socket: &mut BoxSocket,
        op: OpCode,
        d: &T,
    ) -> Result<()> {
        let text = encode(op, d)?;
        socket.send(Message::Text(text.into())).await?;
        Ok(())
    }

    fn identify_payload(&self) -> Identify {
        Identify {
            token: self.config.token.clone(),
            intents: self.config.intents,
            shard: [self.shard_id, self.shard_count],
            compress: false,
            large_threshold: self.config.large_threshold,
            properties: self.config.properties.clone(),
            presence: self.config.presence.clone(),
        }
    }

    fn sequence(&self) -> Option<Sequence> {
        self.session.as_ref().and_then(|s| s.sequence)
    }

    fn advance_sequence(&mut self, seq: Option<Sequence>) {
        if let (Some(session), Some(seq)) = (self.session.as_mut(), seq) {
            session.sequence = Some(seq);
        }
    }

    fn mark_connected(&mut self, link: &mut Link) {
        link.ready = true;
        self.backoff.connected();
        self.set_state(ConnectionState::Connected);
    }

    fn discard_session(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(shard_id = self.shard_id, session_id = %session.session_id, "session discarded");
        }
        self.metrics.reset_sequence();
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(shard_id = self.shard_id, from = %previous, to = %next, "state");
        }
    }
}

async fn shutdown_signal(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn next_tick(heartbeat: &mut Option<Heartbeat>) {
    match heartbeat {
        Some(heartbeat) => {
            heartbeat.interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_turn(turn: &mut Option<BoxFuture<'static, ()>>) {
    match turn {
        Some(turn) => turn.await,
        None => std::future::pending().await,
    }
}

async fn close_socket(socket: &mut BoxSocket, code: u16) {
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: String::new().into(),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        trace!(error = %e, close_code = code, "close frame not delivered");
    }
}
