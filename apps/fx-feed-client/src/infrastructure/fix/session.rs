//! Session State Machine
//!
//! Owns the lifecycle of one authenticated, sequenced session:
//! logon/logout, heartbeat and test-request exchange, and sequence-number
//! bookkeeping. The machine is synchronous and socket-free (inputs are
//! decoded messages and clock readings, outputs are [`SessionAction`]s)
//! so the transition logic is testable without real connections. The
//! connection supervisor in [`client`](super::client) feeds it from the
//! read loop and executes its actions.
//!
//! # States
//!
//! `Disconnected → LoggingOn → Active → LoggingOff → Disconnected`,
//! with any error short-circuiting straight to `Disconnected`.
//!
//! # Sequencing
//!
//! Every message in `LoggingOn`/`Active`/`LoggingOff` increments the
//! outbound counter; inbound messages must arrive with exactly the
//! expected sequence. Lower is a duplicate (dropped), higher is a gap
//! (one ResendRequest for the missing range, gapped traffic buffered and
//! applied only once the gap fills).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::domain::quote::{Quote, Symbol};

use super::messages::{
    FixMessage, Heartbeat, Logon, Logout, MarketDataSnapshot, MessageBody, ResendRequest,
    SequenceReset, TestRequest,
};

/// Gapped messages buffered beyond this count indicate a feed that is not
/// honoring our ResendRequest; treated as a protocol failure.
const MAX_GAP_BUFFER: usize = 1024;

// =============================================================================
// Public Types
// =============================================================================

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection, or the session has terminated.
    #[default]
    Disconnected,
    /// Logon sent, awaiting the counterparty's reply.
    LoggingOn,
    /// Logon complete; application traffic flows.
    Active,
    /// Logout sent, waiting briefly for the acknowledgement.
    LoggingOff,
}

impl SessionState {
    /// Whether the session is fully established.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Why a session ended. Drives the supervisor's retry cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The counterparty rejected our logon (credential-class failure).
    LogonRejected(String),
    /// No logon reply arrived within the configured timeout.
    LogonTimedOut,
    /// No inbound traffic despite a test request; the session is dead.
    HeartbeatTimeout,
    /// The counterparty initiated a logout.
    RemoteLogout,
    /// Our logout completed (acknowledged or timed out) - clean teardown.
    LogoutComplete,
    /// The inbound stream violated the protocol.
    ProtocolError(String),
    /// The transport failed (connect, read, or write).
    Transport(String),
    /// A process-wide shutdown was requested.
    Shutdown,
}

impl DisconnectReason {
    /// Credential-class failures retry on the slow cadence.
    #[must_use]
    pub const fn is_credential_failure(&self) -> bool {
        matches!(self, Self::LogonRejected(_))
    }

    /// Deliberate teardowns schedule no reconnect at all.
    #[must_use]
    pub const fn is_deliberate(&self) -> bool {
        matches!(self, Self::Shutdown | Self::LogoutComplete)
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LogonRejected(text) => write!(f, "logon rejected: {text}"),
            Self::LogonTimedOut => write!(f, "logon timed out"),
            Self::HeartbeatTimeout => write!(f, "heartbeat timeout"),
            Self::RemoteLogout => write!(f, "counterparty logged out"),
            Self::LogoutComplete => write!(f, "logout complete"),
            Self::ProtocolError(text) => write!(f, "protocol error: {text}"),
            Self::Transport(text) => write!(f, "transport error: {text}"),
            Self::Shutdown => write!(f, "shutdown requested"),
        }
    }
}

/// Side effects requested by the machine, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Write this message to the wire.
    Transmit(FixMessage),
    /// Forward this validated quote to the cache.
    Publish(Quote),
    /// The logon handshake completed; reset reconnect backoff.
    LogonAccepted,
    /// The session is over; tear down the connection.
    Terminate(DisconnectReason),
}

/// Static configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Our session identity (SenderCompID).
    pub sender_comp_id: String,
    /// Counterparty identity (TargetCompID).
    pub target_comp_id: String,
    /// Logon username.
    pub username: String,
    /// Logon password.
    pub password: String,
    /// Negotiated heartbeat interval.
    pub heartbeat_interval: Duration,
    /// How long to wait for the logon reply.
    pub logon_timeout: Duration,
    /// How long to wait for the logout acknowledgement.
    pub logout_timeout: Duration,
    /// Request sequence reset on logon (fresh counters every session).
    pub reset_on_logon: bool,
}

// =============================================================================
// Session Machine
// =============================================================================

/// The session state machine. One instance per connection attempt;
/// sequence counters can be carried over between instances.
#[derive(Debug)]
pub struct SessionMachine {
    config: SessionConfig,
    state: SessionState,
    next_seq_out: u64,
    next_seq_in: u64,
    last_sent_at: Option<Instant>,
    last_recv_at: Option<Instant>,
    logon_sent_at: Option<Instant>,
    logoff_sent_at: Option<Instant>,
    test_request_outstanding: bool,
    test_request_counter: u64,
    pending_resend: Option<(u64, u64)>,
    gap_buffer: BTreeMap<u64, FixMessage>,
}

impl SessionMachine {
    /// Create a machine with carried-over sequence counters.
    ///
    /// Pass `(1, 1)` for a fresh session; the supervisor passes the
    /// previous session's counters when the counterparty has not signaled
    /// a reset.
    #[must_use]
    pub fn new(config: SessionConfig, next_seq_out: u64, next_seq_in: u64) -> Self {
        Self {
            config,
            state: SessionState::Disconnected,
            next_seq_out: next_seq_out.max(1),
            next_seq_in: next_seq_in.max(1),
            last_sent_at: None,
            last_recv_at: None,
            logon_sent_at: None,
            logoff_sent_at: None,
            test_request_outstanding: false,
            test_request_counter: 0,
            pending_resend: None,
            gap_buffer: BTreeMap::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Sequence counters to carry into the next session
    /// `(next_seq_out, next_seq_in)`.
    #[must_use]
    pub const fn sequences(&self) -> (u64, u64) {
        (self.next_seq_out, self.next_seq_in)
    }

    /// Begin the logon handshake. Valid only from `Disconnected`.
    pub fn start_logon(&mut self, now: Instant) -> Vec<SessionAction> {
        if self.config.reset_on_logon {
            self.next_seq_out = 1;
            self.next_seq_in = 1;
        }
        self.state = SessionState::LoggingOn;
        self.logon_sent_at = Some(now);
        self.last_recv_at = Some(now);

        let logon = MessageBody::Logon(Logon {
            heart_bt_int: u32::try_from(self.config.heartbeat_interval.as_secs()).unwrap_or(30),
            username: self.config.username.clone(),
            password: self.config.password.clone(),
            reset_seq_num: self.config.reset_on_logon,
        });
        vec![self.transmit(logon, now)]
    }

    /// Begin a deliberate logout. From `Active` this sends Logout and
    /// waits for the ack; from any other state it terminates immediately.
    pub fn start_logout(&mut self, now: Instant) -> Vec<SessionAction> {
        match self.state {
            SessionState::Active | SessionState::LoggingOn => {
                self.state = SessionState::LoggingOff;
                self.logoff_sent_at = Some(now);
                vec![self.transmit(
                    MessageBody::Logout(Logout {
                        text: Some("shutdown".to_string()),
                    }),
                    now,
                )]
            }
            SessionState::LoggingOff => vec![],
            SessionState::Disconnected => {
                vec![self.terminate(DisconnectReason::LogoutComplete)]
            }
        }
    }

    /// Process one decoded inbound message.
    pub fn on_message(&mut self, message: FixMessage, now: Instant) -> Vec<SessionAction> {
        self.last_recv_at = Some(now);
        self.test_request_outstanding = false;

        match self.state {
            SessionState::Disconnected => {
                tracing::debug!(kind = message.body.kind(), "message while disconnected, ignored");
                vec![]
            }
            SessionState::LoggingOn => self.on_logon_reply(message, now),
            SessionState::Active | SessionState::LoggingOff => self.on_sequenced(message, now),
        }
    }

    /// Advance session timers. Call at a granularity well below the
    /// heartbeat interval.
    pub fn on_tick(&mut self, now: Instant) -> Vec<SessionAction> {
        match self.state {
            SessionState::Disconnected => vec![],
            SessionState::LoggingOn => {
                if elapsed_since(self.logon_sent_at, now) > self.config.logon_timeout {
                    vec![self.terminate(DisconnectReason::LogonTimedOut)]
                } else {
                    vec![]
                }
            }
            SessionState::LoggingOff => {
                if elapsed_since(self.logoff_sent_at, now) > self.config.logout_timeout {
                    // Best effort: the ack never came, leave anyway.
                    vec![self.terminate(DisconnectReason::LogoutComplete)]
                } else {
                    vec![]
                }
            }
            SessionState::Active => self.on_active_tick(now),
        }
    }

    // =========================================================================
    // Logon
    // =========================================================================

    fn on_logon_reply(&mut self, message: FixMessage, now: Instant) -> Vec<SessionAction> {
        match message.body {
            MessageBody::Logon(ref logon) => {
                // Adopt the counterparty's sequence from the reply; a reset
                // flag means both sides started over regardless of history.
                self.next_seq_in = message.msg_seq_num + 1;
                if logon.reset_seq_num {
                    tracing::info!("counterparty requested sequence reset on logon");
                }
                self.state = SessionState::Active;
                self.last_sent_at = Some(now);
                tracing::info!(
                    seq_in = self.next_seq_in,
                    seq_out = self.next_seq_out,
                    "session active"
                );
                vec![SessionAction::LogonAccepted]
            }
            MessageBody::Reject(reject) => {
                let text = reject.text.unwrap_or_else(|| "logon rejected".to_string());
                vec![self.terminate(DisconnectReason::LogonRejected(text))]
            }
            MessageBody::Logout(logout) => {
                let text = logout.text.unwrap_or_else(|| "logout during logon".to_string());
                vec![self.terminate(DisconnectReason::LogonRejected(text))]
            }
            ref other => {
                tracing::debug!(kind = other.kind(), "non-logon reply during handshake, ignored");
                vec![]
            }
        }
    }

    // =========================================================================
    // Active: sequencing
    // =========================================================================

    fn on_sequenced(&mut self, message: FixMessage, now: Instant) -> Vec<SessionAction> {
        let seq = message.msg_seq_num;

        // A hard SequenceReset repositions the counter regardless of its
        // own sequence number.
        if let MessageBody::SequenceReset(reset) = &message.body
            && !reset.gap_fill
        {
            tracing::info!(new_seq_no = reset.new_seq_no, "sequence reset");
            self.next_seq_in = reset.new_seq_no;
            self.pending_resend = None;
            self.gap_buffer.clear();
            return vec![];
        }

        if seq < self.next_seq_in {
            // Duplicate delivery (e.g. replay after resend); idempotent drop.
            tracing::debug!(seq, expected = self.next_seq_in, "duplicate message dropped");
            return vec![];
        }

        if seq > self.next_seq_in {
            return self.on_gap(message, now);
        }

        self.next_seq_in += 1;
        let mut actions = self.apply(message, now);

        // Drain buffered messages that the filled gap has unblocked.
        while let Some(buffered) = self.gap_buffer.remove(&self.next_seq_in) {
            self.next_seq_in += 1;
            actions.extend(self.apply(buffered, now));
        }
        if let Some((_, end)) = self.pending_resend
            && self.next_seq_in > end
        {
            self.pending_resend = None;
        }
        actions
    }

    fn on_gap(&mut self, message: FixMessage, now: Instant) -> Vec<SessionAction> {
        let seq = message.msg_seq_num;
        if self.gap_buffer.len() >= MAX_GAP_BUFFER {
            return vec![self.terminate(DisconnectReason::ProtocolError(format!(
                "gap buffer overflow at seq {seq}"
            )))];
        }
        self.gap_buffer.insert(seq, message);

        // One ResendRequest per gap; widen silently if more gapped traffic
        // arrives while the request is outstanding.
        if self.pending_resend.is_none() {
            let range = (self.next_seq_in, seq - 1);
            self.pending_resend = Some(range);
            tracing::warn!(
                begin = range.0,
                end = range.1,
                "inbound sequence gap, requesting resend"
            );
            return vec![self.transmit(
                MessageBody::ResendRequest(ResendRequest {
                    begin_seq_no: range.0,
                    end_seq_no: range.1,
                }),
                now,
            )];
        }
        vec![]
    }

    // =========================================================================
    // Active: message application
    // =========================================================================

    fn apply(&mut self, message: FixMessage, now: Instant) -> Vec<SessionAction> {
        match message.body {
            MessageBody::Heartbeat(_) => vec![],
            MessageBody::TestRequest(request) => {
                vec![self.transmit(
                    MessageBody::Heartbeat(Heartbeat {
                        test_req_id: Some(request.test_req_id),
                    }),
                    now,
                )]
            }
            MessageBody::MarketDataSnapshot(snapshot) => {
                self.publish_snapshot(&snapshot, &message.sending_time)
            }
            MessageBody::ResendRequest(request) => {
                // No outbound history is kept; gap-fill over the range.
                tracing::info!(
                    begin = request.begin_seq_no,
                    end = request.end_seq_no,
                    "counterparty requested resend, gap-filling"
                );
                let new_seq_no = self.next_seq_out;
                vec![self.transmit(
                    MessageBody::SequenceReset(SequenceReset {
                        gap_fill: true,
                        new_seq_no,
                    }),
                    now,
                )]
            }
            MessageBody::SequenceReset(reset) => {
                // Gap-fill variant (hard resets were handled before
                // sequencing).
                self.next_seq_in = reset.new_seq_no;
                vec![]
            }
            MessageBody::Logout(logout) => {
                if self.state == SessionState::LoggingOff {
                    vec![self.terminate(DisconnectReason::LogoutComplete)]
                } else {
                    let text = logout.text.unwrap_or_default();
                    tracing::warn!(text = %text, "counterparty initiated logout");
                    let ack = self.transmit(MessageBody::Logout(Logout { text: None }), now);
                    vec![ack, self.terminate(DisconnectReason::RemoteLogout)]
                }
            }
            MessageBody::Reject(reject) => {
                // Message-level: something we sent was refused. Log with
                // context and keep the session alive.
                tracing::warn!(
                    ref_seq = reject.ref_seq_num,
                    text = reject.text.as_deref().unwrap_or(""),
                    "message rejected by counterparty"
                );
                vec![]
            }
            MessageBody::Logon(_) => {
                tracing::debug!("unexpected logon while active, ignored");
                vec![]
            }
        }
    }

    fn publish_snapshot(
        &self,
        snapshot: &MarketDataSnapshot,
        sending_time: &chrono::DateTime<Utc>,
    ) -> Vec<SessionAction> {
        let mut actions = Vec::with_capacity(snapshot.entries.len());
        for entry in &snapshot.entries {
            let symbol = match Symbol::new(entry.symbol.clone()) {
                Ok(symbol) => symbol,
                Err(error) => {
                    tracing::warn!(%error, "snapshot entry dropped");
                    continue;
                }
            };
            match Quote::new(symbol, entry.bid, entry.ask, *sending_time) {
                Ok(quote) => actions.push(SessionAction::Publish(quote)),
                Err(error) => {
                    // Semantic failure is message-level, never session-fatal.
                    tracing::warn!(%error, "crossed quote dropped");
                }
            }
        }
        actions
    }

    // =========================================================================
    // Active: timers
    // =========================================================================

    fn on_active_tick(&mut self, now: Instant) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        let interval = self.config.heartbeat_interval;
        let silence = elapsed_since(self.last_recv_at, now);
        // Evaluated before any probe goes out, which also counts as a send.
        let heartbeat_due = elapsed_since(self.last_sent_at, now) >= interval;

        // Inbound liveness ladder: probe at 1.5x, declare dead at 2.5x.
        if silence > interval.mul_f64(2.5) {
            actions.push(self.terminate(DisconnectReason::HeartbeatTimeout));
            return actions;
        }
        if silence > interval.mul_f64(1.5) && !self.test_request_outstanding {
            self.test_request_outstanding = true;
            self.test_request_counter += 1;
            let id = format!("probe-{}", self.test_request_counter);
            actions.push(self.transmit(
                MessageBody::TestRequest(TestRequest { test_req_id: id }),
                now,
            ));
        }

        // Outbound liveness: keep our side of the heartbeat contract.
        if heartbeat_due {
            actions.push(self.transmit(MessageBody::Heartbeat(Heartbeat::default()), now));
        }
        actions
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn transmit(&mut self, body: MessageBody, now: Instant) -> SessionAction {
        let message = FixMessage {
            msg_seq_num: self.next_seq_out,
            sender_comp_id: self.config.sender_comp_id.clone(),
            target_comp_id: self.config.target_comp_id.clone(),
            sending_time: Utc::now(),
            body,
        };
        self.next_seq_out += 1;
        self.last_sent_at = Some(now);
        SessionAction::Transmit(message)
    }

    fn terminate(&mut self, reason: DisconnectReason) -> SessionAction {
        self.state = SessionState::Disconnected;
        self.gap_buffer.clear();
        self.pending_resend = None;
        SessionAction::Terminate(reason)
    }
}

fn elapsed_since(instant: Option<Instant>, now: Instant) -> Duration {
    instant.map_or(Duration::ZERO, |earlier| {
        now.saturating_duration_since(earlier)
    })
}
