//! Feed Connection Supervisor
//!
//! Owns the one TCP connection to the upstream feed and supervises its
//! whole lifecycle: connect, logon, read loop, heartbeat timers, teardown
//! and reconnect with backoff. This task is the sole writer to both the
//! session state and the quote cache; everything else only reads.
//!
//! Failure handling follows the error taxonomy: transport and protocol
//! failures tear the session down and retry on the transient cadence,
//! logon rejections retry on the slow cadence, and a shutdown request
//! performs one best-effort logout before closing. There is no attempt
//! ceiling: degraded mode is an acceptable steady state, silently
//! giving up is not.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::application::feed::{ConnectionState, SessionStatus};
use crate::infrastructure::cache::QuoteCache;
use crate::infrastructure::config::FeedConfig;

use super::codec::{Decoded, FixCodec};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::session::{
    DisconnectReason, SessionAction, SessionConfig, SessionMachine,
};

/// Read chunk size for the socket loop.
const READ_CHUNK: usize = 4096;

/// The feed client: connection supervisor plus read loop.
pub struct FeedClient {
    config: FeedConfig,
    cache: Arc<QuoteCache>,
    status: Arc<SessionStatus>,
    cancel: CancellationToken,
}

impl FeedClient {
    /// Create a new feed client.
    #[must_use]
    pub const fn new(
        config: FeedConfig,
        cache: Arc<QuoteCache>,
        status: Arc<SessionStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            cache,
            status,
            cancel,
        }
    }

    /// Run the connection loop until shutdown.
    ///
    /// Reconnects indefinitely: transient failures back off exponentially
    /// with full jitter, logon rejections move to the slower credential
    /// cadence, and both cadences reset after the next successful logon.
    pub async fn run(self) {
        let mut transient = ReconnectPolicy::new(ReconnectConfig {
            initial_delay: self.config.reconnect.delay_initial,
            max_delay: self.config.reconnect.delay_max,
            multiplier: self.config.reconnect.delay_multiplier,
        });
        let mut credential = ReconnectPolicy::new(ReconnectConfig {
            initial_delay: self.config.reconnect.logon_retry_initial,
            max_delay: self.config.reconnect.logon_retry_max,
            multiplier: self.config.reconnect.delay_multiplier,
        });

        // Sequence counters persist across reconnect attempts within the
        // process; the counterparty can reset them via the logon exchange.
        let mut sequences = (1u64, 1u64);

        loop {
            if self.cancel.is_cancelled() {
                self.status.set_state(ConnectionState::Disconnected);
                tracing::info!("feed client cancelled");
                return;
            }

            self.status.set_state(ConnectionState::Connecting);
            let address = self.config.endpoint.address();
            tracing::info!(%address, "connecting to feed");

            let (reason, logged_on) = match TcpStream::connect(&address).await {
                Ok(stream) => {
                    if let Err(error) = stream.set_nodelay(true) {
                        tracing::debug!(%error, "could not set TCP_NODELAY");
                    }
                    self.drive(stream, &mut sequences).await
                }
                Err(error) => (DisconnectReason::Transport(error.to_string()), false),
            };

            self.status.set_state(ConnectionState::Disconnected);

            if logged_on {
                transient.reset();
                credential.reset();
            }

            if reason.is_deliberate() || self.cancel.is_cancelled() {
                tracing::info!(%reason, "feed client stopped");
                return;
            }

            self.status.set_error(reason.to_string());
            let policy = if reason.is_credential_failure() {
                &mut credential
            } else {
                &mut transient
            };
            let delay = policy.next_delay();
            let attempt = policy.attempt_count();
            self.status.increment_reconnect_attempts();
            tracing::warn!(
                %reason,
                attempt,
                delay_ms = delay.as_millis(),
                "feed session ended, reconnecting"
            );

            tokio::select! {
                () = self.cancel.cancelled() => {
                    self.status.set_state(ConnectionState::Disconnected);
                    tracing::info!("feed client cancelled during reconnect delay");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Drive one session over an established stream until it ends.
    ///
    /// Generic over the stream so integration tests can substitute an
    /// in-memory duplex for the TCP connection. Returns the disconnect
    /// reason and whether the logon handshake completed.
    pub async fn drive<S>(
        &self,
        stream: S,
        sequences: &mut (u64, u64),
    ) -> (DisconnectReason, bool)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let codec = FixCodec::new();
        let mut machine = SessionMachine::new(self.session_config(), sequences.0, sequences.1);
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut chunk = [0u8; READ_CHUNK];
        let mut pending: Vec<u8> = Vec::with_capacity(2 * READ_CHUNK);
        let mut logged_on = false;

        // Timer granularity well below the heartbeat interval.
        let tick_period =
            (self.config.session.heartbeat_interval / 8).max(Duration::from_millis(10));
        let mut tick = tokio::time::interval(tick_period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let startup = machine.start_logon(Instant::now());
        if let Err(reason) = self
            .execute(startup, &mut writer, &codec, &mut logged_on)
            .await
        {
            *sequences = machine.sequences();
            return (reason, logged_on);
        }

        let reason = loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    break self
                        .logout_best_effort(&mut machine, &mut reader, &mut writer, &codec, &mut pending)
                        .await;
                }
                _ = tick.tick() => {
                    let actions = machine.on_tick(Instant::now());
                    if let Err(reason) = self
                        .execute(actions, &mut writer, &codec, &mut logged_on)
                        .await
                    {
                        break reason;
                    }
                }
                read = reader.read(&mut chunk) => {
                    match read {
                        Ok(0) => {
                            break DisconnectReason::Transport(
                                "connection closed by peer".to_string(),
                            );
                        }
                        Ok(n) => {
                            pending.extend_from_slice(&chunk[..n]);
                            if let Err(reason) = self
                                .drain_frames(
                                    &codec,
                                    &mut pending,
                                    &mut machine,
                                    &mut writer,
                                    &mut logged_on,
                                )
                                .await
                            {
                                break reason;
                            }
                        }
                        Err(error) => {
                            break DisconnectReason::Transport(error.to_string());
                        }
                    }
                }
            }
        };

        *sequences = machine.sequences();
        (reason, logged_on)
    }

    /// Decode and apply every complete frame in the read buffer.
    async fn drain_frames<W>(
        &self,
        codec: &FixCodec,
        pending: &mut Vec<u8>,
        machine: &mut SessionMachine,
        writer: &mut W,
        logged_on: &mut bool,
    ) -> Result<(), DisconnectReason>
    where
        W: AsyncWrite + Unpin,
    {
        loop {
            match codec.decode(pending) {
                Ok(Decoded::Message { message, consumed }) => {
                    pending.drain(..consumed);
                    self.status.increment_messages();
                    let actions = machine.on_message(message, Instant::now());
                    self.execute(actions, writer, codec, logged_on).await?;
                }
                Ok(Decoded::Incomplete) => return Ok(()),
                Err(error) => {
                    // Never resynchronize mid-stream: a frame we cannot
                    // trust poisons everything after it.
                    let (_, next_seq_in) = machine.sequences();
                    tracing::error!(
                        %error,
                        last_good_seq = next_seq_in.saturating_sub(1),
                        buffered_bytes = pending.len(),
                        "protocol error, tearing down session"
                    );
                    return Err(DisconnectReason::ProtocolError(error.to_string()));
                }
            }
        }
    }

    /// Execute the actions emitted by the session machine, in order.
    async fn execute<W>(
        &self,
        actions: Vec<SessionAction>,
        writer: &mut W,
        codec: &FixCodec,
        logged_on: &mut bool,
    ) -> Result<(), DisconnectReason>
    where
        W: AsyncWrite + Unpin,
    {
        for action in actions {
            match action {
                SessionAction::Transmit(message) => {
                    tracing::trace!(kind = message.body.kind(), seq = message.msg_seq_num, "send");
                    let frame = codec.encode(&message);
                    writer
                        .write_all(&frame)
                        .await
                        .map_err(|error| DisconnectReason::Transport(error.to_string()))?;
                }
                SessionAction::Publish(quote) => {
                    self.cache.update(quote);
                }
                SessionAction::LogonAccepted => {
                    *logged_on = true;
                    self.status.set_state(ConnectionState::Connected);
                }
                SessionAction::Terminate(reason) => {
                    return Err(reason);
                }
            }
        }
        Ok(())
    }

    /// One best-effort logout with a short bound, then close regardless.
    async fn logout_best_effort<R, W>(
        &self,
        machine: &mut SessionMachine,
        reader: &mut R,
        writer: &mut W,
        codec: &FixCodec,
        pending: &mut Vec<u8>,
    ) -> DisconnectReason
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("shutdown requested, logging out");
        for action in machine.start_logout(Instant::now()) {
            if let SessionAction::Transmit(message) = action {
                let frame = codec.encode(&message);
                if writer.write_all(&frame).await.is_err() {
                    return DisconnectReason::Shutdown;
                }
            }
        }

        // Wait briefly for the acknowledgement; leave either way.
        let ack_wait = tokio::time::timeout(self.config.session.logout_timeout, async {
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => {
                        pending.extend_from_slice(&chunk[..n]);
                        loop {
                            match codec.decode(pending) {
                                Ok(Decoded::Message { message, consumed }) => {
                                    pending.drain(..consumed);
                                    let actions = machine.on_message(message, Instant::now());
                                    if actions
                                        .iter()
                                        .any(|a| matches!(a, SessionAction::Terminate(_)))
                                    {
                                        return;
                                    }
                                }
                                Ok(Decoded::Incomplete) => break,
                                Err(_) => return,
                            }
                        }
                    }
                }
            }
        })
        .await;

        if ack_wait.is_err() {
            tracing::debug!("logout acknowledgement did not arrive in time");
        }
        DisconnectReason::Shutdown
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sender_comp_id: self.config.session.sender_comp_id.clone(),
            target_comp_id: self.config.session.target_comp_id.clone(),
            username: self.config.credentials.username().to_string(),
            password: self.config.credentials.password().to_string(),
            heartbeat_interval: self.config.session.heartbeat_interval,
            logon_timeout: self.config.session.logon_timeout,
            logout_timeout: self.config.session.logout_timeout,
            reset_on_logon: self.config.session.reset_on_logon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::feed::FeedSource;
    use crate::infrastructure::config::{
        EndpointSettings, FeedCredentials, ReconnectSettings, SessionSettings,
    };

    fn config() -> FeedConfig {
        FeedConfig {
            source: FeedSource::Live,
            endpoint: EndpointSettings {
                host: "127.0.0.1".to_string(),
                port: 9880,
            },
            credentials: FeedCredentials::new("user".to_string(), "pass".to_string()),
            session: SessionSettings::default(),
            reconnect: ReconnectSettings::default(),
            symbols: vec![],
            staleness_threshold: Duration::from_secs(30),
            fallback_rates: vec![],
        }
    }

    #[test]
    fn session_config_maps_from_feed_config() {
        let client = FeedClient::new(
            config(),
            Arc::new(QuoteCache::new()),
            Arc::new(SessionStatus::new()),
            CancellationToken::new(),
        );
        let session = client.session_config();
        assert_eq!(session.sender_comp_id, "RATESITE");
        assert_eq!(session.target_comp_id, "FXFEED");
        assert_eq!(session.username, "user");
        assert_eq!(session.heartbeat_interval, Duration::from_secs(30));
        assert!(session.reset_on_logon);
    }

    #[tokio::test]
    async fn cancelled_client_exits_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let client = FeedClient::new(
            config(),
            Arc::new(QuoteCache::new()),
            Arc::new(SessionStatus::new()),
            cancel,
        );
        // Must return without attempting a connection.
        tokio::time::timeout(Duration::from_millis(100), client.run())
            .await
            .expect("run should exit once cancelled");
    }
}
