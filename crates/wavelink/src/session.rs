//! The protocol engine: a session actor plus cheap, cloneable handles.
//!
//! A [`Session`] is built once and spawns an engine task that owns every
//! piece of per-connection state: the correlation-id counter, the
//! pending-ack table, the channel registry, the auth token, and the
//! reconnection strategy. Handles submit [`Command`]s over an unbounded
//! mpsc channel; the engine interleaves command handling with inbound
//! frames in a single `select!` loop, so all outbound writes are FIFO
//! and never interleave, and the id counter is read-and-incremented by
//! exactly one task.
//!
//! ```text
//! Session/Channel handles ──commands──▶ ┌────────────┐
//!                                       │   engine   │ ◀──frames── transport
//! listeners/acks/handlers ◀──callbacks─ └────────────┘
//! ```
//!
//! Connection lifecycle:
//!
//! ```text
//!   Created → Connecting → Open → Closing → Closed
//!                 │           │
//!                 └── fail ───┴── drop ──▶ reconnect backoff (bounded)
//! ```

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use wavelink_protocol::{
    auth_flag, classify, Codec, Message, MessageKind, Packet, PlainCodec,
};
use wavelink_transport::{Connection, Frame, Transport, TransportError};

use crate::acks::{AckCallback, AckTable};
use crate::channels::{next_channel_id, Channel, ChannelRegistry, MessageListener};
use crate::listener::{EventRoute, NoopListener, Responder, SessionListener};
use crate::reconnect::{ReconnectPolicy, ReconnectStrategy};
use crate::ClientError;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// The connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built, never connected.
    Created,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected; the handshake has been sent.
    Open,
    /// An explicit disconnect is in progress.
    Closing,
    /// Not connected.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Operations submitted to the engine by the public handles.
pub(crate) enum Command {
    Emit {
        event: String,
        data: Option<Value>,
        ack: Option<AckCallback>,
    },
    Publish {
        channel: String,
        data: Option<Value>,
        ack: Option<AckCallback>,
    },
    Subscribe {
        channel: String,
        ack: Option<AckCallback>,
    },
    Unsubscribe {
        id: u64,
        channel: String,
        ack: Option<AckCallback>,
    },
    Respond {
        rid: u64,
        error: Option<Value>,
        data: Option<Value>,
    },
    RegisterChannel {
        id: u64,
        name: String,
    },
    SetChannelListener {
        id: u64,
        listener: MessageListener,
    },
    RegisterEvent {
        event: String,
        route: EventRoute,
    },
    SetAuthToken {
        token: Option<String>,
    },
    Connect,
    Disconnect,
    QueryState {
        reply: oneshot::Sender<SessionState>,
    },
    QueryChannels {
        reply: oneshot::Sender<Vec<(u64, String)>>,
    },
    QueryAuthToken {
        reply: oneshot::Sender<Option<String>>,
    },
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and connecting a [`Session`].
///
/// # Example
///
/// ```rust,no_run
/// use wavelink::{ReconnectPolicy, Session, WebSocketTransport};
///
/// # async fn run() {
/// let session = Session::builder("ws://localhost:8000/socket/")
///     .auth_token("token")
///     .reconnect(ReconnectPolicy::default())
///     .connect(WebSocketTransport::new());
/// # }
/// ```
pub struct SessionBuilder {
    url: String,
    auth_token: Option<String>,
    codec: Box<dyn Codec>,
    reconnect: Option<ReconnectPolicy>,
    listener: Box<dyn SessionListener>,
}

impl SessionBuilder {
    fn new(url: String) -> Self {
        Self {
            url,
            auth_token: None,
            codec: Box::new(PlainCodec),
            reconnect: None,
            listener: Box::new(NoopListener),
        }
    }

    /// Sets the auth token sent with every handshake.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the wire codec. Defaults to [`PlainCodec`] (uncompacted
    /// JSON text).
    pub fn codec(mut self, codec: impl Codec) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Enables reconnection with the given policy. Without a policy the
    /// session stays closed after any drop.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Sets the lifecycle listener.
    pub fn listener(mut self, listener: impl SessionListener) -> Self {
        self.listener = Box::new(listener);
        self
    }

    /// Spawns the session engine and starts connecting.
    ///
    /// Returns immediately; connection progress is reported through the
    /// configured [`SessionListener`].
    pub fn connect<T: Transport>(self, transport: T) -> Session {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let engine = Engine {
            url: self.url,
            transport,
            codec: self.codec,
            listener: self.listener,
            commands: command_rx,
            command_tx: command_tx.clone(),
            state: SessionState::Created,
            counter: 1,
            acks: AckTable::new(),
            channels: ChannelRegistry::new(),
            events: HashMap::new(),
            auth_token: self.auth_token,
            reconnect: self.reconnect.map(ReconnectStrategy::new),
        };
        tokio::spawn(engine.run());

        Session {
            commands: command_tx,
        }
    }
}

// ---------------------------------------------------------------------------
// Session handle
// ---------------------------------------------------------------------------

/// Handle to a running session. Cheap to clone; the engine shuts down
/// when the last handle is dropped.
#[derive(Clone)]
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
}

impl Session {
    /// Creates a builder for a session connecting to `url`.
    pub fn builder(url: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(url.into())
    }

    /// Emits a named event with a payload, expecting no response.
    pub fn emit(
        &self,
        event: impl Into<String>,
        data: Value,
    ) -> Result<(), ClientError> {
        self.send(Command::Emit {
            event: event.into(),
            data: Some(data),
            ack: None,
        })
    }

    /// Emits a named event, invoking `ack` with `(event, error, data)`
    /// when the server responds.
    pub fn emit_with_ack(
        &self,
        event: impl Into<String>,
        data: Value,
        ack: impl FnOnce(&str, Option<Value>, Option<Value>) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.send(Command::Emit {
            event: event.into(),
            data: Some(data),
            ack: Some(Box::new(ack)),
        })
    }

    /// Publishes a payload to a named channel without tracking a
    /// subscription.
    pub fn publish(
        &self,
        channel: impl Into<String>,
        data: Value,
    ) -> Result<(), ClientError> {
        self.send(Command::Publish {
            channel: channel.into(),
            data: Some(data),
            ack: None,
        })
    }

    /// Publishes to a named channel, invoking `ack` when the server
    /// responds.
    pub fn publish_with_ack(
        &self,
        channel: impl Into<String>,
        data: Value,
        ack: impl FnOnce(&str, Option<Value>, Option<Value>) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.send(Command::Publish {
            channel: channel.into(),
            data: Some(data),
            ack: Some(Box::new(ack)),
        })
    }

    /// Creates (and tracks) a channel. Always creates a new instance,
    /// even for a name that is already tracked.
    pub fn channel(
        &self,
        name: impl Into<String>,
    ) -> Result<Channel, ClientError> {
        let name = name.into();
        let id = next_channel_id();
        self.send(Command::RegisterChannel {
            id,
            name: name.clone(),
        })?;
        Ok(Channel {
            id,
            name,
            commands: self.commands.clone(),
        })
    }

    /// All tracked channels, in creation order.
    pub async fn channels(&self) -> Result<Vec<Channel>, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::QueryChannels { reply: reply_tx })?;
        let entries =
            reply_rx.await.map_err(|_| ClientError::SessionClosed)?;
        Ok(entries
            .into_iter()
            .map(|(id, name)| Channel {
                id,
                name,
                commands: self.commands.clone(),
            })
            .collect())
    }

    /// The first tracked channel with the given name, if any.
    pub async fn find_channel(
        &self,
        name: &str,
    ) -> Result<Option<Channel>, ClientError> {
        Ok(self
            .channels()
            .await?
            .into_iter()
            .find(|channel| channel.name() == name))
    }

    /// Registers a handler for a named server event. The latest
    /// registration for a name wins.
    pub fn on(
        &self,
        event: impl Into<String>,
        handler: impl FnMut(Option<Value>) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.send(Command::RegisterEvent {
            event: event.into(),
            route: EventRoute::Plain(Box::new(handler)),
        })
    }

    /// Registers a handler that can acknowledge events the server sends
    /// with a call id.
    pub fn on_with_ack(
        &self,
        event: impl Into<String>,
        handler: impl FnMut(Option<Value>, Option<Responder>) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.send(Command::RegisterEvent {
            event: event.into(),
            route: EventRoute::WithAck(Box::new(handler)),
        })
    }

    /// Sets the auth token used in subsequent handshakes.
    pub fn set_auth_token(
        &self,
        token: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(Command::SetAuthToken {
            token: Some(token.into()),
        })
    }

    /// Clears the stored auth token.
    pub fn clear_auth_token(&self) -> Result<(), ClientError> {
        self.send(Command::SetAuthToken { token: None })
    }

    /// The currently stored auth token.
    pub async fn auth_token(&self) -> Result<Option<String>, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::QueryAuthToken { reply: reply_tx })?;
        reply_rx.await.map_err(|_| ClientError::SessionClosed)
    }

    /// Begins a fresh connection cycle if the session is closed (after
    /// an explicit disconnect or an exhausted reconnection cycle).
    pub fn connect(&self) -> Result<(), ClientError> {
        self.send(Command::Connect)
    }

    /// Closes the connection and disables reconnection. Explicit
    /// disconnects never trigger the reconnect machine.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.send(Command::Disconnect)
    }

    /// The session's current connection state.
    pub async fn state(&self) -> Result<SessionState, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::QueryState { reply: reply_tx })?;
        reply_rx.await.map_err(|_| ClientError::SessionClosed)
    }

    /// Whether the session is currently open.
    pub async fn is_connected(&self) -> Result<bool, ClientError> {
        Ok(self.state().await? == SessionState::Open)
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::SessionClosed)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// What the engine does after leaving its current phase.
enum Next {
    /// Attempt a connection now.
    ConnectNow,
    /// Sleep until the deadline, then attempt a reconnect.
    Retry(Instant),
    /// Stay closed, serving commands, until told to connect.
    Idle,
    /// All handles are gone; stop.
    Shutdown,
}

/// The session actor. Owns all mutable session state; runs until every
/// handle is dropped.
struct Engine<T: Transport> {
    url: String,
    transport: T,
    codec: Box<dyn Codec>,
    listener: Box<dyn SessionListener>,
    commands: mpsc::UnboundedReceiver<Command>,
    command_tx: mpsc::UnboundedSender<Command>,
    state: SessionState,
    /// Correlation-id counter. Reset to 1 on every transition into
    /// Open; the handshake consumes 1.
    counter: u64,
    acks: AckTable,
    channels: ChannelRegistry,
    events: HashMap<String, EventRoute>,
    auth_token: Option<String>,
    reconnect: Option<ReconnectStrategy>,
}

impl<T: Transport> Engine<T> {
    async fn run(mut self) {
        debug!(url = %self.url, "session engine started");

        let mut next = Next::ConnectNow;
        loop {
            next = match next {
                Next::ConnectNow => self.connect_once().await,
                Next::Retry(deadline) => {
                    self.wait_for_retry(deadline).await
                }
                Next::Idle => self.wait_idle().await,
                Next::Shutdown => break,
            };
        }

        debug!("session engine stopped");
    }

    // -- Connection lifecycle ---------------------------------------------

    /// One connection attempt: dial, open, then serve until the
    /// connection goes away.
    async fn connect_once(&mut self) -> Next {
        self.state = SessionState::Connecting;
        info!(url = %self.url, "connecting");

        let conn = match self.transport.connect(&self.url).await {
            Ok(conn) => conn,
            Err(error) => {
                warn!(%error, "connect failed");
                self.state = SessionState::Closed;
                self.listener.on_connect_error(&error);
                return self.connection_dropped();
            }
        };

        if let Err(error) = self.open(&conn).await {
            warn!(%error, "handshake send failed");
            let _ = conn.close().await;
            self.state = SessionState::Closed;
            self.listener.on_connect_error(&error);
            return self.connection_dropped();
        }

        self.serve(conn).await
    }

    /// The Open transition: reset the id counter and the reconnect
    /// budget, send the handshake, notify the application, replay
    /// channel subscriptions.
    async fn open(
        &mut self,
        conn: &T::Connection,
    ) -> Result<(), TransportError> {
        self.state = SessionState::Open;
        self.counter = 1;
        if let Some(strategy) = &mut self.reconnect {
            strategy.reset();
        }
        info!(conn = %conn.id(), "connection open");

        let cid = self.next_cid();
        let handshake =
            Packet::handshake(self.auth_token.as_deref()).with_cid(cid);
        // No ack entry for the handshake: the reply carries an
        // isAuthenticated payload and dispatches as AuthStatus.
        self.send_message(conn, &handshake.into()).await?;

        self.listener.on_connected();
        self.replay_subscriptions(conn).await
    }

    /// Re-sends `#subscribe` for every tracked channel. The names are
    /// snapshotted first so replay never fights registry mutation.
    async fn replay_subscriptions(
        &mut self,
        conn: &T::Connection,
    ) -> Result<(), TransportError> {
        let names = self.channels.names();
        if names.is_empty() {
            return Ok(());
        }
        debug!(count = names.len(), "replaying channel subscriptions");
        for name in names {
            self.send_message(conn, &Packet::subscribe(&name).into())
                .await?;
        }
        Ok(())
    }

    /// The open-connection loop: inbound frames and handle commands,
    /// strictly interleaved on this one task.
    async fn serve(&mut self, conn: T::Connection) -> Next {
        loop {
            tokio::select! {
                frame = conn.recv() => match frame {
                    Ok(Some(frame)) => {
                        if let Err(error) =
                            self.handle_frame(&conn, frame).await
                        {
                            warn!(conn = %conn.id(), %error, "send failed");
                            return self
                                .drop_connection(conn, Some(error))
                                .await;
                        }
                    }
                    Ok(None) => {
                        info!(conn = %conn.id(), "closed by peer");
                        return self.drop_connection(conn, None).await;
                    }
                    Err(error) => {
                        warn!(conn = %conn.id(), %error, "receive failed");
                        return self
                            .drop_connection(conn, Some(error))
                            .await;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(command) => {
                        match self
                            .handle_command(Some(&conn), command)
                            .await
                        {
                            Ok(None) => {}
                            Ok(Some(next)) => return next,
                            Err(error) => {
                                warn!(
                                    conn = %conn.id(),
                                    %error,
                                    "send failed"
                                );
                                return self
                                    .drop_connection(conn, Some(error))
                                    .await;
                            }
                        }
                    }
                    None => {
                        let _ = conn.close().await;
                        return Next::Shutdown;
                    }
                },
            }
        }
    }

    /// Tears down a connection after a failure or peer close, notifies
    /// the application, and picks the next phase.
    async fn drop_connection(
        &mut self,
        conn: T::Connection,
        cause: Option<TransportError>,
    ) -> Next {
        let _ = conn.close().await;
        self.state = SessionState::Closed;
        self.listener.on_disconnected(cause.as_ref());
        self.connection_dropped()
    }

    /// The reconnection decision after any drop or failed attempt.
    fn connection_dropped(&mut self) -> Next {
        match &mut self.reconnect {
            None => {
                debug!("reconnection disabled, staying closed");
                Next::Idle
            }
            Some(strategy) if strategy.exhausted() => {
                warn!(
                    attempts = strategy.attempts_made(),
                    "reconnect attempts exhausted"
                );
                strategy.reset();
                Next::Idle
            }
            Some(strategy) => {
                let delay = strategy.next_interval();
                info!(
                    attempt = strategy.attempts_made() + 1,
                    ?delay,
                    "scheduling reconnect"
                );
                Next::Retry(Instant::now() + delay)
            }
        }
    }

    /// Backoff phase: serve commands until the one-shot timer fires,
    /// then record the attempt and reconnect. A disconnect command
    /// abandons the pending timer.
    async fn wait_for_retry(&mut self, deadline: Instant) -> Next {
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    if let Some(strategy) = &mut self.reconnect {
                        strategy.record_attempt();
                    }
                    return Next::ConnectNow;
                }
                command = self.commands.recv() => match command {
                    None => return Next::Shutdown,
                    Some(command) => {
                        match self.handle_command(None, command).await {
                            Ok(Some(next)) => return next,
                            Ok(None) => {}
                            Err(error) => warn!(
                                %error,
                                "command failed while waiting to reconnect"
                            ),
                        }
                    }
                },
            }
        }
    }

    /// Closed phase: serve commands until a connect request arrives or
    /// every handle is gone.
    async fn wait_idle(&mut self) -> Next {
        loop {
            match self.commands.recv().await {
                None => return Next::Shutdown,
                Some(command) => {
                    match self.handle_command(None, command).await {
                        Ok(Some(Next::Idle)) => {}
                        Ok(Some(next)) => return next,
                        Ok(None) => {}
                        Err(error) => warn!(
                            %error,
                            "command failed while disconnected"
                        ),
                    }
                }
            }
        }
    }

    // -- Inbound ----------------------------------------------------------

    async fn handle_frame(
        &mut self,
        conn: &T::Connection,
        frame: Frame,
    ) -> Result<(), TransportError> {
        let message = match self.codec.decode(&frame) {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, "dropping undecodable frame");
                return Ok(());
            }
        };

        // The heartbeat is answered immediately and never classified.
        if message.is_ping() {
            trace!("heartbeat ping, answering");
            return self.send_message(conn, &Message::pong()).await;
        }

        match message {
            Message::Packet(packet) => self.dispatch(conn, packet).await,
            Message::Raw(value) => {
                debug!(%value, "ignoring bare scalar message");
                Ok(())
            }
        }
    }

    async fn dispatch(
        &mut self,
        conn: &T::Connection,
        packet: Packet,
    ) -> Result<(), TransportError> {
        match classify(&packet) {
            MessageKind::AuthStatus => {
                let authenticated = auth_flag(packet.data.as_ref());
                debug!(authenticated, "authentication status received");
                self.listener.on_authenticated(authenticated);
                self.replay_subscriptions(conn).await?;
            }
            MessageKind::Publish => self.dispatch_publish(packet),
            MessageKind::RemoveAuthToken => {
                info!("auth token cleared by server");
                self.auth_token = None;
            }
            MessageKind::SetAuthToken => {
                let token = packet
                    .data
                    .as_ref()
                    .and_then(|d| d.get("token"))
                    .and_then(Value::as_str);
                match token {
                    Some(token) => {
                        let token = token.to_owned();
                        info!("auth token set by server");
                        self.auth_token = Some(token.clone());
                        self.listener.on_auth_token_set(&token);
                    }
                    None => debug!("setAuthToken without a token, dropping"),
                }
            }
            MessageKind::Event => self.dispatch_event(packet),
            MessageKind::AckResponse => match packet.rid {
                Some(rid) => {
                    self.acks.resolve(rid, packet.error, packet.data);
                }
                None => trace!("response without rid, dropping"),
            },
        }
        Ok(())
    }

    fn dispatch_publish(&mut self, packet: Packet) {
        let Some(data) = packet.data else {
            debug!("publish without data, dropping");
            return;
        };
        let Some(channel) = data.get("channel").and_then(Value::as_str)
        else {
            debug!("publish without a channel name, dropping");
            return;
        };
        let payload = data.get("data").cloned().unwrap_or(Value::Null);
        if !self.channels.dispatch(channel, payload) {
            trace!(channel, "publish for channel with no listener");
        }
    }

    fn dispatch_event(&mut self, packet: Packet) {
        let Some(event) = packet.event else { return };
        match self.events.get_mut(&event) {
            None => trace!(%event, "no handler registered, dropping event"),
            Some(EventRoute::Plain(handler)) => handler(packet.data),
            Some(EventRoute::WithAck(handler)) => {
                // A responder exists only when the remote sent a call
                // id, i.e. it expects an acknowledgment.
                let responder = packet.cid.map(|cid| {
                    Responder::new(cid, self.command_tx.clone())
                });
                handler(packet.data, responder);
            }
        }
    }

    // -- Outbound ---------------------------------------------------------

    async fn handle_command(
        &mut self,
        conn: Option<&T::Connection>,
        command: Command,
    ) -> Result<Option<Next>, TransportError> {
        match command {
            Command::Emit { event, data, ack } => {
                let packet = Packet::event(event.clone(), data);
                self.send_call(conn, packet, event, ack).await?;
            }
            Command::Publish { channel, data, ack } => {
                let packet = Packet::publish(&channel, data);
                self.send_call(conn, packet, channel, ack).await?;
            }
            Command::Subscribe { channel, ack } => {
                let packet = Packet::subscribe(&channel);
                self.send_call(conn, packet, channel, ack).await?;
            }
            Command::Unsubscribe { id, channel, ack } => {
                let packet = Packet::unsubscribe(&channel);
                self.send_call(conn, packet, channel, ack).await?;
                // Local subscription state goes away whether or not the
                // server acknowledges.
                self.channels.remove(id);
            }
            Command::Respond { rid, error, data } => {
                // Acknowledgments echo the inbound call id and carry no
                // new cid of their own.
                self.send_packet(conn, Packet::response(rid, error, data))
                    .await?;
            }
            Command::RegisterChannel { id, name } => {
                self.channels.insert(id, name);
            }
            Command::SetChannelListener { id, listener } => {
                if !self.channels.set_listener(id, listener) {
                    debug!("listener for a removed channel, ignoring");
                }
            }
            Command::RegisterEvent { event, route } => {
                self.events.insert(event, route);
            }
            Command::SetAuthToken { token } => self.auth_token = token,
            Command::Connect => {
                if conn.is_some() {
                    debug!("already connected, ignoring connect request");
                } else {
                    return Ok(Some(Next::ConnectNow));
                }
            }
            Command::Disconnect => {
                // Explicit disconnects disable reconnection entirely;
                // a later connect() starts over without a strategy.
                self.reconnect = None;
                if let Some(conn) = conn {
                    self.state = SessionState::Closing;
                    info!(conn = %conn.id(), "disconnecting");
                    if let Err(error) = conn.close().await {
                        debug!(%error, "close failed");
                    }
                    self.state = SessionState::Closed;
                    self.listener.on_disconnected(None);
                } else {
                    self.state = SessionState::Closed;
                }
                return Ok(Some(Next::Idle));
            }
            Command::QueryState { reply } => {
                let _ = reply.send(self.state);
            }
            Command::QueryChannels { reply } => {
                let _ = reply.send(self.channels.entries());
            }
            Command::QueryAuthToken { reply } => {
                let _ = reply.send(self.auth_token.clone());
            }
        }
        Ok(None)
    }

    /// Sends a call packet, registering an ack entry under the next
    /// correlation id when a callback is supplied.
    async fn send_call(
        &mut self,
        conn: Option<&T::Connection>,
        mut packet: Packet,
        label: String,
        ack: Option<AckCallback>,
    ) -> Result<(), TransportError> {
        if let Some(ack) = ack {
            let cid = self.next_cid();
            self.acks.register(cid, label, Some(ack));
            packet = packet.with_cid(cid);
        }
        self.send_packet(conn, packet).await
    }

    async fn send_packet(
        &mut self,
        conn: Option<&T::Connection>,
        packet: Packet,
    ) -> Result<(), TransportError> {
        let Some(conn) = conn else {
            warn!("not connected, dropping outbound message");
            return Ok(());
        };
        self.send_message(conn, &packet.into()).await
    }

    async fn send_message(
        &mut self,
        conn: &T::Connection,
        message: &Message,
    ) -> Result<(), TransportError> {
        let frame = match self.codec.encode(message) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, "encode failed, dropping message");
                return Ok(());
            }
        };
        conn.send(frame).await
    }

    fn next_cid(&mut self) -> u64 {
        let cid = self.counter;
        self.counter += 1;
        cid
    }
}

// =========================================================================
// Tests
// =========================================================================
