//! Server driver.
//!
//! Routes decoded frames to the handshake, login, logout and heartbeat
//! handlers, and extension calls to the [`RoundEngine`]. Owns the
//! [`SessionRegistry`] and the engine, so every state mutation happens
//! inside [`ServerDriver::process_event`] on one owner.

use std::{fmt::Write as _, time::Duration};

use crashline_core::{
    EngineAction, EngineConfig, Environment, GameCommand, Player, PlayerBook, PlayerId, RoundEngine,
};
use crashline_proto::{ActionCode, Controller, ExtensionCall, Frame, Message, WireObject, WireValue};

use crate::{
    registry::{LoginError, SessionRegistry},
    server_error::DriverError,
};

/// Largest message a client may send, advertised in the handshake.
const MAX_MESSAGE_SIZE: i32 = u16::MAX as i32;

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Zone name echoed in the login reply
    pub zone: String,
    /// Name of the single game room listed at login
    pub room: String,
    /// Client heartbeat interval advertised at handshake and login
    pub heartbeat_interval: Duration,
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Round engine configuration
    pub engine: EngineConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            zone: "CRASHLINE_ZONE".to_string(),
            room: "CRASH_ROOM".to_string(),
            heartbeat_interval: Duration::from_secs(10),
            max_connections: 10_000,
            engine: EngineConfig::default(),
        }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        session_id: u64,
    },

    /// A frame was received from a connection
    FrameReceived {
        /// Connection that sent the frame
        session_id: u64,
        /// The received frame
        frame: Frame,
    },

    /// A connection was closed (by peer, error, or slow write)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Periodic tick driving the round clock
    Tick,
}

/// Actions that the server driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
#[derive(Debug, Clone)]
pub enum ServerAction {
    /// Send a frame to a specific session
    SendToSession {
        /// Target session ID
        session_id: u64,
        /// Frame to send
        frame: Frame,
    },

    /// Send a frame to every logged-in player
    Broadcast {
        /// Frame to broadcast
        frame: Frame,
    },

    /// Close a connection
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

fn log(level: LogLevel, message: String) -> ServerAction {
    ServerAction::Log { level, message }
}

/// Action-based server driver.
pub struct ServerDriver<E: Environment> {
    registry: SessionRegistry,
    engine: RoundEngine<E>,
    env: E,
    config: DriverConfig,
}

impl<E: Environment> ServerDriver<E> {
    /// Create a new server driver.
    pub fn new(env: E, config: DriverConfig) -> Self {
        let engine = RoundEngine::new(config.engine.clone(), &env);
        Self { registry: SessionRegistry::new(), engine, env, config }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => Ok(self.handle_connection_accepted(session_id)),
            ServerEvent::FrameReceived { session_id, frame } => self.handle_frame_received(session_id, &frame),
            ServerEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_connection_closed(session_id, &reason))
            },
            ServerEvent::Tick => self.handle_tick(),
        }
    }

    fn handle_connection_accepted(&mut self, session_id: u64) -> Vec<ServerAction> {
        if self.registry.session_count() >= self.config.max_connections {
            return vec![ServerAction::CloseConnection {
                session_id,
                reason: "max connections exceeded".to_string(),
            }];
        }
        if !self.registry.register_session(session_id) {
            return vec![log(LogLevel::Error, format!("session {session_id} registered twice"))];
        }
        vec![log(LogLevel::Debug, format!("connection {session_id} accepted"))]
    }

    fn handle_frame_received(&mut self, session_id: u64, frame: &Frame) -> Result<Vec<ServerAction>, DriverError> {
        if self.registry.session(session_id).is_none() {
            return Err(DriverError::SessionNotFound(session_id));
        }

        let decoded = match frame.root() {
            Ok(decoded) => decoded,
            Err(e) => return Ok(vec![log(LogLevel::Warn, format!("session {session_id}: undecodable frame: {e}"))]),
        };

        let mut actions = Vec::new();
        if let Some(e) = &decoded.error {
            actions.push(log(
                LogLevel::Warn,
                format!("session {session_id}: decode aborted after {} fields: {e}", decoded.object.len()),
            ));
        }

        let message = match Message::from_object(&decoded.object) {
            Ok(message) => message,
            Err(e) => {
                actions.push(log(LogLevel::Warn, format!("session {session_id}: malformed message: {e}")));
                return Ok(actions);
            },
        };

        match message.action_code() {
            Some(ActionCode::Handshake) => actions.extend(self.handle_handshake(session_id)?),
            Some(ActionCode::Login) => actions.extend(self.handle_login(session_id, &message.payload)?),
            Some(ActionCode::Logout) => actions.extend(self.handle_logout(session_id)?),
            Some(ActionCode::PingPong) => {
                let pong = Message::new(ActionCode::PingPong, Controller::SYSTEM, WireObject::new());
                actions.push(ServerAction::SendToSession { session_id, frame: pong.to_frame()? });
            },
            Some(ActionCode::CallExtension) => actions.extend(self.handle_extension(session_id, &message.payload)?),
            None => actions.push(log(
                LogLevel::Debug,
                format!("session {session_id}: ignoring unknown action {}", message.action),
            )),
        }

        Ok(actions)
    }

    fn handle_handshake(&mut self, session_id: u64) -> Result<Vec<ServerAction>, DriverError> {
        self.registry.mark_handshaken(session_id);

        let mut token_bytes = [0u8; 16];
        self.env.random_bytes(&mut token_bytes);
        let token = token_bytes.iter().fold(String::with_capacity(32), |mut hex, b| {
            let _ = write!(hex, "{b:02x}");
            hex
        });

        let payload = WireObject::new()
            .with("ct", i32::MAX)
            .with("ms", MAX_MESSAGE_SIZE)
            .with("tk", token)
            .with("hb", self.heartbeat_ms());
        let reply = Message::new(ActionCode::Handshake, Controller::SYSTEM, payload);
        Ok(vec![ServerAction::SendToSession { session_id, frame: reply.to_frame()? }])
    }

    fn handle_login(&mut self, session_id: u64, payload: &WireObject) -> Result<Vec<ServerAction>, DriverError> {
        if let Some(existing) = self.registry.player_for_session(session_id) {
            let player = existing.clone();
            return self.login_success(session_id, &player);
        }

        let username = match payload.get_str("un").map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("player_{session_id}"),
        };

        let player = Player::new(
            PlayerId::new(session_id),
            username,
            self.config.engine.currency.as_str(),
            self.config.engine.starting_balance,
        );

        match self.registry.login(session_id, player) {
            Ok(player) => {
                let player = player.clone();
                let mut actions = self.login_success(session_id, &player)?;
                actions.push(log(LogLevel::Info, format!("session {session_id} logged in as {}", player.username)));
                Ok(actions)
            },
            Err(LoginError::SessionNotFound(id)) => Err(DriverError::SessionNotFound(id)),
            Err(e) => {
                let reply = Message::new(
                    ActionCode::Login,
                    Controller::SYSTEM,
                    WireObject::new().with("rs", 1i16).with("zn", self.config.zone.as_str()),
                );
                Ok(vec![
                    ServerAction::SendToSession { session_id, frame: reply.to_frame()? },
                    log(LogLevel::Info, format!("session {session_id}: login refused: {e}")),
                ])
            },
        }
    }

    fn login_success(&self, session_id: u64, player: &Player) -> Result<Vec<ServerAction>, DriverError> {
        let online = i16::try_from(self.registry.online_count()).unwrap_or(i16::MAX);
        let room = WireValue::Array(vec![
            WireValue::Int(1),
            WireValue::from(self.config.room.as_str()),
            WireValue::from("default"),
            WireValue::Bool(true),
            WireValue::Bool(false),
            WireValue::Bool(false),
            WireValue::Short(online),
            WireValue::Short(i16::MAX),
            WireValue::Array(Vec::new()),
        ]);
        let payload = WireObject::new()
            .with("rs", 0i16)
            .with("zn", self.config.zone.as_str())
            .with("un", player.username.as_str())
            .with("pi", 0i16)
            .with("rl", WireValue::Array(vec![room]))
            .with("id", i32::try_from(session_id).unwrap_or(i32::MAX));
        let reply = Message::new(ActionCode::Login, Controller::SYSTEM, payload);
        let init = self.engine.init_message(&self.registry, player, self.heartbeat_ms());

        Ok(vec![
            ServerAction::SendToSession { session_id, frame: reply.to_frame()? },
            ServerAction::SendToSession { session_id, frame: init.to_frame()? },
        ])
    }

    fn handle_logout(&mut self, session_id: u64) -> Result<Vec<ServerAction>, DriverError> {
        let mut actions = Vec::new();
        if let Some(player) = self.registry.player_for_session(session_id).map(|p| p.id) {
            self.engine.abandon(player);
            self.registry.logout(session_id);
            actions.push(log(LogLevel::Info, format!("session {session_id} logged out")));
        }
        let reply = Message::new(ActionCode::Logout, Controller::SYSTEM, WireObject::new());
        actions.push(ServerAction::SendToSession { session_id, frame: reply.to_frame()? });
        Ok(actions)
    }

    fn handle_extension(&mut self, session_id: u64, payload: &WireObject) -> Result<Vec<ServerAction>, DriverError> {
        let call = match ExtensionCall::from_payload(payload) {
            Ok(call) => call,
            Err(e) => return Ok(vec![log(LogLevel::Warn, format!("session {session_id}: bad extension call: {e}"))]),
        };

        let Some(player) = self.registry.player_for_session(session_id).map(|p| p.id) else {
            return Ok(vec![log(
                LogLevel::Warn,
                format!("session {session_id}: `{}` before login, ignored", call.command),
            )]);
        };

        let command = match GameCommand::parse(&call.command, &call.params) {
            Ok(command) => command,
            Err(e) => return Ok(vec![log(LogLevel::Warn, format!("session {session_id}: {e}"))]),
        };

        let engine_actions = self.engine.handle_command(&mut self.registry, player, command, call.request_id);
        self.convert_engine_actions(engine_actions)
    }

    fn handle_connection_closed(&mut self, session_id: u64, reason: &str) -> Vec<ServerAction> {
        if let Some(player) = self.registry.player_for_session(session_id).map(|p| p.id) {
            self.engine.abandon(player);
        }
        match self.registry.unregister_session(session_id) {
            Some((_, player)) => {
                let who = player.map_or_else(|| "anonymous".to_string(), |p| p.username);
                vec![log(LogLevel::Info, format!("connection {session_id} ({who}) closed: {reason}"))]
            },
            None => Vec::new(),
        }
    }

    fn handle_tick(&mut self) -> Result<Vec<ServerAction>, DriverError> {
        let engine_actions = self.engine.tick(&self.env, &mut self.registry);
        self.convert_engine_actions(engine_actions)
    }

    fn convert_engine_actions(&self, engine_actions: Vec<EngineAction>) -> Result<Vec<ServerAction>, DriverError> {
        let mut actions = Vec::with_capacity(engine_actions.len());
        for action in engine_actions {
            match action {
                EngineAction::Broadcast(message) => {
                    actions.push(ServerAction::Broadcast { frame: message.to_frame()? });
                },
                EngineAction::Unicast { player, message } => {
                    if let Some(session_id) = self.registry.session_for_player(player) {
                        actions.push(ServerAction::SendToSession { session_id, frame: message.to_frame()? });
                    }
                },
            }
        }
        Ok(actions)
    }

    fn heartbeat_ms(&self) -> i32 {
        i32::try_from(self.config.heartbeat_interval.as_millis()).unwrap_or(i32::MAX)
    }

    /// Sessions that receive [`ServerAction::Broadcast`].
    pub fn broadcast_sessions(&self) -> impl Iterator<Item = u64> + '_ {
        self.registry.broadcast_sessions()
    }

    /// Session and player registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Round engine.
    pub fn engine(&self) -> &RoundEngine<E> {
        &self.engine
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.session_count()
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }
}

impl<E: Environment> std::fmt::Debug for ServerDriver<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("connection_count", &self.registry.session_count())
            .field("phase", &self.engine.phase())
            .field("round", &self.engine.round().id)
            .finish()
    }
}
