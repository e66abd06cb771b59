//! Simulation server for deterministic tests.
//!
//! `SimServer` wraps `ServerDriver` with a [`SimEnv`] and no sockets.
//! Outbound frames are decoded back into [`Message`]s and appended to
//! per-session inboxes, so tests can read exactly what each client would
//! have received. Every processed event also records an [`Observation`]
//! for the invariant checks.

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use crashline_core::{Money, Phase};
use crashline_proto::{ActionCode, Controller, ExtensionCall, Frame, Message, WireObject};
use crashline_server::{DriverConfig, DriverError, LogLevel, ServerAction, ServerDriver, ServerEvent};

use crate::{
    SimEnv,
    invariants::{Observation, SystemSnapshot},
};

/// Simulation server.
///
/// Tests drive it explicitly: connect sessions, send messages, advance the
/// clock. Nothing happens between calls.
pub struct SimServer {
    driver: ServerDriver<SimEnv>,
    env: SimEnv,
    /// Messages delivered per open session, oldest first
    inboxes: BTreeMap<u64, Vec<Message>>,
    next_session_id: u64,
    observed: Vec<Observation>,
}

impl SimServer {
    /// Create a server whose randomness is seeded with `seed`.
    pub fn new(config: DriverConfig, seed: u64) -> Self {
        let env = SimEnv::with_seed(seed);
        let driver = ServerDriver::new(env.clone(), config);
        Self { driver, env, inboxes: BTreeMap::new(), next_session_id: 1, observed: Vec::new() }
    }

    /// Open a connection and return its session id.
    pub fn connect(&mut self) -> Result<u64, DriverError> {
        let session_id = self.next_session_id;
        self.next_session_id += 1;
        self.inboxes.insert(session_id, Vec::new());
        self.process(ServerEvent::ConnectionAccepted { session_id })?;
        Ok(session_id)
    }

    /// Close a connection from the client side.
    pub fn disconnect(&mut self, session_id: u64) -> Result<(), DriverError> {
        if self.inboxes.remove(&session_id).is_some() {
            self.process(ServerEvent::ConnectionClosed { session_id, reason: "client disconnect".to_string() })?;
        }
        Ok(())
    }

    /// Deliver a raw frame from `session_id`.
    pub fn send_frame(&mut self, session_id: u64, frame: Frame) -> Result<(), DriverError> {
        self.process(ServerEvent::FrameReceived { session_id, frame })
    }

    /// Deliver a message from `session_id`.
    pub fn send(&mut self, session_id: u64, message: &Message) -> Result<(), DriverError> {
        self.send_frame(session_id, message.to_frame()?)
    }

    /// Handshake, then log in as `username`. Returns the login reply.
    pub fn login(&mut self, session_id: u64, username: &str) -> Result<Message, DriverError> {
        self.send(session_id, &Message::new(ActionCode::Handshake, Controller::SYSTEM, WireObject::new()))?;
        let params = WireObject::new().with("zn", self.driver.config().zone.as_str()).with("un", username);
        self.send(session_id, &Message::new(ActionCode::Login, Controller::SYSTEM, params))?;

        self.inbox(session_id)
            .iter()
            .rev()
            .find(|m| m.action_code() == Some(ActionCode::Login))
            .cloned()
            .ok_or(DriverError::SessionNotFound(session_id))
    }

    /// Call an extension command as `session_id`.
    pub fn call(
        &mut self,
        session_id: u64,
        command: &str,
        params: WireObject,
        request_id: Option<i64>,
    ) -> Result<(), DriverError> {
        let call = ExtensionCall { command: command.to_string(), params, request_id };
        self.send(session_id, &call.into_message())
    }

    /// Place a bet; `auto` of `None` means no auto cash-out.
    pub fn bet(&mut self, session_id: u64, slot: i64, stake: f64, auto: Option<f64>) -> Result<(), DriverError> {
        let mut params = WireObject::new().with("bet", stake).with("betId", slot);
        if let Some(auto) = auto {
            params.insert("autoCashOut", auto);
        }
        self.call(session_id, "betHandler", params, None)
    }

    /// Run one tick at the current time.
    pub fn tick(&mut self) -> Result<(), DriverError> {
        self.process(ServerEvent::Tick)
    }

    /// Advance the clock by `by`, then tick.
    pub fn advance(&mut self, by: Duration) -> Result<(), DriverError> {
        self.env.advance(by);
        self.tick()
    }

    /// Tick every `step` until `duration` has passed.
    pub fn run_for(&mut self, duration: Duration, step: Duration) -> Result<(), DriverError> {
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            self.advance(step)?;
            elapsed += step;
        }
        Ok(())
    }

    /// Tick every `step` until the engine is in `phase`, giving up after
    /// `limit`. Returns whether the phase was reached.
    pub fn run_until(&mut self, phase: Phase, step: Duration, limit: Duration) -> Result<bool, DriverError> {
        let mut elapsed = Duration::ZERO;
        while self.phase() != phase {
            if elapsed >= limit {
                return Ok(false);
            }
            self.advance(step)?;
            elapsed += step;
        }
        Ok(true)
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.driver.engine().phase()
    }

    /// Time since the simulation started.
    pub fn elapsed(&self) -> Duration {
        use crashline_core::Environment as _;
        self.env.now()
    }

    /// Messages delivered to `session_id` so far.
    pub fn inbox(&self, session_id: u64) -> &[Message] {
        self.inboxes.get(&session_id).map_or(&[], Vec::as_slice)
    }

    /// Drain the inbox of `session_id`.
    pub fn take_inbox(&mut self, session_id: u64) -> Vec<Message> {
        self.inboxes.get_mut(&session_id).map(std::mem::take).unwrap_or_default()
    }

    /// Bodies of the extension messages named `command` in the inbox.
    pub fn responses(&self, session_id: u64, command: &str) -> Vec<&WireObject> {
        self.inbox(session_id)
            .iter()
            .filter(|m| m.payload.get_str("c") == Some(command))
            .filter_map(|m| m.payload.get_object("p"))
            .collect()
    }

    /// Whether the server still holds `session_id` open.
    pub fn is_connected(&self, session_id: u64) -> bool {
        self.inboxes.contains_key(&session_id) && self.driver.registry().session(session_id).is_some()
    }

    /// Balance of the player logged in on `session_id`.
    pub fn balance(&self, session_id: u64) -> Option<Money> {
        self.driver.registry().player_for_session(session_id).map(|p| p.balance())
    }

    /// Snapshot for invariant checking.
    pub fn snapshot(&self) -> SystemSnapshot {
        let engine = self.driver.engine();
        SystemSnapshot::capture(engine.round(), engine.phase(), self.driver.registry().players(), &self.observed)
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &ServerDriver<SimEnv> {
        &self.driver
    }

    fn process(&mut self, event: ServerEvent) -> Result<(), DriverError> {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let actions = self.driver.process_event(event)?;
            for action in actions {
                self.execute(action, &mut pending)?;
            }
        }

        let engine = self.driver.engine();
        self.observed.push(Observation::of(engine.round(), engine.phase()));
        Ok(())
    }

    fn execute(&mut self, action: ServerAction, pending: &mut VecDeque<ServerEvent>) -> Result<(), DriverError> {
        match action {
            ServerAction::SendToSession { session_id, frame } => {
                let message = decode(&frame)?;
                if let Some(inbox) = self.inboxes.get_mut(&session_id) {
                    inbox.push(message);
                }
            },
            ServerAction::Broadcast { frame } => {
                let message = decode(&frame)?;
                let targets: Vec<u64> = self.driver.broadcast_sessions().collect();
                for session_id in targets {
                    if let Some(inbox) = self.inboxes.get_mut(&session_id) {
                        inbox.push(message.clone());
                    }
                }
            },
            ServerAction::CloseConnection { session_id, reason } => {
                if self.inboxes.remove(&session_id).is_some() {
                    pending.push_back(ServerEvent::ConnectionClosed { session_id, reason });
                }
            },
            ServerAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
        Ok(())
    }
}

fn decode(frame: &Frame) -> Result<Message, DriverError> {
    let (root, _) = frame.root()?.into_result()?;
    Ok(Message::from_object(&root)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_get_sequential_ids() {
        let mut server = SimServer::new(DriverConfig::default(), 1);

        assert_eq!(server.connect().unwrap(), 1);
        assert_eq!(server.connect().unwrap(), 2);
        assert!(server.is_connected(1));
        assert_eq!(server.driver().connection_count(), 2);
    }

    #[test]
    fn login_reply_is_captured() {
        let mut server = SimServer::new(DriverConfig::default(), 1);
        let session = server.connect().unwrap();

        let reply = server.login(session, "dana").unwrap();

        assert_eq!(reply.payload.get_i64("rs"), Some(0));
        assert_eq!(server.responses(session, "init").len(), 1);
        assert_eq!(server.balance(session), Some(DriverConfig::default().engine.starting_balance));
    }

    #[test]
    fn connection_limit_closes_extra_session() {
        let config = DriverConfig { max_connections: 1, ..DriverConfig::default() };
        let mut server = SimServer::new(config, 1);

        let first = server.connect().unwrap();
        let second = server.connect().unwrap();

        assert!(server.is_connected(first));
        assert!(!server.is_connected(second));
    }

    #[test]
    fn disconnect_removes_session() {
        let mut server = SimServer::new(DriverConfig::default(), 1);
        let session = server.connect().unwrap();
        server.login(session, "erin").unwrap();

        server.disconnect(session).unwrap();

        assert!(!server.is_connected(session));
        assert_eq!(server.balance(session), None);
        assert!(server.inbox(session).is_empty());
    }

    #[test]
    fn every_event_is_observed() {
        let mut server = SimServer::new(DriverConfig::default(), 1);
        server.connect().unwrap();
        server.run_for(Duration::from_millis(500), Duration::from_millis(100)).unwrap();

        assert_eq!(server.snapshot().observed.len(), 6);
    }
}
