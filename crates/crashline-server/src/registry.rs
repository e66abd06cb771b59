//! Session registry: connections, logged-in players, and liquidity bots.
//!
//! The registry is the single home of every [`Player`]. It maps sessions to
//! players and back, so unicasts can be routed and broadcasts fanned out,
//! and it lends players to the round engine through [`PlayerBook`].
//!
//! Bots live in the same player table but never have a session, which keeps
//! them out of every send path.

use std::collections::{BTreeMap, HashMap};

use crashline_core::{Player, PlayerBook, PlayerId};
use thiserror::Error;

/// Per-connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Player bound by a successful login
    pub player: Option<PlayerId>,
    /// Handshake completed
    pub handshaken: bool,
}

/// Why a login was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Session is not registered
    #[error("session not found: {0}")]
    SessionNotFound(u64),
    /// Another session is logged in under this name
    #[error("username `{0}` already online")]
    UsernameTaken(String),
    /// Session already has a player
    #[error("session already logged in as {0}")]
    AlreadyLoggedIn(PlayerId),
}

/// Registry of sessions and players.
///
/// Maintains three indexes kept consistent by every mutation:
/// - session → session info (for routing and cleanup)
/// - player → session (for unicast)
/// - username → player (one online session per name)
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<u64, SessionInfo>,
    players: BTreeMap<PlayerId, Player>,
    player_sessions: HashMap<PlayerId, u64>,
    usernames: HashMap<String, PlayerId>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. Returns `false` if the id is in use.
    pub fn register_session(&mut self, session_id: u64) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }
        self.sessions.insert(session_id, SessionInfo::default());
        true
    }

    /// Remove a connection and the player logged in on it.
    pub fn unregister_session(&mut self, session_id: u64) -> Option<(SessionInfo, Option<Player>)> {
        let info = self.sessions.remove(&session_id)?;
        let player = info.player.and_then(|id| self.remove_player(id));
        Some((info, player))
    }

    /// Session metadata.
    pub fn session(&self, session_id: u64) -> Option<&SessionInfo> {
        self.sessions.get(&session_id)
    }

    /// Mark the handshake done. Returns `false` for unknown sessions.
    pub fn mark_handshaken(&mut self, session_id: u64) -> bool {
        self.sessions.get_mut(&session_id).map(|info| info.handshaken = true).is_some()
    }

    /// Bind `player` to `session_id`.
    ///
    /// # Errors
    ///
    /// - `LoginError::SessionNotFound` if the session is not registered
    /// - `LoginError::AlreadyLoggedIn` if the session already has a player
    /// - `LoginError::UsernameTaken` if the name is online elsewhere
    pub fn login(&mut self, session_id: u64, player: Player) -> Result<&Player, LoginError> {
        let info = self.sessions.get(&session_id).ok_or(LoginError::SessionNotFound(session_id))?;
        if let Some(existing) = info.player {
            return Err(LoginError::AlreadyLoggedIn(existing));
        }
        if self.usernames.contains_key(&player.username) {
            return Err(LoginError::UsernameTaken(player.username));
        }

        let id = player.id;
        self.usernames.insert(player.username.clone(), id);
        self.player_sessions.insert(id, session_id);
        if let Some(info) = self.sessions.get_mut(&session_id) {
            info.player = Some(id);
        }
        Ok(self.players.entry(id).or_insert(player))
    }

    /// Unbind and remove the player on `session_id`, keeping the session.
    pub fn logout(&mut self, session_id: u64) -> Option<Player> {
        let id = self.sessions.get_mut(&session_id)?.player.take()?;
        self.remove_player(id)
    }

    fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        self.player_sessions.remove(&id);
        self.usernames.remove(&player.username);
        Some(player)
    }

    /// Player logged in on `session_id`.
    pub fn player_for_session(&self, session_id: u64) -> Option<&Player> {
        self.sessions.get(&session_id)?.player.and_then(|id| self.players.get(&id))
    }

    /// Session a player is connected on. Always `None` for bots.
    pub fn session_for_player(&self, id: PlayerId) -> Option<u64> {
        self.player_sessions.get(&id).copied()
    }

    /// True when a player with this name is logged in.
    pub fn is_username_online(&self, username: &str) -> bool {
        self.usernames.contains_key(username)
    }

    /// Sessions that receive broadcasts: logged-in, online, real players.
    pub fn broadcast_sessions(&self) -> impl Iterator<Item = u64> + '_ {
        self.player_sessions
            .iter()
            .filter(|(id, _)| self.players.get(id).is_some_and(|p| p.online && !p.is_bot()))
            .map(|(_, session)| *session)
    }

    /// Every player, bots included.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of registered connections.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl PlayerBook for SessionRegistry {
    fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    fn admit_bot(&mut self, bot: Player) {
        if bot.is_bot() {
            self.players.insert(bot.id, bot);
        }
    }

    fn retire_bots(&mut self) -> usize {
        let before = self.players.len();
        self.players.retain(|id, _| !id.is_bot());
        before - self.players.len()
    }

    fn online_count(&self) -> usize {
        self.players.values().filter(|p| p.online && !p.is_bot()).count()
    }
}

#[cfg(test)]
mod tests {
    use crashline_core::Money;

    use super::*;

    fn player(session: u64, name: &str) -> Player {
        Player::new(PlayerId::new(session), name, "USD", Money::from_major(100))
    }

    #[test]
    fn register_and_unregister() {
        let mut registry = SessionRegistry::new();

        assert!(registry.register_session(1));
        assert!(!registry.register_session(1));
        assert_eq!(registry.session_count(), 1);

        let (info, player) = registry.unregister_session(1).unwrap();
        assert_eq!(info, SessionInfo::default());
        assert!(player.is_none());
        assert!(registry.unregister_session(1).is_none());
    }

    #[test]
    fn login_binds_both_directions() {
        let mut registry = SessionRegistry::new();
        registry.register_session(7);

        registry.login(7, player(7, "ann")).unwrap();

        let id = PlayerId::new(7);
        assert_eq!(registry.player_for_session(7).unwrap().username, "ann");
        assert_eq!(registry.session_for_player(id), Some(7));
        assert!(registry.is_username_online("ann"));
        assert_eq!(registry.broadcast_sessions().collect::<Vec<_>>(), [7]);
    }

    #[test]
    fn duplicate_username_rejected() {
        let mut registry = SessionRegistry::new();
        registry.register_session(1);
        registry.register_session(2);
        registry.login(1, player(1, "ann")).unwrap();

        let err = registry.login(2, player(2, "ann")).unwrap_err();

        assert_eq!(err, LoginError::UsernameTaken("ann".into()));
        assert!(registry.player_for_session(2).is_none());
    }

    #[test]
    fn second_login_on_same_session_rejected() {
        let mut registry = SessionRegistry::new();
        registry.register_session(1);
        registry.login(1, player(1, "ann")).unwrap();

        let err = registry.login(1, player(1, "bob")).unwrap_err();

        assert_eq!(err, LoginError::AlreadyLoggedIn(PlayerId::new(1)));
    }

    #[test]
    fn unregister_removes_player_and_name() {
        let mut registry = SessionRegistry::new();
        registry.register_session(1);
        registry.login(1, player(1, "ann")).unwrap();

        let (_, removed) = registry.unregister_session(1).unwrap();

        assert_eq!(removed.unwrap().username, "ann");
        assert!(!registry.is_username_online("ann"));
        assert!(registry.player(PlayerId::new(1)).is_none());
        assert_eq!(registry.broadcast_sessions().count(), 0);
    }

    #[test]
    fn logout_keeps_session() {
        let mut registry = SessionRegistry::new();
        registry.register_session(1);
        registry.login(1, player(1, "ann")).unwrap();

        assert!(registry.logout(1).is_some());

        assert!(registry.session(1).is_some());
        assert!(registry.player_for_session(1).is_none());
        registry.login(1, player(1, "ann")).unwrap();
    }

    #[test]
    fn bots_never_receive_broadcasts() {
        let mut registry = SessionRegistry::new();
        registry.register_session(1);
        registry.login(1, player(1, "ann")).unwrap();

        registry.admit_bot(Player::new(PlayerId::bot(1), "b***", "USD", Money::from_major(5)));

        assert_eq!(registry.online_count(), 1);
        assert_eq!(registry.broadcast_sessions().count(), 1);
        assert!(registry.session_for_player(PlayerId::bot(1)).is_none());
        assert_eq!(registry.retire_bots(), 1);
        assert_eq!(registry.players().count(), 1);
    }

    #[test]
    fn admit_bot_ignores_real_ids() {
        let mut registry = SessionRegistry::new();

        registry.admit_bot(player(3, "ann"));

        assert_eq!(registry.players().count(), 0);
    }
}
