//! Players, liquidity bots, and the book that holds them.

use std::{collections::BTreeMap, fmt};

use crate::{Money, RejectReason};

const BOT_BIT: u64 = 1 << 63;

/// Player identity. Real players use the connection's session id; bots set
/// the top bit so the two ranges never meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Identity of a connected player.
    pub const fn new(session_id: u64) -> Self {
        Self(session_id & !BOT_BIT)
    }

    /// Identity of the `seq`-th liquidity bot.
    pub const fn bot(seq: u64) -> Self {
        Self(seq | BOT_BIT)
    }

    /// True for liquidity bots.
    pub const fn is_bot(self) -> bool {
        self.0 & BOT_BIT != 0
    }

    /// Raw value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bot() { write!(f, "bot-{}", self.0 & !BOT_BIT) } else { write!(f, "{}", self.0) }
    }
}

/// A participant with a balance.
///
/// The balance is only reachable through [`Player::debit`] and
/// [`Player::credit`], and `debit` refuses to overdraw, so it can never go
/// negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Identity
    pub id: PlayerId,
    /// Display name
    pub username: String,
    /// Currency code
    pub currency: String,
    /// Avatar shown next to bets
    pub profile_image: String,
    /// Connected and logged in
    pub online: bool,
    balance: Money,
}

impl Player {
    /// New online player.
    pub fn new(id: PlayerId, username: impl Into<String>, currency: impl Into<String>, balance: Money) -> Self {
        Self {
            id,
            username: username.into(),
            currency: currency.into(),
            profile_image: String::new(),
            online: true,
            balance,
        }
    }

    /// Current balance.
    pub fn balance(&self) -> Money {
        self.balance
    }

    /// True for liquidity bots.
    pub fn is_bot(&self) -> bool {
        self.id.is_bot()
    }

    /// Take `amount` from the balance.
    pub fn debit(&mut self, amount: Money) -> Result<Money, RejectReason> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(RejectReason::InsufficientBalance { stake: amount, balance: self.balance })?;
        Ok(self.balance)
    }

    /// Add `amount` to the balance.
    pub fn credit(&mut self, amount: Money) -> Money {
        self.balance = self.balance + amount;
        self.balance
    }
}

/// Store of players the round engine settles against.
///
/// The engine never owns players; it borrows them through this trait so the
/// session registry stays the single place players live.
pub trait PlayerBook {
    /// Player by id.
    fn player(&self, id: PlayerId) -> Option<&Player>;

    /// Mutable player by id.
    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player>;

    /// Add a liquidity bot.
    fn admit_bot(&mut self, bot: Player);

    /// Remove every liquidity bot, returning how many were removed.
    fn retire_bots(&mut self) -> usize;

    /// Number of real players online.
    fn online_count(&self) -> usize;
}

/// In-memory [`PlayerBook`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBook {
    players: BTreeMap<PlayerId, Player>,
}

impl MemoryBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a player.
    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    /// Remove a player.
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    /// All players, bots included.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }
}

impl PlayerBook for MemoryBook {
    fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    fn admit_bot(&mut self, bot: Player) {
        self.players.insert(bot.id, bot);
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
