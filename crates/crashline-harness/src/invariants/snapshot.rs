//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture round, bet book, and player balances at one instant,
//! plus the `(round, multiplier)` observations recorded so far. Invariants
//! operate on snapshots rather than live state, so every check sees one
//! consistent view.
//!
//! Amounts are minor units. Balances are signed so a corrupted ledger
//! shows up as a negative number instead of wrapping.

use crashline_core::{Bet, CashOutEvent, Phase, Player, Round};
use serde::Serialize;

/// Snapshot of the whole game.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemSnapshot {
    /// The round in progress.
    pub round: RoundSnapshot,
    /// Every player known to the server, bots included, ordered by id.
    pub players: Vec<PlayerSnapshot>,
    /// Observations recorded after each simulated step, oldest first.
    pub observed: Vec<Observation>,
}

impl SystemSnapshot {
    /// Snapshot before any round has started.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture live state.
    pub fn capture<'a>(
        round: &Round,
        phase: Phase,
        players: impl IntoIterator<Item = &'a Player>,
        observed: &[Observation],
    ) -> Self {
        let mut players: Vec<_> = players.into_iter().map(PlayerSnapshot::from_player).collect();
        players.sort_by_key(|p| p.id);
        Self { round: RoundSnapshot::from_round(round, phase), players, observed: observed.to_vec() }
    }

    /// Balance of player `id`, if present.
    pub fn balance(&self, id: u64) -> Option<i64> {
        self.players.iter().find(|p| p.id == id).map(|p| p.balance)
    }
}

/// One `(round, phase, multiplier)` reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    /// Round id.
    pub round_id: u64,
    /// Wire id of the phase.
    pub phase: i32,
    /// Multiplier at the time.
    pub multiplier: f64,
}

impl Observation {
    /// Read the current round.
    pub fn of(round: &Round, phase: Phase) -> Self {
        Self { round_id: round.id, phase: phase.wire_id(), multiplier: round.multiplier }
    }
}

/// Snapshot of the round in progress.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoundSnapshot {
    /// Round id; 0 before the first round.
    pub id: u64,
    /// Wire id of the phase.
    pub phase: i32,
    /// Current multiplier.
    pub multiplier: f64,
    /// Multiplier the round will crash at.
    pub crash_point: f64,
    /// Sum of stakes, bots included.
    pub total_stake: u64,
    /// Sum of payouts, bots included.
    pub total_paid: u64,
    /// Bets in placement order.
    pub bets: Vec<BetSnapshot>,
    /// Cash-outs in the order they happened.
    pub cash_outs: Vec<CashOutSnapshot>,
}

impl RoundSnapshot {
    /// Capture a round.
    pub fn from_round(round: &Round, phase: Phase) -> Self {
        Self {
            id: round.id,
            phase: phase.wire_id(),
            multiplier: round.multiplier,
            crash_point: round.crash_point,
            total_stake: round.total_stake().minor(),
            total_paid: round.total_paid().minor(),
            bets: round.bets().iter().map(BetSnapshot::from_bet).collect(),
            cash_outs: round.cash_outs().iter().map(CashOutSnapshot::from_event).collect(),
        }
    }
}

/// Snapshot of one bet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetSnapshot {
    /// Owner.
    pub player: u64,
    /// Slot index.
    pub slot: u8,
    /// Stake.
    pub stake: u64,
    /// Multiplier locked in, once cashed out.
    pub cashed_out_at: Option<f64>,
    /// Owner left with the bet open.
    pub abandoned: bool,
}

impl BetSnapshot {
    fn from_bet(bet: &Bet) -> Self {
        Self {
            player: bet.player.value(),
            slot: bet.slot.index(),
            stake: bet.stake.minor(),
            cashed_out_at: bet.cash_out.as_ref().map(|c| c.multiplier),
            abandoned: bet.abandoned,
        }
    }
}

/// Snapshot of one cash-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashOutSnapshot {
    /// Who cashed out.
    pub player: u64,
    /// Slot index.
    pub slot: u8,
    /// Multiplier locked in.
    pub multiplier: f64,
    /// Amount credited.
    pub payout: u64,
}

impl CashOutSnapshot {
    fn from_event(event: &CashOutEvent) -> Self {
        Self {
            player: event.player.value(),
            slot: event.slot.index(),
            multiplier: event.multiplier,
            payout: event.payout.minor(),
        }
    }
}

/// Snapshot of one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    /// Player id.
    pub id: u64,
    /// Display name.
    pub username: String,
    /// Balance in minor units.
    pub balance: i64,
    /// Synthetic liquidity player.
    pub bot: bool,
}

impl PlayerSnapshot {
    /// Capture a player.
    pub fn from_player(player: &Player) -> Self {
        Self {
            id: player.id.value(),
            username: player.username.clone(),
            balance: i64::try_from(player.balance().minor()).unwrap_or(i64::MAX),
            bot: player.is_bot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crashline_core::{Money, PlayerId};

    use super::*;

    #[test]
    fn empty_snapshot() {
        let snapshot = SystemSnapshot::empty();
        assert!(snapshot.players.is_empty());
        assert_eq!(snapshot.round.id, 0);
    }

    #[test]
    fn capture_sorts_players() {
        let round = Round::new(4, 2.0, 0);
        let a = Player::new(PlayerId::new(9), "late", "USD", Money::from_major(1));
        let b = Player::new(PlayerId::new(2), "early", "USD", Money::from_minor(250));

        let snapshot = SystemSnapshot::capture(&round, Phase::Bet, [&a, &b], &[]);

        assert_eq!(snapshot.round.id, 4);
        assert_eq!(snapshot.round.phase, 1);
        assert_eq!(snapshot.players[0].username, "early");
        assert_eq!(snapshot.balance(2), Some(250));
        assert_eq!(snapshot.balance(9), Some(100));
        assert_eq!(snapshot.balance(3), None);
    }
}
