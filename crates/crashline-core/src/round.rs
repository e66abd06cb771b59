//! Round data: phases, bets, cash-outs, and the house-risk arithmetic.

use crate::{Money, PlayerId, RejectReason};

/// Round phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Pause before betting opens
    Ready,
    /// Betting window; bets and cancels accepted
    Bet,
    /// Multiplier rising; cash-outs accepted
    CashOut,
    /// Round over, summary on display
    Settle,
}

impl Phase {
    /// Id sent in `changeState`.
    pub fn wire_id(self) -> i32 {
        match self {
            Self::Ready => 0,
            Self::Bet => 1,
            Self::CashOut => 2,
            Self::Settle => 3,
        }
    }
}

/// One of a player's two bet slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    /// Slot 1
    First,
    /// Slot 2
    Second,
}

impl Slot {
    /// Slot for a client-supplied index.
    pub fn from_wire(index: i64) -> Result<Self, RejectReason> {
        match index {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            other => Err(RejectReason::InvalidSlot(other)),
        }
    }

    /// Client-facing index, 1 or 2.
    pub fn index(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

/// A realized cash-out.
#[derive(Debug, Clone, PartialEq)]
pub struct CashOutEvent {
    /// Who cashed out
    pub player: PlayerId,
    /// Which slot
    pub slot: Slot,
    /// Stake of the bet
    pub stake: Money,
    /// Multiplier locked in
    pub multiplier: f64,
    /// Amount credited
    pub payout: Money,
    /// Forced by the max-win cap
    pub max_win: bool,
}

/// A stake in the current round.
#[derive(Debug, Clone, PartialEq)]
pub struct Bet {
    /// Owner
    pub player: PlayerId,
    /// Owner's display name at placement
    pub username: String,
    /// Owner's currency
    pub currency: String,
    /// Slot
    pub slot: Slot,
    /// Stake debited at placement
    pub stake: Money,
    /// Threshold for automatic cash-out
    pub auto_cash_out: Option<f64>,
    /// Sequence number within the round
    pub round_bet_id: u32,
    /// Set exactly once when the bet is cashed out
    pub cash_out: Option<CashOutEvent>,
    /// Owner left before cashing out; the stake is lost
    pub abandoned: bool,
}

impl Bet {
    /// Still eligible for a cash-out.
    pub fn is_open(&self) -> bool {
        self.cash_out.is_none() && !self.abandoned
    }

    /// Counts toward house liability.
    ///
    /// Only real open bets do. A bot is paid only while the round can
    /// afford it, so its open bet never forces a settle.
    pub fn is_liability(&self) -> bool {
        self.is_open() && !self.player.is_bot()
    }

    fn holds(&self, player: PlayerId, slot: Slot) -> bool {
        self.player == player && self.slot == slot && !self.abandoned
    }
}

/// True when paying `liability` on top of `paid` stays within `stake`.
///
/// This is the house-risk test: aggregate payout for a round may never
/// exceed aggregate stake.
pub fn house_covers(stake: Money, paid: Money, liability: Money) -> bool {
    paid + liability <= stake
}

/// One Bet → CashOut → Settle cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    /// Strictly increasing id; 0 before the first round
    pub id: u64,
    /// Multiplier at which the round will crash
    pub crash_point: f64,
    /// Current multiplier, at least 1.0
    pub multiplier: f64,
    /// Wall-clock start, milliseconds
    pub started_at_ms: i64,
    /// Wall-clock end, set at settle
    pub ended_at_ms: Option<i64>,
    bets: Vec<Bet>,
    cash_outs: Vec<CashOutEvent>,
    total_stake: Money,
    total_paid: Money,
    next_bet_id: u32,
}

impl Round {
    /// Fresh round.
    pub fn new(id: u64, crash_point: f64, started_at_ms: i64) -> Self {
        Self {
            id,
            crash_point: crash_point.max(1.0),
            multiplier: 1.0,
            started_at_ms,
            ended_at_ms: None,
            bets: Vec::new(),
            cash_outs: Vec::new(),
            total_stake: Money::ZERO,
            total_paid: Money::ZERO,
            next_bet_id: 1,
        }
    }

    /// Bets in placement order.
    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }

    /// Cash-outs in the order they happened.
    pub fn cash_outs(&self) -> &[CashOutEvent] {
        &self.cash_outs
    }

    /// Sum of all stakes, bots included.
    pub fn total_stake(&self) -> Money {
        self.total_stake
    }

    /// Sum of all payouts, bots included. Never exceeds [`Self::total_stake`].
    pub fn total_paid(&self) -> Money {
        self.total_paid
    }

    /// Sum of payouts recomputed from the cash-out log.
    pub fn total_cashed_out(&self) -> Money {
        self.cash_outs.iter().map(|c| c.payout).sum()
    }

    /// Bets still open.
    pub fn open_count(&self) -> usize {
        self.bets.iter().filter(|b| b.is_open()).count()
    }

    /// Distinct players with a bet.
    pub fn player_count(&self) -> usize {
        let mut players: Vec<_> = self.bets.iter().map(|b| b.player).collect();
        players.sort_unstable();
        players.dedup();
        players.len()
    }

    /// Bet in `slot` for `player`, open or cashed out. Abandoned bets no
    /// longer hold their slot.
    pub fn bet(&self, player: PlayerId, slot: Slot) -> Option<&Bet> {
        self.bets.iter().find(|b| b.holds(player, slot))
    }

    /// Payout owed if every real open bet cashed out at `multiplier`.
    pub fn liability_at(&self, multiplier: f64) -> Money {
        self.bets.iter().filter(|b| b.is_liability()).map(|b| b.stake.scale(multiplier)).sum()
    }

    /// House-risk test for raising the multiplier to `multiplier`.
    pub fn covers(&self, multiplier: f64) -> bool {
        house_covers(self.total_stake, self.total_paid, self.liability_at(multiplier))
    }

    /// Record a new bet. The caller has already validated and debited it.
    pub(crate) fn place(&mut self, mut bet: Bet) -> &Bet {
        bet.round_bet_id = self.next_bet_id;
        self.next_bet_id += 1;
        self.total_stake = self.total_stake + bet.stake;
        let index = self.bets.len();
        self.bets.push(bet);
        &self.bets[index]
    }

    /// Remove a bet placed this round, returning it for refund.
    pub(crate) fn withdraw(&mut self, player: PlayerId, slot: Slot) -> Option<Bet> {
        let index = self.bets.iter().position(|b| b.holds(player, slot))?;
        let bet = self.bets.remove(index);
        self.total_stake = self.total_stake.saturating_sub(bet.stake);
        Some(bet)
    }

    /// Close an open bet at `multiplier`, paying at most `cap`.
    ///
    /// A bot's payout must fit in the margin left after every real open bet
    /// is counted at the current multiplier; otherwise the bot keeps riding.
    pub(crate) fn cash_out(
        &mut self,
        player: PlayerId,
        slot: Slot,
        multiplier: f64,
        cap: Money,
    ) -> Result<CashOutEvent, RejectReason> {
        let liability = self.liability_at(self.multiplier);
        let (stake_total, paid) = (self.total_stake, self.total_paid);
        let bet = self
            .bets
            .iter_mut()
            .find(|b| b.holds(player, slot))
            .ok_or(RejectReason::NoBet(slot.index()))?;
        if !bet.is_open() {
            return Err(RejectReason::AlreadyClosed(slot.index()));
        }

        let payout = bet.stake.scale(multiplier);
        let max_win = payout >= cap;
        let payout = if max_win { cap } else { payout };
        if player.is_bot() && !house_covers(stake_total, paid + payout, liability) {
            return Err(RejectReason::HouseLimit(payout));
        }

        let event = CashOutEvent { player, slot, stake: bet.stake, multiplier, payout, max_win };
        bet.cash_out = Some(event.clone());

        self.total_paid = self.total_paid + event.payout;
        self.cash_outs.push(event.clone());
        Ok(event)
    }

    /// Mark every open bet of `player` as abandoned.
    pub(crate) fn abandon(&mut self, player: PlayerId) -> usize {
        let mut count = 0;
        for bet in self.bets.iter_mut().filter(|b| b.player == player && b.is_open()) {
            bet.abandoned = true;
            count += 1;
        }
        count
    }
}
