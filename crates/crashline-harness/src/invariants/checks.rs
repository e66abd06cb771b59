//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use super::{Invariant, InvariantKind, InvariantResult, SystemSnapshot, Violation};

/// Wire id of the CashOut phase.
const CASH_OUT: i32 = 2;

/// No player balance is ever negative.
pub struct NonNegativeBalances;

impl Invariant for NonNegativeBalances {
    fn kind(&self) -> InvariantKind {
        InvariantKind::NonNegativeBalances
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        match state.players.iter().find(|p| p.balance < 0) {
            Some(player) => Err(Violation {
                invariant: self.kind(),
                message: format!("player {} ({}): balance {}", player.id, player.username, player.balance),
            }),
            None => Ok(()),
        }
    }
}

/// Within one round's rising phase the multiplier never decreases, and it
/// is never below 1.0.
pub struct MultiplierMonotonicity;

impl Invariant for MultiplierMonotonicity {
    fn kind(&self) -> InvariantKind {
        InvariantKind::MultiplierMonotonicity
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if let Some(low) = state.observed.iter().find(|o| o.multiplier < 1.0) {
            return Err(Violation {
                invariant: self.kind(),
                message: format!("round {}: multiplier {} below 1.0", low.round_id, low.multiplier),
            });
        }

        for window in state.observed.windows(2) {
            let (before, after) = (&window[0], &window[1]);
            if before.round_id == after.round_id
                && before.phase == CASH_OUT
                && after.multiplier < before.multiplier
            {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!(
                        "round {}: multiplier decreased {} → {}",
                        after.round_id, before.multiplier, after.multiplier
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Payouts of the current round never exceed its stakes.
///
/// Both sides are summed from the bet and cash-out records, bots included,
/// and must agree with the round's running totals.
pub struct HouseRiskBound;

impl Invariant for HouseRiskBound {
    fn kind(&self) -> InvariantKind {
        InvariantKind::HouseRiskBound
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let round = &state.round;
        let fail = |message: String| Err(Violation { invariant: self.kind(), message });

        let staked: u64 = round.bets.iter().map(|b| b.stake).sum();
        let paid: u64 = round.cash_outs.iter().map(|c| c.payout).sum();
        if paid > staked {
            return fail(format!("round {}: paid {paid} of stake {staked}", round.id));
        }
        if staked != round.total_stake || paid != round.total_paid {
            return fail(format!(
                "round {}: totals stake {} paid {} disagree with records stake {staked} paid {paid}",
                round.id, round.total_stake, round.total_paid
            ));
        }
        Ok(())
    }
}

/// Round ids never go backwards, and the live round is the newest one.
pub struct RoundIdMonotonicity;

impl Invariant for RoundIdMonotonicity {
    fn kind(&self) -> InvariantKind {
        InvariantKind::RoundIdMonotonicity
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for window in state.observed.windows(2) {
            if window[1].round_id < window[0].round_id {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("round id decreased {} → {}", window[0].round_id, window[1].round_id),
                });
            }
        }
        if let Some(last) = state.observed.last() {
            if state.round.id < last.round_id {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("live round {} older than observed {}", state.round.id, last.round_id),
                });
            }
        }
        Ok(())
    }
}

/// One live bet per player and slot, cashed out at most once, and never
/// both cashed out and abandoned. An abandoned bet gives up its slot.
pub struct BetExclusivity;

impl Invariant for BetExclusivity {
    fn kind(&self) -> InvariantKind {
        InvariantKind::BetExclusivity
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let round = &state.round;
        let fail = |message: String| Err(Violation { invariant: self.kind(), message });

        let mut slots = HashSet::new();
        for bet in &round.bets {
            if !bet.abandoned && !slots.insert((bet.player, bet.slot)) {
                return fail(format!("round {}: player {} holds slot {} twice", round.id, bet.player, bet.slot));
            }
            if bet.abandoned && bet.cashed_out_at.is_some() {
                return fail(format!(
                    "round {}: player {} slot {} both abandoned and cashed out",
                    round.id, bet.player, bet.slot
                ));
            }
        }

        let mut cashed = HashSet::new();
        for event in &round.cash_outs {
            if !cashed.insert((event.player, event.slot)) {
                return fail(format!(
                    "round {}: player {} slot {} cashed out twice",
                    round.id, event.player, event.slot
                ));
            }
            let settled = round
                .bets
                .iter()
                .any(|b| b.player == event.player && b.slot == event.slot && b.cashed_out_at.is_some());
            if !settled {
                return fail(format!(
                    "round {}: cash-out for player {} slot {} has no settled bet",
                    round.id, event.player, event.slot
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::{BetSnapshot, CashOutSnapshot, Observation, PlayerSnapshot};

    fn observation(round_id: u64, phase: i32, multiplier: f64) -> Observation {
        Observation { round_id, phase, multiplier }
    }

    fn bet(player: u64, slot: u8) -> BetSnapshot {
        BetSnapshot { player, slot, stake: 1000, cashed_out_at: None, abandoned: false }
    }

    #[test]
    fn negative_balance_detected() {
        let mut state = SystemSnapshot::empty();
        state.players.push(PlayerSnapshot { id: 1, username: "a".into(), balance: 10, bot: false });
        assert!(NonNegativeBalances.check(&state).is_ok());

        state.players.push(PlayerSnapshot { id: 2, username: "b".into(), balance: -1, bot: false });
        let violation = NonNegativeBalances.check(&state).unwrap_err();
        assert_eq!(violation.invariant, InvariantKind::NonNegativeBalances);
    }

    #[test]
    fn multiplier_drop_within_round_detected() {
        let mut state = SystemSnapshot::empty();
        state.observed = vec![observation(1, 2, 1.2), observation(1, 2, 1.3), observation(1, 3, 1.3)];
        assert!(MultiplierMonotonicity.check(&state).is_ok());

        state.observed.push(observation(1, 3, 1.1));
        // Settle holds its value; only CashOut readings are ordered
        assert!(MultiplierMonotonicity.check(&state).is_ok());

        state.observed = vec![observation(1, 2, 1.5), observation(1, 2, 1.4)];
        assert!(MultiplierMonotonicity.check(&state).is_err());
    }

    #[test]
    fn new_round_resets_multiplier() {
        let mut state = SystemSnapshot::empty();
        state.observed = vec![observation(1, 2, 3.0), observation(2, 1, 1.0)];
        assert!(MultiplierMonotonicity.check(&state).is_ok());
    }

    fn cash_out(player: u64, slot: u8, payout: u64) -> CashOutSnapshot {
        CashOutSnapshot { player, slot, multiplier: 1.5, payout }
    }

    #[test]
    fn overpaid_round_detected() {
        let mut state = SystemSnapshot::empty();
        state.round.bets = vec![bet(1, 1), BetSnapshot { player: 1 << 63, ..bet(0, 1) }];
        state.round.cash_outs = vec![cash_out(1, 1, 1500), cash_out(1 << 63, 1, 500)];
        state.round.total_stake = 2000;
        state.round.total_paid = 2000;
        assert!(HouseRiskBound.check(&state).is_ok());

        // a bot payout counts against the same stake as everyone else's
        state.round.cash_outs[1].payout = 501;
        state.round.total_paid = 2001;
        assert!(HouseRiskBound.check(&state).is_err());
    }

    #[test]
    fn totals_must_match_records() {
        let mut state = SystemSnapshot::empty();
        state.round.bets = vec![bet(1, 1)];
        state.round.cash_outs = vec![cash_out(1, 1, 900)];
        state.round.total_stake = 1000;
        state.round.total_paid = 0;

        assert!(HouseRiskBound.check(&state).is_err());
    }

    #[test]
    fn round_id_regression_detected() {
        let mut state = SystemSnapshot::empty();
        state.round.id = 3;
        state.observed = vec![observation(2, 0, 1.0), observation(3, 1, 1.0)];
        assert!(RoundIdMonotonicity.check(&state).is_ok());

        state.round.id = 2;
        assert!(RoundIdMonotonicity.check(&state).is_err());
    }

    #[test]
    fn duplicate_slot_detected() {
        let mut state = SystemSnapshot::empty();
        state.round.bets = vec![bet(1, 0), bet(1, 1), bet(2, 0)];
        assert!(BetExclusivity.check(&state).is_ok());

        state.round.bets.push(bet(1, 0));
        assert!(BetExclusivity.check(&state).is_err());

        // the first holder left, so the slot was free again
        state.round.bets[0].abandoned = true;
        assert!(BetExclusivity.check(&state).is_ok());
    }

    #[test]
    fn double_cash_out_detected() {
        let mut state = SystemSnapshot::empty();
        let mut settled = bet(1, 0);
        settled.cashed_out_at = Some(1.5);
        state.round.bets = vec![settled];
        let event = CashOutSnapshot { player: 1, slot: 0, multiplier: 1.5, payout: 1500 };
        state.round.cash_outs = vec![event.clone()];
        assert!(BetExclusivity.check(&state).is_ok());

        state.round.cash_outs.push(event);
        assert!(BetExclusivity.check(&state).is_err());
    }

    #[test]
    fn orphan_cash_out_detected() {
        let mut state = SystemSnapshot::empty();
        state.round.bets = vec![bet(1, 0)];
        state.round.cash_outs = vec![CashOutSnapshot { player: 1, slot: 0, multiplier: 2.0, payout: 2000 }];
        assert!(BetExclusivity.check(&state).is_err());
    }
}
