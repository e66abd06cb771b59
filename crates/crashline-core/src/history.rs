//! Settled rounds and leaderboards.

use std::collections::VecDeque;

use crate::{Bet, Money, Round};

/// Frozen copy of a settled round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    /// Round id
    pub round_id: u64,
    /// Multiplier the round settled at
    pub multiplier: f64,
    /// Wall-clock start, milliseconds
    pub started_at_ms: i64,
    /// Wall-clock end, milliseconds
    pub ended_at_ms: i64,
    /// Every bet with its final outcome
    pub bets: Vec<Bet>,
}

impl RoundSummary {
    /// Freeze `round`, which must have ended.
    pub fn from_round(round: &Round) -> Self {
        Self {
            round_id: round.id,
            multiplier: round.multiplier,
            started_at_ms: round.started_at_ms,
            ended_at_ms: round.ended_at_ms.unwrap_or(round.started_at_ms),
            bets: round.bets().to_vec(),
        }
    }
}

/// Notable cash-out.
#[derive(Debug, Clone, PartialEq)]
pub struct WinRecord {
    /// Round it happened in
    pub round_id: u64,
    /// Winner's display name
    pub username: String,
    /// Currency
    pub currency: String,
    /// Stake
    pub stake: Money,
    /// Amount won
    pub payout: Money,
    /// Multiplier locked in
    pub multiplier: f64,
    /// Round crash multiplier
    pub round_multiplier: f64,
    /// When the round ended
    pub ended_at_ms: i64,
}

/// Round outcome for history lists.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    /// Round id
    pub round_id: u64,
    /// Crash multiplier
    pub multiplier: f64,
    /// Wall-clock start
    pub started_at_ms: i64,
    /// Wall-clock end
    pub ended_at_ms: i64,
}

/// Bounded history of rounds and wins.
#[derive(Debug, Clone)]
pub struct History {
    limit: usize,
    recent_limit: usize,
    recent: VecDeque<RoundRecord>,
    top_rounds: Vec<RoundRecord>,
    top_wins: Vec<WinRecord>,
    huge_wins: Vec<WinRecord>,
}

impl History {
    /// Empty history keeping `limit` leaderboard entries and `recent_limit`
    /// recent rounds.
    pub fn new(limit: usize, recent_limit: usize) -> Self {
        Self {
            limit,
            recent_limit,
            recent: VecDeque::with_capacity(recent_limit),
            top_rounds: Vec::new(),
            top_wins: Vec::new(),
            huge_wins: Vec::new(),
        }
    }

    /// Fold a settled round into every list.
    pub fn record(&mut self, summary: &RoundSummary) {
        let record = RoundRecord {
            round_id: summary.round_id,
            multiplier: summary.multiplier,
            started_at_ms: summary.started_at_ms,
            ended_at_ms: summary.ended_at_ms,
        };

        if self.recent_limit > 0 {
            if self.recent.len() == self.recent_limit {
                self.recent.pop_back();
            }
            self.recent.push_front(record.clone());
        }
        insert_ranked(&mut self.top_rounds, record, self.limit, |r| r.multiplier);

        for bet in &summary.bets {
            let Some(cash_out) = &bet.cash_out else { continue };
            let win = WinRecord {
                round_id: summary.round_id,
                username: bet.username.clone(),
                currency: bet.currency.clone(),
                stake: bet.stake,
                payout: cash_out.payout,
                multiplier: cash_out.multiplier,
                round_multiplier: summary.multiplier,
                ended_at_ms: summary.ended_at_ms,
            };
            insert_ranked(&mut self.huge_wins, win.clone(), self.limit, |w| w.multiplier);
            insert_ranked(&mut self.top_wins, win, self.limit, |w| w.payout.to_f64());
        }
    }

    /// Most recent rounds, newest first.
    pub fn recent(&self) -> impl Iterator<Item = &RoundRecord> {
        self.recent.iter()
    }

    /// Rounds with the highest crash multiplier.
    pub fn top_rounds(&self) -> &[RoundRecord] {
        &self.top_rounds
    }

    /// Largest payouts.
    pub fn top_wins(&self) -> &[WinRecord] {
        &self.top_wins
    }

    /// Highest cash-out multipliers.
    pub fn huge_wins(&self) -> &[WinRecord] {
        &self.huge_wins
    }
}

/// Insert keeping `list` sorted descending by `key` and at most `limit`
/// long. Ties keep the earlier entry first.
fn insert_ranked<T>(list: &mut Vec<T>, item: T, limit: usize, key: impl Fn(&T) -> f64) {
    let score = key(&item);
    let index = list.partition_point(|existing| key(existing) >= score);
    if index >= limit {
        return;
    }
    list.insert(index, item);
    list.truncate(limit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CashOutEvent, PlayerId, Slot};

    fn summary(round_id: u64, multiplier: f64, wins: &[(u64, f64)]) -> RoundSummary {
        let bets = wins
            .iter()
            .enumerate()
            .map(|(i, &(stake, at))| {
                let stake = Money::from_major(stake);
                Bet {
                    player: PlayerId::new(i as u64),
                    username: format!("p{i}"),
                    currency: "USD".to_owned(),
                    slot: Slot::First,
                    stake,
                    auto_cash_out: None,
                    round_bet_id: i as u32 + 1,
                    cash_out: Some(CashOutEvent {
                        player: PlayerId::new(i as u64),
                        slot: Slot::First,
                        stake,
                        multiplier: at,
                        payout: stake.scale(at),
                        max_win: false,
                    }),
                    abandoned: false,
                }
            })
            .collect();
        RoundSummary { round_id, multiplier, started_at_ms: 0, ended_at_ms: 1, bets }
    }

    #[test]
    fn leaderboards_sorted_and_capped() {
        let mut history = History::new(2, 10);
        history.record(&summary(1, 3.0, &[(10, 2.0), (100, 1.5)]));
        history.record(&summary(2, 9.0, &[(1, 8.0)]));
        history.record(&summary(3, 1.2, &[]));

        let rounds: Vec<_> = history.top_rounds().iter().map(|r| r.round_id).collect();
        assert_eq!(rounds, [2, 1]);

        let payouts: Vec<_> = history.top_wins().iter().map(|w| w.payout).collect();
        assert_eq!(payouts, [Money::from_major(150), Money::from_major(20)]);

        let multipliers: Vec<_> = history.huge_wins().iter().map(|w| w.multiplier).collect();
        assert_eq!(multipliers, [8.0, 2.0]);
    }

    #[test]
    fn recent_is_newest_first_and_bounded() {
        let mut history = History::new(5, 2);
        for id in 1..=3 {
            history.record(&summary(id, 1.0 + id as f64, &[]));
        }

        let ids: Vec<_> = history.recent().map(|r| r.round_id).collect();
        assert_eq!(ids, [3, 2]);
    }
}
