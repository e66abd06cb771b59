//! Synthetic liquidity bots.
//!
//! Bots place real bets against the round so the bet list looks alive and
//! their stakes give the house room to pay real winners. They live only for
//! one round and never own a connection.

use std::time::Duration;

use crate::{BetRequest, EngineConfig, Environment, Player, PlayerId};

/// Offsets into the betting window at which bots join, ascending.
pub fn schedule<E: Environment>(env: &E, config: &EngineConfig) -> Vec<Duration> {
    let count = env.random_range(config.bots.min_count, config.bots.max_count);
    let window_ms = config.bet_duration.as_millis().max(1) as u64;
    let mut offsets: Vec<_> = (0..count)
        .map(|_| Duration::from_millis(env.random_range(0, window_ms - 1)))
        .collect();
    offsets.sort_unstable();
    offsets
}

/// A fresh bot and the bet it will place.
///
/// Returns `None` when no bot stakes are configured.
pub fn spawn<E: Environment>(env: &E, config: &EngineConfig, seq: u64) -> Option<(Player, BetRequest)> {
    let stakes = &config.bots.stakes;
    let last = u64::try_from(stakes.len()).ok()?.checked_sub(1)?;
    let stake = *stakes.get(env.random_range(0, last) as usize)?;

    let auto_cash_out = (env.random_unit() < config.bots.auto_chance).then(|| {
        let span = config.bots.auto_max - config.bots.auto_min;
        ((config.bots.auto_min + env.random_unit() * span) * 100.0).round() / 100.0
    });

    let id = PlayerId::bot(seq);
    let bot = Player::new(id, masked_name(env), config.currency.as_str(), stake);
    let request = BetRequest { slot: env.random_range(1, 2) as i64, stake: stake.to_f64(), auto_cash_out };
    Some((bot, request))
}

/// Names like `k***7`, the same shape clients show for masked real users.
fn masked_name<E: Environment>(env: &E) -> String {
    let first = char::from(b'a' + env.random_range(0, 25) as u8);
    let last = char::from(b'0' + env.random_range(0, 9) as u8);
    format!("{first}***{last}")
}
