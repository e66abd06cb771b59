//! Tuning constants for rounds, stakes, and liquidity bots.

use std::time::Duration;

use crate::{ConfigError, Money};

/// Payout multiplier as a function of time spent in the CashOut phase.
///
/// `steps = elapsed / step`, `seconds = steps × step`,
/// `multiplier = max(floor, base × e^(growth × seconds))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplierCurve {
    /// Scale factor applied to the exponential
    pub base: f64,
    /// Exponential growth rate per second
    pub growth: f64,
    /// Quantization step for elapsed time
    pub step: Duration,
    /// Lowest multiplier ever reported
    pub floor: f64,
}

impl Default for MultiplierCurve {
    fn default() -> Self {
        Self { base: 0.99, growth: 0.0752, step: Duration::from_millis(200), floor: 1.01 }
    }
}

impl MultiplierCurve {
    /// Multiplier after `elapsed` in the CashOut phase.
    pub fn at(&self, elapsed: Duration) -> f64 {
        let step_ms = self.step.as_millis().max(1);
        let steps = elapsed.as_millis() / step_ms;
        let seconds = steps as f64 * self.step.as_secs_f64();
        (self.base * (self.growth * seconds).exp()).max(self.floor)
    }
}

/// How each round's crash point is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrashPoint {
    /// `max(1, (1 - house_edge) / (1 - u))` for uniform `u`, floored to
    /// hundredths
    Random {
        /// Fraction kept by the house, in `[0, 1)`
        house_edge: f64,
    },
    /// Every round crashes at the same multiplier
    Fixed(f64),
}

impl CrashPoint {
    /// Crash multiplier for uniform sample `u` in `[0, 1)`.
    pub fn draw(&self, u: f64) -> f64 {
        match *self {
            Self::Random { house_edge } => {
                let raw = (1.0 - house_edge) / (1.0 - u.clamp(0.0, 0.999_999));
                ((raw * 100.0).floor() / 100.0).max(1.0)
            },
            Self::Fixed(at) => at.max(1.0),
        }
    }
}

/// Synthetic liquidity bot behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    /// Fewest bots per round
    pub min_count: u64,
    /// Most bots per round
    pub max_count: u64,
    /// Stakes bots choose from
    pub stakes: Vec<Money>,
    /// Chance a bot sets an auto-cash-out threshold
    pub auto_chance: f64,
    /// Lowest bot threshold
    pub auto_min: f64,
    /// Highest bot threshold
    pub auto_max: f64,
    /// Added to the real online count for display
    pub display_addend: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            min_count: 3,
            max_count: 12,
            stakes: [1, 2, 5, 10, 20, 50, 100].into_iter().map(Money::from_major).collect(),
            auto_chance: 0.8,
            auto_min: 1.10,
            auto_max: 5.00,
            display_addend: 187,
        }
    }
}

/// Round engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Pause between rounds
    pub ready_duration: Duration,
    /// Betting window
    pub bet_duration: Duration,
    /// Summary display time after the crash
    pub settle_duration: Duration,
    /// Longest CashOut phase before a forced settle
    pub max_flight_duration: Duration,
    /// Multiplier growth
    pub curve: MultiplierCurve,
    /// Crash point selection
    pub crash: CrashPoint,
    /// Smallest accepted stake
    pub min_bet: Money,
    /// Largest accepted stake
    pub max_bet: Money,
    /// Payout at which an open bet is cashed out automatically
    pub max_user_win: Money,
    /// Balance for newly logged-in players
    pub starting_balance: Money,
    /// Currency code shown to clients
    pub currency: String,
    /// Lowest auto-cash-out a player may set
    pub auto_cash_out_min: f64,
    /// Highest auto-cash-out a player may set
    pub auto_cash_out_max: f64,
    /// Liquidity bots
    pub bots: BotConfig,
    /// Entries kept per leaderboard
    pub leaderboard_size: usize,
    /// Settled rounds kept for `roundsInfo`
    pub history_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ready_duration: Duration::from_secs(2),
            bet_duration: Duration::from_secs(5),
            settle_duration: Duration::from_secs(3),
            max_flight_duration: Duration::from_secs(60),
            curve: MultiplierCurve::default(),
            crash: CrashPoint::Random { house_edge: 0.03 },
            min_bet: Money::from_minor(10),
            max_bet: Money::from_major(100),
            max_user_win: Money::from_major(10_000),
            starting_balance: Money::from_major(3_000),
            currency: "USD".to_owned(),
            auto_cash_out_min: 1.01,
            auto_cash_out_max: 100.0,
            bots: BotConfig::default(),
            leaderboard_size: 20,
            history_size: 30,
        }
    }
}

impl EngineConfig {
    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError(msg.to_owned()));

        if self.bet_duration.is_zero() || self.max_flight_duration.is_zero() {
            return fail("bet and flight durations must be non-zero");
        }
        if self.curve.step.is_zero() {
            return fail("multiplier step must be non-zero");
        }
        if !(self.curve.base > 0.0 && self.curve.growth >= 0.0 && self.curve.floor >= 1.0) {
            return fail("multiplier curve must be non-decreasing and start at or above 1.0");
        }
        if let CrashPoint::Random { house_edge } = self.crash {
            if !(0.0..1.0).contains(&house_edge) {
                return fail("house edge must be in [0, 1)");
            }
        }
        if self.min_bet.is_zero() || self.min_bet > self.max_bet {
            return fail("bet limits must satisfy 0 < min <= max");
        }
        if !(self.auto_cash_out_min >= 1.0 && self.auto_cash_out_min <= self.auto_cash_out_max) {
            return fail("auto cash-out range must satisfy 1.0 <= min <= max");
        }
        if self.bots.min_count > self.bots.max_count {
            return fail("bot count range is empty");
        }
        if self.bots.max_count > 0 && self.bots.stakes.is_empty() {
            return fail("bots need at least one stake");
        }
        Ok(())
    }
}
