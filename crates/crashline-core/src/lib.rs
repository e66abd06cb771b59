//! Crashline game logic.
//!
//! Everything here is Sans-IO: time and randomness come from an
//! [`Environment`], players are borrowed through a [`PlayerBook`], and every
//! outbound message is returned as an [`EngineAction`] for the caller to
//! deliver. The same engine runs under the tokio server and under the
//! deterministic simulation harness.
//!
//! # Components
//!
//! - [`RoundEngine`]: the Ready / Bet / CashOut / Settle state machine
//! - [`Round`] / [`Bet`]: per-round ledger and the house-risk arithmetic
//! - [`Player`] / [`PlayerBook`]: balances, debits, credits
//! - [`GameCommand`]: typed extension commands
//! - [`outbound`]: builders for every message the engine emits
//! - [`History`]: recent rounds and leaderboards
//! - [`Money`]: fixed-point amounts

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bots;
pub mod command;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod history;
pub mod money;
pub mod outbound;
pub mod player;
pub mod round;

pub use command::{BetRequest, GameCommand};
pub use config::{BotConfig, CrashPoint, EngineConfig, MultiplierCurve};
pub use engine::{EngineAction, RoundEngine};
pub use env::Environment;
pub use error::{CommandError, ConfigError, RejectReason};
pub use history::{History, RoundRecord, RoundSummary, WinRecord};
pub use money::Money;
pub use player::{MemoryBook, Player, PlayerBook, PlayerId};
pub use round::{Bet, CashOutEvent, Phase, Round, Slot, house_covers};
