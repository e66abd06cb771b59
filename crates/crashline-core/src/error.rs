//! Error types for the round engine.
//!
//! Gameplay rejections are ordinary values: they become a response with a
//! non-200 code and leave balances and round state untouched.

use thiserror::Error;

use crate::{Money, Phase};

/// Why a gameplay command was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Command arrived outside the phase that accepts it
    #[error("not accepted during {actual:?}, requires {required:?}")]
    WrongPhase {
        /// Phase the command needs
        required: Phase,
        /// Phase the round is in
        actual: Phase,
    },

    /// Stake zero, negative, or not a number
    #[error("stake must be positive")]
    InvalidStake,

    /// Slot index other than 1 or 2
    #[error("invalid bet slot {0}")]
    InvalidSlot(i64),

    /// Slot already holds a bet this round
    #[error("bet slot {0} already in use")]
    SlotOccupied(u8),

    /// Stake outside the configured limits
    #[error("stake {stake} outside limits {min}..={max}")]
    StakeOutOfRange {
        /// Requested stake
        stake: Money,
        /// Minimum stake
        min: Money,
        /// Maximum stake
        max: Money,
    },

    /// Stake larger than the player's balance
    #[error("insufficient balance: stake {stake}, balance {balance}")]
    InsufficientBalance {
        /// Requested stake
        stake: Money,
        /// Available balance
        balance: Money,
    },

    /// Auto-cash-out threshold outside the configured range
    #[error("auto cash-out {0} outside allowed range")]
    InvalidAutoCashOut(f64),

    /// No bet in the slot this round
    #[error("no bet in slot {0}")]
    NoBet(u8),

    /// Bet already cashed out or abandoned
    #[error("bet in slot {0} is already closed")]
    AlreadyClosed(u8),

    /// Paying out would exceed the round's stake
    #[error("payout {0} not covered by the round")]
    HouseLimit(Money),

    /// Player not known to the registry
    #[error("unknown player")]
    UnknownPlayer,
}

impl RejectReason {
    /// Response code sent to the client. Success is 200.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidStake => 400,
            Self::InvalidSlot(_) => 401,
            Self::InsufficientBalance { .. } => 402,
            Self::StakeOutOfRange { .. } => 403,
            Self::NoBet(_) => 404,
            Self::WrongPhase { .. } => 405,
            Self::InvalidAutoCashOut(_) => 406,
            Self::HouseLimit(_) => 408,
            Self::SlotOccupied(_) => 409,
            Self::AlreadyClosed(_) => 410,
            Self::UnknownPlayer => 411,
        }
    }
}

/// Why an extension call could not be turned into a gameplay command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Command name not in the dispatch table
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    /// Parameters missing or of the wrong type
    #[error("malformed `{command}`: {reason}")]
    Malformed {
        /// Command name
        command: &'static str,
        /// What was wrong
        reason: &'static str,
    },
}

/// Invalid engine configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid engine config: {0}")]
pub struct ConfigError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let reasons = [
            RejectReason::InvalidStake,
            RejectReason::InvalidSlot(3),
            RejectReason::InsufficientBalance { stake: Money::ZERO, balance: Money::ZERO },
            RejectReason::StakeOutOfRange { stake: Money::ZERO, min: Money::ZERO, max: Money::ZERO },
            RejectReason::NoBet(1),
            RejectReason::WrongPhase { required: Phase::Bet, actual: Phase::Ready },
            RejectReason::InvalidAutoCashOut(0.5),
            RejectReason::SlotOccupied(1),
            RejectReason::AlreadyClosed(2),
            RejectReason::HouseLimit(Money::ZERO),
            RejectReason::UnknownPlayer,
        ];

        let mut codes: Vec<_> = reasons.iter().map(RejectReason::code).collect();
        codes.sort_unstable();
        codes.dedup();

        assert_eq!(codes.len(), reasons.len());
        assert!(!codes.contains(&200));
    }

    #[test]
    fn display() {
        let err = RejectReason::InsufficientBalance {
            stake: Money::from_major(20),
            balance: Money::from_minor(1050),
        };

        assert_eq!(err.to_string(), "insufficient balance: stake 20.00, balance 10.50");
    }
}
