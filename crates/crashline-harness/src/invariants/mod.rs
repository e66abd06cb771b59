//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must always hold during system execution.
//! Unlike example-based tests that check specific scenarios, invariants
//! verify behavioral properties across all possible execution paths.
//!
//! # Architecture
//!
//! The invariant system extracts observable state from the round engine and
//! session registry into a [`SystemSnapshot`], then runs registered
//! [`Invariant`] checks against it. Violations trigger panics with detailed
//! context for debugging.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = server.snapshot();
//! registry.assert_all(&snapshot, "after tick");
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    BetExclusivity, HouseRiskBound, MultiplierMonotonicity, NonNegativeBalances, RoundIdMonotonicity,
};
pub use snapshot::{
    BetSnapshot, CashOutSnapshot, Observation, PlayerSnapshot, RoundSnapshot, SystemSnapshot,
};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Which invariant a check enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantKind {
    /// No balance below zero
    NonNegativeBalances,
    /// Multiplier non-decreasing within a round
    MultiplierMonotonicity,
    /// Payouts bounded by stakes
    HouseRiskBound,
    /// Round ids strictly increase
    RoundIdMonotonicity,
    /// One bet per slot, one cash-out per bet
    BetExclusivity,
}

impl fmt::Display for InvariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NonNegativeBalances => "non-negative-balances",
            Self::MultiplierMonotonicity => "multiplier-monotonicity",
            Self::HouseRiskBound => "house-risk-bound",
            Self::RoundIdMonotonicity => "round-id-monotonicity",
            Self::BetExclusivity => "bet-exclusivity",
        };
        f.write_str(name)
    }
}

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Which invariant was violated.
    pub invariant: InvariantKind,
    /// Description of what went wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against system state.
pub trait Invariant: Send + Sync {
    /// Which invariant this is, for error reporting.
    fn kind(&self) -> InvariantKind;

    /// Check the invariant against the current state.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
///
/// Use [`InvariantRegistry::standard()`] for the five game invariants.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every game invariant.
    ///
    /// Includes:
    /// - [`NonNegativeBalances`]
    /// - [`MultiplierMonotonicity`]
    /// - [`HouseRiskBound`]
    /// - [`RoundIdMonotonicity`]
    /// - [`BetExclusivity`]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(NonNegativeBalances);
        registry.add(MultiplierMonotonicity);
        registry.add(HouseRiskBound);
        registry.add(RoundIdMonotonicity);
        registry.add(BetExclusivity);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> = self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    ///
    /// Use this in tests where you want immediate failure with context.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert!(!registry.is_empty());
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn empty_snapshot_passes_invariants() {
        let registry = InvariantRegistry::standard();
        let snapshot = SystemSnapshot::empty();
        assert!(registry.check_all(&snapshot).is_ok());
    }

    #[test]
    fn all_violations_are_reported() {
        let registry = InvariantRegistry::standard();
        let mut snapshot = SystemSnapshot::empty();
        snapshot.round.total_paid = 1;
        snapshot.players.push(PlayerSnapshot { id: 1, username: "x".into(), balance: -5, bot: false });

        let violations = registry.check_all(&snapshot).unwrap_err();

        let kinds: Vec<_> = violations.iter().map(|v| v.invariant).collect();
        assert_eq!(kinds, [InvariantKind::NonNegativeBalances, InvariantKind::HouseRiskBound]);
    }

    #[test]
    fn violation_display_names_invariant() {
        let violation = Violation { invariant: InvariantKind::BetExclusivity, message: "slot 0 twice".into() };
        assert_eq!(violation.to_string(), "bet-exclusivity: slot 0 twice");
    }
}
