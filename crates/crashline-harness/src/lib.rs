//! Deterministic simulation harness for Crashline testing.
//!
//! Seeded, manually clocked implementations of the server's seams, so whole
//! rounds replay identically from a seed.
//!
//! # Simulation
//!
//! [`SimServer`] drives the Sans-IO `ServerDriver` directly and captures
//! every outbound message per session. [`SimListener`] and [`SimClient`]
//! run the production runtime over turmoil's simulated TCP instead.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the game
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_env;
pub mod sim_server;
pub mod sim_transport;

pub use invariants::{
    BetExclusivity, HouseRiskBound, Invariant, InvariantKind, InvariantRegistry, InvariantResult,
    MultiplierMonotonicity, NonNegativeBalances, Observation, RoundIdMonotonicity, SystemSnapshot, Violation,
};
pub use sim_env::SimEnv;
pub use sim_server::SimServer;
pub use sim_transport::{SimClient, SimListener};
