//! Simulation environment.
//!
//! Time is a [`Duration`] since the environment was created. It either
//! advances only when the test says so, or follows tokio's clock, which
//! turmoil virtualizes. Randomness is a seeded ChaCha stream in both cases.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use crashline_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Fixed wall-clock origin so timestamps replay identically.
const EPOCH_MILLIS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone)]
enum Clock {
    Manual(Arc<Mutex<Duration>>),
    Tokio(tokio::time::Instant),
}

/// Deterministic [`Environment`] for tests.
#[derive(Debug, Clone)]
pub struct SimEnv {
    clock: Clock,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Manually advanced clock starting at zero.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            clock: Clock::Manual(Arc::new(Mutex::new(Duration::ZERO))),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Clock that follows `tokio::time`. Must be created inside a runtime.
    pub fn on_tokio_clock(seed: u64) -> Self {
        Self {
            clock: Clock::Tokio(tokio::time::Instant::now()),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Advance a manual clock. No effect on a tokio clock.
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(elapsed) = &self.clock {
            *elapsed.lock().unwrap_or_else(PoisonError::into_inner) += by;
        }
    }
}

impl Environment for SimEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        match &self.clock {
            Clock::Manual(elapsed) => *elapsed.lock().unwrap_or_else(PoisonError::into_inner),
            Clock::Tokio(start) => start.elapsed(),
        }
    }

    fn wall_clock_millis(&self) -> i64 {
        EPOCH_MILLIS + i64::try_from(self.now().as_millis()).unwrap_or(i64::MAX - EPOCH_MILLIS)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
