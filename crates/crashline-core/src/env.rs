//! Environment abstraction for deterministic testing.
//!
//! Decouples round logic from system resources (time, randomness). The
//! server supplies the real clock and OS entropy; the harness supplies a
//! virtual clock and a seeded RNG so whole rounds replay identically.

use std::{ops::Add, time::Duration};

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `wall_clock_millis()` is only used for display, never for ordering
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration> + Add<Duration, Output = Self::Instant>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Milliseconds since the Unix epoch, for timestamps sent to clients.
    fn wall_clock_millis(&self) -> i64;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Uniform float in `[0, 1)` with 53 bits of precision.
    fn random_unit(&self) -> f64 {
        (self.random_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[low, high]`. Returns `low` when the range is
    /// empty.
    fn random_range(&self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        match (high - low).checked_add(1) {
            Some(span) => low + self.random_u64() % span,
            None => self.random_u64(),
        }
    }
}
