//! Manually advanced environment for unit tests.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use crashline_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Clone)]
pub(crate) struct TestEnv {
    elapsed: Arc<Mutex<Duration>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl TestEnv {
    pub(crate) fn new() -> Self {
        Self {
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(11))),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap() += by;
    }
}

impl Environment for TestEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    fn wall_clock_millis(&self) -> i64 {
        1_700_000_000_000 + self.now().as_millis() as i64
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap().fill_bytes(buffer);
    }
}
