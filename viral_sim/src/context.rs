//! Simulation context implementing EngineContext for deterministic runs.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use viral_env::{mix_seed, EngineContext, Timestamp};

/// 2024-01-01 00:00:00 UTC in milliseconds.
const SIM_EPOCH_MS: u64 = 1_704_067_200_000;

/// Simulation context backed by a virtual clock and seeded RNG streams.
///
/// - The clock only moves when the harness advances it
/// - Every random stream is derived from the master seed
///
/// Clones share the same clock.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Virtual time (milliseconds since simulation start)
    virtual_time_ms: Arc<Mutex<u64>>,

    /// Virtual time 0 maps to this timestamp
    epoch: Timestamp,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ms: Arc::new(Mutex::new(0)),
            epoch: Timestamp::from_millis(SIM_EPOCH_MS),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let mut time = self.lock_time();
        *time = time.saturating_add(ms);
    }

    /// Advances virtual time by a fractional number of days.
    ///
    /// Negative or non-finite values are ignored.
    pub fn advance_days(&self, days: f64) {
        let now = self.now();
        let later = now.plus_days(days);
        self.advance_time(Duration::from_millis(later.as_millis() - now.as_millis()));
    }

    /// Sets the virtual time to a specific value.
    pub fn set_time_ms(&self, time_ms: u64) {
        *self.lock_time() = time_ms;
    }

    /// Returns elapsed virtual time in milliseconds.
    pub fn time_ms(&self) -> u64 {
        *self.lock_time()
    }

    /// Elapsed virtual time in days.
    pub fn elapsed_days(&self) -> f64 {
        self.now().days_since(self.epoch)
    }

    fn lock_time(&self) -> std::sync::MutexGuard<'_, u64> {
        self.virtual_time_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ms: Arc::clone(&self.virtual_time_ms),
            epoch: self.epoch,
        }
    }
}

impl EngineContext for SimContext {
    fn now(&self) -> Timestamp {
        self.epoch.advance(Duration::from_millis(self.time_ms()))
    }

    fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(mix_seed(self.seed, stream))
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
