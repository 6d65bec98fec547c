//! Environment abstraction for deterministic testing.
//!
//! Decouples coordination logic from system resources (time, randomness).
//! Tests drive the coordinator with a seeded RNG and a virtual clock;
//! production uses the system clock and the OS RNG.

use std::time::Duration;

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production,
///   since resume tokens are derived from it
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type.
    ///
    /// Production uses `std::time::Instant`; simulation uses virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Wall-clock Unix time in milliseconds, used for envelope timestamps.
    fn wall_clock_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random `u128`.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}
