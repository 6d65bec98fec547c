//! Production environment using the system clock and OS RNG.
//!
//! Production behavior is non-deterministic: time advances on its own and
//! randomness is not reproducible. Resume tokens and session ids are drawn
//! from the OS RNG.

use parley_core::Environment;

/// Production environment.
///
/// # Panics
///
/// Panics if the OS RNG fails. A relay without working randomness would hand
/// out guessable resume tokens, so it must not keep running.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - resume tokens would be guessable");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    #[allow(clippy::disallowed_methods)]
    fn system_env_time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[test]
    fn system_env_tokens_differ() {
        let env = SystemEnv::new();

        // Extremely unlikely to collide if random
        assert_ne!(env.random_u128(), env.random_u128());
    }

    #[test]
    fn wall_clock_is_after_2024() {
        let env = SystemEnv::new();

        assert!(env.wall_clock_millis() > 1_704_067_200_000);
    }
}
