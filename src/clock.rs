//! Injected time source.
//!
//! The player and power controller never read a hardware timer directly;
//! they take `&mut impl Clock` so tests can drive time explicitly instead of
//! racing a real clock.

/// A millisecond-resolution monotonic clock.
pub trait Clock {
    /// Milliseconds since an arbitrary but fixed epoch (typically boot).
    fn now_ms(&mut self) -> u32;
}

/// A clock that always reports a value you set, for deterministic tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeClock(pub u32);

impl Clock for FakeClock {
    fn now_ms(&mut self) -> u32 {
        self.0
    }
}

impl FakeClock {
    pub fn advance(&mut self, ms: u32) {
        self.0 = self.0.wrapping_add(ms);
    }
}

#[cfg(feature = "std")]
mod std_impl {
    use super::Clock;
    use std::time::Instant;

    /// Wraps [`std::time::Instant`] for the host simulator and integration
    /// tests that want wall-clock behavior rather than a hand-advanced fake.
    pub struct MonotonicMillis {
        origin: Instant,
    }

    impl MonotonicMillis {
        pub fn new() -> Self {
            MonotonicMillis { origin: Instant::now() }
        }
    }

    impl Default for MonotonicMillis {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for MonotonicMillis {
        fn now_ms(&mut self) -> u32 {
            self.origin.elapsed().as_millis() as u32
        }
    }
}

#[cfg(feature = "std")]
pub use std_impl::MonotonicMillis;
