//! Monotonic clock abstraction
//!
//! The write path and the connect wait are busy loops bounded by time.
//! The clock is injected so the bounds can be exercised without hardware.

/// Microsecond timestamp source.
pub trait Monotonic {
    /// Microseconds since an arbitrary epoch. Never decreases.
    fn now_us(&self) -> u64;
}

impl<T: Monotonic + ?Sized> Monotonic for &T {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

/// Absolute deadline `timeout_ms` from now.
pub fn deadline_after_ms<C: Monotonic + ?Sized>(clock: &C, timeout_ms: u32) -> u64 {
    clock.now_us().saturating_add(timeout_ms as u64 * 1000)
}
