//! Injected environment concerns.
//!
//! Time is the only ambient dependency the core touches, and it is passed
//! in explicitly like every other collaborator: components that stamp
//! timestamps (snapshotter, checkpoint writers) take an `Arc<dyn Clock>`
//! at construction. Tests substitute a fixed clock for determinism.

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
