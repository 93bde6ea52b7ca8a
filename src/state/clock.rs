//! Wall-clock abstraction used by every phase and elapsed computation.

use time::OffsetDateTime;

/// Source of the current wall-clock instant.
///
/// Clients are assumed to be loosely synchronised (NTP-level) with each other and with the
/// server stamping `started_at`; no skew correction happens here.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the operating system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
pub use self::manual::ManualClock;

#[cfg(test)]
mod manual {
    use std::sync::{Arc, Mutex};

    use time::OffsetDateTime;

    use super::Clock;

    /// Test clock that only moves when told to. Clones share the same instant.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<OffsetDateTime>>,
    }

    impl ManualClock {
        pub fn new(start: OffsetDateTime) -> Self {
            Self {
                now: Arc::new(Mutex::new(start)),
            }
        }

        pub fn advance(&self, by: time::Duration) {
            let mut guard = self.now.lock().unwrap();
            *guard += by;
        }

        pub fn set(&self, at: OffsetDateTime) {
            *self.now.lock().unwrap() = at;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.now.lock().unwrap()
        }
    }
}
