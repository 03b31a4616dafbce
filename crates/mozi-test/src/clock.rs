//! A settable, advanceable stand-in for [`mozi_core::Clock`].

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use mozi_core::Clock;

/// A clock whose `now()` is whatever was last set or advanced to, rather
/// than the system time. Scheduling tests (collect windows, reminder due
/// times, backoff delays) drive this instead of sleeping.
pub struct TestClock {
    current: Mutex<DateTime<Utc>>,
}

impl TestClock {
    /// Start the clock at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { current: Mutex::new(start) }
    }

    /// Move the clock forward by `delta`. Panics if `delta` is negative;
    /// time only runs one way here.
    pub fn advance(&self, delta: Duration) {
        assert!(delta >= Duration::zero(), "TestClock cannot move backwards");
        let mut current = self.current.lock().expect("TestClock mutex poisoned");
        // delta is asserted non-negative above.
        #[allow(clippy::arithmetic_side_effects)]
        {
            *current += delta;
        }
    }

    /// Pin the clock to an exact instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock().expect("TestClock mutex poisoned") = at;
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().expect("TestClock mutex poisoned")
    }
}
