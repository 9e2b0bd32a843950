//! Injectable time and identifier sources.
//!
//! The engine and scheduler never call `Utc::now()` directly; they take a
//! `Clock` so escalation deadlines and timestamp fields are deterministic
//! under test.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a fixed instant, for deterministic tests.
#[derive(Debug)]
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    /// Move the clock forward; panics only on a poisoned lock, which cannot
    /// happen outside a failing test.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += duration;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

pub trait IdGenerator: Send + Sync {
    /// Produce a unique identifier with the given entity prefix
    /// (`WO` for orders, `WSH` for history rows, `WR` for results).
    fn next_id(&self, prefix: &str) -> String;
}

/// UUID-backed identifiers, e.g. `WO-1b9d6bcd-...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::new_v4())
    }
}
