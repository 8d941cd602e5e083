//! Time source and id generation, threaded explicitly into every
//! operation's constructor rather than read from a global.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for deterministic tests of accrual, delinquency, and
/// statement-cycle logic.
pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    pub fn at(initial: DateTime<Utc>) -> Self {
        TestClock(Mutex::new(initial))
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *guard += delta;
    }

    pub fn set(&self, value: DateTime<Utc>) {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *guard = value;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub trait IdGenerator: Send + Sync {
    fn next_id(&self, prefix: &str) -> String;
}

#[derive(Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::new_v4())
    }
}

/// Deterministic id generator for tests: `{prefix}-{n}` with a
/// monotonically increasing counter.
pub struct SequentialIdGenerator(Mutex<u64>);

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        SequentialIdGenerator(Mutex::new(0))
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *guard += 1;
        format!("{prefix}-{}", *guard)
    }
}
