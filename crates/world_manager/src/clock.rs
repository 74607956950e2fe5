//! Timestamp source for `created_at`, `updated_at` and `last_played`

use chrono::{SecondsFormat, Utc};

/// Produces sortable ISO-8601 timestamps.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> String;
}

/// Wall clock in UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Always returns the same instant. Handy for tests and dry runs.
#[derive(Debug, Clone)]
pub struct FixedClock(pub String);

impl Clock for FixedClock {
    fn now(&self) -> String {
        self.0.clone()
    }
}
