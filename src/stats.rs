use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A simple counter that can be incremented atomically
#[derive(Debug)]
pub struct Counter {
    value: AtomicUsize,
}

impl Counter {
    /// Create a new counter with an initial value
    pub fn new(initial_value: usize) -> Self {
        Self {
            value: AtomicUsize::new(initial_value),
        }
    }

    /// Increment the counter by a specific amount
    pub fn increment(&self, amount: usize) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Get the current value of the counter
    pub fn value(&self) -> usize {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Non-fatal events reported by connection handlers
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_accepted: Counter,
    pub requests_served: Counter,
    pub malformed_lines: Counter,
    pub connection_errors: Counter,
    pub idle_timeouts: Counter,
    pub forced_closes: Counter,
}

/// Point-in-time copy of [`ServerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub connections_accepted: usize,
    pub requests_served: usize,
    pub malformed_lines: usize,
    pub connection_errors: usize,
    pub idle_timeouts: usize,
    pub forced_closes: usize,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.value(),
            requests_served: self.requests_served.value(),
            malformed_lines: self.malformed_lines.value(),
            connection_errors: self.connection_errors.value(),
            idle_timeouts: self.idle_timeouts.value(),
            forced_closes: self.forced_closes.value(),
        }
    }
}

impl StatsSnapshot {
    /// Format the snapshot as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
