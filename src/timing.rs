//! Round-trip timing hooks.
//!
//! Every connect, disconnect and statement is reported to a [`QueryTimer`]
//! exactly once. What happens to the samples is up to the timer.

use std::fmt;
use std::time::{Duration, Instant};

/// Kind of backend round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingCategory {
    Connect,
    Disconnect,
    Query,
}

impl fmt::Display for TimingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimingCategory::Connect => "connect",
            TimingCategory::Disconnect => "disconnect",
            TimingCategory::Query => "query",
        };
        f.write_str(name)
    }
}

/// Receiver of timing samples.
pub trait QueryTimer: Send + Sync {
    fn record(&self, label: &str, elapsed: Duration, category: TimingCategory);
}

/// Default timer: one `trace` event per sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTimer;

impl QueryTimer for TracingTimer {
    fn record(&self, label: &str, elapsed: Duration, category: TimingCategory) {
        tracing::trace!(
            %category,
            elapsed_us = elapsed.as_micros() as u64,
            label,
            "round-trip"
        );
    }
}

/// Run `f` and report its wall time, whether it succeeded or not.
pub fn measure<T>(
    timer: &dyn QueryTimer,
    label: &str,
    category: TimingCategory,
    f: impl FnOnce() -> T,
) -> T {
    let start = Instant::now();
    let out = f();
    timer.record(label, start.elapsed(), category);
    out
}
