//! Tick budgets and synchronous-execution penalty accounting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Work allowed per queue per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBudget {
    /// Wall-clock time a drain may spend.
    pub max_time: Duration,
    /// Requests a drain may process.
    pub max_requests: usize,
}

/// Rolling debt of time spent executing requests synchronously.
///
/// Every synchronous stage execution charges its cost; every host tick pays
/// back one tick length. While the debt is at or above the tick budget no
/// further synchronous execution is allowed.
#[derive(Debug)]
pub struct PenaltyClock {
    debt_ns: AtomicU64,
    tick_ns: u64,
}

impl PenaltyClock {
    /// Creates a clock that decays by `tick_ms` per host tick.
    #[must_use]
    pub const fn new(tick_ms: u64) -> Self {
        Self {
            debt_ns: AtomicU64::new(0),
            tick_ns: tick_ms.saturating_mul(1_000_000),
        }
    }

    /// Adds the cost of one synchronous execution.
    pub fn charge(&self, cost: Duration) {
        // Nanoseconds, so sub-millisecond runs still add up.
        let cost_ns = u64::try_from(cost.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .debt_ns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |debt| Some(debt.saturating_add(cost_ns)));
    }

    /// Pays back one host tick.
    pub fn decay(&self) {
        let tick_ns = self.tick_ns;
        let _ = self
            .debt_ns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |debt| Some(debt.saturating_sub(tick_ns)));
    }

    /// Current debt.
    #[must_use]
    pub fn debt(&self) -> Duration {
        Duration::from_nanos(self.debt_ns.load(Ordering::Acquire))
    }

    /// Returns true while the debt is below `max_time`.
    #[must_use]
    pub fn allows(&self, max_time: Duration) -> bool {
        self.debt() < max_time
    }
}
