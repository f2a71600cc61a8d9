//! Priority queues and the per-tick drain loop.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use log::{debug, warn};

use super::budget::TickBudget;
use crate::request::Request;

struct Entry {
    seq: u64,
    request: Request,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Max-heap: higher priority first, then lower sequence (FIFO within a priority).
    fn cmp(&self, other: &Self) -> Ordering {
        self.request
            .priority()
            .cmp(&other.request.priority())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

/// Why a drain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStop {
    /// Nothing left to process.
    Empty,
    /// The per-tick time budget ran out.
    TimeBudget,
    /// The per-tick request budget ran out.
    CountBudget,
    /// The execution gate was closed.
    Gate,
}

/// Outcome of draining one queue for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    /// Requests popped and handled.
    pub processed: usize,
    /// Why the drain ended.
    pub stop: DrainStop,
}

/// A lock-guarded max-heap of requests.
///
/// The lock is held only for push/pop, never while a request is handled, so a
/// handler may push back onto any queue (including this one) without deadlocking.
pub struct RequestQueue {
    name: &'static str,
    state: Mutex<QueueState>,
}

impl RequestQueue {
    /// Creates an empty queue; `name` is used in log lines.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Queue name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("{} queue: recovered poisoned lock", self.name);
            poisoned.into_inner()
        })
    }

    /// Adds a request.
    pub fn push(&self, request: Request) {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Entry { seq, request });
    }

    /// Removes the highest-priority request.
    pub fn pop(&self) -> Option<Request> {
        self.lock().heap.pop().map(|entry| entry.request)
    }

    /// Number of queued requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    /// Returns true if no request is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    /// Pops and handles requests until the queue empties, a budget runs out, or `gate` closes.
    pub fn drain<G, H>(&self, budget: &TickBudget, gate: G, mut handle: H) -> DrainStats
    where
        G: Fn() -> bool,
        H: FnMut(Request),
    {
        let started = Instant::now();
        let mut processed = 0usize;

        let stop = loop {
            if !gate() {
                break DrainStop::Gate;
            }
            let elapsed = started.elapsed();
            if elapsed >= budget.max_time {
                debug!(
                    "{} queue: max time per tick reached ({} ms)",
                    self.name,
                    elapsed.as_millis()
                );
                break DrainStop::TimeBudget;
            }
            if processed >= budget.max_requests {
                debug!("{} queue: max request count reached ({processed})", self.name);
                break DrainStop::CountBudget;
            }
            let Some(request) = self.pop() else {
                break DrainStop::Empty;
            };
            handle(request);
            processed += 1;
        };

        DrainStats { processed, stop }
    }

    /// Pops and handles every request, ignoring budgets. Used on shutdown.
    pub fn drain_all<H>(&self, mut handle: H) -> usize
    where
        H: FnMut(Request),
    {
        let mut processed = 0usize;
        while let Some(request) = self.pop() {
            handle(request);
            processed += 1;
        }
        processed
    }
}
