use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::arena::Arena;
use crate::grid::Grid;
use crate::node::{Node, NodeTable};
use crate::queue::Inbox;
use crate::worker::{self, BestMeeting};

/// Which end of the maze a pool of workers is searching from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// The cell this direction's frontier grows from.
    pub fn origin(&self, start: (u32, u32), goal: (u32, u32)) -> (u32, u32) {
        match self {
            Direction::Forward => start,
            Direction::Backward => goal,
        }
    }

    /// The cell this direction's heuristic measures distance to.
    pub fn heuristic_target(&self, start: (u32, u32), goal: (u32, u32)) -> (u32, u32) {
        match self {
            Direction::Forward => goal,
            Direction::Backward => start,
        }
    }
}

/// Per-direction send/receive ledger, one counter pair per worker,
/// written only by the owning worker and read by everyone (relaxed,
/// as the termination protocol only needs eventually-consistent sums).
pub struct DirectionCounters {
    sent: Vec<AtomicU64>,
    received: Vec<AtomicU64>,
    // Per-worker "my heap and inbox were both empty when I last
    // checked" flag. sent == received only rules out messages in
    // flight; it says nothing about a worker that drained a message
    // into its heap but hasn't extracted it yet. Combining both checks
    // is still a snapshot, not a formally race-free wave algorithm, but
    // the idle loop re-samples until a consistent picture holds, which
    // is enough for a batch search that doesn't need to terminate
    // under adversarial scheduling.
    idle: Vec<AtomicBool>,
    // Every worker's counters start at (0, 0) and idle at `false`,
    // which on their own look exactly like "this direction is done".
    // Track whether the direction's origin node has actually been
    // created yet so a direction whose designated starting worker
    // hasn't run yet isn't mistaken by the counterpart for a finished
    // search.
    started: AtomicBool,
}

impl DirectionCounters {
    pub fn new(workers: usize) -> Self {
        DirectionCounters {
            sent: (0..workers).map(|_| AtomicU64::new(0)).collect(),
            received: (0..workers).map(|_| AtomicU64::new(0)).collect(),
            idle: (0..workers).map(|_| AtomicBool::new(false)).collect(),
            started: AtomicBool::new(false),
        }
    }

    pub fn add_sent(&self, id: usize, n: u64) {
        self.sent[id].fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_received(&self, id: usize, n: u64) {
        self.received[id].fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_idle(&self, id: usize, idle: bool) {
        self.idle[id].store(idle, Ordering::Relaxed);
    }

    pub fn all_idle(&self) -> bool {
        self.idle.iter().all(|b| b.load(Ordering::Relaxed))
    }

    pub fn mark_started(&self) {
        self.started.store(true, Ordering::Relaxed);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    /// Sum of all workers' counters in this direction. Not synchronized
    /// with any particular moment in the other workers' execution; used
    /// only as a quiescence heuristic that is re-sampled in a loop.
    pub fn totals(&self) -> (u64, u64) {
        let sent: u64 = self.sent.iter().map(|c| c.load(Ordering::Relaxed)).sum();
        let received: u64 = self.received.iter().map(|c| c.load(Ordering::Relaxed)).sum();
        (sent, received)
    }
}

/// Everything a worker thread hands back once it exits. The arena must
/// outlive path reconstruction, so it travels back through the join
/// handle instead of being dropped on the worker's own thread.
pub struct WorkerResult {
    pub arena: Arena<Node>,
}

/// Spawns this direction's pool of workers into `scope` and returns
/// their join handles without waiting on them — letting the caller
/// spawn the counterpart direction's pool before blocking on either,
/// so both directions genuinely run concurrently.
#[allow(clippy::too_many_arguments)]
pub fn spawn_workers<'scope>(
    scope: &'scope thread::Scope<'scope, '_>,
    direction: Direction,
    workers: usize,
    grid: Arc<Grid>,
    own_table: Arc<NodeTable>,
    counterpart_table: Arc<NodeTable>,
    own_counters: Arc<DirectionCounters>,
    counterpart_counters: Arc<DirectionCounters>,
    best: Arc<Mutex<BestMeeting>>,
    terminated: Arc<AtomicBool>,
    start: (u32, u32),
    goal: (u32, u32),
) -> Vec<thread::ScopedJoinHandle<'scope, WorkerResult>> {
    let inboxes: Vec<Arc<Inbox>> = (0..workers)
        .map(|_| Arc::new(Inbox::new().expect("anonymous mmap for message arena failed")))
        .collect();

    (0..workers)
        .map(|id| {
            let grid = Arc::clone(&grid);
            let own_table = Arc::clone(&own_table);
            let counterpart_table = Arc::clone(&counterpart_table);
            let own_counters = Arc::clone(&own_counters);
            let counterpart_counters = Arc::clone(&counterpart_counters);
            let best = Arc::clone(&best);
            let terminated = Arc::clone(&terminated);
            let inboxes = inboxes.clone();
            scope.spawn(move || {
                worker::run_worker(worker::WorkerContext {
                    id,
                    workers,
                    direction,
                    grid,
                    own_table,
                    counterpart_table,
                    own_counters,
                    counterpart_counters,
                    best,
                    terminated,
                    inboxes,
                    start,
                    goal,
                })
            })
        })
        .collect()
}
