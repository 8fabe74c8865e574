use std::hint;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::arena::Arena;
use crate::direction::{Direction, DirectionCounters, WorkerResult};
use crate::grid::Grid;
use crate::heap::MinHeap;
use crate::node::{heuristic, Node, NodeTable};
use crate::queue::Inbox;

/// Shared record of the best meeting point found so far, guarded by one
/// mutex for both directions.
pub struct BestMeeting {
    pub x: i32,
    pub y: i32,
    pub min_len: u64,
}

impl Default for BestMeeting {
    fn default() -> Self {
        BestMeeting {
            x: -1,
            y: -1,
            min_len: u64::MAX,
        }
    }
}

/// Everything a single HDA* worker needs: its own heap/arena/inbox, the
/// shared node tables (own and counterpart), the shared termination
/// bookkeeping, and enough context to compute ownership and heuristics.
pub struct WorkerContext {
    pub id: usize,
    pub workers: usize,
    pub direction: Direction,
    pub grid: Arc<Grid>,
    pub own_table: Arc<NodeTable>,
    pub counterpart_table: Arc<NodeTable>,
    pub own_counters: Arc<DirectionCounters>,
    pub counterpart_counters: Arc<DirectionCounters>,
    pub best: Arc<Mutex<BestMeeting>>,
    pub terminated: Arc<AtomicBool>,
    pub inboxes: Vec<Arc<Inbox>>,
    pub start: (u32, u32),
    pub goal: (u32, u32),
}

const NEIGHBOR_OFFSETS: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

pub fn run_worker(ctx: WorkerContext) -> WorkerResult {
    let mut arena: Arena<Node> = Arena::new().expect("anonymous mmap for node arena failed");
    let mut heap = MinHeap::new();

    let (origin_x, origin_y) = ctx.direction.origin(ctx.start, ctx.goal);
    let (target_x, target_y) = ctx.direction.heuristic_target(ctx.start, ctx.goal);
    let owner_of = |x: u32, y: u32| -> usize { (x as usize + y as usize) % ctx.workers };

    if owner_of(origin_x, origin_y) == ctx.id {
        let g = 1;
        let f = g + heuristic(origin_x, origin_y, target_x, target_y);
        let node = arena.alloc(Node::new(origin_x, origin_y, g, f, ptr::null_mut()));
        ctx.own_table.publish(origin_x, origin_y, node);
        heap.insert(node);
        // The origin node is placed directly on the heap rather than
        // delivered through a message, so it has no matching `sent` to
        // balance — only `mark_started` is needed to make this
        // direction visible to the quiescence check.
        ctx.own_counters.mark_started();
    }

    loop {
        if ctx.terminated.load(Ordering::Relaxed) {
            break;
        }

        if let Some(n) = heap.extract_min() {
            ctx.own_counters.set_idle(ctx.id, false);
            let (nx, ny, ng) = unsafe { ((*n).x, (*n).y, (*n).g) };

            let min_len = ctx.best.lock().unwrap().min_len;
            if ng as u64 >= min_len {
                drain_heap(&mut heap);
                drain_inbox(&ctx, &mut arena, &mut heap, owner_of);
                continue;
            }

            let counterpart_node = ctx.counterpart_table.get(nx, ny);
            if !counterpart_node.is_null() {
                let mg = unsafe { (*counterpart_node).g };
                let candidate = ng as u64 + mg as u64 - 1;
                let mut best = ctx.best.lock().unwrap();
                if candidate < best.min_len {
                    best.x = nx as i32;
                    best.y = ny as i32;
                    best.min_len = candidate;
                }
                drop(best);
                drain_inbox(&ctx, &mut arena, &mut heap, owner_of);
                continue;
            }

            for (dx, dy) in NEIGHBOR_OFFSETS {
                let neighbor_x = nx as i64 + dx;
                let neighbor_y = ny as i64 + dy;
                if ctx.grid.is_wall(neighbor_x, neighbor_y) {
                    continue;
                }
                let neighbor_x = neighbor_x as u32;
                let neighbor_y = neighbor_y as u32;
                let owner = owner_of(neighbor_x, neighbor_y);
                let g_tentative = ng + 1;
                let existing = ctx.own_table.get(neighbor_x, neighbor_y);
                if !existing.is_null() && unsafe { (*existing).g } <= g_tentative {
                    continue;
                }
                let inbox = &ctx.inboxes[owner];
                let msg = inbox.alloc(n, neighbor_x, neighbor_y, g_tentative);
                inbox.push(msg);
                ctx.own_counters.add_sent(ctx.id, 1);
            }
            drain_inbox(&ctx, &mut arena, &mut heap, owner_of);
        } else {
            drain_inbox(&ctx, &mut arena, &mut heap, owner_of);
            if !heap.is_empty() || !ctx.inboxes[ctx.id].is_empty() {
                ctx.own_counters.set_idle(ctx.id, false);
                continue;
            }
            ctx.own_counters.set_idle(ctx.id, true);

            let (own_sent, own_received) = ctx.own_counters.totals();
            let (their_sent, their_received) = ctx.counterpart_counters.totals();
            let own_quiescent = ctx.own_counters.is_started()
                && own_sent == own_received
                && ctx.own_counters.all_idle();
            let counterpart_quiescent = ctx.counterpart_counters.is_started()
                && their_sent == their_received
                && ctx.counterpart_counters.all_idle();

            if own_quiescent && counterpart_quiescent {
                // Either a solution is known and no further improvement
                // is possible once both directions are quiescent, or
                // both are quiescent with no solution ever found, which
                // means the maze has none. Either way the search is over.
                ctx.terminated.store(true, Ordering::Relaxed);
                break;
            }

            hint::spin_loop();
        }
    }

    WorkerResult { arena }
}

fn drain_heap(heap: &mut MinHeap) {
    while heap.extract_min().is_some() {}
}

fn drain_inbox(
    ctx: &WorkerContext,
    arena: &mut Arena<Node>,
    heap: &mut MinHeap,
    owner_of: impl Fn(u32, u32) -> usize,
) {
    let (target_x, target_y) = ctx.direction.heuristic_target(ctx.start, ctx.goal);
    let my_inbox = &ctx.inboxes[ctx.id];
    let messages = my_inbox.drain();
    for msg in &messages {
        let (parent, x, y, g_new) = unsafe { ((**msg).parent, (**msg).x, (**msg).y, (**msg).g) };
        debug_assert_eq!(owner_of(x, y), ctx.id, "message routed to the wrong inbox");

        let existing = ctx.own_table.get(x, y);
        if existing.is_null() {
            let f = g_new + heuristic(x, y, target_x, target_y);
            let node = arena.alloc(Node::new(x, y, g_new, f, parent));
            ctx.own_table.publish(x, y, node);
            heap.insert(node);
        } else {
            let current_g = unsafe { (*existing).g };
            if g_new < current_g {
                unsafe {
                    (*existing).parent = parent;
                    (*existing).g = g_new;
                    (*existing).f = g_new + heuristic(x, y, target_x, target_y);
                }
                if unsafe { (*existing).heap_id } > 0 {
                    heap.decrease_key(existing);
                } else {
                    heap.insert(existing);
                }
            }
        }
        ctx.own_counters.add_received(ctx.id, 1);
        my_inbox.recycle(*msg);
    }
}
