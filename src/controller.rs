use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::direction::{self, Direction, DirectionCounters};
use crate::grid::Grid;
use crate::node::NodeTable;
use crate::worker::BestMeeting;

pub struct SearchOutcome {
    pub length: u64,
}

/// Spawns both directions' worker pools, waits for the search to reach
/// quiescence, reconstructs the path, and marks it on the grid.
///
/// Returns `Ok(None)` when the maze has no solution (§9's resolved
/// choice: detect global quiescence with no known meeting point rather
/// than require the caller to guarantee solvability).
pub fn search(
    grid: Arc<Grid>,
    start: (u32, u32),
    goal: (u32, u32),
    total_threads: usize,
) -> anyhow::Result<Option<SearchOutcome>> {
    let workers_per_direction = (total_threads / 2).max(1);

    let forward_table = Arc::new(NodeTable::new(grid.rows(), grid.cols()));
    let backward_table = Arc::new(NodeTable::new(grid.rows(), grid.cols()));
    let forward_counters = Arc::new(DirectionCounters::new(workers_per_direction));
    let backward_counters = Arc::new(DirectionCounters::new(workers_per_direction));
    let best = Arc::new(Mutex::new(BestMeeting::default()));
    let terminated = Arc::new(AtomicBool::new(false));

    let (forward_arenas, backward_arenas) = thread::scope(|scope| {
        let forward_handles = direction::spawn_workers(
            scope,
            Direction::Forward,
            workers_per_direction,
            Arc::clone(&grid),
            Arc::clone(&forward_table),
            Arc::clone(&backward_table),
            Arc::clone(&forward_counters),
            Arc::clone(&backward_counters),
            Arc::clone(&best),
            Arc::clone(&terminated),
            start,
            goal,
        );
        let backward_handles = direction::spawn_workers(
            scope,
            Direction::Backward,
            workers_per_direction,
            Arc::clone(&grid),
            Arc::clone(&backward_table),
            Arc::clone(&forward_table),
            Arc::clone(&backward_counters),
            Arc::clone(&forward_counters),
            Arc::clone(&best),
            Arc::clone(&terminated),
            start,
            goal,
        );

        let forward_arenas: Vec<_> = forward_handles
            .into_iter()
            .map(|h| h.join().expect("forward worker panicked").arena)
            .collect();
        let backward_arenas: Vec<_> = backward_handles
            .into_iter()
            .map(|h| h.join().expect("backward worker panicked").arena)
            .collect();
        (forward_arenas, backward_arenas)
    });

    let outcome = {
        let meeting = best.lock().unwrap();
        if meeting.min_len == u64::MAX {
            None
        } else {
            let (mx, my) = (meeting.x as u32, meeting.y as u32);
            let length = meeting.min_len;
            reconstruct_path(&grid, &forward_table, &backward_table, mx, my);
            grid.flush()?;
            Some(SearchOutcome { length })
        }
    };

    // Arenas, and both node tables whose pointers they back, stay alive
    // through reconstruction above; only now do they drop.
    drop(forward_arenas);
    drop(backward_arenas);
    drop(forward_table);
    drop(backward_table);

    Ok(outcome)
}

/// Walks both directions' parent chains from the meeting point and
/// stamps every visited cell on the grid.
fn reconstruct_path(
    grid: &Grid,
    forward_table: &NodeTable,
    backward_table: &NodeTable,
    mx: u32,
    my: u32,
) {
    grid.write_mark(mx, my);

    let mut cursor = forward_table.get(mx, my);
    while !cursor.is_null() {
        unsafe {
            grid.write_mark((*cursor).x, (*cursor).y);
            cursor = (*cursor).parent;
        }
    }

    let mut cursor = backward_table.get(mx, my);
    while !cursor.is_null() {
        unsafe {
            grid.write_mark((*cursor).x, (*cursor).y);
            cursor = (*cursor).parent;
        }
    }
}
