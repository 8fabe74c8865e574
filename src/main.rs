mod arena;
mod cli;
mod controller;
mod direction;
mod grid;
mod heap;
mod node;
mod queue;
mod worker;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use cli::Cli;
use grid::Grid;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("no path exists between start and goal");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(true)` on a solved maze (length already printed to
/// stdout), `Ok(false)` when the maze has no solution.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let grid = Grid::open(&cli.maze_file).context("loading maze file")?;
    if grid.rows() < 3 || grid.cols() < 3 {
        anyhow::bail!("maze must be at least 3x3 to have an interior start and goal cell");
    }

    let start = (1u32, 1u32);
    let goal = (grid.cols() as u32 - 2, grid.rows() as u32 - 2);

    let total_threads = cli.threads.unwrap_or_else(num_cpus::get).max(2);
    let grid = Arc::new(grid);

    match controller::search(Arc::clone(&grid), start, goal, total_threads)? {
        Some(outcome) => {
            println!("{}", outcome.length);
            Ok(true)
        }
        None => Ok(false),
    }
}
