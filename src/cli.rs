use std::path::PathBuf;

use clap::Parser;

/// Computes one shortest path through a dense block maze using a
/// parallel bidirectional A* search, and marks it in place in the
/// maze file.
#[derive(Parser, Debug)]
#[command(name = "astar", version, about)]
pub struct Cli {
    /// Path to the maze file (first line `rows cols`, then `rows` lines
    /// of `cols` characters: '#' wall, '@' start, '%' goal).
    pub maze_file: PathBuf,

    /// Override the worker thread count (split evenly between the two
    /// search directions). Defaults to the number of online CPUs.
    #[arg(long)]
    pub threads: Option<usize>,
}
