use std::cell::UnsafeCell;
use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{bail, Context};
use memmap2::MmapMut;

/// A memory-mapped view over a maze file.
///
/// The first line is `<rows> <cols>`, followed by `rows` lines of
/// exactly `cols` characters each. `'#'` is a wall; anything else
/// (including the `'@'` start and `'%'` goal markers) is traversable.
/// Cells outside `0..cols, 0..rows` are treated as walls, matching the
/// maze's implicit border.
///
/// Writes go through an `UnsafeCell` because the search engine only
/// ever reads the grid concurrently (via `is_wall`); marking the path
/// happens on the main thread after every worker has joined, so there
/// is never a concurrent writer.
pub struct Grid {
    mmap: UnsafeCell<MmapMut>,
    rows: usize,
    cols: usize,
    header_len: usize,
    row_stride: usize,
}

unsafe impl Sync for Grid {}

impl Grid {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("opening maze file {}", path.display()))?;
        let mmap = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("memory-mapping maze file {}", path.display()))?;

        let header_end = mmap
            .iter()
            .position(|&b| b == b'\n')
            .context("maze file has no header line")?;
        let header = std::str::from_utf8(&mmap[..header_end])
            .context("maze header is not valid utf-8")?;
        let mut parts = header.split_whitespace();
        let rows: usize = parts
            .next()
            .context("maze header missing row count")?
            .parse()
            .context("maze header row count is not an integer")?;
        let cols: usize = parts
            .next()
            .context("maze header missing column count")?
            .parse()
            .context("maze header column count is not an integer")?;
        if rows == 0 || cols == 0 {
            bail!("maze must have at least one row and one column");
        }

        let header_len = header_end + 1;
        let row_stride = cols + 1; // +1 for the trailing newline
        let expected_len = header_len + row_stride * rows;
        if mmap.len() < expected_len {
            bail!(
                "maze file is too short: expected at least {} bytes, got {}",
                expected_len,
                mmap.len()
            );
        }

        Ok(Grid {
            mmap: UnsafeCell::new(mmap),
            rows,
            cols,
            header_len,
            row_stride,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.cols && (y as usize) < self.rows
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        self.header_len + y as usize * self.row_stride + x as usize
    }

    fn byte_at(&self, x: u32, y: u32) -> u8 {
        let mmap = unsafe { &*self.mmap.get() };
        mmap[self.offset(x, y)]
    }

    /// Cells outside the grid, and `'#'` cells inside it, are walls.
    pub fn is_wall(&self, x: i64, y: i64) -> bool {
        if !self.in_bounds(x, y) {
            return true;
        }
        self.byte_at(x as u32, y as u32) == b'#'
    }

    /// Stamps `'*'` onto a traversable cell, preserving `'@'`/`'%'`
    /// start/goal markers. Only called from the main thread after every
    /// search worker has joined.
    pub fn write_mark(&self, x: u32, y: u32) {
        let byte = self.byte_at(x, y);
        if byte == b'@' || byte == b'%' {
            return;
        }
        let offset = self.offset(x, y);
        let mmap = unsafe { &mut *self.mmap.get() };
        mmap[offset] = b'*';
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        let mmap = unsafe { &*self.mmap.get() };
        mmap.flush().context("flushing maze file to disk")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_maze(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn parses_header_and_reads_cells() {
        let file = write_maze("3 4\n#@ %\n####\n####\n");
        let grid = Grid::open(file.path()).unwrap();
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.cols(), 4);
        assert!(grid.is_wall(0, 0));
        assert!(!grid.is_wall(1, 0));
        assert!(!grid.is_wall(2, 0));
        assert!(!grid.is_wall(3, 0));
        assert!(grid.is_wall(0, 1));
    }

    #[test]
    fn border_outside_grid_is_wall() {
        let file = write_maze("3 4\n#@ %\n####\n####\n");
        let grid = Grid::open(file.path()).unwrap();
        assert!(grid.is_wall(-1, 0));
        assert!(grid.is_wall(4, 0));
        assert!(grid.is_wall(0, -1));
        assert!(grid.is_wall(0, 3));
    }

    #[test]
    fn write_mark_preserves_start_and_goal() {
        let file = write_maze("3 4\n#@ %\n####\n####\n");
        let grid = Grid::open(file.path()).unwrap();
        grid.write_mark(1, 0);
        grid.write_mark(2, 0);
        assert_eq!(grid.byte_at(1, 0), b'@');
        assert_eq!(grid.byte_at(2, 0), b'*');
    }
}
