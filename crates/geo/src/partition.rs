//! Distribution of the output raster over the worker group.
//!
//! Both partitioners return, for one rank, the ordered list of output windows
//! it owns. Across all ranks of a group the returned windows cover the output
//! exactly once with pairwise disjoint pixel ownership; the parallel writer
//! relies on this for sequential consistency and takes no locks.

use crate::{Cell, Columns, RasterSize, Rows, Window};

/// Splits the output into full-width row strips sized by the pixel budget and
/// deals them round-robin over the ranks. A rank without strips gets an empty
/// list, which is valid (more workers than strips).
pub fn row_partition(rank: usize, worker_count: usize, size: RasterSize, partition_budget: usize) -> Vec<Window> {
    assert!(worker_count > 0 && rank < worker_count);

    let rows = size.rows.count();
    let cols = size.cols.count();
    if rows <= 0 || cols <= 0 {
        return Vec::new();
    }

    let strip_height = ((partition_budget / cols as usize).max(1) as i32).min(rows);
    let strip_count = (rows + strip_height - 1) / strip_height;

    let mut partitions = Vec::new();
    for strip in (rank as i32..strip_count).step_by(worker_count) {
        let first_row = strip * strip_height;
        let last_row = ((strip + 1) * strip_height).min(rows) - 1;
        partitions.push(Window::from_corners(
            Cell::from_row_col(first_row, 0),
            Cell::from_row_col(last_row, cols - 1),
        ));
    }

    partitions
}

/// Splits the output in both dimensions. The tile side approximates the
/// square root of the pixel budget, snapped down to the tile grid; the last
/// row and column of tiles are truncated at the raster edge. Tiles are dealt
/// round-robin in row-major order, which is deterministic and balanced.
pub fn tile_partition(rank: usize, worker_count: usize, size: RasterSize, partition_budget: usize, tile_grid: i32) -> Vec<Window> {
    assert!(worker_count > 0 && rank < worker_count);

    let rows = size.rows.count();
    let cols = size.cols.count();
    if rows <= 0 || cols <= 0 {
        return Vec::new();
    }

    let tile_grid = tile_grid.max(1);
    let side = (partition_budget as f64).sqrt().floor() as i32;
    let side = ((side / tile_grid) * tile_grid).max(tile_grid.min(side.max(1)));

    let tiles_per_row = (cols + side - 1) / side;
    let tiles_per_col = (rows + side - 1) / side;
    let tile_count = tiles_per_row * tiles_per_col;

    let mut partitions = Vec::new();
    for tile in (rank as i32..tile_count).step_by(worker_count) {
        let tile_row = tile / tiles_per_row;
        let tile_col = tile % tiles_per_row;

        let first_row = tile_row * side;
        let first_col = tile_col * side;
        let last_row = ((tile_row + 1) * side).min(rows) - 1;
        let last_col = ((tile_col + 1) * side).min(cols) - 1;

        partitions.push(Window::from_corners(
            Cell::from_row_col(first_row, first_col),
            Cell::from_row_col(last_row, last_col),
        ));
    }

    partitions
}
