//! Blank out repeated values in one column.

use std::collections::HashSet;

use crate::error::{GridError, Result};
use crate::grid::GridAccess;
use crate::value::{CellValue, Matrix};

/// Hashable identity of a cell value.
#[derive(Debug, PartialEq, Eq, Hash)]
enum SeenKey {
    Empty,
    Number(u64),
    Text(String),
}

impl From<&CellValue> for SeenKey {
    fn from(v: &CellValue) -> Self {
        match v {
            CellValue::Empty => SeenKey::Empty,
            // fold -0.0 into 0.0 so they compare equal
            CellValue::Number(n) => SeenKey::Number((n + 0.0).to_bits()),
            CellValue::Text(s) => SeenKey::Text(s.clone()),
        }
    }
}

/// Walk `col` top to bottom (header included) and empty every value that
/// already appeared above it. Rows are never removed.
///
/// Returns how many cells were blanked.
pub fn dedup_column(matrix: &mut Matrix, col: usize) -> usize {
    let mut seen = HashSet::new();
    let mut blanked = 0;
    for row in matrix.iter_mut() {
        let Some(cell) = row.get_mut(col) else {
            continue;
        };
        if !seen.insert(SeenKey::from(&*cell)) && !cell.is_empty() {
            *cell = CellValue::Empty;
            blanked += 1;
        }
    }
    blanked
}

/// Deduplicate `col` of the grid and load the result atomically.
pub fn dedup<G: GridAccess + ?Sized>(grid: &mut G, col: usize) -> Result<usize> {
    if col >= grid.col_count() {
        return Err(GridError::OutOfBounds {
            row: 0,
            col,
            rows: grid.row_count(),
            cols: grid.col_count(),
        });
    }
    let mut matrix = grid.matrix();
    let blanked = dedup_column(&mut matrix, col);
    grid.load_matrix(matrix)?;
    tracing::info!(col, blanked, "removed duplicate values");
    Ok(blanked)
}
