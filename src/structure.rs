//! Row and column insertion/deletion anchored at the current selection.

use crate::error::{GridError, Result};
use crate::grid::GridAccess;
use crate::selection::SelectionTracker;

/// Insert a row below the selected cell's row, or below the last row.
///
/// Returns the index of the new row.
pub fn add_row<G: GridAccess + ?Sized>(grid: &mut G, selection: &SelectionTracker) -> Result<usize> {
    let anchor = match selection.point() {
        Some(p) => p.row,
        None => grid.row_count().saturating_sub(1),
    };
    grid.insert_row_after(anchor)?;
    let inserted = if grid.row_count() == 1 { 0 } else { anchor + 1 };
    tracing::info!(row = inserted, "added row");
    Ok(inserted)
}

/// Remove the row of the selected cell.
pub fn delete_row<G: GridAccess + ?Sized>(grid: &mut G, selection: &SelectionTracker) -> Result<usize> {
    let row = selection.require_point("select a row to delete")?.row;
    let rows = grid.row_count();
    if row >= rows {
        return Err(GridError::InvalidSelection { row, rows });
    }
    grid.remove_row(row)?;
    tracing::info!(row, "deleted row");
    Ok(row)
}

/// Insert a column right of the selected column, or after the last one.
///
/// Returns the index of the new column.
pub fn add_column<G: GridAccess + ?Sized>(
    grid: &mut G,
    selection: &SelectionTracker,
) -> Result<usize> {
    let anchor = selection
        .column()
        .unwrap_or_else(|| grid.col_count().saturating_sub(1));
    grid.insert_col_after(anchor)?;
    let inserted = if grid.col_count() == 1 { 0 } else { anchor + 1 };
    tracing::info!(col = inserted, "added column");
    Ok(inserted)
}

/// Remove the selected column and forget the column selection.
pub fn delete_column<G: GridAccess + ?Sized>(
    grid: &mut G,
    selection: &mut SelectionTracker,
) -> Result<usize> {
    let col = selection.require_column("select a column to delete")?;
    grid.remove_col(col)?;
    selection.clear_column();
    tracing::info!(col, "deleted column");
    Ok(col)
}
