//! Access layer over the grid widget.
//!
//! [`GridAccess`] is the contract every command goes through: cell
//! values, the metadata side table, structural alters, undo/redo,
//! selection notifications and render requests. [`MemoryGrid`] is the
//! in-process widget backing it; it is the system of record for values
//! and metadata.

use std::collections::{HashMap, VecDeque};

use crossbeam_channel::Sender;

use crate::error::{GridError, Result};
use crate::style::CellMeta;
use crate::value::{CellValue, Coord, Matrix, check_rectangular};

/// History entries kept for undo.
const HISTORY_LIMIT: usize = 256;

/// A selection change as reported by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    /// Anchor (`start_*`) and focus (`end_*`) corners of the selection
    Range {
        start_row: usize,
        start_col: usize,
        end_row: usize,
        end_col: usize,
    },
    /// Nothing is selected any more
    Cleared,
}

/// Structural edit anchored at an index, with its direction implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alter {
    InsertRowBelow(usize),
    RemoveRow(usize),
    InsertColRight(usize),
    RemoveCol(usize),
}

pub trait GridAccess {
    /// Copy of the full matrix.
    fn matrix(&self) -> Matrix;
    fn cell(&self, row: usize, col: usize) -> Result<CellValue>;
    fn set_cell(&mut self, row: usize, col: usize, value: CellValue) -> Result<()>;
    /// Replace every value at once. Non-rectangular input is rejected
    /// without touching the current state.
    fn load_matrix(&mut self, matrix: Matrix) -> Result<()>;
    fn cell_meta(&self, row: usize, col: usize) -> Result<CellMeta>;
    /// Merge `meta` into the cell's metadata, attribute by attribute.
    fn set_cell_meta(&mut self, row: usize, col: usize, meta: CellMeta) -> Result<()>;
    /// Drop the presentation class of a cell, keeping its style.
    fn clear_cell_class(&mut self, row: usize, col: usize) -> Result<()>;
    fn row_count(&self) -> usize;
    fn col_count(&self) -> usize;
    fn alter(&mut self, alter: Alter) -> Result<()>;
    /// Returns false when there was nothing to undo.
    fn undo(&mut self) -> bool;
    fn redo(&mut self) -> bool;
    /// Register a subscriber for selection events.
    fn on_selection_change(&mut self, subscriber: Sender<SelectionEvent>);
    /// Mark cached visual state as stale.
    fn request_render(&mut self);
    /// Consume a pending render request.
    fn take_render_request(&mut self) -> bool;

    fn insert_row_after(&mut self, row: usize) -> Result<()> {
        self.alter(Alter::InsertRowBelow(row))
    }

    fn remove_row(&mut self, row: usize) -> Result<()> {
        self.alter(Alter::RemoveRow(row))
    }

    fn insert_col_after(&mut self, col: usize) -> Result<()> {
        self.alter(Alter::InsertColRight(col))
    }

    fn remove_col(&mut self, col: usize) -> Result<()> {
        self.alter(Alter::RemoveCol(col))
    }
}

/// One history entry. It holds the state on the other side of the change;
/// applying it swaps that state with the grid's, which turns an undo entry
/// into the matching redo entry and back.
#[derive(Debug, Clone)]
enum Change {
    Cell { coord: Coord, value: CellValue },
    Whole { rows: Matrix, cols: usize },
}

/// In-memory grid widget.
#[derive(Debug, Default)]
pub struct MemoryGrid {
    rows: Matrix,
    /// Column count, tracked separately so a grid with no rows keeps it
    cols: usize,
    meta: HashMap<Coord, CellMeta>,
    undo_stack: VecDeque<Change>,
    redo_stack: Vec<Change>,
    subscribers: Vec<Sender<SelectionEvent>>,
    render_pending: bool,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from an initial matrix; no undo history is recorded.
    pub fn with_matrix(matrix: Matrix) -> Result<Self> {
        let mut grid = Self::new();
        grid.replace_rows(matrix)?;
        grid.undo_stack.clear();
        Ok(grid)
    }

    /// User selection from the widget side: notify every subscriber.
    pub fn select(&mut self, start: Coord, end: Coord) -> Result<()> {
        self.check(start.row, start.col)?;
        self.check(end.row, end.col)?;
        self.emit(SelectionEvent::Range {
            start_row: start.row,
            start_col: start.col,
            end_row: end.row,
            end_col: end.col,
        });
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.emit(SelectionEvent::Cleared);
    }

    fn emit(&mut self, event: SelectionEvent) {
        tracing::trace!(?event, "selection changed");
        // drop subscribers whose receiving side is gone
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    fn check(&self, row: usize, col: usize) -> Result<()> {
        if row < self.rows.len() && col < self.cols {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                row,
                col,
                rows: self.rows.len(),
                cols: self.cols,
            })
        }
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row < self.rows.len() {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                row,
                col: 0,
                rows: self.rows.len(),
                cols: self.cols,
            })
        }
    }

    fn check_col(&self, col: usize) -> Result<()> {
        if col < self.cols {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                row: 0,
                col,
                rows: self.rows.len(),
                cols: self.cols,
            })
        }
    }

    fn replace_rows(&mut self, matrix: Matrix) -> Result<()> {
        if let Err((row, len, expected)) = check_rectangular(&matrix) {
            return Err(GridError::MalformedMatrix { row, len, expected });
        }
        let cols = matrix.first().map_or(0, Vec::len);
        let prev = Change::Whole {
            rows: std::mem::replace(&mut self.rows, matrix),
            cols: std::mem::replace(&mut self.cols, cols),
        };
        self.record(prev);
        Ok(())
    }

    /// Run a structural edit and record it as one undoable change.
    fn restructure(&mut self, edit: impl FnOnce(&mut Matrix, &mut usize)) {
        let prev = Change::Whole {
            rows: self.rows.clone(),
            cols: self.cols,
        };
        edit(&mut self.rows, &mut self.cols);
        self.record(prev);
    }

    fn record(&mut self, change: Change) {
        self.redo_stack.clear();
        self.push_undo(change);
        self.render_pending = true;
    }

    fn push_undo(&mut self, change: Change) {
        self.undo_stack.push_back(change);
        if self.undo_stack.len() > HISTORY_LIMIT {
            self.undo_stack.pop_front();
        }
    }

    /// Swap the stored state into the grid, leaving the replaced state in
    /// `change` so it can be applied again in the other direction.
    fn swap(&mut self, change: &mut Change) {
        match change {
            Change::Cell { coord, value } => {
                if let Some(cell) = self
                    .rows
                    .get_mut(coord.row)
                    .and_then(|r| r.get_mut(coord.col))
                {
                    std::mem::swap(cell, value);
                }
            }
            Change::Whole { rows, cols } => {
                std::mem::swap(&mut self.rows, rows);
                std::mem::swap(&mut self.cols, cols);
            }
        }
        self.render_pending = true;
    }
}

impl GridAccess for MemoryGrid {
    fn matrix(&self) -> Matrix {
        self.rows.clone()
    }

    fn cell(&self, row: usize, col: usize) -> Result<CellValue> {
        self.check(row, col)?;
        Ok(self.rows[row][col].clone())
    }

    fn set_cell(&mut self, row: usize, col: usize, value: CellValue) -> Result<()> {
        self.check(row, col)?;
        let prev = std::mem::replace(&mut self.rows[row][col], value);
        self.record(Change::Cell {
            coord: Coord::new(row, col),
            value: prev,
        });
        Ok(())
    }

    fn load_matrix(&mut self, matrix: Matrix) -> Result<()> {
        self.replace_rows(matrix)
    }

    fn cell_meta(&self, row: usize, col: usize) -> Result<CellMeta> {
        self.check(row, col)?;
        Ok(self
            .meta
            .get(&Coord::new(row, col))
            .cloned()
            .unwrap_or_default())
    }

    fn set_cell_meta(&mut self, row: usize, col: usize, meta: CellMeta) -> Result<()> {
        self.check(row, col)?;
        self.meta
            .entry(Coord::new(row, col))
            .or_default()
            .merge(&meta);
        Ok(())
    }

    fn clear_cell_class(&mut self, row: usize, col: usize) -> Result<()> {
        self.check(row, col)?;
        if let Some(meta) = self.meta.get_mut(&Coord::new(row, col)) {
            meta.class_name = None;
        }
        Ok(())
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn col_count(&self) -> usize {
        self.cols
    }

    fn alter(&mut self, alter: Alter) -> Result<()> {
        match alter {
            Alter::InsertRowBelow(row) => {
                // an empty grid accepts its first row at index 0
                if !(self.rows.is_empty() && row == 0) {
                    self.check_row(row)?;
                }
                let at = if self.rows.is_empty() { 0 } else { row + 1 };
                self.restructure(|rows, cols| rows.insert(at, vec![CellValue::Empty; *cols]));
            }
            Alter::RemoveRow(row) => {
                self.check_row(row)?;
                self.restructure(|rows, _| {
                    rows.remove(row);
                });
            }
            Alter::InsertColRight(col) => {
                if !(self.cols == 0 && col == 0) {
                    self.check_col(col)?;
                }
                let at = if self.cols == 0 { 0 } else { col + 1 };
                self.restructure(|rows, cols| {
                    for r in rows.iter_mut() {
                        r.insert(at, CellValue::Empty);
                    }
                    *cols += 1;
                });
            }
            Alter::RemoveCol(col) => {
                self.check_col(col)?;
                self.restructure(|rows, cols| {
                    for r in rows.iter_mut() {
                        r.remove(col);
                    }
                    *cols -= 1;
                });
            }
        }
        tracing::debug!(?alter, rows = self.rows.len(), cols = self.cols, "grid altered");
        Ok(())
    }

    fn undo(&mut self) -> bool {
        let Some(mut change) = self.undo_stack.pop_back() else {
            return false;
        };
        self.swap(&mut change);
        self.redo_stack.push(change);
        true
    }

    fn redo(&mut self) -> bool {
        let Some(mut change) = self.redo_stack.pop() else {
            return false;
        };
        self.swap(&mut change);
        self.push_undo(change);
        true
    }

    fn on_selection_change(&mut self, subscriber: Sender<SelectionEvent>) {
        self.subscribers.push(subscriber);
    }

    fn request_render(&mut self) {
        self.render_pending = true;
    }

    fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.render_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{CellStyle, FontWeight};

    fn grid(rows: usize, cols: usize) -> MemoryGrid {
        let m = (0..rows)
            .map(|r| (0..cols).map(|c| CellValue::from((r * cols + c) as i64)).collect())
            .collect();
        MemoryGrid::with_matrix(m).unwrap()
    }

    #[test]
    fn out_of_bounds_access_fails() {
        let mut g = grid(2, 2);
        assert!(matches!(g.cell(2, 0), Err(GridError::OutOfBounds { .. })));
        assert!(matches!(
            g.set_cell(0, 5, CellValue::Empty),
            Err(GridError::OutOfBounds { .. })
        ));
        assert!(matches!(g.remove_row(9), Err(GridError::OutOfBounds { .. })));
    }

    #[test]
    fn malformed_load_keeps_previous_state() {
        let mut g = grid(2, 2);
        let before = g.matrix();
        let bad = vec![vec![CellValue::Empty; 2], vec![CellValue::Empty; 1]];
        assert!(matches!(
            g.load_matrix(bad),
            Err(GridError::MalformedMatrix { row: 1, .. })
        ));
        assert_eq!(g.matrix(), before);
    }

    #[test]
    fn structural_edits_stay_rectangular() {
        let mut g = grid(2, 3);
        g.insert_row_after(0).unwrap();
        g.insert_col_after(2).unwrap();
        g.remove_col(0).unwrap();
        g.remove_row(2).unwrap();
        let m = g.matrix();
        assert_eq!(g.row_count(), 2);
        assert_eq!(g.col_count(), 3);
        assert!(m.iter().all(|r| r.len() == 3));
        assert_eq!(m[1], vec![CellValue::Empty; 3]);
    }

    #[test]
    fn empty_grid_grows_from_nothing() {
        let mut g = MemoryGrid::new();
        g.insert_col_after(0).unwrap();
        g.insert_row_after(0).unwrap();
        assert_eq!(g.matrix(), vec![vec![CellValue::Empty]]);
    }

    #[test]
    fn meta_is_merged_and_survives_value_changes() {
        let mut g = grid(1, 1);
        let bold = CellMeta {
            style: CellStyle {
                font_weight: Some(FontWeight::Bold),
                ..Default::default()
            },
            class_name: None,
        };
        g.set_cell_meta(0, 0, bold).unwrap();
        let red = CellMeta {
            style: CellStyle {
                color: Some("red".into()),
                ..Default::default()
            },
            class_name: None,
        };
        g.set_cell_meta(0, 0, red).unwrap();
        g.set_cell(0, 0, CellValue::Empty).unwrap();
        let meta = g.cell_meta(0, 0).unwrap();
        assert!(meta.style.is_bold());
        assert_eq!(meta.style.color.as_deref(), Some("red"));
    }

    #[test]
    fn stale_meta_reappears_when_index_is_reused() {
        let mut g = grid(2, 1);
        let meta = CellMeta {
            class_name: Some("highlight".into()),
            ..Default::default()
        };
        g.set_cell_meta(1, 0, meta).unwrap();
        g.remove_row(1).unwrap();
        g.insert_row_after(0).unwrap();
        assert!(g.cell_meta(1, 0).unwrap().has_class("highlight"));
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut g = grid(1, 2);
        let original = g.matrix();
        g.set_cell(0, 0, "x".into()).unwrap();
        g.insert_row_after(0).unwrap();
        assert!(g.undo());
        assert!(g.undo());
        assert_eq!(g.matrix(), original);
        assert!(!g.undo());
        assert!(g.redo());
        assert_eq!(g.cell(0, 0).unwrap(), CellValue::text("x"));
        g.set_cell(0, 1, "y".into()).unwrap();
        assert!(!g.redo());
    }

    #[test]
    fn repeated_undo_redo_keeps_both_directions() {
        let mut g = grid(2, 2);
        let original = g.matrix();
        g.set_cell(1, 1, "x".into()).unwrap();
        g.remove_row(0).unwrap();
        let edited = g.matrix();
        for _ in 0..3 {
            assert!(g.undo());
            assert!(g.undo());
            assert_eq!(g.matrix(), original);
            assert_eq!(g.col_count(), 2);
            assert!(g.redo());
            assert!(g.redo());
            assert_eq!(g.matrix(), edited);
        }
    }

    #[test]
    fn history_is_capped() {
        let mut g = grid(1, 1);
        for i in 0..HISTORY_LIMIT + 44 {
            g.set_cell(0, 0, CellValue::from(i as i64)).unwrap();
        }
        let mut undone = 0;
        while g.undo() {
            undone += 1;
        }
        assert_eq!(undone, HISTORY_LIMIT);
        // the oldest 44 edits fell off the front
        assert_eq!(g.cell(0, 0).unwrap(), CellValue::from(43i64));
    }

    #[test]
    fn selection_events_reach_subscribers() {
        let mut g = grid(3, 3);
        let (tx, rx) = crossbeam_channel::unbounded();
        g.on_selection_change(tx);
        g.select(Coord::new(0, 1), Coord::new(2, 1)).unwrap();
        g.deselect();
        assert_eq!(
            rx.try_recv().unwrap(),
            SelectionEvent::Range {
                start_row: 0,
                start_col: 1,
                end_row: 2,
                end_col: 1
            }
        );
        assert_eq!(rx.try_recv().unwrap(), SelectionEvent::Cleared);
        assert!(g.select(Coord::new(3, 0), Coord::new(0, 0)).is_err());
    }

    #[test]
    fn render_requests_are_consumed_once() {
        let mut g = grid(1, 1);
        g.take_render_request();
        g.request_render();
        assert!(g.take_render_request());
        assert!(!g.take_render_request());
    }
}
