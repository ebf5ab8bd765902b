//! Derived selection state.
//!
//! The tracker is the single subscriber to the grid's selection events.
//! Everything else reads its state synchronously and must cope with there
//! being no selection at all.

use crossbeam_channel::{Receiver, unbounded};

use crate::error::{GridError, Result};
use crate::grid::{GridAccess, SelectionEvent};
use crate::value::Coord;

#[derive(Debug)]
pub struct SelectionTracker {
    events: Receiver<SelectionEvent>,
    point: Option<Coord>,
    /// Value at `point` when it was selected
    column: Option<usize>,
}

impl SelectionTracker {
    /// Subscribe to `grid` and start with nothing selected.
    pub fn attach<G: GridAccess + ?Sized>(grid: &mut G) -> Self {
        let (tx, rx) = unbounded();
        grid.on_selection_change(tx);
        Self {
            events: rx,
            point: None,
            column: None,
        }
    }

    /// Drain pending selection events, applying them in order.
    pub fn sync(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: SelectionEvent) {
        match event {
            SelectionEvent::Range {
                start_row,
                start_col,
                end_row,
                end_col,
            } => {
                // a column selection spans rows within one column
                self.column = (start_col == end_col && start_row != end_row).then_some(start_col);
                self.point = Some(Coord::new(start_row, start_col));
                tracing::debug!(
                    point = %Coord::new(start_row, start_col),
                    column = ?self.column,
                    "selection updated"
                );
            }
            SelectionEvent::Cleared => {
                self.point = None;
                self.column = None;
                tracing::debug!("selection cleared");
            }
        }
    }

    pub fn point(&self) -> Option<Coord> {
        self.point
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    /// The point selection, or `NoSelection` carrying `hint`.
    pub fn require_point(&self, hint: &'static str) -> Result<Coord> {
        self.point.ok_or(GridError::NoSelection(hint))
    }

    pub fn require_column(&self, hint: &'static str) -> Result<usize> {
        self.column.ok_or(GridError::NoSelection(hint))
    }

    /// Forget the column selection, e.g. after that column was removed.
    pub fn clear_column(&mut self) {
        self.column = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MemoryGrid;

    fn setup() -> (MemoryGrid, SelectionTracker) {
        let m = vec![
            vec!["a".into(), "b".into()],
            vec!["c".into(), "d".into()],
            vec!["e".into(), "f".into()],
        ];
        let mut grid = MemoryGrid::with_matrix(m).unwrap();
        let tracker = SelectionTracker::attach(&mut grid);
        (grid, tracker)
    }

    #[test]
    fn starts_empty() {
        let (_grid, mut t) = setup();
        t.sync();
        assert_eq!(t.point(), None);
        assert!(matches!(t.require_point("x"), Err(GridError::NoSelection("x"))));
        assert!(t.require_column("y").is_err());
    }

    #[test]
    fn single_cell_sets_point_only() {
        let (mut grid, mut t) = setup();
        grid.select(Coord::new(1, 1), Coord::new(1, 1)).unwrap();
        t.sync();
        assert_eq!(t.point(), Some(Coord::new(1, 1)));
        assert_eq!(t.column(), None);
    }

    #[test]
    fn vertical_span_selects_column() {
        let (mut grid, mut t) = setup();
        grid.select(Coord::new(2, 0), Coord::new(0, 0)).unwrap();
        t.sync();
        assert_eq!(t.column(), Some(0));
        assert_eq!(t.point(), Some(Coord::new(2, 0)));
    }

    #[test]
    fn rectangular_span_clears_column_keeps_anchor() {
        let (mut grid, mut t) = setup();
        grid.select(Coord::new(0, 1), Coord::new(2, 1)).unwrap();
        grid.select(Coord::new(0, 0), Coord::new(2, 1)).unwrap();
        t.sync();
        assert_eq!(t.column(), None);
        assert_eq!(t.point(), Some(Coord::new(0, 0)));
    }

    #[test]
    fn cleared_event_resets_everything() {
        let (mut grid, mut t) = setup();
        grid.select(Coord::new(0, 1), Coord::new(2, 1)).unwrap();
        grid.deselect();
        t.sync();
        assert_eq!(t.point(), None);
        assert_eq!(t.column(), None);
    }
}
