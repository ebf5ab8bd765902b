//! The editing session: one grid, its selection tracker, the formula
//! engine and the snapshot gateway, owned together and handed to every
//! command by reference.

use std::path::Path;

use crate::chart::{self, ChartKind, ChartRequest};
use crate::dedup;
use crate::error::Result;
use crate::find::{self, FindOutcome};
use crate::formula::{self, BasicEngine, FormulaEngine, RenderInstruction};
use crate::grid::{GridAccess, MemoryGrid};
use crate::persist::{PersistenceGateway, SnapshotStore};
use crate::selection::SelectionTracker;
use crate::structure;
use crate::style::{self, CellStyle, Format};
use crate::text::{self, TextFn};
use crate::transfer::{self, TransferKind};
use crate::value::{CellValue, Coord, Matrix};

pub const DEFAULT_SNAPSHOT_KEY: &str = "spreadsheetData";
pub const DEFAULT_HIGHLIGHT_CLASS: &str = "highlight";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Slot the snapshot is saved under
    pub snapshot_key: String,
    /// Class name find tags matched cells with
    pub highlight_class: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            highlight_class: DEFAULT_HIGHLIGHT_CLASS.to_string(),
        }
    }
}

pub struct Session<S> {
    grid: MemoryGrid,
    selection: SelectionTracker,
    engine: Box<dyn FormulaEngine>,
    persistence: PersistenceGateway<S>,
    highlight_class: String,
}

impl<S: SnapshotStore> Session<S> {
    /// Start a session on `initial`, with nothing selected and an empty
    /// undo history.
    pub fn new(store: S, config: SessionConfig, initial: Matrix) -> Result<Self> {
        let mut grid = MemoryGrid::with_matrix(initial)?;
        let selection = SelectionTracker::attach(&mut grid);
        Ok(Self {
            grid,
            selection,
            engine: Box::new(BasicEngine),
            persistence: PersistenceGateway::new(store, config.snapshot_key),
            highlight_class: config.highlight_class,
        })
    }

    pub fn with_engine(mut self, engine: Box<dyn FormulaEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn grid(&self) -> &MemoryGrid {
        &self.grid
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn matrix(&self) -> Matrix {
        self.grid.matrix()
    }

    pub fn highlight_class(&self) -> &str {
        &self.highlight_class
    }

    pub fn snapshot_key(&self) -> &str {
        self.persistence.key()
    }

    /// Select the range from `anchor` to `focus` (inclusive).
    pub fn select(&mut self, anchor: Coord, focus: Coord) -> Result<()> {
        self.grid.select(anchor, focus)?;
        self.selection.sync();
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.grid.deselect();
        self.selection.sync();
    }

    /// Store raw editor input in the selected cell.
    pub fn edit_selected(&mut self, input: &str) -> Result<Coord> {
        let at = self.selection.require_point("select a cell to edit")?;
        self.grid.set_cell(at.row, at.col, CellValue::parse_input(input))?;
        tracing::debug!(cell = %at, "cell edited");
        Ok(at)
    }

    pub fn apply_format(&mut self, format: Format) -> Result<CellStyle> {
        style::apply_format(&mut self.grid, &self.selection, format)
    }

    pub fn find_replace(&mut self, target: &str, replacement: &str) -> Result<FindOutcome> {
        find::find_replace(&mut self.grid, target, replacement, &self.highlight_class)
    }

    pub fn clear_highlights(&mut self) -> Result<usize> {
        find::clear_highlights(&mut self.grid, &self.highlight_class)
    }

    /// Deduplicate the selected column.
    pub fn dedup(&mut self) -> Result<usize> {
        let col = self.selection.require_column("select a column to deduplicate")?;
        dedup::dedup(&mut self.grid, col)
    }

    pub fn add_row(&mut self) -> Result<usize> {
        structure::add_row(&mut self.grid, &self.selection)
    }

    pub fn delete_row(&mut self) -> Result<usize> {
        structure::delete_row(&mut self.grid, &self.selection)
    }

    pub fn add_column(&mut self) -> Result<usize> {
        structure::add_column(&mut self.grid, &self.selection)
    }

    pub fn delete_column(&mut self) -> Result<usize> {
        structure::delete_column(&mut self.grid, &mut self.selection)
    }

    pub fn apply_text_fn(&mut self, func: TextFn) -> Result<bool> {
        text::apply_text_fn(&mut self.grid, &self.selection, func)
    }

    pub fn create_chart(&self, kind: ChartKind) -> Result<ChartRequest> {
        chart::create_chart(&self.grid.matrix(), kind)
    }

    pub fn save(&mut self) -> Result<()> {
        let matrix = self.grid.matrix();
        self.persistence.save(&matrix)
    }

    /// Load the saved snapshot, if any. Returns false when there was
    /// nothing saved; on a corrupt snapshot the grid is left as it was.
    pub fn restore(&mut self) -> Result<bool> {
        match self.persistence.restore()? {
            Some(matrix) => {
                self.grid.load_matrix(matrix)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn undo(&mut self) -> bool {
        self.grid.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.grid.redo()
    }

    pub fn export(&self, kind: TransferKind, path: &Path) -> Result<usize> {
        transfer::export(kind, &self.grid.matrix(), path)
    }

    /// Replace the grid with the file's contents. Returns the row count.
    pub fn import(&mut self, kind: TransferKind, path: &Path) -> Result<usize> {
        let matrix = transfer::import(kind, path)?;
        let rows = matrix.len();
        self.grid.load_matrix(matrix)?;
        Ok(rows)
    }

    /// Render instruction for one visible cell.
    pub fn render_cell(&self, row: usize, col: usize) -> Result<RenderInstruction> {
        let value = self.grid.cell(row, col)?;
        let meta = self.grid.cell_meta(row, col)?;
        Ok(formula::render_cell(
            &value,
            &meta,
            &self.highlight_class,
            self.engine.as_ref(),
        ))
    }

    /// True once per batch of changes that need a redraw.
    pub fn take_render_request(&mut self) -> bool {
        self.grid.take_render_request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;
    use crate::formula::{EvalContext, EvalError, EvalValue, FormulaOutcome};
    use crate::persist::MemoryStore;
    use crate::value::default_seed;

    fn session() -> Session<MemoryStore> {
        Session::new(MemoryStore::default(), SessionConfig::default(), default_seed()).unwrap()
    }

    #[test]
    fn edit_requires_selection_and_parses_input() {
        let mut s = session();
        assert!(matches!(s.edit_selected("1"), Err(GridError::NoSelection(_))));
        s.select(Coord::new(1, 1), Coord::new(1, 1)).unwrap();
        s.edit_selected("41.5").unwrap();
        assert_eq!(s.grid().cell(1, 1).unwrap(), CellValue::Number(41.5));
        s.edit_selected("").unwrap();
        assert_eq!(s.grid().cell(1, 1).unwrap(), CellValue::Empty);
    }

    #[test]
    fn dedup_needs_a_column_selection() {
        let mut s = session();
        s.select(Coord::new(0, 2), Coord::new(0, 2)).unwrap();
        assert!(matches!(s.dedup(), Err(GridError::NoSelection(_))));
        s.select(Coord::new(0, 2), Coord::new(9, 2)).unwrap();
        // salaries never repeat
        assert_eq!(s.dedup().unwrap(), 0);
    }

    #[test]
    fn out_of_bounds_selection_is_rejected() {
        let mut s = session();
        assert!(matches!(
            s.select(Coord::new(10, 0), Coord::new(10, 0)),
            Err(GridError::OutOfBounds { .. })
        ));
        assert_eq!(s.selection().point(), None);
    }

    struct Rejecting;

    impl FormulaEngine for Rejecting {
        fn evaluate(&self, expr: &str, _ctx: &EvalContext) -> std::result::Result<EvalValue, EvalError> {
            Err(EvalError::Parse(expr.to_string()))
        }
    }

    #[test]
    fn engine_is_pluggable() {
        let s = session().with_engine(Box::new(Rejecting));
        let r = s.render_cell(3, 1).unwrap();
        assert_eq!(r.text, "=SUM(B2:B3)");
        assert_eq!(r.formula, FormulaOutcome::Failed(EvalError::Parse("SUM(B2:B3)".into())));
        assert_eq!(s.render_cell(0, 0).unwrap().formula, FormulaOutcome::NotFormula);
    }
}
