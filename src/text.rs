//! In-place text functions on the selected cell.

use std::fmt;
use std::str::FromStr;

use crate::error::{GridError, Result};
use crate::grid::GridAccess;
use crate::selection::SelectionTracker;
use crate::value::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFn {
    Trim,
    Upper,
    Lower,
}

impl TextFn {
    pub fn apply(self, s: &str) -> String {
        match self {
            TextFn::Trim => s.trim().to_string(),
            TextFn::Upper => s.to_uppercase(),
            TextFn::Lower => s.to_lowercase(),
        }
    }
}

impl fmt::Display for TextFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TextFn::Trim => "TRIM",
            TextFn::Upper => "UPPER",
            TextFn::Lower => "LOWER",
        })
    }
}

impl FromStr for TextFn {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TRIM" => Ok(TextFn::Trim),
            "UPPER" => Ok(TextFn::Upper),
            "LOWER" => Ok(TextFn::Lower),
            other => Err(GridError::Unsupported(format!("text function '{other}'"))),
        }
    }
}

/// Rewrite the selected cell with `func`. Numbers and empty cells are
/// left alone; the return value says whether the cell changed.
pub fn apply_text_fn<G: GridAccess + ?Sized>(
    grid: &mut G,
    selection: &SelectionTracker,
    func: TextFn,
) -> Result<bool> {
    let at = selection.require_point("select a cell first")?;
    let current = grid.cell(at.row, at.col)?;
    let CellValue::Text(s) = &current else {
        return Ok(false);
    };
    let next = func.apply(s);
    if &next == s {
        return Ok(false);
    }
    grid.set_cell(at.row, at.col, CellValue::Text(next))?;
    tracing::info!(%func, cell = %at, "applied text function");
    Ok(true)
}
