//! Find & replace over the whole matrix, header included.

use crate::error::{GridError, Result};
use crate::grid::GridAccess;
use crate::style::CellMeta;
use crate::value::{CellValue, Coord, Matrix};

/// What a find/replace request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindOutcome {
    /// No replacement given: matched cells were tagged with the highlight class
    Highlighted(Vec<Coord>),
    /// Number of cells replaced
    Replaced(usize),
}

/// Coordinates whose current value is exactly `target`.
///
/// Comparison is against text values only and is case-sensitive.
pub fn find(matrix: &Matrix, target: &str) -> Vec<Coord> {
    matrix
        .iter()
        .enumerate()
        .flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, v)| v.as_text() == Some(target))
                .map(move |(c, _)| Coord::new(r, c))
        })
        .collect()
}

/// Copy of `matrix` with every cell equal to `target` set to `replacement`.
pub fn replace_all(matrix: &Matrix, target: &str, replacement: &str) -> Matrix {
    matrix
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| {
                    if v.as_text() == Some(target) {
                        CellValue::text(replacement)
                    } else {
                        v.clone()
                    }
                })
                .collect()
        })
        .collect()
}

/// Find `target`; highlight matches when `replacement` is blank,
/// otherwise replace them and load the result in one step.
pub fn find_replace<G: GridAccess + ?Sized>(
    grid: &mut G,
    target: &str,
    replacement: &str,
    highlight_class: &str,
) -> Result<FindOutcome> {
    let matrix = grid.matrix();
    let found = find(&matrix, target);
    if found.is_empty() {
        return Err(GridError::NoMatch(target.to_string()));
    }

    if replacement.trim().is_empty() {
        for c in &found {
            grid.set_cell_meta(
                c.row,
                c.col,
                CellMeta {
                    class_name: Some(highlight_class.to_string()),
                    ..Default::default()
                },
            )?;
        }
        grid.request_render();
        tracing::info!(needle = target, matches = found.len(), "highlighted matches");
        return Ok(FindOutcome::Highlighted(found));
    }

    grid.load_matrix(replace_all(&matrix, target, replacement))?;
    tracing::info!(needle = target, replacement, count = found.len(), "replaced matches");
    Ok(FindOutcome::Replaced(found.len()))
}

/// Remove the highlight class from every cell carrying it.
pub fn clear_highlights<G: GridAccess + ?Sized>(grid: &mut G, highlight_class: &str) -> Result<usize> {
    let mut cleared = 0;
    for row in 0..grid.row_count() {
        for col in 0..grid.col_count() {
            if grid.cell_meta(row, col)?.has_class(highlight_class) {
                grid.clear_cell_class(row, col)?;
                cleared += 1;
            }
        }
    }
    if cleared > 0 {
        grid.request_render();
    }
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MemoryGrid;
    use pretty_assertions::assert_eq;

    fn sample() -> Matrix {
        vec![
            vec!["Name".into(), "Dept".into()],
            vec!["Ann".into(), "ops".into()],
            vec!["Bo".into(), "Ops".into()],
            vec!["ops".into(), 3i64.into()],
        ]
    }

    #[test]
    fn find_is_exact_and_case_sensitive() {
        assert_eq!(find(&sample(), "ops"), vec![Coord::new(1, 1), Coord::new(3, 0)]);
        assert!(find(&sample(), "op").is_empty());
        assert!(find(&Vec::new(), "ops").is_empty());
    }

    #[test]
    fn no_match_is_reported() {
        let mut g = MemoryGrid::with_matrix(sample()).unwrap();
        assert!(matches!(
            find_replace(&mut g, "zzz", "y", "highlight"),
            Err(GridError::NoMatch(t)) if t == "zzz"
        ));
    }

    #[test]
    fn blank_replacement_highlights_without_changing_values() {
        let mut g = MemoryGrid::with_matrix(sample()).unwrap();
        let out = find_replace(&mut g, "ops", "   ", "highlight").unwrap();
        assert_eq!(out, FindOutcome::Highlighted(vec![Coord::new(1, 1), Coord::new(3, 0)]));
        assert_eq!(g.matrix(), sample());
        assert!(g.cell_meta(3, 0).unwrap().has_class("highlight"));
        assert!(!g.cell_meta(2, 1).unwrap().has_class("highlight"));
        assert_eq!(clear_highlights(&mut g, "highlight").unwrap(), 2);
        assert!(!g.cell_meta(3, 0).unwrap().has_class("highlight"));
    }

    #[test]
    fn replace_changes_exactly_the_matches() {
        let mut g = MemoryGrid::with_matrix(sample()).unwrap();
        let out = find_replace(&mut g, "ops", "Operations", "highlight").unwrap();
        assert_eq!(out, FindOutcome::Replaced(2));
        let after = g.matrix();
        assert!(find(&after, "ops").is_empty());
        assert_eq!(find(&after, "Operations").len(), 2);
        assert_eq!(after[2][1], CellValue::text("Ops"));
    }
}
