//! Cell values, coordinates and the matrix they live in

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single scalar stored in the grid.
///
/// Serialized untagged so a snapshot is plain nested JSON arrays of
/// `null` / numbers / strings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

/// Rows of cells; row 0 is the header by convention.
pub type Matrix = Vec<Vec<CellValue>>;

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True when the value is text whose first character is `=`.
    ///
    /// Purely syntactic; nothing is parsed here.
    pub fn is_formula_marker(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.starts_with('='))
    }

    /// Numeric coercion used by chart extraction.
    ///
    /// Numbers pass through; text is trimmed and parsed. Empty cells and
    /// anything that does not parse to a finite number yield `None`.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => parse_finite(s.trim()),
            _ => None,
        }
    }

    /// Interpret raw user input the way a cell editor does: integers and
    /// floats become numbers, blank input clears the cell, everything
    /// else (formula markers included) is kept as text.
    pub fn parse_input(s: &str) -> Self {
        if s.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Number(i as f64);
        }
        if let Some(f) = parse_finite(s) {
            return CellValue::Number(f);
        }
        CellValue::Text(s.to_string())
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

/// Render a number without a trailing `.0` for whole values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Position of a cell in the grid, 0-indexed and header-inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Check that every row has the same length as the first.
///
/// Returns the offending `(row, len, expected)` on failure.
pub fn check_rectangular(matrix: &[Vec<CellValue>]) -> Result<(), (usize, usize, usize)> {
    let Some(first) = matrix.first() else {
        return Ok(());
    };
    let expected = first.len();
    for (i, row) in matrix.iter().enumerate() {
        if row.len() != expected {
            return Err((i, row.len(), expected));
        }
    }
    Ok(())
}

/// The employee sheet a fresh session starts from.
pub fn default_seed() -> Matrix {
    let row = |cells: [CellValue; 3]| cells.to_vec();
    vec![
        row(["Name".into(), "Age".into(), "Salary".into()]),
        row(["Alice".into(), 25i64.into(), 5000i64.into()]),
        row(["Bob".into(), 30i64.into(), 7000i64.into()]),
        row(["Total".into(), "=SUM(B2:B3)".into(), "=SUM(C2:C3)".into()]),
        row(["Avg Age".into(), "=AVERAGE(B2:B3)".into(), CellValue::Empty]),
        row(["Max Salary".into(), CellValue::Empty, "=MAX(C2:C3)".into()]),
        row(["Min Age".into(), "=MIN(B2:B3)".into(), CellValue::Empty]),
        row(["Count Employees".into(), "=COUNT(B2:B3)".into(), CellValue::Empty]),
        row([
            "Eligible for Bonus".into(),
            "=IF(C2>6000, \"Yes\", \"No\")".into(),
            "=IF(C3>6000, \"Yes\", \"No\")".into(),
        ]),
        row([
            "Highest Salary".into(),
            "=VLOOKUP(MAX(C2:C3), C2:C3, 1, FALSE)".into(),
            CellValue::Empty,
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_marker_is_first_character_only() {
        assert!(CellValue::text("=SUM(1,2)").is_formula_marker());
        assert!(!CellValue::text("SUM(1,2)").is_formula_marker());
        assert!(!CellValue::text(" =1").is_formula_marker());
        assert!(!CellValue::Number(1.0).is_formula_marker());
        assert!(!CellValue::Empty.is_formula_marker());
    }

    #[test]
    fn parse_input_types() {
        assert_eq!(CellValue::parse_input("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::parse_input("2.5"), CellValue::Number(2.5));
        assert_eq!(CellValue::parse_input(""), CellValue::Empty);
        assert_eq!(CellValue::parse_input("inf"), CellValue::text("inf"));
        assert_eq!(CellValue::parse_input("=A1"), CellValue::text("=A1"));
    }

    #[test]
    fn numeric_coercion_skips_non_numbers() {
        assert_eq!(CellValue::text(" 12 ").to_number(), Some(12.0));
        assert_eq!(CellValue::text("notanumber").to_number(), None);
        assert_eq!(CellValue::text("NaN").to_number(), None);
        assert_eq!(CellValue::Empty.to_number(), None);
    }

    #[test]
    fn whole_numbers_display_without_fraction() {
        assert_eq!(CellValue::Number(25.0).to_string(), "25");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn seed_is_rectangular() {
        let seed = default_seed();
        assert_eq!(seed.len(), 10);
        assert!(check_rectangular(&seed).is_ok());
    }

    #[test]
    fn ragged_matrix_reports_offending_row() {
        let m = vec![vec![CellValue::Empty; 2], vec![CellValue::Empty; 3]];
        assert_eq!(check_rectangular(&m), Err((1, 3, 2)));
    }

    #[test]
    fn snapshot_json_shape() {
        let row = vec![CellValue::text("a"), CellValue::Number(1.5), CellValue::Empty];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["a",1.5,null]"#);
        let back: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
