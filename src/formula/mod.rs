//! Display-time formula checks
//!
//! A cell whose text starts with `=` is a formula marker. When such a cell
//! is drawn, the expression after the `=` is handed to a [`FormulaEngine`]
//! against a brand new, empty single-sheet [`EvalContext`]. Nothing is
//! cached between cells or between frames, and there is no dependency
//! tracking: a reference such as `B2` resolves against the empty
//! evaluation sheet, never against the grid.
//!
//! A failed evaluation never touches the stored value. It only marks the
//! render instruction as failed so the caller can notify the user.

mod engine;
mod parser;

use std::fmt;

use thiserror::Error;

use crate::style::{CellMeta, CellStyle};
use crate::value::{CellValue, format_number};

pub use engine::BasicEngine;
pub use parser::{Expr, parse_expression};

/// Name of the only sheet inside an evaluation context.
pub const EVAL_SHEET: &str = "Sheet1";

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

/// Spreadsheet error values. These are results, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorValue {
    Div0,
    NotAvailable,
    Value,
    Num,
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorValue::Div0 => "#DIV/0!",
            ErrorValue::NotAvailable => "#N/A",
            ErrorValue::Value => "#VALUE!",
            ErrorValue::Num => "#NUM!",
        })
    }
}

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Empty,
    Error(ErrorValue),
}

impl fmt::Display for EvalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalValue::Number(n) => f.write_str(&format_number(*n)),
            EvalValue::Text(s) => f.write_str(s),
            EvalValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            EvalValue::Empty => Ok(()),
            EvalValue::Error(e) => write!(f, "{e}"),
        }
    }
}

/// An ephemeral single-sheet workbook with no data in it.
#[derive(Debug, Clone)]
pub struct EvalContext {
    sheet: String,
}

impl EvalContext {
    /// Build the fresh context used for one evaluation.
    pub fn single_sheet() -> Self {
        Self {
            sheet: EVAL_SHEET.to_string(),
        }
    }

    /// Resolve a cell on a sheet. The evaluation sheet holds nothing, so
    /// every cell on it is empty; any other sheet does not exist.
    pub fn lookup(&self, sheet: Option<&str>, _row: usize, _col: usize) -> Result<EvalValue, EvalError> {
        match sheet {
            None => Ok(EvalValue::Empty),
            Some(name) if name.eq_ignore_ascii_case(&self.sheet) => Ok(EvalValue::Empty),
            Some(name) => Err(EvalError::InvalidReference(format!("{name}!"))),
        }
    }
}

/// Contract for the component that actually computes formulas.
pub trait FormulaEngine {
    /// Evaluate `expr` (without the leading `=`) in `ctx`.
    fn evaluate(&self, expr: &str, ctx: &EvalContext) -> Result<EvalValue, EvalError>;
}

/// What the formula check concluded about one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaOutcome {
    NotFormula,
    Evaluated(EvalValue),
    Failed(EvalError),
}

/// Everything needed to draw one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderInstruction {
    /// Text shown in the cell (the stored value)
    pub text: String,
    pub style: CellStyle,
    /// Foreground colour to draw with; `None` means the default
    pub color: Option<String>,
    pub highlighted: bool,
    pub formula: FormulaOutcome,
}

impl RenderInstruction {
    pub fn failed(&self) -> Option<&EvalError> {
        match &self.formula {
            FormulaOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Evaluate the formula behind `value`, if it carries a formula marker.
pub fn check_formula(value: &CellValue, engine: &dyn FormulaEngine) -> FormulaOutcome {
    let Some(text) = value.as_text().filter(|_| value.is_formula_marker()) else {
        return FormulaOutcome::NotFormula;
    };
    let ctx = EvalContext::single_sheet();
    match engine.evaluate(&text[1..], &ctx) {
        Ok(v) => FormulaOutcome::Evaluated(v),
        Err(e) => {
            tracing::debug!(formula = text, error = %e, "formula evaluation failed");
            FormulaOutcome::Failed(e)
        }
    }
}

/// Turn a stored value plus its metadata into a render instruction.
///
/// Pure apart from the engine call: the same inputs always give the same
/// instruction, and neither the value nor the metadata is modified.
pub fn render_cell(
    value: &CellValue,
    meta: &CellMeta,
    highlight_class: &str,
    engine: &dyn FormulaEngine,
) -> RenderInstruction {
    let formula = check_formula(value, engine);
    // a formula that evaluates is drawn in the default colour, a failing
    // one keeps whatever colour the cell was styled with
    let color = match formula {
        FormulaOutcome::Evaluated(_) => None,
        FormulaOutcome::NotFormula | FormulaOutcome::Failed(_) => meta.style.color.clone(),
    };
    RenderInstruction {
        text: value.to_string(),
        style: meta.style.clone(),
        color,
        highlighted: meta.has_class(highlight_class),
        formula,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::FontWeight;

    #[test]
    fn plain_values_are_not_evaluated() {
        let engine = BasicEngine;
        assert_eq!(
            check_formula(&CellValue::text("SUM(1,2)"), &engine),
            FormulaOutcome::NotFormula
        );
        assert_eq!(
            check_formula(&CellValue::Number(3.0), &engine),
            FormulaOutcome::NotFormula
        );
    }

    #[test]
    fn formula_marker_is_evaluated() {
        let engine = BasicEngine;
        assert_eq!(
            check_formula(&CellValue::text("=SUM(1,2)"), &engine),
            FormulaOutcome::Evaluated(EvalValue::Number(3.0))
        );
    }

    #[test]
    fn failure_keeps_text_and_style() {
        let engine = BasicEngine;
        let mut meta = CellMeta::default();
        meta.style.font_weight = Some(FontWeight::Bold);
        meta.style.color = Some("#ff0000".into());
        let value = CellValue::text("=NOPE(1)");
        let r = render_cell(&value, &meta, "highlight", &engine);
        assert_eq!(r.text, "=NOPE(1)");
        assert_eq!(r.style, meta.style);
        assert_eq!(r.color.as_deref(), Some("#ff0000"));
        assert!(matches!(r.failed(), Some(EvalError::UnknownFunction(_))));
    }

    #[test]
    fn evaluated_formulas_use_the_default_color() {
        let engine = BasicEngine;
        let mut meta = CellMeta::default();
        meta.style.color = Some("green".into());
        let r = render_cell(&CellValue::text("=1+1"), &meta, "highlight", &engine);
        assert!(r.failed().is_none());
        assert_eq!(r.color, None);
        // the stored style is untouched
        assert_eq!(r.style.color.as_deref(), Some("green"));

        let plain = render_cell(&CellValue::text("1+1"), &meta, "highlight", &engine);
        assert_eq!(plain.color.as_deref(), Some("green"));
    }

    #[test]
    fn deeply_nested_formula_fails_instead_of_crashing() {
        let engine = BasicEngine;
        let text = format!("={}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(
            check_formula(&CellValue::text(text), &engine),
            FormulaOutcome::Failed(EvalError::Parse(_))
        ));
    }

    #[test]
    fn references_see_an_empty_sheet() {
        let engine = BasicEngine;
        assert_eq!(
            check_formula(&CellValue::text("=SUM(B2:B3)"), &engine),
            FormulaOutcome::Evaluated(EvalValue::Number(0.0))
        );
        assert!(matches!(
            check_formula(&CellValue::text("=Sheet2!A1"), &engine),
            FormulaOutcome::Failed(EvalError::InvalidReference(_))
        ));
    }

    #[test]
    fn highlight_class_is_reported() {
        let engine = BasicEngine;
        let mut meta = CellMeta::default();
        meta.class_name = Some("highlight".into());
        let r = render_cell(&CellValue::text("x"), &meta, "highlight", &engine);
        assert!(r.highlighted);
        assert_eq!(r.formula, FormulaOutcome::NotFormula);
    }
}
