//! Built-in formula engine.
//!
//! Covers arithmetic, comparison, text concatenation and a small set of
//! worksheet functions. Spreadsheet error values (`#DIV/0!`, `#N/A`, ...)
//! are ordinary results; only malformed or unresolvable formulas fail.

use std::cmp::Ordering;

use super::parser::{BinaryOp, Expr, UnaryOp, parse_expression};
use super::{ErrorValue, EvalContext, EvalError, EvalValue, FormulaEngine};
use crate::value::format_number;

/// Upper bound on cells a single range argument may expand to.
const MAX_RANGE_CELLS: usize = 100_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct BasicEngine;

impl FormulaEngine for BasicEngine {
    fn evaluate(&self, expr: &str, ctx: &EvalContext) -> Result<EvalValue, EvalError> {
        let ast = parse_expression(expr)?;
        Evaluator { ctx }.eval(&ast)
    }
}

/// A function argument: either one value or a block of cells.
enum Arg {
    Scalar(EvalValue),
    Range { cells: Vec<EvalValue>, cols: usize },
}

impl Arg {
    fn values(&self) -> &[EvalValue] {
        match self {
            Arg::Scalar(v) => std::slice::from_ref(v),
            Arg::Range { cells, .. } => cells,
        }
    }
}

struct Evaluator<'a> {
    ctx: &'a EvalContext,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr) -> Result<EvalValue, EvalError> {
        match self.arg(expr)? {
            Arg::Scalar(v) => Ok(v),
            // a bare range outside a function yields its first cell
            Arg::Range { cells, .. } => Ok(cells.into_iter().next().unwrap_or(EvalValue::Empty)),
        }
    }

    fn arg(&self, expr: &Expr) -> Result<Arg, EvalError> {
        let value = match expr {
            Expr::Number(n) => EvalValue::Number(*n),
            Expr::Text(s) => EvalValue::Text(s.clone()),
            Expr::Bool(b) => EvalValue::Bool(*b),
            Expr::Cell { sheet, row, col } => self.ctx.lookup(sheet.as_deref(), *row, *col)?,
            Expr::Range { sheet, start, end } => return self.range(sheet.as_deref(), *start, *end),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                unary(*op, v)
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                binary(*op, l, r)
            }
            Expr::Call { name, args } => self.call(name, args)?,
        };
        Ok(Arg::Scalar(value))
    }

    fn range(
        &self,
        sheet: Option<&str>,
        start: (usize, usize),
        end: (usize, usize),
    ) -> Result<Arg, EvalError> {
        let (r0, r1) = (start.0.min(end.0), start.0.max(end.0));
        let (c0, c1) = (start.1.min(end.1), start.1.max(end.1));
        let rows = r1 - r0 + 1;
        let cols = c1 - c0 + 1;
        if rows.saturating_mul(cols) > MAX_RANGE_CELLS {
            return Err(EvalError::InvalidReference(format!(
                "range of {rows}x{cols} cells is too large"
            )));
        }
        let mut cells = Vec::with_capacity(rows * cols);
        for r in r0..=r1 {
            for c in c0..=c1 {
                cells.push(self.ctx.lookup(sheet, r, c)?);
            }
        }
        Ok(Arg::Range { cells, cols })
    }

    fn call(&self, name: &str, args: &[Expr]) -> Result<EvalValue, EvalError> {
        let arity = |min: usize, max: usize, expected: &'static str| {
            if args.len() < min || args.len() > max {
                Err(EvalError::ArgumentCount {
                    function: name.to_string(),
                    expected,
                    actual: args.len(),
                })
            } else {
                Ok(())
            }
        };

        match name {
            "SUM" | "AVERAGE" | "MIN" | "MAX" | "COUNT" => {
                arity(1, usize::MAX, "at least 1")?;
                let evaluated = args.iter().map(|a| self.arg(a)).collect::<Result<Vec<_>, _>>()?;
                Ok(aggregate(name, &evaluated))
            }
            "IF" => {
                arity(2, 3, "2 or 3")?;
                let cond = match to_bool(&self.eval(&args[0])?) {
                    Ok(b) => b,
                    Err(e) => return Ok(EvalValue::Error(e)),
                };
                if cond {
                    self.eval(&args[1])
                } else if let Some(otherwise) = args.get(2) {
                    self.eval(otherwise)
                } else {
                    Ok(EvalValue::Bool(false))
                }
            }
            "ABS" => {
                arity(1, 1, "1")?;
                Ok(numeric(self.eval(&args[0])?, f64::abs))
            }
            "ROUND" => {
                arity(1, 2, "1 or 2")?;
                let value = self.eval(&args[0])?;
                let digits = match args.get(1) {
                    Some(d) => self.eval(d)?,
                    None => EvalValue::Number(0.0),
                };
                Ok(match (to_number(&value), to_number(&digits)) {
                    (Ok(v), Ok(d)) => {
                        let factor = 10f64.powi(d.trunc() as i32);
                        EvalValue::Number((v * factor).round() / factor)
                    }
                    (Err(e), _) | (_, Err(e)) => EvalValue::Error(e),
                })
            }
            "LEN" | "UPPER" | "LOWER" | "TRIM" => {
                arity(1, 1, "1")?;
                let text = match to_text(&self.eval(&args[0])?) {
                    Ok(t) => t,
                    Err(e) => return Ok(EvalValue::Error(e)),
                };
                Ok(match name {
                    "LEN" => EvalValue::Number(text.chars().count() as f64),
                    "UPPER" => EvalValue::Text(text.to_uppercase()),
                    "LOWER" => EvalValue::Text(text.to_lowercase()),
                    _ => EvalValue::Text(text.split_whitespace().collect::<Vec<_>>().join(" ")),
                })
            }
            "CONCAT" | "CONCATENATE" => {
                arity(1, usize::MAX, "at least 1")?;
                let mut out = String::new();
                for a in args {
                    for v in self.arg(a)?.values() {
                        match to_text(v) {
                            Ok(t) => out.push_str(&t),
                            Err(e) => return Ok(EvalValue::Error(e)),
                        }
                    }
                }
                Ok(EvalValue::Text(out))
            }
            "VLOOKUP" => {
                arity(3, 4, "3 or 4")?;
                self.vlookup(args)
            }
            _ => Err(EvalError::UnknownFunction(name.to_string())),
        }
    }

    fn vlookup(&self, args: &[Expr]) -> Result<EvalValue, EvalError> {
        let needle = self.eval(&args[0])?;
        if let EvalValue::Error(e) = needle {
            return Ok(EvalValue::Error(e));
        }
        let Arg::Range { cells, cols } = self.arg(&args[1])? else {
            return Ok(EvalValue::Error(ErrorValue::Value));
        };
        let index = match to_number(&self.eval(&args[2])?) {
            Ok(n) if n >= 1.0 => n as usize,
            Ok(_) => return Ok(EvalValue::Error(ErrorValue::Value)),
            Err(e) => return Ok(EvalValue::Error(e)),
        };
        if index > cols {
            return Ok(EvalValue::Error(ErrorValue::Value));
        }
        // approximate matching is treated as exact; the evaluation sheet is empty anyway
        if let Some(a) = args.get(3) {
            self.eval(a)?;
        }
        let hit = cells
            .chunks(cols)
            .find(|row| !row[0].is_empty_value() && compare(&row[0], &needle) == Ordering::Equal);
        Ok(match hit {
            Some(row) => row[index - 1].clone(),
            None => EvalValue::Error(ErrorValue::NotAvailable),
        })
    }
}

impl EvalValue {
    fn is_empty_value(&self) -> bool {
        matches!(self, EvalValue::Empty)
    }
}

fn aggregate(name: &str, args: &[Arg]) -> EvalValue {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            // direct arguments are coerced
            Arg::Scalar(v) => match v {
                EvalValue::Empty => {}
                EvalValue::Error(e) => return EvalValue::Error(*e),
                other if name == "COUNT" => {
                    if let Ok(n) = to_number(other) {
                        numbers.push(n);
                    }
                }
                other => match to_number(other) {
                    Ok(n) => numbers.push(n),
                    Err(e) => return EvalValue::Error(e),
                },
            },
            // cells inside ranges only count when they hold numbers
            Arg::Range { cells, .. } => {
                for v in cells {
                    match v {
                        EvalValue::Number(n) => numbers.push(*n),
                        EvalValue::Error(e) if name != "COUNT" => return EvalValue::Error(*e),
                        _ => {}
                    }
                }
            }
        }
    }
    let n = match name {
        "SUM" => numbers.iter().sum(),
        "COUNT" => numbers.len() as f64,
        "AVERAGE" => {
            if numbers.is_empty() {
                return EvalValue::Error(ErrorValue::Div0);
            }
            numbers.iter().sum::<f64>() / numbers.len() as f64
        }
        "MIN" => numbers.iter().copied().fold(None, |m: Option<f64>, x| Some(m.map_or(x, |m| m.min(x)))).unwrap_or(0.0),
        _ => numbers.iter().copied().fold(None, |m: Option<f64>, x| Some(m.map_or(x, |m| m.max(x)))).unwrap_or(0.0),
    };
    EvalValue::Number(n)
}

fn numeric(v: EvalValue, f: impl Fn(f64) -> f64) -> EvalValue {
    match to_number(&v) {
        Ok(n) => EvalValue::Number(f(n)),
        Err(e) => EvalValue::Error(e),
    }
}

fn unary(op: UnaryOp, v: EvalValue) -> EvalValue {
    match op {
        UnaryOp::Plus => v,
        UnaryOp::Minus => numeric(v, |n| -n),
        UnaryOp::Percent => numeric(v, |n| n / 100.0),
    }
}

fn binary(op: BinaryOp, l: EvalValue, r: EvalValue) -> EvalValue {
    if let EvalValue::Error(e) = l {
        return EvalValue::Error(e);
    }
    if let EvalValue::Error(e) = r {
        return EvalValue::Error(e);
    }
    match op {
        BinaryOp::Concat => match (to_text(&l), to_text(&r)) {
            (Ok(a), Ok(b)) => EvalValue::Text(a + &b),
            (Err(e), _) | (_, Err(e)) => EvalValue::Error(e),
        },
        BinaryOp::Equal => EvalValue::Bool(compare(&l, &r) == Ordering::Equal),
        BinaryOp::NotEqual => EvalValue::Bool(compare(&l, &r) != Ordering::Equal),
        BinaryOp::Less => EvalValue::Bool(compare(&l, &r) == Ordering::Less),
        BinaryOp::LessEqual => EvalValue::Bool(compare(&l, &r) != Ordering::Greater),
        BinaryOp::Greater => EvalValue::Bool(compare(&l, &r) == Ordering::Greater),
        BinaryOp::GreaterEqual => EvalValue::Bool(compare(&l, &r) != Ordering::Less),
        arith => {
            let (a, b) = match (to_number(&l), to_number(&r)) {
                (Ok(a), Ok(b)) => (a, b),
                (Err(e), _) | (_, Err(e)) => return EvalValue::Error(e),
            };
            let n = match arith {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide if b == 0.0 => return EvalValue::Error(ErrorValue::Div0),
                BinaryOp::Divide => a / b,
                _ => a.powf(b),
            };
            if n.is_finite() {
                EvalValue::Number(n)
            } else {
                EvalValue::Error(ErrorValue::Num)
            }
        }
    }
}

fn to_number(v: &EvalValue) -> Result<f64, ErrorValue> {
    match v {
        EvalValue::Number(n) => Ok(*n),
        EvalValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        EvalValue::Empty => Ok(0.0),
        EvalValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or(ErrorValue::Value),
        EvalValue::Error(e) => Err(*e),
    }
}

fn to_text(v: &EvalValue) -> Result<String, ErrorValue> {
    match v {
        EvalValue::Error(e) => Err(*e),
        EvalValue::Number(n) => Ok(format_number(*n)),
        other => Ok(other.to_string()),
    }
}

fn to_bool(v: &EvalValue) -> Result<bool, ErrorValue> {
    match v {
        EvalValue::Bool(b) => Ok(*b),
        EvalValue::Number(n) => Ok(*n != 0.0),
        EvalValue::Empty => Ok(false),
        EvalValue::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
        EvalValue::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
        EvalValue::Text(_) => Err(ErrorValue::Value),
        EvalValue::Error(e) => Err(*e),
    }
}

/// Order values the way a worksheet does: numbers < text < booleans,
/// text compared case-insensitively, empty acting as 0 or "".
fn compare(l: &EvalValue, r: &EvalValue) -> Ordering {
    fn rank(v: &EvalValue) -> u8 {
        match v {
            EvalValue::Number(_) => 0,
            EvalValue::Text(_) => 1,
            EvalValue::Bool(_) => 2,
            EvalValue::Empty | EvalValue::Error(_) => 3,
        }
    }
    let l = promote_empty(l, r);
    let r = promote_empty(r, &l);
    match (&l, &r) {
        (EvalValue::Number(a), EvalValue::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (EvalValue::Text(a), EvalValue::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (EvalValue::Bool(a), EvalValue::Bool(b)) => a.cmp(b),
        (a, b) => rank(a).cmp(&rank(b)),
    }
}

fn promote_empty(v: &EvalValue, other: &EvalValue) -> EvalValue {
    match (v, other) {
        (EvalValue::Empty, EvalValue::Text(_)) => EvalValue::Text(String::new()),
        (EvalValue::Empty, EvalValue::Bool(_)) => EvalValue::Bool(false),
        (EvalValue::Empty, _) => EvalValue::Number(0.0),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(s: &str) -> Result<EvalValue, EvalError> {
        BasicEngine.evaluate(s, &EvalContext::single_sheet())
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("1+2*3"), Ok(EvalValue::Number(7.0)));
        assert_eq!(eval("(1+2)*3"), Ok(EvalValue::Number(9.0)));
        assert_eq!(eval("2^3"), Ok(EvalValue::Number(8.0)));
        assert_eq!(eval("-5+2"), Ok(EvalValue::Number(-3.0)));
        assert_eq!(eval("50%"), Ok(EvalValue::Number(0.5)));
    }

    #[test]
    fn division_by_zero_is_a_value() {
        assert_eq!(eval("1/0"), Ok(EvalValue::Error(ErrorValue::Div0)));
        assert_eq!(eval("AVERAGE(B2:B3)"), Ok(EvalValue::Error(ErrorValue::Div0)));
    }

    #[test]
    fn aggregates() {
        assert_eq!(eval("SUM(1,2)"), Ok(EvalValue::Number(3.0)));
        assert_eq!(eval("AVERAGE(2,4)"), Ok(EvalValue::Number(3.0)));
        assert_eq!(eval("MIN(4,2,9)"), Ok(EvalValue::Number(2.0)));
        assert_eq!(eval("MAX(4,2,9)"), Ok(EvalValue::Number(9.0)));
        assert_eq!(eval("COUNT(1,\"x\",3)"), Ok(EvalValue::Number(2.0)));
        assert_eq!(eval("MAX(C2:C3)"), Ok(EvalValue::Number(0.0)));
        assert_eq!(eval("SUM(1,\"x\")"), Ok(EvalValue::Error(ErrorValue::Value)));
    }

    #[test]
    fn conditionals_and_text() {
        assert_eq!(eval("IF(C2>6000, \"Yes\", \"No\")"), Ok(EvalValue::Text("No".into())));
        assert_eq!(eval("IF(1, 2)"), Ok(EvalValue::Number(2.0)));
        assert_eq!(eval("IF(0, 2)"), Ok(EvalValue::Bool(false)));
        assert_eq!(eval("\"a\"&1"), Ok(EvalValue::Text("a1".into())));
        assert_eq!(eval("UPPER(\"ab\")"), Ok(EvalValue::Text("AB".into())));
        assert_eq!(eval("TRIM(\"  a   b \")"), Ok(EvalValue::Text("a b".into())));
        assert_eq!(eval("LEN(\"abc\")"), Ok(EvalValue::Number(3.0)));
        assert_eq!(eval("ROUND(1.25, 1)"), Ok(EvalValue::Number(1.3)));
        assert_eq!(eval("\"A\"=\"a\""), Ok(EvalValue::Bool(true)));
    }

    #[test]
    fn vlookup_on_empty_sheet_is_not_available() {
        assert_eq!(
            eval("VLOOKUP(MAX(C2:C3), C2:C3, 1, FALSE)"),
            Ok(EvalValue::Error(ErrorValue::NotAvailable))
        );
        assert_eq!(
            eval("VLOOKUP(1, C2:C3, 2, FALSE)"),
            Ok(EvalValue::Error(ErrorValue::Value))
        );
    }

    #[test]
    fn failures() {
        assert!(matches!(eval("FOO(1)"), Err(EvalError::UnknownFunction(f)) if f == "FOO"));
        assert!(matches!(eval("IF(1)"), Err(EvalError::ArgumentCount { .. })));
        assert!(matches!(eval("SUM("), Err(EvalError::Parse(_))));
        assert!(matches!(eval("Other!A1"), Err(EvalError::InvalidReference(_))));
        assert!(matches!(eval("A1:XFD1048576"), Err(EvalError::InvalidReference(_))));
    }

    #[test]
    fn own_sheet_prefix_resolves() {
        assert_eq!(eval("Sheet1!A1+1"), Ok(EvalValue::Number(1.0)));
    }
}
