//! Recursive-descent parser for formula expressions.
//!
//! Precedence, lowest first: comparison, `&`, `+ -`, `* /`, `^`, unary
//! sign, postfix `%`.

use super::EvalError;

const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Concat,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Cell {
        sheet: Option<String>,
        row: usize,
        col: usize,
    },
    Range {
        sheet: Option<String>,
        start: (usize, usize),
        end: (usize, usize),
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Sheet(String),
    Op(char),
    LessEqual,
    GreaterEqual,
    NotEqual,
    LParen,
    RParen,
    Comma,
    Colon,
    Eof,
}

/// Parse an expression given without its leading `=`.
pub fn parse_expression(input: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    if parser.peek() == &Token::Eof {
        return Err(EvalError::Parse("empty expression".into()));
    }
    let expr = parser.comparison()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(EvalError::Parse(format!("unexpected {other:?} after expression"))),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' | '-' | '*' | '/' | '^' | '&' | '%' | '=' => {
                out.push(Token::Op(c));
                i += 1;
            }
            '<' => {
                match chars.get(i + 1) {
                    Some('=') => {
                        out.push(Token::LessEqual);
                        i += 1;
                    }
                    Some('>') => {
                        out.push(Token::NotEqual);
                        i += 1;
                    }
                    _ => out.push(Token::Op('<')),
                }
                i += 1;
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Token::GreaterEqual);
                    i += 1;
                } else {
                    out.push(Token::Op('>'));
                }
                i += 1;
            }
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            ',' | ';' => {
                out.push(Token::Comma);
                i += 1;
            }
            ':' => {
                out.push(Token::Colon);
                i += 1;
            }
            '"' => {
                let (s, next) = scan_quoted(&chars, i, '"')?;
                out.push(Token::Str(s));
                i = next;
            }
            '\'' => {
                let (s, next) = scan_quoted(&chars, i, '\'')?;
                if chars.get(next) != Some(&'!') {
                    return Err(EvalError::Parse(format!("expected '!' after '{s}'")));
                }
                out.push(Token::Sheet(s));
                i = next + 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    i += 1;
                    if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| EvalError::Parse(format!("bad number '{text}'")))?;
                out.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '$' | '.'))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if chars.get(i) == Some(&'!') {
                    out.push(Token::Sheet(text));
                    i += 1;
                } else {
                    out.push(Token::Ident(text));
                }
            }
            other => return Err(EvalError::Parse(format!("unexpected character '{other}'"))),
        }
    }
    out.push(Token::Eof);
    Ok(out)
}

fn scan_quoted(chars: &[char], start: usize, quote: char) -> Result<(String, usize), EvalError> {
    let mut s = String::new();
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            None => return Err(EvalError::Parse("unterminated string".into())),
            Some(&c) if c == quote => {
                // doubled quote is an escaped quote
                if chars.get(i + 1) == Some(&quote) {
                    s.push(quote);
                    i += 2;
                } else {
                    return Ok((s, i + 1));
                }
            }
            Some(&c) => {
                s.push(c);
                i += 1;
            }
        }
    }
}

/// Split `A1` / `$B$12` into 0-based (row, col).
fn parse_cell_ref(text: &str) -> Option<(usize, usize)> {
    let s = text.trim_start_matches('$');
    let letters = s.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if letters == 0 || letters > 3 {
        return None;
    }
    let (col_part, rest) = s.split_at(letters);
    let digits = rest.strip_prefix('$').unwrap_or(rest);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let col = col_part
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    let row: usize = digits.parse().ok()?;
    Some((row, col))
}

/// Deepest nesting of groups, calls and prefix operators a formula may use.
pub const MAX_NESTING: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn next(&mut self) -> Token {
        let t = self.peek().clone();
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: Token) -> Result<(), EvalError> {
        let got = self.next();
        if got == want {
            Ok(())
        } else {
            Err(EvalError::Parse(format!("expected {want:?}, found {got:?}")))
        }
    }

    fn comparison(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.concat()?;
        loop {
            let op = match self.peek() {
                Token::Op('=') => BinaryOp::Equal,
                Token::NotEqual => BinaryOp::NotEqual,
                Token::Op('<') => BinaryOp::Less,
                Token::LessEqual => BinaryOp::LessEqual,
                Token::Op('>') => BinaryOp::Greater,
                Token::GreaterEqual => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.concat()?;
            left = binary(op, left, right);
        }
    }

    fn concat(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.additive()?;
        while self.peek() == &Token::Op('&') {
            self.pos += 1;
            let right = self.additive()?;
            left = binary(BinaryOp::Concat, left, right);
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Op('+') => BinaryOp::Add,
                Token::Op('-') => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.power()?;
        loop {
            let op = match self.peek() {
                Token::Op('*') => BinaryOp::Multiply,
                Token::Op('/') => BinaryOp::Divide,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.power()?;
            left = binary(op, left, right);
        }
    }

    fn power(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.unary()?;
        while self.peek() == &Token::Op('^') {
            self.pos += 1;
            let right = self.unary()?;
            left = binary(BinaryOp::Power, left, right);
        }
        Ok(left)
    }

    // Every recursive path (groups, call arguments, prefix signs) passes
    // through here, so this is the one place nesting is counted.
    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.depth >= MAX_NESTING {
            return Err(EvalError::Parse("formula nested too deeply".into()));
        }
        self.depth += 1;
        let expr = self.prefixed();
        self.depth -= 1;
        expr
    }

    fn prefixed(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Token::Op('-') => UnaryOp::Minus,
            Token::Op('+') => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.primary()?;
        while self.peek() == &Token::Op('%') {
            self.pos += 1;
            expr = Expr::Unary {
                op: UnaryOp::Percent,
                operand: Box::new(expr),
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        match self.next() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Text(s)),
            Token::LParen => {
                let inner = self.comparison()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Sheet(sheet) => match self.next() {
                Token::Ident(name) => self.reference(Some(sheet), &name),
                other => Err(EvalError::Parse(format!(
                    "expected a reference after '{sheet}!', found {other:?}"
                ))),
            },
            Token::Ident(name) => {
                if self.peek() == &Token::LParen {
                    self.pos += 1;
                    let args = self.arguments()?;
                    return Ok(Expr::Call {
                        name: name.to_ascii_uppercase(),
                        args,
                    });
                }
                match name.to_ascii_uppercase().as_str() {
                    "TRUE" => Ok(Expr::Bool(true)),
                    "FALSE" => Ok(Expr::Bool(false)),
                    _ => self.reference(None, &name),
                }
            }
            other => Err(EvalError::Parse(format!("unexpected {other:?}"))),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        if self.peek() == &Token::RParen {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.comparison()?);
            match self.next() {
                Token::Comma => continue,
                Token::RParen => return Ok(args),
                other => {
                    return Err(EvalError::Parse(format!(
                        "expected ',' or ')' in argument list, found {other:?}"
                    )));
                }
            }
        }
    }

    fn reference(&mut self, sheet: Option<String>, name: &str) -> Result<Expr, EvalError> {
        let start = checked_ref(name)?;
        if self.peek() == &Token::Colon {
            self.pos += 1;
            let end = match self.next() {
                Token::Ident(end) => checked_ref(&end)?,
                other => {
                    return Err(EvalError::Parse(format!("expected range end, found {other:?}")));
                }
            };
            return Ok(Expr::Range { sheet, start, end });
        }
        Ok(Expr::Cell {
            sheet,
            row: start.0,
            col: start.1,
        })
    }
}

/// Validate a reference and convert it to 0-based (row, col).
fn checked_ref(name: &str) -> Result<(usize, usize), EvalError> {
    match parse_cell_ref(name) {
        Some((row, col)) if (1..=MAX_ROWS).contains(&row) && (1..=MAX_COLS).contains(&col) => {
            Ok((row - 1, col - 1))
        }
        _ => Err(EvalError::InvalidReference(name.to_string())),
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_refs_are_zero_based() {
        assert_eq!(parse_cell_ref("A1"), Some((1, 1)));
        assert_eq!(parse_cell_ref("$B$12"), Some((12, 2)));
        assert_eq!(parse_cell_ref("AA3"), Some((3, 27)));
        assert_eq!(parse_cell_ref("SUM"), None);
        assert_eq!(
            parse_expression("B2").unwrap(),
            Expr::Cell {
                sheet: None,
                row: 1,
                col: 1
            }
        );
    }

    #[test]
    fn precedence() {
        let e = parse_expression("1+2*3").unwrap();
        let Expr::Binary { op, right, .. } = e else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Multiply, .. }));
    }

    #[test]
    fn function_with_range_and_strings() {
        let e = parse_expression("IF(C2>6000, \"Yes\", \"No\")").unwrap();
        let Expr::Call { name, args } = e else {
            panic!("expected call");
        };
        assert_eq!(name, "IF");
        assert_eq!(args.len(), 3);
        assert_eq!(args[1], Expr::Text("Yes".into()));
    }

    #[test]
    fn quoted_sheet_prefix() {
        let e = parse_expression("'My Sheet'!A1:B2").unwrap();
        assert_eq!(
            e,
            Expr::Range {
                sheet: Some("My Sheet".into()),
                start: (0, 0),
                end: (1, 1)
            }
        );
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        for bad in ["", "1+", "SUM(1,2", "\"open", "1 2", "@"] {
            assert!(
                matches!(parse_expression(bad), Err(EvalError::Parse(_))),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn unknown_names_are_invalid_references() {
        assert!(matches!(
            parse_expression("revenue"),
            Err(EvalError::InvalidReference(_))
        ));
        assert!(matches!(
            parse_expression("A0"),
            Err(EvalError::InvalidReference(_))
        ));
    }

    #[test]
    fn deep_nesting_is_rejected_without_recursing_forever() {
        let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        let signs = format!("{}1", "-".repeat(10_000));
        let calls = format!("{}1{}", "ABS(".repeat(10_000), ")".repeat(10_000));
        for input in [parens, signs, calls] {
            match parse_expression(&input) {
                Err(EvalError::Parse(msg)) => assert_eq!(msg, "formula nested too deeply"),
                other => panic!("expected a nesting error, got {other:?}"),
            }
        }
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let depth = MAX_NESTING / 2;
        let input = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse_expression(&input).unwrap(), Expr::Number(1.0));
        assert!(parse_expression("-(-(1+2))*((3))").is_ok());
    }
}
