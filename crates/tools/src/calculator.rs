//! Calculator tool - evaluates arithmetic typed in free text.
//!
//! Two forms are understood:
//! - `"<pct>% of <value>"` answers with a sentence such as `15.0% of 200.0 = 30.0`
//! - anything else has letters and whitespace stripped, `^` read as `**`,
//!   and is evaluated by a recursive-descent parser with no access to
//!   anything but numbers and operators.
//!
//! Integer arithmetic stays exact (`10 * 3` is `30`, not `30.0`); `/`
//! always yields a float, `//` floors, `%` takes the sign of the divisor,
//! and `**` is right-associative and binds tighter than unary minus.

use async_trait::async_trait;
use delve_core::tool::Tool;
use std::fmt;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform mathematical calculations. Input: mathematical expression"
    }

    async fn invoke(&self, input: &str) -> String {
        calculate(input)
    }
}

/// Run the calculator on raw tool input and render the observation.
pub fn calculate(input: &str) -> String {
    if input.contains('%') && input.contains("of") {
        let stripped = input.replace('%', "");
        let parts: Vec<&str> = stripped.split("of").collect();
        if let [pct, value] = parts.as_slice() {
            return match (parse_float(pct), parse_float(value)) {
                (Ok(p), Ok(v)) => {
                    let result = (p / 100.0) * v;
                    format!(
                        "{}% of {} = {}",
                        format_float(p),
                        format_float(v),
                        format_float(result)
                    )
                }
                (Err(e), _) | (_, Err(e)) => format!("Calculation error: {e}"),
            };
        }
    }

    let expr: String = input
        .chars()
        .filter(|c| !c.is_ascii_alphabetic() && !c.is_whitespace())
        .collect::<String>()
        .replace('^', "**");

    if expr.is_empty() {
        return format!("Cannot calculate: {input}");
    }

    match evaluate(&expr) {
        Ok(value) => format!("Result: {value}"),
        Err(e) => format!("Calculation error: {e}"),
    }
}

fn parse_float(text: &str) -> Result<f64, String> {
    let trimmed = text.trim();
    trimmed
        .parse::<f64>()
        .map_err(|_| format!("could not convert string to float: '{trimmed}'"))
}

// ── Numbers ───────────────────────────────────────────────────────────────

/// An evaluated number: exact integer or float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) => f.write_str(&format_float(*x)),
        }
    }
}

/// Render a float the way an interactive calculator user expects:
/// whole values keep a trailing `.0`, very large or very small values use
/// exponent notation with a signed two-digit exponent.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }

    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let sci = format!("{x:e}");
        if let Some((mantissa, exp)) = sci.split_once('e')
            && let Ok(exp) = exp.parse::<i32>()
        {
            let sign = if exp < 0 { '-' } else { '+' };
            return format!("{mantissa}e{sign}{:02}", exp.abs());
        }
        return sci;
    }

    let plain = format!("{x}");
    if plain.contains('.') {
        plain
    } else {
        format!("{plain}.0")
    }
}

const OVERFLOW: &str = "integer overflow";

fn checked(v: Option<i128>) -> Result<Number, String> {
    v.map(Number::Int).ok_or_else(|| OVERFLOW.to_string())
}

fn add(a: Number, b: Number) -> Result<Number, String> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => checked(x.checked_add(y)),
        _ => Ok(Number::Float(a.as_f64() + b.as_f64())),
    }
}

fn sub(a: Number, b: Number) -> Result<Number, String> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => checked(x.checked_sub(y)),
        _ => Ok(Number::Float(a.as_f64() - b.as_f64())),
    }
}

fn mul(a: Number, b: Number) -> Result<Number, String> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => checked(x.checked_mul(y)),
        _ => Ok(Number::Float(a.as_f64() * b.as_f64())),
    }
}

fn div(a: Number, b: Number) -> Result<Number, String> {
    if b.is_zero() {
        return Err("division by zero".into());
    }
    Ok(Number::Float(a.as_f64() / b.as_f64()))
}

fn floor_div(a: Number, b: Number) -> Result<Number, String> {
    if b.is_zero() {
        return Err("integer division or modulo by zero".into());
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let q = x.checked_div(y).ok_or_else(|| OVERFLOW.to_string())?;
            if (x % y != 0) && ((x < 0) != (y < 0)) {
                checked(q.checked_sub(1))
            } else {
                Ok(Number::Int(q))
            }
        }
        _ => Ok(Number::Float((a.as_f64() / b.as_f64()).floor())),
    }
}

fn modulo(a: Number, b: Number) -> Result<Number, String> {
    if b.is_zero() {
        return Err("integer division or modulo by zero".into());
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let r = x.checked_rem(y).ok_or_else(|| OVERFLOW.to_string())?;
            if r != 0 && ((r < 0) != (y < 0)) {
                checked(r.checked_add(y))
            } else {
                Ok(Number::Int(r))
            }
        }
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                Ok(Number::Float(r + y))
            } else {
                Ok(Number::Float(r))
            }
        }
    }
}

fn pow(base: Number, exp: Number) -> Result<Number, String> {
    if let (Number::Int(b), Number::Int(e)) = (base, exp) {
        if e >= 0 {
            let e = u32::try_from(e).map_err(|_| OVERFLOW.to_string())?;
            return checked(b.checked_pow(e));
        }
        if b == 0 {
            return Err("0 cannot be raised to a negative power".into());
        }
    }

    let (b, e) = (base.as_f64(), exp.as_f64());
    if b == 0.0 && e < 0.0 {
        return Err("0.0 cannot be raised to a negative power".into());
    }
    let result = b.powf(e);
    if result.is_nan() {
        return Err("complex results are not supported".into());
    }
    if result.is_infinite() && b.is_finite() && e.is_finite() {
        return Err("numerical result out of range".into());
    }
    Ok(Number::Float(result))
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<Number, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!(
            "invalid syntax: unexpected {:?} at position {}",
            parser.tokens[parser.pos], parser.pos
        ));
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Number),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '*' if next == Some('*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
            }
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            c @ ('+' | '-' | '*' | '/' | '%' | '(' | ')') => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(parse_literal(&literal)?));
            }
            c => return Err(format!("invalid syntax: unexpected character '{c}'")),
        }
    }

    Ok(tokens)
}

fn parse_literal(literal: &str) -> Result<Number, String> {
    if literal.contains('.') {
        if literal == "." || literal.matches('.').count() > 1 {
            return Err(format!("invalid syntax: bad number '{literal}'"));
        }
        literal
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| format!("invalid syntax: bad number '{literal}'"))
    } else {
        literal
            .parse::<i128>()
            .map(Number::Int)
            .map_err(|_| OVERFLOW.to_string())
    }
}

/// Deepest nesting of parentheses, signs and exponents accepted.
const MAX_DEPTH: usize = 100;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Number, String> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.consume();
                    left = add(left, self.parse_term()?)?;
                }
                Token::Minus => {
                    self.consume();
                    left = sub(left, self.parse_term()?)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/' | '//' | '%') unary)*
    fn parse_term(&mut self) -> Result<Number, String> {
        let mut left = self.parse_unary()?;
        loop {
            let op: fn(Number, Number) -> Result<Number, String> = match self.peek() {
                Some(Token::Star) => mul,
                Some(Token::Slash) => div,
                Some(Token::DoubleSlash) => floor_div,
                Some(Token::Percent) => modulo,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = op(left, right)?;
        }
        Ok(left)
    }

    // Every recursive path passes through here, so the depth is bounded once.
    fn parse_unary(&mut self) -> Result<Number, String> {
        if self.depth >= MAX_DEPTH {
            return Err("invalid syntax: expression nested too deeply".into());
        }
        self.depth += 1;
        let result = self.parse_signed();
        self.depth -= 1;
        result
    }

    // unary = ('-' | '+') unary | power
    fn parse_signed(&mut self) -> Result<Number, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                match self.parse_unary()? {
                    Number::Int(i) => checked(i.checked_neg()),
                    Number::Float(f) => Ok(Number::Float(-f)),
                }
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // power = primary ('**' unary)?
    fn parse_power(&mut self) -> Result<Number, String> {
        let base = self.parse_primary()?;
        if let Some(Token::DoubleStar) = self.peek() {
            self.consume();
            let exp = self.parse_unary()?;
            return pow(base, exp);
        }
        Ok(base)
    }

    // primary = NUMBER | '(' expr ')'
    fn parse_primary(&mut self) -> Result<Number, String> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::LParen) => {
                let val = self.parse_expr()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(val),
                    _ => Err("invalid syntax: '(' was never closed".into()),
                }
            }
            Some(tok) => Err(format!("invalid syntax: unexpected {tok:?}")),
            None => Err("invalid syntax: unexpected end of expression".into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
