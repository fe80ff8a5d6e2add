//! Calculator tool — evaluates arithmetic expressions.
//!
//! Supports `+ - * / % ^`, parentheses, unary minus and decimal numbers.
//! `^` is right-associative and binds tighter than unary minus, so
//! `-2 ^ 2` is `-4`.

use async_trait::async_trait;
use reagent_core::error::ToolError;
use reagent_core::tool::{Tool, ToolResult};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports +, -, *, /, % (remainder), ^ (power), parentheses, and decimal numbers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "minLength": 1,
                    "description": "The expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::invalid("calculator", "/expression: required property missing"))?;

        let value = evaluate(expr).map_err(|e| ToolError::execution("calculator", e.to_string()))?;
        Ok(ToolResult::ok(format_number(value)).with_data(serde_json::json!({ "result": value })))
    }
}

/// Render whole numbers without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected {0}")]
    UnexpectedToken(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NotFinite,

    #[error("expression nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// Limit on nested parentheses, unary signs and `^` chains.
pub const MAX_DEPTH: usize = 128;

/// Evaluate an arithmetic expression string.
pub fn evaluate(expr: &str) -> Result<f64, CalcError> {
    let tokens = lex(expr)?;
    let mut parser = Parser { tokens: &tokens, pos: 0, depth: 0 };
    let value = parser.expression(0)?;
    if let Some(tok) = parser.tokens.get(parser.pos) {
        return Err(CalcError::UnexpectedToken(tok.describe()));
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tok {
    Num(f64),
    Op(char),
    Open,
    Close,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Num(n) => format!("number {n}"),
            Tok::Op(c) => format!("operator '{c}'"),
            Tok::Open => "'('".into(),
            Tok::Close => "')'".into(),
        }
    }
}

fn lex(input: &str) -> Result<Vec<Tok>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '+' | '-' | '*' | '/' | '%' | '^' => tokens.push(Tok::Op(c)),
            '(' => tokens.push(Tok::Open),
            ')' => tokens.push(Tok::Close),
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if !(next.is_ascii_digit() || next == '.') {
                        break;
                    }
                    literal.push(next);
                    chars.next();
                }
                let n = literal
                    .parse()
                    .map_err(|_| CalcError::InvalidNumber(literal.clone()))?;
                tokens.push(Tok::Num(n));
            }
            other => return Err(CalcError::UnexpectedChar(other, offset)),
        }
    }

    Ok(tokens)
}

/// Binding power of a binary operator: (left, right).
fn infix_power(op: char) -> Option<(u8, u8)> {
    match op {
        '+' | '-' => Some((1, 2)),
        '*' | '/' | '%' => Some((3, 4)),
        '^' => Some((8, 7)),
        _ => None,
    }
}

const PREFIX_MINUS_POWER: u8 = 5;

/// Precedence-climbing parser over the token slice.
struct Parser<'a> {
    tokens: &'a [Tok],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).copied();
        self.pos += usize::from(tok.is_some());
        tok
    }

    fn expression(&mut self, min_power: u8) -> Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        self.depth += 1;
        let value = self.operand_chain(min_power);
        self.depth -= 1;
        value
    }

    fn operand_chain(&mut self, min_power: u8) -> Result<f64, CalcError> {
        let mut lhs = match self.next().ok_or(CalcError::UnexpectedEnd)? {
            Tok::Num(n) => n,
            Tok::Open => {
                let inner = self.expression(0)?;
                match self.next() {
                    Some(Tok::Close) => inner,
                    Some(tok) => return Err(CalcError::UnexpectedToken(tok.describe())),
                    None => return Err(CalcError::UnexpectedEnd),
                }
            }
            Tok::Op('-') => -self.expression(PREFIX_MINUS_POWER)?,
            Tok::Op('+') => self.expression(PREFIX_MINUS_POWER)?,
            tok => return Err(CalcError::UnexpectedToken(tok.describe())),
        };

        while let Some(Tok::Op(op)) = self.tokens.get(self.pos).copied() {
            let Some((left, right)) = infix_power(op) else { break };
            if left < min_power {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(right)?;
            lhs = apply(op, lhs, rhs)?;
        }

        Ok(lhs)
    }
}

fn apply(op: char, lhs: f64, rhs: f64) -> Result<f64, CalcError> {
    match op {
        '+' => Ok(lhs + rhs),
        '-' => Ok(lhs - rhs),
        '*' => Ok(lhs * rhs),
        '/' | '%' if rhs == 0.0 => Err(CalcError::DivisionByZero),
        '/' => Ok(lhs / rhs),
        '%' => Ok(lhs % rhs),
        '^' => Ok(lhs.powf(rhs)),
        other => Err(CalcError::UnexpectedToken(format!("operator '{other}'"))),
    }
}
