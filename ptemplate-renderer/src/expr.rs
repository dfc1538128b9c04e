//! Sandboxed boolean expressions for trusted-mode conditionals.
//!
//! Literals, identifier paths, `!`, `&&`, `||`, comparisons and
//! parentheses. Nothing can call a function or mutate a value.
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | compare
//! compare := primary ( op primary )?
//! op      := "==" | "===" | "!=" | "!==" | "<" | "<=" | ">" | ">="
//! primary := number | string | "true" | "false" | "null"
//!          | ident ( "." ident )* | "(" expr ")"
//! ```

use std::cmp::Ordering;

use serde_json::Value;
use thiserror::Error;

use ptemplate_core::value::{length_of, truthy};

/// Failure to parse or evaluate an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at offset {pos}")]
    UnterminatedString { pos: usize },

    #[error("unexpected {found}")]
    UnexpectedToken { found: String },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("{name} is not defined")]
    Undefined { name: String },

    #[error("cannot read {property} of null")]
    NullProperty { property: String },
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    LooseEq,
    StrictEq,
    LooseNe,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
}

/// True when `condition` needs more than a plain field lookup, i.e. it
/// contains characters outside `[A-Za-z0-9@*_+-./$]`.
pub fn looks_like_expression(condition: &str) -> bool {
    condition
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || "@*_+-./$".contains(c)))
}

/// Parse and evaluate `source`, resolving identifiers through `lookup`.
pub fn evaluate<F>(source: &str, lookup: F) -> Result<bool, ExprError>
where
    F: Fn(&str) -> Option<Value>,
{
    let expr = parse(source)?;
    Ok(truthy(&expr.eval(&lookup)?))
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Str(s) => format!("string '{s}'"),
            Token::Ident(i) => format!("identifier {i}"),
            Token::Op(op) => format!("'{op}'"),
        }
    }
}

// Longest operators first so "===" wins over "==".
const OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "(", ")", ".",
];

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = pos;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            let end = chars.get(i).map(|(p, _)| *p).unwrap_or(source.len());
            let text = &source[start..end];
            let n = text
                .parse::<f64>()
                .map_err(|_| ExprError::UnexpectedToken {
                    found: format!("number {text}"),
                })?;
            tokens.push(Token::Number(n));
        } else if c == '\'' || c == '"' {
            let quote = c;
            let mut text = String::new();
            i += 1;
            loop {
                let Some(&(_, ch)) = chars.get(i) else {
                    return Err(ExprError::UnterminatedString { pos });
                };
                i += 1;
                match ch {
                    _ if ch == quote => break,
                    '\\' => {
                        if let Some(&(_, escaped)) = chars.get(i) {
                            text.push(escaped);
                            i += 1;
                        }
                    }
                    _ => text.push(ch),
                }
            }
            tokens.push(Token::Str(text));
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = pos;
            while i < chars.len()
                && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '$')
            {
                i += 1;
            }
            let end = chars.get(i).map(|(p, _)| *p).unwrap_or(source.len());
            tokens.push(Token::Ident(source[start..end].to_string()));
        } else if let Some(op) = OPERATORS.iter().find(|op| source[pos..].starts_with(**op)) {
            tokens.push(Token::Op(*op));
            i += op.chars().count();
        } else {
            return Err(ExprError::UnexpectedChar { ch: c, pos });
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse `source` into an [`Expr`].
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(t) => Err(ExprError::UnexpectedToken { found: t.describe() }),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.and()?;
        while self.eat("||") {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        while self.eat("&&") {
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat("!") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, ExprError> {
        let left = self.primary()?;
        let op = match self.peek() {
            Some(Token::Op("==")) => CmpOp::LooseEq,
            Some(Token::Op("===")) => CmpOp::StrictEq,
            Some(Token::Op("!=")) => CmpOp::LooseNe,
            Some(Token::Op("!==")) => CmpOp::StrictNe,
            Some(Token::Op("<")) => CmpOp::Lt,
            Some(Token::Op("<=")) => CmpOp::Le,
            Some(Token::Op(">")) => CmpOp::Gt,
            Some(Token::Op(">=")) => CmpOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.primary()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            None => Err(ExprError::UnexpectedEnd),
            Some(Token::Number(n)) => Ok(Expr::Literal(number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Ident(id)) => match id.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "undefined" => Ok(Expr::Literal(Value::Null)),
                _ => {
                    let mut path = vec![id];
                    while self.eat(".") {
                        match self.next() {
                            Some(Token::Ident(segment)) => path.push(segment),
                            Some(other) => {
                                return Err(ExprError::UnexpectedToken {
                                    found: other.describe(),
                                })
                            }
                            None => return Err(ExprError::UnexpectedEnd),
                        }
                    }
                    Ok(Expr::Path(path))
                }
            },
            Some(Token::Op("(")) => {
                let inner = self.or()?;
                if self.eat(")") {
                    Ok(inner)
                } else {
                    match self.peek() {
                        Some(t) => Err(ExprError::UnexpectedToken { found: t.describe() }),
                        None => Err(ExprError::UnexpectedEnd),
                    }
                }
            }
            Some(other) => Err(ExprError::UnexpectedToken {
                found: other.describe(),
            }),
        }
    }
}

fn number(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

impl Expr {
    /// Evaluate against `lookup`. `&&` and `||` short-circuit and yield one
    /// of their operands.
    pub fn eval<F>(&self, lookup: &F) -> Result<Value, ExprError>
    where
        F: Fn(&str) -> Option<Value>,
    {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Path(path) => resolve_path(path, lookup),
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval(lookup)?))),
            Expr::And(l, r) => {
                let left = l.eval(lookup)?;
                if truthy(&left) {
                    r.eval(lookup)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(l, r) => {
                let left = l.eval(lookup)?;
                if truthy(&left) {
                    Ok(left)
                } else {
                    r.eval(lookup)
                }
            }
            Expr::Compare(op, l, r) => {
                let left = l.eval(lookup)?;
                let right = r.eval(lookup)?;
                Ok(Value::Bool(compare(*op, &left, &right)))
            }
        }
    }
}

fn resolve_path<F>(path: &[String], lookup: &F) -> Result<Value, ExprError>
where
    F: Fn(&str) -> Option<Value>,
{
    let (head, rest) = path.split_first().ok_or(ExprError::UnexpectedEnd)?;
    let mut current = lookup(head).ok_or_else(|| ExprError::Undefined { name: head.clone() })?;
    for segment in rest {
        current = match &current {
            Value::Null => {
                return Err(ExprError::NullProperty {
                    property: segment.clone(),
                })
            }
            Value::Object(map) => map.get(segment).cloned().unwrap_or(Value::Null),
            other if segment == "length" => {
                length_of(other).map(Value::from).unwrap_or(Value::Null)
            }
            _ => Value::Null,
        };
    }
    Ok(current)
}

fn as_number(v: &Value) -> f64 {
    match v {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
            a == b
        }
        _ => as_number(a) == as_number(b),
    }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> bool {
    match op {
        CmpOp::LooseEq => loose_eq(a, b),
        CmpOp::LooseNe => !loose_eq(a, b),
        CmpOp::StrictEq => strict_eq(a, b),
        CmpOp::StrictNe => !strict_eq(a, b),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = match (a, b) {
                (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
                _ => as_number(a).partial_cmp(&as_number(b)),
            };
            match (op, ordering) {
                (_, None) => false,
                (CmpOp::Lt, Some(o)) => o == Ordering::Less,
                (CmpOp::Le, Some(o)) => o != Ordering::Greater,
                (CmpOp::Gt, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
