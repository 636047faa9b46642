//! Infix boolean/arithmetic expression evaluator.
//!
//! Operands are decimal numbers or the `unknown` literal. Operators in
//! ascending precedence: `or`, `and`, `=` `<>`, `<` `<=` `>` `>=`,
//! `+` `-`, `*` `/`, unary `-` and `not`. Comparisons and logical operators
//! yield 1 or 0. `unknown` propagates through arithmetic and comparisons,
//! while `and`/`or` short-circuit on a known decisive operand.

const EPSILON: f64 = 0.000001;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("cannot evaluate expression: unexpected end of expression")]
    UnexpectedEnd,
    #[error("cannot evaluate expression: unexpected token at \"{0}\"")]
    UnexpectedToken(String),
    #[error("cannot evaluate expression: division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Unknown,
}

impl Value {
    /// Known and equal to 1 within comparison precision.
    pub fn is_one(self) -> bool {
        matches!(self, Value::Number(n) if (n - 1.0).abs() <= EPSILON)
    }

    fn truth(self) -> Option<bool> {
        match self {
            Value::Number(n) => Some(n.abs() > EPSILON),
            Value::Unknown => None,
        }
    }
}

fn boolean(b: bool) -> Value {
    Value::Number(if b { 1.0 } else { 0.0 })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Unknown,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
}

fn tokenize(expression: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let bytes = expression.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;
        let token = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
                continue;
            }
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Mul,
            b'/' => Token::Div,
            b'=' => Token::Eq,
            b'<' => match bytes.get(pos + 1) {
                Some(b'>') => {
                    pos += 1;
                    Token::Ne
                }
                Some(b'=') => {
                    pos += 1;
                    Token::Le
                }
                _ => Token::Lt,
            },
            b'>' => match bytes.get(pos + 1) {
                Some(b'=') => {
                    pos += 1;
                    Token::Ge
                }
                _ => Token::Gt,
            },
            b'0'..=b'9' | b'.' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                    pos += 1;
                }
                let text = &expression[start..pos];
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::UnexpectedToken(expression[start..].to_string()))?;
                tokens.push((Token::Number(number), start));
                continue;
            }
            c if c.is_ascii_alphabetic() => {
                while pos < bytes.len() && bytes[pos].is_ascii_alphanumeric() {
                    pos += 1;
                }
                let token = match &expression[start..pos] {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "unknown" => Token::Unknown,
                    _ => return Err(ExprError::UnexpectedToken(expression[start..].to_string())),
                };
                tokens.push((token, start));
                continue;
            }
            _ => return Err(ExprError::UnexpectedToken(expression[start..].to_string())),
        };
        pos += 1;
        tokens.push((token, start));
    }

    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn unexpected(&self) -> ExprError {
        match self.tokens.get(self.pos) {
            Some((_, offset)) => ExprError::UnexpectedToken(self.source[*offset..].to_string()),
            None => ExprError::UnexpectedEnd,
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Value, ExprError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = match (left.truth(), right.truth()) {
                (Some(true), _) | (_, Some(true)) => boolean(true),
                (Some(false), Some(false)) => boolean(false),
                _ => Value::Unknown,
            };
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Value, ExprError> {
        let mut left = self.equality()?;
        while self.eat(&Token::And) {
            let right = self.equality()?;
            left = match (left.truth(), right.truth()) {
                (Some(false), _) | (_, Some(false)) => boolean(false),
                (Some(true), Some(true)) => boolean(true),
                _ => Value::Unknown,
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Value, ExprError> {
        let mut left = self.relational()?;
        loop {
            let equal = if self.eat(&Token::Eq) {
                true
            } else if self.eat(&Token::Ne) {
                false
            } else {
                return Ok(left);
            };
            let right = self.relational()?;
            left = match (left, right) {
                (Value::Number(a), Value::Number(b)) => boolean(((a - b).abs() <= EPSILON) == equal),
                _ => Value::Unknown,
            };
        }
    }

    fn relational(&mut self) -> Result<Value, ExprError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(t @ (Token::Lt | Token::Le | Token::Gt | Token::Ge)) => t.clone(),
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive()?;
            left = match (left, right) {
                (Value::Number(a), Value::Number(b)) => boolean(match op {
                    Token::Lt => a < b,
                    Token::Le => a <= b,
                    Token::Gt => a > b,
                    _ => a >= b,
                }),
                _ => Value::Unknown,
            };
        }
    }

    fn additive(&mut self) -> Result<Value, ExprError> {
        let mut left = self.multiplicative()?;
        loop {
            let plus = if self.eat(&Token::Plus) {
                true
            } else if self.eat(&Token::Minus) {
                false
            } else {
                return Ok(left);
            };
            let right = self.multiplicative()?;
            left = match (left, right) {
                (Value::Number(a), Value::Number(b)) => Value::Number(if plus { a + b } else { a - b }),
                _ => Value::Unknown,
            };
        }
    }

    fn multiplicative(&mut self) -> Result<Value, ExprError> {
        let mut left = self.unary()?;
        loop {
            let mul = if self.eat(&Token::Mul) {
                true
            } else if self.eat(&Token::Div) {
                false
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = match (left, right) {
                (Value::Number(a), Value::Number(b)) if mul => Value::Number(a * b),
                (Value::Number(_), Value::Number(b)) if b.abs() <= EPSILON => {
                    return Err(ExprError::DivisionByZero)
                }
                (Value::Number(a), Value::Number(b)) => Value::Number(a / b),
                _ => Value::Unknown,
            };
        }
    }

    fn unary(&mut self) -> Result<Value, ExprError> {
        if self.eat(&Token::Minus) {
            return Ok(match self.unary()? {
                Value::Number(n) => Value::Number(-n),
                Value::Unknown => Value::Unknown,
            });
        }
        if self.eat(&Token::Not) {
            return Ok(match self.unary()?.truth() {
                Some(b) => boolean(!b),
                None => Value::Unknown,
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Value, ExprError> {
        let value = match self.peek() {
            Some(Token::Number(n)) => Value::Number(*n),
            Some(Token::Unknown) => Value::Unknown,
            Some(Token::LParen) => {
                self.pos += 1;
                let value = self.or()?;
                if !self.eat(&Token::RParen) {
                    return Err(self.unexpected());
                }
                return Ok(value);
            }
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        Ok(value)
    }
}

/// Evaluates `expression`.
///
/// ```
/// use vigil_common::expr::{evaluate, Value};
///
/// assert_eq!(evaluate("1 and (0 or not 0)").unwrap(), Value::Number(1.0));
/// assert_eq!(evaluate("unknown or 1").unwrap(), Value::Number(1.0));
/// assert_eq!(evaluate("unknown and 1").unwrap(), Value::Unknown);
/// assert!(evaluate("1 and").is_err());
/// ```
pub fn evaluate(expression: &str) -> Result<Value, ExprError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        source: expression,
        tokens,
        pos: 0,
    };
    let value = parser.or()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.unexpected());
    }
    Ok(value)
}
