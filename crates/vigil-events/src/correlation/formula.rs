//! Boolean structure of correlation formulas, used to turn a formula into
//! an old event filter.

use vigil_storage::Predicate;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FormulaNode {
    Condition(u64),
    Not(Box<FormulaNode>),
    And(Vec<FormulaNode>),
    Or(Vec<FormulaNode>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Condition(u64),
    And,
    Or,
    Not,
    Open,
    Close,
}

fn tokenize(formula: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = formula.char_indices().peekable();
    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '{' => {
                let end = formula[pos..]
                    .find('}')
                    .ok_or_else(|| format!("unterminated condition at position {pos}"))?;
                let id = formula[pos + 1..pos + end]
                    .parse::<u64>()
                    .map_err(|_| format!("invalid condition id at position {pos}"))?;
                tokens.push(Token::Condition(id));
                while chars.peek().is_some_and(|&(i, _)| i <= pos + end) {
                    chars.next();
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !c.is_ascii_alphabetic() {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => return Err(format!("unexpected word \"{word}\"")),
                });
            }
            other => return Err(format!("unexpected character '{other}' at position {pos}")),
        }
    }
    Ok(tokens)
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

    fn or_expr(&mut self) -> Result<FormulaNode, String> {
        let mut items = vec![self.and_expr()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            items.push(self.and_expr()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            FormulaNode::Or(items)
        })
    }

    fn and_expr(&mut self) -> Result<FormulaNode, String> {
        let mut items = vec![self.unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            items.push(self.unary()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            FormulaNode::And(items)
        })
    }

    fn unary(&mut self) -> Result<FormulaNode, String> {
        match self.next() {
            Some(Token::Not) => Ok(FormulaNode::Not(Box::new(self.unary()?))),
            Some(Token::Condition(id)) => Ok(FormulaNode::Condition(id)),
            Some(Token::Open) => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of formula".to_string()),
        }
    }
}

/// Parses a formula. An empty formula yields `None`.
pub(crate) fn parse(formula: &str) -> Result<Option<FormulaNode>, String> {
    let tokens = tokenize(formula)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.or_expr()?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected {token:?} after end of formula"));
    }
    Ok(Some(node))
}

impl FormulaNode {
    /// Builds the predicate tree, asking `leaf` for each condition. Fails
    /// with the first condition id `leaf` cannot map.
    pub(crate) fn to_predicate(
        &self,
        leaf: &mut impl FnMut(u64) -> Option<Predicate>,
    ) -> Result<Predicate, u64> {
        Ok(match self {
            FormulaNode::Condition(id) => leaf(*id).ok_or(*id)?,
            FormulaNode::Not(inner) => inner.to_predicate(leaf)?.negate(),
            FormulaNode::And(items) => Predicate::And(
                items
                    .iter()
                    .map(|item| item.to_predicate(leaf))
                    .collect::<Result<_, _>>()?,
            ),
            FormulaNode::Or(items) => Predicate::Or(
                items
                    .iter()
                    .map(|item| item.to_predicate(leaf))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}
