//! Filter expression parsing and evaluation.
//!
//! Supports the comparison subset of the service's filter language:
//!
//! ```text
//! expr       := or
//! or         := and ("or" and)*
//! and        := unary ("and" unary)*
//! unary      := "not" unary | primary
//! primary    := "(" expr ")" | "true" | "false" | comparison
//! comparison := field ("eq" | "ne" | "gt" | "ge" | "lt" | "le") literal
//! literal    := 'quoted string' | number | true | false | null | timestamp
//! ```
//!
//! Quotes inside string literals are escaped by doubling them (`'O''Neil'`).

use std::cmp::Ordering;
use std::iter::Peekable;
use std::vec::IntoIter;

use chrono::{DateTime, FixedOffset};
use tessera_core::{FieldValue, IndexSchema, WireType};

/// Why a filter expression was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// The expression does not parse.
    #[error("syntax error at position {position}: {message}")]
    Syntax {
        /// Byte offset of the offending token
        position: usize,
        /// What was expected
        message: String,
    },

    /// The expression references a field the index does not define.
    #[error("Could not find a property named '{0}' on type 'search.document'")]
    UnknownField(String),

    /// The expression references a field that is not filterable.
    #[error("The field '{0}' is not filterable")]
    NotFilterable(String),

    /// A literal cannot be compared with the field's type.
    #[error("Cannot compare field '{field}' of type '{wire_type}' with {literal}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Field wire type
        wire_type: WireType,
        /// Offending literal, as written
        literal: String,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `eq`
    Eq,
    /// `ne`
    Ne,
    /// `gt`
    Gt,
    /// `ge`
    Ge,
    /// `lt`
    Lt,
    /// `le`
    Le,
}

impl CompareOp {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            _ => None,
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Integer or floating-point number.
    Number(f64),
    /// Unquoted ISO-8601 timestamp.
    DateTime(DateTime<FixedOffset>),
    /// Quoted string.
    String(String),
}

impl Literal {
    fn describe(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::DateTime(dt) => dt.to_rfc3339(),
            Self::String(s) => format!("'{s}'"),
        }
    }

    fn compatible_with(&self, wire_type: WireType) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(_) => wire_type == WireType::Boolean,
            Self::Number(_) => matches!(
                wire_type,
                WireType::Int32 | WireType::Int64 | WireType::Double
            ),
            Self::DateTime(_) => wire_type == WireType::DateTimeOffset,
            Self::String(s) => match wire_type {
                WireType::String => true,
                WireType::DateTimeOffset => DateTime::parse_from_rfc3339(s).is_ok(),
                _ => false,
            },
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant `true` or `false`.
    Const(bool),
    /// `field op literal`
    Compare {
        /// Field name, as written
        field: String,
        /// Operator
        op: CompareOp,
        /// Right-hand side
        value: Literal,
    },
    /// Both sides must hold.
    And(Box<Expr>, Box<Expr>),
    /// Either side must hold.
    Or(Box<Expr>, Box<Expr>),
    /// Negation.
    Not(Box<Expr>),
}

impl Expr {
    /// Check field references and literal types against an index schema.
    pub fn check(&self, schema: &IndexSchema) -> Result<(), FilterError> {
        match self {
            Self::Const(_) => Ok(()),
            Self::Compare { field, value, .. } => {
                let definition = schema
                    .field(field)
                    .ok_or_else(|| FilterError::UnknownField(field.clone()))?;
                if !definition.filterable {
                    return Err(FilterError::NotFilterable(definition.name.clone()));
                }
                if !value.compatible_with(definition.wire_type) {
                    return Err(FilterError::TypeMismatch {
                        field: definition.name.clone(),
                        wire_type: definition.wire_type,
                        literal: value.describe(),
                    });
                }
                Ok(())
            }
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                lhs.check(schema)?;
                rhs.check(schema)
            }
            Self::Not(inner) => inner.check(schema),
        }
    }

    /// Evaluate against a document.
    ///
    /// `lookup` resolves a field name to the document's value.
    pub fn matches<'a, F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<&'a FieldValue>,
    {
        match self {
            Self::Const(b) => *b,
            Self::Compare { field, op, value } => compare(lookup(field), *op, value),
            Self::And(lhs, rhs) => lhs.matches(lookup) && rhs.matches(lookup),
            Self::Or(lhs, rhs) => lhs.matches(lookup) || rhs.matches(lookup),
            Self::Not(inner) => !inner.matches(lookup),
        }
    }
}

fn compare(actual: Option<&FieldValue>, op: CompareOp, expected: &Literal) -> bool {
    let actual = actual.filter(|v| !v.is_null());

    match (actual, expected) {
        (None, Literal::Null) => op == CompareOp::Eq,
        (Some(_), Literal::Null) | (None, _) => op == CompareOp::Ne,
        (Some(value), literal) => match ordering(value, literal) {
            Some(ord) => op.accepts(ord),
            None => op == CompareOp::Ne,
        },
    }
}

fn ordering(value: &FieldValue, literal: &Literal) -> Option<Ordering> {
    match (value, literal) {
        (FieldValue::String(a), Literal::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (FieldValue::Boolean(a), Literal::Bool(b)) => Some(a.cmp(b)),
        (FieldValue::DateTime(a), Literal::DateTime(b)) => Some(a.cmp(b)),
        (FieldValue::DateTime(a), Literal::String(b)) => DateTime::parse_from_rfc3339(b)
            .ok()
            .map(|b| a.cmp(&b)),
        (value, Literal::Number(b)) => value.as_f64().and_then(|a| a.partial_cmp(b)),
        _ => None,
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Quoted(String),
    Word(String),
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, FilterError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((pos, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((pos, Token::RParen));
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    if c == '\'' {
                        if matches!(chars.peek(), Some((_, '\''))) {
                            chars.next();
                            text.push('\'');
                        } else {
                            closed = true;
                            break;
                        }
                    } else {
                        text.push(c);
                    }
                }
                if !closed {
                    return Err(FilterError::Syntax {
                        position: pos,
                        message: "unterminated string literal".to_string(),
                    });
                }
                tokens.push((pos, Token::Quoted(text)));
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '\'' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push((pos, Token::Word(word)));
            }
        }
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

/// Parse a filter expression.
pub fn parse(input: &str) -> Result<Expr, FilterError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
        end: input.len(),
    };
    let expr = parser.parse_or()?;
    match parser.tokens.next() {
        None => Ok(expr),
        Some((position, token)) => Err(FilterError::Syntax {
            position,
            message: format!("unexpected {}", describe(&token)),
        }),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Quoted(s) => format!("string literal '{s}'"),
        Token::Word(w) => format!("'{w}'"),
    }
}

fn is_keyword(word: &str, keyword: &str) -> bool {
    word.eq_ignore_ascii_case(keyword)
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Parser {
    tokens: Peekable<IntoIter<(usize, Token)>>,
    end: usize,
}

impl Parser {
    fn peek_keyword(&mut self, keyword: &str) -> bool {
        matches!(self.tokens.peek(), Some((_, Token::Word(w))) if is_keyword(w, keyword))
    }

    fn next_token(&mut self, expected: &str) -> Result<(usize, Token), FilterError> {
        self.tokens.next().ok_or_else(|| FilterError::Syntax {
            position: self.end,
            message: format!("expected {expected}, found end of expression"),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut expr = self.parse_and()?;
        while self.peek_keyword("or") {
            self.tokens.next();
            let rhs = self.parse_and()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut expr = self.parse_unary()?;
        while self.peek_keyword("and") {
            self.tokens.next();
            let rhs = self.parse_unary()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, FilterError> {
        if self.peek_keyword("not") {
            self.tokens.next();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, FilterError> {
        let (position, token) = self.next_token("an expression")?;
        match token {
            Token::LParen => {
                let expr = self.parse_or()?;
                match self.next_token("')'")? {
                    (_, Token::RParen) => Ok(expr),
                    (position, other) => Err(FilterError::Syntax {
                        position,
                        message: format!("expected ')', found {}", describe(&other)),
                    }),
                }
            }
            Token::Word(word) if is_keyword(&word, "true") => Ok(Expr::Const(true)),
            Token::Word(word) if is_keyword(&word, "false") => Ok(Expr::Const(false)),
            Token::Word(field) if is_identifier(&field) => self.parse_comparison(field),
            other => Err(FilterError::Syntax {
                position,
                message: format!("expected a field name, found {}", describe(&other)),
            }),
        }
    }

    fn parse_comparison(&mut self, field: String) -> Result<Expr, FilterError> {
        let (position, token) = self.next_token("a comparison operator")?;
        let op = match &token {
            Token::Word(word) => CompareOp::from_keyword(&word.to_ascii_lowercase()),
            _ => None,
        }
        .ok_or_else(|| FilterError::Syntax {
            position,
            message: format!("expected a comparison operator, found {}", describe(&token)),
        })?;

        let value = self.parse_literal()?;
        Ok(Expr::Compare { field, op, value })
    }

    fn parse_literal(&mut self) -> Result<Literal, FilterError> {
        let (position, token) = self.next_token("a literal")?;
        match token {
            Token::Quoted(text) => Ok(Literal::String(text)),
            Token::Word(word) => {
                if is_keyword(&word, "null") {
                    Ok(Literal::Null)
                } else if is_keyword(&word, "true") {
                    Ok(Literal::Bool(true))
                } else if is_keyword(&word, "false") {
                    Ok(Literal::Bool(false))
                } else if let Ok(number) = word.parse::<f64>() {
                    Ok(Literal::Number(number))
                } else if let Ok(dt) = DateTime::parse_from_rfc3339(&word) {
                    Ok(Literal::DateTime(dt))
                } else {
                    Err(FilterError::Syntax {
                        position,
                        message: format!("invalid literal '{word}'"),
                    })
                }
            }
            other => Err(FilterError::Syntax {
                position,
                message: format!("expected a literal, found {}", describe(&other)),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
