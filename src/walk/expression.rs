//! Path-expression parsing.
//!
//! This module provides tokenization and parsing of the expressions used in
//! matcher rules, such as
//! `LookUp[OSNames;agent.(1)product.(1)comments.(*)entry.(1)text[1]]`,
//! into an AST that the walk-list builder and the hash-path calculation
//! both visit.

use crate::error::{Result, UserAgentError};
use crate::splitter::WordRange;
use crate::tree::NodeKind;

/// Highest ordinal an explicit `(N)` or `(N-M)` may name.
///
/// Every ordinal in a range becomes its own hash entry, so the bound keeps
/// the number of registered paths finite.
pub(crate) const MAX_ORDINAL: u32 = 50;

/// Tokens in a path expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Dot,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Semicolon,
    Minus,
    Star,
    Up,
    Next(u8),
    Prev(u8),
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
    Contains,
    InSet,
    NotInSet,
    At,
    Number(u32),
    Name(String),
    Value(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LookupKind {
    Lookup,
    LookupPrefix,
    LookupContains,
    IsInLookupPrefix,
    IsInLookupContains,
}

/// One navigation or test step of a base path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PathStep {
    Down { first: u32, last: u32, kind: NodeKind },
    Up,
    Next(u8),
    Prev(u8),
    Equals(String),
    NotEquals(String),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    IsInSet(String),
    IsNotInSet(String),
    WordRange(WordRange),
    BackToFull,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MatcherExpr {
    Fixed(String),
    Variable {
        name: String,
        steps: Vec<PathStep>,
    },
    Agent {
        steps: Vec<PathStep>,
    },
    Concat {
        prefix: Option<String>,
        inner: Box<MatcherExpr>,
        postfix: Option<String>,
    },
    NormalizeBrand(Box<MatcherExpr>),
    CleanVersion(Box<MatcherExpr>),
    Lookup {
        kind: LookupKind,
        name: String,
        inner: Box<MatcherExpr>,
        default: Option<String>,
    },
    WordRange {
        inner: Box<MatcherExpr>,
        range: WordRange,
    },
}

impl MatcherExpr {
    /// The innermost `VALUE`, `@variable` or `agent` path.
    pub(crate) fn base(&self) -> &MatcherExpr {
        match self {
            MatcherExpr::Concat { inner, .. }
            | MatcherExpr::NormalizeBrand(inner)
            | MatcherExpr::CleanVersion(inner)
            | MatcherExpr::Lookup { inner, .. }
            | MatcherExpr::WordRange { inner, .. } => inner.base(),
            base => base,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expression {
    pub is_null: bool,
    pub matcher: MatcherExpr,
}

/// Tokenize a path expression.
pub(crate) fn tokenize_expression(expression: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '.' | '(' | ')' | '[' | ']' | ';' | '-' | '*' | '^' | '=' | '{' | '}' | '~' | '@' => {
                chars.next();
                tokens.push(match ch {
                    '.' => Token::Dot,
                    '(' => Token::LeftParen,
                    ')' => Token::RightParen,
                    '[' => Token::LeftBracket,
                    ']' => Token::RightBracket,
                    ';' => Token::Semicolon,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '^' => Token::Up,
                    '=' => Token::Equals,
                    '{' => Token::StartsWith,
                    '}' => Token::EndsWith,
                    '~' => Token::Contains,
                    _ => Token::At,
                });
            }
            '>' | '<' => {
                let mut count = 0u8;
                while chars.peek() == Some(&ch) {
                    chars.next();
                    count += 1;
                    if count > 4 {
                        return Err(UserAgentError::invalid_expression(
                            expression,
                            format!("At most 4 '{ch}' can be combined"),
                        ));
                    }
                }
                tokens.push(if ch == '>' {
                    Token::Next(count)
                } else {
                    Token::Prev(count)
                });
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEquals);
                } else {
                    return Err(UserAgentError::invalid_expression(
                        expression,
                        "Expected '=' after '!'",
                    ));
                }
            }
            '?' => {
                chars.next();
                if chars.peek() == Some(&'!') {
                    chars.next();
                    tokens.push(Token::NotInSet);
                } else {
                    tokens.push(Token::InSet);
                }
            }
            '0'..='9' => {
                let mut number_str = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() {
                        number_str.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = number_str.parse::<u32>().map_err(|_| {
                    UserAgentError::invalid_expression(
                        expression,
                        format!("Number out of range: {number_str}"),
                    )
                })?;
                tokens.push(Token::Number(number));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut identifier = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        identifier.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(identifier));
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some(escaped) => value.push(escaped),
                            None => break,
                        },
                        '"' => {
                            closed = true;
                            break;
                        }
                        _ => value.push(ch),
                    }
                }
                if !closed {
                    return Err(UserAgentError::invalid_expression(
                        expression,
                        "Unterminated string value",
                    ));
                }
                tokens.push(Token::Value(value));
            }
            _ => {
                return Err(UserAgentError::invalid_expression(
                    expression,
                    format!("Unexpected character '{ch}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

/// Recursive descent parser for path expressions.
pub(crate) struct ExpressionParser<'a> {
    expression: &'a str,
    tokens: &'a [Token],
    position: usize,
}

impl<'a> ExpressionParser<'a> {
    pub(crate) fn new(expression: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            expression,
            tokens,
            position: 0,
        }
    }

    fn current_token(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_token(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.current_token().cloned();
        self.position += 1;
        token
    }

    fn error(&self, reason: impl Into<String>) -> UserAgentError {
        UserAgentError::invalid_expression(self.expression, reason)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        if self.current_token() == Some(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("Expected {what}")))
        }
    }

    fn expect_name(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Name(name)) => Ok(name),
            _ => Err(self.error("Expected a name")),
        }
    }

    fn expect_value(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Value(value)) => Ok(value),
            _ => Err(self.error("Expected a quoted value")),
        }
    }

    fn expect_number(&mut self) -> Result<u32> {
        match self.advance() {
            Some(Token::Number(number)) => Ok(number),
            _ => Err(self.error("Expected a number")),
        }
    }

    /// A word index; negative values are reserved for counting from the end.
    fn expect_word_number(&mut self) -> Result<i32> {
        let number = self.expect_number()?;
        i32::try_from(number).map_err(|_| self.error(format!("Word index {number} is too large")))
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.current_token(), Some(Token::Name(name)) if name.eq_ignore_ascii_case(keyword))
    }

    /// Parse a complete expression, optionally wrapped in `IsNull[...]`.
    pub(crate) fn parse_expression(&mut self) -> Result<Expression> {
        let expression = if self.is_keyword("IsNull")
            && self.peek_token(1) == Some(&Token::LeftBracket)
        {
            self.advance();
            self.advance();
            let matcher = self.parse_matcher()?;
            self.expect(Token::RightBracket, "']' closing IsNull")?;
            Expression {
                is_null: true,
                matcher,
            }
        } else {
            Expression {
                is_null: false,
                matcher: self.parse_matcher()?,
            }
        };

        if self.position < self.tokens.len() {
            return Err(self.error("Unexpected trailing input"));
        }
        Ok(expression)
    }

    fn parse_matcher(&mut self) -> Result<MatcherExpr> {
        let mut matcher = self.parse_primary()?;
        while self.current_token() == Some(&Token::LeftBracket) {
            let range = self.parse_word_range()?;
            matcher = MatcherExpr::WordRange {
                inner: Box::new(matcher),
                range,
            };
        }
        Ok(matcher)
    }

    fn parse_primary(&mut self) -> Result<MatcherExpr> {
        match self.current_token() {
            Some(Token::Value(value)) => {
                let value = value.clone();
                self.advance();
                Ok(MatcherExpr::Fixed(value))
            }
            Some(Token::At) => {
                self.advance();
                let name = self.expect_name()?;
                let steps = self.parse_steps()?;
                Ok(MatcherExpr::Variable { name, steps })
            }
            Some(Token::Name(name)) => {
                let keyword = name.to_ascii_lowercase();
                match keyword.as_str() {
                    "agent" => {
                        self.advance();
                        let steps = self.parse_steps()?;
                        Ok(MatcherExpr::Agent { steps })
                    }
                    "concat" => self.parse_concat(),
                    "normalizebrand" => {
                        self.advance();
                        Ok(MatcherExpr::NormalizeBrand(Box::new(
                            self.parse_bracketed_matcher()?,
                        )))
                    }
                    "cleanversion" => {
                        self.advance();
                        Ok(MatcherExpr::CleanVersion(Box::new(
                            self.parse_bracketed_matcher()?,
                        )))
                    }
                    "lookup" => self.parse_lookup(LookupKind::Lookup),
                    "lookupprefix" => self.parse_lookup(LookupKind::LookupPrefix),
                    "lookupcontains" => self.parse_lookup(LookupKind::LookupContains),
                    "isinlookupprefix" => self.parse_lookup(LookupKind::IsInLookupPrefix),
                    "isinlookupcontains" => self.parse_lookup(LookupKind::IsInLookupContains),
                    "isnull" => Err(self.error("IsNull can only wrap the whole expression")),
                    _ => Err(self.error(format!("Unknown keyword \"{name}\""))),
                }
            }
            Some(_) => Err(self.error("Unexpected token in expression")),
            None => Err(self.error("Unexpected end of expression")),
        }
    }

    fn parse_bracketed_matcher(&mut self) -> Result<MatcherExpr> {
        self.expect(Token::LeftBracket, "'['")?;
        let matcher = self.parse_matcher()?;
        self.expect(Token::RightBracket, "']'")?;
        Ok(matcher)
    }

    fn parse_concat(&mut self) -> Result<MatcherExpr> {
        self.advance();
        self.expect(Token::LeftBracket, "'[' after Concat")?;

        let prefix = match (self.current_token(), self.peek_token(1)) {
            (Some(Token::Value(value)), Some(Token::Semicolon)) => {
                let value = value.clone();
                self.advance();
                self.advance();
                Some(value)
            }
            _ => None,
        };
        let inner = self.parse_matcher()?;
        let postfix = if self.current_token() == Some(&Token::Semicolon) {
            self.advance();
            Some(self.expect_value()?)
        } else {
            None
        };
        self.expect(Token::RightBracket, "']' closing Concat")?;

        if prefix.is_none() && postfix.is_none() {
            return Err(self.error("Concat needs a prefix or a postfix"));
        }
        Ok(MatcherExpr::Concat {
            prefix,
            inner: Box::new(inner),
            postfix,
        })
    }

    fn parse_lookup(&mut self, kind: LookupKind) -> Result<MatcherExpr> {
        self.advance();
        self.expect(Token::LeftBracket, "'[' after lookup keyword")?;
        let name = self.expect_name()?;
        self.expect(Token::Semicolon, "';' after lookup name")?;
        let inner = self.parse_matcher()?;

        let allows_default = matches!(
            kind,
            LookupKind::Lookup | LookupKind::LookupPrefix | LookupKind::LookupContains
        );
        let default = if allows_default && self.current_token() == Some(&Token::Semicolon) {
            self.advance();
            Some(self.expect_value()?)
        } else {
            None
        };
        self.expect(Token::RightBracket, "']' closing lookup")?;

        Ok(MatcherExpr::Lookup {
            kind,
            name,
            inner: Box::new(inner),
            default,
        })
    }

    fn parse_steps(&mut self) -> Result<Vec<PathStep>> {
        let mut steps = Vec::new();
        loop {
            let step = match self.current_token() {
                Some(Token::Dot) => {
                    self.advance();
                    self.parse_down()?
                }
                Some(Token::Up) => {
                    self.advance();
                    PathStep::Up
                }
                Some(&Token::Next(count)) => {
                    self.advance();
                    PathStep::Next(count)
                }
                Some(&Token::Prev(count)) => {
                    self.advance();
                    PathStep::Prev(count)
                }
                Some(Token::Equals) => {
                    self.advance();
                    PathStep::Equals(self.expect_value()?)
                }
                Some(Token::NotEquals) => {
                    self.advance();
                    PathStep::NotEquals(self.expect_value()?)
                }
                Some(Token::StartsWith) => {
                    self.advance();
                    PathStep::StartsWith(self.expect_value()?)
                }
                Some(Token::EndsWith) => {
                    self.advance();
                    PathStep::EndsWith(self.expect_value()?)
                }
                Some(Token::Contains) => {
                    self.advance();
                    PathStep::Contains(self.expect_value()?)
                }
                Some(Token::InSet) => {
                    self.advance();
                    PathStep::IsInSet(self.expect_name()?)
                }
                Some(Token::NotInSet) => {
                    self.advance();
                    PathStep::IsNotInSet(self.expect_name()?)
                }
                Some(Token::LeftBracket) => PathStep::WordRange(self.parse_word_range()?),
                Some(Token::At) => {
                    self.advance();
                    PathStep::BackToFull
                }
                _ => break,
            };
            steps.push(step);
        }
        Ok(steps)
    }

    /// `(N)`, `(N-M)` or `(*)` followed by a node name.
    fn parse_down(&mut self) -> Result<PathStep> {
        let range = if self.current_token() == Some(&Token::LeftParen) {
            self.advance();
            let range = if self.current_token() == Some(&Token::Star) {
                self.advance();
                None
            } else {
                let first = self.expect_number()?;
                let last = if self.current_token() == Some(&Token::Minus) {
                    self.advance();
                    self.expect_number()?
                } else {
                    first
                };
                Some((first, last))
            };
            self.expect(Token::RightParen, "')' closing the number range")?;
            range
        } else {
            None
        };

        let name = self.expect_name()?;
        let kind = NodeKind::from_name(&name.to_ascii_lowercase())
            .ok_or_else(|| UserAgentError::UnknownNodeName(name.clone()))?;
        let (first, last) = range.unwrap_or((1, kind.max_range()));
        if first < 1 || last < first {
            return Err(self.error(format!("Invalid number range ({first}-{last})")));
        }
        if last > MAX_ORDINAL {
            return Err(self.error(format!(
                "Number range ({first}-{last}) goes beyond {MAX_ORDINAL}"
            )));
        }
        Ok(PathStep::Down { first, last, kind })
    }

    /// `[N]`, `[N-M]`, `[-M]` or `[N-]`.
    fn parse_word_range(&mut self) -> Result<WordRange> {
        self.expect(Token::LeftBracket, "'['")?;
        let range = match self.current_token() {
            Some(Token::Minus) => {
                self.advance();
                let last = self.expect_word_number()?;
                WordRange::new(1, last)
            }
            Some(Token::Number(_)) => {
                let first = self.expect_word_number()?;
                if self.current_token() == Some(&Token::Minus) {
                    self.advance();
                    match self.current_token() {
                        Some(Token::Number(_)) => WordRange::new(first, self.expect_word_number()?),
                        _ => WordRange::new(first, -1),
                    }
                } else {
                    WordRange::single(first)
                }
            }
            _ => return Err(self.error("Expected a word range")),
        };
        self.expect(Token::RightBracket, "']' closing the word range")?;

        if range.first < 1 || (range.last > 0 && range.last < range.first) || range.last == 0 {
            return Err(self.error(format!("Invalid word range {}", range.step_label())));
        }
        Ok(range)
    }
}

/// Tokenize and parse a path expression.
pub(crate) fn parse_expression(expression: &str) -> Result<Expression> {
    let tokens = tokenize_expression(expression)?;
    if tokens.is_empty() {
        return Err(UserAgentError::invalid_expression(
            expression,
            "Empty expression",
        ));
    }

    let mut parser = ExpressionParser::new(expression, &tokens);
    parser.parse_expression()
}
