//! Tokenizer and recursive-descent parser for User-Agent strings.
//!
//! The grammar is lenient: any input produces a tree, and structural
//! problems (an unclosed comment, a stray `)`) only set the syntax-error
//! flag on the tree. Comments nest at most [`MAX_COMMENT_DEPTH`] deep; an
//! `(` beyond that is dropped and flagged as a syntax error.
//!
//! ```text
//! agent    := ( product | comments | url | text | separator )*
//! product  := word+ ( '/' version )* comments*
//!           | word+ comments+
//! comments := '(' ( entry ( (';' | ',') entry )* )? ')'
//! entry    := ( product | comments | url | email | uuid | base64
//!             | keyvalue | text )*
//! keyvalue := word+ '=' word* | key ':' value
//! ```

use super::{NodeId, NodeKind, SyntaxTree};
use base64::Engine as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Url,
    Slash,
    Semicolon,
    Comma,
    Open,
    Close,
    Equals,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

fn is_delimiter(c: char) -> bool {
    matches!(c, '/' | ';' | ',' | '(' | ')' | '=')
}

fn url_prefix_length(rest: &str) -> Option<usize> {
    let plus = usize::from(rest.starts_with('+'));
    let body = &rest[plus..];
    for scheme in ["http://", "https://", "www."] {
        if body
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
        {
            return Some(plus);
        }
    }
    None
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let single = match c {
            '/' => Some(TokenKind::Slash),
            ';' => Some(TokenKind::Semicolon),
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::Open),
            ')' => Some(TokenKind::Close),
            '=' => Some(TokenKind::Equals),
            _ => None,
        };
        if let Some(kind) = single {
            chars.next();
            tokens.push(Token {
                kind,
                start,
                end: start + c.len_utf8(),
            });
            continue;
        }

        if let Some(skip) = url_prefix_length(&text[start..]) {
            let mut end = start;
            while let Some(&(offset, c)) = chars.peek() {
                if c.is_whitespace() || matches!(c, ';' | ',' | '(' | ')') {
                    break;
                }
                end = offset + c.len_utf8();
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Url,
                start: start + skip,
                end,
            });
            continue;
        }

        let mut end = start;
        while let Some(&(offset, c)) = chars.peek() {
            if c.is_whitespace() || is_delimiter(c) {
                break;
            }
            end = offset + c.len_utf8();
            chars.next();
        }
        tokens.push(Token {
            kind: TokenKind::Word,
            start,
            end,
        });
    }
    tokens
}

/// Starts with a digit and contains a `.` or `_`: `4.4.2`, `10_15_7`.
pub fn is_version_like(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_ascii_digit()) && word.contains(['.', '_'])
}

pub fn is_uuid(word: &str) -> bool {
    word.len() == 36
        && word.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

pub fn is_email(word: &str) -> bool {
    match word.find('@') {
        Some(at) => at > 0 && word[at + 1..].contains('.') && !word.ends_with('.'),
        None => false,
    }
}

/// Long runs of the base64 alphabet that actually decode.
pub fn is_base64(word: &str) -> bool {
    word.len() >= 20
        && word.len() % 4 == 0
        && word.bytes().any(|b| b.is_ascii_digit())
        && word
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+')
        && base64::engine::general_purpose::STANDARD
            .decode(word)
            .is_ok()
}

/// `key:value` inside a single word, with an identifier-like key.
fn split_key_value(word: &str) -> Option<usize> {
    let colon = word.find(':')?;
    let key = &word[..colon];
    let value = &word[colon + 1..];
    let mut key_chars = key.chars();
    let key_ok = key_chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && key_chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    (key_ok && !value.is_empty() && !value.contains(':')).then_some(colon)
}

/// Deepest comment nesting the parser builds nodes for.
pub const MAX_COMMENT_DEPTH: usize = 50;

struct UserAgentParser<'t> {
    text: &'t str,
    tokens: Vec<Token>,
    pos: usize,
    consumed_end: usize,
    depth: usize,
    tree: SyntaxTree,
}

/// Parse a (repaired) User-Agent into a tree. Never fails.
pub fn parse(text: &str) -> SyntaxTree {
    let mut parser = UserAgentParser {
        text,
        tokens: tokenize(text),
        pos: 0,
        consumed_end: 0,
        depth: 0,
        tree: SyntaxTree::new(text),
    };
    parser.parse_agent();
    parser.tree
}

impl<'t> UserAgentParser<'t> {
    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|token| token.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).copied()?;
        self.pos += 1;
        self.consumed_end = token.end;
        Some(token)
    }

    fn parse_agent(&mut self) {
        let root = self.tree.root();
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Word => self.parse_element(root, false),
                TokenKind::Open => {
                    self.parse_comments(root);
                }
                TokenKind::Url => self.parse_url(root),
                TokenKind::Close => {
                    self.tree.mark_syntax_error();
                    self.advance();
                }
                TokenKind::Slash | TokenKind::Semicolon | TokenKind::Comma | TokenKind::Equals => {
                    self.advance();
                }
            }
        }
    }

    /// A run of words and whatever construct it introduces.
    fn parse_element(&mut self, parent: NodeId, in_entry: bool) {
        let first = self.pos;
        while self.peek() == Some(TokenKind::Word) {
            self.advance();
        }
        let words = &self.tokens[first..self.pos];
        let (start, end) = match (words.first(), words.last()) {
            (Some(first), Some(last)) => (first.start, last.end),
            _ => return,
        };

        match self.peek() {
            Some(TokenKind::Slash) | Some(TokenKind::Open) => self.parse_product(parent, start, end),
            Some(TokenKind::Equals) => self.parse_key_value(parent, start, end),
            _ => self.add_words(parent, first, in_entry),
        }
    }

    fn parse_product(&mut self, parent: NodeId, start: usize, name_end: usize) {
        let product = self.tree.add_child(parent, NodeKind::Product, start, name_end);
        self.tree.add_child(product, NodeKind::Name, start, name_end);

        while self.peek() == Some(TokenKind::Slash) {
            self.advance();
            if self.peek() == Some(TokenKind::Word) {
                if let Some(version) = self.advance() {
                    self.tree
                        .add_child(product, NodeKind::Version, version.start, version.end);
                }
            }
        }
        while self.peek() == Some(TokenKind::Open) {
            self.parse_comments(product);
        }
        self.tree.set_end(product, self.consumed_end);
    }

    fn parse_key_value(&mut self, parent: NodeId, start: usize, key_end: usize) {
        let key_value = self.tree.add_child(parent, NodeKind::KeyValue, start, key_end);
        self.tree.add_child(key_value, NodeKind::Key, start, key_end);
        self.advance();

        let first = self.pos;
        while self.peek() == Some(TokenKind::Word) {
            self.advance();
        }
        if self.pos > first {
            let value_start = self.tokens[first].start;
            let value_end = self.consumed_end;
            let kind = if is_version_like(&self.text[value_start..value_end]) {
                NodeKind::Version
            } else {
                NodeKind::Value
            };
            self.tree.add_child(key_value, kind, value_start, value_end);
        }
        self.tree.set_end(key_value, self.consumed_end);
    }

    fn add_words(&mut self, parent: NodeId, first: usize, in_entry: bool) {
        let words = &self.tokens[first..self.pos];
        let (start, end) = match (words.first(), words.last()) {
            (Some(first), Some(last)) => (first.start, last.end),
            _ => return,
        };

        if let [word] = words {
            let text = &self.text[word.start..word.end];
            let kind = if is_uuid(text) {
                Some(NodeKind::Uuid)
            } else if is_email(text) {
                Some(NodeKind::Email)
            } else if is_base64(text) {
                Some(NodeKind::Base64)
            } else {
                None
            };
            if let Some(kind) = kind {
                self.tree.add_child(parent, kind, start, end);
                return;
            }
            if let Some(colon) = split_key_value(text) {
                let key_value = self.tree.add_child(parent, NodeKind::KeyValue, start, end);
                self.tree
                    .add_child(key_value, NodeKind::Key, start, start + colon);
                let value = &text[colon + 1..];
                let kind = if is_version_like(value) {
                    NodeKind::Version
                } else {
                    NodeKind::Value
                };
                self.tree.add_child(key_value, kind, start + colon + 1, end);
                return;
            }
        }

        if in_entry && words.len() >= 2 {
            if let (Some(name_end), Some(last)) = (words.get(words.len() - 2), words.last()) {
                if is_version_like(&self.text[last.start..last.end]) {
                    let product = self.tree.add_child(parent, NodeKind::Product, start, end);
                    self.tree.add_child(product, NodeKind::Name, start, name_end.end);
                    self.tree
                        .add_child(product, NodeKind::Version, last.start, last.end);
                    return;
                }
            }
        }

        self.tree.add_child(parent, NodeKind::Text, start, end);
    }

    fn parse_url(&mut self, parent: NodeId) {
        if let Some(url) = self.advance() {
            self.tree.add_child(parent, NodeKind::Url, url.start, url.end);
        }
    }

    fn parse_comments(&mut self, parent: NodeId) {
        let open = match self.advance() {
            Some(token) => token,
            None => return,
        };
        if self.depth >= MAX_COMMENT_DEPTH {
            self.tree.mark_syntax_error();
            return;
        }
        self.depth += 1;
        let comments = self
            .tree
            .add_child(parent, NodeKind::Comments, open.start, open.end);

        loop {
            match self.peek() {
                None => {
                    self.tree.mark_syntax_error();
                    break;
                }
                Some(TokenKind::Close) => {
                    self.advance();
                    break;
                }
                Some(TokenKind::Semicolon) | Some(TokenKind::Comma) => {
                    self.advance();
                }
                Some(_) => self.parse_entry(comments),
            }
        }
        self.tree.set_end(comments, self.consumed_end);
        self.depth -= 1;
    }

    fn parse_entry(&mut self, comments: NodeId) {
        let start = match self.tokens.get(self.pos) {
            Some(token) => token.start,
            None => return,
        };
        let entry = self.tree.add_child(comments, NodeKind::Entry, start, start);

        loop {
            match self.peek() {
                None
                | Some(TokenKind::Close)
                | Some(TokenKind::Semicolon)
                | Some(TokenKind::Comma) => break,
                Some(TokenKind::Open) => self.parse_comments(entry),
                Some(TokenKind::Url) => self.parse_url(entry),
                Some(TokenKind::Word) => self.parse_element(entry, true),
                Some(TokenKind::Slash) | Some(TokenKind::Equals) => {
                    self.advance();
                }
            }
        }
        self.tree.set_end(entry, self.consumed_end);
    }
}
