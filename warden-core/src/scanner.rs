/*
 * Copyright Warden Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The scanner: policy source text to a stream of [`Token`]s.
//!
//! The scanner is tolerant: syntax problems are recorded as [`ParseError`]s
//! and scanning continues, always making forward progress. Even an input that
//! produced errors yields a usable token stream, so the parser can report as
//! many problems as possible in one pass.

use std::sync::Arc;

use smol_str::SmolStr;

use crate::err::{ParseError, ParseErrors};
use crate::token::{Position, Token, TokenKind};

const BOM: char = '\u{feff}';

/// Whether comments are emitted as [`TokenKind::Comment`] tokens or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentMode {
    /// Comments are consumed silently (the parser's default)
    #[default]
    Skip,
    /// Comments are returned to the caller
    Emit,
}

/// Scanner state over one source text.
#[derive(Debug)]
pub struct Scanner {
    filename: SmolStr,
    src: Arc<str>,
    mode: CommentMode,

    /// Current character, `None` at end of input
    ch: Option<char>,
    /// Byte offset of `ch`
    offset: usize,
    /// Byte offset just past `ch`
    rd_offset: usize,
    line: u32,
    column: u32,

    errors: ParseErrors,
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

impl Scanner {
    /// Set up a scanner over `src`. A byte order mark at the very start of
    /// the input is tolerated (once).
    pub fn new(filename: impl Into<SmolStr>, src: Arc<str>, mode: CommentMode) -> Self {
        let mut scanner = Scanner {
            filename: filename.into(),
            src,
            mode,
            ch: None,
            offset: 0,
            rd_offset: 0,
            line: 1,
            column: 0,
            errors: ParseErrors::new(),
        };
        scanner.bump();
        if scanner.ch == Some(BOM) {
            scanner.bump();
        }
        scanner
    }

    /// The source text being scanned.
    pub fn source(&self) -> &Arc<str> {
        &self.src
    }

    /// Number of errors recorded so far.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Take the recorded errors, leaving the scanner's collection empty.
    pub fn take_errors(&mut self) -> ParseErrors {
        std::mem::take(&mut self.errors)
    }

    /// Advance to the next character.
    fn bump(&mut self) {
        if self.ch == Some('\n') {
            self.line += 1;
            self.column = 0;
        }
        match self.src[self.rd_offset..].chars().next() {
            Some(ch) => {
                self.offset = self.rd_offset;
                self.rd_offset += ch.len_utf8();
                self.column += 1;
                if ch == BOM && self.offset > 0 {
                    self.error_here("illegal byte order mark");
                }
                self.ch = Some(ch);
            }
            None => {
                self.offset = self.src.len();
                self.column += 1;
                self.ch = None;
            }
        }
    }

    /// The byte following the current character, or 0 at end of input.
    fn peek(&self) -> u8 {
        self.src.as_bytes().get(self.rd_offset).copied().unwrap_or(0)
    }

    fn position(&self) -> Position {
        Position {
            filename: self.filename.clone(),
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn error_at(&mut self, pos: Position, msg: impl Into<String>) {
        self.errors
            .push(ParseError::new(msg, pos, Arc::clone(&self.src)));
    }

    fn error_here(&mut self, msg: impl Into<String>) {
        let pos = self.position();
        self.error_at(pos, msg);
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.ch, Some(' ' | '\t' | '\n' | '\r')) {
            self.bump();
        }
    }

    fn scan_ident(&mut self) -> SmolStr {
        let start = self.offset;
        if self.ch == Some('?') {
            self.bump();
        }
        while self.ch.is_some_and(is_ident_continue) {
            self.bump();
        }
        SmolStr::from(&self.src[start..self.offset])
    }

    /// Scan an integer literal: decimal digits with optional `_` separators.
    /// A separator must sit between two digits.
    fn scan_number(&mut self) -> SmolStr {
        let start = self.offset;
        let start_pos = self.position();
        while matches!(self.ch, Some('0'..='9' | '_')) {
            self.bump();
        }
        let end = self.offset;
        if let Some(i) = invalid_separator(&self.src[start..end]) {
            let pos = Position {
                offset: start + i,
                column: start_pos.column + i as u32,
                ..start_pos
            };
            self.error_at(pos, "'_' must separate successive digits");
        }
        SmolStr::from(&self.src[start..end])
    }

    /// Scan the escape sequence after a consumed `\`. On a malformed escape,
    /// report it and leave the offending character for the caller; the string
    /// scan continues either way.
    fn scan_escape(&mut self) {
        let pos = self.position();
        match self.ch {
            Some('n' | 'r' | 't' | '\\' | '\'' | '"' | '0' | '*') => self.bump(),
            Some('u') => {
                self.bump();
                if self.ch != Some('{') {
                    self.error_at(pos, "expected '{' to start unicode escape");
                    return;
                }
                self.bump();
                let mut value: u32 = 0;
                let mut digits = 0;
                while let Some(ch) = self.ch.filter(char::is_ascii_hexdigit) {
                    // hex digits cannot overflow u32 within the length limit
                    if digits < 6 {
                        value = value * 16 + ch.to_digit(16).unwrap_or(0);
                    }
                    digits += 1;
                    self.bump();
                }
                if self.ch != Some('}') {
                    self.error_at(pos, "expected '}' to end unicode escape");
                    return;
                }
                self.bump();
                if digits == 0 || digits > 6 {
                    self.error_at(pos, "unicode escape must contain 1 to 6 hex digits");
                } else if char::from_u32(value).is_none() {
                    self.error_at(pos, "escape sequence is not a valid Unicode code point");
                }
            }
            Some(ch) => {
                self.error_at(pos, format!("unknown escape sequence '\\{ch}' in string"));
            }
            None => self.error_at(pos, "escape sequence not terminated"),
        }
    }

    /// Scan a string literal; the opening quote is the current character.
    /// The returned text keeps the quotes and raw escape sequences.
    fn scan_string(&mut self) -> SmolStr {
        let start = self.offset;
        let start_pos = self.position();
        self.bump();
        loop {
            match self.ch {
                None | Some('\n') => {
                    self.error_at(start_pos, "string literal not terminated");
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    self.scan_escape();
                }
                Some(_) => self.bump(),
            }
        }
        SmolStr::from(&self.src[start..self.offset])
    }

    /// Scan a comment; the current character is the one after the leading
    /// `/`, either `/` or `*`.
    fn scan_comment(&mut self) -> SmolStr {
        let start = self.offset - 1;
        let start_pos = self.position();
        if self.ch == Some('/') {
            while !matches!(self.ch, None | Some('\n')) {
                self.bump();
            }
        } else {
            // block comment
            self.bump();
            loop {
                match self.ch {
                    None => {
                        self.error_at(start_pos, "comment not terminated");
                        break;
                    }
                    Some('*') if self.peek() == b'/' => {
                        self.bump();
                        self.bump();
                        break;
                    }
                    Some(_) => self.bump(),
                }
            }
        }
        SmolStr::from(&self.src[start..self.offset])
    }

    /// Scan the next token. At end of input this returns an
    /// [`TokenKind::Eof`] token, repeatedly if called again.
    pub fn scan(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            let pos = self.position();

            let (kind, lit) = match self.ch {
                None => (TokenKind::Eof, SmolStr::default()),
                Some(ch) if is_ident_start(ch) => {
                    let lit = self.scan_ident();
                    (TokenKind::lookup_ident(&lit), lit)
                }
                Some('?') => {
                    let lit = self.scan_ident();
                    let kind = TokenKind::lookup_ident(&lit);
                    if kind == TokenKind::Ident {
                        self.error_at(
                            pos.clone(),
                            format!("invalid slot `{lit}` (expected ?principal or ?resource)"),
                        );
                        (TokenKind::Illegal, lit)
                    } else {
                        (kind, lit)
                    }
                }
                Some('0'..='9') => (TokenKind::Int, self.scan_number()),
                Some('"') => (TokenKind::Str, self.scan_string()),
                Some(ch) => {
                    self.bump(); // always make progress
                    match ch {
                        ':' => {
                            if self.ch == Some(':') {
                                self.bump();
                                (TokenKind::PathSep, SmolStr::default())
                            } else {
                                (TokenKind::Colon, SmolStr::default())
                            }
                        }
                        '.' => (TokenKind::Period, SmolStr::default()),
                        ',' => (TokenKind::Comma, SmolStr::default()),
                        ';' => (TokenKind::Semicolon, SmolStr::default()),
                        '(' => (TokenKind::LParen, SmolStr::default()),
                        ')' => (TokenKind::RParen, SmolStr::default()),
                        '[' => (TokenKind::LBracket, SmolStr::default()),
                        ']' => (TokenKind::RBracket, SmolStr::default()),
                        '{' => (TokenKind::LBrace, SmolStr::default()),
                        '}' => (TokenKind::RBrace, SmolStr::default()),
                        '@' => (TokenKind::At, SmolStr::default()),
                        '+' => (TokenKind::Add, SmolStr::default()),
                        '-' => (TokenKind::Sub, SmolStr::default()),
                        '*' => (TokenKind::Mul, SmolStr::default()),
                        '%' => (TokenKind::Mod, SmolStr::default()),
                        '/' => {
                            if matches!(self.ch, Some('/' | '*')) {
                                let lit = self.scan_comment();
                                if self.mode == CommentMode::Skip {
                                    continue;
                                }
                                (TokenKind::Comment, lit)
                            } else {
                                (TokenKind::Div, SmolStr::default())
                            }
                        }
                        '<' => {
                            if self.ch == Some('=') {
                                self.bump();
                                (TokenKind::LtEq, SmolStr::default())
                            } else {
                                (TokenKind::Lt, SmolStr::default())
                            }
                        }
                        '>' => {
                            if self.ch == Some('=') {
                                self.bump();
                                (TokenKind::GtEq, SmolStr::default())
                            } else {
                                (TokenKind::Gt, SmolStr::default())
                            }
                        }
                        '!' => {
                            if self.ch == Some('=') {
                                self.bump();
                                (TokenKind::NotEq, SmolStr::default())
                            } else {
                                (TokenKind::Not, SmolStr::default())
                            }
                        }
                        '=' => {
                            if self.ch == Some('=') {
                                self.bump();
                                (TokenKind::Eq, SmolStr::default())
                            } else {
                                self.error_at(pos.clone(), "unexpected '=' (use '==')");
                                (TokenKind::Illegal, SmolStr::from("="))
                            }
                        }
                        '&' => {
                            if self.ch == Some('&') {
                                self.bump();
                                (TokenKind::And, SmolStr::default())
                            } else {
                                self.error_at(pos.clone(), "unexpected '&' (use '&&')");
                                (TokenKind::Illegal, SmolStr::from("&"))
                            }
                        }
                        '|' => {
                            if self.ch == Some('|') {
                                self.bump();
                                (TokenKind::Or, SmolStr::default())
                            } else {
                                self.error_at(pos.clone(), "unexpected '|' (use '||')");
                                (TokenKind::Illegal, SmolStr::from("|"))
                            }
                        }
                        _ => {
                            if ch != BOM {
                                self.error_at(pos.clone(), format!("illegal character {ch:?}"));
                            }
                            (TokenKind::Illegal, SmolStr::from(ch.to_string()))
                        }
                    }
                }
            };

            return Token { kind, pos, lit };
        }
    }
}

/// Index of the first misplaced `_` separator in a scanned number, if any.
fn invalid_separator(lit: &str) -> Option<usize> {
    let bytes = lit.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'_' {
            let prev_digit = i > 0 && bytes[i - 1].is_ascii_digit();
            let next_digit = i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit();
            if !prev_digit || !next_digit {
                return Some(i);
            }
        }
    }
    None
}
