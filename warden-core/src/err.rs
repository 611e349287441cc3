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

//! Errors shared by the scanner, parser, and lowering.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use crate::token::Position;

/// A single located syntax error from the scanner, parser, or lowering.
#[derive(Debug, Clone, Error)]
#[error("{pos}: {msg}")]
pub struct ParseError {
    msg: String,
    pos: Position,
    /// The source text the error points into
    src: Arc<str>,
    /// Where in `src` the error was detected
    span: miette::SourceSpan,
}

impl Diagnostic for ParseError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(self.msg.clone()), self.span),
        )))
    }
}

impl ParseError {
    /// Build an error at `pos` over the given source text.
    pub fn new(msg: impl Into<String>, pos: Position, src: Arc<str>) -> Self {
        let offset = pos.offset.min(src.len());
        ParseError {
            msg: msg.into(),
            pos,
            src,
            span: miette::SourceSpan::new(miette::SourceOffset::from(offset), 0),
        }
    }

    /// The error message, without the position prefix.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Where the error was detected.
    pub fn position(&self) -> &Position {
        &self.pos
    }
}

/// All syntax errors found in one parse, in source order.
///
/// The parser keeps going after an error where it can, so one bad input
/// usually produces a handful of these rather than just the first.
#[derive(Debug, Clone, Default)]
pub struct ParseErrors(Vec<ParseError>);

impl std::error::Error for ParseErrors {}

impl ParseErrors {
    /// An empty error collection.
    pub fn new() -> Self {
        ParseErrors(Vec::new())
    }

    /// Record another error.
    pub fn push(&mut self, err: ParseError) {
        self.0.push(err);
    }

    /// Fold another collection into this one.
    pub fn extend(&mut self, errs: ParseErrors) {
        self.0.extend(errs.0);
    }

    /// True if no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of recorded errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the errors in source order.
    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.0.iter()
    }

    /// The last recorded error, if any.
    pub fn last(&self) -> Option<&ParseError> {
        self.0.last()
    }

    /// View the errors as a slice.
    pub fn as_slice(&self) -> &[ParseError] {
        &self.0
    }
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "no errors"),
            [err] => write!(f, "{err}"),
            [first, ..] => write!(f, "{first} (and {} more errors)", self.0.len() - 1),
        }
    }
}

impl Diagnostic for ParseErrors {
    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn Diagnostic> + 'a>> {
        Some(Box::new(self.0.iter().map(|e| e as &dyn Diagnostic)))
    }
}

impl From<ParseError> for ParseErrors {
    fn from(err: ParseError) -> Self {
        ParseErrors(vec![err])
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn err_at(msg: &str, offset: usize) -> ParseError {
        let pos = Position {
            filename: "test".into(),
            offset,
            line: 1,
            column: offset as u32 + 1,
        };
        ParseError::new(msg, pos, Arc::from("permit (principal);"))
    }

    #[test]
    fn display_counts_extra_errors() {
        let mut errs = ParseErrors::new();
        assert_eq!(errs.to_string(), "no errors");
        errs.push(err_at("unexpected token", 8));
        assert_eq!(errs.to_string(), "test:1:9: unexpected token");
        errs.push(err_at("missing ';'", 18));
        assert_eq!(
            errs.to_string(),
            "test:1:9: unexpected token (and 1 more errors)"
        );
        assert_eq!(errs.len(), 2);
    }
}
