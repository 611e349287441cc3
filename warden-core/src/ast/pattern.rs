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

//! Glob patterns, the right-hand side of the `like` operator.

use crate::unescape::PatternElem;

/// A compiled `like` pattern: characters and `*` wildcards.
///
/// In the stored text form (the AST keeps patterns as strings), `*` is the
/// wildcard, `\*` a literal star, and `\\` a literal backslash; there are no
/// other escapes. [`Pattern::parse`] and the `Display` impl round-trip that
/// form losslessly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    elems: Vec<PatternElem>,
}

impl Pattern {
    /// Parse the normalized text form.
    pub fn parse(text: &str) -> Self {
        let mut elems = Vec::new();
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '*' => elems.push(PatternElem::Wildcard),
                '\\' => match chars.next() {
                    Some(c) => elems.push(PatternElem::Char(c)),
                    None => elems.push(PatternElem::Char('\\')),
                },
                c => elems.push(PatternElem::Char(c)),
            }
        }
        Pattern { elems }
    }

    /// The pattern's elements in order.
    pub fn elems(&self) -> &[PatternElem] {
        &self.elems
    }

    /// Whether `text` matches this pattern. A `*` matches any run of
    /// characters, including the empty one.
    pub fn wildcard_match(&self, text: &str) -> bool {
        let pattern = &self.elems;
        if pattern.is_empty() {
            return text.is_empty();
        }

        // Indexable copies: matching moves both forward and backward, which
        // an iterator over the text cannot do.
        let text: Vec<char> = text.chars().collect();

        let mut i = 0; // index into text
        let mut j = 0; // index into pattern
        let mut star_idx = 0; // pattern index of the most recent *
        let mut tmp_idx = 0; // text index to resume from after backtracking
        let mut contains_star = false;

        while i < text.len() && (!contains_star || star_idx != pattern.len() - 1) {
            match pattern.get(j) {
                Some(PatternElem::Wildcard) => {
                    contains_star = true;
                    star_idx = j;
                    tmp_idx = i;
                    j += 1;
                }
                Some(PatternElem::Char(c)) if *c == text[i] => {
                    i += 1;
                    j += 1;
                }
                _ if contains_star => {
                    j = star_idx + 1;
                    i = tmp_idx + 1;
                    tmp_idx = i;
                }
                _ => return false,
            }
        }

        // consume any trailing wildcards
        while matches!(pattern.get(j), Some(PatternElem::Wildcard)) {
            j += 1;
        }
        j == pattern.len()
    }
}

impl From<Vec<PatternElem>> for Pattern {
    fn from(elems: Vec<PatternElem>) -> Self {
        Pattern { elems }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for elem in &self.elems {
            match elem {
                PatternElem::Wildcard => write!(f, "*")?,
                PatternElem::Char('*') => write!(f, r"\*")?,
                PatternElem::Char('\\') => write!(f, r"\\")?,
                PatternElem::Char(c) => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}
