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

//! String and pattern unescaping.
//!
//! The scanner leaves string literals raw (quotes and escapes included);
//! lowering resolves them here. Plain strings accept the escape set
//! `\n \r \t \\ \' \" \0 \u{...}`; `like` patterns additionally accept `\*`,
//! a literal star as opposed to the `*` wildcard.

use smol_str::SmolStr;
use thiserror::Error;

/// An escape sequence the unescaper rejected, with its character offset in
/// the literal's inner text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid escape `{escape}`")]
pub struct UnescapeError {
    /// The offending escape as written
    pub escape: String,
    /// Byte offset of the backslash within the unquoted text
    pub offset: usize,
}

/// A single element of an unescaped `like` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternElem {
    /// A character to match exactly (`\*` produces `Char('*')`)
    Char(char),
    /// The `*` wildcard
    Wildcard,
}

/// One resolved item: a character, or a star that was written `\*`.
enum Item {
    Char(char),
    LiteralStar,
}

/// Strip the surrounding quotes from a raw string literal, if present.
/// A literal left unterminated by a scanner error may lack the closing quote.
pub fn strip_quotes(raw: &str) -> &str {
    let inner = raw.strip_prefix('"').unwrap_or(raw);
    inner.strip_suffix('"').unwrap_or(inner)
}

/// Unescape the contents of a (quoted) string literal.
pub fn to_unescaped_string(raw: &str) -> Result<SmolStr, Vec<UnescapeError>> {
    let mut out = String::new();
    let mut errors = Vec::new();
    unescape(strip_quotes(raw), &mut errors, |item| match item {
        Item::Char(c) => {
            out.push(c);
            true
        }
        // `\*` is only meaningful in patterns
        Item::LiteralStar => false,
    });
    if errors.is_empty() {
        Ok(SmolStr::from(out))
    } else {
        Err(errors)
    }
}

/// Unescape the contents of a (quoted) `like` pattern literal.
pub fn to_pattern(raw: &str) -> Result<Vec<PatternElem>, Vec<UnescapeError>> {
    let mut out = Vec::new();
    let mut errors = Vec::new();
    unescape(strip_quotes(raw), &mut errors, |item| {
        out.push(match item {
            Item::Char('*') => PatternElem::Wildcard,
            Item::Char(c) => PatternElem::Char(c),
            Item::LiteralStar => PatternElem::Char('*'),
        });
        true
    });
    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

/// Walk `text` resolving escapes. `emit` returns false to reject an item as
/// invalid in the caller's context.
fn unescape(text: &str, errors: &mut Vec<UnescapeError>, mut emit: impl FnMut(Item) -> bool) {
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if ch != '\\' {
            emit(Item::Char(ch));
            continue;
        }
        let resolved = match chars.next() {
            Some((_, 'n')) => Some(Item::Char('\n')),
            Some((_, 'r')) => Some(Item::Char('\r')),
            Some((_, 't')) => Some(Item::Char('\t')),
            Some((_, '\\')) => Some(Item::Char('\\')),
            Some((_, '\'')) => Some(Item::Char('\'')),
            Some((_, '"')) => Some(Item::Char('"')),
            Some((_, '0')) => Some(Item::Char('\0')),
            Some((_, '*')) => Some(Item::LiteralStar),
            Some((_, 'u')) => take_unicode_escape(&mut chars).map(Item::Char),
            _ => None,
        };
        let mut escape = || {
            let end = chars.peek().map_or(text.len(), |(j, _)| *j);
            text[i..end].to_string()
        };
        match resolved {
            Some(item) => {
                if !emit(item) {
                    errors.push(UnescapeError {
                        escape: escape(),
                        offset: i,
                    });
                }
            }
            None => errors.push(UnescapeError {
                escape: escape(),
                offset: i,
            }),
        }
    }
}

fn take_unicode_escape(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Option<char> {
    match chars.next() {
        Some((_, '{')) => {}
        _ => return None,
    }
    let mut value: u32 = 0;
    let mut digits = 0;
    loop {
        match chars.next() {
            Some((_, '}')) => break,
            Some((_, c)) if c.is_ascii_hexdigit() => {
                if digits >= 6 {
                    return None;
                }
                value = value * 16 + c.to_digit(16).unwrap_or(0);
                digits += 1;
            }
            _ => return None,
        }
    }
    if digits == 0 {
        return None;
    }
    char::from_u32(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_strings() {
        assert_eq!(to_unescaped_string(r#""hello""#).unwrap(), "hello");
        assert_eq!(to_unescaped_string(r#""""#).unwrap(), "");
        assert_eq!(
            to_unescaped_string(r#""a\tb\nc\\d\'e\"f\0g""#).unwrap(),
            "a\tb\nc\\d'e\"f\0g"
        );
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!(to_unescaped_string(r#""\u{48}i""#).unwrap(), "Hi");
        assert_eq!(to_unescaped_string(r#""\u{1F408}""#).unwrap(), "\u{1F408}");
        assert_eq!(to_unescaped_string(r#""\u{0}""#).unwrap(), "\0");

        for bad in [r#""\u{}""#, r#""\u""#, r#""\u{zz}""#, r#""\u{1234567}""#, r#""\u{D800}""#] {
            let errs = to_unescaped_string(bad).unwrap_err();
            assert_eq!(errs.len(), 1, "{bad}");
        }
    }

    #[test]
    fn invalid_escapes_are_collected() {
        let errs = to_unescaped_string(r#""a\qb\xc""#).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].escape, r"\q");
        assert_eq!(errs[1].escape, r"\x");
    }

    #[test]
    fn star_escape_is_only_for_patterns() {
        assert!(to_unescaped_string(r#""a\*b""#).is_err());
        assert_eq!(
            to_pattern(r#""a\*b""#).unwrap(),
            vec![
                PatternElem::Char('a'),
                PatternElem::Char('*'),
                PatternElem::Char('b')
            ]
        );
    }

    #[test]
    fn pattern_wildcards_and_backslashes() {
        assert_eq!(
            to_pattern(r#""a*b""#).unwrap(),
            vec![
                PatternElem::Char('a'),
                PatternElem::Wildcard,
                PatternElem::Char('b')
            ]
        );
        // `\\*` is a literal backslash followed by a wildcard
        assert_eq!(
            to_pattern(r#""\\*""#).unwrap(),
            vec![PatternElem::Char('\\'), PatternElem::Wildcard]
        );
        assert_eq!(to_pattern(r#""""#).unwrap(), vec![]);
    }
}
