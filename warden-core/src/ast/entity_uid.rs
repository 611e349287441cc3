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

//! Entity identifiers.

use smol_str::SmolStr;
use thiserror::Error;

/// Separator between components of a type path, and between the path and id.
pub const PATH_SEP: &str = "::";

/// A unique entity identifier: a type path plus an id, written
/// `Path::To::Type::"id"`.
///
/// Equality is structural on `(path, id)`. A uid with an empty id doubles as
/// a bare type path; the `is` operator's right-hand side is represented that
/// way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityUid {
    path: Vec<SmolStr>,
    id: SmolStr,
}

impl EntityUid {
    /// Build a uid from a `::`-separated type name and an id.
    pub fn new(type_name: &str, id: impl Into<SmolStr>) -> Self {
        EntityUid {
            path: type_name.split(PATH_SEP).map(SmolStr::from).collect(),
            id: id.into(),
        }
    }

    /// Build a uid from already-split path components and an id.
    pub fn from_components(path: Vec<SmolStr>, id: impl Into<SmolStr>) -> Self {
        EntityUid {
            path,
            id: id.into(),
        }
    }

    /// A bare type path (empty id), as used by `is` checks.
    pub fn type_path(type_name: &str) -> Self {
        Self::new(type_name, "")
    }

    /// The components of the type path.
    pub fn components(&self) -> &[SmolStr] {
        &self.path
    }

    /// The full type name, `::`-joined.
    pub fn type_name(&self) -> String {
        self.path.join(PATH_SEP)
    }

    /// The entity id (without quotes).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this entity's type path starts with `prefix`'s path: the `is`
    /// check. `Foo::Bar::"x" is Foo` and `... is Foo::Bar` both hold.
    pub fn type_matches(&self, prefix: &EntityUid) -> bool {
        prefix.path.len() <= self.path.len()
            && self.path[..prefix.path.len()] == prefix.path[..]
    }
}

impl std::fmt::Display for EntityUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{:?}", self.type_name(), PATH_SEP, self.id.as_str())
    }
}

/// Error parsing the written form of an entity uid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityUidParseError {
    /// The string has no `::` separator at all
    #[error("`{0}` is not an entity uid (expected `Type::\"id\"`)")]
    MissingPath(String),
    /// A path component is empty
    #[error("`{0}` has an empty type path component")]
    EmptyComponent(String),
}

impl std::str::FromStr for EntityUid {
    type Err = EntityUidParseError;

    /// Parse the written form `Path::To::Type::"id"`. Quotes around the id
    /// are optional here so that command-line callers can pass either form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = s.split(PATH_SEP).collect();
        if parts.len() < 2 {
            return Err(EntityUidParseError::MissingPath(s.to_string()));
        }
        // unquote the id when quoted
        let id = parts.pop().unwrap_or_default();
        let id = id
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(id);
        if parts.iter().any(|p| p.is_empty()) {
            return Err(EntityUidParseError::EmptyComponent(s.to_string()));
        }
        Ok(EntityUid::from_components(
            parts.into_iter().map(SmolStr::from).collect(),
            id,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_quotes_the_id() {
        assert_eq!(
            EntityUid::new("User", "alice").to_string(),
            r#"User::"alice""#
        );
        assert_eq!(
            EntityUid::new("PhotoApp::Photo", "pic.jpg").to_string(),
            r#"PhotoApp::Photo::"pic.jpg""#
        );
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(
            EntityUid::new("A::B", "x"),
            EntityUid::from_components(vec!["A".into(), "B".into()], "x")
        );
        assert_ne!(EntityUid::new("A", "x"), EntityUid::new("A", "y"));
        assert_ne!(EntityUid::new("A", "x"), EntityUid::new("B", "x"));
    }

    #[test]
    fn type_prefix_matching() {
        let uid = EntityUid::new("Foo::Bar", "x");
        assert!(uid.type_matches(&EntityUid::type_path("Foo::Bar")));
        assert!(uid.type_matches(&EntityUid::type_path("Foo")));
        assert!(!EntityUid::new("Foo", "x").type_matches(&EntityUid::type_path("Foo::Bar")));
        assert!(!uid.type_matches(&EntityUid::type_path("Bar")));
    }

    #[test]
    fn parses_written_form() {
        let uid: EntityUid = r#"User::"alice""#.parse().unwrap();
        assert_eq!(uid, EntityUid::new("User", "alice"));
        let bare: EntityUid = "User::alice".parse().unwrap();
        assert_eq!(bare, EntityUid::new("User", "alice"));
        assert!("alice".parse::<EntityUid>().is_err());
        assert!("::\"x\"".parse::<EntityUid>().is_err());
    }
}
