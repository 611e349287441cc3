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

//! Schema loading errors.

use thiserror::Error;

/// The schema document violated a consistency rule. `path` is the
/// `::`-joined location within the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Namespace and type names may not contain whitespace
    #[error("{path}: whitespace in name")]
    WhitespaceInName {
        /// Where in the document
        path: String,
    },
    /// A `type` field referenced neither a built-in kind nor a common type
    #[error("{path}: unknown type name `{name}`")]
    UnknownTypeName {
        /// Where in the document
        path: String,
        /// The unresolvable name
        name: String,
    },
    /// A property the declared `type` requires was absent or empty
    #[error("{path}: `{field}` property required")]
    MissingProperty {
        /// Where in the document
        path: String,
        /// The required property
        field: &'static str,
    },
    /// A property the declared `type` does not take was present
    #[error("{path}: `{field}` property not allowed here")]
    UnexpectedProperty {
        /// Where in the document
        path: String,
        /// The offending property
        field: &'static str,
    },
    /// `memberOfTypes` referenced an entity type that is not defined
    #[error("{path}: memberOf type `{name}` is not defined")]
    UndefinedMemberOf {
        /// Where in the document
        path: String,
        /// The undefined type
        name: String,
    },
    /// The document was not valid JSON or not the expected document shape
    #[error("invalid schema document: {msg}")]
    Json {
        /// The underlying parse failure
        msg: String,
    },
}
