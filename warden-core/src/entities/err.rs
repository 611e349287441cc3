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

//! Errors from entity/context normalisation.

use thiserror::Error;

/// Normalisation failed: the input does not describe well-formed entities or
/// values. `path` is the dotted location within the input document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityFormatError {
    /// A required structural field (`type`, `id`, `fn`, `arg`) was absent
    #[error("{path}: missing `{field}` field")]
    MissingField {
        /// Where in the document
        path: String,
        /// The absent field
        field: &'static str,
    },
    /// A value had the wrong JSON type for its position
    #[error("{path}: expected {expected}, got {got}")]
    UnexpectedType {
        /// Where in the document
        path: String,
        /// What was required there
        expected: &'static str,
        /// What was found
        got: &'static str,
    },
    /// An `__extn` used a function no extension provides
    #[error("{path}: unknown extension function `{name}`")]
    UnknownExtension {
        /// Where in the document
        path: String,
        /// The unknown function name
        name: String,
    },
    /// An extension constructor rejected its argument
    #[error("{path}: {msg}")]
    InvalidValue {
        /// Where in the document
        path: String,
        /// What the constructor reported
        msg: String,
    },
    /// An entity reference did not have the type the schema declares
    #[error("{path}: entity of type `{got}` where `{expected}` is required")]
    WrongEntityType {
        /// Where in the document
        path: String,
        /// The declared type
        expected: String,
        /// The type found
        got: String,
    },
    /// A schema-required attribute was absent
    #[error("{path}: required attribute `{attr}` not provided")]
    MissingRequiredAttribute {
        /// Where in the document
        path: String,
        /// The absent attribute
        attr: String,
    },
    /// The document was not valid JSON or not the expected document shape
    #[error("invalid entity document: {msg}")]
    Json {
        /// The underlying parse failure
        msg: String,
    },
}
