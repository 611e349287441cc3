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

//! Implementation of the Cedar policy language: parser and evaluation engine.
//!
//! Policy text is scanned ([`scanner`]) and parsed ([`parser`]) into a
//! concrete syntax tree ([`cst`]), then lowered into the expression tree the
//! evaluator walks ([`ast`]). The [`authorizer`] combines per-policy results
//! into an `Allow`/`Deny` decision over a pluggable entity [`store`].
//!
//! The policy set, schema, and entity store are read-only after construction
//! and may be shared freely across threads; each authorization call owns its
//! [`Request`]. Custom [`store::Store`] implementations must be safe to query
//! concurrently.
#![forbid(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod ast;
pub mod authorizer;
pub mod cst;
pub mod entities;
pub mod err;
pub mod evaluator;
pub mod extensions;
pub mod parser;
pub mod request;
pub mod scanner;
pub mod schema;
pub mod store;
pub mod token;
pub mod unescape;
pub mod value;

pub use authorizer::{Authorizer, Decision, Response};
pub use request::{CancelToken, Request};
pub use value::Value;
