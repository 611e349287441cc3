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

//! The entity store contract the evaluator queries.

use thiserror::Error;

use crate::ast::EntityUid;
use crate::value::Value;

/// An error from a store backend.
///
/// A missing attribute is not an error (it is the `Ok(None)` case of
/// [`Store::get_attr`], which `has` turns into `false`); these are failures
/// of the lookup itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The request's cancellation token fired during a lookup
    #[error("store lookup cancelled")]
    Cancelled,
    /// Any other backend failure
    #[error("store error: {0}")]
    Backend(String),
}

/// Attribute and parent lookup over entities.
///
/// The contract is deliberately thin: `get_attr` resolves one attribute,
/// `parents` returns **direct** parents only. The evaluator computes the
/// transitive closure itself (with cycle detection), so stores never need to
/// materialise hierarchies.
///
/// Stores are shared across concurrently evaluated requests and must be safe
/// to query from multiple threads; any internal caching is the store's own
/// responsibility to lock. A store performing expensive lookups may consult
/// the request's cancellation token and return [`StoreError::Cancelled`].
pub trait Store: Sync {
    /// Look up one attribute of an entity. `Ok(None)` means the entity does
    /// not exist or has no such attribute.
    fn get_attr(&self, entity: &EntityUid, attr: &str) -> Result<Option<Value>, StoreError>;

    /// The direct parents of an entity. Unknown entities have none.
    fn parents(&self, entity: &EntityUid) -> Result<Vec<EntityUid>, StoreError>;
}

/// A store with no entities: every attribute is absent, every entity is
/// parentless.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyStore;

impl Store for EmptyStore {
    fn get_attr(&self, _entity: &EntityUid, _attr: &str) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }

    fn parents(&self, _entity: &EntityUid) -> Result<Vec<EntityUid>, StoreError> {
        Ok(Vec::new())
    }
}
