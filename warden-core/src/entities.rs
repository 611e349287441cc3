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

//! The concrete entity store and its JSON ingestion.
//!
//! [`Entities`] is the in-memory [`Store`]: a map from entity uid to
//! attributes and **direct** parents (the evaluator computes transitive
//! closure itself). It can be built programmatically or ingested from the
//! JSON fixture format, an array of `{uid, attrs, parents}` objects where a
//! nested `{"__entity": {...}}` denotes an entity reference and
//! `{"__extn": {...}}` an extension value.

mod err;
mod json;
pub mod normalize;

pub use err::EntityFormatError;

use std::collections::HashMap;

use crate::ast::EntityUid;
use crate::schema::Schema;
use crate::store::{Store, StoreError};
use crate::value::{Record, Value};

/// One entity: its attributes and direct parents.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    uid: EntityUid,
    attrs: Record,
    parents: Vec<EntityUid>,
}

impl Entity {
    /// Build an entity from attribute pairs and parents.
    pub fn new<'a>(
        uid: EntityUid,
        attrs: impl IntoIterator<Item = (&'a str, Value)>,
        parents: impl IntoIterator<Item = EntityUid>,
    ) -> Self {
        Entity {
            uid,
            attrs: attrs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            parents: parents.into_iter().collect(),
        }
    }

    /// Build an entity from an already-normalised attribute record.
    pub fn from_record(uid: EntityUid, attrs: Record, parents: Vec<EntityUid>) -> Self {
        Entity {
            uid,
            attrs,
            parents,
        }
    }

    /// The entity's uid.
    pub fn uid(&self) -> &EntityUid {
        &self.uid
    }

    /// One attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// The entity's direct parents.
    pub fn parents(&self) -> &[EntityUid] {
        &self.parents
    }
}

/// An in-memory entity store, immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entities {
    entities: HashMap<EntityUid, Entity>,
}

impl Entities {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from entities. A uid listed twice keeps the later
    /// entity.
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        Entities {
            entities: entities
                .into_iter()
                .map(|e| (e.uid.clone(), e))
                .collect(),
        }
    }

    /// Ingest the JSON fixture format, normalising attribute values guided
    /// by `schema` when one is given.
    pub fn from_json_str(text: &str, schema: Option<&Schema>) -> Result<Self, EntityFormatError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| EntityFormatError::Json { msg: e.to_string() })?;
        Self::from_json_value(value, schema)
    }

    /// As [`Entities::from_json_str`], starting from parsed JSON.
    pub fn from_json_value(
        value: serde_json::Value,
        schema: Option<&Schema>,
    ) -> Result<Self, EntityFormatError> {
        json::entities_from_json_value(value, schema)
    }

    /// Look up one entity.
    pub fn get(&self, uid: &EntityUid) -> Option<&Entity> {
        self.entities.get(uid)
    }

    /// Iterate over all entities, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Store for Entities {
    fn get_attr(&self, entity: &EntityUid, attr: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .entities
            .get(entity)
            .and_then(|e| e.attrs.get(attr))
            .cloned())
    }

    fn parents(&self, entity: &EntityUid) -> Result<Vec<EntityUid>, StoreError> {
        Ok(self
            .entities
            .get(entity)
            .map(|e| e.parents.clone())
            .unwrap_or_default())
    }
}
