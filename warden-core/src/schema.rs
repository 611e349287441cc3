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

//! Schemas, consulted lazily by the normalisation layer.
//!
//! A schema is loaded from the namespaced `{commonTypes, entityTypes,
//! actions}` JSON document, checked for consistency, and flattened into
//! qualified-name lookup tables. The evaluator's decision logic never reads
//! it; only normalisation does (attribute shapes and action context shapes).

mod err;
mod json;

pub use err::SchemaError;

use std::collections::{HashMap, HashSet};

use smol_str::SmolStr;

use crate::ast::EntityUid;

/// The declared shape of a value, with its `required` flag (meaningful for
/// record attributes; absent attributes default to required).
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// What kind of value is declared here
    pub kind: ShapeKind,
    /// Whether a record attribute of this shape must be present
    pub required: bool,
}

/// The kinds of declared shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// A boolean
    Bool,
    /// A long
    Long,
    /// A string
    String,
    /// A set with the given element shape
    Set(Box<Shape>),
    /// A reference to an entity of the given (qualified) type
    Entity(SmolStr),
    /// An extension value produced by the named extension
    Extension(SmolStr),
    /// A record with the given attribute shapes
    Record(HashMap<SmolStr, Shape>),
}

/// One declared entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTypeDef {
    pub(crate) member_of_types: Vec<SmolStr>,
    pub(crate) shape: Shape,
}

impl EntityTypeDef {
    /// Qualified names of the types this type's entities may be members of.
    pub fn member_of_types(&self) -> &[SmolStr] {
        &self.member_of_types
    }

    /// The declared attribute shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// One declared action: which principal and resource types it applies to
/// (when constrained), and its context shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionDef {
    pub(crate) principal_types: Option<HashSet<SmolStr>>,
    pub(crate) resource_types: Option<HashSet<SmolStr>>,
    pub(crate) context: Option<Shape>,
}

impl ActionDef {
    /// The declared context shape, if any.
    pub fn context(&self) -> Option<&Shape> {
        self.context.as_ref()
    }
}

/// A loaded schema: entity types by qualified name, and actions grouped by
/// namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    entity_types: HashMap<SmolStr, EntityTypeDef>,
    actions: HashMap<SmolStr, HashMap<SmolStr, ActionDef>>,
}

impl Schema {
    /// An empty schema: nothing is declared, normalisation infers
    /// structurally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and consistency-check a schema document.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| SchemaError::Json { msg: e.to_string() })?;
        Self::from_json_value(value)
    }

    /// As [`Schema::from_json_str`], starting from parsed JSON.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, SchemaError> {
        json::load(value)
    }

    pub(crate) fn from_parts(
        entity_types: HashMap<SmolStr, EntityTypeDef>,
        actions: HashMap<SmolStr, HashMap<SmolStr, ActionDef>>,
    ) -> Self {
        Schema {
            entity_types,
            actions,
        }
    }

    /// The definition of a qualified entity type name, if declared.
    pub fn entity_type(&self, name: &str) -> Option<&EntityTypeDef> {
        self.entity_types.get(name)
    }

    /// The declared attribute shape for `uid`'s type, if any.
    pub fn entity_shape(&self, uid: &EntityUid) -> Option<&Shape> {
        self.entity_types
            .get(uid.type_name().as_str())
            .map(|def| &def.shape)
    }

    /// The context shape declared for `action` when it applies to this
    /// principal and resource.
    ///
    /// The action's namespace is its type path minus the final component
    /// (conventionally `Action`); an action whose `appliesTo` sets are
    /// declared and do not include the principal's or resource's type yields
    /// no shape.
    pub fn context_shape(
        &self,
        principal: &EntityUid,
        action: &EntityUid,
        resource: &EntityUid,
    ) -> Option<&Shape> {
        let components = action.components();
        let namespace = components[..components.len().saturating_sub(1)].join("::");
        let def = self.actions.get(namespace.as_str())?.get(action.id())?;

        if let Some(principal_types) = &def.principal_types {
            if !principal_types.contains(principal.type_name().as_str()) {
                return None;
            }
        }
        if let Some(resource_types) = &def.resource_types {
            if !resource_types.contains(resource.type_name().as_str()) {
                return None;
            }
        }
        def.context.as_ref()
    }

}

#[cfg(test)]
mod test {
    use super::*;
    use cool_asserts::assert_matches;
    use serde_json::json;

    fn photo_schema() -> Schema {
        Schema::from_json_value(json!({
            "PhotoApp": {
                "commonTypes": {
                    "PersonType": {
                        "type": "Record",
                        "attributes": {
                            "age": {"type": "Long"},
                            "name": {"type": "String", "required": false}
                        }
                    }
                },
                "entityTypes": {
                    "User": {
                        "memberOfTypes": ["UserGroup"],
                        "shape": {
                            "type": "Record",
                            "attributes": {
                                "person": {"type": "PersonType"},
                                "account": {"type": "Entity", "name": "Account"}
                            }
                        }
                    },
                    "UserGroup": {},
                    "Account": {},
                    "Photo": {
                        "shape": {
                            "type": "Record",
                            "attributes": {
                                "private": {"type": "Boolean"},
                                "tags": {
                                    "type": "Set",
                                    "element": {"type": "String"},
                                    "required": false
                                }
                            }
                        }
                    }
                },
                "actions": {
                    "viewPhoto": {
                        "appliesTo": {
                            "principalTypes": ["User"],
                            "resourceTypes": ["Photo"],
                            "context": {
                                "type": "Record",
                                "attributes": {
                                    "authenticated": {"type": "Boolean"}
                                }
                            }
                        }
                    },
                    "listAlbums": {}
                }
            }
        }))
        .expect("schema should load")
    }

    #[test]
    fn loads_and_flattens_namespaces() {
        let schema = photo_schema();
        assert!(schema.entity_type("PhotoApp::User").is_some());
        assert!(schema.entity_type("User").is_none());
        assert_eq!(
            schema.entity_type("PhotoApp::User").unwrap().member_of_types(),
            vec![SmolStr::from("PhotoApp::UserGroup")]
        );
    }

    #[test]
    fn common_types_resolve() {
        let schema = photo_schema();
        let shape = schema.entity_type("PhotoApp::User").unwrap().shape();
        let ShapeKind::Record(attrs) = &shape.kind else {
            panic!("expected record shape");
        };
        assert_matches!(&attrs["person"].kind, ShapeKind::Record(person) => {
            assert_matches!(person["age"].kind, ShapeKind::Long);
            assert!(!person["name"].required);
        });
        // entity references are namespaced
        assert_matches!(&attrs["account"].kind, ShapeKind::Entity(name) => {
            assert_eq!(name, "PhotoApp::Account");
        });
    }

    #[test]
    fn entity_shape_lookup_by_uid() {
        let schema = photo_schema();
        let shape = schema
            .entity_shape(&EntityUid::new("PhotoApp::Photo", "x.jpg"))
            .expect("shape");
        assert_matches!(&shape.kind, ShapeKind::Record(attrs) => {
            assert_matches!(attrs["private"].kind, ShapeKind::Bool);
            assert_matches!(&attrs["tags"].kind, ShapeKind::Set(element) => {
                assert_matches!(element.kind, ShapeKind::String);
            });
        });
        assert!(schema
            .entity_shape(&EntityUid::new("PhotoApp::Album", "a"))
            .is_none());
    }

    #[test]
    fn context_shape_respects_applies_to() {
        let schema = photo_schema();
        let user = EntityUid::new("PhotoApp::User", "alice");
        let photo = EntityUid::new("PhotoApp::Photo", "x.jpg");
        let action = EntityUid::new("PhotoApp::Action", "viewPhoto");

        let shape = schema.context_shape(&user, &action, &photo).expect("shape");
        assert_matches!(&shape.kind, ShapeKind::Record(attrs) => {
            assert_matches!(attrs["authenticated"].kind, ShapeKind::Bool);
        });

        // wrong principal type: no shape
        let robot = EntityUid::new("PhotoApp::Robot", "r2");
        assert!(schema.context_shape(&robot, &action, &photo).is_none());

        // unconstrained action: declared, but no context shape
        let list = EntityUid::new("PhotoApp::Action", "listAlbums");
        assert!(schema.context_shape(&user, &list, &photo).is_none());

        // unknown namespace
        let other = EntityUid::new("Other::Action", "viewPhoto");
        assert!(schema.context_shape(&user, &other, &photo).is_none());
    }

    #[test]
    fn consistency_whitespace_in_namespace() {
        assert_matches!(
            Schema::from_json_value(json!({"Bad Namespace": {"entityTypes": {}, "actions": {}}})),
            Err(SchemaError::WhitespaceInName { .. })
        );
        assert_matches!(
            Schema::from_json_value(json!({
                "": {"entityTypes": {"Bad Type": {}}, "actions": {}}
            })),
            Err(SchemaError::WhitespaceInName { .. })
        );
    }

    #[test]
    fn consistency_set_requires_element() {
        assert_matches!(
            Schema::from_json_value(json!({
                "": {
                    "entityTypes": {
                        "T": {"shape": {"type": "Record", "attributes": {"x": {"type": "Set"}}}}
                    },
                    "actions": {}
                }
            })),
            Err(SchemaError::MissingProperty { field: "element", .. })
        );
    }

    #[test]
    fn consistency_entity_requires_name() {
        assert_matches!(
            Schema::from_json_value(json!({
                "": {
                    "entityTypes": {
                        "T": {"shape": {"type": "Record", "attributes": {"x": {"type": "Entity"}}}}
                    },
                    "actions": {}
                }
            })),
            Err(SchemaError::MissingProperty { field: "name", .. })
        );
    }

    #[test]
    fn consistency_scalars_reject_extra_properties() {
        assert_matches!(
            Schema::from_json_value(json!({
                "": {
                    "entityTypes": {
                        "T": {"shape": {
                            "type": "Record",
                            "attributes": {"x": {"type": "String", "name": "oops"}}
                        }}
                    },
                    "actions": {}
                }
            })),
            Err(SchemaError::UnexpectedProperty { field: "name", .. })
        );
    }

    #[test]
    fn consistency_unknown_type_name() {
        assert_matches!(
            Schema::from_json_value(json!({
                "": {
                    "entityTypes": {
                        "T": {"shape": {"type": "Record", "attributes": {"x": {"type": "Mystery"}}}}
                    },
                    "actions": {}
                }
            })),
            Err(SchemaError::UnknownTypeName { name, .. }) => assert_eq!(name, "Mystery")
        );
    }

    #[test]
    fn consistency_member_of_must_be_defined() {
        assert_matches!(
            Schema::from_json_value(json!({
                "": {
                    "entityTypes": {"T": {"memberOfTypes": ["Missing"]}},
                    "actions": {}
                }
            })),
            Err(SchemaError::UndefinedMemberOf { name, .. }) => assert_eq!(name, "Missing")
        );
    }
}
