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

//! Schema JSON loading: document types, consistency checks, flattening.
//!
//! Loading is verify-then-process: the document is first checked against the
//! consistency rules, then flattened into the runtime lookup tables with all
//! names namespace-qualified and common types resolved. Common types may not
//! reference other common types.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use super::{ActionDef, EntityTypeDef, Schema, SchemaError, Shape, ShapeKind};

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct SchemaJson(HashMap<String, NamespaceJson>);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceJson {
    #[serde(default)]
    entity_types: HashMap<String, EntityTypeJson>,
    #[serde(default)]
    actions: HashMap<String, ActionJson>,
    #[serde(default)]
    common_types: HashMap<String, ShapeJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityTypeJson {
    #[serde(default)]
    member_of_types: Vec<String>,
    #[serde(default)]
    shape: ShapeJson,
}

#[derive(Debug, Clone, Deserialize)]
struct ShapeJson {
    /// Empty means an attribute-less record, as the reference format allows
    #[serde(rename = "type", default)]
    type_name: String,
    /// Attributes are required unless declared otherwise
    #[serde(default = "default_true")]
    required: bool,
    #[serde(default)]
    attributes: HashMap<String, ShapeJson>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    element: Option<Box<ShapeJson>>,
}

fn default_true() -> bool {
    true
}

impl Default for ShapeJson {
    fn default() -> Self {
        ShapeJson {
            type_name: String::new(),
            required: true,
            attributes: HashMap::new(),
            name: None,
            element: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionJson {
    #[serde(default)]
    applies_to: Option<AppliesToJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppliesToJson {
    #[serde(default)]
    principal_types: Option<Vec<String>>,
    #[serde(default)]
    resource_types: Option<Vec<String>>,
    #[serde(default)]
    context: Option<ShapeJson>,
}

/// Load a schema document: parse, verify consistency, flatten.
pub(super) fn load(value: serde_json::Value) -> Result<Schema, SchemaError> {
    let doc: SchemaJson =
        serde_json::from_value(value).map_err(|e| SchemaError::Json { msg: e.to_string() })?;
    verify(&doc)?;
    process(&doc)
}

// ---------------------------------------------------------------------
// Consistency checks

fn has_whitespace(name: &str) -> bool {
    name.chars().any(char::is_whitespace)
}

fn verify(doc: &SchemaJson) -> Result<(), SchemaError> {
    for (namespace, entry) in &doc.0 {
        if has_whitespace(namespace) {
            return Err(SchemaError::WhitespaceInName {
                path: namespace.clone(),
            });
        }
        for (name, shape) in &entry.common_types {
            let path = format!("{namespace}::commonTypes::{name}");
            if has_whitespace(name) {
                return Err(SchemaError::WhitespaceInName { path });
            }
            verify_shape(&path, shape, None)?;
        }
        for (name, entity) in &entry.entity_types {
            let path = format!("{namespace}::entityTypes::{name}");
            if has_whitespace(name) {
                return Err(SchemaError::WhitespaceInName { path });
            }
            verify_shape(&path, &entity.shape, Some(&entry.common_types))?;
            for member in &entity.member_of_types {
                if !entry.entity_types.contains_key(member) {
                    return Err(SchemaError::UndefinedMemberOf {
                        path,
                        name: member.clone(),
                    });
                }
            }
        }
        // action names may contain whitespace
        for (name, action) in &entry.actions {
            if let Some(context) = action.applies_to.as_ref().and_then(|a| a.context.as_ref()) {
                let path = format!("{namespace}::actions::{name}::context");
                verify_shape(&path, context, Some(&entry.common_types))?;
            }
        }
    }
    Ok(())
}

fn verify_shape(
    path: &str,
    shape: &ShapeJson,
    common: Option<&HashMap<String, ShapeJson>>,
) -> Result<(), SchemaError> {
    let mut allows_attributes = false;
    let mut allows_name = false;
    let mut allows_element = false;

    match shape.type_name.as_str() {
        "String" | "Long" | "Boolean" => {}
        "Set" => {
            allows_element = true;
            match &shape.element {
                None => {
                    return Err(SchemaError::MissingProperty {
                        path: path.to_string(),
                        field: "element",
                    })
                }
                Some(element) => verify_shape(path, element, common)?,
            }
        }
        "Entity" | "Extension" => {
            allows_name = true;
            if shape.name.as_deref().unwrap_or("").is_empty() {
                return Err(SchemaError::MissingProperty {
                    path: path.to_string(),
                    field: "name",
                });
            }
        }
        // empty string is a bare record definition
        "Record" | "" => {
            allows_attributes = true;
            for (attr, sub) in &shape.attributes {
                verify_shape(&format!("{path}::{attr}"), sub, common)?;
            }
        }
        other => {
            let resolves = common.is_some_and(|c| c.contains_key(other));
            if !resolves {
                return Err(SchemaError::UnknownTypeName {
                    path: path.to_string(),
                    name: other.to_string(),
                });
            }
        }
    }

    if !allows_attributes && !shape.attributes.is_empty() {
        return Err(SchemaError::UnexpectedProperty {
            path: path.to_string(),
            field: "attributes",
        });
    }
    if !allows_name && shape.name.as_deref().is_some_and(|n| !n.is_empty()) {
        return Err(SchemaError::UnexpectedProperty {
            path: path.to_string(),
            field: "name",
        });
    }
    if !allows_element && shape.element.is_some() {
        return Err(SchemaError::UnexpectedProperty {
            path: path.to_string(),
            field: "element",
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Flattening

fn namespace_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() || name.contains("::") {
        name.to_string()
    } else {
        format!("{namespace}::{name}")
    }
}

fn process(doc: &SchemaJson) -> Result<Schema, SchemaError> {
    let mut entity_types = HashMap::new();
    let mut actions = HashMap::new();

    for (namespace, entry) in &doc.0 {
        let mut commons: HashMap<String, Shape> = HashMap::new();
        for (name, shape) in &entry.common_types {
            let path = format!("{namespace}::commonTypes::{name}");
            let shape = process_shape(&path, namespace, shape, &HashMap::new())?;
            commons.insert(name.clone(), shape);
        }

        for (name, entity) in &entry.entity_types {
            let path = format!("{namespace}::entityTypes::{name}");
            let shape = process_shape(&path, namespace, &entity.shape, &commons)?;
            let member_of_types = entity
                .member_of_types
                .iter()
                .map(|m| namespace_name(namespace, m).into())
                .collect();
            entity_types.insert(
                namespace_name(namespace, name).into(),
                EntityTypeDef {
                    member_of_types,
                    shape,
                },
            );
        }

        let mut namespace_actions = HashMap::new();
        for (name, action) in &entry.actions {
            let path = format!("{namespace}::actions::{name}");
            let mut def = ActionDef::default();
            if let Some(applies_to) = &action.applies_to {
                def.principal_types = applies_to.principal_types.as_ref().map(|types| {
                    types
                        .iter()
                        .map(|t| namespace_name(namespace, t).into())
                        .collect::<HashSet<_>>()
                });
                def.resource_types = applies_to.resource_types.as_ref().map(|types| {
                    types
                        .iter()
                        .map(|t| namespace_name(namespace, t).into())
                        .collect::<HashSet<_>>()
                });
                def.context = applies_to
                    .context
                    .as_ref()
                    .map(|c| process_shape(&path, namespace, c, &commons))
                    .transpose()?;
            }
            namespace_actions.insert(name.as_str().into(), def);
        }
        actions.insert(namespace.as_str().into(), namespace_actions);
    }

    Ok(Schema::from_parts(entity_types, actions))
}

fn process_shape(
    path: &str,
    namespace: &str,
    shape: &ShapeJson,
    commons: &HashMap<String, Shape>,
) -> Result<Shape, SchemaError> {
    let kind = match shape.type_name.as_str() {
        "String" => ShapeKind::String,
        "Long" => ShapeKind::Long,
        "Boolean" => ShapeKind::Bool,
        "Set" => {
            let element = shape.element.as_ref().ok_or(SchemaError::MissingProperty {
                path: path.to_string(),
                field: "element",
            })?;
            ShapeKind::Set(Box::new(process_shape(path, namespace, element, commons)?))
        }
        "Entity" => {
            let name = shape.name.as_deref().ok_or(SchemaError::MissingProperty {
                path: path.to_string(),
                field: "name",
            })?;
            ShapeKind::Entity(namespace_name(namespace, name).into())
        }
        "Extension" => {
            let name = shape.name.as_deref().ok_or(SchemaError::MissingProperty {
                path: path.to_string(),
                field: "name",
            })?;
            // extension names are global, not namespaced
            ShapeKind::Extension(name.into())
        }
        "Record" | "" => {
            let mut attrs = HashMap::new();
            for (attr, sub) in &shape.attributes {
                let sub = process_shape(&format!("{path}::{attr}"), namespace, sub, commons)?;
                attrs.insert(attr.as_str().into(), sub);
            }
            ShapeKind::Record(attrs)
        }
        other => {
            let common = commons.get(other).ok_or_else(|| SchemaError::UnknownTypeName {
                path: path.to_string(),
                name: other.to_string(),
            })?;
            // the referencing attribute's own `required` flag wins
            common.kind.clone()
        }
    };
    Ok(Shape {
        kind,
        required: shape.required,
    })
}
