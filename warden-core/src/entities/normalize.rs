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

//! Normalisation: arbitrary JSON-ish input to typed values.
//!
//! The walk is guided by a schema [`Shape`] when one is available: declared
//! entity references are checked against their declared type, declared
//! extension attributes may be written as bare strings, and `required`
//! record attributes must be present. Without a shape the walk infers
//! structurally: the `__entity` and `__extn` marker keys denote entity
//! references and extension values, everything else maps to the obvious
//! value variant.

use serde_json::Value as Json;

use super::EntityFormatError;
use crate::ast::EntityUid;
use crate::schema::{Shape, ShapeKind};
use crate::value::{Record, Value};

fn json_type_name(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn shape_name(kind: &ShapeKind) -> &'static str {
    match kind {
        ShapeKind::Bool => "bool",
        ShapeKind::Long => "long",
        ShapeKind::String => "string",
        ShapeKind::Set(_) => "set",
        ShapeKind::Entity(_) => "entity",
        ShapeKind::Extension(_) => "extension value",
        ShapeKind::Record(_) => "record",
    }
}

fn unexpected(path: &str, expected: &'static str, v: &Json) -> EntityFormatError {
    EntityFormatError::UnexpectedType {
        path: path.to_string(),
        expected,
        got: json_type_name(v),
    }
}

/// Normalise one JSON value under an optional schema shape.
pub fn value_from_json(
    path: &str,
    v: &Json,
    shape: Option<&Shape>,
) -> Result<Value, EntityFormatError> {
    // a shape can reinterpret scalars and objects; check it first
    match shape.map(|s| &s.kind) {
        Some(ShapeKind::Entity(declared)) => {
            let uid = entity_from_json(path, v, true)?;
            if uid.type_name() != declared.as_str() {
                return Err(EntityFormatError::WrongEntityType {
                    path: path.to_string(),
                    expected: declared.to_string(),
                    got: uid.type_name(),
                });
            }
            return Ok(Value::Entity(uid));
        }
        Some(ShapeKind::Extension(declared)) => {
            return extension_from_json(path, Some(declared), v);
        }
        _ => {}
    }

    match v {
        Json::Bool(b) => {
            if let Some(shape) = shape {
                if !matches!(shape.kind, ShapeKind::Bool) {
                    return Err(unexpected(path, shape_name(&shape.kind), v));
                }
            }
            Ok(Value::Bool(*b))
        }
        Json::Number(n) => {
            if let Some(shape) = shape {
                if !matches!(shape.kind, ShapeKind::Long) {
                    return Err(unexpected(path, shape_name(&shape.kind), v));
                }
            }
            n.as_i64().map(Value::Long).ok_or_else(|| {
                EntityFormatError::UnexpectedType {
                    path: path.to_string(),
                    expected: "64-bit integer",
                    got: "number",
                }
            })
        }
        Json::String(s) => {
            if let Some(shape) = shape {
                if !matches!(shape.kind, ShapeKind::String) {
                    return Err(unexpected(path, shape_name(&shape.kind), v));
                }
            }
            Ok(Value::from(s.as_str()))
        }
        Json::Array(items) => {
            let element = match shape.map(|s| &s.kind) {
                None => None,
                Some(ShapeKind::Set(element)) => Some(element.as_ref()),
                Some(other) => return Err(unexpected(path, shape_name(other), v)),
            };
            let values = items
                .iter()
                .enumerate()
                .map(|(i, item)| value_from_json(&format!("{path}.{i}"), item, element))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::set(values))
        }
        Json::Object(_) => record_from_json(path, v, shape),
        Json::Null => Err(unexpected(path, "value", v)),
    }
}

/// Normalise an object as a record (or as the entity/extension its marker
/// key denotes).
fn record_from_json(
    path: &str,
    v: &Json,
    shape: Option<&Shape>,
) -> Result<Value, EntityFormatError> {
    let map = match v {
        Json::Object(map) => map,
        other => return Err(unexpected(path, "object", other)),
    };

    // marker keys claim the whole object, checked only at this level so
    // `__entity.__entity.id` does not resolve
    if let Some(inner) = map.get("__entity") {
        return Ok(Value::Entity(entity_from_json(path, inner, false)?));
    }
    if let Some(inner) = map.get("__extn") {
        return extension_from_json(path, None, inner);
    }

    let attrs = match shape.map(|s| &s.kind) {
        None => None,
        Some(ShapeKind::Record(attrs)) => Some(attrs),
        Some(other) => return Err(unexpected(path, shape_name(other), v)),
    };

    let mut record = Record::new();
    for (key, value) in map {
        let sub = attrs.and_then(|attrs| attrs.get(key.as_str()));
        let value = value_from_json(&format!("{path}.{key}"), value, sub)?;
        record.insert(key.as_str().into(), value);
    }

    if let Some(attrs) = attrs {
        for (key, attr) in attrs {
            if attr.required && !record.contains_key(key.as_str()) {
                return Err(EntityFormatError::MissingRequiredAttribute {
                    path: path.to_string(),
                    attr: key.to_string(),
                });
            }
        }
    }

    Ok(Value::Record(record))
}

/// Parse an entity reference: `{type, id}`, optionally wrapped in an
/// `__entity` marker when `allow_marker` is set.
pub fn entity_from_json(
    path: &str,
    v: &Json,
    allow_marker: bool,
) -> Result<EntityUid, EntityFormatError> {
    let map = match v {
        Json::Object(map) => map,
        other => return Err(unexpected(path, "object (entity)", other)),
    };
    if allow_marker {
        if let Some(inner) = map.get("__entity") {
            return entity_from_json(path, inner, false);
        }
    }

    let field = |name: &'static str| -> Result<&str, EntityFormatError> {
        let value = map.get(name).ok_or(EntityFormatError::MissingField {
            path: path.to_string(),
            field: name,
        })?;
        value.as_str().ok_or_else(|| unexpected(path, "string", value))
    };
    let type_name = field("type")?;
    let id = field("id")?;
    Ok(EntityUid::new(type_name, id))
}

/// Parse an extension value: `{fn, arg}`, a `{__extn: ...}` wrapper, or —
/// when the schema already declares the function — a bare argument string.
fn extension_from_json(
    path: &str,
    declared: Option<&str>,
    v: &Json,
) -> Result<Value, EntityFormatError> {
    match (v, declared) {
        (Json::String(arg), Some(name)) => extension_value(path, name, arg),
        (Json::Object(map), _) => {
            if declared.is_some() {
                if let Some(inner) = map.get("__extn") {
                    return extension_from_json(path, None, inner);
                }
            }
            let field = |name: &'static str| -> Result<&str, EntityFormatError> {
                let value = map.get(name).ok_or(EntityFormatError::MissingField {
                    path: path.to_string(),
                    field: name,
                })?;
                value.as_str().ok_or_else(|| unexpected(path, "string", value))
            };
            let fn_name = field("fn")?;
            let arg = field("arg")?;
            extension_value(path, fn_name, arg)
        }
        (other, _) => Err(unexpected(path, "object (extension)", other)),
    }
}

fn extension_value(path: &str, fn_name: &str, arg: &str) -> Result<Value, EntityFormatError> {
    let invalid = |msg: String| EntityFormatError::InvalidValue {
        path: path.to_string(),
        msg,
    };
    match fn_name {
        #[cfg(feature = "ipaddr")]
        "ip" | "ipaddr" => arg
            .parse::<crate::extensions::ipaddr::IpValue>()
            .map(Value::from)
            .map_err(invalid),
        #[cfg(feature = "decimal")]
        "decimal" => arg
            .parse::<crate::extensions::decimal::Decimal>()
            .map(Value::from)
            .map_err(invalid),
        other => Err(EntityFormatError::UnknownExtension {
            path: path.to_string(),
            name: other.to_string(),
        }),
    }
}
