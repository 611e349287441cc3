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

//! The entity fixture document: an array of `{uid, attrs, parents}` objects.

use serde::Deserialize;
use serde_json::Value as Json;

use super::normalize::{entity_from_json, value_from_json};
use super::{Entities, Entity, EntityFormatError};
use crate::schema::Schema;
use crate::value::Value;

#[derive(Debug, Deserialize)]
struct EntityDoc {
    uid: Json,
    #[serde(default)]
    attrs: serde_json::Map<String, Json>,
    #[serde(default)]
    parents: Vec<Json>,
}

pub(super) fn entities_from_json_value(
    value: Json,
    schema: Option<&Schema>,
) -> Result<Entities, EntityFormatError> {
    let docs: Vec<EntityDoc> = serde_json::from_value(value)
        .map_err(|e| EntityFormatError::Json { msg: e.to_string() })?;

    let mut entities = Vec::with_capacity(docs.len());
    for doc in docs {
        let uid = entity_from_json("uid", &doc.uid, true)?;
        let path = uid.to_string();

        let parents = doc
            .parents
            .iter()
            .map(|p| entity_from_json(&format!("{path}.parents"), p, true))
            .collect::<Result<Vec<_>, _>>()?;

        let shape = schema.and_then(|s| s.entity_shape(&uid));
        let attrs = match value_from_json(&path, &Json::Object(doc.attrs), shape)? {
            Value::Record(record) => record,
            // a shape of a non-record kind cannot describe an attrs object;
            // normalisation has already rejected it
            other => {
                return Err(EntityFormatError::Json {
                    msg: format!("attrs of `{path}` normalised to {}", other.type_of()),
                })
            }
        };

        entities.push(Entity::from_record(uid, attrs, parents));
    }
    Ok(Entities::from_entities(entities))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::EntityUid;
    use crate::store::Store;
    use crate::value::ExtValue;
    use cool_asserts::assert_matches;
    use serde_json::json;

    fn uid(type_name: &str, id: &str) -> EntityUid {
        EntityUid::new(type_name, id)
    }

    #[test]
    fn ingests_the_reference_fixture_format() {
        let doc = json!([
            {
                "uid": {"type": "User", "id": "alice"},
                "attrs": {
                    "age": 31,
                    "manager": {"__entity": {"type": "User", "id": "bob"}},
                    "home_ip": {"__extn": {"fn": "ip", "arg": "10.1.1.1"}},
                    "tags": ["staff", "photographer"]
                },
                "parents": [{"type": "UserGroup", "id": "everyone"}]
            },
            {
                "uid": {"__entity": {"type": "UserGroup", "id": "everyone"}}
            }
        ]);
        let entities = Entities::from_json_value(doc, None).unwrap();
        assert_eq!(entities.len(), 2);

        let alice = entities.get(&uid("User", "alice")).unwrap();
        assert_eq!(alice.attr("age"), Some(&Value::Long(31)));
        assert_eq!(
            alice.attr("manager"),
            Some(&Value::Entity(uid("User", "bob")))
        );
        assert_matches!(alice.attr("home_ip"), Some(Value::Ext(ExtValue::Ip(_))));
        assert_eq!(alice.parents(), &[uid("UserGroup", "everyone")]);

        let group = entities.get(&uid("UserGroup", "everyone")).unwrap();
        assert!(group.parents().is_empty());
        assert_eq!(
            entities.parents(&uid("User", "alice")).unwrap(),
            vec![uid("UserGroup", "everyone")]
        );
    }

    #[test]
    fn bad_uid_is_an_error() {
        let doc = json!([{"uid": {"id": "alice"}}]);
        assert_matches!(
            Entities::from_json_value(doc, None),
            Err(EntityFormatError::MissingField { field: "type", .. })
        );
    }

    #[test]
    fn non_array_document_is_an_error() {
        assert_matches!(
            Entities::from_json_value(json!({"uid": 1}), None),
            Err(EntityFormatError::Json { .. })
        );
    }

    #[test]
    fn schema_guides_attribute_normalisation() {
        use crate::schema::Schema;
        let schema = Schema::from_json_value(json!({
            "": {
                "entityTypes": {
                    "User": {
                        "shape": {
                            "type": "Record",
                            "attributes": {
                                "age": {"type": "Long"},
                                "home_ip": {"type": "Extension", "name": "ipaddr", "required": false}
                            }
                        }
                    }
                },
                "actions": {}
            }
        }))
        .unwrap();

        // declared extension attribute written as a bare string
        let doc = json!([
            {"uid": {"type": "User", "id": "alice"},
             "attrs": {"age": 31, "home_ip": "10.1.1.1"}}
        ]);
        let entities = Entities::from_json_value(doc, Some(&schema)).unwrap();
        let alice = entities.get(&uid("User", "alice")).unwrap();
        assert_matches!(alice.attr("home_ip"), Some(Value::Ext(ExtValue::Ip(_))));

        // missing required attribute
        let doc = json!([
            {"uid": {"type": "User", "id": "bob"}, "attrs": {}}
        ]);
        assert_matches!(
            Entities::from_json_value(doc, Some(&schema)),
            Err(EntityFormatError::MissingRequiredAttribute { attr, .. }) => {
                assert_eq!(attr, "age");
            }
        );

        // wrongly-typed attribute
        let doc = json!([
            {"uid": {"type": "User", "id": "carol"}, "attrs": {"age": "old"}}
        ]);
        assert_matches!(
            Entities::from_json_value(doc, Some(&schema)),
            Err(EntityFormatError::UnexpectedType { expected: "long", .. })
        );
    }
}
