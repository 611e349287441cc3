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

//! End-to-end tests over the public surface: policy text, schema JSON, and
//! entity JSON in; decisions, reasons, and errors out.

use warden_core::ast::EntityUid;
use warden_core::entities::{normalize, Entities};
use warden_core::parser::parse_policy_set;
use warden_core::schema::Schema;
use warden_core::{Authorizer, Decision, Request, Value};

const POLICIES: &str = r#"
// photo owners can do anything with their own photos
@id("owner-full-access")
permit (principal, action, resource in PhotoApp::Album::"alice_vacation")
when { resource.owner == principal };

// friends may view
permit (
    principal in PhotoApp::UserGroup::"alice_friends",
    action == PhotoApp::Action::"viewPhoto",
    resource in PhotoApp::Album::"alice_vacation"
);

// nobody outside the VPN may touch anything
forbid (principal, action, resource)
unless { context.source_ip.isInRange(ip("10.20.0.0/16")) };
"#;

fn schema() -> Schema {
    Schema::from_json_str(
        r#"{
        "PhotoApp": {
            "entityTypes": {
                "User": {
                    "memberOfTypes": ["UserGroup"],
                    "shape": {
                        "type": "Record",
                        "attributes": {
                            "department": {"type": "String", "required": false}
                        }
                    }
                },
                "UserGroup": {},
                "Album": {},
                "Photo": {
                    "memberOfTypes": ["Album"],
                    "shape": {
                        "type": "Record",
                        "attributes": {
                            "owner": {"type": "Entity", "name": "User"}
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
                                "source_ip": {"type": "Extension", "name": "ipaddr"}
                            }
                        }
                    }
                },
                "editPhoto": {
                    "appliesTo": {
                        "principalTypes": ["User"],
                        "resourceTypes": ["Photo"]
                    }
                }
            }
        }
    }"#,
    )
    .expect("schema should load")
}

fn entities() -> Entities {
    Entities::from_json_str(
        r#"[
        {
            "uid": {"type": "PhotoApp::User", "id": "alice"},
            "attrs": {"department": "media"},
            "parents": []
        },
        {
            "uid": {"type": "PhotoApp::User", "id": "bob"},
            "attrs": {},
            "parents": [{"type": "PhotoApp::UserGroup", "id": "alice_friends"}]
        },
        {
            "uid": {"type": "PhotoApp::Photo", "id": "sunset.jpg"},
            "attrs": {
                "owner": {"__entity": {"type": "PhotoApp::User", "id": "alice"}}
            },
            "parents": [{"type": "PhotoApp::Album", "id": "alice_vacation"}]
        }
    ]"#,
        Some(&schema()),
    )
    .expect("entities should load")
}

fn uid(type_name: &str, id: &str) -> EntityUid {
    EntityUid::new(type_name, id)
}

/// Build the request context the way the CLI does: JSON through the
/// schema-guided normaliser.
fn context_for(principal: &EntityUid, action: &EntityUid, resource: &EntityUid, ip: &str) -> Value {
    let schema = schema();
    let shape = schema.context_shape(principal, action, resource);
    normalize::value_from_json(
        "context",
        &serde_json::json!({ "source_ip": { "__extn": { "fn": "ip", "arg": ip } } }),
        shape,
    )
    .expect("context should normalise")
}

fn authorize(principal: &str, action: &str, resource: &str, ip: &str) -> warden_core::Response {
    let pset = parse_policy_set("photoapp.cedar", POLICIES).expect("policies should parse");
    let principal = uid("PhotoApp::User", principal);
    let action = uid("PhotoApp::Action", action);
    let resource = uid("PhotoApp::Photo", resource);
    let context = context_for(&principal, &action, &resource, ip);
    let request = Request::new(principal, action, resource).with_context(context);
    Authorizer::new().is_authorized(&request, &pset, &entities())
}

#[test]
fn owner_can_edit_from_inside_the_vpn() {
    let response = authorize("alice", "editPhoto", "sunset.jpg", "10.20.30.40");
    assert_eq!(response.decision, Decision::Allow);
    assert_eq!(response.reasons.len(), 1);
    assert_eq!(response.reasons[0].as_str(), "owner-full-access");
    assert!(response.errors.is_empty());
}

#[test]
fn friend_can_view_but_not_edit() {
    let view = authorize("bob", "viewPhoto", "sunset.jpg", "10.20.30.40");
    assert_eq!(view.decision, Decision::Allow);
    assert_eq!(view.reasons[0].as_str(), "policy1");

    let edit = authorize("bob", "editPhoto", "sunset.jpg", "10.20.30.40");
    assert_eq!(edit.decision, Decision::Deny);
}

#[test]
fn vpn_forbid_overrides_the_owner_permit() {
    let response = authorize("alice", "editPhoto", "sunset.jpg", "8.8.8.8");
    assert_eq!(response.decision, Decision::Deny);
    // both the permit and the forbid applied, in source order
    let reasons: Vec<_> = response.reasons.iter().map(|r| r.as_str()).collect();
    assert_eq!(reasons, vec!["owner-full-access", "policy2"]);
}

#[test]
fn stranger_is_denied_by_default() {
    let response = authorize("mallory", "viewPhoto", "sunset.jpg", "10.20.30.40");
    assert_eq!(response.decision, Decision::Deny);
    assert!(response.reasons.is_empty());
}

#[test]
fn empty_policy_set_is_default_deny() {
    let pset = parse_policy_set("empty.cedar", "").unwrap();
    let request = Request::new(
        uid("PhotoApp::User", "alice"),
        uid("PhotoApp::Action", "viewPhoto"),
        uid("PhotoApp::Photo", "sunset.jpg"),
    );
    let response = Authorizer::new().is_authorized(&request, &pset, &entities());
    assert_eq!(response.decision, Decision::Deny);
}

#[test]
fn schema_rejects_wrongly_shaped_context() {
    let schema = schema();
    let principal = uid("PhotoApp::User", "alice");
    let action = uid("PhotoApp::Action", "viewPhoto");
    let resource = uid("PhotoApp::Photo", "sunset.jpg");
    let shape = schema.context_shape(&principal, &action, &resource);
    assert!(shape.is_some());
    // required source_ip is missing
    let result = normalize::value_from_json("context", &serde_json::json!({}), shape);
    assert!(result.is_err());
}

#[test]
fn decision_errors_are_reported_without_flipping_the_decision() {
    let pset = parse_policy_set(
        "broken.cedar",
        r#"
        permit (principal, action, resource) when { resource.sizes > 10 };
        permit (principal, action, resource);
        "#,
    )
    .unwrap();
    let request = Request::new(
        uid("PhotoApp::User", "alice"),
        uid("PhotoApp::Action", "viewPhoto"),
        uid("PhotoApp::Photo", "sunset.jpg"),
    );
    let response = Authorizer::new().is_authorized(&request, &pset, &entities());
    // policy0 errors (no `sizes` attribute); policy1 still allows
    assert_eq!(response.decision, Decision::Allow);
    assert_eq!(response.reasons.len(), 1);
    assert_eq!(response.reasons[0].as_str(), "policy1");
    assert_eq!(response.errors.len(), 1);
}
