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

//! CST → AST lowering.
//!
//! Lowering canonicalises the syntactic sugar:
//!
//! - the three scope clauses fold into the policy head, combined with `&&`
//!   in `principal ∧ resource ∧ action` order; an `is` check becomes a
//!   guarding `if`;
//! - `e.x` and `e["x"]` become `Lookup` applications, `e.x(args)` a method
//!   call;
//! - `unless { e }` becomes `!e`, so every condition has the same semantics;
//! - string literals are unquoted and unescaped, `like` patterns are
//!   normalised to the three-escape pattern form;
//! - an `id` annotation overrides the synthesized `policy{index}` id.
//!
//! Lowering is best-effort: problems are recorded and a placeholder `false`
//! expression takes the node's place, so one bad literal does not abort the
//! rest of the file.

use std::collections::BTreeMap;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::ast::{
    BinaryOp, Condition, ConditionKind, Effect, EntityUid, Expr, ExprKind, Pattern, Policy,
    PolicyId, PolicySet, UnaryOp, Var,
};
use crate::cst;
use crate::err::{ParseError, ParseErrors};
use crate::token::{Position, TokenKind};
use crate::unescape;
use crate::value::Value;

/// Lower a parsed file into a policy set, recording problems in `errors`.
pub fn lower_policy_file(
    file: &cst::PolicyFile,
    src: &Arc<str>,
    errors: &mut ParseErrors,
) -> PolicySet {
    let mut lowerer = Lowerer { src, errors };
    let mut policies = Vec::new();
    for stmt in &file.statements {
        if let cst::Stmt::Policy(stmt) = stmt {
            let index = policies.len();
            policies.push(lowerer.lower_policy(stmt, index));
        }
    }
    PolicySet::new(policies)
}

/// Lower a single parsed expression (tests and tools).
pub fn lower_expr(expr: &cst::Expr, src: &Arc<str>, errors: &mut ParseErrors) -> Expr {
    Lowerer { src, errors }.lower_expr(expr)
}

struct Lowerer<'a> {
    src: &'a Arc<str>,
    errors: &'a mut ParseErrors,
}

impl Lowerer<'_> {
    fn error(&mut self, pos: &Position, msg: impl Into<String>) {
        self.errors
            .push(ParseError::new(msg, pos.clone(), Arc::clone(self.src)));
    }

    /// Placeholder for a node that could not be lowered.
    fn bad(&self, pos: &Position) -> Expr {
        Expr::val(pos.clone(), false)
    }

    fn lower_policy(&mut self, stmt: &cst::PolicyStmt, index: usize) -> Policy {
        let mut annotations = BTreeMap::new();
        for ann in &stmt.annotations {
            let value = self.unescape_string(&ann.value);
            annotations.insert(ann.key.value.clone(), value);
        }
        let id = annotations
            .get("id")
            .map(|v: &SmolStr| PolicyId::from(v.clone()))
            .unwrap_or_else(|| PolicyId::from_index(index));

        let effect = match stmt.effect {
            TokenKind::Forbid => Effect::Forbid,
            _ => Effect::Permit,
        };

        let principal =
            self.lower_scope_clause(&stmt.scope.principal, Var::Principal, Var::PrincipalSlot);
        let action = self.lower_scope_clause(&stmt.scope.action, Var::Action, Var::Action);
        let resource =
            self.lower_scope_clause(&stmt.scope.resource, Var::Resource, Var::ResourceSlot);

        // principal ∧ resource ∧ action, eliding clauses that impose nothing
        let mut head = None;
        for clause in [principal, resource, action] {
            if clause.is_literal_true() {
                continue;
            }
            head = Some(match head {
                None => clause,
                Some(acc) => Expr::and(acc, clause),
            });
        }
        let head = head.unwrap_or_else(|| Expr::val(stmt.pos.clone(), true));

        let conditions = stmt
            .conditions
            .iter()
            .map(|cond| self.lower_condition(cond))
            .collect();

        Policy::new(
            id,
            effect,
            annotations,
            head,
            conditions,
            stmt.pos.clone(),
            Arc::clone(self.src),
        )
    }

    fn lower_condition(&mut self, cond: &cst::Condition) -> Condition {
        let expr = self.lower_expr(&cond.expr);
        match cond.kind {
            TokenKind::Unless => Condition::new(ConditionKind::Unless, Expr::not(expr)),
            _ => Condition::new(ConditionKind::When, expr),
        }
    }

    /// Lower one scope clause to its head fragment. An empty clause imposes
    /// nothing and lowers to literal `true`; an `is` check guards the rest of
    /// the clause with an `if`.
    fn lower_scope_clause(&mut self, clause: &cst::ScopeClause, var: Var, slot: Var) -> Expr {
        let var_expr = Expr::var(clause.name.pos.clone(), var);

        let base = match &clause.rel {
            None => Expr::val(clause.name.pos.clone(), true),
            Some((rel, target)) => {
                let op = if *rel == TokenKind::In {
                    BinaryOp::In
                } else {
                    BinaryOp::Eq
                };
                let right = match target {
                    cst::ScopeTarget::Entity(name) => {
                        let pos = name.pos().clone();
                        let uid = self.lower_entity_name(name);
                        Expr::val(pos, Value::Entity(uid))
                    }
                    cst::ScopeTarget::Slot { pos, .. } => Expr::var(pos.clone(), slot),
                    cst::ScopeTarget::Set { pos, entities } => {
                        let elems = entities
                            .iter()
                            .map(|name| {
                                let pos = name.pos().clone();
                                let uid = self.lower_entity_name(name);
                                Expr::val(pos, Value::Entity(uid))
                            })
                            .collect();
                        Expr::new(pos.clone(), ExprKind::List { is_set: true, elems })
                    }
                };
                Expr::binary(op, var_expr.clone(), right)
            }
        };

        match &clause.is_check {
            None => base,
            Some(path) => {
                let type_uid = EntityUid::from_components(
                    path.iter().map(|lit| lit.value.clone()).collect(),
                    "",
                );
                let check_pos = path[0].pos.clone();
                let is_expr = Expr::binary(
                    BinaryOp::Is,
                    var_expr,
                    Expr::val(check_pos.clone(), Value::Entity(type_uid)),
                );
                let else_expr = self.bad(&check_pos); // literal false
                Expr::ite(clause.name.pos.clone(), is_expr, base, else_expr)
            }
        }
    }

    fn lower_entity_name(&mut self, name: &cst::EntityName) -> EntityUid {
        let (id_lit, path) = name.parts.split_last().expect("entity name has parts");
        let id = self.unescape_string(id_lit);
        EntityUid::from_components(path.iter().map(|lit| lit.value.clone()).collect(), id)
    }

    fn unescape_string(&mut self, lit: &cst::Lit) -> SmolStr {
        match unescape::to_unescaped_string(&lit.value) {
            Ok(s) => s,
            Err(errs) => {
                for err in errs {
                    self.error(&lit.pos, format!("{err} in string literal"));
                }
                SmolStr::default()
            }
        }
    }

    fn lower_expr(&mut self, expr: &cst::Expr) -> Expr {
        match expr {
            cst::Expr::Bad { pos } => self.bad(pos),
            cst::Expr::Lit(lit) => self.lower_lit(lit),
            cst::Expr::Entity(name) => {
                let pos = name.pos().clone();
                let uid = self.lower_entity_name(name);
                Expr::val(pos, Value::Entity(uid))
            }
            cst::Expr::Paren { expr, .. } => self.lower_expr(expr),
            cst::Expr::Unary { pos, op, expr } => {
                let op = match op {
                    TokenKind::Sub => UnaryOp::Neg,
                    _ => UnaryOp::Not,
                };
                let expr = self.lower_expr(expr);
                Expr::new(
                    pos.clone(),
                    ExprKind::Unary {
                        op,
                        expr: Box::new(expr),
                    },
                )
            }
            cst::Expr::Binary {
                pos,
                op,
                left,
                right,
            } => self.lower_binary(pos, *op, left, right),
            cst::Expr::If {
                pos,
                cond,
                then,
                els,
            } => {
                let cond = self.lower_expr(cond);
                let then = self.lower_expr(then);
                let els = self.lower_expr(els);
                Expr::ite(pos.clone(), cond, then, els)
            }
            cst::Expr::Set { pos, elems } => {
                let elems = elems.iter().map(|e| self.lower_expr(e)).collect();
                Expr::new(pos.clone(), ExprKind::List { is_set: true, elems })
            }
            cst::Expr::Record { pos, inits } => {
                let pairs = inits
                    .iter()
                    .map(|init| {
                        let key = if init.key.kind == TokenKind::Str {
                            self.unescape_string(&init.key)
                        } else {
                            init.key.value.clone()
                        };
                        (key, self.lower_expr(&init.value))
                    })
                    .collect();
                Expr::new(pos.clone(), ExprKind::Record { pairs })
            }
            cst::Expr::Member { primary, access } => {
                let mut lowered = self.lower_expr(primary);
                for item in access {
                    lowered = match item {
                        cst::MemberAccess::Attr { ident } => Expr::binary(
                            BinaryOp::Lookup,
                            lowered,
                            Expr::new(ident.pos.clone(), ExprKind::Ident(ident.value.clone())),
                        ),
                        cst::MemberAccess::Index { key } => {
                            let value = self.unescape_string(key);
                            Expr::binary(
                                BinaryOp::Lookup,
                                lowered,
                                Expr::val(key.pos.clone(), Value::Str(value)),
                            )
                        }
                        cst::MemberAccess::Call { ident, args } => {
                            let args = args.iter().map(|a| self.lower_expr(a)).collect();
                            Expr::new(
                                lowered.pos.clone(),
                                ExprKind::Call {
                                    name: ident.value.clone(),
                                    receiver: Some(Box::new(lowered)),
                                    args,
                                },
                            )
                        }
                    };
                }
                lowered
            }
            cst::Expr::Call { pos, name, args } => {
                let args = args.iter().map(|a| self.lower_expr(a)).collect();
                Expr::new(
                    pos.clone(),
                    ExprKind::Call {
                        name: name.clone(),
                        receiver: None,
                        args,
                    },
                )
            }
        }
    }

    fn lower_lit(&mut self, lit: &cst::Lit) -> Expr {
        match lit.kind {
            TokenKind::True => Expr::val(lit.pos.clone(), true),
            TokenKind::False => Expr::val(lit.pos.clone(), false),
            TokenKind::Str => {
                let value = self.unescape_string(lit);
                Expr::val(lit.pos.clone(), Value::Str(value))
            }
            TokenKind::Int => {
                let digits: String = lit.value.chars().filter(|c| *c != '_').collect();
                match digits.parse::<i64>() {
                    Ok(value) => Expr::val(lit.pos.clone(), value),
                    Err(_) => {
                        self.error(
                            &lit.pos,
                            format!("integer literal `{}` out of range", lit.value),
                        );
                        self.bad(&lit.pos)
                    }
                }
            }
            TokenKind::Principal => Expr::var(lit.pos.clone(), Var::Principal),
            TokenKind::Action => Expr::var(lit.pos.clone(), Var::Action),
            TokenKind::Resource => Expr::var(lit.pos.clone(), Var::Resource),
            TokenKind::Context => Expr::var(lit.pos.clone(), Var::Context),
            TokenKind::PrincipalSlot => Expr::var(lit.pos.clone(), Var::PrincipalSlot),
            TokenKind::ResourceSlot => Expr::var(lit.pos.clone(), Var::ResourceSlot),
            TokenKind::Ident => Expr::new(lit.pos.clone(), ExprKind::Ident(lit.value.clone())),
            other => {
                self.error(&lit.pos, format!("invalid literal token '{other}'"));
                self.bad(&lit.pos)
            }
        }
    }

    fn lower_binary(
        &mut self,
        pos: &Position,
        op: TokenKind,
        left: &cst::Expr,
        right: &cst::Expr,
    ) -> Expr {
        let lowered_left = self.lower_expr(left);

        // `like` keeps its right-hand side in the normalised pattern form
        // rather than as an unescaped string
        if op == TokenKind::Like {
            let right = match right {
                cst::Expr::Lit(lit) if lit.kind == TokenKind::Str => {
                    match unescape::to_pattern(&lit.value) {
                        Ok(elems) => {
                            let normalised = Pattern::from(elems).to_string();
                            Expr::val(lit.pos.clone(), Value::Str(normalised.into()))
                        }
                        Err(errs) => {
                            for err in errs {
                                self.error(&lit.pos, format!("{err} in pattern"));
                            }
                            self.bad(&lit.pos)
                        }
                    }
                }
                other => self.lower_expr(other),
            };
            return Expr::binary(BinaryOp::Like, lowered_left, right);
        }

        let op = match op {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Less,
            TokenKind::LtEq => BinaryOp::LessEq,
            TokenKind::Gt => BinaryOp::Greater,
            TokenKind::GtEq => BinaryOp::GreaterEq,
            TokenKind::And => BinaryOp::And,
            TokenKind::Or => BinaryOp::Or,
            TokenKind::Add => BinaryOp::Add,
            TokenKind::Sub => BinaryOp::Sub,
            TokenKind::Mul => BinaryOp::Mul,
            TokenKind::Div => BinaryOp::Div,
            TokenKind::Mod => BinaryOp::Mod,
            TokenKind::In => BinaryOp::In,
            TokenKind::Is => BinaryOp::Is,
            TokenKind::Has => BinaryOp::Has,
            other => {
                self.error(pos, format!("invalid binary operator '{other}'"));
                return self.bad(pos);
            }
        };
        let right = self.lower_expr(right);
        Expr::binary(op, lowered_left, right)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser;
    use cool_asserts::assert_matches;

    fn lower_src(src: &str) -> PolicySet {
        parser::parse_policy_set("test.cedar", src).expect("should parse")
    }

    fn lower_one(src: &str) -> Policy {
        let pset = lower_src(src);
        assert_eq!(pset.len(), 1);
        let policy = pset.iter().next().unwrap().clone();
        policy
    }

    #[test]
    fn empty_scope_head_is_true() {
        let policy = lower_one("permit (principal, action, resource);");
        assert!(policy.head().is_literal_true());
        assert_eq!(policy.effect(), Effect::Permit);
        assert_eq!(policy.id().as_str(), "policy0");
    }

    #[test]
    fn scope_folds_in_principal_resource_action_order() {
        let policy = lower_one(
            r#"permit (
                principal == User::"alice",
                action == Action::"view",
                resource in Album::"vacation"
            );"#,
        );
        // ((principal-clause && resource-clause) && action-clause)
        assert_matches!(&policy.head().kind, ExprKind::Binary { op: BinaryOp::And, left, right } => {
            assert_matches!(&right.kind, ExprKind::Binary { op: BinaryOp::Eq, left, .. } => {
                assert_matches!(&left.kind, ExprKind::Var(Var::Action));
            });
            assert_matches!(&left.kind, ExprKind::Binary { op: BinaryOp::And, left, right } => {
                assert_matches!(&left.kind, ExprKind::Binary { op: BinaryOp::Eq, left, .. } => {
                    assert_matches!(&left.kind, ExprKind::Var(Var::Principal));
                });
                assert_matches!(&right.kind, ExprKind::Binary { op: BinaryOp::In, left, .. } => {
                    assert_matches!(&left.kind, ExprKind::Var(Var::Resource));
                });
            });
        });
    }

    #[test]
    fn single_clause_head_has_no_and() {
        let policy = lower_one(r#"permit (principal == User::"alice", action, resource);"#);
        assert_matches!(&policy.head().kind, ExprKind::Binary { op: BinaryOp::Eq, left, right } => {
            assert_matches!(&left.kind, ExprKind::Var(Var::Principal));
            assert_matches!(&right.kind, ExprKind::Value(Value::Entity(uid)) => {
                assert_eq!(uid, &EntityUid::new("User", "alice"));
            });
        });
    }

    #[test]
    fn is_check_becomes_a_guard() {
        let policy = lower_one(r#"permit (principal is PhotoApp::User in Group::"all", action, resource);"#);
        assert_matches!(&policy.head().kind, ExprKind::If { cond, then, els } => {
            assert_matches!(&cond.kind, ExprKind::Binary { op: BinaryOp::Is, right, .. } => {
                assert_matches!(&right.kind, ExprKind::Value(Value::Entity(uid)) => {
                    assert_eq!(uid.type_name(), "PhotoApp::User");
                    assert_eq!(uid.id(), "");
                });
            });
            assert_matches!(&then.kind, ExprKind::Binary { op: BinaryOp::In, .. });
            assert_matches!(&els.kind, ExprKind::Value(Value::Bool(false)));
        });
    }

    #[test]
    fn action_in_list_lowers_to_set_literal() {
        let policy = lower_one(
            r#"permit (principal, action in [Action::"view", Action::"edit"], resource);"#,
        );
        assert_matches!(&policy.head().kind, ExprKind::Binary { op: BinaryOp::In, left, right } => {
            assert_matches!(&left.kind, ExprKind::Var(Var::Action));
            assert_matches!(&right.kind, ExprKind::List { is_set: true, elems } => {
                assert_eq!(elems.len(), 2);
            });
        });
    }

    #[test]
    fn slots_lower_to_slot_vars() {
        let policy = lower_one("permit (principal == ?principal, action, resource in ?resource);");
        assert_matches!(&policy.head().kind, ExprKind::Binary { op: BinaryOp::And, left, right } => {
            assert_matches!(&left.kind, ExprKind::Binary { op: BinaryOp::Eq, right, .. } => {
                assert_matches!(&right.kind, ExprKind::Var(Var::PrincipalSlot));
            });
            assert_matches!(&right.kind, ExprKind::Binary { op: BinaryOp::In, right, .. } => {
                assert_matches!(&right.kind, ExprKind::Var(Var::ResourceSlot));
            });
        });
    }

    #[test]
    fn unless_is_negated() {
        let policy = lower_one(
            "permit (principal, action, resource) when { true } unless { false };",
        );
        assert_eq!(policy.conditions().len(), 2);
        assert_eq!(policy.conditions()[0].kind(), ConditionKind::When);
        assert_matches!(
            &policy.conditions()[0].expr().kind,
            ExprKind::Value(Value::Bool(true))
        );
        assert_eq!(policy.conditions()[1].kind(), ConditionKind::Unless);
        assert_matches!(&policy.conditions()[1].expr().kind, ExprKind::Unary { op: UnaryOp::Not, expr } => {
            assert_matches!(&expr.kind, ExprKind::Value(Value::Bool(false)));
        });
    }

    #[test]
    fn id_annotation_overrides_synthesized_id() {
        let pset = lower_src(
            "@id(\"first\") permit (principal, action, resource);\n\
             permit (principal, action, resource);",
        );
        let ids: Vec<_> = pset.iter().map(|p| p.id().as_str().to_string()).collect();
        assert_eq!(ids, vec!["first", "policy1"]);
        assert_eq!(
            pset.iter().next().unwrap().annotation("id"),
            Some("first")
        );
    }

    #[test]
    fn member_access_lowers_to_lookup_chain() {
        let expr = parser::parse_expr("principal.department.name").unwrap();
        assert_matches!(&expr.kind, ExprKind::Binary { op: BinaryOp::Lookup, left, right } => {
            assert_matches!(&right.kind, ExprKind::Ident(name) => assert_eq!(name, "name"));
            assert_matches!(&left.kind, ExprKind::Binary { op: BinaryOp::Lookup, left, right } => {
                assert_matches!(&left.kind, ExprKind::Var(Var::Principal));
                assert_matches!(&right.kind, ExprKind::Ident(name) => assert_eq!(name, "department"));
            });
        });
    }

    #[test]
    fn bracket_index_lowers_to_string_lookup() {
        let expr = parser::parse_expr(r#"context["ip address"]"#).unwrap();
        assert_matches!(&expr.kind, ExprKind::Binary { op: BinaryOp::Lookup, right, .. } => {
            assert_matches!(&right.kind, ExprKind::Value(Value::Str(s)) => {
                assert_eq!(s, "ip address");
            });
        });
    }

    #[test]
    fn method_call_lowers_to_receiver_call() {
        let expr = parser::parse_expr(r#"context.source_ip.isInRange(ip("10.0.0.0/8"))"#).unwrap();
        assert_matches!(&expr.kind, ExprKind::Call { name, receiver, args } => {
            assert_eq!(name, "isInRange");
            assert!(receiver.is_some());
            assert_eq!(args.len(), 1);
            assert_matches!(&args[0].kind, ExprKind::Call { name, receiver: None, args } => {
                assert_eq!(name, "ip");
                assert_eq!(args.len(), 1);
            });
        });
    }

    #[test]
    fn like_pattern_is_normalised() {
        let expr = parser::parse_expr(r#"resource.name like "a\*b*c""#).unwrap();
        assert_matches!(&expr.kind, ExprKind::Binary { op: BinaryOp::Like, right, .. } => {
            assert_matches!(&right.kind, ExprKind::Value(Value::Str(s)) => {
                assert_eq!(s, r"a\*b*c");
            });
        });
    }

    #[test]
    fn has_accepts_ident_and_string_keys() {
        let expr = parser::parse_expr("resource has owner").unwrap();
        assert_matches!(&expr.kind, ExprKind::Binary { op: BinaryOp::Has, right, .. } => {
            assert_matches!(&right.kind, ExprKind::Ident(name) => assert_eq!(name, "owner"));
        });
        let expr = parser::parse_expr(r#"resource has "spaced key""#).unwrap();
        assert_matches!(&expr.kind, ExprKind::Binary { op: BinaryOp::Has, right, .. } => {
            assert_matches!(&right.kind, ExprKind::Value(Value::Str(s)) => {
                assert_eq!(s, "spaced key");
            });
        });
    }

    #[test]
    fn is_expression_has_empty_id_entity() {
        let expr = parser::parse_expr(r#"principal is PhotoApp::User"#).unwrap();
        assert_matches!(&expr.kind, ExprKind::Binary { op: BinaryOp::Is, right, .. } => {
            assert_matches!(&right.kind, ExprKind::Value(Value::Entity(uid)) => {
                assert_eq!(uid.type_name(), "PhotoApp::User");
                assert_eq!(uid.id(), "");
            });
        });
    }

    #[test]
    fn integer_literals_with_separators() {
        let expr = parser::parse_expr("1_000_000").unwrap();
        assert_matches!(&expr.kind, ExprKind::Value(Value::Long(1_000_000)));
    }

    #[test]
    fn string_escapes_are_resolved() {
        let expr = parser::parse_expr(r#""tab\there \u{48}i""#).unwrap();
        assert_matches!(&expr.kind, ExprKind::Value(Value::Str(s)) => {
            assert_eq!(s, "tab\there Hi");
        });
    }

    #[test]
    fn bad_escape_is_an_error() {
        // reported by the scanner, and again by unescaping during lowering
        let errs = parser::parse_expr(r#""bad \q escape""#).unwrap_err();
        assert!(!errs.is_empty());
        assert!(errs.iter().any(|e| e.message().contains("escape")));
    }

    #[test]
    fn star_escape_in_a_plain_string_is_an_error() {
        // `\*` is only valid in `like` patterns; the scanner accepts it, the
        // lowering rejects it
        let errs = parser::parse_expr(r#""a\*b""#).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs.last().unwrap().message().contains("invalid escape"));
    }

    #[test]
    fn out_of_range_integer_is_an_error() {
        let errs = parser::parse_expr("99999999999999999999").unwrap_err();
        assert!(errs
            .last()
            .unwrap()
            .message()
            .contains("out of range"));
    }
}
