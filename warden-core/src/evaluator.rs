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

//! The tree-walking interpreter.
//!
//! An [`Evaluator`] is built per request and walks expression trees against
//! the request's variables, the entity store, and the extension table. `&&`,
//! `||`, and `if` are evaluated here rather than as value operations because
//! the untaken operand's tree must not be walked at all.

mod err;

pub use err::{EvaluationError, EvaluationErrorKind, Result};

use std::collections::HashSet;

use nonempty::nonempty;

use crate::ast::{BinaryOp, EntityUid, Expr, ExprKind, Pattern, Policy, UnaryOp, Var};
use crate::extensions::Extensions;
use crate::request::Request;
use crate::store::Store;
use crate::value::{Type, Value};

/// Evaluator for one request.
///
/// Holds the evaluation environment so it can be invoked repeatedly, once
/// per policy in the set.
pub struct Evaluator<'e> {
    principal: Value,
    action: Value,
    resource: Value,
    context: Value,
    principal_slot: Option<Value>,
    resource_slot: Option<Value>,
    store: &'e dyn Store,
    extensions: &'e Extensions,
}

impl<'e> Evaluator<'e> {
    /// Build an evaluator for `request`, resolving entity data through
    /// `store`. An absent context evaluates as an empty record.
    pub fn new(request: &Request, store: &'e dyn Store, extensions: &'e Extensions) -> Self {
        Evaluator {
            principal: Value::Entity(request.principal().clone()),
            action: Value::Entity(request.action().clone()),
            resource: Value::Entity(request.resource().clone()),
            context: request
                .context()
                .cloned()
                .unwrap_or_else(Value::empty_record),
            principal_slot: request.principal_slot().cloned().map(Value::Entity),
            resource_slot: request.resource_slot().cloned().map(Value::Entity),
            store,
            extensions,
        }
    }

    /// Whether `policy` applies to the request: its head and every condition
    /// evaluate to `true`. A type error or non-bool result is an error, which
    /// the caller scopes to this policy; the error carries the policy's
    /// source text so it can be reported with a labelled span.
    pub fn evaluate(&self, policy: &Policy) -> Result<bool> {
        self.evaluate_policy(policy)
            .map_err(|e| e.with_maybe_source(policy.source_text()))
    }

    fn evaluate_policy(&self, policy: &Policy) -> Result<bool> {
        if !self.interpret(policy.head())?.get_as_bool()? {
            return Ok(false);
        }
        for condition in policy.conditions() {
            if !self.interpret(condition.expr())?.get_as_bool()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Interpret an expression to a value.
    pub fn interpret(&self, expr: &Expr) -> Result<Value> {
        self.interpret_internal(expr)
            .map_err(|e| e.with_maybe_pos(&expr.pos))
    }

    // Split from `interpret` so `?` can be used freely while still stamping
    // the expression's position onto errors in one place.
    fn interpret_internal(&self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Value(v) => Ok(v.clone()),
            ExprKind::Var(v) => self.lookup_var(*v),
            ExprKind::Ident(name) => Ok(Value::Ident(name.clone())),
            ExprKind::Unary { op, expr } => {
                let value = self.interpret(expr)?;
                match op {
                    UnaryOp::Not => Ok((!value.get_as_bool()?).into()),
                    UnaryOp::Neg => value
                        .get_as_long()?
                        .checked_neg()
                        .map(Value::from)
                        .ok_or_else(|| EvaluationError::integer_overflow("-")),
                }
            }
            ExprKind::Binary { op, left, right } => self.interpret_binary(*op, left, right),
            ExprKind::If { cond, then, els } => {
                if self.interpret(cond)?.get_as_bool()? {
                    self.interpret(then)
                } else {
                    self.interpret(els)
                }
            }
            ExprKind::List { elems, .. } => {
                let values = elems
                    .iter()
                    .map(|e| self.interpret(e))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::set(values))
            }
            ExprKind::Record { pairs } => {
                let pairs = pairs
                    .iter()
                    .map(|(k, e)| Ok((k.clone(), self.interpret(e)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::record(pairs))
            }
            ExprKind::Call {
                name,
                receiver,
                args,
            } => {
                let receiver = receiver
                    .as_ref()
                    .map(|e| self.interpret(e))
                    .transpose()?;
                let args = args
                    .iter()
                    .map(|e| self.interpret(e))
                    .collect::<Result<Vec<_>>>()?;
                let func = self.extensions.func(name)?;
                func(receiver.as_ref(), &args)
            }
        }
    }

    fn lookup_var(&self, var: Var) -> Result<Value> {
        match var {
            Var::Principal => Ok(self.principal.clone()),
            Var::Action => Ok(self.action.clone()),
            Var::Resource => Ok(self.resource.clone()),
            Var::Context => Ok(self.context.clone()),
            Var::PrincipalSlot => self
                .principal_slot
                .clone()
                .ok_or_else(|| EvaluationError::unlinked_slot(var)),
            Var::ResourceSlot => self
                .resource_slot
                .clone()
                .ok_or_else(|| EvaluationError::unlinked_slot(var)),
        }
    }

    fn interpret_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value> {
        // the logical operators short-circuit: the right tree is not walked
        // when the left operand decides the result
        match op {
            BinaryOp::And => {
                if !self.interpret(left)?.get_as_bool()? {
                    return Ok(false.into());
                }
                return Ok(self.interpret(right)?.get_as_bool()?.into());
            }
            BinaryOp::Or => {
                if self.interpret(left)?.get_as_bool()? {
                    return Ok(true.into());
                }
                return Ok(self.interpret(right)?.get_as_bool()?.into());
            }
            _ => {}
        }

        let a = self.interpret(left)?;
        let b = self.interpret(right)?;
        match op {
            BinaryOp::Eq => Ok((a == b).into()),
            BinaryOp::NotEq => Ok((a != b).into()),
            BinaryOp::Less => Ok((a.get_as_long()? < b.get_as_long()?).into()),
            BinaryOp::LessEq => Ok((a.get_as_long()? <= b.get_as_long()?).into()),
            // `>` and `>=` swap their operands through `<` and `<=`
            BinaryOp::Greater => Ok((b.get_as_long()? < a.get_as_long()?).into()),
            BinaryOp::GreaterEq => Ok((b.get_as_long()? <= a.get_as_long()?).into()),
            BinaryOp::Add => a
                .get_as_long()?
                .checked_add(b.get_as_long()?)
                .map(Value::from)
                .ok_or_else(|| EvaluationError::integer_overflow("+")),
            BinaryOp::Sub => a
                .get_as_long()?
                .checked_sub(b.get_as_long()?)
                .map(Value::from)
                .ok_or_else(|| EvaluationError::integer_overflow("-")),
            BinaryOp::Mul => a
                .get_as_long()?
                .checked_mul(b.get_as_long()?)
                .map(Value::from)
                .ok_or_else(|| EvaluationError::integer_overflow("*")),
            BinaryOp::Div => {
                let (a, b) = (a.get_as_long()?, b.get_as_long()?);
                if b == 0 {
                    return Err(EvaluationError::divide_by_zero());
                }
                a.checked_div(b)
                    .map(Value::from)
                    .ok_or_else(|| EvaluationError::integer_overflow("/"))
            }
            BinaryOp::Mod => {
                let (a, b) = (a.get_as_long()?, b.get_as_long()?);
                if b == 0 {
                    return Err(EvaluationError::divide_by_zero());
                }
                a.checked_rem(b)
                    .map(Value::from)
                    .ok_or_else(|| EvaluationError::integer_overflow("%"))
            }
            BinaryOp::In => self.eval_in(&a, &b),
            BinaryOp::Is => {
                let entity = a.get_as_entity()?;
                let type_path = b.get_as_entity()?;
                Ok(entity.type_matches(type_path).into())
            }
            BinaryOp::Like => {
                let text = a.get_as_str()?;
                let pattern = b.get_as_str()?;
                Ok(Pattern::parse(pattern).wildcard_match(text).into())
            }
            BinaryOp::Has => self.eval_has(&a, &b),
            BinaryOp::Lookup => self.eval_lookup(&a, &b),
            // handled above
            BinaryOp::And | BinaryOp::Or => {
                Err(EvaluationError::eval("logical operator outside short-circuit path"))
            }
        }
    }

    /// `a in b`: whether `b` (an entity, or a set of entities) contains any
    /// transitive ancestor of `a` (including `a` itself).
    fn eval_in(&self, a: &Value, b: &Value) -> Result<Value> {
        let start = a.get_as_entity()?;
        let ancestors = self.ancestors(start)?;
        match b {
            Value::Entity(target) => Ok(ancestors.contains(target).into()),
            Value::Set(set) => {
                for item in set.iter() {
                    let target = item.get_as_entity()?;
                    if ancestors.contains(target) {
                        return Ok(true.into());
                    }
                }
                Ok(false.into())
            }
            other => Err(EvaluationError::type_error(
                nonempty![Type::Entity, Type::Set],
                other.type_of(),
            )),
        }
    }

    /// All entities reachable from `start` through `parents`, including
    /// `start`. The visited set tolerates cycles in the parent graph.
    fn ancestors(&self, start: &EntityUid) -> Result<HashSet<EntityUid>> {
        let mut seen: HashSet<EntityUid> = HashSet::new();
        let mut todo = vec![start.clone()];
        while let Some(uid) = todo.pop() {
            if !seen.insert(uid.clone()) {
                continue;
            }
            for parent in self.store.parents(&uid)? {
                if !seen.contains(&parent) {
                    todo.push(parent);
                }
            }
        }
        Ok(seen)
    }

    /// `a has key`: attribute presence. Absence is `false`, never an error.
    fn eval_has(&self, a: &Value, key: &Value) -> Result<Value> {
        let key = key.get_as_attr_key()?;
        match a {
            Value::Record(record) => Ok(record.contains_key(key).into()),
            Value::Entity(uid) => Ok(self.store.get_attr(uid, key)?.is_some().into()),
            other => Err(EvaluationError::type_error(
                nonempty![Type::Entity, Type::Record],
                other.type_of(),
            )),
        }
    }

    /// `a.key` / `a["key"]`: attribute access. Absence is a
    /// `value-not-found` error, unlike `has`.
    fn eval_lookup(&self, a: &Value, key: &Value) -> Result<Value> {
        let key = key.get_as_attr_key()?;
        match a {
            Value::Record(record) => record
                .get(key)
                .cloned()
                .ok_or_else(|| EvaluationError::value_not_found(key.clone())),
            Value::Entity(uid) => self
                .store
                .get_attr(uid, key)?
                .ok_or_else(|| EvaluationError::value_not_found(key.clone())),
            other => Err(EvaluationError::type_error(
                nonempty![Type::Entity, Type::Record],
                other.type_of(),
            )),
        }
    }
}

impl std::fmt::Debug for Evaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Evaluator with principal = {}, action = {}, resource = {}>",
            self.principal, self.action, self.resource
        )
    }
}
