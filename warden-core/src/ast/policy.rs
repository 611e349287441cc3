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

//! Lowered policies and policy sets.

use std::collections::BTreeMap;
use std::sync::Arc;

use smol_str::SmolStr;

use super::Expr;
use crate::token::Position;

/// What a policy contributes when it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// The policy permits matching requests
    Permit,
    /// The policy forbids matching requests, overriding any permit
    Forbid,
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Effect::Permit => "permit",
            Effect::Forbid => "forbid",
        })
    }
}

/// Which keyword introduced a condition. After lowering both kinds share the
/// same semantics (the expression must be `true` for the policy to apply);
/// the kind is retained for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    /// `when { ... }`
    When,
    /// `unless { ... }` (the stored expression is the negated body)
    Unless,
}

impl std::fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConditionKind::When => "when",
            ConditionKind::Unless => "unless",
        })
    }
}

/// A policy identifier: `policy{index}` by default, overridden by an `id`
/// annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyId(SmolStr);

impl PolicyId {
    /// The id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The default id for the policy at `index` in its source file.
    pub fn from_index(index: usize) -> Self {
        PolicyId(SmolStr::from(format!("policy{index}")))
    }
}

impl From<&str> for PolicyId {
    fn from(s: &str) -> Self {
        PolicyId(s.into())
    }
}

impl From<String> for PolicyId {
    fn from(s: String) -> Self {
        PolicyId(s.into())
    }
}

impl From<SmolStr> for PolicyId {
    fn from(s: SmolStr) -> Self {
        PolicyId(s)
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One lowered condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    kind: ConditionKind,
    expr: Expr,
}

impl Condition {
    /// Wrap an already-lowered condition expression.
    pub fn new(kind: ConditionKind, expr: Expr) -> Self {
        Condition { kind, expr }
    }

    /// Which keyword introduced the condition.
    pub fn kind(&self) -> ConditionKind {
        self.kind
    }

    /// The expression that must evaluate to `true` for the policy to apply.
    /// For `unless` conditions this is the negation of the written body.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

/// A lowered policy: effect, head (the folded scope), and conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    id: PolicyId,
    effect: Effect,
    annotations: BTreeMap<SmolStr, SmolStr>,
    head: Expr,
    conditions: Vec<Condition>,
    pos: Position,
    src: Arc<str>,
}

impl Policy {
    /// Assemble a policy. `src` is the source text the policy was lowered
    /// from; expression positions index into it, and evaluation errors use
    /// it for labelled diagnostics.
    pub fn new(
        id: PolicyId,
        effect: Effect,
        annotations: BTreeMap<SmolStr, SmolStr>,
        head: Expr,
        conditions: Vec<Condition>,
        pos: Position,
        src: Arc<str>,
    ) -> Self {
        Policy {
            id,
            effect,
            annotations,
            head,
            conditions,
            pos,
            src,
        }
    }

    /// The policy's id.
    pub fn id(&self) -> &PolicyId {
        &self.id
    }

    /// Permit or forbid.
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// The folded scope expression; literal `true` for an unconstrained
    /// scope.
    pub fn head(&self) -> &Expr {
        &self.head
    }

    /// The lowered conditions, in source order.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Look up an annotation value.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(SmolStr::as_str)
    }

    /// All annotations.
    pub fn annotations(&self) -> impl Iterator<Item = (&SmolStr, &SmolStr)> {
        self.annotations.iter()
    }

    /// Where the policy started in its source file.
    pub fn pos(&self) -> &Position {
        &self.pos
    }

    /// The source text the policy was lowered from.
    pub fn source_text(&self) -> &Arc<str> {
        &self.src
    }
}

/// An immutable set of policies, retaining source order.
///
/// Source order does not affect decisions, but the `reasons` reported by the
/// authorizer follow it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Build a set from lowered policies.
    pub fn new(policies: Vec<Policy>) -> Self {
        PolicySet { policies }
    }

    /// Iterate in source order.
    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }

    /// Number of policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// True when the set holds no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Look up a policy by id.
    pub fn get(&self, id: &PolicyId) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id() == id)
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<T: IntoIterator<Item = Policy>>(iter: T) -> Self {
        PolicySet {
            policies: iter.into_iter().collect(),
        }
    }
}
