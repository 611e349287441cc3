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

//! The authorizer: combines per-policy evaluation into one decision.
//!
//! The decision rule is default-deny: `Allow` requires at least one
//! satisfied `permit` policy and no satisfied `forbid` policy. A policy whose
//! evaluation errors is skipped — it neither permits nor forbids — so an
//! error can never turn a deny into an allow; the error is reported alongside
//! the decision instead of replacing it.

use miette::Diagnostic;
use tracing::debug;

use crate::ast::{Effect, PolicyId, PolicySet};
use crate::evaluator::{EvaluationError, Evaluator};
use crate::extensions::Extensions;
use crate::request::Request;
use crate::store::Store;

/// The authorization outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// The request is allowed
    Allow,
    /// The request is denied (the default)
    Deny,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Decision::Allow => "Allow",
            Decision::Deny => "Deny",
        })
    }
}

/// An error scoped to one policy's evaluation, or to the request itself.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationError {
    /// A policy's evaluation failed; the policy was skipped
    PolicyError {
        /// Which policy failed
        id: PolicyId,
        /// What went wrong
        error: EvaluationError,
    },
    /// The request's cancellation token fired between policies
    Cancelled,
}

impl std::fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationError::PolicyError { id, error } => {
                write!(f, "while evaluating policy `{id}`: {error}")
            }
            AuthorizationError::Cancelled => write!(f, "authorization cancelled"),
        }
    }
}

impl std::error::Error for AuthorizationError {}

// Forward the wrapped evaluation error's source span, so reporters render
// the offending policy text under the message.
impl Diagnostic for AuthorizationError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            AuthorizationError::PolicyError { error, .. } => error.source_code(),
            AuthorizationError::Cancelled => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        match self {
            AuthorizationError::PolicyError { error, .. } => error.labels(),
            AuthorizationError::Cancelled => None,
        }
    }
}

/// The result of an authorization call: the decision, the ids of the
/// policies that applied (in source order), and any per-policy errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// `Allow` or `Deny`
    pub decision: Decision,
    /// Ids of all applied policies (permit and forbid), in source order
    pub reasons: Vec<PolicyId>,
    /// Errors captured along the way; never affect the decision's safety
    pub errors: Vec<AuthorizationError>,
}

/// The authorization engine's entry point.
///
/// Holds the active extensions; policies, stores, and requests are supplied
/// per call, so one authorizer can serve many threads.
#[derive(Debug, Clone)]
pub struct Authorizer {
    extensions: &'static Extensions,
}

impl Authorizer {
    /// An authorizer with all built-in extensions enabled.
    pub fn new() -> Self {
        Authorizer {
            extensions: Extensions::all_available(),
        }
    }

    /// Decide `request` against `policies`, resolving entities through
    /// `store`.
    ///
    /// Cancellation is checked at each policy boundary; on cancellation the
    /// remaining policies are skipped, a [`AuthorizationError::Cancelled`]
    /// error is reported, and the decision is computed from the policies
    /// evaluated so far (still default-deny).
    pub fn is_authorized(
        &self,
        request: &Request,
        policies: &PolicySet,
        store: &dyn Store,
    ) -> Response {
        let evaluator = Evaluator::new(request, store, self.extensions);

        let mut satisfied_permit = false;
        let mut satisfied_forbid = false;
        let mut reasons = Vec::new();
        let mut errors = Vec::new();

        for policy in policies.iter() {
            if request.cancel_token().is_cancelled() {
                errors.push(AuthorizationError::Cancelled);
                break;
            }
            match evaluator.evaluate(policy) {
                Ok(true) => {
                    if request.trace() {
                        debug!(policy = %policy.id(), effect = %policy.effect(), "policy applied");
                    }
                    match policy.effect() {
                        Effect::Permit => satisfied_permit = true,
                        Effect::Forbid => satisfied_forbid = true,
                    }
                    reasons.push(policy.id().clone());
                }
                Ok(false) => {
                    if request.trace() {
                        debug!(policy = %policy.id(), "policy not applicable");
                    }
                }
                Err(error) => {
                    if request.trace() {
                        debug!(policy = %policy.id(), %error, "policy evaluation failed; skipped");
                    }
                    errors.push(AuthorizationError::PolicyError {
                        id: policy.id().clone(),
                        error,
                    });
                }
            }
        }

        let decision = if satisfied_permit && !satisfied_forbid {
            Decision::Allow
        } else {
            Decision::Deny
        };
        if request.trace() {
            debug!(%decision, reasons = reasons.len(), errors = errors.len(), "decision");
        }

        Response {
            decision,
            reasons,
            errors,
        }
    }
}

impl Default for Authorizer {
    fn default() -> Self {
        Self::new()
    }
}
