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

//! Per-call authorization requests and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ast::EntityUid;
use crate::value::Value;

/// A cheap-clone cancellation handle.
///
/// The authorizer checks it at each policy boundary; stores may consult it
/// during expensive lookups. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was signalled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One authorization request: the `(principal, action, resource)` triple,
/// the optional context record, optional slot values for templated policies,
/// and evaluation options.
///
/// A request is created per authorization call and never mutated by the
/// evaluator.
#[derive(Debug, Clone)]
pub struct Request {
    principal: EntityUid,
    action: EntityUid,
    resource: EntityUid,
    context: Option<Value>,
    principal_slot: Option<EntityUid>,
    resource_slot: Option<EntityUid>,
    cancel: CancelToken,
    trace: bool,
}

impl Request {
    /// A request for the given triple, with no context and default options.
    pub fn new(principal: EntityUid, action: EntityUid, resource: EntityUid) -> Self {
        Request {
            principal,
            action,
            resource,
            context: None,
            principal_slot: None,
            resource_slot: None,
            cancel: CancelToken::new(),
            trace: false,
        }
    }

    /// Attach a context record. Anything other than a record will surface as
    /// type errors from expressions that consult `context`.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Fill the `?principal` slot.
    pub fn with_principal_slot(mut self, uid: EntityUid) -> Self {
        self.principal_slot = Some(uid);
        self
    }

    /// Fill the `?resource` slot.
    pub fn with_resource_slot(mut self, uid: EntityUid) -> Self {
        self.resource_slot = Some(uid);
        self
    }

    /// Attach a caller-controlled cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Emit per-policy `tracing` events while authorizing.
    pub fn with_tracing(mut self) -> Self {
        self.trace = true;
        self
    }

    /// The requesting principal.
    pub fn principal(&self) -> &EntityUid {
        &self.principal
    }

    /// The requested action.
    pub fn action(&self) -> &EntityUid {
        &self.action
    }

    /// The requested resource.
    pub fn resource(&self) -> &EntityUid {
        &self.resource
    }

    /// The context record, if one was supplied.
    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    /// The `?principal` slot value, if linked.
    pub fn principal_slot(&self) -> Option<&EntityUid> {
        self.principal_slot.as_ref()
    }

    /// The `?resource` slot value, if linked.
    pub fn resource_slot(&self) -> Option<&EntityUid> {
        self.resource_slot.as_ref()
    }

    /// The request's cancellation token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Whether per-policy tracing is enabled.
    pub fn trace(&self) -> bool {
        self.trace
    }
}
