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

//! Evaluation errors.

use std::sync::Arc;

use itertools::Itertools;
use nonempty::NonEmpty;
use smol_str::SmolStr;

use crate::ast::Var;
use crate::store::StoreError;
use crate::token::Position;
use crate::value::Type;

/// Result type for evaluation.
pub type Result<T> = std::result::Result<T, EvaluationError>;

/// An error produced while evaluating an expression.
///
/// Carries the position of the closest enclosing expression when known, and
/// the source text the position points into once the error has crossed a
/// policy boundary; with both present the error is a [`miette::Diagnostic`]
/// with a labelled span, like the parser's errors.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationError {
    kind: EvaluationErrorKind,
    pos: Option<Position>,
    src: Option<Arc<str>>,
}

impl EvaluationError {
    /// What went wrong.
    pub fn kind(&self) -> &EvaluationErrorKind {
        &self.kind
    }

    /// Where it went wrong, when known.
    pub fn position(&self) -> Option<&Position> {
        self.pos.as_ref()
    }

    /// Attach `pos` unless the error already carries a more specific one.
    pub(crate) fn with_maybe_pos(mut self, pos: &Position) -> Self {
        if self.pos.is_none() {
            self.pos = Some(pos.clone());
        }
        self
    }

    /// Attach the source text the error's position points into, unless one
    /// is already present.
    pub(crate) fn with_maybe_source(mut self, src: &Arc<str>) -> Self {
        if self.src.is_none() {
            self.src = Some(Arc::clone(src));
        }
        self
    }

    fn kind_only(kind: EvaluationErrorKind) -> Self {
        EvaluationError {
            kind,
            pos: None,
            src: None,
        }
    }

    /// An operator was applied to a value of the wrong type.
    pub fn type_error(expected: NonEmpty<Type>, actual: Type) -> Self {
        Self::kind_only(EvaluationErrorKind::TypeError { expected, actual })
    }

    /// `Lookup` on an absent attribute (distinct from `has`, which is false).
    pub fn value_not_found(key: impl Into<SmolStr>) -> Self {
        Self::kind_only(EvaluationErrorKind::ValueNotFound { key: key.into() })
    }

    /// A call named a function no extension provides.
    pub fn unknown_function(name: impl Into<SmolStr>) -> Self {
        Self::kind_only(EvaluationErrorKind::UnknownFunction { name: name.into() })
    }

    /// A slot variable was referenced but the request carries no value for it.
    pub fn unlinked_slot(slot: Var) -> Self {
        Self::kind_only(EvaluationErrorKind::UnlinkedSlot { slot })
    }

    /// Arithmetic overflowed.
    pub fn integer_overflow(op: impl Into<SmolStr>) -> Self {
        Self::kind_only(EvaluationErrorKind::IntegerOverflow { op: op.into() })
    }

    /// `/` or `%` by zero.
    pub fn divide_by_zero() -> Self {
        Self::kind_only(EvaluationErrorKind::DivideByZero)
    }

    /// An extension function rejected its input.
    pub fn extension(name: impl Into<SmolStr>, msg: impl Into<String>) -> Self {
        Self::kind_only(EvaluationErrorKind::Extension {
            name: name.into(),
            msg: msg.into(),
        })
    }

    /// A generic evaluation failure.
    pub fn eval(msg: impl Into<String>) -> Self {
        Self::kind_only(EvaluationErrorKind::Eval { msg: msg.into() })
    }

    /// The request was cancelled.
    pub fn cancelled() -> Self {
        Self::kind_only(EvaluationErrorKind::Cancelled)
    }
}

impl From<StoreError> for EvaluationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Cancelled => Self::cancelled(),
            other => Self::kind_only(EvaluationErrorKind::Store(other)),
        }
    }
}

/// The kinds of evaluation error, one variant per reportable condition so
/// that callers and tests can match on them.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationErrorKind {
    /// Operator applied to incompatible variants, or a non-bool where a bool
    /// is required
    TypeError {
        /// Types the operator accepts here
        expected: NonEmpty<Type>,
        /// The type that was found
        actual: Type,
    },
    /// `Lookup` on an absent attribute
    ValueNotFound {
        /// The missing key
        key: SmolStr,
    },
    /// Call of a function not in the extension table
    UnknownFunction {
        /// The unknown name
        name: SmolStr,
    },
    /// `?principal`/`?resource` evaluated with no linked value
    UnlinkedSlot {
        /// The slot variable
        slot: Var,
    },
    /// Checked arithmetic overflowed
    IntegerOverflow {
        /// The operator involved
        op: SmolStr,
    },
    /// `/` or `%` by zero
    DivideByZero,
    /// An extension function failed
    Extension {
        /// Extension function name
        name: SmolStr,
        /// What it reported
        msg: String,
    },
    /// Generic evaluation failure
    Eval {
        /// Description
        msg: String,
    },
    /// The entity store failed
    Store(StoreError),
    /// The caller's cancellation token fired
    Cancelled,
}

impl std::fmt::Display for EvaluationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationErrorKind::TypeError { expected, actual } => {
                write!(
                    f,
                    "type error: expected {}, got {actual}",
                    expected.iter().join(" or ")
                )
            }
            EvaluationErrorKind::ValueNotFound { key } => {
                write!(f, "value not found: `{key}`")
            }
            EvaluationErrorKind::UnknownFunction { name } => {
                write!(f, "function named `{name}` not found")
            }
            EvaluationErrorKind::UnlinkedSlot { slot } => {
                write!(f, "slot `{slot}` is not linked to a value")
            }
            EvaluationErrorKind::IntegerOverflow { op } => {
                write!(f, "integer overflow in `{op}`")
            }
            EvaluationErrorKind::DivideByZero => write!(f, "division by zero"),
            EvaluationErrorKind::Extension { name, msg } => {
                write!(f, "error from `{name}`: {msg}")
            }
            EvaluationErrorKind::Eval { msg } => write!(f, "{msg}"),
            EvaluationErrorKind::Store(err) => write!(f, "{err}"),
            EvaluationErrorKind::Cancelled => write!(f, "evaluation cancelled"),
        }
    }
}

impl std::fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pos {
            Some(pos) => write!(f, "{pos}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for EvaluationError {}

impl miette::Diagnostic for EvaluationError {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.src
            .as_ref()
            .map(|src| src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        // a label is only useful once there is source text to point into
        self.src.as_ref()?;
        let pos = self.pos.as_ref()?;
        let span = miette::SourceSpan::new(miette::SourceOffset::from(pos.offset), 0);
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(self.kind.to_string()), span),
        )))
    }
}
