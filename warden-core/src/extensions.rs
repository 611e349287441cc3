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

//! Extension functions: the name-keyed registry and the standard extensions.
//!
//! Every function shares the signature `(receiver?, args) -> value`; the
//! evaluator resolves the name in the table and invokes the handler, without
//! knowing which extensions exist. New extensions register at initialisation
//! by adding an [`Extension`] to the table behind [`Extensions::all_available`].

// The value model embeds the extension value types, so these modules are
// always compiled; the feature flags control which functions are registered.
pub mod decimal;
pub mod ipaddr;
pub mod sets;

use std::collections::HashMap;

use nonempty::nonempty;
use smol_str::SmolStr;

use crate::evaluator::{EvaluationError, Result};
use crate::value::{Type, Value};

/// The uniform extension function signature: an optional method receiver and
/// the evaluated arguments.
pub type ExtensionFn = fn(Option<&Value>, &[Value]) -> Result<Value>;

/// One extension: a name and the functions it contributes.
#[derive(Debug, Clone)]
pub struct Extension {
    name: SmolStr,
    funcs: Vec<(SmolStr, ExtensionFn)>,
}

impl Extension {
    /// Assemble an extension from `(function name, handler)` pairs.
    pub fn new(
        name: impl Into<SmolStr>,
        funcs: impl IntoIterator<Item = (&'static str, ExtensionFn)>,
    ) -> Self {
        Extension {
            name: name.into(),
            funcs: funcs
                .into_iter()
                .map(|(name, f)| (SmolStr::from(name), f))
                .collect(),
        }
    }

    /// The extension's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The functions this extension contributes.
    pub fn funcs(&self) -> impl Iterator<Item = (&SmolStr, &ExtensionFn)> {
        self.funcs.iter().map(|(name, f)| (name, f))
    }
}

/// The set of extensions active for an evaluation, flattened into one
/// name-keyed function table.
#[derive(Debug, Clone, Default)]
pub struct Extensions {
    table: HashMap<SmolStr, ExtensionFn>,
}

lazy_static::lazy_static! {
    static ref ALL_AVAILABLE: Extensions = Extensions::from_extensions(vec![
        #[cfg(feature = "ipaddr")]
        ipaddr::extension(),
        #[cfg(feature = "decimal")]
        decimal::extension(),
        sets::extension(),
    ]);
}

impl Extensions {
    /// All extensions this build provides.
    pub fn all_available() -> &'static Extensions {
        &ALL_AVAILABLE
    }

    /// Build a table from specific extensions. A name registered twice keeps
    /// the later registration.
    pub fn from_extensions(extensions: impl IntoIterator<Item = Extension>) -> Self {
        let mut table = HashMap::new();
        for ext in extensions {
            for (name, func) in &ext.funcs {
                table.insert(name.clone(), *func);
            }
        }
        Extensions { table }
    }

    /// Resolve a function by name.
    pub fn func(&self, name: &str) -> Result<ExtensionFn> {
        self.table
            .get(name)
            .copied()
            .ok_or_else(|| EvaluationError::unknown_function(name))
    }
}

// Shared argument-shape helpers for the extension modules.

pub(crate) fn check_arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvaluationError::extension(
            name,
            format!("expected {expected} argument(s), got {}", args.len()),
        ))
    }
}

pub(crate) fn method_receiver<'a>(name: &str, receiver: Option<&'a Value>) -> Result<&'a Value> {
    receiver.ok_or_else(|| {
        EvaluationError::extension(name, "must be called as a method (receiver.fn(...))")
    })
}

pub(crate) fn constructor_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a str> {
    check_arity(name, args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(s),
        other => Err(EvaluationError::type_error(
            nonempty![Type::String],
            other.type_of(),
        )),
    }
}
