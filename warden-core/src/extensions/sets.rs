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

//! Set builtins: `contains`, `containsAll`, `containsAny`.
//!
//! These live in the extension table like everything else callable, so the
//! evaluator needs no special casing for them. Membership uses full value
//! equality, so set elements compare as mutual subsets.

use nonempty::nonempty;

use super::{check_arity, method_receiver, Extension};
use crate::evaluator::{EvaluationError, Result};
use crate::value::{Set, Type, Value};

fn as_set(v: &Value) -> Result<&Set> {
    match v {
        Value::Set(set) => Ok(set),
        other => Err(EvaluationError::type_error(
            nonempty![Type::Set],
            other.type_of(),
        )),
    }
}

fn contains(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    check_arity("contains", args, 1)?;
    let set = as_set(method_receiver("contains", receiver)?)?;
    Ok(set.contains(&args[0]).into())
}

fn contains_all(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    check_arity("containsAll", args, 1)?;
    let set = as_set(method_receiver("containsAll", receiver)?)?;
    let other = as_set(&args[0])?;
    Ok(set.contains_all(other).into())
}

fn contains_any(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    check_arity("containsAny", args, 1)?;
    let set = as_set(method_receiver("containsAny", receiver)?)?;
    let other = as_set(&args[0])?;
    Ok(set.contains_any(other).into())
}

/// Construct the set-builtins extension.
pub fn extension() -> Extension {
    Extension::new(
        "sets",
        [
            ("contains", contains as super::ExtensionFn),
            ("containsAll", contains_all),
            ("containsAny", contains_any),
        ],
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn longs(values: impl IntoIterator<Item = i64>) -> Value {
        Value::set(values.into_iter().map(Value::from))
    }

    #[test]
    fn contains_uses_value_equality() {
        let set = longs([1, 2, 3]);
        assert_eq!(
            contains(Some(&set), &[Value::Long(2)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            contains(Some(&set), &[Value::Long(9)]).unwrap(),
            Value::Bool(false)
        );
        // a long is never equal to a string
        assert_eq!(
            contains(Some(&set), &[Value::from("2")]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn contains_all_and_any() {
        let set = longs([1, 2, 3]);
        assert_eq!(
            contains_all(Some(&set), &[longs([1, 3])]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            contains_all(Some(&set), &[longs([1, 4])]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            contains_all(Some(&set), &[longs([])]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            contains_any(Some(&set), &[longs([9, 2])]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            contains_any(Some(&set), &[longs([9, 8])]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            contains_any(Some(&set), &[longs([])]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn type_errors() {
        let set = longs([1]);
        assert!(contains(None, &[Value::Long(1)]).is_err());
        assert!(contains(Some(&Value::Long(1)), &[Value::Long(1)]).is_err());
        assert!(contains_all(Some(&set), &[Value::Long(1)]).is_err());
        assert!(contains_any(Some(&set), std::slice::from_ref(&set)).is_ok());
    }
}
