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

//! The `decimal` extension: fixed-point decimals.

use std::str::FromStr;

use nonempty::nonempty;
use regex::Regex;

use super::{check_arity, constructor_arg, method_receiver, Extension};
use crate::evaluator::{EvaluationError, Result};
use crate::value::{ExtValue, Type, Value};

/// Number of digits supported after the decimal point
const NUM_DIGITS: u32 = 4;

lazy_static::lazy_static! {
    // requires a decimal point with at least one digit on each side
    static ref DECIMAL_RE: Regex = Regex::new(r"^(-?\d+)\.(\d+)$").expect("a valid regex");
}

/// A decimal value, stored as the integer `value * 10^NUM_DIGITS`.
///
/// `decimal("0.0")` and `decimal("-0.0")` both normalise to zero and compare
/// equal; there is no signed zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal {
    value: i64,
}

/// Computes `x * 10^y`, erroring on overflow.
fn checked_mul_pow(x: i64, y: u32) -> Option<i64> {
    i64::checked_pow(10, y).and_then(|z| x.checked_mul(z))
}

impl FromStr for Decimal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let caps = DECIMAL_RE
            .captures(s)
            .ok_or_else(|| format!("`{s}` is not a well-formed decimal value"))?;
        let (whole, frac) = (&caps[1], &caps[2]);

        let frac_len = frac.len() as u32;
        if frac_len > NUM_DIGITS {
            return Err(format!(
                "too many digits after the decimal in `{s}` (at most {NUM_DIGITS} are supported)"
            ));
        }

        let overflow = || format!("overflow converting `{s}` to decimal");
        let whole: i64 = whole.parse().map_err(|_| overflow())?;
        let whole = checked_mul_pow(whole, NUM_DIGITS).ok_or_else(overflow)?;
        let frac: i64 = frac.parse().map_err(|_| overflow())?;
        let frac = checked_mul_pow(frac, NUM_DIGITS - frac_len).ok_or_else(overflow)?;

        let value = if s.starts_with('-') {
            whole.checked_sub(frac)
        } else {
            whole.checked_add(frac)
        }
        .ok_or_else(overflow)?;
        Ok(Decimal { value })
    }
}

impl std::fmt::Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scale = i64::pow(10, NUM_DIGITS);
        if self.value < 0 {
            write!(f, "-")?;
        }
        let whole = (self.value / scale).abs();
        let frac = format!("{:04}", (self.value % scale).abs());
        let frac = frac.trim_end_matches('0');
        let frac = if frac.is_empty() { "0" } else { frac };
        write!(f, "{whole}.{frac}")
    }
}

fn as_decimal(v: &Value) -> Result<Decimal> {
    match v {
        Value::Ext(ExtValue::Decimal(d)) => Ok(*d),
        other => Err(EvaluationError::type_error(
            nonempty![Type::Decimal],
            other.type_of(),
        )),
    }
}

fn decimal_from_str(_receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    let arg = constructor_arg("decimal", args)?;
    let d: Decimal = arg
        .parse()
        .map_err(|msg| EvaluationError::extension("decimal", msg))?;
    Ok(d.into())
}

fn comparator(
    name: &str,
    receiver: Option<&Value>,
    args: &[Value],
    cmp: fn(Decimal, Decimal) -> bool,
) -> Result<Value> {
    check_arity(name, args, 1)?;
    let left = as_decimal(method_receiver(name, receiver)?)?;
    let right = as_decimal(&args[0])?;
    Ok(cmp(left, right).into())
}

fn less_than(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    comparator("lessThan", receiver, args, |a, b| a < b)
}

fn less_than_or_equal(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    comparator("lessThanOrEqual", receiver, args, |a, b| a <= b)
}

fn greater_than(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    comparator("greaterThan", receiver, args, |a, b| a > b)
}

fn greater_than_or_equal(receiver: Option<&Value>, args: &[Value]) -> Result<Value> {
    comparator("greaterThanOrEqual", receiver, args, |a, b| a >= b)
}

/// Construct the `decimal` extension.
pub fn extension() -> Extension {
    Extension::new(
        "decimal",
        [
            ("decimal", decimal_from_str as super::ExtensionFn),
            ("lessThan", less_than),
            ("lessThanOrEqual", less_than_or_equal),
            ("greaterThan", greater_than),
            ("greaterThanOrEqual", greater_than_or_equal),
        ],
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("should parse")
    }

    #[test]
    fn parses_valid_decimals() {
        for ok in [
            "1.0", "-1.0", "123.456", "0.1234", "-0.0123", "55.1", "00.000",
            "-922337203685477.5808",
        ] {
            assert!(ok.parse::<Decimal>().is_ok(), "{ok}");
        }
    }

    #[test]
    fn rejects_malformed_decimals() {
        for bad in ["1234", "1.0.", "1.", ".1", "1.a", "-.", "1.12345", "0.00000"] {
            assert!(bad.parse::<Decimal>().is_err(), "{bad}");
        }
    }

    #[test]
    fn rejects_overflow() {
        for bad in [
            "1000000000000000.0",
            "922337203685477.5808",
            "-922337203685477.5809",
            "-922337203685478.0",
        ] {
            assert!(bad.parse::<Decimal>().is_err(), "{bad}");
        }
    }

    #[test]
    fn equality_ignores_trailing_zeros_and_signed_zero() {
        assert_eq!(dec("123.0"), dec("123.0000"));
        assert_eq!(dec("123.0"), dec("0123.0"));
        assert_eq!(dec("0.0"), dec("-0.0"));
        assert_ne!(dec("123.456"), dec("1.23"));
    }

    #[test]
    fn ordering() {
        assert!(dec("1.23") < dec("1.24"));
        assert!(dec("-1.24") < dec("-1.23"));
        assert!(dec("-1.23") < dec("1.23"));
        assert!(dec("123.45") > dec("1.23"));
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(dec("123.0").to_string(), "123.0");
        assert_eq!(dec("1.2300").to_string(), "1.23");
        assert_eq!(dec("1.05").to_string(), "1.05");
        assert_eq!(dec("-0.5").to_string(), "-0.5");
        assert_eq!(dec("-12.3456").to_string(), "-12.3456");
        assert_eq!(dec("0.0").to_string(), "0.0");
        assert_eq!(dec("-0.0").to_string(), "0.0");
    }

    #[test]
    fn comparator_functions() {
        let a = Value::from(dec("0.45"));
        let low = Value::from(dec("0.4"));
        let high = Value::from(dec("0.5"));
        assert_eq!(
            greater_than_or_equal(Some(&a), std::slice::from_ref(&low)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            less_than_or_equal(Some(&a), std::slice::from_ref(&high)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            less_than(Some(&a), std::slice::from_ref(&low)).unwrap(),
            Value::Bool(false)
        );
        // wrong types are type errors
        assert!(less_than(Some(&a), &[Value::from("0.4")]).is_err());
        assert!(less_than(Some(&Value::from("0.45")), &[low]).is_err());
        assert!(greater_than(None, &[a]).is_err());
    }
}
