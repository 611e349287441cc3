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

//! The typed runtime value model.
//!
//! Everything an expression can evaluate to is a [`Value`]. The evaluator
//! dispatches on the variant; the `get_as_*` accessors produce the type
//! errors for operators with fixed operand types.

use std::collections::BTreeMap;

use itertools::Itertools;
use nonempty::nonempty;
use smol_str::SmolStr;

use crate::ast::EntityUid;
use crate::evaluator::EvaluationError;
use crate::extensions::decimal::Decimal;
use crate::extensions::ipaddr::IpValue;

/// A first-class record: string keys to values. Duplicate keys cannot exist;
/// construction takes the last value written for a key.
pub type Record = BTreeMap<SmolStr, Value>;

/// The dynamic result of evaluating an expression.
#[derive(Debug, Clone)]
pub enum Value {
    /// A boolean
    Bool(bool),
    /// A 64-bit signed integer
    Long(i64),
    /// A string
    Str(SmolStr),
    /// An entity reference
    Entity(EntityUid),
    /// A set of values
    Set(Set),
    /// A record
    Record(Record),
    /// An extension value
    Ext(ExtValue),
    /// A transient bare name, only produced for the right-hand side of
    /// `has`/`Lookup`
    Ident(SmolStr),
}

/// An extension value: one of the registered extension types.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtValue {
    /// An IP address or CIDR range
    Ip(IpValue),
    /// A fixed-point decimal
    Decimal(Decimal),
}

/// The runtime type of a value, for type errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Booleans
    Bool,
    /// 64-bit signed integers
    Long,
    /// Strings
    String,
    /// Entity references
    Entity,
    /// Sets
    Set,
    /// Records
    Record,
    /// IP address extension values
    Ipaddr,
    /// Decimal extension values
    Decimal,
    /// Transient identifiers
    Ident,
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Type::Bool => "boolean",
            Type::Long => "long",
            Type::String => "string",
            Type::Entity => "entity",
            Type::Set => "set",
            Type::Record => "record",
            Type::Ipaddr => "ipaddr",
            Type::Decimal => "decimal",
            Type::Ident => "identifier",
        })
    }
}

/// A set of values.
///
/// Storage is an unordered multiset (whatever was written, in evaluation
/// order); equality is mutual subset, so `[1, 2, 1]` and `[2, 1]` are equal
/// sets. Elements are compared with full [`Value`] equality.
#[derive(Debug, Clone, Default)]
pub struct Set(Vec<Value>);

impl Set {
    /// An empty set.
    pub fn new() -> Self {
        Set(Vec::new())
    }

    /// Number of stored elements (duplicates included).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the stored elements.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    /// Whether some stored element equals `value`.
    pub fn contains(&self, value: &Value) -> bool {
        self.0.iter().any(|v| v == value)
    }

    /// Whether every element of `other` is contained in `self`.
    pub fn contains_all(&self, other: &Set) -> bool {
        other.iter().all(|v| self.contains(v))
    }

    /// Whether any element of `other` is contained in `self`.
    pub fn contains_any(&self, other: &Set) -> bool {
        other.iter().any(|v| self.contains(v))
    }
}

impl FromIterator<Value> for Set {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Set(iter.into_iter().collect())
    }
}

impl From<Vec<Value>> for Set {
    fn from(values: Vec<Value>) -> Self {
        Set(values)
    }
}

impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        self.contains_all(other) && other.contains_all(self)
    }
}

impl Value {
    /// Build a set value from elements.
    pub fn set(values: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(values.into_iter().collect())
    }

    /// Build a record value from `(key, value)` pairs; the last value wins
    /// for a duplicated key.
    pub fn record<K: Into<SmolStr>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Record(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// An empty record.
    pub fn empty_record() -> Self {
        Value::Record(Record::new())
    }

    /// The runtime type of this value.
    pub fn type_of(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Bool,
            Value::Long(_) => Type::Long,
            Value::Str(_) => Type::String,
            Value::Entity(_) => Type::Entity,
            Value::Set(_) => Type::Set,
            Value::Record(_) => Type::Record,
            Value::Ext(ExtValue::Ip(_)) => Type::Ipaddr,
            Value::Ext(ExtValue::Decimal(_)) => Type::Decimal,
            Value::Ident(_) => Type::Ident,
        }
    }

    /// This value as a bool, or a type error.
    pub fn get_as_bool(&self) -> Result<bool, EvaluationError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvaluationError::type_error(
                nonempty![Type::Bool],
                other.type_of(),
            )),
        }
    }

    /// This value as a long, or a type error.
    pub fn get_as_long(&self) -> Result<i64, EvaluationError> {
        match self {
            Value::Long(i) => Ok(*i),
            other => Err(EvaluationError::type_error(
                nonempty![Type::Long],
                other.type_of(),
            )),
        }
    }

    /// This value as a string, or a type error.
    pub fn get_as_str(&self) -> Result<&SmolStr, EvaluationError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(EvaluationError::type_error(
                nonempty![Type::String],
                other.type_of(),
            )),
        }
    }

    /// This value as an entity reference, or a type error.
    pub fn get_as_entity(&self) -> Result<&EntityUid, EvaluationError> {
        match self {
            Value::Entity(uid) => Ok(uid),
            other => Err(EvaluationError::type_error(
                nonempty![Type::Entity],
                other.type_of(),
            )),
        }
    }

    /// This value as a set, or a type error.
    pub fn get_as_set(&self) -> Result<&Set, EvaluationError> {
        match self {
            Value::Set(set) => Ok(set),
            other => Err(EvaluationError::type_error(
                nonempty![Type::Set],
                other.type_of(),
            )),
        }
    }

    /// This value as a record, or a type error.
    pub fn get_as_record(&self) -> Result<&Record, EvaluationError> {
        match self {
            Value::Record(record) => Ok(record),
            other => Err(EvaluationError::type_error(
                nonempty![Type::Record],
                other.type_of(),
            )),
        }
    }

    /// The attribute key carried by a `has`/`Lookup` right-hand side: a
    /// string or a transient identifier.
    pub fn get_as_attr_key(&self) -> Result<&SmolStr, EvaluationError> {
        match self {
            Value::Str(s) | Value::Ident(s) => Ok(s),
            other => Err(EvaluationError::type_error(
                nonempty![Type::String, Type::Ident],
                other.type_of(),
            )),
        }
    }
}

// Values of different variants are not equal (this is the `==` operator's
// semantics, not a type error).
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Ext(a), Value::Ext(b)) => a == b,
            (Value::Ident(a), Value::Ident(b)) => a == b,
            (_, _) => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Long(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(SmolStr::from(s))
    }
}

impl From<SmolStr> for Value {
    fn from(s: SmolStr) -> Self {
        Value::Str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(SmolStr::from(s))
    }
}

impl From<EntityUid> for Value {
    fn from(uid: EntityUid) -> Self {
        Value::Entity(uid)
    }
}

impl From<IpValue> for Value {
    fn from(ip: IpValue) -> Self {
        Value::Ext(ExtValue::Ip(ip))
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Ext(ExtValue::Decimal(d))
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Long(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{:?}", s.as_str()),
            Value::Entity(uid) => write!(f, "{uid}"),
            Value::Set(set) => {
                write!(f, "[{}]", set.iter().join(", "))
            }
            Value::Record(record) => {
                write!(
                    f,
                    "{{{}}}",
                    record.iter().map(|(k, v)| format!("{k}: {v}")).join(", ")
                )
            }
            Value::Ext(ExtValue::Ip(ip)) => write!(f, "ip({ip})"),
            Value::Ext(ExtValue::Decimal(d)) => write!(f, "decimal({d})"),
            Value::Ident(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn differing_variants_are_unequal_not_errors() {
        assert_ne!(Value::Bool(true), Value::Long(1));
        assert_ne!(Value::Str("1".into()), Value::Long(1));
        assert_ne!(
            Value::Entity(EntityUid::new("User", "alice")),
            Value::Str("User::\"alice\"".into())
        );
    }

    #[test]
    fn set_equality_is_mutual_subset() {
        let a = Value::set([Value::Long(1), Value::Long(2)]);
        let b = Value::set([Value::Long(2), Value::Long(1)]);
        let c = Value::set([Value::Long(2), Value::Long(1), Value::Long(1)]);
        let d = Value::set([Value::Long(2)]);
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_ne!(a, d);
        assert_eq!(Value::set([]), Value::set([]));
    }

    #[test]
    fn nested_set_equality() {
        let a = Value::set([Value::set([Value::Long(1), Value::Long(2)])]);
        let b = Value::set([Value::set([Value::Long(2), Value::Long(1)])]);
        assert_eq!(a, b);
    }

    #[test]
    fn record_construction_last_key_wins() {
        let rec = Value::record([("a", Value::Long(1)), ("a", Value::Long(2))]);
        match rec {
            Value::Record(map) => assert_eq!(map.get("a"), Some(&Value::Long(2))),
            other => panic!("expected record, got {other}"),
        }
    }

    #[test]
    fn accessors_report_type_errors() {
        assert_eq!(Value::Bool(true).get_as_bool().unwrap(), true);
        assert!(Value::Long(3).get_as_bool().is_err());
        assert!(Value::Bool(true).get_as_long().is_err());
        assert!(Value::Str("s".into()).get_as_entity().is_err());
    }

    #[test]
    fn attr_keys_accept_strings_and_idents() {
        assert_eq!(Value::Str("k".into()).get_as_attr_key().unwrap(), "k");
        assert_eq!(Value::Ident("k".into()).get_as_attr_key().unwrap(), "k");
        assert!(Value::Long(1).get_as_attr_key().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Long(-3).to_string(), "-3");
        assert_eq!(Value::Str("hi".into()).to_string(), "\"hi\"");
        assert_eq!(
            Value::set([Value::Long(1), Value::Long(2)]).to_string(),
            "[1, 2]"
        );
        assert_eq!(
            Value::record([("a", Value::Long(1))]).to_string(),
            "{a: 1}"
        );
    }
}
