//! Runtime value model.
//!
//! Ports and properties are dynamically typed: every value a canvas moves is
//! a [`Value`], and every port declares a [`ValueType`]. The conversion
//! engine ([`crate::convert`]) bridges between shapes; this module only
//! defines the shapes themselves plus the [`FromValue`]/[`IntoValue`] traits
//! node authors use to get in and out of native Rust types.

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Static type of a port, property, or value.
///
/// `Any` is the wildcard type: a port typed `Any` accepts every value
/// unchanged. `Flow` is the marker type carried by flow ports; it never
/// describes a data value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Any,
    Flow,
    Bool,
    Int,
    Float,
    Str,
    DateTime,
    Duration,
    Uuid,
    List(Box<ValueType>),
    Set(Box<ValueType>),
}

impl ValueType {
    /// Stable textual encoding used in persisted documents.
    pub fn encode(&self) -> String {
        match self {
            ValueType::Any => "any".into(),
            ValueType::Flow => "flow".into(),
            ValueType::Bool => "bool".into(),
            ValueType::Int => "int".into(),
            ValueType::Float => "float".into(),
            ValueType::Str => "str".into(),
            ValueType::DateTime => "datetime".into(),
            ValueType::Duration => "duration".into(),
            ValueType::Uuid => "uuid".into(),
            ValueType::List(elem) => format!("list<{}>", elem.encode()),
            ValueType::Set(elem) => format!("set<{}>", elem.encode()),
        }
    }

    /// Inverse of [`ValueType::encode`]. Returns `None` for unknown text.
    pub fn decode(s: &str) -> Option<Self> {
        let s = s.trim();
        match s {
            "any" => Some(ValueType::Any),
            "flow" => Some(ValueType::Flow),
            "bool" => Some(ValueType::Bool),
            "int" => Some(ValueType::Int),
            "float" => Some(ValueType::Float),
            "str" => Some(ValueType::Str),
            "datetime" => Some(ValueType::DateTime),
            "duration" => Some(ValueType::Duration),
            "uuid" => Some(ValueType::Uuid),
            _ => {
                if let Some(inner) = s.strip_prefix("list<").and_then(|r| r.strip_suffix('>')) {
                    Some(ValueType::List(Box::new(ValueType::decode(inner)?)))
                } else if let Some(inner) = s.strip_prefix("set<").and_then(|r| r.strip_suffix('>'))
                {
                    Some(ValueType::Set(Box::new(ValueType::decode(inner)?)))
                } else {
                    None
                }
            }
        }
    }

    pub fn list_of(elem: ValueType) -> Self {
        ValueType::List(Box::new(elem))
    }

    pub fn set_of(elem: ValueType) -> Self {
        ValueType::Set(Box::new(elem))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, ValueType::List(_) | ValueType::Set(_))
    }

    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            ValueType::List(elem) | ValueType::Set(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }

    fn is_scalar(&self) -> bool {
        !self.is_collection() && !matches!(self, ValueType::Any | ValueType::Flow)
    }

    /// Whether a value of type `source` is plausibly convertible into this
    /// type. This is the connection-time check; it mirrors the conversion
    /// engine's strategies without running them.
    pub fn accepts(&self, source: &ValueType) -> bool {
        if self == source || matches!(self, ValueType::Any) || matches!(source, ValueType::Any) {
            return true;
        }
        // Flow only pairs with flow, and the equality case is already gone.
        if matches!(self, ValueType::Flow) || matches!(source, ValueType::Flow) {
            return false;
        }
        match self {
            // Everything scalar stringifies; strings parse back into scalars.
            ValueType::Str => source.is_scalar(),
            ValueType::Bool | ValueType::Int | ValueType::Float => {
                source.is_numeric() || matches!(source, ValueType::Bool | ValueType::Str)
            }
            ValueType::DateTime | ValueType::Uuid => matches!(source, ValueType::Str),
            ValueType::Duration => {
                source.is_numeric() || matches!(source, ValueType::Str)
            }
            ValueType::List(elem) | ValueType::Set(elem) => match source.element_type() {
                // Collection-to-collection bridges element-wise.
                Some(src_elem) => elem.accepts(src_elem),
                // Scalar wraps into a one-element collection.
                None => source.is_scalar() && elem.accepts(source),
            },
            ValueType::Any | ValueType::Flow => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl Serialize for ValueType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

struct ValueTypeVisitor;

impl Visitor<'_> for ValueTypeVisitor {
    type Value = ValueType;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a value type string such as \"int\" or \"list<str>\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ValueType, E> {
        ValueType::decode(v).ok_or_else(|| E::custom(format!("unknown value type `{v}`")))
    }
}

impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(ValueTypeVisitor)
    }
}

/// A dynamically typed runtime value.
///
/// `Null` means "no value published yet"; it is never the result of a
/// successful conversion. `Set` keeps insertion order and deduplicates on
/// construction via [`Value::set`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(DateTime<Utc>),
    Duration(Duration),
    Uuid(Uuid),
    List(Vec<Value>),
    Set(Vec<Value>),
}

impl Value {
    /// Build a set value, dropping duplicates while keeping first-seen order.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut out: Vec<Value> = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Value::Set(out)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type of this value. Collections report the type of their
    /// first element, or `Any` when empty.
    pub fn type_of(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Any,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::DateTime(_) => ValueType::DateTime,
            Value::Duration(_) => ValueType::Duration,
            Value::Uuid(_) => ValueType::Uuid,
            Value::List(items) => ValueType::List(Box::new(
                items.first().map(Value::type_of).unwrap_or(ValueType::Any),
            )),
            Value::Set(items) => ValueType::Set(Box::new(
                items.first().map(Value::type_of).unwrap_or(ValueType::Any),
            )),
        }
    }

    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Duration(d) => write!(f, "{}s", d.as_secs_f64()),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::List(items) | Value::Set(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Conversion from a native Rust type into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Typed extraction out of a [`Value`], used by node implementations to read
/// already-converted port values.
pub trait FromValue: Sized {
    /// The [`ValueType`] this Rust type corresponds to.
    fn value_type() -> ValueType;
    fn from_value(value: &Value) -> Option<Self>;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

macro_rules! scalar_value_impls {
    ($($ty:ty => $variant:ident, $vt:expr;)*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }

            impl FromValue for $ty {
                fn value_type() -> ValueType {
                    $vt
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

scalar_value_impls! {
    bool => Bool, ValueType::Bool;
    i64 => Int, ValueType::Int;
    String => Str, ValueType::Str;
    DateTime<Utc> => DateTime, ValueType::DateTime;
    Duration => Duration, ValueType::Duration;
    Uuid => Uuid, ValueType::Uuid;
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f64 {
    fn value_type() -> ValueType {
        ValueType::Float
    }

    // Int widens silently; node code asking for f64 should not care which
    // numeric shape arrived.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_string())
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::List(Box::new(T::value_type()))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.items()?.iter().map(T::from_value).collect()
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_encoding_round_trips() {
        let cases = [
            ValueType::Any,
            ValueType::Int,
            ValueType::list_of(ValueType::Str),
            ValueType::set_of(ValueType::list_of(ValueType::Int)),
        ];
        for t in cases {
            assert_eq!(ValueType::decode(&t.encode()), Some(t));
        }
        assert_eq!(ValueType::decode("list<banana>"), None);
        assert_eq!(ValueType::decode("banana"), None);
    }

    #[test]
    fn set_constructor_dedupes_preserving_order() {
        let v = Value::set([Value::Int(3), Value::Int(1), Value::Int(3), Value::Int(2)]);
        assert_eq!(
            v,
            Value::Set(vec![Value::Int(3), Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn accepts_covers_bridging_and_wrapping() {
        let list_int = ValueType::list_of(ValueType::Int);
        let set_int = ValueType::set_of(ValueType::Int);
        assert!(list_int.accepts(&set_int));
        assert!(set_int.accepts(&list_int));
        assert!(list_int.accepts(&ValueType::Int));
        assert!(ValueType::list_of(ValueType::Str).accepts(&ValueType::Int));
        assert!(!ValueType::Flow.accepts(&ValueType::Int));
        assert!(ValueType::Any.accepts(&ValueType::Flow));
    }

    #[test]
    fn from_value_widens_int_to_float() {
        assert_eq!(f64::from_value(&Value::Int(7)), Some(7.0));
        assert_eq!(i64::from_value(&Value::Float(7.0)), None);
    }

    #[test]
    fn value_serde_is_tagged() {
        let v = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["type"], "list");
        let back: Value = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }
}
