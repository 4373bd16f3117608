//! Value conversion engine.
//!
//! Every data edge on a canvas funnels through [`ConversionEngine::convert`].
//! Conversion never errors: it either produces a value of the target type or
//! returns `None`, and callers fall back to their defaults. Strategy order is
//! fixed:
//!
//! 1. identity (equal types, or target `Any`)
//! 2. registered custom converter for the exact type pair
//! 3. primitive coercion (numeric widening/narrowing, bool/int, parse/print)
//! 4. collection bridging (element-wise list/set conversion)
//! 5. scalar wrap (scalar into one-element collection)
//! 6. string round-trip (print source, parse into target)
//!
//! A strategy that fails at the value level (e.g. a string that does not
//! parse) falls through to the next applicable one. The applicable strategy
//! list per `(source, target)` pair is cached, so repeated conversions on a
//! hot edge skip the decision logic.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::value::{Value, ValueType};

/// A caller-registered conversion function for one exact type pair.
pub type CustomConverter = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// One step in a resolved conversion plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Identity,
    Custom,
    Primitive,
    Collection,
    WrapScalar,
    StringRoundTrip,
}

/// Cached, shareable conversion engine.
///
/// Cheap to clone behind an [`Arc`]; a canvas owns one and hands it to every
/// execution. Registered converters take priority over built-in coercion for
/// their exact pair.
pub struct ConversionEngine {
    plans: RwLock<FxHashMap<(ValueType, ValueType), Vec<Strategy>>>,
    converters: RwLock<FxHashMap<(ValueType, ValueType), CustomConverter>>,
}

impl Default for ConversionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionEngine {
    pub fn new() -> Self {
        Self {
            plans: RwLock::new(FxHashMap::default()),
            converters: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a converter for an exact `(source, target)` pair.
    ///
    /// Invalidates any cached plan for that pair. Registration is expected
    /// to happen during canvas setup, before executions run.
    pub fn register_converter(
        &self,
        source: ValueType,
        target: ValueType,
        converter: CustomConverter,
    ) {
        self.plans.write().remove(&(source.clone(), target.clone()));
        self.converters.write().insert((source, target), converter);
    }

    /// Whether a converter is registered for the exact pair. Connection
    /// validation consults this so registered pairs connect even when the
    /// built-in strategies would not bridge them.
    pub fn has_converter(&self, source: &ValueType, target: &ValueType) -> bool {
        self.converters
            .read()
            .contains_key(&(source.clone(), target.clone()))
    }

    /// Convert `value` into `target`. `None` means "not convertible"; a
    /// `Null` input is never convertible.
    pub fn convert(&self, value: &Value, target: &ValueType) -> Option<Value> {
        if value.is_null() {
            return None;
        }
        let source = value.type_of();
        let plan = self.plan_for(&source, target);
        for strategy in plan.iter() {
            if let Some(out) = self.apply(*strategy, value, &source, target) {
                return Some(out);
            }
        }
        None
    }

    /// Convert and extract in one step, substituting `default` when the
    /// value is absent or not convertible.
    pub fn convert_or<T>(&self, value: &Value, default: T) -> T
    where
        T: crate::value::FromValue,
    {
        self.convert(value, &T::value_type())
            .and_then(|v| T::from_value(&v))
            .unwrap_or(default)
    }

    fn plan_for(&self, source: &ValueType, target: &ValueType) -> Vec<Strategy> {
        let key = (source.clone(), target.clone());
        if let Some(plan) = self.plans.read().get(&key) {
            return plan.clone();
        }
        let plan = self.resolve(source, target);
        self.plans.write().insert(key, plan.clone());
        plan
    }

    fn resolve(&self, source: &ValueType, target: &ValueType) -> Vec<Strategy> {
        let mut plan = Vec::new();
        if matches!(target, ValueType::Any) {
            plan.push(Strategy::Identity);
            return plan;
        }
        if source == target {
            plan.push(Strategy::Identity);
            // A collection reports the type of its first element, so a
            // mixed-element collection can land here with stragglers that
            // still need element-wise conversion.
            if target.is_collection() {
                plan.push(Strategy::Collection);
            }
            return plan;
        }
        if self
            .converters
            .read()
            .contains_key(&(source.clone(), target.clone()))
        {
            plan.push(Strategy::Custom);
        }
        if !source.is_collection() && !target.is_collection() {
            plan.push(Strategy::Primitive);
        }
        if source.is_collection() && target.is_collection() {
            plan.push(Strategy::Collection);
        }
        if target.is_collection() && !source.is_collection() {
            plan.push(Strategy::WrapScalar);
        }
        if !target.is_collection() && !matches!(target, ValueType::Flow) {
            plan.push(Strategy::StringRoundTrip);
        }
        plan
    }

    fn apply(
        &self,
        strategy: Strategy,
        value: &Value,
        source: &ValueType,
        target: &ValueType,
    ) -> Option<Value> {
        match strategy {
            Strategy::Identity => (matches!(target, ValueType::Any)
                || matches_exactly(value, target))
            .then(|| value.clone()),
            Strategy::Custom => {
                let converter = self
                    .converters
                    .read()
                    .get(&(source.clone(), target.clone()))
                    .cloned()?;
                converter(value)
            }
            Strategy::Primitive => primitive_convert(value, target),
            Strategy::Collection => self.collection_convert(value, target),
            Strategy::WrapScalar => {
                let elem_type = target.element_type()?;
                let elem = self.convert(value, elem_type)?;
                Some(match target {
                    ValueType::Set(_) => Value::set([elem]),
                    _ => Value::List(vec![elem]),
                })
            }
            Strategy::StringRoundTrip => {
                let text = primitive_convert(value, &ValueType::Str)?;
                primitive_convert(&text, target)
            }
        }
    }

    /// Element-wise conversion between list/set shapes. Any element failing
    /// to convert fails the whole collection.
    fn collection_convert(&self, value: &Value, target: &ValueType) -> Option<Value> {
        let items = value.items()?;
        let elem_type = target.element_type()?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if matches!(elem_type, ValueType::Any) || matches_exactly(item, elem_type) {
                out.push(item.clone());
            } else {
                out.push(self.convert(item, elem_type)?);
            }
        }
        Some(match target {
            ValueType::Set(_) => Value::set(out),
            _ => Value::List(out),
        })
    }
}

/// Whether `value` already is a `target`, element-wise for collections.
///
/// A collection value reports the type of its first element, so identity
/// must verify every element before passing the value through untouched.
/// Output and property writes use the same check before skipping coercion.
pub(crate) fn matches_exactly(value: &Value, target: &ValueType) -> bool {
    match target.element_type() {
        None => value.type_of() == *target,
        Some(elem) => match value.items() {
            Some(items) => {
                matches!(elem, ValueType::Any)
                    || items.iter().all(|item| matches_exactly(item, elem))
            }
            None => false,
        },
    }
}

/// Scalar-to-scalar coercion table.
///
/// Empty strings parse as zero for the numeric targets only; everything
/// else treats an empty string as a failed parse.
fn primitive_convert(value: &Value, target: &ValueType) -> Option<Value> {
    match target {
        ValueType::Bool => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Int(i) => Some(Value::Bool(*i != 0)),
            Value::Float(x) => Some(Value::Bool(*x != 0.0)),
            Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        ValueType::Int => match value {
            Value::Int(i) => Some(Value::Int(*i)),
            Value::Bool(b) => Some(Value::Int(i64::from(*b))),
            Value::Float(x) if x.is_finite() => Some(Value::Int(x.trunc() as i64)),
            Value::Str(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Some(Value::Int(0));
                }
                s.parse::<i64>()
                    .ok()
                    .map(Value::Int)
                    .or_else(|| s.parse::<f64>().ok().map(|x| Value::Int(x.trunc() as i64)))
            }
            _ => None,
        },
        ValueType::Float => match value {
            Value::Float(x) => Some(Value::Float(*x)),
            Value::Int(i) => Some(Value::Float(*i as f64)),
            Value::Bool(b) => Some(Value::Float(f64::from(u8::from(*b)))),
            Value::Str(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Some(Value::Float(0.0));
                }
                s.parse::<f64>().ok().map(Value::Float)
            }
            _ => None,
        },
        ValueType::Str => match value {
            Value::List(_) | Value::Set(_) | Value::Null => None,
            other => Some(Value::Str(other.to_string())),
        },
        ValueType::DateTime => match value {
            Value::DateTime(dt) => Some(Value::DateTime(*dt)),
            Value::Str(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| Value::DateTime(dt.with_timezone(&chrono::Utc))),
            _ => None,
        },
        ValueType::Duration => match value {
            Value::Duration(d) => Some(Value::Duration(*d)),
            Value::Int(i) if *i >= 0 => {
                Some(Value::Duration(std::time::Duration::from_secs(*i as u64)))
            }
            Value::Float(x) if x.is_finite() && *x >= 0.0 => {
                Some(Value::Duration(std::time::Duration::from_secs_f64(*x)))
            }
            Value::Str(s) => {
                let s = s.trim().trim_end_matches('s');
                let secs = s.parse::<f64>().ok()?;
                (secs.is_finite() && secs >= 0.0)
                    .then(|| Value::Duration(std::time::Duration::from_secs_f64(secs)))
            }
            _ => None,
        },
        ValueType::Uuid => match value {
            Value::Uuid(u) => Some(Value::Uuid(*u)),
            Value::Str(s) => uuid::Uuid::parse_str(s.trim()).ok().map(Value::Uuid),
            _ => None,
        },
        ValueType::Any | ValueType::Flow | ValueType::List(_) | ValueType::Set(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType as VT;

    fn engine() -> ConversionEngine {
        ConversionEngine::new()
    }

    #[test]
    fn identity_preserves_value() {
        let e = engine();
        let v = Value::Int(42);
        assert_eq!(e.convert(&v, &VT::Int), Some(Value::Int(42)));
        assert_eq!(e.convert(&v, &VT::Any), Some(Value::Int(42)));
    }

    #[test]
    fn null_never_converts() {
        let e = engine();
        assert_eq!(e.convert(&Value::Null, &VT::Any), None);
        assert_eq!(e.convert(&Value::Null, &VT::Str), None);
    }

    #[test]
    fn numeric_coercions() {
        let e = engine();
        assert_eq!(e.convert(&Value::Int(3), &VT::Float), Some(Value::Float(3.0)));
        assert_eq!(e.convert(&Value::Float(3.9), &VT::Int), Some(Value::Int(3)));
        assert_eq!(e.convert(&Value::Bool(true), &VT::Int), Some(Value::Int(1)));
        assert_eq!(e.convert(&Value::Int(0), &VT::Bool), Some(Value::Bool(false)));
    }

    #[test]
    fn empty_string_is_zero_for_numerics_only() {
        let e = engine();
        assert_eq!(e.convert(&Value::Str(String::new()), &VT::Int), Some(Value::Int(0)));
        assert_eq!(
            e.convert(&Value::Str(String::new()), &VT::Float),
            Some(Value::Float(0.0))
        );
        assert_eq!(e.convert(&Value::Str(String::new()), &VT::Bool), None);
        assert_eq!(e.convert(&Value::Str(String::new()), &VT::Uuid), None);
    }

    #[test]
    fn list_to_set_dedupes() {
        let e = engine();
        let v = Value::List(vec![Value::Int(1), Value::Int(1), Value::Int(2)]);
        assert_eq!(
            e.convert(&v, &VT::set_of(VT::Int)),
            Some(Value::Set(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn collection_bridging_converts_elements() {
        let e = engine();
        let v = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            e.convert(&v, &VT::list_of(VT::Str)),
            Some(Value::List(vec![
                Value::Str("1".into()),
                Value::Str("2".into())
            ]))
        );
    }

    #[test]
    fn scalar_wraps_into_collection() {
        let e = engine();
        assert_eq!(
            e.convert(&Value::Int(42), &VT::list_of(VT::Int)),
            Some(Value::List(vec![Value::Int(42)]))
        );
        assert_eq!(
            e.convert(&Value::Int(123), &VT::list_of(VT::Str)),
            Some(Value::List(vec![Value::Str("123".into())]))
        );
    }

    #[test]
    fn mixed_collections_never_pass_through_unconverted() {
        // A list reports the type of its first element, so this one claims
        // list<int> and must not ride the identity path with a str inside.
        let e = engine();
        let v = Value::List(vec![Value::Int(1), Value::Str("2".into())]);
        assert_eq!(
            e.convert(&v, &VT::list_of(VT::Int)),
            Some(Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        let bad = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        assert_eq!(e.convert(&bad, &VT::list_of(VT::Int)), None);
    }

    #[test]
    fn homogeneous_collections_still_take_the_identity_path() {
        let e = engine();
        let v = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(e.convert(&v, &VT::list_of(VT::Int)), Some(v.clone()));
        assert_eq!(e.convert(&Value::List(vec![]), &VT::list_of(VT::Int)), Some(Value::List(vec![])));
    }

    #[test]
    fn convert_or_extracts_with_a_default() {
        let e = engine();
        assert_eq!(e.convert_or(&Value::Str("3".into()), 0i64), 3);
        assert_eq!(e.convert_or(&Value::Str("many".into()), 7i64), 7);
        assert_eq!(e.convert_or(&Value::Null, 7i64), 7);
    }

    #[test]
    fn registered_converter_wins_over_builtin() {
        let e = engine();
        e.register_converter(
            VT::Int,
            VT::Str,
            Arc::new(|v| match v {
                Value::Int(i) => Some(Value::Str(format!("#{i}"))),
                _ => None,
            }),
        );
        assert_eq!(
            e.convert(&Value::Int(5), &VT::Str),
            Some(Value::Str("#5".into()))
        );
    }

    #[test]
    fn failed_custom_falls_through_to_builtin() {
        let e = engine();
        e.register_converter(VT::Int, VT::Str, Arc::new(|_| None));
        assert_eq!(
            e.convert(&Value::Int(5), &VT::Str),
            Some(Value::Str("5".into()))
        );
    }

    #[test]
    fn unparseable_string_fails() {
        let e = engine();
        assert_eq!(e.convert(&Value::Str("beep".into()), &VT::Uuid), None);
        assert_eq!(e.convert(&Value::Str("beep".into()), &VT::DateTime), None);
    }

    #[test]
    fn plan_cache_survives_repeat_conversions() {
        let e = engine();
        for i in 0..100 {
            assert_eq!(
                e.convert(&Value::Int(i), &VT::Str),
                Some(Value::Str(i.to_string()))
            );
        }
        assert_eq!(e.plans.read().len(), 1);
    }
}
