//! Typed extraction from [`Value`]

use crate::error::{Error, Result};
use crate::value::{ObjectRef, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::hash::Hash;
use uuid::Uuid;

/// Conversion from a borrowed [`Value`]
///
/// Integer targets accept narrower integer variants; a mismatch is a
/// [`Error::TypeError`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(Error::type_error(expected, value.type_name()))
}

macro_rules! from_value_via {
    ($($ty:ty => $name:literal, $accessor:expr;)+) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    match $accessor(value) {
                        Some(v) => Ok(v),
                        None => mismatch($name, value),
                    }
                }
            }
        )+
    };
}

from_value_via! {
    bool => "bool", Value::as_bool;
    i32 => "int", Value::as_int;
    i64 => "long", Value::as_long;
    f32 => "float", Value::as_float;
    f64 => "double", Value::as_double;
    char => "char", Value::as_char;
    Uuid => "uuid", Value::as_uuid;
}

impl FromValue for i8 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Byte(b) => Ok(*b),
            other => mismatch("byte", other),
        }
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Byte(b) => Ok(*b as i16),
            Value::Short(s) => Ok(*s),
            other => mismatch("short", other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => mismatch("string", other),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for ObjectRef {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(obj) => Ok(obj.clone()),
            other => mismatch("object", other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::List(items) | Value::Array(items) => items.iter().map(T::from_value).collect(),
            Value::IntArray(ints) => ints.iter().map(|i| T::from_value(&Value::Int(*i))).collect(),
            other => mismatch("list", other),
        }
    }
}

impl<K, V> FromValue for HashMap<K, V>
where
    K: FromValue + Eq + Hash,
    V: FromValue,
{
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            other => mismatch("map", other),
        }
    }
}

impl<V: FromValue> FromValue for IndexMap<String, V> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((String::from_value(k)?, V::from_value(v)?)))
                .collect(),
            other => mismatch("map", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening() {
        assert_eq!(i64::from_value(&Value::Int(3)).unwrap(), 3);
        assert_eq!(i32::from_value(&Value::Short(3)).unwrap(), 3);
        assert_eq!(i16::from_value(&Value::Byte(-3)).unwrap(), -3);
        assert_eq!(f64::from_value(&Value::Long(2)).unwrap(), 2.0);
        assert!(i32::from_value(&Value::Long(3)).is_err());
    }

    #[test]
    fn test_mismatch_reports_types() {
        match bool::from_value(&Value::from("yes")) {
            Err(Error::TypeError { expected, got }) => {
                assert_eq!(expected, "bool");
                assert_eq!(got, "string");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_collections() {
        let list = Value::from(vec![1, 2, 3]);
        assert_eq!(Vec::<i64>::from_value(&list).unwrap(), vec![1, 2, 3]);

        let ints = Value::IntArray(vec![4, 5]);
        assert_eq!(Vec::<i32>::from_value(&ints).unwrap(), vec![4, 5]);

        let map = Value::map([("a", 1), ("b", 2)]);
        let hashed: HashMap<String, i32> = FromValue::from_value(&map).unwrap();
        assert_eq!(hashed["b"], 2);
        let ordered: IndexMap<String, i32> = FromValue::from_value(&map).unwrap();
        assert_eq!(ordered.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_option() {
        assert_eq!(Option::<i32>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_value(&Value::Int(1)).unwrap(), Some(1));
        assert!(Option::<i32>::from_value(&Value::Bool(true)).is_err());
    }
}
