//! Dynamic values carried by the tagged codec

use crate::error::{Error, Result};
use crate::object::{DynObject, GravEnum, GravObject};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A dynamic value that can be written with a type tag
///
/// Every variant has a fixed tag on the wire (see [`codec::tag`](crate::codec::tag)).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    String(String),
    /// Raw byte array
    Bytes(Vec<u8>),
    Byte(i8),
    Double(f64),
    Int(i32),
    Long(i64),
    Uuid(Uuid),
    /// Ordered key/value pairs; keys may be any value
    Map(Vec<(Value, Value)>),
    /// A single key/value pair
    Entry(Box<(Value, Value)>),
    List(Vec<Value>),
    Enum(EnumValue),
    /// A registered object type
    Object(ObjectRef),
    IntArray(Vec<i32>),
    /// Fixed-size array of values
    Array(Vec<Value>),
    Bool(bool),
    Float(f32),
    Short(i16),
    Char(char),
}

/// How an enum constant is identified on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnumConstant {
    Ordinal(i32),
    Name(String),
}

/// An enum constant tagged with its enum's type name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_name: String,
    pub constant: EnumConstant,
}

impl EnumValue {
    /// Capture a typed enum constant
    pub fn from_enum<E: GravEnum>(value: &E) -> Self {
        let constant = if E::BY_NAME {
            EnumConstant::Name(value.name().to_string())
        } else {
            EnumConstant::Ordinal(value.ordinal())
        };
        Self {
            type_name: E::TYPE_NAME.to_string(),
            constant,
        }
    }

    /// Convert back into a typed enum constant
    ///
    /// Either constant form is accepted regardless of `E::BY_NAME`.
    pub fn to_enum<E: GravEnum>(&self) -> Result<E> {
        if self.type_name != E::TYPE_NAME {
            return Err(Error::type_error(E::TYPE_NAME, self.type_name.clone()));
        }
        let found = match &self.constant {
            EnumConstant::Ordinal(ordinal) => E::from_ordinal(*ordinal),
            EnumConstant::Name(name) => E::from_name(name),
        };
        found.ok_or_else(|| Error::UnknownEnumConstant {
            type_name: self.type_name.clone(),
            constant: self.constant.to_string(),
        })
    }
}

impl fmt::Display for EnumConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumConstant::Ordinal(ordinal) => write!(f, "#{}", ordinal),
            EnumConstant::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Shared handle to a registered object
///
/// Equality compares the concrete objects when both sides have the same
/// type.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn DynObject>);

impl ObjectRef {
    /// Wrap an object in a new shared handle
    pub fn new<T: GravObject>(object: T) -> Self {
        Self(Arc::new(object))
    }

    /// Registered type name of the wrapped object
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Borrow the wrapped object as `T`
    pub fn downcast_ref<T: GravObject>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Borrow the wrapped object without knowing its type
    pub fn as_dyn(&self) -> &dyn DynObject {
        &*self.0
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name() && self.0.dyn_eq(other.as_dyn())
    }
}

impl Value {
    /// Wrap a registered object
    pub fn object<T: GravObject>(object: T) -> Self {
        Value::Object(ObjectRef::new(object))
    }

    /// Wrap a typed enum constant
    pub fn from_enum<E: GravEnum>(value: &E) -> Self {
        Value::Enum(EnumValue::from_enum(value))
    }

    /// Raw byte array
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    /// A single key/value pair
    pub fn entry(key: impl Into<Value>, value: impl Into<Value>) -> Self {
        Value::Entry(Box::new((key.into(), value.into())))
    }

    /// Build a map from pairs, keeping their order
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get this value as a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an int; accepts byte, short and int
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Byte(b) => Some(*b as i32),
            Value::Short(s) => Some(*s as i32),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a long; accepts any integer variant
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            other => other.as_int().map(i64::from),
        }
    }

    /// Try to get this value as a float
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to get this value as a double; accepts floats and integers
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Float(f) => Some(*f as f64),
            other => other.as_long().map(|l| l as f64),
        }
    }

    /// Try to get this value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a char
    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    /// Try to get this value as a UUID
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get this value as a byte array
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get the elements of a list or an array
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Try to get this value as map entries, in wire order
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Try to get this value as an enum constant
    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Value::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Try to get this value as a registered object
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Borrow a wrapped object as `T`
    pub fn downcast_ref<T: GravObject>(&self) -> Option<&T> {
        self.as_object().and_then(ObjectRef::downcast_ref::<T>)
    }

    /// Convert an enum value into a typed constant
    pub fn to_enum<E: GravEnum>(&self) -> Result<E> {
        match self {
            Value::Enum(e) => e.to_enum(),
            other => Err(Error::type_error(E::TYPE_NAME, other.type_name())),
        }
    }

    /// Look up a map entry by key
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Get the type name of this value; objects report their registered name
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Byte(_) => "byte",
            Value::Double(_) => "double",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Uuid(_) => "uuid",
            Value::Map(_) => "map",
            Value::Entry(_) => "entry",
            Value::List(_) => "list",
            Value::Enum(_) => "enum",
            Value::Object(obj) => obj.type_name(),
            Value::IntArray(_) => "int_array",
            Value::Array(_) => "array",
            Value::Bool(_) => "bool",
            Value::Float(_) => "float",
            Value::Short(_) => "short",
            Value::Char(_) => "char",
        }
    }
}

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    write!(f, "[")?;
    for (i, v) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", v)?;
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Byte(b) => write!(f, "{}b", b),
            Value::Double(d) => write!(f, "{}", d),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}L", l),
            Value::Uuid(id) => write!(f, "{}", id),
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Entry(pair) => write!(f, "{} => {}", pair.0, pair.1),
            Value::List(items) | Value::Array(items) => write_seq(f, items.iter()),
            Value::Enum(e) => write!(f, "{}::{}", e.type_name, e.constant),
            Value::Object(obj) => write!(f, "{:?}", obj),
            Value::IntArray(ints) => write!(f, "{:?}", ints),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Float(fl) => write!(f, "{}f", fl),
            Value::Short(s) => write!(f, "{}s", s),
            Value::Char(c) => write!(f, "'{}'", c),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )+
    };
}

value_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    char => Char,
    String => String,
    Uuid => Uuid,
    EnumValue => Enum,
    ObjectRef => Object,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(vec: Vec<T>) -> Self {
        Value::List(vec.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Meta;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Tier {
        Bronze,
        Silver,
    }
    crate::grav_enum!(Tier, "test.Tier", [Bronze, Silver]);

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Mode {
        Fast,
        Slow,
    }
    crate::grav_enum!(Mode, "test.Mode", by_name = true, [Fast, Slow]);

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Byte(-3).as_int(), Some(-3));
        assert_eq!(Value::Short(300).as_long(), Some(300));
        assert_eq!(Value::Int(7).as_double(), Some(7.0));
        assert_eq!(Value::Long(1 << 40).as_int(), None);
        assert_eq!(Value::Float(1.5).as_double(), Some(1.5));
        assert_eq!(Value::String("x".into()).as_int(), None);
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(5i32), Value::Int(5));
        assert_eq!(Value::from(5i64), Value::Long(5));
        assert_eq!(Value::from('z'), Value::Char('z'));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(
            Value::from(vec!["a", "b"]),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_enum_by_ordinal() {
        let v = Value::from_enum(&Tier::Silver);
        let e = v.as_enum().unwrap();
        assert_eq!(e.constant, EnumConstant::Ordinal(1));
        assert_eq!(e.to_enum::<Tier>().unwrap(), Tier::Silver);
        assert_eq!(v.to_enum::<Tier>().unwrap(), Tier::Silver);
        assert!(Value::Int(1).to_enum::<Tier>().is_err());
    }

    #[test]
    fn test_enum_by_name() {
        let v = EnumValue::from_enum(&Mode::Slow);
        assert_eq!(v.constant, EnumConstant::Name("Slow".into()));
        assert_eq!(v.to_enum::<Mode>().unwrap(), Mode::Slow);
    }

    #[test]
    fn test_enum_errors() {
        let wrong_type = EnumValue::from_enum(&Mode::Fast);
        assert!(matches!(
            wrong_type.to_enum::<Tier>(),
            Err(Error::TypeError { .. })
        ));

        let unknown = EnumValue {
            type_name: "test.Tier".into(),
            constant: EnumConstant::Ordinal(9),
        };
        assert!(matches!(
            unknown.to_enum::<Tier>(),
            Err(Error::UnknownEnumConstant { .. })
        ));
    }

    #[test]
    fn test_object_equality_and_downcast() {
        let mut meta = Meta::new();
        meta.set("k", 1);
        let a = Value::object(meta.clone());
        let b = Value::object(meta);

        assert_eq!(a, b);
        assert_eq!(a.type_name(), "grav.Meta");
        assert!(a.downcast_ref::<Meta>().is_some());
        assert_ne!(a, Value::object(Meta::new()));
    }

    #[test]
    fn test_map_get() {
        let map = Value::map([(1, "one"), (2, "two")]);
        assert_eq!(map.map_get(&Value::Int(2)), Some(&Value::from("two")));
        assert_eq!(map.map_get(&Value::Int(3)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(Value::map([("a", 1i64)]).to_string(), "{\"a\": 1L}");
        assert_eq!(Value::from_enum(&Mode::Fast).to_string(), "test.Mode::Fast");
    }
}
