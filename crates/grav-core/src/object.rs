//! Object types, enums and the type registry
//!
//! A type that implements [`GravObject`] can travel inside a [`Value`] as
//! [`Value::Object`]. On the wire it is written as its `TYPE_NAME`
//! followed by whatever [`GravObject::serialize`] emits. Reading it back
//! requires the type to be [`register`]ed, so the decoder can find the
//! matching deserializer by name.
//!
//! # Example
//!
//! ```
//! use grav_core::{register, GravObject, GravSerializer, Result, Value};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl GravObject for Point {
//!     const TYPE_NAME: &'static str = "demo.Point";
//!
//!     fn serialize(&self, out: &mut GravSerializer) -> Result<()> {
//!         out.write_i32(self.x);
//!         out.write_i32(self.y);
//!         Ok(())
//!     }
//!
//!     fn deserialize(input: &mut GravSerializer, _args: &[Value]) -> Result<Self> {
//!         Ok(Point { x: input.read_i32()?, y: input.read_i32()? })
//!     }
//! }
//!
//! register::<Point>();
//!
//! let mut ser = GravSerializer::new();
//! ser.write_object(&Value::object(Point { x: 3, y: 4 })).unwrap();
//! let back = ser.read_object(&[]).unwrap();
//! assert_eq!(back.downcast_ref::<Point>(), Some(&Point { x: 3, y: 4 }));
//! ```

use crate::buffer::GravSerializer;
use crate::error::{Error, Result};
use crate::json_meta::JsonMeta;
use crate::meta::Meta;
use crate::value::{ObjectRef, Value};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

/// A type that can be written as a tagged object
pub trait GravObject: Any + Send + Sync + fmt::Debug + PartialEq + Sized {
    /// Unique name written before the payload
    const TYPE_NAME: &'static str;

    /// Write the payload
    fn serialize(&self, out: &mut GravSerializer) -> Result<()>;

    /// Read the payload written by [`serialize`](Self::serialize)
    ///
    /// `args` are the construction arguments given to
    /// [`GravSerializer::read_object`]. Types that cannot be built without
    /// them should return [`Error::MissingArguments`], which lets metadata
    /// containers defer the entry.
    fn deserialize(input: &mut GravSerializer, args: &[Value]) -> Result<Self>;
}

/// Object-safe view of a [`GravObject`]
pub trait DynObject: Send + Sync + fmt::Debug {
    /// The [`GravObject::TYPE_NAME`] of the concrete type
    fn type_name(&self) -> &'static str;

    /// Write the payload without its tag and type name
    fn serialize_payload(&self, out: &mut GravSerializer) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    /// Equal when `other` has the same concrete type and compares equal
    fn dyn_eq(&self, other: &dyn DynObject) -> bool;
}

impl<T: GravObject> DynObject for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn serialize_payload(&self, out: &mut GravSerializer) -> Result<()> {
        self.serialize(out)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// An enum written as its type name plus an ordinal or a constant name
///
/// Usually implemented with [`grav_enum!`](crate::grav_enum).
pub trait GravEnum: Sized {
    const TYPE_NAME: &'static str;

    /// Write the constant name instead of the ordinal
    const BY_NAME: bool = false;

    /// Position of the constant in declaration order
    fn ordinal(&self) -> i32;

    /// Constant name as written on the wire
    fn name(&self) -> &'static str;

    fn from_ordinal(ordinal: i32) -> Option<Self>;

    fn from_name(name: &str) -> Option<Self>;
}

/// A type that converts to and from a [`Meta`]
///
/// Pair it with [`meta_object!`](crate::meta_object) to make it a
/// [`GravObject`] whose payload is the meta.
pub trait MetaSerializable: Sized {
    /// Capture this value as a meta
    fn to_meta(&self) -> Meta;

    /// Rebuild a value; `args` are the caller's construction arguments
    fn from_meta(meta: Meta, args: &[Value]) -> Result<Self>;
}

/// A type that converts to and from a [`JsonMeta`]
///
/// Pair it with [`json_meta_object!`](crate::json_meta_object).
pub trait JsonMetaSerializable: Sized {
    /// Capture this value as a tree
    fn to_json_meta(&self) -> JsonMeta;

    /// Rebuild a value; `args` are the caller's construction arguments
    fn from_json_meta(meta: JsonMeta, args: &[Value]) -> Result<Self>;
}

type DeserializeFn = fn(&mut GravSerializer, &[Value]) -> Result<ObjectRef>;

fn deserialize_erased<T: GravObject>(input: &mut GravSerializer, args: &[Value]) -> Result<ObjectRef> {
    T::deserialize(input, args).map(ObjectRef::new)
}

/// Mapping from type names to deserializers
#[derive(Default)]
pub struct Registry {
    deserializers: HashMap<&'static str, DeserializeFn>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that knows the built-in metadata types
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register::<Meta>();
        registry.register::<JsonMeta>();
        registry
    }

    /// Register `T`; returns false if its name was already taken
    pub fn register<T: GravObject>(&mut self) -> bool {
        if self.deserializers.contains_key(T::TYPE_NAME) {
            return false;
        }
        self.deserializers
            .insert(T::TYPE_NAME, deserialize_erased::<T>);
        true
    }

    /// Whether a deserializer is registered under `type_name`
    pub fn contains(&self, type_name: &str) -> bool {
        self.deserializers.contains_key(type_name)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.deserializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deserializers.is_empty()
    }

    /// Registered type names, in no particular order
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.deserializers.keys().copied()
    }

    /// Decode one payload of the named type
    pub fn deserialize(
        &self,
        type_name: &str,
        input: &mut GravSerializer,
        args: &[Value],
    ) -> Result<ObjectRef> {
        let deserialize = self
            .deserializers
            .get(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
        deserialize(input, args)
    }

    fn lookup(&self, type_name: &str) -> Option<DeserializeFn> {
        self.deserializers.get(type_name).copied()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.type_names().collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("types", &names).finish()
    }
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::with_builtins()));

/// Register `T` with the process-wide registry
///
/// Registering the same type twice is harmless; the second call returns
/// false.
pub fn register<T: GravObject>() -> bool {
    let added = REGISTRY.write().register::<T>();
    if added {
        debug!(type_name = T::TYPE_NAME, "registered object type");
    }
    added
}

/// Whether a type name is known to the process-wide registry
pub fn is_registered(type_name: &str) -> bool {
    REGISTRY.read().contains(type_name)
}

/// Decode a payload through the process-wide registry
///
/// The lock is released before the deserializer runs, so nested objects
/// can be decoded.
pub(crate) fn deserialize_registered(
    type_name: &str,
    input: &mut GravSerializer,
    args: &[Value],
) -> Result<ObjectRef> {
    let deserialize = REGISTRY
        .read()
        .lookup(type_name)
        .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
    deserialize(input, args)
}
