//! Flat string-keyed metadata
//!
//! Each entry is written inside its own nested buffer. An entry whose type
//! is not registered, or that needs construction arguments, therefore
//! doesn't break the rest of the meta: its raw bytes are kept and can be
//! decoded later with [`Meta::resolve`] or [`Meta::get_or_set`].

use crate::buffer::GravSerializer;
use crate::convert::FromValue;
use crate::error::{Error, Result};
use crate::json;
use crate::object::GravObject;
use crate::value::Value;
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as Json};
use tracing::debug;

/// Insertion-ordered map from string keys to values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    values: IndexMap<String, Value>,
    deferred: IndexMap<String, Vec<u8>>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: IndexMap<String, Value>) -> Self {
        Self {
            values,
            deferred: IndexMap::new(),
        }
    }

    /// Set a value, replacing any deferred entry under the same key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.deferred.shift_remove(&key);
        self.values.insert(key, value.into());
    }

    /// Get a decoded value; deferred entries are not visible here
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get and convert a value
    pub fn get_as<T: FromValue>(&self, key: &str) -> Result<Option<T>> {
        self.values.get(key).map(T::from_value).transpose()
    }

    /// Get a registered object by its concrete type
    pub fn get_object<T: GravObject + Clone>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(value) => value
                .downcast_ref::<T>()
                .cloned()
                .map(Some)
                .ok_or_else(|| Error::type_error(T::TYPE_NAME, value.type_name())),
        }
    }

    /// Get a nested meta, or build one from a map with string keys
    pub fn get_meta(&self, key: &str) -> Option<Meta> {
        match self.values.get(key)? {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Some((k.as_str()?.to_string(), v.clone())))
                .collect(),
            other => other.downcast_ref::<Meta>().cloned(),
        }
    }

    /// Decode a deferred entry with construction arguments
    ///
    /// Returns the value under `key` whether or not it had to be decoded.
    pub fn resolve(&mut self, key: &str, args: &[Value]) -> Result<Option<&Value>> {
        if let Some(raw) = self.deferred.get(key) {
            let value = GravSerializer::from_bytes(raw.clone()).read_object(args)?;
            self.deferred.shift_remove(key);
            self.values.insert(key.to_string(), value);
        }
        Ok(self.values.get(key))
    }

    /// Get a value, resolving it with `args` if deferred, or store `default`
    pub fn get_or_set(
        &mut self,
        key: &str,
        default: impl Into<Value>,
        args: &[Value],
    ) -> Result<&Value> {
        self.resolve(key, args)?;
        Ok(self
            .values
            .entry(key.to_string())
            .or_insert_with(|| default.into()))
    }

    /// Remove an entry, deferred or not
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.deferred.shift_remove(key);
        self.values.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.deferred.contains_key(key)
    }

    /// Whether `key` holds undecoded bytes
    pub fn is_deferred(&self, key: &str) -> bool {
        self.deferred.contains_key(key)
    }

    /// All keys, decoded ones first
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .chain(self.deferred.keys())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len() + self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.deferred.is_empty()
    }

    /// Decoded entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every entry of `other` into this meta
    pub fn set_all(&mut self, other: &Meta) {
        for (key, value) in &other.values {
            self.set(key.clone(), value.clone());
        }
        for (key, raw) in &other.deferred {
            self.values.shift_remove(key);
            self.deferred.insert(key.clone(), raw.clone());
        }
    }

    /// Undecoded entries as raw tagged bytes
    pub(crate) fn deferred_entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.deferred.iter().map(|(k, raw)| (k.as_str(), raw.as_slice()))
    }

    pub fn as_map(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Build a meta from a JSON object; nested objects become nested metas
    pub fn from_json_object(object: &JsonMap<String, Json>) -> Self {
        let values = object
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Json::Object(nested) => Value::object(Meta::from_json_object(nested)),
                    other => json::json_to_value(other),
                };
                (key.clone(), value)
            })
            .collect();
        Self::from_map(values)
    }

    /// Parse lenient JSON (comments allowed) into a meta
    pub fn from_json(input: &str) -> Result<Self> {
        match json::parse_lenient(input)? {
            Json::Object(object) => Ok(Self::from_json_object(&object)),
            other => Err(Error::type_error("object", json::json_kind(&other))),
        }
    }

    /// Convert to a JSON object; fails while entries are deferred
    pub fn to_json_value(&self) -> Result<Json> {
        if let Some(key) = self.deferred.keys().next() {
            return Err(Error::Unsupported(format!("entry '{key}' is not resolved")));
        }
        let mut object = JsonMap::with_capacity(self.values.len());
        for (key, value) in &self.values {
            object.insert(key.clone(), json::value_to_json(value)?);
        }
        Ok(Json::Object(object))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json_value()?)?)
    }
}

impl GravObject for Meta {
    const TYPE_NAME: &'static str = "grav.Meta";

    fn serialize(&self, out: &mut GravSerializer) -> Result<()> {
        out.write_len(self.len());
        for (key, value) in &self.values {
            let mut wrapper = GravSerializer::new();
            wrapper.write_object(value)?;
            out.write_string(key);
            out.write_serializer(&wrapper);
        }
        for (key, raw) in &self.deferred {
            out.write_string(key);
            out.write_byte_array(raw);
        }
        Ok(())
    }

    fn deserialize(input: &mut GravSerializer, args: &[Value]) -> Result<Self> {
        let count = input.read_len()?;
        // key length plus wrapper length
        input.ensure_remaining(count.saturating_mul(8))?;

        let mut meta = Meta::new();
        for _ in 0..count {
            let key = input.read_string()?;
            let mut wrapper = input.read_serializer()?;
            // a repeated key keeps only its last occurrence
            match wrapper.read_object(args) {
                Ok(value) => {
                    meta.deferred.shift_remove(&key);
                    meta.values.insert(key, value);
                }
                Err(err) if err.is_deferrable() => {
                    debug!(key = %key, error = %err, "deferring meta entry");
                    meta.values.shift_remove(&key);
                    meta.deferred.insert(key, wrapper.into_bytes());
                }
                Err(err) => return Err(err),
            }
        }
        Ok(meta)
    }
}

impl From<Meta> for Value {
    fn from(meta: Meta) -> Self {
        Value::object(meta)
    }
}

impl FromIterator<(String, Value)> for Meta {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{register, MetaSerializable};
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq)]
    struct Badge {
        title: String,
        holder: Uuid,
    }

    impl MetaSerializable for Badge {
        fn to_meta(&self) -> Meta {
            let mut meta = Meta::new();
            meta.set("title", self.title.as_str());
            meta
        }

        fn from_meta(meta: Meta, args: &[Value]) -> Result<Self> {
            let holder = args
                .first()
                .and_then(Value::as_uuid)
                .ok_or_else(|| Error::missing_arguments("test.Badge", "holder id"))?;
            Ok(Badge {
                title: meta.get_as("title")?.unwrap_or_default(),
                holder,
            })
        }
    }
    crate::meta_object!(Badge, "test.Badge");

    fn encode(meta: &Meta) -> GravSerializer {
        let mut ser = GravSerializer::new();
        ser.write_object(&Value::object(meta.clone())).unwrap();
        ser
    }

    #[test]
    fn test_set_get_typed() {
        let mut meta = Meta::new();
        meta.set("count", 3);
        meta.set("name", "ore");

        assert_eq!(meta.get_as::<i32>("count").unwrap(), Some(3));
        assert_eq!(meta.get_as::<String>("name").unwrap(), Some("ore".into()));
        assert_eq!(meta.get_as::<i32>("missing").unwrap(), None);
        assert!(meta.get_as::<i32>("name").is_err());
    }

    #[test]
    fn test_roundtrip_preserves_order() {
        let mut meta = Meta::new();
        meta.set("z", 1);
        meta.set("a", vec![Value::from("x")]);
        meta.set("m", Value::Null);

        let back = encode(&meta).read_object(&[]).unwrap();
        let back = back.downcast_ref::<Meta>().unwrap();
        assert_eq!(back, &meta);
        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_nested_meta() {
        let mut inner = Meta::new();
        inner.set("hp", 20);
        let mut outer = Meta::new();
        outer.set("stats", inner.clone());

        assert_eq!(outer.get_meta("stats"), Some(inner.clone()));
        assert!(outer.get_object::<Meta>("stats").unwrap().is_some());
        assert!(outer.get_meta("missing").is_none());

        outer.set("as_map", Value::map([("hp", 20)]));
        assert_eq!(outer.get_meta("as_map"), Some(inner));
        outer.set("int_keys", Value::map([(1, 20)]));
        assert!(outer.get_meta("int_keys").is_none());
    }

    #[test]
    fn test_get_object_wrong_type() {
        let mut meta = Meta::new();
        meta.set("n", 1);
        assert!(matches!(
            meta.get_object::<Meta>("n"),
            Err(Error::TypeError { .. })
        ));
    }

    #[test]
    fn test_unknown_entry_is_deferred() {
        let mut inner = GravSerializer::new();
        inner.write_u8(crate::codec::tag::OBJECT);
        inner.write_string("test.Unregistered");
        inner.write_i32(7);

        let mut ser = GravSerializer::new();
        ser.write_i32(2);
        ser.write_string("ok");
        let mut ok = GravSerializer::new();
        ok.write_object(&Value::Int(1)).unwrap();
        ser.write_serializer(&ok);
        ser.write_string("later");
        ser.write_serializer(&inner);

        let mut meta = Meta::deserialize(&mut ser, &[]).unwrap();
        assert_eq!(meta.get("ok"), Some(&Value::Int(1)));
        assert!(meta.is_deferred("later"));
        assert!(meta.get("later").is_none());
        assert_eq!(meta.len(), 2);

        // still unknown, so resolving fails and the bytes stay
        assert!(meta.resolve("later", &[]).is_err());
        assert!(meta.is_deferred("later"));

        // deferred bytes are written back unchanged
        let mut again = GravSerializer::new();
        meta.serialize(&mut again).unwrap();
        let copy = Meta::deserialize(&mut again, &[]).unwrap();
        assert_eq!(copy, meta);
    }

    #[test]
    fn test_repeated_key_counts_once() {
        let mut unknown = GravSerializer::new();
        unknown.write_u8(crate::codec::tag::OBJECT);
        unknown.write_string("test.Unregistered");
        let mut known = GravSerializer::new();
        known.write_object(&Value::Int(1)).unwrap();

        let mut ser = GravSerializer::new();
        ser.write_i32(3);
        for wrapper in [&known, &unknown, &known] {
            ser.write_string("k");
            ser.write_serializer(wrapper);
        }

        let meta = Meta::deserialize(&mut ser, &[]).unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.get("k"), Some(&Value::Int(1)));
        assert!(!meta.is_deferred("k"));

        let mut ser = GravSerializer::new();
        ser.write_i32(2);
        for wrapper in [&known, &unknown] {
            ser.write_string("k");
            ser.write_serializer(wrapper);
        }
        let meta = Meta::deserialize(&mut ser, &[]).unwrap();
        assert_eq!(meta.len(), 1);
        assert!(meta.is_deferred("k"));
        assert!(meta.get("k").is_none());
    }

    #[test]
    fn test_object_needing_arguments_is_resolved_later() {
        register::<Badge>();
        let holder = Uuid::new_v4();
        let badge = Badge {
            title: "veteran".into(),
            holder,
        };

        let mut meta = Meta::new();
        meta.set("badge", Value::object(badge.clone()));
        meta.set("level", 4);

        let decoded = encode(&meta).read_object(&[]).unwrap();
        let mut decoded = decoded.downcast_ref::<Meta>().unwrap().clone();
        assert!(decoded.is_deferred("badge"));
        assert_eq!(decoded.get_as::<i32>("level").unwrap(), Some(4));

        let resolved = decoded
            .get_or_set("badge", Value::Null, &[Value::Uuid(holder)])
            .unwrap();
        assert_eq!(resolved.downcast_ref::<Badge>(), Some(&badge));
        assert!(!decoded.is_deferred("badge"));
    }

    #[test]
    fn test_arguments_pass_through_meta() {
        register::<Badge>();
        let holder = Uuid::new_v4();
        let mut meta = Meta::new();
        meta.set(
            "badge",
            Value::object(Badge {
                title: "t".into(),
                holder,
            }),
        );

        let decoded = encode(&meta).read_object(&[Value::Uuid(holder)]).unwrap();
        let decoded = decoded.downcast_ref::<Meta>().unwrap();
        assert!(!decoded.is_deferred("badge"));
        assert_eq!(
            decoded.get_object::<Badge>("badge").unwrap().map(|b| b.holder),
            Some(holder)
        );
    }

    #[test]
    fn test_get_or_set_default() {
        let mut meta = Meta::new();
        assert_eq!(meta.get_or_set("x", 5, &[]).unwrap(), &Value::Int(5));
        assert_eq!(meta.get_or_set("x", 6, &[]).unwrap(), &Value::Int(5));
    }

    #[test]
    fn test_set_replaces_deferred_and_remove() {
        let mut raw = Meta::new();
        raw.deferred.insert("k".into(), vec![0]);
        raw.set("k", true);
        assert!(!raw.is_deferred("k"));
        assert_eq!(raw.remove("k"), Some(Value::Bool(true)));
        assert!(!raw.contains_key("k"));
    }

    #[test]
    fn test_set_all() {
        let mut a = Meta::new();
        a.set("x", 1);
        let mut b = Meta::new();
        b.set("x", 2);
        b.set("y", 3);

        a.set_all(&b);
        assert_eq!(a.get_as::<i32>("x").unwrap(), Some(2));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_json() {
        let meta = Meta::from_json(
            r#"{
                // comment
                "name": "ore", "count": 3, "nested": { "deep": true }
            }"#,
        )
        .unwrap();
        assert_eq!(meta.get_as::<i32>("count").unwrap(), Some(3));
        assert_eq!(
            meta.get_meta("nested").and_then(|m| m.get_as::<bool>("deep").ok().flatten()),
            Some(true)
        );
        assert_eq!(
            meta.to_json().unwrap(),
            r#"{"name":"ore","count":3,"nested":{"deep":true}}"#
        );
        assert!(Meta::from_json("[1, 2]").is_err());
    }
}
