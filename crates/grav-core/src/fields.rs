//! Struct fields to and from [`Meta`] through serde
//!
//! Any `Serialize` struct can be captured as a meta of its fields and
//! rebuilt from one. Nested structs become nested metas.
//!
//! ```
//! use grav_core::fields;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Profile {
//!     name: String,
//!     level: i32,
//! }
//!
//! let profile = Profile { name: "ann".into(), level: 3 };
//! let meta = fields::to_meta(&profile).unwrap();
//! assert_eq!(meta.get_as::<i32>("level").unwrap(), Some(3));
//!
//! let back: Profile = fields::from_meta(&meta).unwrap();
//! assert_eq!(back, profile);
//! ```

use crate::error::{Error, Result};
use crate::json::json_kind;
use crate::meta::Meta;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as Json};
use tracing::warn;

/// Capture the fields of `value` as a meta
pub fn to_meta<T: Serialize + ?Sized>(value: &T) -> Result<Meta> {
    match serde_json::to_value(value)? {
        Json::Object(object) => Ok(Meta::from_json_object(&object)),
        other => Err(Error::type_error("struct or map", json_kind(&other))),
    }
}

/// Build a `T` from the fields in `meta`
pub fn from_meta<T: DeserializeOwned>(meta: &Meta) -> Result<T> {
    Ok(serde_json::from_value(meta.to_json_value()?)?)
}

/// Overwrite the fields of `target` that appear in `meta`
///
/// Nested metas are merged into nested structs and maps key by key, so
/// a map field gains the keys it didn't have. Top-level keys with no
/// matching field are logged and skipped.
pub fn update_from_meta<T: Serialize + DeserializeOwned>(target: &mut T, meta: &Meta) -> Result<()> {
    let mut current = match serde_json::to_value(&*target)? {
        Json::Object(object) => object,
        other => return Err(Error::type_error("struct or map", json_kind(&other))),
    };
    let patch = match meta.to_json_value()? {
        Json::Object(object) => object,
        other => return Err(Error::type_error("object", json_kind(&other))),
    };
    merge_fields(&mut current, patch, "");
    *target = serde_json::from_value(Json::Object(current))?;
    Ok(())
}

fn merge_fields(current: &mut JsonMap<String, Json>, patch: JsonMap<String, Json>, path: &str) {
    for (key, value) in patch {
        let field = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        match (current.get_mut(&key), value) {
            (None, _) if path.is_empty() => warn!(field = %field, "no such field, skipping"),
            (None, value) => {
                current.insert(key, value);
            }
            (Some(Json::Object(existing)), Json::Object(nested)) => {
                merge_fields(existing, nested, &field)
            }
            (Some(slot), value) => *slot = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GravSerializer;
    use crate::value::Value;
    use serde::Deserialize;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Inner {
        name: String,
        id: Uuid,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Outer {
        name: String,
        other: Inner,
        scores: HashMap<String, i64>,
        tags: Vec<String>,
        nickname: Option<String>,
    }

    fn sample() -> Outer {
        Outer {
            name: "firstA".into(),
            other: Inner {
                name: "firstB".into(),
                id: Uuid::new_v4(),
            },
            scores: HashMap::from([("wins".to_string(), 19)]),
            tags: vec!["x".into(), "y".into()],
            nickname: None,
        }
    }

    #[test]
    fn test_nested_struct_becomes_nested_meta() {
        let meta = to_meta(&sample()).unwrap();
        let inner = meta.get_meta("other").unwrap();
        assert_eq!(inner.get_as::<String>("name").unwrap(), Some("firstB".into()));
        assert_eq!(meta.get("nickname"), Some(&Value::Null));
    }

    #[test]
    fn test_struct_survives_binary_roundtrip() {
        let original = sample();
        let meta = to_meta(&original).unwrap();

        let mut ser = GravSerializer::new();
        ser.write_object(&Value::object(meta)).unwrap();
        let decoded = ser.read_object(&[]).unwrap();
        let decoded = decoded.downcast_ref::<Meta>().unwrap();

        let back: Outer = from_meta(decoded).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_update_from_meta_merges() {
        let mut target = sample();
        let id = target.other.id;

        let mut inner = Meta::new();
        inner.set("name", "renamed");
        let mut patch = Meta::new();
        patch.set("other", inner);
        patch.set("nickname", "ace");
        patch.set("unknown_field", 1);

        update_from_meta(&mut target, &patch).unwrap();
        assert_eq!(target.other.name, "renamed");
        assert_eq!(target.other.id, id);
        assert_eq!(target.nickname.as_deref(), Some("ace"));
        assert_eq!(target.name, "firstA");
    }

    #[test]
    fn test_update_adds_map_keys() {
        let mut target = sample();
        let mut scores = Meta::new();
        scores.set("losses", 3i64);
        let mut patch = Meta::new();
        patch.set("scores", scores);

        update_from_meta(&mut target, &patch).unwrap();
        assert_eq!(target.scores.get("losses"), Some(&3));
        assert_eq!(target.scores.get("wins"), Some(&19));
    }

    #[test]
    fn test_skipped_fields_are_left_out() {
        #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
        struct Session {
            user: String,
            #[serde(skip)]
            token: String,
        }

        let session = Session {
            user: "ann".into(),
            token: "secret".into(),
        };
        let meta = to_meta(&session).unwrap();
        assert!(meta.contains_key("user"));
        assert!(!meta.contains_key("token"));
        assert_eq!(meta.len(), 1);

        let back: Session = from_meta(&meta).unwrap();
        assert_eq!(back.user, "ann");
        assert_eq!(back.token, "");
    }

    #[test]
    fn test_update_with_wrong_type_fails() {
        let mut target = sample();
        let mut patch = Meta::new();
        patch.set("tags", 5);
        assert!(update_from_meta(&mut target, &patch).is_err());
    }

    #[test]
    fn test_non_struct_rejected() {
        assert!(matches!(to_meta(&5), Err(Error::TypeError { .. })));
    }
}
