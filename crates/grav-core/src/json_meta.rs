//! Hierarchical metadata with path access and change tracking
//!
//! A [`JsonMeta`] is a tree of string-keyed nodes. Paths such as
//! `"stats.hp"` address nested levels using the tree's delimiter.
//!
//! # Change tracking
//!
//! Each level owns an [`UpdateRecord`] of the keys changed directly on it.
//! A level counts as dirty when its record is non-empty or any child level
//! is dirty, so marking a deep key makes every ancestor report the
//! containing child in [`updated_fields`](JsonMeta::updated_fields).
//! [`reduce`](JsonMeta::reduce) cuts the tree down to the changed parts and
//! [`put_all`](JsonMeta::put_all) merges such a delta into another tree.
//!
//! ```
//! use grav_core::JsonMeta;
//!
//! let mut state = JsonMeta::tracked();
//! state.set("stats.hp", 20);
//! state.set("name", "knight");
//! state.clear_record();
//!
//! state.set("stats.hp", 15);
//! let delta = state.reduce();
//! assert_eq!(delta.get_as::<i32>("stats.hp").unwrap(), Some(15));
//! assert!(delta.get("name").is_none());
//! ```

use crate::buffer::GravSerializer;
use crate::config::{Config, DEFAULT_DELIMITER};
use crate::convert::FromValue;
use crate::error::{Error, Result};
use crate::json;
use crate::meta::Meta;
use crate::object::GravObject;
use crate::record::UpdateRecord;
use crate::value::Value;
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as Json};
use std::fmt;
use tracing::debug;

const KIND_META: u8 = 0;
const KIND_VALUE: u8 = 1;

/// One entry of a [`JsonMeta`] level
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Nested level
    Meta(JsonMeta),
    Value(Value),
    /// Raw bytes of a value that could not be decoded yet
    Deferred(Vec<u8>),
}

impl Node {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Node::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_meta(&self) -> Option<&JsonMeta> {
        match self {
            Node::Meta(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_meta_mut(&mut self) -> Option<&mut JsonMeta> {
        match self {
            Node::Meta(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Node::Deferred(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Meta(_) => "meta",
            Node::Value(v) => v.type_name(),
            Node::Deferred(_) => "deferred",
        }
    }

    /// Turn this node into an empty level unless it already is one
    fn make_meta(&mut self, delimiter: &str, tracked: bool) -> &mut JsonMeta {
        if !matches!(self, Node::Meta(_)) {
            *self = Node::Meta(JsonMeta::level(delimiter, tracked));
        }
        match self {
            Node::Meta(meta) => meta,
            _ => unreachable!("node was just replaced with a level"),
        }
    }

    fn is_dirty(&self) -> bool {
        matches!(self, Node::Meta(m) if m.is_dirty())
    }
}

/// Metas, JSON metas and string-keyed maps become nested levels
impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(obj) => {
                if let Some(meta) = obj.downcast_ref::<JsonMeta>() {
                    Node::Meta(meta.clone())
                } else if let Some(meta) = obj.downcast_ref::<Meta>() {
                    Node::Meta(JsonMeta::from_meta(meta))
                } else {
                    Node::Value(Value::Object(obj))
                }
            }
            Value::Map(entries) if entries.iter().all(|(k, _)| k.as_str().is_some()) => {
                let mut level = JsonMeta::new();
                for (k, v) in entries {
                    if let Value::String(key) = k {
                        level.data.insert(key, Node::from(v));
                    }
                }
                Node::Meta(level)
            }
            other => Node::Value(other),
        }
    }
}

/// Tree of string-keyed nodes addressed by delimited paths
#[derive(Debug, Clone)]
pub struct JsonMeta {
    data: IndexMap<String, Node>,
    delimiter: String,
    mark_dirty_by_default: bool,
    record: UpdateRecord,
}

impl JsonMeta {
    /// Create an untracked tree with the default delimiter
    pub fn new() -> Self {
        Self::level(DEFAULT_DELIMITER, false)
    }

    /// Create a tree that records every change by default
    pub fn tracked() -> Self {
        Self::level(DEFAULT_DELIMITER, true)
    }

    /// Create a tree using a config's delimiter and tracking default
    pub fn with_config(config: &Config) -> Self {
        Self::level(&config.delimiter, config.track_changes)
    }

    pub fn with_delimiter(delimiter: impl Into<String>) -> Self {
        let mut meta = Self::new();
        meta.delimiter = delimiter.into();
        meta
    }

    fn level(delimiter: &str, tracked: bool) -> Self {
        Self {
            data: IndexMap::new(),
            delimiter: delimiter.to_string(),
            mark_dirty_by_default: tracked,
            record: UpdateRecord::new(),
        }
    }

    /// Copy a flat meta; nested metas become nested levels and deferred
    /// entries stay deferred
    pub fn from_meta(meta: &Meta) -> Self {
        let mut level = Self::new();
        for (key, value) in meta.iter() {
            level.data.insert(key.to_string(), Node::from(value.clone()));
        }
        for (key, raw) in meta.deferred_entries() {
            level.data.insert(key.to_string(), Node::Deferred(raw.to_vec()));
        }
        level
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn is_mark_dirty_by_default(&self) -> bool {
        self.mark_dirty_by_default
    }

    /// Change the tracking default for this level and every level below
    pub fn set_mark_dirty_by_default(&mut self, tracked: bool) {
        self.mark_dirty_by_default = tracked;
        for node in self.data.values_mut() {
            if let Node::Meta(child) = node {
                child.set_mark_dirty_by_default(tracked);
            }
        }
    }

    /// Apply a delimiter and tracking default to this level and every level below
    fn adopt(&mut self, delimiter: &str, tracked: bool) {
        if self.delimiter != delimiter {
            self.delimiter = delimiter.to_string();
        }
        self.mark_dirty_by_default = tracked;
        for node in self.data.values_mut() {
            if let Node::Meta(child) = node {
                child.adopt(delimiter, tracked);
            }
        }
    }

    fn segments<'p>(&self, path: &'p str) -> Vec<&'p str> {
        if self.delimiter.is_empty() {
            return vec![path];
        }
        path.split(self.delimiter.as_str()).collect()
    }

    fn level_at(&self, segments: &[&str]) -> Option<&JsonMeta> {
        let mut current = self;
        for segment in segments {
            current = current.data.get(*segment)?.as_meta()?;
        }
        Some(current)
    }

    fn level_at_mut(&mut self, segments: &[&str]) -> Option<&mut JsonMeta> {
        let mut current = self;
        for segment in segments {
            current = current.data.get_mut(*segment)?.as_meta_mut()?;
        }
        Some(current)
    }

    /// Walk down `segments`, creating or replacing levels on the way
    fn level_at_or_create(&mut self, segments: &[&str]) -> &mut JsonMeta {
        let mut current = self;
        for segment in segments {
            let delimiter = current.delimiter.clone();
            let tracked = current.mark_dirty_by_default;
            current = current
                .data
                .entry(segment.to_string())
                .or_insert_with(|| Node::Meta(JsonMeta::level(&delimiter, tracked)))
                .make_meta(&delimiter, tracked);
        }
        current
    }

    /// Node at `path`, if every level on the way exists
    pub fn get_node(&self, path: &str) -> Option<&Node> {
        let segments = self.segments(path);
        let (last, parents) = segments.split_last()?;
        self.level_at(parents)?.data.get(*last)
    }

    /// Value at `path`; nested levels and deferred entries are not values
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.get_node(path)?.as_value()
    }

    /// Get and convert the node at `path`
    ///
    /// A nested level converts as a string-keyed map.
    pub fn get_as<T: FromValue>(&self, path: &str) -> Result<Option<T>> {
        match self.get_node(path) {
            None => Ok(None),
            Some(Node::Value(v)) => T::from_value(v).map(Some),
            Some(Node::Meta(level)) => T::from_value(&level.to_map_value()).map(Some),
            Some(Node::Deferred(_)) => Err(Error::type_error("value", "deferred")),
        }
    }

    /// Get a registered object by its concrete type
    pub fn get_object<T: GravObject + Clone>(&self, path: &str) -> Result<Option<T>> {
        match self.get_node(path) {
            None => Ok(None),
            Some(node) => node
                .as_value()
                .and_then(Value::downcast_ref::<T>)
                .cloned()
                .map(Some)
                .ok_or_else(|| Error::type_error(T::TYPE_NAME, node.type_name())),
        }
    }

    /// Nested level at `path`
    pub fn get_meta(&self, path: &str) -> Option<&JsonMeta> {
        self.get_node(path)?.as_meta()
    }

    /// Mutable nested level at `path`; changes made through it are tracked
    pub fn get_meta_mut(&mut self, path: &str) -> Option<&mut JsonMeta> {
        let segments = self.segments(path);
        self.level_at_mut(&segments)
    }

    /// Node at `path` as a map of pairs
    pub fn get_map(&self, path: &str) -> Option<Vec<(Value, Value)>> {
        match self.get_node(path)? {
            Node::Meta(level) => match level.to_map_value() {
                Value::Map(entries) => Some(entries),
                _ => None,
            },
            Node::Value(Value::Map(entries)) => Some(entries.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get_node(path).is_some()
    }

    /// Set `path`, creating intermediate levels; tracked per the default
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let mark = self.mark_dirty_by_default;
        self.set_with(path, value, mark);
    }

    /// Set `path` and choose whether the change is recorded
    ///
    /// Intermediate nodes that are not levels are replaced. A nested meta
    /// stored with marking enabled has its own record rebuilt: if it
    /// replaces an existing level only the differing keys are marked,
    /// otherwise every key is.
    pub fn set_with(&mut self, path: &str, value: impl Into<Value>, mark_dirty: bool) {
        let segments = self.segments(path);
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let level = self.level_at_or_create(parents);
        level.insert_leaf(last, Node::from(value.into()), mark_dirty);
    }

    /// Store a node on this level and return its index
    fn insert_leaf(&mut self, key: &str, mut node: Node, mark_dirty: bool) -> usize {
        if let Node::Meta(child) = &mut node {
            child.adopt(&self.delimiter, self.mark_dirty_by_default);
        }
        if mark_dirty {
            self.record.mark_dirty(key);
            if let Node::Meta(child) = &mut node {
                child.clear_record();
                match self.data.get(key) {
                    Some(Node::Meta(previous)) => child.mark_dirty_diff(previous),
                    _ => child.mark_dirty_recursive(),
                }
            }
        }
        self.data.insert_full(key.to_string(), node).0
    }

    fn mark_dirty_recursive(&mut self) {
        for (key, node) in self.data.iter_mut() {
            self.record.mark_dirty(key);
            if let Node::Meta(child) = node {
                child.mark_dirty_recursive();
            }
        }
    }

    fn mark_dirty_diff(&mut self, previous: &JsonMeta) {
        for (key, node) in self.data.iter_mut() {
            match (node, previous.data.get(key)) {
                (Node::Meta(child), Some(Node::Meta(old))) => child.mark_dirty_diff(old),
                (Node::Meta(child), _) => {
                    self.record.mark_dirty(key);
                    child.mark_dirty_recursive();
                }
                (node, Some(old)) if &*node == old => {}
                _ => {
                    self.record.mark_dirty(key);
                }
            }
        }
        for key in previous.data.keys() {
            if !self.data.contains_key(key) {
                self.record.mark_dirty(key);
            }
        }
    }

    /// Node at `path`, storing `default` first if absent
    pub fn get_or_set(&mut self, path: &str, default: impl Into<Value>) -> &Node {
        let segments = self.segments(path);
        let node = Node::from(default.into());
        self.entry_node(&segments, node)
    }

    /// Like [`get_or_set`](Self::get_or_set), but resolves a deferred entry
    /// with `args` first
    pub fn get_or_set_with(
        &mut self,
        path: &str,
        default: impl Into<Value>,
        args: &[Value],
    ) -> Result<&Node> {
        self.resolve(path, args)?;
        Ok(self.get_or_set(path, default))
    }

    /// Nested level at `path`, created if absent
    ///
    /// Fails with a type error if a value is stored there.
    pub fn get_or_insert_meta(&mut self, path: &str) -> Result<&mut JsonMeta> {
        let segments = self.segments(path);
        let empty = Node::Meta(JsonMeta::level(&self.delimiter, self.mark_dirty_by_default));
        match self.entry_node(&segments, empty) {
            Node::Meta(level) => Ok(level),
            other => Err(Error::type_error("meta", other.type_name())),
        }
    }

    fn entry_node(&mut self, segments: &[&str], default: Node) -> &mut Node {
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => (&"", segments),
        };
        let level = self.level_at_or_create(parents);
        let index = match level.data.get_index_of(*last) {
            Some(index) => index,
            None => {
                let mark = level.mark_dirty_by_default;
                level.insert_leaf(last, default, mark)
            }
        };
        &mut level.data[index]
    }

    /// Decode a deferred entry at `path` with construction arguments
    pub fn resolve(&mut self, path: &str, args: &[Value]) -> Result<Option<&Value>> {
        let segments = self.segments(path);
        let Some((last, parents)) = segments.split_last() else {
            return Ok(None);
        };
        let Some(level) = self.level_at_mut(parents) else {
            return Ok(None);
        };

        let raw = match level.data.get(*last) {
            Some(Node::Deferred(raw)) => Some(raw.clone()),
            _ => None,
        };
        if let Some(raw) = raw {
            let value = GravSerializer::from_bytes(raw).read_object(args)?;
            level.data.insert(last.to_string(), Node::Value(value));
        }
        Ok(level.data.get(*last).and_then(Node::as_value))
    }

    /// Remove the node at `path`; recorded if tracking is on
    pub fn remove(&mut self, path: &str) -> Option<Node> {
        let segments = self.segments(path);
        let (last, parents) = segments.split_last()?;
        let level = self.level_at_mut(parents)?;
        let removed = level.data.shift_remove(*last)?;
        if level.mark_dirty_by_default {
            level.record.mark_dirty(last);
        }
        Some(removed)
    }

    /// Merge `other` into this tree
    ///
    /// Levels present on both sides are merged key by key; anything else
    /// from `other` replaces what is here.
    pub fn put_all(&mut self, other: &JsonMeta) {
        for (key, node) in &other.data {
            if let (Some(Node::Meta(current)), Node::Meta(incoming)) = (self.data.get_mut(key), node) {
                current.put_all(incoming);
                continue;
            }
            let mark = self.mark_dirty_by_default;
            self.insert_leaf(key, node.clone(), mark);
        }
    }

    /// Whether anything in this tree changed since the last clear
    pub fn is_dirty(&self) -> bool {
        !self.record.is_empty() || self.data.values().any(Node::is_dirty)
    }

    /// Keys changed on this level, followed by keys of dirty child levels
    pub fn updated_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.record.updated_fields().map(str::to_string).collect();
        for (key, node) in &self.data {
            if node.is_dirty() && !self.record.is_dirty(key) {
                fields.push(key.clone());
            }
        }
        fields
    }

    /// Change record of this level only
    pub fn record(&self) -> &UpdateRecord {
        &self.record
    }

    /// Forget all recorded changes in this tree
    pub fn clear_record(&mut self) {
        self.record.clear();
        for node in self.data.values_mut() {
            if let Node::Meta(child) = node {
                child.clear_record();
            }
        }
    }

    /// Copy of the changed parts of this tree
    ///
    /// Keys that were removed appear as null.
    pub fn reduce(&self) -> JsonMeta {
        let mut reduced = JsonMeta::level(&self.delimiter, self.mark_dirty_by_default);
        for key in self.updated_fields() {
            let node = match self.data.get(&key) {
                Some(Node::Meta(child)) => Node::Meta(child.reduce()),
                Some(other) => other.clone(),
                None => Node::Value(Value::Null),
            };
            reduced.data.insert(key, node);
        }
        reduced
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// This level as a string-keyed map; deferred entries are left out
    pub fn to_map_value(&self) -> Value {
        Value::Map(
            self.data
                .iter()
                .filter_map(|(key, node)| {
                    let value = match node {
                        Node::Meta(child) => child.to_map_value(),
                        Node::Value(v) => v.clone(),
                        Node::Deferred(_) => return None,
                    };
                    Some((Value::String(key.clone()), value))
                })
                .collect(),
        )
    }

    /// Write the whole tree, or with `reduced` only its changed parts
    pub fn serialize_with(&self, out: &mut GravSerializer, reduced: bool) -> Result<()> {
        out.write_bool(reduced);
        if reduced {
            let fields = self.updated_fields();
            out.write_len(fields.len());
            for key in &fields {
                match self.data.get(key) {
                    Some(node) => write_entry(out, key, node, true)?,
                    None => write_entry(out, key, &Node::Value(Value::Null), true)?,
                }
            }
        } else {
            out.write_len(self.data.len());
            for (key, node) in &self.data {
                write_entry(out, key, node, false)?;
            }
        }
        Ok(())
    }

    fn read_entries(&mut self, input: &mut GravSerializer, args: &[Value]) -> Result<()> {
        // the reduced flag only matters to the writer
        input.read_bool()?;
        let count = input.read_len()?;
        input.ensure_remaining(count)?;

        for _ in 0..count {
            let kind = input.read_u8()?;
            let key = input.read_string()?;
            let node = match kind {
                KIND_META => {
                    let mut child = JsonMeta::level(&self.delimiter, self.mark_dirty_by_default);
                    input.enter_nested()?;
                    let read = child.read_entries(input, args);
                    input.leave_nested();
                    read?;
                    Node::Meta(child)
                }
                KIND_VALUE => {
                    let mut wrapper = input.read_serializer()?;
                    match wrapper.read_object(args) {
                        Ok(value) => Node::Value(value),
                        Err(err) if err.is_deferrable() => {
                            debug!(key = %key, error = %err, "deferring json meta entry");
                            Node::Deferred(wrapper.into_bytes())
                        }
                        Err(err) => return Err(err),
                    }
                }
                other => return Err(Error::InvalidTag(other)),
            };
            self.data.insert(key, node);
        }
        Ok(())
    }

    /// Build a tree from a JSON object
    pub fn from_json_object(object: &JsonMap<String, Json>) -> Self {
        let mut level = Self::new();
        for (key, value) in object {
            let node = match value {
                Json::Object(nested) => Node::Meta(Self::from_json_object(nested)),
                other => Node::Value(json::json_to_value(other)),
            };
            level.data.insert(key.clone(), node);
        }
        level
    }

    /// Parse lenient JSON (comments allowed); the top level must be an object
    pub fn from_json(input: &str) -> Result<Self> {
        match json::parse_lenient(input)? {
            Json::Object(object) => Ok(Self::from_json_object(&object)),
            other => Err(Error::type_error("object", json::json_kind(&other))),
        }
    }

    pub fn to_json_value(&self) -> Result<Json> {
        let mut object = JsonMap::with_capacity(self.data.len());
        for (key, node) in &self.data {
            let entry = match node {
                Node::Meta(child) => child.to_json_value()?,
                Node::Value(v) => json::value_to_json(v)?,
                Node::Deferred(_) => {
                    return Err(Error::Unsupported(format!("entry '{key}' is not resolved")))
                }
            };
            object.insert(key.clone(), entry);
        }
        Ok(Json::Object(object))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json_value()?)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_json_value()?)?)
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(f, "{{")?;
        for (key, node) in &self.data {
            write!(f, "{:width$}{}: ", "", key, width = indent + 2)?;
            match node {
                Node::Meta(child) => child.write_tree(f, indent + 2)?,
                Node::Value(v) => writeln!(f, "{}", v)?,
                Node::Deferred(raw) => writeln!(f, "<deferred {} bytes>", raw.len())?,
            }
        }
        writeln!(f, "{:width$}}}", "", width = indent)
    }
}

fn write_entry(out: &mut GravSerializer, key: &str, node: &Node, reduced: bool) -> Result<()> {
    match node {
        Node::Meta(child) => {
            out.write_u8(KIND_META);
            out.write_string(key);
            child.serialize_with(out, reduced)
        }
        Node::Value(value) => {
            out.write_u8(KIND_VALUE);
            out.write_string(key);
            let mut wrapper = GravSerializer::new();
            wrapper.write_object(value)?;
            out.write_serializer(&wrapper);
            Ok(())
        }
        Node::Deferred(raw) => {
            out.write_u8(KIND_VALUE);
            out.write_string(key);
            out.write_byte_array(raw);
            Ok(())
        }
    }
}

impl Default for JsonMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Two trees are equal when their entries are; settings and records are ignored
impl PartialEq for JsonMeta {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl fmt::Display for JsonMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

impl GravObject for JsonMeta {
    const TYPE_NAME: &'static str = "grav.JsonMeta";

    fn serialize(&self, out: &mut GravSerializer) -> Result<()> {
        self.serialize_with(out, false)
    }

    fn deserialize(input: &mut GravSerializer, args: &[Value]) -> Result<Self> {
        let mut meta = JsonMeta::new();
        meta.read_entries(input, args)?;
        Ok(meta)
    }
}

impl From<JsonMeta> for Value {
    fn from(meta: JsonMeta) -> Self {
        Value::object(meta)
    }
}
