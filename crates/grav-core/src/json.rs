//! JSON bridge
//!
//! Conversion between [`Value`] and `serde_json::Value`, plus a lenient
//! reader that accepts `//` and `/* */` comments. Objects keep their key
//! order.

use crate::error::{Error, Result};
use crate::json_meta::JsonMeta;
use crate::meta::Meta;
use crate::value::{EnumConstant, Value};
use serde_json::{Map as JsonMap, Number, Value as Json};

/// Remove `//` line comments and `/* */` block comments outside strings
pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parse JSON after stripping comments
pub fn parse_lenient(input: &str) -> Result<Json> {
    Ok(serde_json::from_str(&strip_comments(input))?)
}

/// Parse lenient JSON into a [`JsonMeta`]; the top level must be an object
pub fn parse_json_meta(input: &str) -> Result<JsonMeta> {
    JsonMeta::from_json(input)
}

/// Short name of a JSON value's kind, for error messages
pub fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn float_to_json(f: f64) -> Result<Json> {
    Number::from_f64(f)
        .map(Json::Number)
        .ok_or_else(|| Error::Unsupported(format!("non-finite number {f} in JSON")))
}

fn seq_to_json(items: &[Value]) -> Result<Json> {
    items
        .iter()
        .map(value_to_json)
        .collect::<Result<Vec<_>>>()
        .map(Json::Array)
}

/// Convert a value to JSON
///
/// Maps whose keys are all strings become objects; any other map becomes
/// an array of `[key, value]` pairs. Enums become their name or ordinal.
/// Objects other than [`Meta`] and [`JsonMeta`] have no JSON form.
pub fn value_to_json(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Byte(b) => Json::from(*b),
        Value::Short(s) => Json::from(*s),
        Value::Int(i) => Json::from(*i),
        Value::Long(l) => Json::from(*l),
        Value::Float(f) => float_to_json(*f as f64)?,
        Value::Double(d) => float_to_json(*d)?,
        Value::String(s) => Json::String(s.clone()),
        Value::Char(c) => Json::String(c.to_string()),
        Value::Uuid(id) => Json::String(id.to_string()),
        Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::IntArray(ints) => Json::Array(ints.iter().map(|i| Json::from(*i)).collect()),
        Value::List(items) | Value::Array(items) => seq_to_json(items)?,
        Value::Map(entries) => {
            if entries.iter().all(|(k, _)| k.as_str().is_some()) {
                let mut object = JsonMap::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = k.as_str().unwrap_or_default().to_string();
                    object.insert(key, value_to_json(v)?);
                }
                Json::Object(object)
            } else {
                let mut pairs = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    pairs.push(Json::Array(vec![value_to_json(k)?, value_to_json(v)?]));
                }
                Json::Array(pairs)
            }
        }
        Value::Entry(pair) => Json::Array(vec![value_to_json(&pair.0)?, value_to_json(&pair.1)?]),
        Value::Enum(e) => match &e.constant {
            EnumConstant::Name(name) => Json::String(name.clone()),
            EnumConstant::Ordinal(ordinal) => Json::from(*ordinal),
        },
        Value::Object(obj) => {
            if let Some(meta) = obj.downcast_ref::<Meta>() {
                meta.to_json_value()?
            } else if let Some(meta) = obj.downcast_ref::<JsonMeta>() {
                meta.to_json_value()?
            } else {
                return Err(Error::Unsupported(format!(
                    "object of type {} has no JSON form",
                    obj.type_name()
                )));
            }
        }
    })
}

/// Convert JSON to a value
///
/// Integers that fit in 32 bits become [`Value::Int`], larger ones
/// [`Value::Long`], everything else [`Value::Double`]. Objects become
/// string-keyed maps.
pub fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).map_or(Value::Long(i), Value::Int),
            None => n.as_f64().map_or(Value::Null, Value::Double),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        Json::Object(object) => Value::Map(
            object
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), json_to_value(v)))
                .collect(),
        ),
    }
}
