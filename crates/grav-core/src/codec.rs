//! Tagged value encoding
//!
//! Every value is written as a one-byte tag followed by its payload. Maps
//! are a count followed by that many tagged entries. Construction
//! arguments given to [`read_value`] reach every nested object.

use crate::buffer::GravSerializer;
use crate::error::{Error, Result};
use crate::object;
use crate::value::{EnumConstant, EnumValue, Value};

/// Wire tags, one per [`Value`] variant
pub mod tag {
    pub const NULL: u8 = 0;
    pub const STRING: u8 = 1;
    pub const BYTES: u8 = 2;
    pub const BYTE: u8 = 3;
    pub const DOUBLE: u8 = 4;
    pub const INT: u8 = 5;
    pub const LONG: u8 = 6;
    pub const UUID: u8 = 7;
    pub const MAP: u8 = 8;
    pub const ENTRY: u8 = 9;
    pub const LIST: u8 = 10;
    pub const ENUM: u8 = 11;
    pub const OBJECT: u8 = 12;
    pub const INT_ARRAY: u8 = 13;
    pub const ARRAY: u8 = 14;
    pub const BOOL: u8 = 15;
    pub const FLOAT: u8 = 16;
    pub const SHORT: u8 = 17;
    pub const CHAR: u8 = 18;
}

fn write_pair(out: &mut GravSerializer, key: &Value, value: &Value) -> Result<()> {
    out.write_u8(tag::ENTRY);
    write_value(out, key)?;
    write_value(out, value)
}

fn write_values(out: &mut GravSerializer, items: &[Value]) -> Result<()> {
    out.write_len(items.len());
    for item in items {
        write_value(out, item)?;
    }
    Ok(())
}

/// Write a value with its tag
pub fn write_value(out: &mut GravSerializer, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.write_u8(tag::NULL),
        Value::String(s) => {
            out.write_u8(tag::STRING);
            out.write_string(s);
        }
        Value::Bytes(b) => {
            out.write_u8(tag::BYTES);
            out.write_byte_array(b);
        }
        Value::Byte(b) => {
            out.write_u8(tag::BYTE);
            out.write_i8(*b);
        }
        Value::Double(d) => {
            out.write_u8(tag::DOUBLE);
            out.write_f64(*d);
        }
        Value::Int(i) => {
            out.write_u8(tag::INT);
            out.write_i32(*i);
        }
        Value::Long(l) => {
            out.write_u8(tag::LONG);
            out.write_i64(*l);
        }
        Value::Uuid(id) => {
            out.write_u8(tag::UUID);
            out.write_uuid(id);
        }
        Value::Map(entries) => {
            out.write_u8(tag::MAP);
            out.write_len(entries.len());
            for (k, v) in entries {
                write_pair(out, k, v)?;
            }
        }
        Value::Entry(pair) => write_pair(out, &pair.0, &pair.1)?,
        Value::List(items) => {
            out.write_u8(tag::LIST);
            write_values(out, items)?;
        }
        Value::Enum(e) => {
            out.write_u8(tag::ENUM);
            out.write_string(&e.type_name);
            match &e.constant {
                EnumConstant::Name(name) => {
                    out.write_bool(true);
                    out.write_string(name);
                }
                EnumConstant::Ordinal(ordinal) => {
                    out.write_bool(false);
                    out.write_i32(*ordinal);
                }
            }
        }
        Value::Object(obj) => {
            out.write_u8(tag::OBJECT);
            out.write_string(obj.type_name());
            obj.as_dyn().serialize_payload(out)?;
        }
        Value::IntArray(ints) => {
            out.write_u8(tag::INT_ARRAY);
            out.write_i32_array(ints);
        }
        Value::Array(items) => {
            out.write_u8(tag::ARRAY);
            write_values(out, items)?;
        }
        Value::Bool(b) => {
            out.write_u8(tag::BOOL);
            out.write_bool(*b);
        }
        Value::Float(f) => {
            out.write_u8(tag::FLOAT);
            out.write_f32(*f);
        }
        Value::Short(s) => {
            out.write_u8(tag::SHORT);
            out.write_i16(*s);
        }
        Value::Char(c) => {
            out.write_u8(tag::CHAR);
            out.write_char(*c);
        }
    }
    Ok(())
}

fn read_values(input: &mut GravSerializer, args: &[Value]) -> Result<Vec<Value>> {
    let len = input.read_len()?;
    // each element carries at least its tag byte
    input.ensure_remaining(len)?;
    (0..len).map(|_| read_value(input, args)).collect()
}

/// Read one tagged value
///
/// Fails with [`Error::DepthLimit`] when lists, maps, entries and objects
/// nest deeper than the buffer's `max_depth`.
pub fn read_value(input: &mut GravSerializer, args: &[Value]) -> Result<Value> {
    input.enter_nested()?;
    let value = read_tagged(input, args);
    input.leave_nested();
    value
}

fn read_tagged(input: &mut GravSerializer, args: &[Value]) -> Result<Value> {
    let value = match input.read_u8()? {
        tag::NULL => Value::Null,
        tag::STRING => Value::String(input.read_string()?),
        tag::BYTES => Value::Bytes(input.read_byte_array()?),
        tag::BYTE => Value::Byte(input.read_i8()?),
        tag::DOUBLE => Value::Double(input.read_f64()?),
        tag::INT => Value::Int(input.read_i32()?),
        tag::LONG => Value::Long(input.read_i64()?),
        tag::UUID => Value::Uuid(input.read_uuid()?),
        tag::MAP => {
            let len = input.read_len()?;
            input.ensure_remaining(len)?;
            let mut entries = Vec::with_capacity(len);
            for _ in 0..len {
                match read_value(input, args)? {
                    Value::Entry(pair) => entries.push(*pair),
                    Value::Null => {}
                    other => return Err(Error::type_error("entry", other.type_name())),
                }
            }
            Value::Map(entries)
        }
        tag::ENTRY => {
            let key = read_value(input, args)?;
            let value = read_value(input, args)?;
            Value::Entry(Box::new((key, value)))
        }
        tag::LIST => Value::List(read_values(input, args)?),
        tag::ENUM => {
            let type_name = input.read_string()?;
            let constant = if input.read_bool()? {
                EnumConstant::Name(input.read_string()?)
            } else {
                EnumConstant::Ordinal(input.read_i32()?)
            };
            Value::Enum(EnumValue {
                type_name,
                constant,
            })
        }
        tag::OBJECT => {
            let type_name = input.read_string()?;
            Value::Object(object::deserialize_registered(&type_name, input, args)?)
        }
        tag::INT_ARRAY => Value::IntArray(input.read_i32_array()?),
        tag::ARRAY => Value::Array(read_values(input, args)?),
        tag::BOOL => Value::Bool(input.read_bool()?),
        tag::FLOAT => Value::Float(input.read_f32()?),
        tag::SHORT => Value::Short(input.read_i16()?),
        tag::CHAR => Value::Char(input.read_char()?),
        other => return Err(Error::InvalidTag(other)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Meta;
    use uuid::Uuid;

    fn roundtrip(value: &Value) -> Value {
        let mut ser = GravSerializer::new();
        write_value(&mut ser, value).unwrap();
        let back = read_value(&mut ser, &[]).unwrap();
        assert!(!ser.has_next(), "trailing bytes after {value}");
        back
    }

    #[test]
    fn test_mixed_list() {
        let value = Value::List(vec![
            Value::Null,
            Value::from("text"),
            Value::bytes(vec![1, 2, 3]),
            Value::Byte(-1),
            Value::Double(2.25),
            Value::Int(i32::MIN),
            Value::Long(i64::MAX),
            Value::Uuid(Uuid::new_v4()),
            Value::IntArray(vec![1, -2, 3]),
            Value::Bool(true),
            Value::Float(0.5),
            Value::Short(-7),
            Value::Char('é'),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_map_with_non_string_keys() {
        let value = Value::map([
            (Value::Int(1), Value::from("one")),
            (Value::Uuid(Uuid::nil()), Value::List(vec![Value::Int(2)])),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_map_entry_layout() {
        let mut ser = GravSerializer::new();
        write_value(&mut ser, &Value::map([(Value::Int(1), Value::Bool(false))])).unwrap();
        assert_eq!(
            ser.as_bytes(),
            &[tag::MAP, 1, 0, 0, 0, tag::ENTRY, tag::INT, 1, 0, 0, 0, tag::BOOL, 0]
        );
    }

    #[test]
    fn test_null_map_entries_are_skipped() {
        let mut ser = GravSerializer::new();
        ser.write_u8(tag::MAP);
        ser.write_i32(2);
        ser.write_u8(tag::NULL);
        write_value(&mut ser, &Value::entry("k", 5)).unwrap();

        assert_eq!(
            read_value(&mut ser, &[]).unwrap(),
            Value::map([("k", 5)])
        );
    }

    #[test]
    fn test_map_rejects_non_entries() {
        let mut ser = GravSerializer::new();
        ser.write_u8(tag::MAP);
        ser.write_i32(1);
        write_value(&mut ser, &Value::Int(3)).unwrap();
        assert!(matches!(
            read_value(&mut ser, &[]),
            Err(Error::TypeError { .. })
        ));
    }

    #[test]
    fn test_array_keeps_variant() {
        let value = Value::Array(vec![Value::from("a"), Value::Null]);
        assert_eq!(roundtrip(&value), value);
        assert_ne!(roundtrip(&value), Value::List(vec![Value::from("a"), Value::Null]));
    }

    #[test]
    fn test_enum_forms() {
        for constant in [EnumConstant::Ordinal(4), EnumConstant::Name("Gold".into())] {
            let value = Value::Enum(EnumValue {
                type_name: "test.Rank".into(),
                constant,
            });
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn test_nested_objects() {
        let mut inner = Meta::new();
        inner.set("depth", 2);
        let mut outer = Meta::new();
        outer.set("inner", inner);
        outer.set("list", vec![Value::object(Meta::new())]);

        let value = Value::object(outer);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_invalid_tag() {
        let mut ser = GravSerializer::from_bytes(vec![200]);
        assert!(matches!(read_value(&mut ser, &[]), Err(Error::InvalidTag(200))));
    }

    fn nested_lists(depth: usize) -> GravSerializer {
        let mut ser = GravSerializer::new();
        for _ in 0..depth {
            ser.write_u8(tag::LIST);
            ser.write_i32(1);
        }
        ser.write_u8(tag::NULL);
        ser
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let mut ser = nested_lists(200_000);
        assert!(matches!(
            read_value(&mut ser, &[]),
            Err(Error::DepthLimit(crate::config::DEFAULT_MAX_DEPTH))
        ));
    }

    #[test]
    fn test_depth_limit_counts_levels_not_values() {
        let mut ser = nested_lists(3);
        ser.set_max_depth(4);
        assert!(read_value(&mut ser, &[]).is_ok());

        let mut ser = nested_lists(4);
        ser.set_max_depth(4);
        assert!(matches!(read_value(&mut ser, &[]), Err(Error::DepthLimit(4))));

        // siblings do not add up
        let mut ser = GravSerializer::new();
        for _ in 0..10 {
            write_value(&mut ser, &Value::List(vec![Value::List(vec![])])).unwrap();
        }
        ser.set_max_depth(2);
        for _ in 0..10 {
            assert!(read_value(&mut ser, &[]).is_ok());
        }
    }

    #[test]
    fn test_depth_counts_through_nested_metas() {
        let mut value = Value::Int(1);
        for _ in 0..5 {
            let mut meta = Meta::new();
            meta.set("inner", value);
            value = Value::object(meta);
        }
        let mut ser = GravSerializer::new();
        write_value(&mut ser, &value).unwrap();

        ser.set_max_depth(4);
        assert!(matches!(read_value(&mut ser, &[]), Err(Error::DepthLimit(4))));

        ser.rewind();
        ser.set_max_depth(16);
        assert_eq!(read_value(&mut ser, &[]).unwrap(), value);
    }

    #[test]
    fn test_huge_list_count_is_rejected_early() {
        let mut ser = GravSerializer::new();
        ser.write_u8(tag::LIST);
        ser.write_i32(50_000_000);
        assert!(matches!(
            read_value(&mut ser, &[]),
            Err(Error::EndOfBuffer { .. })
        ));
    }
}
