//! Grav Core - Compact tagged binary serializer
//!
//! This crate provides:
//! - A byte buffer with a read cursor (`GravSerializer`)
//! - Tagged dynamic values (`Value`) and their wire codec
//! - Registered object types and enums (`GravObject`, `GravEnum`)
//! - Flat metadata (`Meta`) and path-addressed trees with change
//!   tracking (`JsonMeta`)
//! - Whole-buffer compression (deflate, zstd, lz4)
//! - A JSON bridge and a serde bridge for struct fields
//!
//! ## Entries that cannot be decoded yet
//!
//! Metadata containers keep an entry as raw bytes when its type is not
//! registered or needs construction arguments. The rest of the container
//! still decodes, and the entry can be resolved later.
//!
//! ## Configuration
//!
//! Settings can be loaded from a RON file:
//! ```ron
//! (compression: zstd, max_length: 1048576)
//! ```

mod buffer;
pub mod codec;
mod compress;
mod config;
mod convert;
mod error;
pub mod fields;
pub mod json;
mod json_meta;
mod macros;
mod meta;
mod object;
mod record;
mod value;

pub use buffer::{ByteOrder, GravSerializer};
pub use compress::{Compression, Compressor, Deflate, Lz4, NoCompression, Zstd};
pub use config::{Config, DEFAULT_DELIMITER, DEFAULT_MAX_DEPTH, DEFAULT_MAX_LENGTH};
pub use convert::FromValue;
pub use error::{Error, Result};
pub use json_meta::{JsonMeta, Node};
pub use meta::Meta;
pub use object::{
    is_registered, register, DynObject, GravEnum, GravObject, JsonMetaSerializable,
    MetaSerializable, Registry,
};
pub use record::UpdateRecord;
pub use value::{EnumConstant, EnumValue, ObjectRef, Value};
