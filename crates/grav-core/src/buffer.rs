//! The byte buffer at the bottom of every encoding
//!
//! [`GravSerializer`] is a growable byte buffer with a read cursor and a
//! mark. Writes always append; reads consume from the cursor. Numbers are
//! little-endian unless an explicit [`ByteOrder`] is given.
//!
//! # Example
//!
//! ```
//! use grav_core::GravSerializer;
//!
//! let mut ser = GravSerializer::new();
//! ser.write_string("gold");
//! ser.write_i32(120);
//!
//! assert_eq!(ser.read_string().unwrap(), "gold");
//! assert_eq!(ser.read_i32().unwrap(), 120);
//! assert!(!ser.has_next());
//! ```

use crate::codec;
use crate::compress::Compressor;
use crate::config::{Config, DEFAULT_MAX_DEPTH, DEFAULT_MAX_LENGTH};
use crate::error::{Error, Result};
use crate::value::Value;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use tracing::trace;
use uuid::Uuid;

/// Byte order for multi-byte numbers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

macro_rules! numeric_codec {
    ($($ty:ty => $write:ident, $write_ordered:ident, $read:ident, $read_ordered:ident;)+) => {
        $(
            #[doc = concat!("Write a little-endian `", stringify!($ty), "`")]
            pub fn $write(&mut self, value: $ty) {
                self.$write_ordered(value, ByteOrder::Little);
            }

            #[doc = concat!("Write a `", stringify!($ty), "` in the given byte order")]
            pub fn $write_ordered(&mut self, value: $ty, order: ByteOrder) {
                let raw = match order {
                    ByteOrder::Little => value.to_le_bytes(),
                    ByteOrder::Big => value.to_be_bytes(),
                };
                self.bytes.extend_from_slice(&raw);
            }

            #[doc = concat!("Read a little-endian `", stringify!($ty), "`")]
            pub fn $read(&mut self) -> Result<$ty> {
                self.$read_ordered(ByteOrder::Little)
            }

            #[doc = concat!("Read a `", stringify!($ty), "` in the given byte order")]
            pub fn $read_ordered(&mut self, order: ByteOrder) -> Result<$ty> {
                const SIZE: usize = std::mem::size_of::<$ty>();
                let mut raw = [0u8; SIZE];
                raw.copy_from_slice(self.consume(SIZE)?);
                Ok(match order {
                    ByteOrder::Little => <$ty>::from_le_bytes(raw),
                    ByteOrder::Big => <$ty>::from_be_bytes(raw),
                })
            }
        )+
    };
}

/// Growable byte buffer with a read cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GravSerializer {
    bytes: Vec<u8>,
    reading: usize,
    mark: usize,
    max_length: usize,
    max_depth: usize,
    depth: usize,
}

impl GravSerializer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::from_bytes(Vec::new())
    }

    /// Create an empty buffer that applies the config's limits
    pub fn with_config(config: &Config) -> Self {
        let mut ser = Self::new();
        ser.apply_limits(config);
        ser
    }

    fn apply_limits(&mut self, config: &Config) {
        self.max_length = config.max_length;
        self.max_depth = config.max_depth;
    }

    /// Wrap existing bytes; the cursor starts at 0
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            reading: 0,
            mark: 0,
            max_length: DEFAULT_MAX_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
        }
    }

    /// Decode a buffer from standard Base64
    pub fn from_base64(input: &str) -> Result<Self> {
        Ok(Self::from_bytes(BASE64.decode(input.trim())?))
    }

    /// Read a reader to its end and decompress the content
    ///
    /// The decompressed size may not exceed [`DEFAULT_MAX_LENGTH`]; use
    /// [`load`](Self::load) to apply another limit.
    pub fn from_reader<R: Read>(reader: R, compressor: &dyn Compressor) -> Result<Self> {
        Self::read_limited(reader, compressor, DEFAULT_MAX_LENGTH)
    }

    fn read_limited<R: Read>(
        mut reader: R,
        compressor: &dyn Compressor,
        limit: usize,
    ) -> Result<Self> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let bytes = compressor.decompress_limited(&raw, limit)?;
        trace!(
            codec = compressor.name(),
            read = raw.len(),
            decoded = bytes.len(),
            "loaded buffer"
        );
        Ok(Self::from_bytes(bytes))
    }

    /// Read a buffer using the codec and limits from `config`
    ///
    /// `max_length` also bounds the decompressed size.
    pub fn load<R: Read>(reader: R, config: &Config) -> Result<Self> {
        let mut ser = Self::read_limited(reader, &config.compression, config.max_length)?;
        ser.apply_limits(config);
        Ok(ser)
    }

    /// Set the largest accepted length prefix
    pub fn set_max_length(&mut self, max_length: usize) {
        self.max_length = max_length;
    }

    /// Largest accepted length prefix
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Set how deeply tagged values may nest when read
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Remember the current read position for [`reset`](Self::reset)
    pub fn mark(&mut self) {
        self.mark = self.reading;
    }

    /// Move the cursor back to the last mark (0 if never marked)
    pub fn reset(&mut self) {
        self.reading = self.mark;
    }

    /// Move the cursor and the mark back to the start
    pub fn rewind(&mut self) {
        self.reading = 0;
        self.mark = 0;
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.reading
    }

    /// Total number of bytes in the buffer
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of bytes left to read
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.reading
    }

    /// Whether there is anything left to read
    pub fn has_next(&self) -> bool {
        self.reading < self.bytes.len()
    }

    /// Skip up to `n` bytes and return how many were skipped
    pub fn skip(&mut self, n: usize) -> usize {
        let skipped = n.min(self.remaining());
        self.reading += skipped;
        skipped
    }

    /// The full content, ignoring the cursor
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the buffer and return its content
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Encode the full content as standard Base64
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Append raw bytes without a length prefix
    pub fn append(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Compress the full content and write it to `writer`
    pub fn write_to<W: Write>(&self, mut writer: W, compressor: &dyn Compressor) -> Result<()> {
        let out = compressor.compress(&self.bytes)?;
        writer.write_all(&out)?;
        writer.flush()?;
        trace!(
            codec = compressor.name(),
            size = self.bytes.len(),
            written = out.len(),
            "wrote buffer"
        );
        Ok(())
    }

    /// Write the full content using the codec from `config`
    pub fn save<W: Write>(&self, writer: W, config: &Config) -> Result<()> {
        self.write_to(writer, &config.compression)
    }

    // ---- raw access ----

    fn consume(&mut self, n: usize) -> Result<&[u8]> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(Error::EndOfBuffer {
                needed: n,
                remaining,
            });
        }
        let start = self.reading;
        self.reading += n;
        Ok(&self.bytes[start..self.reading])
    }

    /// Fail with `EndOfBuffer` unless at least `n` bytes are left
    pub(crate) fn ensure_remaining(&self, n: usize) -> Result<()> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(Error::EndOfBuffer {
                needed: n,
                remaining,
            });
        }
        Ok(())
    }

    /// Write an `i32` length prefix
    ///
    /// # Panics
    ///
    /// Panics if `len` does not fit in an `i32`.
    pub(crate) fn write_len(&mut self, len: usize) {
        let len = i32::try_from(len).unwrap_or_else(|_| panic!("length {len} exceeds i32::MAX"));
        self.write_i32(len);
    }

    /// Step one level into a nested value
    pub(crate) fn enter_nested(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(Error::DepthLimit(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Read an `i32` length prefix and check it against the limit
    pub(crate) fn read_len(&mut self) -> Result<usize> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(Error::InvalidLength(len as i64));
        }
        let len = len as usize;
        if len > self.max_length {
            return Err(Error::LengthLimit {
                len,
                limit: self.max_length,
            });
        }
        Ok(len)
    }

    // ---- primitives ----

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.consume(1)?[0])
    }

    /// Write a signed byte
    pub fn write_i8(&mut self, value: i8) {
        self.bytes.push(value as u8);
    }

    /// Read a signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Write a boolean as 1 or 0
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Read a boolean; only a byte equal to 1 is true
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? == 1)
    }

    numeric_codec! {
        i16 => write_i16, write_i16_ordered, read_i16, read_i16_ordered;
        u16 => write_u16, write_u16_ordered, read_u16, read_u16_ordered;
        i32 => write_i32, write_i32_ordered, read_i32, read_i32_ordered;
        u32 => write_u32, write_u32_ordered, read_u32, read_u32_ordered;
        i64 => write_i64, write_i64_ordered, read_i64, read_i64_ordered;
        u64 => write_u64, write_u64_ordered, read_u64, read_u64_ordered;
        f32 => write_f32, write_f32_ordered, read_f32, read_f32_ordered;
        f64 => write_f64, write_f64_ordered, read_f64, read_f64_ordered;
    }

    /// Write a char as its 4-byte scalar value
    pub fn write_char(&mut self, value: char) {
        self.write_u32(value as u32);
    }

    /// Read a char written by [`write_char`](Self::write_char)
    pub fn read_char(&mut self) -> Result<char> {
        let raw = self.read_u32()?;
        char::from_u32(raw).ok_or(Error::InvalidChar(raw))
    }

    /// Write an unsigned LEB128 varint
    pub fn write_var_u64(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.bytes.push(byte);
                return;
            }
            self.bytes.push(byte | 0x80);
        }
    }

    /// Read an unsigned LEB128 varint of at most 10 bytes
    pub fn read_var_u64(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for i in 0..10 {
            let byte = self.read_u8()?;
            // the tenth byte only has room for bit 63
            if i == 9 && byte > 1 {
                return Err(Error::VarIntOverflow);
            }
            value |= ((byte & 0x7f) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::VarIntOverflow)
    }

    /// Write a zigzag-encoded signed varint
    pub fn write_var_i64(&mut self, value: i64) {
        self.write_var_u64(((value << 1) ^ (value >> 63)) as u64);
    }

    /// Read a zigzag-encoded signed varint
    pub fn read_var_i64(&mut self) -> Result<i64> {
        let raw = self.read_var_u64()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    // ---- compound values ----

    /// Write a length-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) {
        self.write_byte_array(value.as_bytes());
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String> {
        let raw = self.read_byte_array()?;
        Ok(String::from_utf8(raw)?)
    }

    /// Write a length-prefixed byte array
    pub fn write_byte_array(&mut self, value: &[u8]) {
        self.write_len(value.len());
        self.bytes.extend_from_slice(value);
    }

    /// Read a length-prefixed byte array
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let len = self.read_len()?;
        Ok(self.consume(len)?.to_vec())
    }

    /// Write a bool array packed eight to a byte, least significant bit first
    pub fn write_bool_array(&mut self, values: &[bool]) {
        self.write_len(values.len());
        for chunk in values.chunks(8) {
            let byte = chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &b)| if b { acc | (1 << i) } else { acc });
            self.bytes.push(byte);
        }
    }

    /// Read a packed bool array
    pub fn read_bool_array(&mut self) -> Result<Vec<bool>> {
        let len = self.read_len()?;
        let raw = self.consume(len.div_ceil(8))?;
        Ok((0..len).map(|i| (raw[i / 8] >> (i % 8)) & 1 == 1).collect())
    }

    /// Write a length-prefixed `i32` array
    pub fn write_i32_array(&mut self, values: &[i32]) {
        self.write_len(values.len());
        for &v in values {
            self.write_i32(v);
        }
    }

    /// Read a length-prefixed `i32` array
    pub fn read_i32_array(&mut self) -> Result<Vec<i32>> {
        let len = self.read_len()?;
        self.ensure_remaining(len.saturating_mul(4))?;
        (0..len).map(|_| self.read_i32()).collect()
    }

    /// Write a UUID as its most and least significant halves
    pub fn write_uuid(&mut self, value: &Uuid) {
        let (high, low) = value.as_u64_pair();
        self.write_i64(high as i64);
        self.write_i64(low as i64);
    }

    /// Read a UUID
    pub fn read_uuid(&mut self) -> Result<Uuid> {
        let high = self.read_i64()? as u64;
        let low = self.read_i64()? as u64;
        Ok(Uuid::from_u64_pair(high, low))
    }

    /// Embed another buffer as a length-prefixed byte array
    pub fn write_serializer(&mut self, other: &GravSerializer) {
        self.write_byte_array(&other.bytes);
    }

    /// Read an embedded buffer
    ///
    /// It inherits this buffer's limits and current nesting depth.
    pub fn read_serializer(&mut self) -> Result<GravSerializer> {
        let mut nested = GravSerializer::from_bytes(self.read_byte_array()?);
        nested.max_length = self.max_length;
        nested.max_depth = self.max_depth;
        nested.depth = self.depth;
        Ok(nested)
    }

    /// Write a tagged value
    pub fn write_object(&mut self, value: &Value) -> Result<()> {
        codec::write_value(self, value)
    }

    /// Read a tagged value, passing `args` to any object deserializers
    pub fn read_object(&mut self, args: &[Value]) -> Result<Value> {
        codec::read_value(self, args)
    }
}

impl Default for GravSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GravSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

impl From<Vec<u8>> for GravSerializer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl Read for GravSerializer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.bytes[self.reading..self.reading + n]);
        self.reading += n;
        Ok(n)
    }
}

impl Write for GravSerializer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
