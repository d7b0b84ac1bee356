//! Pluggable whole-buffer compression
//!
//! Compressors operate on complete byte slices. They are used when a
//! [`GravSerializer`](crate::GravSerializer) is written to or read from a
//! stream.
//!
//! - [`Deflate`]: zlib stream, readable by `java.util.zip.Inflater`
//! - [`Zstd`]: 4-byte little-endian uncompressed length followed by a zstd frame
//! - [`Lz4`]: LZ4 block with a size prefix
//!
//! [`Compression`] selects one of these by name, e.g. from a config file.

use crate::error::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;
use tracing::trace;

/// A whole-buffer compression codec
pub trait Compressor: Send + Sync {
    /// Compress a complete buffer
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a buffer, failing with `LengthLimit` before producing
    /// more than `limit` bytes
    fn decompress_limited(&self, input: &[u8], limit: usize) -> Result<Vec<u8>>;

    /// Decompress a buffer produced by [`Compressor::compress`]
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.decompress_limited(input, usize::MAX)
    }

    /// Short codec name used in logs
    fn name(&self) -> &'static str;
}

fn check_limit(len: usize, limit: usize) -> Result<()> {
    if len > limit {
        return Err(Error::LengthLimit { len, limit });
    }
    Ok(())
}

/// Split off a 4-byte little-endian size prefix
fn split_size_prefix<'a>(input: &'a [u8], codec: &str) -> Result<([u8; 4], &'a [u8])> {
    match input {
        [a, b, c, d, rest @ ..] => Ok(([*a, *b, *c, *d], rest)),
        _ => Err(Error::Decompression(format!(
            "{codec} input shorter than its length prefix ({} bytes)",
            input.len()
        ))),
    }
}

/// Identity codec
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn decompress_limited(&self, input: &[u8], limit: usize) -> Result<Vec<u8>> {
        check_limit(input.len(), limit)?;
        Ok(input.to_vec())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// zlib-framed deflate
#[derive(Debug, Clone, Copy)]
pub struct Deflate {
    level: u32,
}

impl Deflate {
    /// Create a deflate codec with the given level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl Default for Deflate {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl Compressor for Deflate {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::new(self.level));
        encoder
            .write_all(input)
            .map_err(|e| Error::Compression(e.to_string()))?;
        let out = encoder
            .finish()
            .map_err(|e| Error::Compression(e.to_string()))?;
        trace!(codec = "deflate", input = input.len(), output = out.len(), "compressed");
        Ok(out)
    }

    fn decompress_limited(&self, input: &[u8], limit: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len().min(limit));
        // one byte past the limit is enough to tell that it was exceeded
        ZlibDecoder::new(input)
            .take((limit as u64).saturating_add(1))
            .read_to_end(&mut out)
            .map_err(|e| Error::Decompression(e.to_string()))?;
        check_limit(out.len(), limit)?;
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "deflate"
    }
}

/// zstd frame with a 4-byte little-endian length prefix
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
}

impl Zstd {
    /// Create a zstd codec with the given level
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Zstd {
    fn default() -> Self {
        Self {
            level: zstd::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl Compressor for Zstd {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let len = i32::try_from(input.len())
            .map_err(|_| Error::Compression(format!("input too large: {} bytes", input.len())))?;
        let frame = zstd::bulk::compress(input, self.level)
            .map_err(|e| Error::Compression(e.to_string()))?;

        let mut out = Vec::with_capacity(frame.len() + 4);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&frame);
        trace!(codec = "zstd", input = input.len(), output = out.len(), "compressed");
        Ok(out)
    }

    fn decompress_limited(&self, input: &[u8], limit: usize) -> Result<Vec<u8>> {
        let (prefix, frame) = split_size_prefix(input, "zstd")?;
        let len = i32::from_le_bytes(prefix);
        if len < 0 {
            return Err(Error::Decompression(format!("negative zstd length: {len}")));
        }
        check_limit(len as usize, limit)?;
        zstd::bulk::decompress(frame, len as usize).map_err(|e| Error::Decompression(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

/// LZ4 block with a prepended size
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4;

impl Compressor for Lz4 {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let out = lz4_flex::compress_prepend_size(input);
        trace!(codec = "lz4", input = input.len(), output = out.len(), "compressed");
        Ok(out)
    }

    fn decompress_limited(&self, input: &[u8], limit: usize) -> Result<Vec<u8>> {
        let (prefix, _) = split_size_prefix(input, "lz4")?;
        check_limit(u32::from_le_bytes(prefix) as usize, limit)?;
        lz4_flex::decompress_size_prepended(input).map_err(|e| Error::Decompression(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "lz4"
    }
}

/// Codec selection by name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Deflate,
    Zstd,
    Lz4,
}

impl Compression {
    /// All selectable codecs
    pub const ALL: [Compression; 4] = [
        Compression::None,
        Compression::Deflate,
        Compression::Zstd,
        Compression::Lz4,
    ];
}

impl Compressor for Compression {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => NoCompression.compress(input),
            Compression::Deflate => Deflate::default().compress(input),
            Compression::Zstd => Zstd::default().compress(input),
            Compression::Lz4 => Lz4.compress(input),
        }
    }

    fn decompress_limited(&self, input: &[u8], limit: usize) -> Result<Vec<u8>> {
        match self {
            Compression::None => NoCompression.decompress_limited(input, limit),
            Compression::Deflate => Deflate::default().decompress_limited(input, limit),
            Compression::Zstd => Zstd::default().decompress_limited(input, limit),
            Compression::Lz4 => Lz4.decompress_limited(input, limit),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Deflate => "deflate",
            Compression::Zstd => "zstd",
            Compression::Lz4 => "lz4",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "deflate" | "zlib" => Ok(Compression::Deflate),
            "zstd" => Ok(Compression::Zstd),
            "lz4" => Ok(Compression::Lz4),
            other => Err(Error::Unsupported(format!("compression codec '{other}'"))),
        }
    }
}
