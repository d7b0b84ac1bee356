//! Runtime configuration
//!
//! [`Config`] gathers the knobs shared by the buffer and the metadata trees.
//! It is plain serde data and can be loaded from a RON file:
//!
//! ```ron
//! (
//!     compression: zstd,
//!     max_length: 1048576,
//!     max_depth: 64,
//!     delimiter: "/",
//!     track_changes: true,
//! )
//! ```
//!
//! Any field left out keeps its default.

use crate::compress::Compression;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default upper bound for any length prefix (256 MiB)
pub const DEFAULT_MAX_LENGTH: usize = 256 * 1024 * 1024;

/// Default bound on how deeply tagged values may nest when read
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Default path separator for [`JsonMeta`](crate::JsonMeta)
pub const DEFAULT_DELIMITER: &str = ".";

/// Configuration for buffers and metadata trees
///
/// # Example
///
/// ```
/// use grav_core::{Compression, Config};
///
/// let config = Config::from_ron_str("(compression: lz4)").unwrap();
/// assert_eq!(config.compression, Compression::Lz4);
/// assert_eq!(config.delimiter, ".");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Codec used when a buffer is written to or read from a stream
    pub compression: Compression,
    /// Largest accepted length prefix, in bytes or elements
    pub max_length: usize,
    /// Deepest accepted nesting of lists, maps and objects on read
    pub max_depth: usize,
    /// Path separator for `JsonMeta`
    pub delimiter: String,
    /// Whether new `JsonMeta` trees record changes by default
    pub track_changes: bool,
}

impl Config {
    /// Parse a configuration from a RON string
    pub fn from_ron_str(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    /// Load a configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_ron_str(&content)
    }

    /// Set the compression codec
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the maximum length prefix
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set the maximum nesting depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            max_length: DEFAULT_MAX_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
            delimiter: DEFAULT_DELIMITER.to_string(),
            track_changes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.compression, Compression::None);
        assert_eq!(config.max_length, DEFAULT_MAX_LENGTH);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.delimiter, ".");
        assert!(!config.track_changes);
    }

    #[test]
    fn test_partial_ron() {
        let config = Config::from_ron_str("(delimiter: \"/\", track_changes: true)").unwrap();
        assert_eq!(config.delimiter, "/");
        assert!(config.track_changes);
        assert_eq!(config.compression, Compression::None);
    }

    #[test]
    fn test_invalid_ron() {
        assert!(Config::from_ron_str("(compression: gzip)").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(compression: zstd, max_length: 1024)").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.compression, Compression::Zstd);
        assert_eq!(config.max_length, 1024);
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_compression(Compression::Deflate)
            .with_max_length(16)
            .with_max_depth(8);
        assert_eq!(config.compression, Compression::Deflate);
        assert_eq!(config.max_length, 16);
        assert_eq!(config.max_depth, 8);
    }
}
