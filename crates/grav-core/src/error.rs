//! Error types for grav-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("End of buffer reached: needed {needed} bytes, {remaining} remaining")]
    EndOfBuffer { needed: usize, remaining: usize },

    #[error("Invalid length prefix: {0}")]
    InvalidLength(i64),

    #[error("Length {len} exceeds the configured limit of {limit}")]
    LengthLimit { len: usize, limit: usize },

    #[error("Values nest deeper than the limit of {0}")]
    DepthLimit(usize),

    #[error("Invalid UTF-8 string: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid char scalar value: {0:#x}")]
    InvalidChar(u32),

    #[error("Invalid tag: {0}")]
    InvalidTag(u8),

    #[error("Varint is longer than 10 bytes")]
    VarIntOverflow,

    #[error("No deserializer registered for type: {0}")]
    UnknownType(String),

    #[error("Cannot construct {type_name}: {reason}")]
    MissingArguments { type_name: String, reason: String },

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Unknown constant {constant} for enum {type_name}")]
    UnknownEnumConstant { type_name: String, constant: String },

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Build a `TypeError` from the expected type and the value's type name
    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::TypeError {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Build a `MissingArguments` error for a type that needs construction arguments
    pub fn missing_arguments(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MissingArguments {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Whether a metadata container may keep the failed entry as raw bytes
    /// and retry it later with construction arguments.
    pub fn is_deferrable(&self) -> bool {
        matches!(
            self,
            Error::UnknownType(_) | Error::MissingArguments { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferrable() {
        assert!(Error::UnknownType("x".into()).is_deferrable());
        assert!(Error::missing_arguments("x", "needs an id").is_deferrable());
        assert!(!Error::InvalidTag(99).is_deferrable());
        assert!(!Error::EndOfBuffer {
            needed: 4,
            remaining: 0
        }
        .is_deferrable());
    }

    #[test]
    fn test_messages() {
        let err = Error::type_error("int", "string");
        assert_eq!(err.to_string(), "Type error: expected int, got string");

        let err = Error::LengthLimit { len: 10, limit: 5 };
        assert_eq!(
            err.to_string(),
            "Length 10 exceeds the configured limit of 5"
        );
    }
}
