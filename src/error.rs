//! Error types shared by the session, its collaborators and the binary.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed text source or malformed saved-program data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Failure reported for a dispatched device command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("no board connected")]
    NotConnected,

    #[error("board disconnected before the command completed")]
    Disconnected,

    #[error("{0}")]
    Failed(String),
}

/// Intel HEX decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FirmwareError {
    #[error("line {line}: record does not start with ':'")]
    MissingStartCode { line: usize },

    #[error("line {line}: invalid hex digits")]
    InvalidHex { line: usize },

    #[error("line {line}: record length mismatch (declared {declared}, found {found})")]
    LengthMismatch {
        line: usize,
        declared: usize,
        found: usize,
    },

    #[error("line {line}: checksum mismatch (expected {expected:#04x}, computed {computed:#04x})")]
    Checksum {
        line: usize,
        expected: u8,
        computed: u8,
    },

    #[error("line {line}: unsupported record type {record_type:#04x}")]
    UnsupportedRecord { line: usize, record_type: u8 },

    #[error("image has no end-of-file record")]
    MissingEof,

    #[error("image contains no data")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid message catalog {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
