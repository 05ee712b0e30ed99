//! @UTF table error types

use thiserror::Error;

/// @UTF table specific error type
#[derive(Debug, Error)]
pub enum UtfError {
    /// Packet does not start with `@UTF`
    #[error("invalid @UTF magic: expected [40 55 54 46], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Low nibble of a field flags byte is not a known value kind
    #[error("unknown value kind 0x{kind:X} in field {field}")]
    UnknownValueKind {
        /// Index of the offending field
        field: usize,
        /// Raw kind nibble
        kind: u8,
    },

    /// A pool or section offset points outside the packet
    #[error("{what} at 0x{offset:X} is outside the {len}-byte packet")]
    OutOfBounds {
        /// Which reference was being resolved
        what: &'static str,
        /// Absolute offset within the packet
        offset: usize,
        /// Packet length
        len: usize,
    },

    /// String pool entry has no NUL terminator
    #[error("unterminated string at pool offset 0x{0:X}")]
    UnterminatedString(usize),

    /// Declared table size disagrees with the packet length
    #[error("table declares {declared} bytes but packet holds {actual}")]
    SizeMismatch {
        /// Size from the header (including the 8-byte preamble)
        declared: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Row passed to the builder does not match the per-row field layout
    #[error("row layout mismatch: {0}")]
    RowMismatch(String),

    /// Built table does not fit the header's offset fields
    #[error("table too large: {0} exceeds its header field")]
    TooLarge(&'static str),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for @UTF operations
pub type UtfResult<T> = Result<T, UtfError>;
