//! CRILAYLA error types

use thiserror::Error;

/// CRILAYLA-specific error type
#[derive(Debug, Error)]
pub enum CrilaylaError {
    /// Buffer does not start with `CRILAYLA`
    #[error("invalid CRILAYLA magic: got {0:02X?}")]
    InvalidMagic([u8; 8]),

    /// Buffer is too short for the header and the raw prefix
    #[error("CRILAYLA buffer too short: {0} bytes")]
    Truncated(usize),

    /// Prefix offset points past the end of the buffer
    #[error("prefix offset 0x{offset:X} does not fit a {len}-byte buffer")]
    PrefixOutOfRange {
        /// Stream length from the header
        offset: u32,
        /// Buffer length
        len: usize,
    },

    /// Declared size cannot be produced by a stream this short
    #[error("declared size {size} is implausible for a {stream}-byte stream")]
    ImplausibleSize {
        /// Declared payload size
        size: u32,
        /// Compressed stream length
        stream: u32,
    },

    /// Bit reader ran past the start of the stream
    #[error("compressed stream exhausted")]
    InputExhausted,

    /// Back-reference points outside the bytes produced so far
    #[error("back-reference from 0x{position:X} to 0x{origin:X} is out of range")]
    BackReferenceOutOfRange {
        /// Output index being written
        position: usize,
        /// Output index being copied
        origin: usize,
    },

    /// A copy would write below the raw prefix
    #[error("back-reference overruns the declared size by {0} bytes")]
    OutputOverrun(usize),

    /// Payload too large for the 32-bit size fields
    #[error("payload of {0} bytes is too large to compress")]
    TooLarge(usize),
}

/// Result type for CRILAYLA operations
pub type CrilaylaResult<T> = Result<T, CrilaylaError>;
