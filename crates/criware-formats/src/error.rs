//! Container error types

use crate::crilayla::CrilaylaError;
use crate::fourcc::FourCc;
use crate::utf::UtfError;
use thiserror::Error;

/// Broad error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input bytes
    Format,
    /// Invalid argument from the caller
    Argument,
    /// Underlying read, seek or write failure
    Io,
}

/// Container-level error type
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Leading tag is neither `CPK ` nor `CRID`
    #[error("unrecognized container tag {0}")]
    UnknownContainer(FourCc),

    /// Section does not start with its expected tag
    #[error("invalid {expected} magic: got {found}")]
    InvalidMagic {
        /// Tag that should be present
        expected: FourCc,
        /// Tag actually read
        found: FourCc,
    },

    /// CRID header size is not 0x18
    #[error("invalid CRID header size: 0x{0:X}")]
    InvalidHeaderSize(u16),

    /// CRID block type is not 1
    #[error("invalid CRID block type: {0}")]
    InvalidBlockType(u32),

    /// A field that must be zero is not
    #[error("reserved field {field} is 0x{value:X}, expected 0")]
    NonZeroReserved {
        /// Field description
        field: &'static str,
        /// Value read
        value: u32,
    },

    /// Chunk payload kind outside 0..=3
    #[error("unknown chunk payload kind {kind} at 0x{offset:X}")]
    UnknownPayloadKind {
        /// Raw kind code
        kind: u32,
        /// Chunk offset
        offset: u64,
    },

    /// Chunk paddings exceed the chunk size
    #[error("chunk at 0x{offset:X} has size {size} smaller than its padding")]
    InvalidChunkLayout {
        /// Chunk offset
        offset: u64,
        /// Declared chunk size
        size: u32,
    },

    /// Catalog index past the end
    #[error("entry index {index} out of range (catalog has {len} entries)")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Catalog length
        len: usize,
    },

    /// Builder input cannot be represented
    #[error("cannot build container: {0}")]
    Build(String),

    /// Schema table error
    #[error("@UTF table error: {0}")]
    Utf(#[from] UtfError),

    /// Decompression error
    #[error("CRILAYLA error: {0}")]
    Crilayla(#[from] CrilaylaError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl ContainerError {
    /// Classify into format, argument and I/O failures
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IndexOutOfRange { .. } | Self::Build(_) => ErrorKind::Argument,
            Self::Io(_) | Self::Utf(UtfError::Io(_)) => ErrorKind::Io,
            Self::BinRw(e) | Self::Utf(UtfError::BinRw(e)) if is_binrw_io(e) => ErrorKind::Io,
            _ => ErrorKind::Format,
        }
    }

    /// Check if the input bytes are malformed
    pub fn is_format_error(&self) -> bool {
        self.kind() == ErrorKind::Format
    }

    /// Check if the caller passed an invalid argument
    pub fn is_argument_error(&self) -> bool {
        self.kind() == ErrorKind::Argument
    }

    /// Check if the underlying source or sink failed
    pub fn is_io_error(&self) -> bool {
        self.kind() == ErrorKind::Io
    }
}

fn is_binrw_io(error: &binrw::Error) -> bool {
    matches!(error, binrw::Error::Io(_))
}

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_classification() {
        let format = ContainerError::InvalidHeaderSize(0x20);
        assert_eq!(format.kind(), ErrorKind::Format);
        assert!(format.is_format_error());

        let argument = ContainerError::IndexOutOfRange { index: 3, len: 3 };
        assert!(argument.is_argument_error());

        let io = ContainerError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(io.is_io_error());

        let nested = ContainerError::from(UtfError::Io(io::Error::from(
            io::ErrorKind::PermissionDenied,
        )));
        assert!(nested.is_io_error());

        let utf = ContainerError::from(UtfError::UnterminatedString(4));
        assert!(utf.is_format_error());

        let codec = ContainerError::from(CrilaylaError::InputExhausted);
        assert!(codec.is_format_error());
    }

    #[test]
    fn test_binrw_io_is_io() {
        let wrapped = binrw::Error::Io(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert_eq!(ContainerError::from(wrapped).kind(), ErrorKind::Io);

        let assertion = binrw::Error::AssertFail {
            pos: 0,
            message: "bad".into(),
        };
        assert_eq!(ContainerError::from(assertion).kind(), ErrorKind::Format);
    }

    #[test]
    fn test_messages() {
        let err = ContainerError::InvalidMagic {
            expected: FourCc::TOC,
            found: FourCc(*b"XXXX"),
        };
        assert_eq!(err.to_string(), "invalid TOC  magic: got XXXX");
    }
}
