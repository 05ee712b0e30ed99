//! Four-character tags and container sniffing

use serde::{Serialize, Serializer};
use std::fmt;

/// Four-byte literal tag
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// Packed archive
    pub const CPK: Self = Self(*b"CPK ");
    /// Streaming container header chunk
    pub const CRID: Self = Self(*b"CRID");
    /// CPK table of contents
    pub const TOC: Self = Self(*b"TOC ");
    /// CPK extended table of contents
    pub const ETOC: Self = Self(*b"ETOC");
    /// Schema table
    pub const UTF: Self = Self(*b"@UTF");
    /// USM video stream
    pub const SFV: Self = Self(*b"@SFV");
    /// USM audio stream
    pub const SFA: Self = Self(*b"@SFA");

    /// Tag from the first four bytes of a slice
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let tag: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self(tag))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Tag reinterpreted as a big-endian number
    pub fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Tag from a big-endian number
    pub fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    /// Audio streams are tagged with a trailing `A`
    pub fn is_audio(self) -> bool {
        self.0[3] == b'A'
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02X}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc(\"{self}\")")
    }
}

impl Serialize for FourCc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Top-level container variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// Packed archive (`CPK `)
    Cpk,
    /// Streaming movie (`CRID`)
    Usm,
}

impl ContainerKind {
    /// Identify a container from its leading bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match FourCc::from_slice(bytes)? {
            FourCc::CPK => Some(Self::Cpk),
            FourCc::CRID => Some(Self::Usm),
            _ => None,
        }
    }

    /// Tag that opens this container
    pub fn magic(self) -> FourCc {
        match self {
            Self::Cpk => FourCc::CPK,
            Self::Usm => FourCc::CRID,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpk => write!(f, "CPK"),
            Self::Usm => write!(f, "USM"),
        }
    }
}
