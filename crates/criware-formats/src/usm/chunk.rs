//! USM chunk structures

use crate::catalog::AssetClass;
use crate::fourcc::FourCc;
use binrw::{BinRead, BinWrite};
use serde::Serialize;

/// Size of a chunk header, and of the CRID header
pub const CHUNK_HEADER_SIZE: u64 = 32;

/// Header padding of a standard chunk, counted after the size field
pub const STANDARD_HEADER_PAD: u16 = 0x18;

/// Payload that ends a stream
pub const CONTENTS_END: [u8; 32] = *b"#CONTENTS END   ===============\0";

/// Payload classification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// Elementary stream data
    Data,
    /// Stream properties table
    StreamInfo,
    /// Stream metadata (seek tables and similar)
    StreamMeta,
    /// Stream header
    Header,
}

impl PayloadKind {
    /// Parse a raw kind code
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Data),
            1 => Some(Self::StreamInfo),
            2 => Some(Self::StreamMeta),
            3 => Some(Self::Header),
            _ => None,
        }
    }

    /// Raw kind code
    pub fn code(self) -> u32 {
        match self {
            Self::Data => 0,
            Self::StreamInfo => 1,
            Self::StreamMeta => 2,
            Self::Header => 3,
        }
    }
}

/// CRID header at the start of every USM file
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct CridHeader {
    /// Magic bytes: "CRID"
    pub magic: [u8; 4],

    /// Chunk size, excluding magic and this field
    pub chunk_size: u32,

    /// Header size, must be 0x18
    pub header_size: u16,

    /// Footer padding size
    pub footer_size: u16,

    /// Block type, must be 1
    pub block_type: u32,

    /// Unchecked
    pub reserved: [u8; 8],

    /// Must be 0
    pub zero_a: u32,

    /// Must be 0
    pub zero_b: u32,
}

/// Raw chunk header as stored
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct ChunkHeader {
    /// Stream tag
    pub tag: [u8; 4],

    /// Chunk size, excluding tag and this field
    pub size: u32,

    /// Bytes between the size field and the payload
    pub header_pad: u16,

    /// Bytes between the payload and the next chunk
    pub footer_pad: u16,

    /// Payload kind code
    pub kind: u32,

    /// Unchecked
    pub reserved: [u8; 16],
}

/// One chunk of an interleaved USM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// File offset of the chunk tag
    pub offset: u64,
    /// Stream tag
    pub tag: FourCc,
    /// Asset class derived from the tag
    pub class: AssetClass,
    /// Chunk size, excluding tag and size field
    pub size: u32,
    /// Bytes between the size field and the payload
    pub header_pad: u16,
    /// Bytes after the payload
    pub footer_pad: u16,
    /// Payload kind
    pub kind: PayloadKind,
}

impl Chunk {
    /// File offset of the first payload byte
    pub fn payload_offset(&self) -> u64 {
        self.offset + 8 + u64::from(self.header_pad)
    }

    /// Payload length without padding
    pub fn payload_size(&self) -> u64 {
        u64::from(self.size)
            .saturating_sub(u64::from(self.header_pad) + u64::from(self.footer_pad))
    }

    /// File offset one past the last payload byte
    pub fn payload_end(&self) -> u64 {
        self.payload_offset() + self.payload_size()
    }

    /// File offset of the next chunk
    pub fn end(&self) -> u64 {
        self.offset + 8 + u64::from(self.size)
    }

    /// Numeric stream id
    pub fn stream_id(&self) -> u32 {
        self.tag.to_u32()
    }
}
