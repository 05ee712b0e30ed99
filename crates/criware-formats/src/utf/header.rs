//! @UTF header structures

use binrw::{BinRead, BinWrite};
use encoding_rs::SHIFT_JIS;

/// @UTF magic bytes
pub const UTF_MAGIC: [u8; 4] = *b"@UTF";

/// Size of the fixed header in bytes
pub const UTF_HEADER_SIZE: usize = 32;

/// Section offsets are stored relative to the end of the magic + size preamble
pub const OFFSET_BIAS: usize = 8;

/// Text encoding used by a table's string pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// Selector 0
    ShiftJis,
    /// Any nonzero selector
    #[default]
    Utf8,
}

impl TextEncoding {
    /// Map the header selector byte to an encoding
    pub fn from_selector(selector: u8) -> Self {
        if selector == 0 {
            Self::ShiftJis
        } else {
            Self::Utf8
        }
    }

    /// Selector byte written by the builder
    pub fn selector(self) -> u8 {
        match self {
            Self::ShiftJis => 0,
            Self::Utf8 => 1,
        }
    }

    /// Decode raw string pool bytes (without the terminator)
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::ShiftJis => SHIFT_JIS
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Encode a string for the string pool (without the terminator)
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::ShiftJis => SHIFT_JIS.encode(text).0.into_owned(),
            Self::Utf8 => text.as_bytes().to_vec(),
        }
    }
}

/// @UTF table header (32 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)] // All multi-byte fields are big-endian
#[bw(big)]
pub struct UtfHeader {
    /// Magic bytes: "@UTF"
    pub magic: [u8; 4],

    /// Table size, excluding the 8-byte preamble
    pub table_size: u32,

    /// Reserved, always 0
    pub reserved: u8,

    /// Text encoding selector (0 = Shift-JIS)
    pub encoding: u8,

    /// Row section offset (biased)
    pub rows_offset: u16,

    /// String pool offset (biased)
    pub strings_offset: u32,

    /// Blob pool offset (biased)
    pub data_offset: u32,

    /// Table name offset into the string pool
    pub table_name_offset: u32,

    /// Number of field definitions
    pub field_count: u16,

    /// Bytes per row
    pub row_size: u16,

    /// Number of rows
    pub row_count: u32,
}

impl UtfHeader {
    /// Total packet size including the preamble
    pub fn packet_size(&self) -> usize {
        self.table_size as usize + OFFSET_BIAS
    }

    /// Absolute start of the row section within the packet
    pub fn rows_start(&self) -> usize {
        self.rows_offset as usize + OFFSET_BIAS
    }

    /// Absolute start of the string pool within the packet
    pub fn strings_start(&self) -> usize {
        self.strings_offset as usize + OFFSET_BIAS
    }

    /// Absolute start of the blob pool within the packet
    pub fn data_start(&self) -> usize {
        self.data_offset as usize + OFFSET_BIAS
    }

    /// Text encoding of the string pool
    pub fn text_encoding(&self) -> TextEncoding {
        TextEncoding::from_selector(self.encoding)
    }
}
