//! CPK section headers

use crate::fourcc::FourCc;
use binrw::{BinRead, BinWrite};

/// Size of the header in front of every CPK table
pub const SECTION_HEADER_SIZE: u64 = 16;

/// TOC offsets above this value are clamped when deriving the content base
pub const MAX_CONTENT_BASE: u64 = 0x800;

/// Flags value written by CRI tools
pub const SECTION_FLAGS: u32 = 0xFF;

/// Header preceding the descriptor, TOC and ETOC tables
///
/// Only the tag is validated; the rest is informational.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct SectionHeader {
    /// Section tag: "CPK ", "TOC " or "ETOC"
    pub tag: [u8; 4],

    /// Always 0xFF in files written by CRI tools
    pub flags: u32,

    /// Size of the following @UTF packet
    pub packet_size: u32,

    /// Reserved, always 0
    pub reserved: u32,
}

impl SectionHeader {
    /// Header for a table of `packet_size` bytes
    pub fn new(tag: FourCc, packet_size: u32) -> Self {
        Self {
            tag: tag.0,
            flags: SECTION_FLAGS,
            packet_size,
            reserved: 0,
        }
    }

    /// Section tag
    pub fn tag(&self) -> FourCc {
        FourCc(self.tag)
    }
}

/// Base that TOC file offsets are relative to
///
/// The TOC offset is clamped to 0x800; a smaller `ContentOffset` wins.
pub fn content_base(toc_offset: u64, content_offset: Option<u64>) -> u64 {
    let clamped = toc_offset.min(MAX_CONTENT_BASE);
    match content_offset {
        Some(content) if content < clamped => content,
        _ => clamped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinReaderExt;
    use std::io::Cursor;

    #[test]
    fn test_content_base_clamps_toc_offset() {
        assert_eq!(content_base(0x1000, None), 0x800);
        assert_eq!(content_base(0x1000, Some(0x4000)), 0x800);
        assert_eq!(content_base(0x1000, Some(0x600)), 0x600);
        assert_eq!(content_base(0x400, Some(0x800)), 0x400);
    }

    #[test]
    fn test_section_header_layout() {
        let header = SectionHeader::new(FourCc::TOC, 0x1234);
        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).expect("Test operation should succeed");
        let bytes = cursor.into_inner();

        assert_eq!(bytes.len() as u64, SECTION_HEADER_SIZE);
        assert_eq!(&bytes[..4], b"TOC ");
        assert_eq!(&bytes[4..8], &[0xFF, 0, 0, 0]);

        let parsed: SectionHeader = Cursor::new(bytes)
            .read_le()
            .expect("Test operation should succeed");
        assert_eq!(parsed.tag(), FourCc::TOC);
        assert_eq!(parsed.packet_size, 0x1234);
    }
}
