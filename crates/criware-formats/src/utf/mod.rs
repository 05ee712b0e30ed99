//! @UTF schema table implementation
//!
//! @UTF is the self-describing binary table format CRIWare uses for every
//! piece of container metadata: CPK descriptors and tables of contents, USM
//! stream listings and per-stream properties.
//!
//! A packet is a 32-byte big-endian header, a list of field definitions,
//! fixed-width rows, a NUL-terminated string pool and a blob pool. Each field
//! is stored per row, as one shared constant, or not at all.
//!
//! # Features
//!
//! - Parser for all twelve value kinds
//! - Shift-JIS and UTF-8 string pools
//! - Builder producing packets the parser accepts

mod builder;
mod error;
mod header;
mod table;
mod value;

pub use builder::UtfBuilder;
pub use error::{UtfError, UtfResult};
pub use header::{OFFSET_BIAS, TextEncoding, UTF_HEADER_SIZE, UTF_MAGIC, UtfHeader};
pub use table::UtfTable;
pub use value::{
    FLAG_CONSTANT, FLAG_HAS_NAME, FLAG_PER_ROW, FieldStorage, KIND_MASK, UtfField, UtfValue,
    ValueKind,
};

use binrw::BinRead;
use std::io::{Read, Seek, SeekFrom};

/// Read one complete @UTF packet from the current position
///
/// Checks the magic, reads the declared size, rewinds over the 8-byte
/// preamble and returns `size + 8` bytes starting at the magic.
pub fn read_packet<R: Read + Seek>(reader: &mut R) -> UtfResult<Vec<u8>> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != UTF_MAGIC {
        return Err(UtfError::InvalidMagic(magic));
    }

    let size = u32::read_be(reader)?;
    reader.seek(SeekFrom::Current(-(OFFSET_BIAS as i64)))?;

    let expected = u64::from(size) + OFFSET_BIAS as u64;
    let mut packet = Vec::new();
    reader.by_ref().take(expected).read_to_end(&mut packet)?;
    if packet.len() as u64 != expected {
        return Err(UtfError::SizeMismatch {
            declared: expected as usize,
            actual: packet.len(),
        });
    }

    Ok(packet)
}

impl UtfTable {
    /// Read and decode one packet from the current position
    pub fn read<R: Read + Seek>(reader: &mut R) -> UtfResult<Self> {
        Self::parse(&read_packet(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn one_row_table() -> Vec<u8> {
        let mut builder = UtfBuilder::new("Inner");
        builder.add_field(UtfField::per_row("Value", ValueKind::U32));
        builder
            .add_row(vec![UtfValue::U32(42)])
            .expect("Test operation should succeed");
        builder.build().expect("Test operation should succeed")
    }

    #[test]
    fn test_read_packet_from_stream() {
        let packet = one_row_table();
        let mut stream = b"PAD!".to_vec();
        stream.extend_from_slice(&packet);
        stream.extend_from_slice(b"trailing bytes");

        let mut cursor = Cursor::new(stream);
        cursor.set_position(4);
        let read = read_packet(&mut cursor).expect("Test operation should succeed");

        assert_eq!(read, packet);
        assert_eq!(cursor.position(), 4 + packet.len() as u64);
    }

    #[test]
    fn test_read_table_from_stream() {
        let mut cursor = Cursor::new(one_row_table());
        let table = UtfTable::read(&mut cursor).expect("Test operation should succeed");
        assert_eq!(table.get_u64(0, "Value"), Some(42));
    }

    #[test]
    fn test_read_packet_truncated() {
        let packet = one_row_table();
        let mut cursor = Cursor::new(packet[..packet.len() - 1].to_vec());
        assert!(matches!(
            read_packet(&mut cursor),
            Err(UtfError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_read_packet_wrong_magic() {
        let mut cursor = Cursor::new(b"CPK \0\0\0\0".to_vec());
        assert!(matches!(
            read_packet(&mut cursor),
            Err(UtfError::InvalidMagic(m)) if &m == b"CPK "
        ));
    }
}
