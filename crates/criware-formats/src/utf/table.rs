//! @UTF table parsing and lookup

use super::error::{UtfError, UtfResult};
use super::header::{TextEncoding, UTF_HEADER_SIZE, UTF_MAGIC, UtfHeader};
use super::value::{
    FLAG_CONSTANT, FLAG_HAS_NAME, FLAG_PER_ROW, FieldStorage, KIND_MASK, UtfField, UtfValue,
    ValueKind,
};
use binrw::BinRead;
use std::io::Cursor;
use tracing::debug;

/// Cursor and pool bases shared by every decode step of one packet
struct ParseContext<'a> {
    cursor: Cursor<&'a [u8]>,
    strings_start: usize,
    data_start: usize,
    encoding: TextEncoding,
}

impl<'a> ParseContext<'a> {
    fn packet(&self) -> &'a [u8] {
        *self.cursor.get_ref()
    }

    fn read_value(&mut self, kind: ValueKind) -> UtfResult<UtfValue> {
        let cursor = &mut self.cursor;
        let value = match kind {
            ValueKind::U8 => UtfValue::U8(u8::read_be(cursor)?),
            ValueKind::I8 => UtfValue::I8(i8::read_be(cursor)?),
            ValueKind::U16 => UtfValue::U16(u16::read_be(cursor)?),
            ValueKind::I16 => UtfValue::I16(i16::read_be(cursor)?),
            ValueKind::U32 => UtfValue::U32(u32::read_be(cursor)?),
            ValueKind::I32 => UtfValue::I32(i32::read_be(cursor)?),
            ValueKind::U64 => UtfValue::U64(u64::read_be(cursor)?),
            ValueKind::I64 => UtfValue::I64(i64::read_be(cursor)?),
            ValueKind::F32 => UtfValue::F32(f32::read_be(cursor)?),
            ValueKind::F64 => UtfValue::F64(f64::read_be(cursor)?),
            ValueKind::String => {
                let offset = u32::read_be(cursor)?;
                UtfValue::String(self.read_string(offset)?)
            }
            ValueKind::Data => {
                let offset = u32::read_be(cursor)?;
                let len = u32::read_be(cursor)?;
                UtfValue::Data(self.read_blob(offset, len)?)
            }
        };
        Ok(value)
    }

    /// NUL-terminated string at `offset` within the string pool
    fn read_string(&self, offset: u32) -> UtfResult<String> {
        let packet = self.packet();
        let start = self.strings_start + offset as usize;
        let tail = packet.get(start..).ok_or(UtfError::OutOfBounds {
            what: "string",
            offset: start,
            len: packet.len(),
        })?;
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(UtfError::UnterminatedString(offset as usize))?;
        Ok(self.encoding.decode(&tail[..end]))
    }

    fn read_blob(&self, offset: u32, len: u32) -> UtfResult<Vec<u8>> {
        let packet = self.packet();
        let start = self.data_start + offset as usize;
        let out_of_bounds = UtfError::OutOfBounds {
            what: "blob",
            offset: start,
            len: packet.len(),
        };
        let end = start.checked_add(len as usize).ok_or(out_of_bounds)?;
        packet
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or(UtfError::OutOfBounds {
                what: "blob",
                offset: start,
                len: packet.len(),
            })
    }
}

/// A fully decoded @UTF table
#[derive(Debug, Clone, PartialEq)]
///
/// Only per-row values are stored per row; constants live once in their
/// field definition.
pub struct UtfTable {
    header: UtfHeader,
    name: Option<String>,
    fields: Vec<UtfField>,
    /// Slot of each field within a stored row, per-row fields only
    slots: Vec<Option<usize>>,
    row_count: usize,
    rows: Vec<Vec<UtfValue>>,
}

impl UtfTable {
    /// Decode one complete packet starting with `@UTF`
    pub fn parse(packet: &[u8]) -> UtfResult<Self> {
        let mut magic = [0u8; 4];
        let available = packet.len().min(magic.len());
        magic[..available].copy_from_slice(&packet[..available]);
        if magic != UTF_MAGIC {
            return Err(UtfError::InvalidMagic(magic));
        }

        if packet.len() < UTF_HEADER_SIZE {
            return Err(UtfError::OutOfBounds {
                what: "header",
                offset: UTF_HEADER_SIZE,
                len: packet.len(),
            });
        }

        let mut cursor = Cursor::new(packet);
        let header = UtfHeader::read(&mut cursor)?;

        if header.packet_size() > packet.len() {
            return Err(UtfError::SizeMismatch {
                declared: header.packet_size(),
                actual: packet.len(),
            });
        }

        let mut ctx = ParseContext {
            cursor,
            strings_start: header.strings_start(),
            data_start: header.data_start(),
            encoding: header.text_encoding(),
        };

        let mut fields = Vec::with_capacity(usize::from(header.field_count));
        for index in 0..usize::from(header.field_count) {
            let flags = u8::read_be(&mut ctx.cursor)?;
            let nibble = flags & KIND_MASK;
            let kind = ValueKind::from_nibble(nibble).ok_or(UtfError::UnknownValueKind {
                field: index,
                kind: nibble,
            })?;

            let name = if flags & FLAG_HAS_NAME != 0 {
                let offset = u32::read_be(&mut ctx.cursor)?;
                Some(ctx.read_string(offset)?)
            } else {
                None
            };

            // Constant wins when both storage bits are set
            let storage = if flags & FLAG_CONSTANT != 0 {
                FieldStorage::Constant(ctx.read_value(kind)?)
            } else if flags & FLAG_PER_ROW != 0 {
                FieldStorage::PerRow
            } else {
                FieldStorage::Zero
            };

            fields.push(UtfField {
                name,
                kind,
                storage,
            });
        }

        let rows_start = header.rows_start();
        if rows_start > packet.len() {
            return Err(UtfError::OutOfBounds {
                what: "row section",
                offset: rows_start,
                len: packet.len(),
            });
        }

        let mut slots = Vec::with_capacity(fields.len());
        let mut per_row = Vec::new();
        for field in &fields {
            if field.is_per_row() {
                slots.push(Some(per_row.len()));
                per_row.push(field.kind);
            } else {
                slots.push(None);
            }
        }

        let row_count = header.row_count as usize;
        let row_width: usize = per_row.iter().map(|kind| kind.encoded_size()).sum();
        if row_width > 0 {
            let rows_end = (rows_start as u64)
                .saturating_add(u64::from(header.row_count).saturating_mul(row_width as u64));
            if rows_end > packet.len() as u64 {
                return Err(UtfError::SizeMismatch {
                    declared: usize::try_from(rows_end).unwrap_or(usize::MAX),
                    actual: packet.len(),
                });
            }
        }

        ctx.cursor.set_position(rows_start as u64);
        let stored_rows = if per_row.is_empty() { 0 } else { row_count };
        let mut rows = Vec::with_capacity(stored_rows);
        for _ in 0..stored_rows {
            let mut row = Vec::with_capacity(per_row.len());
            for &kind in &per_row {
                row.push(ctx.read_value(kind)?);
            }
            rows.push(row);
        }

        let name = ctx.read_string(header.table_name_offset).ok();

        debug!(
            table = name.as_deref().unwrap_or("<unnamed>"),
            fields = fields.len(),
            rows = row_count,
            "parsed @UTF table"
        );

        Ok(Self {
            header,
            name,
            fields,
            slots,
            row_count,
            rows,
        })
    }

    /// Raw header
    pub fn header(&self) -> &UtfHeader {
        &self.header
    }

    /// Table name from the string pool, if it resolves
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Text encoding of the string pool
    pub fn encoding(&self) -> TextEncoding {
        self.header.text_encoding()
    }

    /// Number of field definitions
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Field definitions in declaration order
    pub fn fields(&self) -> &[UtfField] {
        &self.fields
    }

    /// Check whether a field with this name is declared
    pub fn has_field(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    /// Position of the first field with this name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.name.as_deref() == Some(name))
    }

    /// All values of one row, in field order
    pub fn row(&self, index: usize) -> Option<Vec<Option<&UtfValue>>> {
        (index < self.row_count).then(|| {
            (0..self.fields.len())
                .map(|column| self.value_at(index, column))
                .collect()
        })
    }

    /// Value of `name` in row `row`
    ///
    /// Returns `None` when the field is not declared, the row does not exist,
    /// or the field stores no value.
    pub fn get(&self, row: usize, name: &str) -> Option<&UtfValue> {
        let column = self.field_index(name)?;
        self.value_at(row, column)
    }

    fn value_at(&self, row: usize, column: usize) -> Option<&UtfValue> {
        if row >= self.row_count {
            return None;
        }
        match &self.fields.get(column)?.storage {
            FieldStorage::Constant(value) => Some(value),
            FieldStorage::PerRow => self.rows.get(row)?.get(self.slots[column]?),
            FieldStorage::Zero => None,
        }
    }

    /// Integer value of `name` in row `row`
    pub fn get_u64(&self, row: usize, name: &str) -> Option<u64> {
        self.get(row, name).and_then(UtfValue::as_u64)
    }

    /// String value of `name` in row `row`
    pub fn get_str(&self, row: usize, name: &str) -> Option<&str> {
        self.get(row, name).and_then(UtfValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utf::UtfBuilder;
    use pretty_assertions::assert_eq;

    fn sample_table() -> Vec<u8> {
        let mut builder = UtfBuilder::new("CpkTocInfo");
        builder
            .add_field(UtfField::per_row("FileName", ValueKind::String))
            .add_field(UtfField::per_row("FileSize", ValueKind::U32))
            .add_field(UtfField::constant("Align", UtfValue::U16(0x800)))
            .add_field(UtfField::zero("UserString", ValueKind::String))
            .add_field(UtfField::per_row("Crc", ValueKind::Data));
        builder
            .add_row(vec![
                UtfValue::String("a.bin".into()),
                UtfValue::U32(10),
                UtfValue::Data(vec![1, 2, 3]),
            ])
            .expect("Test operation should succeed");
        builder
            .add_row(vec![
                UtfValue::String("b.bin".into()),
                UtfValue::U32(20),
                UtfValue::Data(vec![]),
            ])
            .expect("Test operation should succeed");
        builder.build().expect("Test operation should succeed")
    }

    #[test]
    fn test_parse_fields_and_rows() {
        let table = UtfTable::parse(&sample_table()).expect("Test operation should succeed");

        assert_eq!(table.name(), Some("CpkTocInfo"));
        assert_eq!(table.field_count(), 5);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get_str(0, "FileName"), Some("a.bin"));
        assert_eq!(table.get_str(1, "FileName"), Some("b.bin"));
        assert_eq!(table.get_u64(1, "FileSize"), Some(20));
        assert_eq!(
            table.get(0, "Crc").and_then(UtfValue::as_bytes),
            Some(&[1u8, 2, 3][..])
        );
    }

    #[test]
    fn test_constant_shared_by_all_rows() {
        let table = UtfTable::parse(&sample_table()).expect("Test operation should succeed");

        assert_eq!(table.get(0, "Align"), Some(&UtfValue::U16(0x800)));
        assert_eq!(table.get(1, "Align"), Some(&UtfValue::U16(0x800)));
    }

    #[test]
    fn test_absent_results() {
        let table = UtfTable::parse(&sample_table()).expect("Test operation should succeed");

        // Declared without storage
        assert!(table.has_field("UserString"));
        assert_eq!(table.get(0, "UserString"), None);

        // Not declared at all
        assert!(!table.has_field("EtocOffset"));
        assert_eq!(table.get(0, "EtocOffset"), None);

        // Row past the end
        assert_eq!(table.get(2, "FileName"), None);
    }

    #[test]
    fn test_invalid_magic() {
        let mut packet = sample_table();
        packet[0] = b'#';

        let err = UtfTable::parse(&packet).expect_err("Test operation should fail");
        assert!(matches!(err, UtfError::InvalidMagic(m) if &m == b"#UTF"));
    }

    #[test]
    fn test_short_packet() {
        assert!(matches!(
            UtfTable::parse(b"@U"),
            Err(UtfError::InvalidMagic(_))
        ));
        assert!(matches!(
            UtfTable::parse(b"@UTF\0\0\0\x10"),
            Err(UtfError::OutOfBounds { what: "header", .. })
        ));
    }

    #[test]
    fn test_truncated_packet() {
        let packet = sample_table();
        let err = UtfTable::parse(&packet[..packet.len() - 4]).expect_err("Test operation should fail");
        assert!(matches!(err, UtfError::SizeMismatch { .. }));
    }

    /// Overwrite the header's row count
    fn patch_row_count(packet: &mut [u8], rows: u32) {
        packet[28..32].copy_from_slice(&rows.to_be_bytes());
    }

    #[test]
    fn test_row_count_beyond_packet() {
        let mut packet = sample_table();
        patch_row_count(&mut packet, u32::MAX);

        let err = UtfTable::parse(&packet).expect_err("Test operation should fail");
        assert!(matches!(
            err,
            UtfError::SizeMismatch { actual, .. } if actual == packet.len()
        ));
    }

    #[test]
    fn test_rows_without_per_row_fields_share_constants() {
        let mut builder = UtfBuilder::new("Stub");
        builder
            .add_field(UtfField::constant("Blob", UtfValue::Data(vec![0xAB; 4096])))
            .add_field(UtfField::zero("Unused", ValueKind::U32));
        let mut packet = builder.build().expect("Test operation should succeed");
        patch_row_count(&mut packet, 20_000_000);

        let table = UtfTable::parse(&packet).expect("Test operation should succeed");
        assert_eq!(table.row_count(), 20_000_000);

        let last = table.get(19_999_999, "Blob").and_then(UtfValue::as_bytes);
        assert_eq!(last.map(<[u8]>::len), Some(4096));
        assert_eq!(table.get(19_999_999, "Unused"), None);
        assert_eq!(table.get(20_000_000, "Blob"), None);

        let row = table.row(5).expect("Test operation should succeed");
        assert_eq!(row.len(), 2);
        assert!(row[0].is_some());
        assert!(row[1].is_none());
        assert!(table.row(20_000_000).is_none());
    }

    #[test]
    fn test_unknown_value_kind() {
        let mut packet = sample_table();
        // First field definition starts right after the header
        packet[UTF_HEADER_SIZE] = FLAG_HAS_NAME | FLAG_PER_ROW | 0x0E;

        let err = UtfTable::parse(&packet).expect_err("Test operation should fail");
        assert!(matches!(
            err,
            UtfError::UnknownValueKind { field: 0, kind: 0x0E }
        ));
    }

    #[test]
    fn test_string_pool_out_of_bounds() {
        let mut packet = sample_table();
        // Name offset of the first field
        packet[UTF_HEADER_SIZE + 1..UTF_HEADER_SIZE + 5].copy_from_slice(&0xFFFF_0000u32.to_be_bytes());

        let err = UtfTable::parse(&packet).expect_err("Test operation should fail");
        assert!(matches!(err, UtfError::OutOfBounds { what: "string", .. }));
    }

    #[test]
    fn test_shift_jis_strings() {
        let mut builder = UtfBuilder::new("VIDEO_HDRINFO").with_encoding(TextEncoding::ShiftJis);
        builder.add_field(UtfField::per_row("filename", ValueKind::String));
        builder
            .add_row(vec![UtfValue::String("オープニング.m2v".into())])
            .expect("Test operation should succeed");
        let packet = builder.build().expect("Test operation should succeed");

        let table = UtfTable::parse(&packet).expect("Test operation should succeed");
        assert_eq!(table.encoding(), TextEncoding::ShiftJis);
        assert_eq!(table.get_str(0, "filename"), Some("オープニング.m2v"));
    }

    #[test]
    fn test_every_value_kind() {
        let values = vec![
            UtfValue::U8(0xFE),
            UtfValue::I8(-2),
            UtfValue::U16(0xBEEF),
            UtfValue::I16(-300),
            UtfValue::U32(0xDEAD_BEEF),
            UtfValue::I32(-70_000),
            UtfValue::U64(0x0123_4567_89AB_CDEF),
            UtfValue::I64(-5_000_000_000),
            UtfValue::F32(29.97),
            UtfValue::F64(1.0 / 3.0),
            UtfValue::String("text".into()),
            UtfValue::Data(vec![0xAA; 5]),
        ];

        let mut builder = UtfBuilder::new("Kinds");
        for (i, value) in values.iter().enumerate() {
            builder.add_field(UtfField::per_row(format!("f{i}"), value.kind()));
        }
        builder
            .add_row(values.clone())
            .expect("Test operation should succeed");
        let packet = builder.build().expect("Test operation should succeed");

        let table = UtfTable::parse(&packet).expect("Test operation should succeed");
        let row: Vec<UtfValue> = table
            .row(0)
            .expect("row 0")
            .iter()
            .map(|v| v.expect("value present").clone())
            .collect();
        assert_eq!(row, values);
    }
}
