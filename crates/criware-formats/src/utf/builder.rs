//! @UTF table builder

use super::error::{UtfError, UtfResult};
use super::header::{OFFSET_BIAS, TextEncoding, UTF_HEADER_SIZE, UTF_MAGIC, UtfHeader};
use super::value::{FieldStorage, UtfField, UtfValue};
use binrw::BinWrite;
use std::collections::HashMap;
use std::io::Cursor;

/// First string in every pool, referenced by unset string values
const NULL_STRING: &str = "<NULL>";

/// Deduplicating string pool
struct StringPool {
    encoding: TextEncoding,
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringPool {
    fn new(encoding: TextEncoding) -> Self {
        let mut pool = Self {
            encoding,
            bytes: Vec::new(),
            offsets: HashMap::new(),
        };
        pool.intern(NULL_STRING);
        pool
    }

    fn intern(&mut self, text: &str) -> u32 {
        if let Some(&offset) = self.offsets.get(text) {
            return offset;
        }
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(&self.encoding.encode(text));
        self.bytes.push(0);
        self.offsets.insert(text.to_owned(), offset);
        offset
    }
}

/// Builder for @UTF tables
///
/// Fields are declared first; each row then supplies one value per
/// per-row field, in declaration order.
#[derive(Debug, Clone)]
pub struct UtfBuilder {
    name: String,
    encoding: TextEncoding,
    fields: Vec<UtfField>,
    rows: Vec<Vec<UtfValue>>,
}

impl UtfBuilder {
    /// Create a builder for a table named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            encoding: TextEncoding::Utf8,
            fields: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Set the string pool encoding
    #[must_use]
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Declare a field
    pub fn add_field(&mut self, field: UtfField) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Append a row of per-row values
    pub fn add_row(&mut self, values: Vec<UtfValue>) -> UtfResult<&mut Self> {
        let per_row: Vec<&UtfField> = self.fields.iter().filter(|f| f.is_per_row()).collect();

        if values.len() != per_row.len() {
            return Err(UtfError::RowMismatch(format!(
                "expected {} values, got {}",
                per_row.len(),
                values.len()
            )));
        }

        for (field, value) in per_row.iter().zip(&values) {
            if field.kind != value.kind() {
                return Err(UtfError::RowMismatch(format!(
                    "field {} expects {:?}, got {:?}",
                    field.name.as_deref().unwrap_or("<unnamed>"),
                    field.kind,
                    value.kind()
                )));
            }
        }

        self.rows.push(values);
        Ok(self)
    }

    /// Number of rows added so far
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Serialize the table into a complete packet
    pub fn build(&self) -> UtfResult<Vec<u8>> {
        let mut strings = StringPool::new(self.encoding);
        let table_name_offset = strings.intern(&self.name);
        let mut blobs = Vec::new();

        let mut field_section = Vec::new();
        for field in &self.fields {
            field_section.push(field.flags());
            if let Some(name) = &field.name {
                let offset = strings.intern(name);
                field_section.extend_from_slice(&offset.to_be_bytes());
            }
            if let FieldStorage::Constant(value) = &field.storage {
                write_value(&mut field_section, value, &mut strings, &mut blobs);
            }
        }

        let mut row_section = Vec::new();
        for row in &self.rows {
            for value in row {
                write_value(&mut row_section, value, &mut strings, &mut blobs);
            }
        }

        let row_size: usize = self
            .fields
            .iter()
            .filter(|f| f.is_per_row())
            .map(|f| f.kind.encoded_size())
            .sum();

        let rows_start = UTF_HEADER_SIZE + field_section.len();
        let strings_start = rows_start + row_section.len();
        let data_start = strings_start + strings.bytes.len();
        let total = data_start + blobs.len();

        let header = UtfHeader {
            magic: UTF_MAGIC,
            table_size: u32::try_from(total - OFFSET_BIAS)
                .map_err(|_| UtfError::TooLarge("table size"))?,
            reserved: 0,
            encoding: self.encoding.selector(),
            rows_offset: u16::try_from(rows_start - OFFSET_BIAS)
                .map_err(|_| UtfError::TooLarge("row offset"))?,
            strings_offset: u32::try_from(strings_start - OFFSET_BIAS)
                .map_err(|_| UtfError::TooLarge("string pool offset"))?,
            data_offset: u32::try_from(data_start - OFFSET_BIAS)
                .map_err(|_| UtfError::TooLarge("blob pool offset"))?,
            table_name_offset,
            field_count: u16::try_from(self.fields.len())
                .map_err(|_| UtfError::TooLarge("field count"))?,
            row_size: u16::try_from(row_size).map_err(|_| UtfError::TooLarge("row size"))?,
            row_count: u32::try_from(self.rows.len())
                .map_err(|_| UtfError::TooLarge("row count"))?,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(total));
        header.write(&mut cursor)?;
        let mut packet = cursor.into_inner();
        packet.extend_from_slice(&field_section);
        packet.extend_from_slice(&row_section);
        packet.extend_from_slice(&strings.bytes);
        packet.extend_from_slice(&blobs);

        Ok(packet)
    }
}

fn write_value(out: &mut Vec<u8>, value: &UtfValue, strings: &mut StringPool, blobs: &mut Vec<u8>) {
    match value {
        UtfValue::U8(v) => out.push(*v),
        UtfValue::I8(v) => out.extend_from_slice(&v.to_be_bytes()),
        UtfValue::U16(v) => out.extend_from_slice(&v.to_be_bytes()),
        UtfValue::I16(v) => out.extend_from_slice(&v.to_be_bytes()),
        UtfValue::U32(v) => out.extend_from_slice(&v.to_be_bytes()),
        UtfValue::I32(v) => out.extend_from_slice(&v.to_be_bytes()),
        UtfValue::U64(v) => out.extend_from_slice(&v.to_be_bytes()),
        UtfValue::I64(v) => out.extend_from_slice(&v.to_be_bytes()),
        UtfValue::F32(v) => out.extend_from_slice(&v.to_be_bytes()),
        UtfValue::F64(v) => out.extend_from_slice(&v.to_be_bytes()),
        UtfValue::String(s) => {
            let offset = strings.intern(s);
            out.extend_from_slice(&offset.to_be_bytes());
        }
        UtfValue::Data(bytes) => {
            let offset = blobs.len() as u32;
            blobs.extend_from_slice(bytes);
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        }
    }
}
