//! @UTF value kinds, values and field definitions

use serde::Serialize;
use std::fmt;

/// Flags bit: field has a name in the string pool
pub const FLAG_HAS_NAME: u8 = 0x10;
/// Flags bit: one value shared by every row, stored in the field definition
pub const FLAG_CONSTANT: u8 = 0x20;
/// Flags bit: one value per row, stored in the row section
pub const FLAG_PER_ROW: u8 = 0x40;
/// Low nibble of the flags byte selects the value kind
pub const KIND_MASK: u8 = 0x0F;

/// Value kind selected by the low nibble of a field's flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    /// Unsigned 8-bit integer
    U8 = 0x00,
    /// Signed 8-bit integer
    I8 = 0x01,
    /// Unsigned 16-bit integer
    U16 = 0x02,
    /// Signed 16-bit integer
    I16 = 0x03,
    /// Unsigned 32-bit integer
    U32 = 0x04,
    /// Signed 32-bit integer
    I32 = 0x05,
    /// Unsigned 64-bit integer
    U64 = 0x06,
    /// Signed 64-bit integer
    I64 = 0x07,
    /// 32-bit float
    F32 = 0x08,
    /// 64-bit float
    F64 = 0x09,
    /// String pool reference
    String = 0x0A,
    /// Blob pool reference (offset + length)
    Data = 0x0B,
}

impl ValueKind {
    /// Parse from the low nibble of a flags byte
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x00 => Some(Self::U8),
            0x01 => Some(Self::I8),
            0x02 => Some(Self::U16),
            0x03 => Some(Self::I16),
            0x04 => Some(Self::U32),
            0x05 => Some(Self::I32),
            0x06 => Some(Self::U64),
            0x07 => Some(Self::I64),
            0x08 => Some(Self::F32),
            0x09 => Some(Self::F64),
            0x0A => Some(Self::String),
            0x0B => Some(Self::Data),
            _ => None,
        }
    }

    /// Get the nibble representation
    pub fn as_nibble(self) -> u8 {
        self as u8
    }

    /// Bytes occupied by one encoded value in a row or field definition
    pub fn encoded_size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 | Self::String => 4,
            Self::U64 | Self::I64 | Self::F64 | Self::Data => 8,
        }
    }
}

/// A decoded table value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UtfValue {
    /// Unsigned 8-bit integer
    U8(u8),
    /// Signed 8-bit integer
    I8(i8),
    /// Unsigned 16-bit integer
    U16(u16),
    /// Signed 16-bit integer
    I16(i16),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Signed 32-bit integer
    I32(i32),
    /// Unsigned 64-bit integer
    U64(u64),
    /// Signed 64-bit integer
    I64(i64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Decoded string
    String(String),
    /// Raw blob bytes
    Data(Vec<u8>),
}

impl UtfValue {
    /// Kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::U8(_) => ValueKind::U8,
            Self::I8(_) => ValueKind::I8,
            Self::U16(_) => ValueKind::U16,
            Self::I16(_) => ValueKind::I16,
            Self::U32(_) => ValueKind::U32,
            Self::I32(_) => ValueKind::I32,
            Self::U64(_) => ValueKind::U64,
            Self::I64(_) => ValueKind::I64,
            Self::F32(_) => ValueKind::F32,
            Self::F64(_) => ValueKind::F64,
            Self::String(_) => ValueKind::String,
            Self::Data(_) => ValueKind::Data,
        }
    }

    /// Integer value widened to `u64`; `None` for negatives and non-integers
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::U8(v) => Some(u64::from(v)),
            Self::U16(v) => Some(u64::from(v)),
            Self::U32(v) => Some(u64::from(v)),
            Self::U64(v) => Some(v),
            Self::I8(v) => u64::try_from(v).ok(),
            Self::I16(v) => u64::try_from(v).ok(),
            Self::I32(v) => u64::try_from(v).ok(),
            Self::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Integer value widened to `i64`; `None` when it does not fit
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::U8(v) => Some(i64::from(v)),
            Self::U16(v) => Some(i64::from(v)),
            Self::U32(v) => Some(i64::from(v)),
            Self::U64(v) => i64::try_from(v).ok(),
            Self::I8(v) => Some(i64::from(v)),
            Self::I16(v) => Some(i64::from(v)),
            Self::I32(v) => Some(i64::from(v)),
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric value as `f64`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(f64::from(v)),
            Self::F64(v) => Some(v),
            _ => self
                .as_i64()
                .map(|v| v as f64)
                .or_else(|| self.as_u64().map(|v| v as f64)),
        }
    }

    /// String value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Blob value
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Data(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl fmt::Display for UtfValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Data(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// Where a field's values live
#[derive(Debug, Clone, PartialEq)]
pub enum FieldStorage {
    /// No value anywhere; every row reads as absent
    Zero,
    /// Single value stored in the field definition
    Constant(UtfValue),
    /// One value per row in the row section
    PerRow,
}

/// A field definition
#[derive(Debug, Clone, PartialEq)]
pub struct UtfField {
    /// Field name, if the has-name bit was set
    pub name: Option<String>,
    /// Value kind
    pub kind: ValueKind,
    /// Storage class
    pub storage: FieldStorage,
}

impl UtfField {
    /// Named field with one value per row
    pub fn per_row(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: Some(name.into()),
            kind,
            storage: FieldStorage::PerRow,
        }
    }

    /// Named field with a single shared value
    pub fn constant(name: impl Into<String>, value: UtfValue) -> Self {
        Self {
            name: Some(name.into()),
            kind: value.kind(),
            storage: FieldStorage::Constant(value),
        }
    }

    /// Named field without any stored value
    pub fn zero(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: Some(name.into()),
            kind,
            storage: FieldStorage::Zero,
        }
    }

    /// Flags byte as written in the field definition
    pub fn flags(&self) -> u8 {
        let storage = match self.storage {
            FieldStorage::Zero => 0,
            FieldStorage::Constant(_) => FLAG_CONSTANT,
            FieldStorage::PerRow => FLAG_PER_ROW,
        };
        let name = if self.name.is_some() { FLAG_HAS_NAME } else { 0 };
        storage | name | self.kind.as_nibble()
    }

    /// Whether this field is stored per row
    pub fn is_per_row(&self) -> bool {
        matches!(self.storage, FieldStorage::PerRow)
    }
}
