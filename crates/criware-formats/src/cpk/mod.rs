//! CPK packed archive implementation
//!
//! A CPK starts with a 16-byte `CPK ` section header followed by the
//! descriptor @UTF table. The descriptor points at the TOC (one row per
//! file) and optionally the ETOC (extra per-file metadata, matched by row
//! order). Each section is a 16-byte header plus one @UTF table.
//!
//! File offsets in the TOC are relative to a content base derived from
//! the descriptor's `TocOffset` (clamped to 0x800) and `ContentOffset`.

mod builder;
mod header;

pub use builder::{CpkBuilder, CpkFile, DEFAULT_ALIGNMENT};
pub use header::{
    MAX_CONTENT_BASE, SECTION_FLAGS, SECTION_HEADER_SIZE, SectionHeader, content_base,
};

use crate::catalog::{CatalogEntry, find_overlaps};
use crate::error::{ContainerError, ContainerResult};
use crate::fourcc::FourCc;
use crate::utf::UtfTable;
use binrw::BinRead;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, info, warn};

/// Parsed CPK archive metadata
#[derive(Debug, Clone)]
pub struct CpkArchive {
    descriptor: UtfTable,
    content_base: Option<u64>,
    entries: Vec<CatalogEntry>,
}

impl CpkArchive {
    /// Scan an archive whose `CPK ` tag is at the current position
    pub fn read<R: Read + Seek>(reader: &mut R) -> ContainerResult<Self> {
        let descriptor = read_section(reader, FourCc::CPK)?;

        let mut content_base = None;
        let mut entries = Vec::new();

        if let Some(toc_offset) = descriptor_offset(&descriptor, "TocOffset") {
            let base = header::content_base(toc_offset, descriptor.get_u64(0, "ContentOffset"));
            debug!(toc_offset, base, "reading CPK table of contents");

            reader.seek(SeekFrom::Start(toc_offset))?;
            let toc = read_section(reader, FourCc::TOC)?;
            entries = toc_entries(&toc, base);
            content_base = Some(base);
        }

        if let Some(etoc_offset) = descriptor_offset(&descriptor, "EtocOffset") {
            debug!(etoc_offset, "reading CPK extended table of contents");

            reader.seek(SeekFrom::Start(etoc_offset))?;
            let etoc = read_section(reader, FourCc::ETOC)?;
            if etoc.row_count() < entries.len() {
                warn!(
                    rows = etoc.row_count(),
                    entries = entries.len(),
                    "ETOC has fewer rows than the TOC"
                );
            }

            for (row, entry) in entries.iter_mut().enumerate() {
                entry.local_dir = etoc.get_str(row, "LocalDir").map(str::to_owned);
                entry.update_date_time = etoc.get_u64(row, "UpdateDateTime");
            }
        }

        for (first, second) in find_overlaps(&entries) {
            warn!(
                first = %entries[first].path(),
                second = %entries[second].path(),
                "CPK entries overlap"
            );
        }

        info!(entries = entries.len(), ?content_base, "scanned CPK archive");

        Ok(Self {
            descriptor,
            content_base,
            entries,
        })
    }

    /// The descriptor table
    pub fn descriptor(&self) -> &UtfTable {
        &self.descriptor
    }

    /// Content base, when the archive has a TOC
    pub fn content_base(&self) -> Option<u64> {
        self.content_base
    }

    /// Catalog in TOC row order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

/// Read a 16-byte section header with the expected tag and its table
fn read_section<R: Read + Seek>(reader: &mut R, expected: FourCc) -> ContainerResult<UtfTable> {
    let header = SectionHeader::read(reader)?;
    if header.tag() != expected {
        return Err(ContainerError::InvalidMagic {
            expected,
            found: header.tag(),
        });
    }
    Ok(UtfTable::read(reader)?)
}

/// Section offset from descriptor row 0; zero means the section is absent
fn descriptor_offset(descriptor: &UtfTable, field: &str) -> Option<u64> {
    descriptor.get_u64(0, field).filter(|&offset| offset != 0)
}

fn toc_entries(toc: &UtfTable, base: u64) -> Vec<CatalogEntry> {
    (0..toc.row_count())
        .map(|row| {
            let text = |field: &str| toc.get_str(row, field).unwrap_or_default().to_owned();
            let number = |field: &str| toc.get_u64(row, field).unwrap_or_default();

            let mut entry = CatalogEntry::from_toc(text("FileName"), text("DirName"), base);
            entry.user_string = text("UserString");
            entry.offset = number("FileOffset");
            entry.size = number("FileSize");
            entry.extract_size = number("ExtractSize");
            entry.id = u32::try_from(number("ID")).unwrap_or_default();
            entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utf::{UtfBuilder, UtfField, UtfValue, ValueKind};
    use binrw::BinWrite;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn section(tag: FourCc, table: &[u8]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        SectionHeader::new(tag, table.len() as u32)
            .write(&mut cursor)
            .expect("Test operation should succeed");
        let mut bytes = cursor.into_inner();
        bytes.extend_from_slice(table);
        bytes
    }

    fn descriptor(fields: Vec<(&str, UtfValue)>) -> Vec<u8> {
        let mut builder = UtfBuilder::new("CpkHeader");
        let mut row = Vec::new();
        for (name, value) in fields {
            builder.add_field(UtfField::per_row(name, value.kind()));
            row.push(value);
        }
        builder.add_row(row).expect("Test operation should succeed");
        builder.build().expect("Test operation should succeed")
    }

    #[test]
    fn test_toc_offset_above_limit_is_clamped() {
        let mut toc = UtfBuilder::new("CpkTocInfo");
        toc.add_field(UtfField::per_row("FileName", ValueKind::String))
            .add_field(UtfField::zero("DirName", ValueKind::String))
            .add_field(UtfField::per_row("FileOffset", ValueKind::U64))
            .add_field(UtfField::per_row("FileSize", ValueKind::U32))
            .add_field(UtfField::per_row("ExtractSize", ValueKind::U32));
        toc.add_row(vec![
            UtfValue::String("a.bin".into()),
            UtfValue::U64(0x20),
            UtfValue::U32(4),
            UtfValue::U32(4),
        ])
        .expect("Test operation should succeed");
        let toc = toc.build().expect("Test operation should succeed");

        let mut data = section(
            FourCc::CPK,
            &descriptor(vec![("TocOffset", UtfValue::U64(0x1000))]),
        );
        data.resize(0x1000, 0);
        data.extend_from_slice(&section(FourCc::TOC, &toc));

        let archive = CpkArchive::read(&mut Cursor::new(data)).expect("Test operation should succeed");
        assert_eq!(archive.content_base(), Some(0x800));

        let entry = &archive.entries()[0];
        assert_eq!(entry.name, "a.bin");
        assert_eq!(entry.directory, "");
        assert_eq!(entry.user_string, "");
        assert_eq!(entry.id, 0);
        assert_eq!(entry.absolute_offset(), 0x820);
    }

    #[test]
    fn test_descriptor_without_toc() {
        let data = section(
            FourCc::CPK,
            &descriptor(vec![("Files", UtfValue::U32(0))]),
        );
        let archive = CpkArchive::read(&mut Cursor::new(data)).expect("Test operation should succeed");
        assert!(archive.entries().is_empty());
        assert_eq!(archive.content_base(), None);
    }

    #[test]
    fn test_wrong_toc_tag() {
        let mut data = section(
            FourCc::CPK,
            &descriptor(vec![("TocOffset", UtfValue::U64(0x800))]),
        );
        data.resize(0x800, 0);
        data.extend_from_slice(&section(FourCc::ETOC, &descriptor(vec![])));

        let err = CpkArchive::read(&mut Cursor::new(data)).expect_err("Test operation should fail");
        assert!(matches!(
            err,
            ContainerError::InvalidMagic {
                expected: FourCc::TOC,
                ..
            }
        ));
        assert!(err.is_format_error());
    }
}
