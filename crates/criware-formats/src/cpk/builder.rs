//! CPK archive builder

use super::header::{MAX_CONTENT_BASE, SECTION_HEADER_SIZE, SectionHeader};
use crate::crilayla::{self, PREFIX_SIZE};
use crate::error::{ContainerError, ContainerResult};
use crate::fourcc::FourCc;
use crate::utf::{TextEncoding, UtfBuilder, UtfField, UtfValue, ValueKind};
use binrw::BinWrite;
use std::io::Cursor;
use tracing::debug;

/// Descriptor format version written by the builder
const CPK_VERSION: u16 = 7;

/// Default content alignment
pub const DEFAULT_ALIGNMENT: u64 = 0x800;

/// One file to be packed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpkFile {
    /// Directory path, empty for the root
    pub directory: String,
    /// File name
    pub name: String,
    /// Free-text annotation
    pub user_string: String,
    /// Numeric id
    pub id: u32,
    /// File contents
    pub data: Vec<u8>,
    /// Try CRILAYLA compression
    pub compress: bool,
    /// ETOC local directory (defaults to `directory`)
    pub local_dir: Option<String>,
    /// ETOC update timestamp
    pub update_date_time: u64,
}

impl CpkFile {
    /// File at `path`, split into directory and name at the last `/`
    pub fn new(path: &str, data: Vec<u8>) -> Self {
        let (directory, name) = path.rsplit_once('/').unwrap_or(("", path));
        Self {
            directory: directory.to_owned(),
            name: name.to_owned(),
            user_string: String::new(),
            id: 0,
            data,
            compress: false,
            local_dir: None,
            update_date_time: 0,
        }
    }

    /// Set the numeric id
    #[must_use]
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    /// Set the annotation
    #[must_use]
    pub fn with_user_string(mut self, user_string: impl Into<String>) -> Self {
        self.user_string = user_string.into();
        self
    }

    /// Request CRILAYLA compression
    ///
    /// Files of 256 bytes or less, or that do not shrink, are stored raw.
    #[must_use]
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Set the ETOC update timestamp
    #[must_use]
    pub fn with_update_date_time(mut self, stamp: u64) -> Self {
        self.update_date_time = stamp;
        self
    }

    /// Bytes as stored in the archive
    fn stored(&self) -> ContainerResult<Vec<u8>> {
        if self.compress && self.data.len() > PREFIX_SIZE {
            let mut prefix = [0u8; PREFIX_SIZE];
            prefix.copy_from_slice(&self.data[..PREFIX_SIZE]);
            let packed = crilayla::compress(&prefix, &self.data[PREFIX_SIZE..])?;
            if packed.len() < self.data.len() {
                return Ok(packed);
            }
        }
        Ok(self.data.clone())
    }
}

/// Builder for CPK archives
///
/// Layout: header and descriptor at 0, TOC at 0x800, file contents
/// aligned after the TOC, optional ETOC after the contents. TOC offsets
/// are relative to 0x800.
#[derive(Debug, Clone)]
pub struct CpkBuilder {
    files: Vec<CpkFile>,
    alignment: u64,
    etoc: bool,
    encoding: TextEncoding,
}

impl Default for CpkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CpkBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            alignment: DEFAULT_ALIGNMENT,
            etoc: false,
            encoding: TextEncoding::Utf8,
        }
    }

    /// Set the content alignment
    #[must_use]
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment.max(1);
        self
    }

    /// Write an ETOC section
    #[must_use]
    pub fn with_etoc(mut self, etoc: bool) -> Self {
        self.etoc = etoc;
        self
    }

    /// Set the string pool encoding of every table
    #[must_use]
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Append a file
    pub fn add_file(&mut self, file: CpkFile) -> &mut Self {
        self.files.push(file);
        self
    }

    /// Number of files added
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Serialize the archive
    pub fn build(&self) -> ContainerResult<Vec<u8>> {
        let stored = self
            .files
            .iter()
            .map(CpkFile::stored)
            .collect::<ContainerResult<Vec<_>>>()?;

        // Offsets are fixed-width, so a placeholder pass gives the final size
        let toc_len = self.toc_table(&vec![0; stored.len()], &stored)?.len() as u64;
        let toc_size = SECTION_HEADER_SIZE + toc_len;
        let content_start = self.align(MAX_CONTENT_BASE + toc_size);

        let mut offsets = Vec::with_capacity(stored.len());
        let mut content_end = content_start;
        for bytes in &stored {
            let position = self.align(content_end);
            offsets.push(position - MAX_CONTENT_BASE);
            content_end = position + bytes.len() as u64;
        }

        let toc = self.toc_table(&offsets, &stored)?;
        if toc.len() as u64 != toc_len {
            return Err(ContainerError::Build("TOC size changed between passes".into()));
        }

        let etoc = if self.etoc {
            Some(self.etoc_table()?)
        } else {
            None
        };
        let etoc_offset = self.align(content_end);

        let mut descriptor = UtfBuilder::new("CpkHeader").with_encoding(self.encoding);
        let mut row = Vec::new();
        let mut field = |name: &str, value: UtfValue| {
            descriptor.add_field(UtfField::per_row(name, value.kind()));
            row.push(value);
        };
        field("UpdateDateTime", UtfValue::U64(0));
        field("ContentOffset", UtfValue::U64(content_start));
        field("ContentSize", UtfValue::U64(content_end - content_start));
        field("TocOffset", UtfValue::U64(MAX_CONTENT_BASE));
        field("TocSize", UtfValue::U64(toc_size));
        if let Some(etoc) = &etoc {
            field("EtocOffset", UtfValue::U64(etoc_offset));
            field("EtocSize", UtfValue::U64(SECTION_HEADER_SIZE + etoc.len() as u64));
        }
        field("Files", UtfValue::U32(to_u32(stored.len(), "file count")?));
        field("Align", UtfValue::U16(u16::try_from(self.alignment).unwrap_or(u16::MAX)));
        field("Version", UtfValue::U16(CPK_VERSION));
        descriptor.add_row(row)?;
        let descriptor = descriptor.build()?;

        if SECTION_HEADER_SIZE + descriptor.len() as u64 > MAX_CONTENT_BASE {
            return Err(ContainerError::Build("descriptor does not fit before the TOC".into()));
        }

        let mut out = Vec::new();
        write_section(&mut out, FourCc::CPK, &descriptor)?;
        out.resize(MAX_CONTENT_BASE as usize, 0);
        write_section(&mut out, FourCc::TOC, &toc)?;

        for (bytes, offset) in stored.iter().zip(&offsets) {
            out.resize((MAX_CONTENT_BASE + offset) as usize, 0);
            out.extend_from_slice(bytes);
        }

        if let Some(etoc) = &etoc {
            out.resize(etoc_offset as usize, 0);
            write_section(&mut out, FourCc::ETOC, etoc)?;
        }

        debug!(
            files = self.files.len(),
            size = out.len(),
            "built CPK archive"
        );
        Ok(out)
    }

    fn align(&self, position: u64) -> u64 {
        position.div_ceil(self.alignment) * self.alignment
    }

    fn toc_table(&self, offsets: &[u64], stored: &[Vec<u8>]) -> ContainerResult<Vec<u8>> {
        let mut toc = UtfBuilder::new("CpkTocInfo").with_encoding(self.encoding);
        toc.add_field(UtfField::per_row("DirName", ValueKind::String))
            .add_field(UtfField::per_row("FileName", ValueKind::String))
            .add_field(UtfField::per_row("FileSize", ValueKind::U32))
            .add_field(UtfField::per_row("ExtractSize", ValueKind::U32))
            .add_field(UtfField::per_row("FileOffset", ValueKind::U64))
            .add_field(UtfField::per_row("ID", ValueKind::U32))
            .add_field(UtfField::per_row("UserString", ValueKind::String));

        for ((file, bytes), &offset) in self.files.iter().zip(stored).zip(offsets) {
            toc.add_row(vec![
                UtfValue::String(file.directory.clone()),
                UtfValue::String(file.name.clone()),
                UtfValue::U32(to_u32(bytes.len(), "stored file size")?),
                UtfValue::U32(to_u32(file.data.len(), "file size")?),
                UtfValue::U64(offset),
                UtfValue::U32(file.id),
                UtfValue::String(file.user_string.clone()),
            ])?;
        }

        Ok(toc.build()?)
    }

    fn etoc_table(&self) -> ContainerResult<Vec<u8>> {
        let mut etoc = UtfBuilder::new("CpkEtocInfo").with_encoding(self.encoding);
        etoc.add_field(UtfField::per_row("UpdateDateTime", ValueKind::U64))
            .add_field(UtfField::per_row("LocalDir", ValueKind::String));

        for file in &self.files {
            let local_dir = file.local_dir.as_ref().unwrap_or(&file.directory);
            etoc.add_row(vec![
                UtfValue::U64(file.update_date_time),
                UtfValue::String(local_dir.clone()),
            ])?;
        }

        Ok(etoc.build()?)
    }
}

fn write_section(out: &mut Vec<u8>, tag: FourCc, table: &[u8]) -> ContainerResult<()> {
    let mut cursor = Cursor::new(Vec::with_capacity(SECTION_HEADER_SIZE as usize));
    SectionHeader::new(tag, to_u32(table.len(), "table size")?).write(&mut cursor)?;
    out.extend_from_slice(&cursor.into_inner());
    out.extend_from_slice(table);
    Ok(())
}

fn to_u32(value: usize, what: &str) -> ContainerResult<u32> {
    u32::try_from(value).map_err(|_| ContainerError::Build(format!("{what} {value} exceeds 32 bits")))
}
