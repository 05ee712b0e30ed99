//! USM streaming movie implementation
//!
//! A USM file opens with a `CRID` chunk holding the stream-info @UTF table:
//! row 0 describes the file itself, each further row declares one
//! elementary stream. The rest of the file is a sequence of interleaved
//! chunks tagged with their stream (`@SFV`, `@SFA`, ...), each 8 bytes of
//! tag and size followed by padding, payload and footer padding.

mod builder;
mod chunk;
mod demux;

pub use builder::{UsmBuilder, UsmStream};
pub use chunk::{
    CHUNK_HEADER_SIZE, CONTENTS_END, Chunk, ChunkHeader, CridHeader, PayloadKind,
    STANDARD_HEADER_PAD,
};
pub use demux::{DemuxState, Demuxer};

use crate::catalog::CatalogEntry;
use crate::error::{ContainerError, ContainerResult};
use crate::fourcc::FourCc;
use crate::utf::UtfTable;
use binrw::BinRead;
use std::io::{Read, Seek, SeekFrom};
use tracing::info;

/// Value of the CRID block type field
pub const CRID_BLOCK_TYPE: u32 = 1;

/// Parsed USM file metadata
#[derive(Debug, Clone)]
pub struct UsmFile {
    stream_table: UtfTable,
    entries: Vec<CatalogEntry>,
    chunks: Vec<Chunk>,
}

impl UsmFile {
    /// Scan a file whose `CRID` tag is at the current position
    pub fn read<R: Read + Seek>(reader: &mut R) -> ContainerResult<Self> {
        let start = reader.stream_position()?;
        let header = CridHeader::read(reader)?;
        validate_crid(&header)?;

        let stream_table = UtfTable::read(reader)?;
        let entries = declared_streams(&stream_table);

        reader.seek(SeekFrom::Start(start + 8 + u64::from(header.chunk_size)))?;

        let mut demuxer = Demuxer::new(reader, entries)?;
        demuxer.run()?;
        let (entries, chunks) = demuxer.finish();

        info!(
            streams = entries.len(),
            chunks = chunks.len(),
            "demultiplexed USM file"
        );

        Ok(Self {
            stream_table,
            entries,
            chunks,
        })
    }

    /// The CRID stream-info table
    pub fn stream_table(&self) -> &UtfTable {
        &self.stream_table
    }

    /// One entry per declared stream
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Every chunk in file order
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

fn validate_crid(header: &CridHeader) -> ContainerResult<()> {
    if header.magic != FourCc::CRID.0 {
        return Err(ContainerError::InvalidMagic {
            expected: FourCc::CRID,
            found: FourCc(header.magic),
        });
    }
    if header.header_size != STANDARD_HEADER_PAD {
        return Err(ContainerError::InvalidHeaderSize(header.header_size));
    }
    if header.block_type != CRID_BLOCK_TYPE {
        return Err(ContainerError::InvalidBlockType(header.block_type));
    }
    if header.zero_a != 0 {
        return Err(ContainerError::NonZeroReserved {
            field: "CRID reserved word 0",
            value: header.zero_a,
        });
    }
    if header.zero_b != 0 {
        return Err(ContainerError::NonZeroReserved {
            field: "CRID reserved word 1",
            value: header.zero_b,
        });
    }
    Ok(())
}

/// Catalog entries for stream-info rows 1..N
fn declared_streams(table: &UtfTable) -> Vec<CatalogEntry> {
    (1..table.row_count())
        .map(|row| {
            let name = table.get_str(row, "filename").unwrap_or_default().to_owned();
            let id = table
                .get_u64(row, "stmid")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or_default();

            let mut entry = CatalogEntry::from_stream(name, id);
            entry.size = table.get_u64(row, "filesize").unwrap_or_default();
            entry.extract_size = entry.size;
            entry.avbps = table
                .get_u64(row, "avbps")
                .and_then(|v| u32::try_from(v).ok());
            entry
        })
        .collect()
}
