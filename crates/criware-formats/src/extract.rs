//! Asset extraction
//!
//! CPK entries are a byte range, CRILAYLA-decoded when stored and logical
//! sizes differ. USM streams are the concatenated data payloads of every
//! chunk of the stream's class.

use crate::catalog::{AssetClass, CatalogEntry};
use crate::crilayla;
use crate::error::ContainerResult;
use crate::usm::{Chunk, PayloadKind};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::debug;

/// Default sink write size
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default number of blocks between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 32;

/// Options for writing an asset to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Bytes per sink write
    pub block_size: usize,
    /// Blocks between progress reports
    pub progress_interval: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// Writes fixed-size blocks to a sink and reports progress
pub struct BlockWriter<'a, W, F> {
    sink: &'a mut W,
    progress: F,
    options: ExtractOptions,
    total: u64,
    done: u64,
    blocks: u64,
    buffer: Vec<u8>,
}

impl<'a, W: Write, F: FnMut(u64, u64)> BlockWriter<'a, W, F> {
    /// Writer for an asset of `total` bytes
    pub fn new(sink: &'a mut W, total: u64, options: ExtractOptions, progress: F) -> Self {
        let options = ExtractOptions {
            block_size: options.block_size.max(1),
            progress_interval: options.progress_interval.max(1),
        };
        Self {
            sink,
            progress,
            options,
            total,
            done: 0,
            blocks: 0,
            buffer: Vec::with_capacity(options.block_size),
        }
    }

    /// Queue bytes, flushing every full block
    pub fn write(&mut self, mut data: &[u8]) -> ContainerResult<()> {
        while !data.is_empty() {
            let room = self.options.block_size - self.buffer.len();
            let take = room.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.buffer.len() == self.options.block_size {
                self.flush_block()?;
            }
        }
        Ok(())
    }

    /// Stream `len` bytes from `reader`
    pub fn copy_from<R: Read>(&mut self, reader: &mut R, len: u64) -> ContainerResult<()> {
        let mut remaining = len;
        let mut chunk = vec![0u8; self.options.block_size];
        while remaining > 0 {
            let take = remaining.min(chunk.len() as u64) as usize;
            reader.read_exact(&mut chunk[..take])?;
            self.write(&chunk[..take])?;
            remaining -= take as u64;
        }
        Ok(())
    }

    /// Flush the partial block and send the final report
    pub fn finish(mut self) -> ContainerResult<u64> {
        if !self.buffer.is_empty() {
            self.flush_block()?;
        }
        self.sink.flush()?;
        (self.progress)(self.total, self.total);
        Ok(self.done)
    }

    fn flush_block(&mut self) -> ContainerResult<()> {
        self.sink.write_all(&self.buffer)?;
        self.done += self.buffer.len() as u64;
        self.buffer.clear();
        self.blocks += 1;
        if self.blocks % self.options.progress_interval == 0 {
            (self.progress)(self.done, self.total);
        }
        Ok(())
    }
}

/// Logical bytes of a decoded CPK entry
///
/// CRI tools record either the payload size or the payload plus the
/// 256-byte prefix as the extract size; the prefix is kept in the latter case.
fn logical_bytes(decoded: crilayla::Decompressed, extract_size: u64) -> Vec<u8> {
    let with_prefix = (decoded.prefix.len() + decoded.payload.len()) as u64;
    if extract_size == with_prefix {
        let mut bytes = decoded.prefix;
        bytes.extend_from_slice(&decoded.payload);
        bytes
    } else {
        decoded.payload
    }
}

fn read_stored<R: Read + Seek>(reader: &mut R, entry: &CatalogEntry) -> ContainerResult<Vec<u8>> {
    reader.seek(SeekFrom::Start(entry.absolute_offset()))?;
    let mut stored = Vec::new();
    reader.by_ref().take(entry.size).read_to_end(&mut stored)?;
    if (stored.len() as u64) < entry.size {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(stored)
}

/// Read a CPK entry fully into memory
pub fn read_archive_entry<R: Read + Seek>(
    reader: &mut R,
    entry: &CatalogEntry,
) -> ContainerResult<Vec<u8>> {
    let stored = read_stored(reader, entry)?;
    if !entry.is_compressed() {
        return Ok(stored);
    }

    debug!(name = %entry.path(), size = entry.size, "decompressing CPK entry");
    let decoded = crilayla::decompress_parts(&stored)?;
    Ok(logical_bytes(decoded, entry.extract_size))
}

/// Write a CPK entry to `sink`
///
/// Raw entries stream from the source; compressed entries are decoded in
/// memory first.
pub fn write_archive_entry<R, W, F>(
    reader: &mut R,
    entry: &CatalogEntry,
    sink: &mut W,
    options: ExtractOptions,
    progress: F,
) -> ContainerResult<u64>
where
    R: Read + Seek,
    W: Write,
    F: FnMut(u64, u64),
{
    if entry.is_compressed() {
        let bytes = read_archive_entry(reader, entry)?;
        let mut writer = BlockWriter::new(sink, bytes.len() as u64, options, progress);
        writer.write(&bytes)?;
        return writer.finish();
    }

    reader.seek(SeekFrom::Start(entry.absolute_offset()))?;
    let mut writer = BlockWriter::new(sink, entry.size, options, progress);
    writer.copy_from(reader, entry.size)?;
    writer.finish()
}

/// Data chunks belonging to a stream class
pub fn stream_chunks(chunks: &[Chunk], class: AssetClass) -> impl Iterator<Item = &Chunk> {
    chunks
        .iter()
        .filter(move |chunk| chunk.kind == PayloadKind::Data && chunk.class == class)
}

/// Read every data payload of `class` into memory
pub fn read_stream<R: Read + Seek>(
    reader: &mut R,
    chunks: &[Chunk],
    class: AssetClass,
) -> ContainerResult<Vec<u8>> {
    let mut out = Vec::new();
    for chunk in stream_chunks(chunks, class) {
        reader.seek(SeekFrom::Start(chunk.payload_offset()))?;
        let read = reader
            .by_ref()
            .take(chunk.payload_size())
            .read_to_end(&mut out)?;
        if (read as u64) < chunk.payload_size() {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
    }
    Ok(out)
}

/// Write every data payload of `class` to `sink`
pub fn write_stream<R, W, F>(
    reader: &mut R,
    chunks: &[Chunk],
    class: AssetClass,
    sink: &mut W,
    options: ExtractOptions,
    progress: F,
) -> ContainerResult<u64>
where
    R: Read + Seek,
    W: Write,
    F: FnMut(u64, u64),
{
    let total = stream_chunks(chunks, class)
        .map(Chunk::payload_size)
        .sum();
    let mut writer = BlockWriter::new(sink, total, options, progress);
    for chunk in stream_chunks(chunks, class) {
        reader.seek(SeekFrom::Start(chunk.payload_offset()))?;
        writer.copy_from(reader, chunk.payload_size())?;
    }
    writer.finish()
}
