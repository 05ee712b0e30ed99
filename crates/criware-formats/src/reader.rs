//! Container reader

use crate::catalog::{AssetClass, CatalogEntry};
use crate::cpk::CpkArchive;
use crate::error::{ContainerError, ContainerResult};
use crate::extract::{self, ExtractOptions};
use crate::fourcc::{ContainerKind, FourCc};
use crate::usm::{Chunk, UsmFile};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::info;

/// Parsed container metadata
#[derive(Debug, Clone)]
pub enum Container {
    /// Packed archive
    Cpk(CpkArchive),
    /// Streaming movie
    Usm(UsmFile),
}

/// Reader over a CPK or USM source
///
/// The catalog is built once on construction; extraction seeks the owned
/// source as needed.
#[derive(Debug)]
pub struct CriReader<R> {
    source: R,
    container: Container,
}

impl CriReader<BufReader<File>> {
    /// Open and scan a file
    pub fn open(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        info!(path = %path.display(), "opening CRIWare container");
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> CriReader<R> {
    /// Scan a container starting at offset 0 of `source`
    pub fn new(mut source: R) -> ContainerResult<Self> {
        source.seek(SeekFrom::Start(0))?;
        let mut tag = Vec::with_capacity(4);
        source.by_ref().take(4).read_to_end(&mut tag)?;

        let kind = ContainerKind::sniff(&tag).ok_or_else(|| {
            let mut found = [0u8; 4];
            found[..tag.len()].copy_from_slice(&tag);
            ContainerError::UnknownContainer(FourCc(found))
        })?;

        source.seek(SeekFrom::Start(0))?;
        let container = match kind {
            ContainerKind::Cpk => Container::Cpk(CpkArchive::read(&mut source)?),
            ContainerKind::Usm => Container::Usm(UsmFile::read(&mut source)?),
        };

        Ok(Self { source, container })
    }

    /// Container variant
    pub fn kind(&self) -> ContainerKind {
        match self.container {
            Container::Cpk(_) => ContainerKind::Cpk,
            Container::Usm(_) => ContainerKind::Usm,
        }
    }

    /// Whether this is a packed archive rather than a movie
    pub fn is_archive(&self) -> bool {
        self.kind() == ContainerKind::Cpk
    }

    /// Parsed metadata
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Catalog in table order
    pub fn entries(&self) -> &[CatalogEntry] {
        match &self.container {
            Container::Cpk(cpk) => cpk.entries(),
            Container::Usm(usm) => usm.entries(),
        }
    }

    /// Chunk list; empty for archives
    pub fn chunks(&self) -> &[Chunk] {
        match &self.container {
            Container::Cpk(_) => &[],
            Container::Usm(usm) => usm.chunks(),
        }
    }

    /// Catalog entry at `index`
    pub fn entry(&self, index: usize) -> ContainerResult<&CatalogEntry> {
        let entries = self.entries();
        entries.get(index).ok_or(ContainerError::IndexOutOfRange {
            index,
            len: entries.len(),
        })
    }

    /// Reconstruct one asset in memory
    pub fn extract_to_memory(&mut self, index: usize) -> ContainerResult<Vec<u8>> {
        let entry = self.entry(index)?.clone();
        match &self.container {
            Container::Cpk(_) => extract::read_archive_entry(&mut self.source, &entry),
            Container::Usm(usm) => {
                extract::read_stream(&mut self.source, usm.chunks(), stream_class(&entry))
            }
        }
    }

    /// Write one asset to `sink` in 64 KiB blocks
    ///
    /// `progress` receives `(bytes_done, bytes_total)` every 32 blocks and
    /// once more on completion.
    pub fn extract_to_writer<W, F>(
        &mut self,
        index: usize,
        sink: &mut W,
        progress: F,
    ) -> ContainerResult<u64>
    where
        W: Write,
        F: FnMut(u64, u64),
    {
        self.extract_to_writer_with(index, sink, ExtractOptions::default(), progress)
    }

    /// [`Self::extract_to_writer`] with explicit block options
    pub fn extract_to_writer_with<W, F>(
        &mut self,
        index: usize,
        sink: &mut W,
        options: ExtractOptions,
        progress: F,
    ) -> ContainerResult<u64>
    where
        W: Write,
        F: FnMut(u64, u64),
    {
        let entry = self.entry(index)?.clone();
        match &self.container {
            Container::Cpk(_) => {
                extract::write_archive_entry(&mut self.source, &entry, sink, options, progress)
            }
            Container::Usm(usm) => extract::write_stream(
                &mut self.source,
                usm.chunks(),
                stream_class(&entry),
                sink,
                options,
                progress,
            ),
        }
    }

    /// Give back the source
    pub fn into_inner(self) -> R {
        self.source
    }
}

fn stream_class(entry: &CatalogEntry) -> AssetClass {
    entry
        .class
        .unwrap_or_else(|| AssetClass::from_stream_id(entry.id))
}
