//! Interleaved chunk demultiplexer

use super::chunk::{CHUNK_HEADER_SIZE, CONTENTS_END, Chunk, ChunkHeader, PayloadKind};
use crate::catalog::{AssetClass, AudioInfo, CatalogEntry, VideoInfo};
use crate::error::{ContainerError, ContainerResult};
use crate::fourcc::FourCc;
use crate::utf::UtfTable;
use binrw::BinRead;
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, warn};

/// Readiness of every declared stream id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemuxState {
    ready: BTreeMap<u32, bool>,
}

impl DemuxState {
    /// One pending flag per declared id
    pub fn new(ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            ready: ids.into_iter().map(|id| (id, false)).collect(),
        }
    }

    /// Mark a stream finished; returns false for undeclared ids
    pub fn mark_ready(&mut self, id: u32) -> bool {
        match self.ready.get_mut(&id) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    /// Mark every pending stream finished, returning the ids that were pending
    pub fn mark_all_ready(&mut self) -> Vec<u32> {
        let pending = self.pending();
        for flag in self.ready.values_mut() {
            *flag = true;
        }
        pending
    }

    /// Readiness of `id`, `None` when undeclared
    pub fn is_ready(&self, id: u32) -> Option<bool> {
        self.ready.get(&id).copied()
    }

    /// Whether the scan may stop
    pub fn all_ready(&self) -> bool {
        self.ready.values().all(|&ready| ready)
    }

    /// Ids still waiting for their end marker
    pub fn pending(&self) -> Vec<u32> {
        self.ready
            .iter()
            .filter(|&(_, &ready)| !ready)
            .map(|(&id, _)| id)
            .collect()
    }
}

/// Walks the chunk sequence after the CRID header
///
/// Stream-info chunks enrich the matching catalog entries. A stream is
/// finished by a 32-byte `#CONTENTS END` payload, or by a chunk reaching
/// the end of the input.
pub struct Demuxer<'a, R> {
    reader: &'a mut R,
    state: DemuxState,
    entries: Vec<CatalogEntry>,
    chunks: Vec<Chunk>,
    stream_end: u64,
}

impl<'a, R: Read + Seek> Demuxer<'a, R> {
    /// Start at the reader's current position
    pub fn new(reader: &'a mut R, entries: Vec<CatalogEntry>) -> ContainerResult<Self> {
        let position = reader.stream_position()?;
        let stream_end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(position))?;

        Ok(Self {
            reader,
            state: DemuxState::new(entries.iter().map(|entry| entry.id)),
            entries,
            chunks: Vec::new(),
            stream_end,
        })
    }

    /// Current readiness map
    pub fn state(&self) -> &DemuxState {
        &self.state
    }

    /// Chunks read so far
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Read one chunk; returns false once every stream is finished
    pub fn step(&mut self) -> ContainerResult<bool> {
        if self.state.all_ready() {
            return Ok(false);
        }

        let offset = self.reader.stream_position()?;
        if self.stream_end.saturating_sub(offset) < CHUNK_HEADER_SIZE {
            let pending = self.state.mark_all_ready();
            warn!(
                offset,
                ?pending,
                "input ended before every stream was finished"
            );
            return Ok(false);
        }

        let header = ChunkHeader::read(self.reader)?;
        let kind = PayloadKind::from_code(header.kind).ok_or(ContainerError::UnknownPayloadKind {
            kind: header.kind,
            offset,
        })?;
        if u32::from(header.header_pad) + u32::from(header.footer_pad) > header.size {
            return Err(ContainerError::InvalidChunkLayout {
                offset,
                size: header.size,
            });
        }

        let tag = FourCc(header.tag);
        let chunk = Chunk {
            offset,
            tag,
            class: AssetClass::from_tag(tag),
            size: header.size,
            header_pad: header.header_pad,
            footer_pad: header.footer_pad,
            kind,
        };
        debug!(offset, %tag, ?kind, size = chunk.payload_size(), "read USM chunk");

        self.reader.seek(SeekFrom::Start(chunk.payload_offset()))?;
        if kind == PayloadKind::StreamInfo {
            let payload = self.read_payload(&chunk)?;
            let table = UtfTable::parse(&payload)?;
            self.enrich(&chunk, &table);
        } else if self.ends_stream(&chunk)? {
            if !self.state.mark_ready(chunk.stream_id()) {
                debug!(%tag, "end of undeclared stream");
            }
        }

        self.reader.seek(SeekFrom::Start(chunk.end()))?;
        self.chunks.push(chunk);
        Ok(true)
    }

    /// Read chunks until every stream is finished
    pub fn run(&mut self) -> ContainerResult<()> {
        while self.step()? {}
        Ok(())
    }

    /// Enriched catalog and the chunk list
    pub fn finish(self) -> (Vec<CatalogEntry>, Vec<Chunk>) {
        (self.entries, self.chunks)
    }

    fn read_payload(&mut self, chunk: &Chunk) -> ContainerResult<Vec<u8>> {
        let mut payload = Vec::new();
        self.reader
            .by_ref()
            .take(chunk.payload_size())
            .read_to_end(&mut payload)?;
        Ok(payload)
    }

    fn ends_stream(&mut self, chunk: &Chunk) -> ContainerResult<bool> {
        if chunk.payload_end() >= self.stream_end {
            return Ok(true);
        }
        if chunk.payload_size() != CONTENTS_END.len() as u64 {
            return Ok(false);
        }
        let mut payload = [0u8; CONTENTS_END.len()];
        self.reader.read_exact(&mut payload)?;
        Ok(payload == CONTENTS_END)
    }

    fn enrich(&mut self, chunk: &Chunk, table: &UtfTable) {
        let number = |field: &str| {
            table
                .get_u64(0, field)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or_default()
        };

        let id = chunk.stream_id();
        let mut matched = false;
        for entry in self.entries.iter_mut().filter(|entry| entry.id == id) {
            matched = true;
            match chunk.class {
                AssetClass::Video => {
                    entry.video = Some(VideoInfo {
                        width: number("width"),
                        height: number("height"),
                        total_frames: number("total_frames"),
                        framerate_n: number("framerate_n"),
                        framerate_d: number("framerate_d"),
                    });
                }
                AssetClass::Audio => {
                    entry.audio = Some(AudioInfo {
                        sampling_rate: number("sampling_rate"),
                        total_samples: number("total_samples"),
                        num_channels: number("num_channels"),
                    });
                }
            }
        }

        if !matched {
            debug!(tag = %chunk.tag, "stream info for undeclared stream");
        }
    }
}
