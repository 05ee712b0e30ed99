//! USM file builder

use super::CRID_BLOCK_TYPE;
use super::chunk::{CONTENTS_END, ChunkHeader, CridHeader, PayloadKind, STANDARD_HEADER_PAD};
use crate::catalog::{AudioInfo, VideoInfo};
use crate::error::{ContainerError, ContainerResult};
use crate::fourcc::FourCc;
use crate::utf::{UtfBuilder, UtfField, UtfValue, ValueKind};
use binrw::BinWrite;
use std::io::Cursor;
use tracing::debug;

/// Payloads are padded to this many bytes
const PAYLOAD_ALIGNMENT: usize = 4;

/// One elementary stream to be interleaved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsmStream {
    /// Source file name recorded in the stream table
    pub filename: String,
    /// Chunk tag, which doubles as the stream id
    pub tag: FourCc,
    /// Average bit rate
    pub avbps: u32,
    /// Video properties for the stream-info chunk
    pub video: Option<VideoInfo>,
    /// Audio properties for the stream-info chunk
    pub audio: Option<AudioInfo>,
    /// Data chunk payloads in order
    pub packets: Vec<Vec<u8>>,
}

impl UsmStream {
    /// `@SFV` stream
    pub fn video(filename: impl Into<String>, info: VideoInfo) -> Self {
        Self {
            filename: filename.into(),
            tag: FourCc::SFV,
            avbps: 0,
            video: Some(info),
            audio: None,
            packets: Vec::new(),
        }
    }

    /// `@SFA` stream
    pub fn audio(filename: impl Into<String>, info: AudioInfo) -> Self {
        Self {
            filename: filename.into(),
            tag: FourCc::SFA,
            avbps: 0,
            video: None,
            audio: Some(info),
            packets: Vec::new(),
        }
    }

    /// Append one data chunk payload
    #[must_use]
    pub fn with_packet(mut self, packet: impl Into<Vec<u8>>) -> Self {
        self.packets.push(packet.into());
        self
    }

    /// Set the average bit rate
    #[must_use]
    pub fn with_avbps(mut self, avbps: u32) -> Self {
        self.avbps = avbps;
        self
    }

    /// Total data bytes
    pub fn data_size(&self) -> u64 {
        self.packets.iter().map(|p| p.len() as u64).sum()
    }
}

/// Builder for USM files
///
/// Writes the CRID chunk, one stream-info chunk per stream, data chunks
/// interleaved round-robin, and a `#CONTENTS END` chunk per stream.
#[derive(Debug, Clone)]
pub struct UsmBuilder {
    filename: String,
    streams: Vec<UsmStream>,
    end_markers: bool,
}

impl UsmBuilder {
    /// Create a builder; `filename` goes into stream table row 0
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            streams: Vec::new(),
            end_markers: true,
        }
    }

    /// Write the per-stream end marker chunks
    #[must_use]
    pub fn with_end_markers(mut self, end_markers: bool) -> Self {
        self.end_markers = end_markers;
        self
    }

    /// Append a stream
    pub fn add_stream(&mut self, stream: UsmStream) -> &mut Self {
        self.streams.push(stream);
        self
    }

    /// Serialize the file
    pub fn build(&self) -> ContainerResult<Vec<u8>> {
        let mut body = Vec::new();

        for stream in &self.streams {
            let info = stream_info_table(stream)?;
            write_chunk(&mut body, stream.tag, PayloadKind::StreamInfo, &info)?;
        }

        let rounds = self.streams.iter().map(|s| s.packets.len()).max().unwrap_or(0);
        for round in 0..rounds {
            for stream in &self.streams {
                if let Some(packet) = stream.packets.get(round) {
                    write_chunk(&mut body, stream.tag, PayloadKind::Data, packet)?;
                }
            }
        }

        if self.end_markers {
            for stream in &self.streams {
                write_chunk(&mut body, stream.tag, PayloadKind::StreamMeta, &CONTENTS_END)?;
            }
        }

        // Row 0 carries the total size; the table length does not depend on it
        let crid_len = self.crid_chunk(0)?.len();
        let total = (crid_len + body.len()) as u64;
        let mut out = self.crid_chunk(total)?;
        out.extend_from_slice(&body);

        debug!(
            streams = self.streams.len(),
            size = out.len(),
            "built USM file"
        );
        Ok(out)
    }

    fn crid_chunk(&self, total: u64) -> ContainerResult<Vec<u8>> {
        let mut table = UtfBuilder::new("CRIUSF_DIR_STREAM");
        table
            .add_field(UtfField::per_row("fmtver", ValueKind::U32))
            .add_field(UtfField::per_row("filename", ValueKind::String))
            .add_field(UtfField::per_row("filesize", ValueKind::U32))
            .add_field(UtfField::per_row("datasize", ValueKind::U32))
            .add_field(UtfField::per_row("stmid", ValueKind::U32))
            .add_field(UtfField::per_row("chno", ValueKind::U16))
            .add_field(UtfField::per_row("avbps", ValueKind::U32));

        table.add_row(vec![
            UtfValue::U32(0),
            UtfValue::String(self.filename.clone()),
            UtfValue::U32(to_u32(total)?),
            UtfValue::U32(0),
            UtfValue::U32(0),
            UtfValue::U16(0xFFFF),
            UtfValue::U32(self.streams.iter().map(|s| s.avbps).sum()),
        ])?;
        for (channel, stream) in self.streams.iter().enumerate() {
            table.add_row(vec![
                UtfValue::U32(0),
                UtfValue::String(stream.filename.clone()),
                UtfValue::U32(to_u32(stream.data_size())?),
                UtfValue::U32(0),
                UtfValue::U32(stream.tag.to_u32()),
                UtfValue::U16(channel as u16),
                UtfValue::U32(stream.avbps),
            ])?;
        }
        let table = table.build()?;

        let footer = padding(table.len());
        let header = CridHeader {
            magic: FourCc::CRID.0,
            chunk_size: to_u32((usize::from(STANDARD_HEADER_PAD) + table.len() + footer) as u64)?,
            header_size: STANDARD_HEADER_PAD,
            footer_size: footer as u16,
            block_type: CRID_BLOCK_TYPE,
            reserved: [0; 8],
            zero_a: 0,
            zero_b: 0,
        };

        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor)?;
        let mut out = cursor.into_inner();
        out.extend_from_slice(&table);
        out.resize(out.len() + footer, 0);
        Ok(out)
    }
}

fn stream_info_table(stream: &UsmStream) -> ContainerResult<Vec<u8>> {
    let packet = if let Some(video) = stream.video {
        let mut table = UtfBuilder::new("VIDEO_HDRINFO");
        table
            .add_field(UtfField::per_row("width", ValueKind::U32))
            .add_field(UtfField::per_row("height", ValueKind::U32))
            .add_field(UtfField::per_row("total_frames", ValueKind::U32))
            .add_field(UtfField::per_row("framerate_n", ValueKind::U32))
            .add_field(UtfField::per_row("framerate_d", ValueKind::U32));
        table.add_row(vec![
            UtfValue::U32(video.width),
            UtfValue::U32(video.height),
            UtfValue::U32(video.total_frames),
            UtfValue::U32(video.framerate_n),
            UtfValue::U32(video.framerate_d),
        ])?;
        table.build()?
    } else {
        let audio = stream.audio.unwrap_or_default();
        let mut table = UtfBuilder::new("AUDIO_HDRINFO");
        table
            .add_field(UtfField::per_row("sampling_rate", ValueKind::U32))
            .add_field(UtfField::per_row("total_samples", ValueKind::U32))
            .add_field(UtfField::per_row("num_channels", ValueKind::U8));
        table.add_row(vec![
            UtfValue::U32(audio.sampling_rate),
            UtfValue::U32(audio.total_samples),
            UtfValue::U8(u8::try_from(audio.num_channels).unwrap_or(u8::MAX)),
        ])?;
        table.build()?
    };
    Ok(packet)
}

fn write_chunk(
    out: &mut Vec<u8>,
    tag: FourCc,
    kind: PayloadKind,
    payload: &[u8],
) -> ContainerResult<()> {
    let footer = padding(payload.len());
    let header = ChunkHeader {
        tag: tag.0,
        size: to_u32((usize::from(STANDARD_HEADER_PAD) + payload.len() + footer) as u64)?,
        header_pad: STANDARD_HEADER_PAD,
        footer_pad: footer as u16,
        kind: kind.code(),
        reserved: [0; 16],
    };

    let mut cursor = Cursor::new(Vec::new());
    header.write(&mut cursor)?;
    out.extend_from_slice(&cursor.into_inner());
    out.extend_from_slice(payload);
    out.resize(out.len() + footer, 0);
    Ok(())
}

fn padding(len: usize) -> usize {
    (PAYLOAD_ALIGNMENT - len % PAYLOAD_ALIGNMENT) % PAYLOAD_ALIGNMENT
}

fn to_u32(value: u64) -> ContainerResult<u32> {
    u32::try_from(value).map_err(|_| ContainerError::Build(format!("size {value} exceeds 32 bits")))
}
