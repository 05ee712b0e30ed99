//! Catalog of embedded assets

use crate::fourcc::FourCc;
use serde::Serialize;
use std::fmt;

/// Table an entry was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOrigin {
    /// CPK table of contents
    Toc,
    /// USM stream-info table
    Crid,
}

/// Stream class of a USM asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    /// Video elementary stream
    Video,
    /// Audio elementary stream
    Audio,
}

impl AssetClass {
    /// Classify a declared stream id
    pub fn from_stream_id(id: u32) -> Self {
        if id == FourCc::SFA.to_u32() {
            Self::Audio
        } else {
            Self::Video
        }
    }

    /// Classify a chunk tag
    pub fn from_tag(tag: FourCc) -> Self {
        if tag.is_audio() {
            Self::Audio
        } else {
            Self::Video
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Video stream properties from a stream-info chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VideoInfo {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Number of frames
    pub total_frames: u32,
    /// Frame rate numerator
    pub framerate_n: u32,
    /// Frame rate denominator
    pub framerate_d: u32,
}

impl VideoInfo {
    /// Frames per second
    #[allow(clippy::cast_precision_loss)]
    pub fn frame_rate(&self) -> Option<f64> {
        (self.framerate_d != 0).then(|| f64::from(self.framerate_n) / f64::from(self.framerate_d))
    }

    /// Playback length in seconds
    pub fn duration_secs(&self) -> Option<f64> {
        (self.framerate_n != 0).then(|| {
            f64::from(self.total_frames) * f64::from(self.framerate_d)
                / f64::from(self.framerate_n)
        })
    }
}

/// Audio stream properties from a stream-info chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AudioInfo {
    /// Samples per second
    pub sampling_rate: u32,
    /// Number of samples per channel
    pub total_samples: u32,
    /// Channel count
    pub num_channels: u32,
}

impl AudioInfo {
    /// Playback length in seconds
    pub fn duration_secs(&self) -> Option<f64> {
        (self.sampling_rate != 0)
            .then(|| f64::from(self.total_samples) / f64::from(self.sampling_rate))
    }
}

/// One embedded asset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    /// Table this entry came from
    pub origin: EntryOrigin,
    /// File name
    pub name: String,
    /// Directory path, empty for the root
    pub directory: String,
    /// Free-text annotation
    pub user_string: String,
    /// Offset relative to `base_offset`
    pub offset: u64,
    /// Base the offset is relative to
    pub base_offset: u64,
    /// Bytes stored in the container
    pub size: u64,
    /// Bytes after decompression
    pub extract_size: u64,
    /// Numeric id (CPK `ID`, USM `stmid`)
    pub id: u32,
    /// Stream class, USM only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<AssetClass>,
    /// Average bit rate, USM only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avbps: Option<u32>,
    /// Video properties, filled from the stream's info chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoInfo>,
    /// Audio properties, filled from the stream's info chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioInfo>,
    /// Local directory from the extended TOC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_dir: Option<String>,
    /// Update timestamp from the extended TOC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_date_time: Option<u64>,
}

impl CatalogEntry {
    /// Entry backed by a CPK TOC row
    pub fn from_toc(name: String, directory: String, base_offset: u64) -> Self {
        Self {
            origin: EntryOrigin::Toc,
            name,
            directory,
            user_string: String::new(),
            offset: 0,
            base_offset,
            size: 0,
            extract_size: 0,
            id: 0,
            class: None,
            avbps: None,
            video: None,
            audio: None,
            local_dir: None,
            update_date_time: None,
        }
    }

    /// Entry backed by a USM stream-info row
    pub fn from_stream(name: String, id: u32) -> Self {
        Self {
            origin: EntryOrigin::Crid,
            class: Some(AssetClass::from_stream_id(id)),
            id,
            ..Self::from_toc(name, String::new(), 0)
        }
    }

    /// File position of the first stored byte
    pub fn absolute_offset(&self) -> u64 {
        self.base_offset + self.offset
    }

    /// Stored bytes are CRILAYLA-compressed
    pub fn is_compressed(&self) -> bool {
        self.size != self.extract_size
    }

    /// `directory/name`, or just `name` at the root
    pub fn path(&self) -> String {
        if self.directory.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.directory.trim_end_matches('/'), self.name)
        }
    }

    /// Frames per second, video streams only
    pub fn frame_rate(&self) -> Option<f64> {
        self.video.as_ref().and_then(VideoInfo::frame_rate)
    }

    /// Playback length in seconds, streams only
    pub fn duration_secs(&self) -> Option<f64> {
        self.video
            .as_ref()
            .and_then(VideoInfo::duration_secs)
            .or_else(|| self.audio.as_ref().and_then(AudioInfo::duration_secs))
    }
}

/// Pairs of entry indices whose stored byte ranges intersect
///
/// Empty entries never overlap anything.
pub fn find_overlaps(entries: &[CatalogEntry]) -> Vec<(usize, usize)> {
    let mut order: Vec<usize> = (0..entries.len())
        .filter(|&i| entries[i].size > 0)
        .collect();
    order.sort_by_key(|&i| (entries[i].absolute_offset(), i));

    let mut overlaps = Vec::new();
    for (pos, &current) in order.iter().enumerate() {
        let end = entries[current].absolute_offset() + entries[current].size;
        for &next in &order[pos + 1..] {
            if entries[next].absolute_offset() >= end {
                break;
            }
            overlaps.push((current.min(next), current.max(next)));
        }
    }
    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(offset: u64, size: u64) -> CatalogEntry {
        let mut entry = CatalogEntry::from_toc("f".into(), String::new(), 0x800);
        entry.offset = offset;
        entry.size = size;
        entry.extract_size = size;
        entry
    }

    #[test]
    fn test_path_joining() {
        let mut e = CatalogEntry::from_toc("bgm.adx".into(), String::new(), 0);
        assert_eq!(e.path(), "bgm.adx");
        e.directory = "sound/".into();
        assert_eq!(e.path(), "sound/bgm.adx");
    }

    #[test]
    fn test_compression_flag() {
        let mut e = entry(0, 100);
        assert!(!e.is_compressed());
        e.extract_size = 400;
        assert!(e.is_compressed());
        assert_eq!(e.absolute_offset(), 0x800);
    }

    #[test]
    fn test_stream_classification() {
        let audio = CatalogEntry::from_stream("a.adx".into(), 0x4053_4641);
        assert_eq!(audio.class, Some(AssetClass::Audio));
        assert_eq!(audio.origin, EntryOrigin::Crid);

        let video = CatalogEntry::from_stream("v.m2v".into(), 0x4053_4656);
        assert_eq!(video.class, Some(AssetClass::Video));
    }

    #[test]
    fn test_video_timing() {
        let info = VideoInfo {
            width: 1280,
            height: 720,
            total_frames: 2997,
            framerate_n: 2997,
            framerate_d: 100,
        };
        assert_eq!(info.duration_secs(), Some(100.0));
        assert!((info.frame_rate().expect("rate") - 29.97).abs() < 1e-9);
        assert_eq!(VideoInfo::default().frame_rate(), None);
    }

    #[test]
    fn test_json_omits_missing_metadata() {
        let value = serde_json::to_value(entry(0x40, 12)).expect("Test operation should succeed");
        assert_eq!(value["origin"], "toc");
        assert_eq!(value["offset"], 0x40);
        assert!(value.get("class").is_none());
        assert!(value.get("local_dir").is_none());

        let mut stream = CatalogEntry::from_stream("a.adx".into(), 0x4053_4641);
        stream.audio = Some(AudioInfo {
            sampling_rate: 48000,
            total_samples: 96000,
            num_channels: 2,
        });
        let value = serde_json::to_value(stream).expect("Test operation should succeed");
        assert_eq!(value["class"], "audio");
        assert_eq!(value["audio"]["num_channels"], 2);
        assert!(value.get("video").is_none());
    }

    #[test]
    fn test_overlap_detection() {
        let entries = vec![entry(0, 16), entry(16, 16), entry(24, 4), entry(40, 0)];
        assert_eq!(find_overlaps(&entries), vec![(1, 2)]);

        let disjoint = vec![entry(32, 8), entry(0, 32)];
        assert!(find_overlaps(&disjoint).is_empty());
    }
}
