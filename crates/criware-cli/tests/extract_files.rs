#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for extraction to disk
//!
//! Containers are built in a temporary directory, opened the way the
//! binary opens them, and extracted without progress bars.

use criware_cli::commands::{self, extract::extract_entries};
use criware_formats::cpk::{CpkBuilder, CpkFile};
use criware_formats::usm::{UsmBuilder, UsmStream};
use criware_formats::{AudioInfo, VideoInfo};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

fn write_archive(dir: &Path) -> std::path::PathBuf {
    let mut builder = CpkBuilder::new();
    builder
        .add_file(CpkFile::new("boot.bin", b"boot".to_vec()))
        .add_file(CpkFile::new("data/level1.dat", b"level-".repeat(200)).compressed())
        .add_file(CpkFile::new("data/bad:name?.txt", b"odd".to_vec()));

    let path = dir.join("game.cpk");
    fs::write(&path, builder.build().expect("archive should build")).expect("write");
    path
}

#[test]
fn extract_all_archive_entries() {
    let dir = tempfile::tempdir().expect("temp dir");
    let archive = write_archive(dir.path());
    let out = dir.path().join("out");

    let mut reader = commands::open(&archive).expect("open");
    let written = extract_entries(&mut reader, &[], &out, false).expect("extract");

    assert_eq!(written.len(), 3);
    assert_eq!(fs::read(out.join("boot.bin")).expect("read"), b"boot");
    assert_eq!(
        fs::read(out.join("data/level1.dat")).expect("read"),
        b"level-".repeat(200)
    );
    assert_eq!(fs::read(out.join("data/bad_name_.txt")).expect("read"), b"odd");
    assert_eq!(written[1].bytes, 1200);
}

#[test]
fn extract_selected_indices_only() {
    let dir = tempfile::tempdir().expect("temp dir");
    let archive = write_archive(dir.path());
    let out = dir.path().join("out");

    let mut reader = commands::open(&archive).expect("open");
    let written = extract_entries(&mut reader, &[2], &out, false).expect("extract");

    assert_eq!(written.len(), 1);
    assert_eq!(written[0].index, 2);
    assert!(!out.join("boot.bin").exists());
}

#[test]
fn extract_rejects_unknown_index() {
    let dir = tempfile::tempdir().expect("temp dir");
    let archive = write_archive(dir.path());

    let mut reader = commands::open(&archive).expect("open");
    let err = extract_entries(&mut reader, &[9], &dir.path().join("out"), false)
        .expect_err("should fail");
    assert!(err.to_string().contains("index 9"));
}

#[test]
fn extract_movie_streams() {
    let dir = tempfile::tempdir().expect("temp dir");
    let video = VideoInfo {
        width: 320,
        height: 240,
        total_frames: 2,
        framerate_n: 24,
        framerate_d: 1,
    };
    let audio = AudioInfo {
        sampling_rate: 32000,
        total_samples: 2000,
        num_channels: 1,
    };

    let mut builder = UsmBuilder::new("logo.usm");
    builder
        .add_stream(
            UsmStream::video("logo.m2v", video)
                .with_packet(vec![1; 50])
                .with_packet(vec![2; 50]),
        )
        .add_stream(UsmStream::audio("logo.adx", audio).with_packet(vec![3; 12]));
    let path = dir.path().join("logo.usm");
    fs::write(&path, builder.build().expect("movie should build")).expect("write");

    let out = dir.path().join("out");
    let mut reader = commands::open(&path).expect("open");
    extract_entries(&mut reader, &[], &out, false).expect("extract");

    let mut expected = vec![1; 50];
    expected.extend_from_slice(&[2; 50]);
    assert_eq!(fs::read(out.join("logo.m2v")).expect("read"), expected);
    assert_eq!(fs::read(out.join("logo.adx")).expect("read"), vec![3; 12]);
}
