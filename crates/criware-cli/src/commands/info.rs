//! `criware info`

use super::table::row_json;
use crate::config::OutputFormat;
use crate::output::{create_table, format_duration, format_size};
use anyhow::Result;
use comfy_table::Table;
use criware_formats::usm::{Chunk, PayloadKind, UsmFile};
use criware_formats::{CatalogEntry, Container, CriReader};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::Path;

/// Print container metadata for `file`
pub fn handle(file: &Path, format: OutputFormat) -> Result<()> {
    let reader = super::open(file)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info_json(&reader))?),
        OutputFormat::Text => print_text(file, &reader),
    }
    Ok(())
}

/// Chunk counts keyed by payload kind name
pub fn chunk_counts(chunks: &[Chunk]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for chunk in chunks {
        let name = match chunk.kind {
            PayloadKind::Data => "data",
            PayloadKind::StreamInfo => "stream_info",
            PayloadKind::StreamMeta => "stream_meta",
            PayloadKind::Header => "header",
        };
        *counts.entry(name).or_insert(0) += 1;
    }
    counts
}

/// Metadata as a JSON document
pub fn info_json<R: Read + Seek>(reader: &CriReader<R>) -> Value {
    match reader.container() {
        Container::Cpk(cpk) => json!({
            "container": reader.kind().to_string(),
            "entries": cpk.entries().len(),
            "content_base": cpk.content_base(),
            "descriptor": row_json(cpk.descriptor(), 0),
        }),
        Container::Usm(usm) => json!({
            "container": reader.kind().to_string(),
            "entries": usm.entries().len(),
            "file": row_json(usm.stream_table(), 0),
            "streams": usm.entries(),
            "chunks": chunk_counts(usm.chunks()),
        }),
    }
}

fn print_text<R: Read + Seek>(file: &Path, reader: &CriReader<R>) {
    println!("{} ({}, {} entries)", file.display(), reader.kind(), reader.entries().len());
    match reader.container() {
        Container::Cpk(cpk) => {
            let mut table = create_table(&["Field", "Value"]);
            let descriptor = cpk.descriptor();
            for (index, field) in descriptor.fields().iter().enumerate() {
                let value = descriptor
                    .row(0)
                    .and_then(|row| row.get(index).copied().flatten());
                if let (Some(name), Some(value)) = (&field.name, value) {
                    table.add_row(vec![name.clone(), value.to_string()]);
                }
            }
            println!("{table}");
        }
        Container::Usm(usm) => {
            println!("{}", streams_table(usm.entries()));
            println!("{}", chunks_line(usm));
        }
    }
}

fn chunks_line(usm: &UsmFile) -> String {
    let counts: Vec<String> = chunk_counts(usm.chunks())
        .into_iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .collect();
    format!("{} chunks: {}", usm.chunks().len(), counts.join(" "))
}

/// Stream metadata, one row per declared stream
pub fn streams_table(entries: &[CatalogEntry]) -> Table {
    let mut table = create_table(&["#", "Name", "Class", "Size", "Format", "Duration"]);
    for (index, entry) in entries.iter().enumerate() {
        let format = if let Some(video) = entry.video {
            let rate = entry
                .frame_rate()
                .map_or_else(String::new, |fps| format!(" @ {fps:.3} fps"));
            format!("{}x{}{rate}", video.width, video.height)
        } else if let Some(audio) = entry.audio {
            format!("{} Hz, {} ch", audio.sampling_rate, audio.num_channels)
        } else {
            "-".to_string()
        };

        table.add_row(vec![
            index.to_string(),
            entry.name.clone(),
            entry.class.map_or_else(|| "-".to_string(), |class| class.to_string()),
            format_size(entry.extract_size),
            format,
            entry
                .duration_secs()
                .map_or_else(|| "-".to_string(), format_duration),
        ]);
    }
    table
}
