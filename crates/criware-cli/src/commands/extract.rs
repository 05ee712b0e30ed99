//! `criware extract`

use crate::config::OutputFormat;
use crate::output::{format_size, sanitize_file_name};
use anyhow::{Context, Result};
use criware_formats::{CatalogEntry, CriReader};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::info;

/// One written asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extracted {
    /// Catalog index
    pub index: usize,
    /// Destination file
    pub path: PathBuf,
    /// Bytes written
    pub bytes: u64,
}

/// Extract entries of `file` below `output`
pub fn handle(file: &Path, indices: &[usize], output: &Path, format: OutputFormat) -> Result<()> {
    let mut reader = super::open(file)?;
    let show_progress = format == OutputFormat::Text;
    let written = extract_entries(&mut reader, indices, output, show_progress)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&written)?),
        OutputFormat::Text => {
            for item in &written {
                println!("{:>5}  {:>14}  {}", item.index, format_size(item.bytes), item.path.display());
            }
            let total: u64 = written.iter().map(|item| item.bytes).sum();
            println!("{} files, {}", written.len(), format_size(total));
        }
    }
    Ok(())
}

/// Destination of entry `index` below `root`
///
/// Each path component is sanitized; `.` and `..` never leave the root.
pub fn output_path(root: &Path, index: usize, entry: &CatalogEntry) -> PathBuf {
    let mut path = root.to_path_buf();
    let mut named = false;
    for component in entry.path().split('/').filter(|c| !c.is_empty()) {
        let component = match component {
            "." | ".." => "_".to_string(),
            other => sanitize_file_name(other),
        };
        path.push(component);
        named = true;
    }
    if !named {
        path.push(format!("entry_{index:05}"));
    }
    path
}

/// Write the selected entries, or all when `indices` is empty
pub fn extract_entries<R: Read + Seek>(
    reader: &mut CriReader<R>,
    indices: &[usize],
    root: &Path,
    show_progress: bool,
) -> Result<Vec<Extracted>> {
    let selected: Vec<usize> = if indices.is_empty() {
        (0..reader.entries().len()).collect()
    } else {
        indices.to_vec()
    };

    let mut written = Vec::with_capacity(selected.len());
    for index in selected {
        let entry = reader.entry(index)?.clone();
        let path = output_path(root, index, &entry);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let file =
            File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut sink = BufWriter::new(file);

        let bar = if show_progress {
            let bar = ProgressBar::new(entry.extract_size);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")?
                    .progress_chars("#>-"),
            );
            bar.set_message(entry.path());
            bar
        } else {
            ProgressBar::hidden()
        };

        let bytes = reader
            .extract_to_writer(index, &mut sink, |done, total| {
                bar.set_length(total);
                bar.set_position(done);
            })
            .with_context(|| format!("failed to extract entry {index} ({})", entry.path()))?;
        bar.finish_and_clear();

        info!(index, path = %path.display(), bytes, "extracted entry");
        written.push(Extracted { index, path, bytes });
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_path_sanitizes_components() {
        let root = Path::new("out");

        let entry = CatalogEntry::from_toc("op:1?.usm".into(), "movie/jp".into(), 0);
        assert_eq!(output_path(root, 0, &entry), PathBuf::from("out/movie/jp/op_1_.usm"));

        let entry = CatalogEntry::from_toc("secret".into(), "../..".into(), 0);
        assert_eq!(output_path(root, 1, &entry), PathBuf::from("out/_/_/secret"));

        let entry = CatalogEntry::from_stream(r"C:\work\intro.m2v".into(), 0);
        assert_eq!(output_path(root, 2, &entry), PathBuf::from("out/C__work_intro.m2v"));
    }

    #[test]
    fn test_output_path_for_unnamed_entry() {
        let entry = CatalogEntry::from_toc(String::new(), String::new(), 0);
        assert_eq!(
            output_path(Path::new("out"), 7, &entry),
            PathBuf::from("out/entry_00007")
        );
    }
}
