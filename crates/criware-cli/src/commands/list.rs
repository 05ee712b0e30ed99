//! `criware list`

use crate::config::OutputFormat;
use crate::output::{create_table, format_size};
use anyhow::Result;
use comfy_table::Table;
use criware_formats::CatalogEntry;
use std::path::Path;

/// Print the catalog of `file`
pub fn handle(file: &Path, format: OutputFormat) -> Result<()> {
    let reader = super::open(file)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(reader.entries())?),
        OutputFormat::Text => {
            println!("{} ({}, {} entries)", file.display(), reader.kind(), reader.entries().len());
            println!("{}", entries_table(reader.entries()));
        }
    }
    Ok(())
}

/// One row per entry
pub fn entries_table(entries: &[CatalogEntry]) -> Table {
    let mut table = create_table(&["#", "Path", "Stored", "Logical", "Compressed", "ID", "Class"]);
    for (index, entry) in entries.iter().enumerate() {
        table.add_row(vec![
            index.to_string(),
            entry.path(),
            format_size(entry.size),
            format_size(entry.extract_size),
            if entry.is_compressed() { "yes" } else { "no" }.to_string(),
            format!("{:#010x}", entry.id),
            entry.class.map_or_else(|| "-".to_string(), |class| class.to_string()),
        ]);
    }
    table
}
