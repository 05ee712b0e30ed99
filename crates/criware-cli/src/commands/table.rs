//! `criware table`

use crate::config::OutputFormat;
use crate::output::create_table;
use anyhow::{Context, Result};
use comfy_table::Table;
use criware_formats::utf::UtfTable;
use serde_json::{Map, Value, json};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

/// Dump the table whose magic sits at `offset`
pub fn handle(file: &Path, offset: u64, format: OutputFormat) -> Result<()> {
    let mut reader = BufReader::new(
        File::open(file).with_context(|| format!("failed to open {}", file.display()))?,
    );
    reader.seek(SeekFrom::Start(offset))?;
    let table = UtfTable::read(&mut reader)
        .with_context(|| format!("no @UTF table at {offset:#x} in {}", file.display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&table_json(&table))?),
        OutputFormat::Text => {
            println!(
                "{} ({} fields, {} rows, {:?})",
                table.name().unwrap_or("<unnamed>"),
                table.field_count(),
                table.row_count(),
                table.encoding()
            );
            println!("{}", rows_table(&table));
        }
    }
    Ok(())
}

fn field_name(table: &UtfTable, index: usize) -> String {
    table.fields()[index]
        .name
        .clone()
        .unwrap_or_else(|| format!("field{index}"))
}

/// Row `row` as a field-name map; absent values are `null`
pub fn row_json(table: &UtfTable, row: usize) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(values) = table.row(row) {
        for (index, value) in values.into_iter().enumerate() {
            let value = value
                .and_then(|value| serde_json::to_value(value).ok())
                .unwrap_or(Value::Null);
            map.insert(field_name(table, index), value);
        }
    }
    map
}

/// Whole table with its schema
pub fn table_json(table: &UtfTable) -> Value {
    let fields: Vec<Value> = table
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            json!({
                "name": field_name(table, index),
                "kind": format!("{:?}", field.kind),
                "storage": format!("{:?}", field.storage),
            })
        })
        .collect();
    let rows: Vec<Value> = (0..table.row_count())
        .map(|row| Value::Object(row_json(table, row)))
        .collect();

    json!({
        "name": table.name(),
        "encoding": format!("{:?}", table.encoding()),
        "fields": fields,
        "rows": rows,
    })
}

/// One column per field, one row per table row
pub fn rows_table(table: &UtfTable) -> Table {
    let headers: Vec<String> = (0..table.field_count())
        .map(|index| field_name(table, index))
        .collect();
    let headers: Vec<&str> = headers.iter().map(String::as_str).collect();

    let mut out = create_table(&headers);
    for row in 0..table.row_count() {
        if let Some(values) = table.row(row) {
            out.add_row(
                values
                    .into_iter()
                    .map(|value| value.map_or_else(|| "-".to_string(), ToString::to_string)),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use criware_formats::utf::{UtfBuilder, UtfField, UtfValue, ValueKind};
    use pretty_assertions::assert_eq;

    fn sample() -> UtfTable {
        let mut builder = UtfBuilder::new("CpkHeader");
        builder
            .add_field(UtfField::per_row("Files", ValueKind::U32))
            .add_field(UtfField::constant("Comment", UtfValue::String("demo".into())))
            .add_field(UtfField::zero("Reserved", ValueKind::U64));
        builder
            .add_row(vec![UtfValue::U32(3)])
            .expect("Test operation should succeed");
        let packet = builder.build().expect("Test operation should succeed");
        UtfTable::parse(&packet).expect("Test operation should succeed")
    }

    #[test]
    fn test_row_json_uses_field_names() {
        let row = row_json(&sample(), 0);
        assert_eq!(row["Files"], json!(3));
        assert_eq!(row["Comment"], json!("demo"));
        assert_eq!(row["Reserved"], Value::Null);
    }

    #[test]
    fn test_table_json_schema() {
        let value = table_json(&sample());
        assert_eq!(value["name"], json!("CpkHeader"));
        assert_eq!(value["fields"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["rows"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_rows_table_marks_absent_values() {
        let rendered = rows_table(&sample()).to_string();
        assert!(rendered.contains("Files"));
        assert!(rendered.contains("demo"));
        assert!(rendered.contains('-'));
    }
}
