//! Command handlers

pub mod extract;
pub mod info;
pub mod list;
pub mod table;

use crate::config::{Cli, Commands};
use anyhow::{Context, Result};
use criware_formats::CriReader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Run the selected subcommand
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::List { file } => list::handle(file, cli.format),
        Commands::Info { file } => info::handle(file, cli.format),
        Commands::Extract {
            file,
            indices,
            output,
        } => extract::handle(file, indices, output, cli.format),
        Commands::Table { file, offset } => table::handle(file, *offset, cli.format),
    }
}

/// Open and scan a container
pub fn open(path: &Path) -> Result<CriReader<BufReader<File>>> {
    CriReader::open(path).with_context(|| format!("failed to read {}", path.display()))
}
