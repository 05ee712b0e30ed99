//! Command-line configuration.
//!
//! Options come from CLI arguments with environment fallbacks:
//! - `CRIWARE_LOG` sets the log level when `RUST_LOG` is unset
//! - `CRIWARE_OUTPUT_DIR` sets the extraction root

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Inspect and extract CRIWare containers.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "criware",
    about = "Inspect and extract CRIWare CPK archives and USM movies",
    version
)]
pub struct Cli {
    /// Log level, overridden by `RUST_LOG`
    #[arg(
        short,
        long,
        value_enum,
        global = true,
        env = "CRIWARE_LOG",
        default_value = "info"
    )]
    pub log_level: LogLevel,

    /// Output format
    #[arg(short = 'f', long, value_enum, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }
}

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List catalog entries
    List {
        /// CPK or USM file
        file: PathBuf,
    },

    /// Show container metadata
    Info {
        /// CPK or USM file
        file: PathBuf,
    },

    /// Extract entries to a directory
    Extract {
        /// CPK or USM file
        file: PathBuf,

        /// Entry index to extract; repeat for several, omit for all
        #[arg(short, long = "index")]
        indices: Vec<usize>,

        /// Destination directory
        #[arg(short, long, env = "CRIWARE_OUTPUT_DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Dump the @UTF table at a byte offset
    Table {
        /// Any file containing a @UTF table
        file: PathBuf,

        /// Offset of the `@UTF` magic
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Everything
    Trace,
    /// Parsing details
    Debug,
    /// Completed scans
    Info,
    /// Recoverable anomalies
    Warn,
    /// Failures only
    Error,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tables for humans
    Text,
    /// Pretty-printed JSON
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_arguments() {
        let cli = Cli::try_parse_from([
            "criware", "extract", "data.cpk", "-i", "2", "--index", "5", "-o", "out",
        ])
        .expect("Test operation should succeed");

        assert_eq!(cli.format, OutputFormat::Text);
        match cli.command {
            Commands::Extract {
                file,
                indices,
                output,
            } => {
                assert_eq!(file, PathBuf::from("data.cpk"));
                assert_eq!(indices, vec![2, 5]);
                assert_eq!(output, PathBuf::from("out"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["criware", "list", "movie.usm", "--format", "json", "-l", "debug"])
            .expect("Test operation should succeed");

        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.log_level.as_filter(), "debug");
    }

    #[test]
    fn test_table_offset_defaults_to_zero() {
        let cli = Cli::try_parse_from(["criware", "table", "dump.bin"])
            .expect("Test operation should succeed");
        assert!(matches!(cli.command, Commands::Table { offset: 0, .. }));
    }
}
