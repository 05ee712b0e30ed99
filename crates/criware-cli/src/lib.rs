//! Command-line front end for CRIWare containers.
//!
//! The `criware` binary lists, inspects and extracts the contents of CPK
//! archives and USM movies, and dumps raw `@UTF` tables:
//!
//! - `list`: catalog entries as a table or JSON
//! - `info`: container metadata (CPK descriptor, USM streams and chunks)
//! - `extract`: write entries to disk with a progress bar
//! - `table`: dump the `@UTF` table at an offset
//!
//! # Example
//!
//! ```no_run
//! use criware_cli::{Cli, commands};
//!
//! let cli = Cli::from_args();
//! commands::run(&cli)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::panic))]

pub mod commands;
pub mod config;
pub mod output;

pub use config::{Cli, Commands, LogLevel, OutputFormat};
