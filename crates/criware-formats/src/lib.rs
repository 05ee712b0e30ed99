//! Parsers and builders for CRIWare media containers
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::doc_markdown)] // Many CRIWare-specific terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::float_cmp)] // Binary format requirements
#![allow(clippy::cast_precision_loss)] // Durations and frame rates
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate reads the two container formats of the CRIWare middleware and
//! the pieces they are built from.
//!
//! # Supported Formats
//!
//! - **@UTF**: self-describing schema tables used as the metadata language
//!   of both containers
//! - **CPK**: packed archives with a TOC, optional ETOC, and per-file
//!   CRILAYLA compression
//! - **USM**: interleaved audio/video movies opening with a `CRID` chunk
//! - **CRILAYLA**: backward bit-level LZ compression
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: every format has a parser and a builder
//! - **Typed Errors**: malformed input is a `Result`, never a panic
//! - **Owned Sources**: a [`CriReader`] owns its `Read + Seek` source and
//!   is driven from one thread
//!
//! # Example
//!
//! ```no_run
//! use criware_formats::CriReader;
//!
//! let mut reader = CriReader::open("movie.cpk")?;
//! for (index, entry) in reader.entries().to_vec().iter().enumerate() {
//!     let bytes = reader.extract_to_memory(index)?;
//!     assert_eq!(bytes.len() as u64, entry.extract_size);
//! }
//! # Ok::<(), criware_formats::ContainerError>(())
//! ```

#![warn(missing_docs)]

pub mod catalog;
/// CPK packed archives
///
/// The scan reads the descriptor, TOC and ETOC tables into a catalog;
/// [`cpk::CpkBuilder`] writes archives the scan accepts.
pub mod cpk;
pub mod crilayla;
mod error;
pub mod extract;
pub mod fourcc;
mod reader;
pub mod usm;
pub mod utf;

pub use catalog::{AssetClass, AudioInfo, CatalogEntry, EntryOrigin, VideoInfo};
pub use error::{ContainerError, ContainerResult, ErrorKind};
pub use extract::ExtractOptions;
pub use fourcc::{ContainerKind, FourCc};
pub use reader::{Container, CriReader};
