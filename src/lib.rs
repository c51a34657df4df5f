//! Chisel - signature-driven file carver.
//!
//! Given one opaque binary blob (a disk image, a memory dump, a mangled
//! mailbox), chisel locates, validates and extracts self-contained files of
//! recognized office, document, image, archive and markup formats, using
//! nothing but the bytes themselves - no filesystem metadata. Alongside the
//! extracted payloads it reports which byte ranges of the input were
//! attributed to recovered files and which remain unexplained.
//!
//! # Features
//!
//! - **Deep validation**: Open XML content types, OpenDocument mimetypes,
//!   PDF xref/trailer pairing and JPEG markers gate every extraction
//! - **Parallel pipeline**: one scanning scheduler, a worker pool and an
//!   aggregator connected by bounded channels
//! - **Office triage**: binary and Open XML documents carry kind,
//!   macro and encryption heuristics
//! - **Coverage accounting**: byte-accurate map of claimed vs. unexplained
//!   input ranges with merged gap reporting
//!
//! # Example
//!
//! ```no_run
//! use chisel::pipeline::{self, PipelineConfig};
//! use std::collections::HashSet;
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let data = std::fs::read("dump.bin")?;
//!     let config = PipelineConfig {
//!         output_dir: PathBuf::from("recovered"),
//!         workers: 4,
//!         allowed: HashSet::new(), // empty set: every known format
//!     };
//!     let report = pipeline::run(&data, &config)?;
//!     println!("{}", report.stats.render());
//!     Ok(())
//! }
//! ```

pub mod carve;
pub mod cli;
pub mod config;
pub mod cpu;
pub mod pipeline;

// Re-export commonly used types
pub use carve::{
    extract_file, registered_extensions, registry, Candidate, CarveError, CarvedFile,
    ExtractionResult, OfficeInfo, OfficeKind, Priority, MIN_FILE_SIZE,
};
pub use config::Config;
pub use cpu::physical_cpu_count;
pub use pipeline::{CarveReport, ExtractionStats, PipelineConfig, Progress, UncoveredRange};
