//! File carving core - recover embedded files from opaque binary blobs.
//!
//! No filesystem metadata is consulted: a candidate is any offset whose
//! bytes match a registered signature and survive that format's deep
//! validation. Extraction then resolves the file's end from format
//! terminators, writes the payload, and reports a result record for
//! aggregation.
//!
//! # Layout
//!
//! - [`signatures`]: the ordered format registry and the scanner
//! - [`validate`]: deep per-format validation with a shared ZIP view
//! - [`boundary`]: end-offset resolution
//! - [`container`]: minimal ZIP local-header walker used by validation
//! - [`office`]: office document metadata (both binary OLE and Open XML)

pub mod boundary;
pub mod container;
pub mod office;
pub mod signatures;
pub mod validate;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub use office::{OfficeInfo, OfficeKind};
pub use signatures::{find_signatures, registered_extensions, registry, Signature};
pub use validate::ScanContext;

/// Anything smaller than this after boundary resolution is noise.
pub const MIN_FILE_SIZE: usize = 2 * 1024;

/// Dispatch class of a candidate. Office documents jump the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    Office,
    Regular,
}

/// A unit of work: a suffix of the input starting at `start`.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub data: &'a [u8],
    pub start: usize,
    /// Monotonic id assigned at dispatch; embedded in the output filename.
    pub seq: u32,
    pub priority: Priority,
}

/// A successfully carved file.
#[derive(Debug, Clone, Serialize)]
pub struct CarvedFile {
    pub filename: PathBuf,
    /// Payload length in bytes.
    pub size: usize,
    /// Absolute input offset where the file begins.
    pub start: usize,
    /// Absolute input offset one past the last byte (`start + size`).
    pub end: usize,
    /// Human-readable format label, e.g. "Word Document (Open XML)".
    pub label: String,
    /// Present for office extensions only.
    pub office: Option<OfficeInfo>,
    /// Blake3 hash of the payload, hex-encoded.
    pub hash: String,
}

/// Why a single candidate failed. The scan as a whole never aborts on
/// these; the aggregator counts them.
#[derive(Debug, Error)]
pub enum CarveError {
    #[error("no known file signatures found")]
    NoSignature,
    #[error("file too small (less than {MIN_FILE_SIZE} bytes)")]
    TooSmall { size: usize },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Outcome of one extraction attempt, tagged with the worker that ran it.
#[derive(Debug)]
pub struct ExtractionResult {
    pub seq: u32,
    pub worker: usize,
    pub outcome: Result<CarvedFile, CarveError>,
}

/// Whether an extension tag belongs to the office family (both container
/// generations): such candidates take the priority queue.
pub fn is_office_extension(ext: &str) -> bool {
    ext.starts_with("doc") || ext.starts_with("xls") || ext.starts_with("ppt")
}

/// Display label for an extension tag.
pub fn type_label(ext: &str) -> String {
    match ext {
        "jpg" | "jpeg" => "JPEG Image".to_string(),
        "pdf" => "PDF Document".to_string(),
        "docx" => "Word Document (Open XML)".to_string(),
        "xlsx" => "Excel Workbook (Open XML)".to_string(),
        "pptx" => "PowerPoint Presentation (Open XML)".to_string(),
        "odt" => "OpenDocument Text".to_string(),
        "zip" => "ZIP Archive".to_string(),
        "doc" => "Word Document (Binary)".to_string(),
        "xls" => "Excel Workbook (Binary)".to_string(),
        "ppt" => "PowerPoint Presentation (Binary)".to_string(),
        "rtf" => "Rich Text Format".to_string(),
        "html" => "HTML Document".to_string(),
        _ => ext.to_uppercase(),
    }
}

/// Run one extraction attempt over a candidate region.
///
/// Scans the region, commits to the first accepting descriptor, resolves
/// the end offset, writes `data[..end]` to `file_{seq:04}.{ext}` in
/// `output_dir`, and assembles the result record.
pub fn extract_file(
    data: &[u8],
    output_dir: &Path,
    seq: u32,
    start: usize,
    allowed: &HashSet<String>,
) -> Result<CarvedFile, CarveError> {
    let ctx = ScanContext::new(data);
    let found = find_signatures(&ctx, allowed);
    let Some(sig) = found.first() else {
        return Err(CarveError::NoSignature);
    };
    let ext = sig.extension;

    let office = if is_office_extension(ext) {
        Some(match ext {
            "doc" | "xls" | "ppt" => office::sniff_binary_office(data),
            // Open XML metadata was derived during validation.
            _ => ctx.take_ooxml_info().unwrap_or_default(),
        })
    } else {
        None
    };

    let end = boundary::resolve_end(data, sig);
    if end < MIN_FILE_SIZE {
        return Err(CarveError::TooSmall { size: end });
    }

    let payload = &data[..end];
    let filename = output_dir.join(format!("file_{seq:04}.{ext}"));
    fs::write(&filename, payload).map_err(|source| CarveError::Write {
        path: filename.clone(),
        source,
    })?;

    let hash = hex::encode(blake3::hash(payload).as_bytes());

    Ok(CarvedFile {
        filename,
        size: end,
        start,
        end: start + end,
        label: type_label(ext),
        office,
        hash,
    })
}

/// First occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Last occurrence of `needle` in `haystack`.
pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}
