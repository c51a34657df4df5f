//! File signature registry for carving.
//!
//! The registry is a fixed, ordered table: the scanner walks it in declared
//! order and extraction commits to the first descriptor whose magic matches
//! and whose deep validator accepts. The ordering is load-bearing for the
//! `PK\x03\x04` family: the Open XML and OpenDocument validators must get
//! first refusal before the magic-only `zip` fallback swallows the
//! candidate.

use std::collections::HashSet;

use super::validate::{ScanContext, Validator};
use super::OfficeKind;

/// MS-OLE compound-file signature (legacy DOC/XLS/PPT).
pub const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
/// ZIP local-file-header signature, shared by every Open XML container.
pub const PK_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
/// JPEG start-of-image prefix.
pub const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// A file format descriptor.
#[derive(Debug)]
pub struct Signature {
    /// Lowercase extension tag; also the carved file's extension.
    pub extension: &'static str,
    /// Magic bytes at `offset` in a candidate.
    pub magic: &'static [u8],
    /// Offset from the candidate start where the magic appears.
    pub offset: usize,
    /// Optional deep structural check over the full candidate region.
    pub validator: Option<Validator>,
}

static REGISTRY: &[Signature] = &[
    Signature {
        extension: "doc",
        magic: &OLE_MAGIC,
        offset: 0,
        validator: Some(Validator::MsOle),
    },
    Signature {
        extension: "docx",
        magic: &PK_MAGIC,
        offset: 0,
        validator: Some(Validator::Ooxml {
            part: "word/",
            kind: OfficeKind::Word,
        }),
    },
    Signature {
        extension: "ppt",
        magic: &OLE_MAGIC,
        offset: 0,
        validator: Some(Validator::MsOle),
    },
    Signature {
        extension: "pptx",
        magic: &PK_MAGIC,
        offset: 0,
        validator: Some(Validator::Ooxml {
            part: "ppt/",
            kind: OfficeKind::PowerPoint,
        }),
    },
    Signature {
        extension: "xls",
        magic: &OLE_MAGIC,
        offset: 0,
        validator: Some(Validator::MsOle),
    },
    Signature {
        extension: "xlsx",
        magic: &PK_MAGIC,
        offset: 0,
        validator: Some(Validator::Ooxml {
            part: "xl/",
            kind: OfficeKind::Excel,
        }),
    },
    Signature {
        extension: "jpg",
        magic: &JPEG_MAGIC,
        offset: 0,
        validator: Some(Validator::Jpeg),
    },
    Signature {
        extension: "jpeg",
        magic: &JPEG_MAGIC,
        offset: 0,
        validator: Some(Validator::Jpeg),
    },
    Signature {
        extension: "pdf",
        magic: b"%PDF",
        offset: 0,
        validator: Some(Validator::Pdf),
    },
    Signature {
        extension: "rtf",
        magic: b"{\\rtf1",
        offset: 0,
        validator: None,
    },
    Signature {
        extension: "odt",
        magic: &PK_MAGIC,
        offset: 0,
        validator: Some(Validator::OpenDocument),
    },
    Signature {
        extension: "ods",
        magic: &PK_MAGIC,
        offset: 0,
        validator: Some(Validator::OpenDocument),
    },
    Signature {
        extension: "ots",
        magic: &PK_MAGIC,
        offset: 0,
        validator: Some(Validator::OpenDocument),
    },
    Signature {
        extension: "fods",
        magic: br#"<?xml version="1.0"?>"#,
        offset: 0,
        validator: None,
    },
    Signature {
        extension: "odp",
        magic: &PK_MAGIC,
        offset: 0,
        validator: Some(Validator::OpenDocument),
    },
    Signature {
        extension: "zip",
        magic: &PK_MAGIC,
        offset: 0,
        validator: Some(Validator::Zip),
    },
    Signature {
        extension: "html",
        magic: b"<!DOCTYPE html",
        offset: 0,
        validator: None,
    },
    Signature {
        extension: "html",
        magic: b"<html",
        offset: 0,
        validator: None,
    },
    Signature {
        extension: "html",
        magic: b"<HTML",
        offset: 0,
        validator: None,
    },
];

/// The full registry, in matching order.
pub fn registry() -> &'static [Signature] {
    REGISTRY
}

/// Every registered extension tag, deduplicated.
pub fn registered_extensions() -> Vec<&'static str> {
    let mut seen = Vec::new();
    for sig in REGISTRY {
        if !seen.contains(&sig.extension) {
            seen.push(sig.extension);
        }
    }
    seen
}

/// Scan a candidate region against the registry.
///
/// `allowed` restricts matching to the listed extensions; an empty set
/// admits every registered extension. Returns the accepting descriptors in
/// registry order; the first entry is the one extraction commits to.
pub fn find_signatures(
    ctx: &ScanContext<'_>,
    allowed: &HashSet<String>,
) -> Vec<&'static Signature> {
    let mut found = Vec::new();

    for sig in REGISTRY {
        if !allowed.is_empty() && !allowed.contains(sig.extension) {
            continue;
        }
        if sig.magic.is_empty() {
            continue;
        }

        let end = sig.offset + sig.magic.len();
        if end > ctx.data.len() {
            continue;
        }
        if &ctx.data[sig.offset..end] != sig.magic {
            continue;
        }

        if let Some(validator) = &sig.validator {
            if !validator.accepts(ctx) {
                continue;
            }
        }

        found.push(sig);
    }

    found
}
