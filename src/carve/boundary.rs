//! File-end resolution for accepted candidates.
//!
//! Layered like the carving strategy: a coarse clip at the next foreign
//! signature first, then the format's own terminator (which always wins
//! when present), then a next-same-header fallback for formats that never
//! produced a terminator. Formats without a terminator rule (`rtf`, `html`,
//! raw OLE, most OpenDocument variants) keep the coarse clip.

use super::container::{EOCD, EOCD_LEN};
use super::signatures::{registry, Signature};
use super::{find, rfind};

/// Resolve the end offset of a file starting at offset 0 of `data`, carved
/// as `sig`. The returned end is clamped to `data.len()`; minimum-size
/// enforcement is the caller's job.
pub fn resolve_end(data: &[u8], sig: &Signature) -> usize {
    let mut end = data.len();

    // Clip at the first foreign signature occurrence. Deliberately coarse:
    // a magic inside the payload clips short, and the format refinement
    // below overrides it for every format that has a terminator.
    for other in &registry()[1..] {
        if other.magic.is_empty() {
            continue;
        }
        if let Some(idx) = find(data, other.magic) {
            if idx > 0 && idx < end {
                end = idx;
            }
        }
    }

    match sig.extension {
        "jpg" | "jpeg" => {
            if let Some(eoi) = rfind(data, &[0xFF, 0xD9]) {
                end = eoi + 2;
            }
        }
        "pdf" => {
            if let Some(eof) = rfind(data, b"%%EOF") {
                end = eof + 5;
                // Consume one trailing newline: LF, CR, or CRLF.
                if end < data.len() {
                    match data[end] {
                        b'\n' => end += 1,
                        b'\r' => {
                            end += 1;
                            if end < data.len() && data[end] == b'\n' {
                                end += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        "zip" | "docx" | "xlsx" | "pptx" | "odt" => {
            if let Some(eocd) = rfind(data, &EOCD) {
                end = eocd + EOCD_LEN;
            }
        }
        _ => {}
    }

    // Nothing bounded the file: fall back to the next same-format header.
    if end == data.len() && data.len() > 100 {
        if let Some(next) = find(&data[1..], sig.magic) {
            end = next + 1;
        }
    }

    end.min(data.len())
}
