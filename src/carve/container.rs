//! Minimal ZIP container reader for validation.
//!
//! Walks the local-file-header table from the start of a candidate region.
//! A candidate is a suffix of the whole input and usually carries trailing
//! bytes that belong to other files, so an end-anchored (EOCD-first) reader
//! would resolve the wrong archive; walking the local headers from offset 0
//! always describes the archive that begins at the candidate.
//!
//! Only what validation needs is implemented: member names in archive
//! order, and contents for stored and DEFLATE members. The walk stops at
//! the central directory or at the first entry that defers its sizes to a
//! data descriptor.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::DeflateDecoder;

/// Local-file-header magic, `PK\x03\x04`.
pub const LOCAL_HEADER: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
/// End-of-central-directory magic, `PK\x05\x06`.
pub const EOCD: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
/// Fixed size of an EOCD record without an archive comment.
pub const EOCD_LEN: usize = 22;

const LOCAL_HEADER_LEN: usize = 30;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

/// One member of the archive, with its raw (possibly compressed) bytes.
#[derive(Debug)]
pub struct ZipMember<'a> {
    pub name: String,
    method: u16,
    raw: &'a [u8],
    uncompressed_size: u32,
}

impl ZipMember<'_> {
    /// Member contents, inflating DEFLATE members on demand.
    ///
    /// Returns `None` for unsupported compression methods or corrupt
    /// streams; callers treat that the same as an absent member.
    pub fn contents(&self) -> Option<Cow<'_, [u8]>> {
        match self.method {
            METHOD_STORED => Some(Cow::Borrowed(self.raw)),
            METHOD_DEFLATE => {
                let mut out = Vec::with_capacity(self.uncompressed_size as usize);
                let mut decoder =
                    DeflateDecoder::new(self.raw).take(u64::from(self.uncompressed_size));
                decoder.read_to_end(&mut out).ok()?;
                Some(Cow::Owned(out))
            }
            _ => None,
        }
    }
}

/// Decoded view of the ZIP archive beginning at offset 0 of a region.
#[derive(Debug)]
pub struct ZipView<'a> {
    pub members: Vec<ZipMember<'a>>,
}

impl<'a> ZipView<'a> {
    /// Walk local file headers from the start of `data`.
    ///
    /// Returns `None` when `data` does not begin with a local header.
    /// A truncated or descriptor-using entry ends the walk; members read
    /// up to that point are kept.
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        if !data.starts_with(&LOCAL_HEADER) {
            return None;
        }

        let mut members = Vec::new();
        let mut pos = 0usize;

        while pos + LOCAL_HEADER_LEN <= data.len() && data[pos..].starts_with(&LOCAL_HEADER) {
            let flags = read_u16(data, pos + 6);
            let method = read_u16(data, pos + 8);
            let compressed_size = read_u32(data, pos + 18) as usize;
            let uncompressed_size = read_u32(data, pos + 22);
            let name_len = read_u16(data, pos + 26) as usize;
            let extra_len = read_u16(data, pos + 28) as usize;

            let name_start = pos + LOCAL_HEADER_LEN;
            let data_start = name_start + name_len + extra_len;
            if data_start > data.len() {
                break;
            }

            // Sizes live in a trailing data descriptor; without them the
            // next header cannot be located.
            if flags & FLAG_DATA_DESCRIPTOR != 0 {
                break;
            }

            let data_end = match data_start.checked_add(compressed_size) {
                Some(end) if end <= data.len() => end,
                _ => break,
            };

            let name = String::from_utf8_lossy(&data[name_start..name_start + name_len])
                .into_owned();

            members.push(ZipMember {
                name,
                method,
                raw: &data[data_start..data_end],
                uncompressed_size,
            });

            pos = data_end;
        }

        Some(Self { members })
    }

    /// Look up a member by exact name.
    pub fn member(&self, name: &str) -> Option<&ZipMember<'a>> {
        self.members.iter().find(|m| m.name == name)
    }
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Serialize one stored (uncompressed) member as a local-header record.
/// Test helper shared by the validator and pipeline test suites.
#[cfg(test)]
pub(crate) fn stored_member(name: &str, contents: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(LOCAL_HEADER_LEN + name.len() + contents.len());
    out.extend_from_slice(&LOCAL_HEADER);
    out.extend_from_slice(&[20, 0]); // version needed
    out.extend_from_slice(&[0, 0]); // flags
    out.extend_from_slice(&METHOD_STORED.to_le_bytes());
    out.extend_from_slice(&[0, 0, 0, 0]); // mod time + date
    out.extend_from_slice(&[0, 0, 0, 0]); // crc32 (unchecked)
    out.extend_from_slice(&(contents.len() as u32).to_le_bytes());
    out.extend_from_slice(&(contents.len() as u32).to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&[0, 0]); // extra length
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(contents);
    out
}

/// Serialize an EOCD record without a comment. Test helper.
#[cfg(test)]
pub(crate) fn eocd_record(entries: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(EOCD_LEN);
    out.extend_from_slice(&EOCD);
    out.extend_from_slice(&[0, 0]); // disk number
    out.extend_from_slice(&[0, 0]); // central directory disk
    out.extend_from_slice(&entries.to_le_bytes());
    out.extend_from_slice(&entries.to_le_bytes());
    out.extend_from_slice(&[0, 0, 0, 0]); // central directory size
    out.extend_from_slice(&[0, 0, 0, 0]); // central directory offset
    out.extend_from_slice(&[0, 0]); // comment length
    out
}
