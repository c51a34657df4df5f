//! Office document metadata.
//!
//! Covers both container generations: the legacy MS-OLE compound files
//! (`doc`/`xls`/`ppt`), inspected with byte-level heuristics rather than a
//! full directory parse, and the Open XML family, whose metadata comes out
//! of `[Content_Types].xml` and the `docProps` parts.

use std::fmt;
use std::sync::OnceLock;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};

use super::contains;

/// Which Office application a document belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfficeKind {
    #[default]
    Unknown,
    Word,
    Excel,
    PowerPoint,
}

impl fmt::Display for OfficeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfficeKind::Unknown => write!(f, "Unknown Office"),
            OfficeKind::Word => write!(f, "Word"),
            OfficeKind::Excel => write!(f, "Excel"),
            OfficeKind::PowerPoint => write!(f, "PowerPoint"),
        }
    }
}

/// Metadata attached to extracted office documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfficeInfo {
    pub kind: OfficeKind,
    pub version: Option<String>,
    pub is_encrypted: bool,
    pub has_macro: bool,
}

/// Encode an ASCII literal the way OLE streams store wide strings.
pub(crate) fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// Decoded `[Content_Types].xml`.
#[derive(Debug, Default)]
pub struct ContentTypes {
    pub defaults: Vec<TypeDefault>,
    pub overrides: Vec<TypeOverride>,
}

#[derive(Debug)]
pub struct TypeDefault {
    pub extension: String,
    pub content_type: String,
}

#[derive(Debug)]
pub struct TypeOverride {
    pub part_name: String,
    pub content_type: String,
}

/// Parse `[Content_Types].xml`. Malformed XML or a missing `Types` root
/// yields `None`, which validation treats as "no content types".
pub fn parse_content_types(xml: &[u8]) -> Option<ContentTypes> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut out = ContentTypes::default();
    let mut saw_types = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"Types" => saw_types = true,
                    b"Default" => {
                        let mut extension = String::new();
                        let mut content_type = String::new();
                        for attr in e.attributes().flatten() {
                            let value = attr.unescape_value().ok()?;
                            match attr.key.local_name().as_ref() {
                                b"Extension" => extension = value.into_owned(),
                                b"ContentType" => content_type = value.into_owned(),
                                _ => {}
                            }
                        }
                        out.defaults.push(TypeDefault {
                            extension,
                            content_type,
                        });
                    }
                    b"Override" => {
                        let mut part_name = String::new();
                        let mut content_type = String::new();
                        for attr in e.attributes().flatten() {
                            let value = attr.unescape_value().ok()?;
                            match attr.key.local_name().as_ref() {
                                b"PartName" => part_name = value.into_owned(),
                                b"ContentType" => content_type = value.into_owned(),
                                _ => {}
                            }
                        }
                        out.overrides.push(TypeOverride {
                            part_name,
                            content_type,
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    saw_types.then_some(out)
}

/// Derive the application kind from the `Override` content types.
/// Later overrides win, matching single-pass decoding order.
pub fn kind_from_overrides(types: &ContentTypes) -> OfficeKind {
    let mut kind = OfficeKind::Unknown;
    for ov in &types.overrides {
        if ov.content_type.contains("wordprocessing") {
            kind = OfficeKind::Word;
        } else if ov.content_type.contains("spreadsheet") {
            kind = OfficeKind::Excel;
        } else if ov.content_type.contains("presentation") {
            kind = OfficeKind::PowerPoint;
        }
    }
    kind
}

/// First `<cp:revision>N</cp:revision>` value in `docProps/core.xml`.
pub fn revision_from_core(core: &[u8]) -> Option<String> {
    static RE: OnceLock<regex::bytes::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        regex::bytes::Regex::new(r"<cp:revision>(\d+)</cp:revision>").expect("revision pattern")
    });
    re.captures(core)
        .and_then(|c| c.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

/// Encryption markers found in `docProps/core.xml` of an Open XML package.
pub fn core_has_encryption_marker(core: &[u8]) -> bool {
    contains(core, &utf16le("Encrypt")) || contains(core, &utf16le("EncryptionInfo"))
}

/// Per-kind protection-flag byte offset in the legacy binary headers.
fn protection_flag_offset(kind: OfficeKind) -> Option<usize> {
    match kind {
        OfficeKind::Word => Some(0x0B),
        OfficeKind::Excel => Some(0x2F),
        OfficeKind::PowerPoint => Some(0x0F),
        OfficeKind::Unknown => None,
    }
}

/// Inspect a legacy MS-OLE payload (`doc`/`xls`/`ppt`).
///
/// This is a stream-name sniff over the raw bytes, not a parse of the
/// compound-file directory. The encryption checks are deliberately
/// permissive: any one marker flags the document.
pub fn sniff_binary_office(data: &[u8]) -> OfficeInfo {
    let mut info = OfficeInfo::default();

    if contains(data, b"WordDocument") {
        info.kind = OfficeKind::Word;
    } else if contains(data, b"Workbook") {
        info.kind = OfficeKind::Excel;
    } else if contains(data, b"PowerPoint") {
        info.kind = OfficeKind::PowerPoint;
    }

    if contains(data, b"_VBA_PROJECT") {
        info.has_macro = true;
    }

    if info.kind == OfficeKind::Unknown {
        return info;
    }

    let has_marker = contains(data, &utf16le("Encrypt"));

    let mut has_header = false;
    if data.len() > 512 {
        if data[512..].starts_with(&[0xFE, 0xFF, 0xFF, 0xFF]) {
            has_header = true;
        }
        if contains(&data[..512], &utf16le("EncryptPackage")) {
            has_header = true;
        }
    }

    let mut has_flag = false;
    if data.len() > 0x200 {
        if let Some(at) = protection_flag_offset(info.kind) {
            has_flag = data[at] & 0x01 != 0;
        }
    }

    let has_stream = contains(data, &utf16le("EncryptionInfo"));

    info.is_encrypted = has_marker || has_header || has_flag || has_stream;

    if info.has_macro && contains(data, &utf16le("DefaultPassword")) {
        info.is_encrypted = true;
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT_TYPES_XLSX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#;

    fn ole_doc(extra: &[&[u8]]) -> Vec<u8> {
        let mut data = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        data.resize(4096, 0);
        let mut at = 1024;
        for chunk in extra {
            data[at..at + chunk.len()].copy_from_slice(chunk);
            at += chunk.len() + 16;
        }
        data
    }

    // =====================================================================
    // Scenario 1: content-types decoding
    // =====================================================================

    #[test]
    fn scenario_1_content_types_parse() {
        let types = parse_content_types(CONTENT_TYPES_XLSX.as_bytes()).unwrap();
        assert_eq!(types.defaults.len(), 2);
        assert_eq!(types.overrides.len(), 1);
        assert_eq!(types.defaults[0].extension, "rels");
        assert_eq!(types.overrides[0].part_name, "/xl/workbook.xml");
        assert_eq!(kind_from_overrides(&types), OfficeKind::Excel);
    }

    #[test]
    fn scenario_1_later_override_wins() {
        let xml = br#"<Types>
            <Override PartName="/a" ContentType="x.wordprocessingml.y"/>
            <Override PartName="/b" ContentType="x.presentationml.y"/>
        </Types>"#;
        let types = parse_content_types(xml).unwrap();
        assert_eq!(kind_from_overrides(&types), OfficeKind::PowerPoint);
    }

    #[test]
    fn scenario_1_garbage_xml_rejected() {
        assert!(parse_content_types(b"<Types><Default").is_none());
        assert!(parse_content_types(b"not xml at all").is_none());
        assert!(parse_content_types(b"<Other/>").is_none());
    }

    // =====================================================================
    // Scenario 2: core.xml probes
    // =====================================================================

    #[test]
    fn scenario_2_revision_extraction() {
        let core = b"<cp:coreProperties><cp:revision>17</cp:revision></cp:coreProperties>";
        assert_eq!(revision_from_core(core).as_deref(), Some("17"));
        assert_eq!(revision_from_core(b"<cp:revision>x</cp:revision>"), None);
    }

    #[test]
    fn scenario_2_encryption_marker_is_utf16() {
        let mut core = b"<cp:coreProperties/>".to_vec();
        core.extend_from_slice(&utf16le("EncryptionInfo"));
        assert!(core_has_encryption_marker(&core));
        // The ASCII spelling alone does not count.
        assert!(!core_has_encryption_marker(b"Encrypt EncryptionInfo"));
    }

    // =====================================================================
    // Scenario 3: binary OLE sniff
    // =====================================================================

    #[test]
    fn scenario_3_kind_from_stream_names() {
        assert_eq!(
            sniff_binary_office(&ole_doc(&[b"WordDocument"])).kind,
            OfficeKind::Word
        );
        assert_eq!(
            sniff_binary_office(&ole_doc(&[b"Workbook"])).kind,
            OfficeKind::Excel
        );
        assert_eq!(
            sniff_binary_office(&ole_doc(&[b"PowerPoint"])).kind,
            OfficeKind::PowerPoint
        );
        assert_eq!(sniff_binary_office(&ole_doc(&[])).kind, OfficeKind::Unknown);
    }

    #[test]
    fn scenario_3_macro_and_encryption_stream() {
        let enc = utf16le("EncryptionInfo");
        let info = sniff_binary_office(&ole_doc(&[b"WordDocument", b"_VBA_PROJECT", &enc]));
        assert!(info.has_macro);
        assert!(info.is_encrypted);
    }

    #[test]
    fn scenario_3_protection_flag_low_bit() {
        let mut data = ole_doc(&[b"WordDocument"]);
        data[0x0B] = 0x01;
        assert!(sniff_binary_office(&data).is_encrypted);

        let mut data = ole_doc(&[b"Workbook"]);
        data[0x2F] = 0x03;
        assert!(sniff_binary_office(&data).is_encrypted);

        // Bit clear: not encrypted.
        let data = ole_doc(&[b"PowerPoint"]);
        assert!(!sniff_binary_office(&data).is_encrypted);
    }

    #[test]
    fn scenario_3_encryption_header_after_first_sector() {
        let mut data = ole_doc(&[b"Workbook"]);
        data[512..516].copy_from_slice(&[0xFE, 0xFF, 0xFF, 0xFF]);
        assert!(sniff_binary_office(&data).is_encrypted);
    }

    #[test]
    fn scenario_3_default_password_needs_macro() {
        let pw = utf16le("DefaultPassword");
        let with_macro =
            sniff_binary_office(&ole_doc(&[b"WordDocument", b"_VBA_PROJECT", &pw]));
        assert!(with_macro.is_encrypted);

        let without_macro = sniff_binary_office(&ole_doc(&[b"WordDocument", &pw]));
        assert!(!without_macro.is_encrypted);
    }

    #[test]
    fn scenario_3_no_kind_means_no_encryption_probe() {
        let enc = utf16le("EncryptionInfo");
        let info = sniff_binary_office(&ole_doc(&[&enc]));
        assert_eq!(info.kind, OfficeKind::Unknown);
        assert!(!info.is_encrypted);
    }
}
