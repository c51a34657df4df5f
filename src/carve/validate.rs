//! Deep format validators.
//!
//! A validator decides whether the candidate region really begins a file of
//! the stated format. Every validator sees the full region (a suffix of the
//! input); parse failures count as rejection and the scanner simply moves
//! on to the next descriptor.
//!
//! Four descriptors share the `PK\x03\x04` magic, so a `ScanContext` caches
//! one decoded ZIP view per offset and every PK validator reads from it.
//! The Open XML validator also records the metadata it derives (kind,
//! macro/encryption flags, revision) so extraction does not have to decode
//! the container twice.

use std::cell::{OnceCell, RefCell};

use super::container::ZipView;
use super::office::{
    core_has_encryption_marker, kind_from_overrides, parse_content_types, revision_from_core,
    OfficeInfo, OfficeKind,
};
use super::signatures::{JPEG_MAGIC, OLE_MAGIC, PK_MAGIC};
use super::{contains, rfind};

/// OASIS mime strings accepted for OpenDocument containers.
const OPENDOCUMENT_MIMES: [&str; 4] = [
    "application/vnd.oasis.opendocument.text",
    "application/vnd.oasis.opendocument.spreadsheet",
    "application/vnd.oasis.opendocument.presentation",
    "application/vnd.oasis.opendocument.spreadsheet-template",
];

/// Per-offset scan state shared across registry descriptors.
pub struct ScanContext<'a> {
    pub data: &'a [u8],
    zip: OnceCell<Option<ZipView<'a>>>,
    ooxml: RefCell<Option<OfficeInfo>>,
}

impl<'a> ScanContext<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            zip: OnceCell::new(),
            ooxml: RefCell::new(None),
        }
    }

    /// The ZIP view of this region, decoded at most once.
    fn zip(&self) -> Option<&ZipView<'a>> {
        self.zip.get_or_init(|| ZipView::parse(self.data)).as_ref()
    }

    /// Metadata recorded by an accepting Open XML validation, if any.
    pub fn take_ooxml_info(&self) -> Option<OfficeInfo> {
        self.ooxml.borrow_mut().take()
    }
}

/// Deep structural checks, one variant per registered validator.
#[derive(Debug)]
pub enum Validator {
    MsOle,
    Ooxml {
        part: &'static str,
        kind: OfficeKind,
    },
    OpenDocument,
    Jpeg,
    Pdf,
    Zip,
}

impl Validator {
    pub fn accepts(&self, ctx: &ScanContext<'_>) -> bool {
        match self {
            Validator::MsOle => validate_ms_ole(ctx.data),
            Validator::Ooxml { part, kind } => validate_ooxml(ctx, part, *kind),
            Validator::OpenDocument => validate_opendocument(ctx),
            Validator::Jpeg => validate_jpeg(ctx.data),
            Validator::Pdf => validate_pdf(ctx.data),
            Validator::Zip => validate_zip(ctx.data),
        }
    }
}

/// MS-OLE compound file. Beyond the signature, larger regions must carry at
/// least one of the well-known stream names; this is a coarse sniff, not a
/// parse of the directory entries.
fn validate_ms_ole(data: &[u8]) -> bool {
    if data.len() < 8 || data[..8] != OLE_MAGIC {
        return false;
    }

    if data.len() > 512 {
        return contains(data, b"WordDocument")
            || contains(data, b"Workbook")
            || contains(data, b"PowerPoint");
    }

    true
}

/// Office Open XML container of the expected application kind.
fn validate_ooxml(ctx: &ScanContext<'_>, part: &str, expected: OfficeKind) -> bool {
    if !validate_zip(ctx.data) {
        return false;
    }
    let Some(zip) = ctx.zip() else {
        return false;
    };

    let mut types = None;
    let mut info = OfficeInfo::default();

    // Single pass in archive order: kind derived from [Content_Types].xml
    // gates the encryption probe of a later docProps/core.xml.
    for member in &zip.members {
        match member.name.as_str() {
            "[Content_Types].xml" => {
                let Some(body) = member.contents() else {
                    continue;
                };
                if let Some(ct) = parse_content_types(&body) {
                    info.kind = kind_from_overrides(&ct);
                    types = Some(ct);
                }
            }
            "docProps/app.xml" => {
                let Some(body) = member.contents() else {
                    continue;
                };
                if contains(&body, b"VBAProject") {
                    info.has_macro = true;
                }
            }
            "docProps/core.xml" => {
                let Some(body) = member.contents() else {
                    continue;
                };
                if info.kind != OfficeKind::Unknown {
                    info.is_encrypted = core_has_encryption_marker(&body);
                }
                if let Some(revision) = revision_from_core(&body) {
                    info.version = Some(revision);
                }
            }
            _ => {}
        }
    }

    let Some(types) = types else {
        return false;
    };
    if info.kind != expected {
        return false;
    }
    if !types.defaults.iter().any(|d| d.content_type.contains(part)) {
        return false;
    }

    *ctx.ooxml.borrow_mut() = Some(info);
    true
}

/// OpenDocument: a ZIP with a `mimetype` member carrying an OASIS mime
/// string plus a content part, or the flat single-XML form.
fn validate_opendocument(ctx: &ScanContext<'_>) -> bool {
    if !validate_zip(ctx.data) {
        return ctx.data.starts_with(br#"<?xml version="1.0"?>"#)
            && contains(ctx.data, b"office:document");
    }
    let Some(zip) = ctx.zip() else {
        return false;
    };

    let mut has_mimetype = false;
    let mut has_content = false;

    for member in &zip.members {
        match member.name.as_str() {
            "mimetype" => {
                let Some(body) = member.contents() else {
                    continue;
                };
                if OPENDOCUMENT_MIMES
                    .iter()
                    .any(|mime| contains(&body, mime.as_bytes()))
                {
                    has_mimetype = true;
                }
            }
            "content.xml" | "styles.xml" => has_content = true,
            _ => {}
        }
    }

    has_mimetype && has_content
}

/// JPEG: SOI prefix and some EOI marker found by a reverse scan.
fn validate_jpeg(data: &[u8]) -> bool {
    if data.len() < 4 || data[..3] != JPEG_MAGIC {
        return false;
    }
    rfind(data, &[0xFF, 0xD9]).is_some()
}

/// PDF: header version in range, cross-reference machinery present, and a
/// terminated `%%EOF` trailer preceded by `startxref`.
fn validate_pdf(data: &[u8]) -> bool {
    if data.len() < 100 {
        return false;
    }
    if !data.starts_with(b"%PDF-") {
        return false;
    }

    let version = &data[5..8];
    if version < b"1.0".as_slice() || version > b"2.0".as_slice() {
        return false;
    }

    if !contains(data, b"xref") {
        return false;
    }
    if !contains(data, b" 0 obj") && !contains(data, b"\n0 obj") {
        return false;
    }

    let Some(eof) = rfind(data, b"%%EOF") else {
        return false;
    };
    if eof + 5 < data.len() {
        let trailer = data[eof + 5];
        if trailer != b'\r' && trailer != b'\n' && trailer != b' ' && trailer != b'\t' {
            return false;
        }
    }

    contains(&data[..eof], b"startxref")
}

/// Generic ZIP: magic check only.
fn validate_zip(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == PK_MAGIC
}

#[cfg(test)]
mod tests {
    use super::super::container::{eocd_record, stored_member};
    use super::super::office::utf16le;
    use super::*;

    // =====================================================================
    // Fixture builders
    // =====================================================================

    pub(crate) fn content_types_xml(kind_token: &str, default_part: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml; root={default_part}document"/>
  <Override PartName="/{default_part}main.xml" ContentType="application/vnd.openxmlformats-officedocument.{kind_token}.main+xml"/>
</Types>"#
        )
    }

    /// A minimal Open XML package of the given application kind.
    pub(crate) fn ooxml_package(kind_token: &str, part: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = stored_member(
            "[Content_Types].xml",
            content_types_xml(kind_token, part).as_bytes(),
        );
        for (name, body) in extra {
            zip.extend_from_slice(&stored_member(name, body));
        }
        zip.extend_from_slice(&stored_member(
            &format!("{part}main.xml"),
            b"<document/>",
        ));
        zip.extend_from_slice(&eocd_record(2 + extra.len() as u16));
        zip
    }

    pub(crate) fn odt_package() -> Vec<u8> {
        let mut zip = stored_member("mimetype", b"application/vnd.oasis.opendocument.text");
        zip.extend_from_slice(&stored_member("content.xml", b"<office:document/>"));
        zip.extend_from_slice(&eocd_record(2));
        zip
    }

    fn ooxml_info(data: &[u8], part: &'static str, kind: OfficeKind) -> Option<OfficeInfo> {
        let ctx = ScanContext::new(data);
        Validator::Ooxml { part, kind }
            .accepts(&ctx)
            .then(|| ctx.take_ooxml_info().unwrap())
    }

    // =====================================================================
    // Scenario 1: MS-OLE
    // =====================================================================

    #[test]
    fn scenario_1_small_ole_passes_on_signature_alone() {
        let mut data = OLE_MAGIC.to_vec();
        data.resize(512, 0);
        assert!(validate_ms_ole(&data));
    }

    #[test]
    fn scenario_1_large_ole_requires_stream_name() {
        let mut data = OLE_MAGIC.to_vec();
        data.resize(4096, 0);
        assert!(!validate_ms_ole(&data));

        data[1000..1012].copy_from_slice(b"WordDocument");
        assert!(validate_ms_ole(&data));
    }

    #[test]
    fn scenario_1_wrong_prefix_rejected() {
        assert!(!validate_ms_ole(&[0xD0, 0xCF, 0x11, 0xE0, 0, 0, 0, 0]));
        assert!(!validate_ms_ole(&[0xD0, 0xCF]));
    }

    // =====================================================================
    // Scenario 2: Open XML
    // =====================================================================

    #[test]
    fn scenario_2_docx_accepted_with_metadata() {
        let data = ooxml_package("wordprocessingml", "word/", &[]);
        let info = ooxml_info(&data, "word/", OfficeKind::Word).unwrap();
        assert_eq!(info.kind, OfficeKind::Word);
        assert!(!info.has_macro);
        assert!(!info.is_encrypted);
    }

    #[test]
    fn scenario_2_kind_mismatch_rejected() {
        // Spreadsheet content offered to the Word validator.
        let data = ooxml_package("spreadsheetml", "xl/", &[]);
        assert!(ooxml_info(&data, "word/", OfficeKind::Word).is_none());
        assert!(ooxml_info(&data, "xl/", OfficeKind::Excel).is_some());
    }

    #[test]
    fn scenario_2_missing_content_types_rejected() {
        let mut zip = stored_member("word/document.xml", b"<document/>");
        zip.extend_from_slice(&eocd_record(1));
        assert!(ooxml_info(&zip, "word/", OfficeKind::Word).is_none());
        // The generic ZIP validator still takes it.
        assert!(validate_zip(&zip));
    }

    #[test]
    fn scenario_2_macro_and_revision_recorded() {
        let mut core = b"<cp:coreProperties><cp:revision>4</cp:revision>".to_vec();
        core.extend_from_slice(&utf16le("EncryptionInfo"));
        core.extend_from_slice(b"</cp:coreProperties>");

        let data = ooxml_package(
            "wordprocessingml",
            "word/",
            &[
                ("docProps/app.xml", b"<Properties>VBAProject</Properties>"),
                ("docProps/core.xml", &core),
            ],
        );
        let info = ooxml_info(&data, "word/", OfficeKind::Word).unwrap();
        assert!(info.has_macro);
        assert!(info.is_encrypted);
        assert_eq!(info.version.as_deref(), Some("4"));
    }

    #[test]
    fn scenario_2_default_part_prefix_required() {
        // Content types resolve to Word but no Default entry mentions the
        // expected part prefix.
        let xml = br#"<Types>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="x.wordprocessingml.y"/>
</Types>"#;
        let mut zip = stored_member("[Content_Types].xml", xml);
        zip.extend_from_slice(&eocd_record(1));
        assert!(ooxml_info(&zip, "word/", OfficeKind::Word).is_none());
    }

    // =====================================================================
    // Scenario 3: OpenDocument
    // =====================================================================

    #[test]
    fn scenario_3_odt_zip_form() {
        let data = odt_package();
        let ctx = ScanContext::new(&data);
        assert!(Validator::OpenDocument.accepts(&ctx));
    }

    #[test]
    fn scenario_3_mimetype_without_content_rejected() {
        let mut zip = stored_member("mimetype", b"application/vnd.oasis.opendocument.text");
        zip.extend_from_slice(&eocd_record(1));
        let ctx = ScanContext::new(&zip);
        assert!(!Validator::OpenDocument.accepts(&ctx));
    }

    #[test]
    fn scenario_3_wrong_mimetype_rejected() {
        let mut zip = stored_member("mimetype", b"application/epub+zip");
        zip.extend_from_slice(&stored_member("content.xml", b"<office:document/>"));
        zip.extend_from_slice(&eocd_record(2));
        let ctx = ScanContext::new(&zip);
        assert!(!Validator::OpenDocument.accepts(&ctx));
    }

    #[test]
    fn scenario_3_flat_xml_fallback() {
        let flat = br#"<?xml version="1.0"?><office:document office:version="1.2"/>"#;
        let ctx = ScanContext::new(flat);
        assert!(Validator::OpenDocument.accepts(&ctx));

        let not_office = br#"<?xml version="1.0"?><html/>"#;
        let ctx = ScanContext::new(not_office);
        assert!(!Validator::OpenDocument.accepts(&ctx));
    }

    // =====================================================================
    // Scenario 4: JPEG
    // =====================================================================

    #[test]
    fn scenario_4_jpeg_needs_eoi() {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
        jpeg.resize(256, 0);
        assert!(!validate_jpeg(&jpeg), "no EOI marker");

        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        assert!(validate_jpeg(&jpeg));
    }

    #[test]
    fn scenario_4_jpeg_too_short() {
        assert!(!validate_jpeg(&[0xFF, 0xD8, 0xFF]));
    }

    // =====================================================================
    // Scenario 5: PDF
    // =====================================================================

    fn minimal_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n".to_vec();
        pdf.resize(200, b'x');
        pdf.extend_from_slice(b"\nxref\n0 1\nstartxref\n9\n%%EOF\n");
        pdf
    }

    #[test]
    fn scenario_5_wellformed_pdf_accepted() {
        assert!(validate_pdf(&minimal_pdf()));
    }

    #[test]
    fn scenario_5_version_range() {
        let mut pdf = minimal_pdf();
        pdf[5..8].copy_from_slice(b"2.0");
        assert!(validate_pdf(&pdf));
        pdf[5..8].copy_from_slice(b"2.1");
        assert!(!validate_pdf(&pdf));
        pdf[5..8].copy_from_slice(b"0.9");
        assert!(!validate_pdf(&pdf));
    }

    #[test]
    fn scenario_5_missing_startxref_rejected() {
        let mut pdf = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n".to_vec();
        pdf.resize(200, b'x');
        pdf.extend_from_slice(b"\nxref\n0 1\n%%EOF\n");
        assert!(!validate_pdf(&pdf));
    }

    #[test]
    fn scenario_5_eof_trailer_byte_checked() {
        let mut pdf = minimal_pdf();
        pdf.extend_from_slice(b"garbage right after the trailer");
        // %%EOF followed by '\n' then our garbage: the byte after the marker
        // is still the newline, so it passes.
        assert!(validate_pdf(&pdf));

        let mut pdf = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n".to_vec();
        pdf.resize(200, b'x');
        pdf.extend_from_slice(b"\nxref\n0 1\nstartxref\n9\n%%EOFZtrailing");
        assert!(!validate_pdf(&pdf), "byte after %%EOF must be whitespace");
    }

    #[test]
    fn scenario_5_too_small_rejected() {
        assert!(!validate_pdf(b"%PDF-1.4\nxref\n1 0 obj\nstartxref\n%%EOF"));
    }

    // =====================================================================
    // Scenario 6: shared ZIP view
    // =====================================================================

    #[test]
    fn scenario_6_zip_parse_shared_across_validators() {
        let data = odt_package();
        let ctx = ScanContext::new(&data);

        // All PK validators run against the same lazily-decoded view.
        assert!(!Validator::Ooxml {
            part: "word/",
            kind: OfficeKind::Word
        }
        .accepts(&ctx));
        assert!(Validator::OpenDocument.accepts(&ctx));
        assert!(Validator::Zip.accepts(&ctx));
        assert!(ctx.zip.get().is_some(), "view decoded exactly once");
    }
}
