// DOCX header watermarks end to end

use docmark::codec::docx::DocxDocument;
use docmark::render::HeaderHost;
use docmark::{WatermarkConfig, WatermarkPosition};

use super::fixtures::{self, part, unzip};

const SECTION_WITH_HEADER: &str =
    r#"<w:p/><w:sectPr><w:headerReference w:type="default" r:id="rId9"/><w:pgSz w:w="12240" w:h="15840"/></w:sectPr>"#;

fn config(position: WatermarkPosition) -> WatermarkConfig {
    WatermarkConfig::builder("DO NOT COPY")
        .position(position)
        .rotation_degrees(-45.7)
        .build()
        .unwrap()
}

// Test: a document without any header gets one default header, referenced
// from its section
#[test]
fn test_header_is_created_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());
    let input = fixtures::docx(r#"<w:p><w:r><w:t>Body</w:t></w:r></w:p>"#, None);

    let output = watermarker
        .watermark("memo.docx", &input, &config(WatermarkPosition::Center))
        .unwrap();
    assert_eq!(output.file_name, "watermarked_memo.docx");
    assert_eq!((output.report.units, output.report.stamped), (1, 1));

    let parts = unzip(&output.bytes);
    let header = part(&parts, "word/header1.xml").unwrap();
    assert_eq!(header.matches("<v:shape ").count(), 1);
    assert_eq!(header.matches("<v:shapetype ").count(), 1);
    assert!(header.contains(r#"string="DO NOT COPY""#));
    assert!(header.contains("rotation:-45;"));
    assert!(header.contains("mso-position-horizontal:center"));

    let document = part(&parts, "word/document.xml").unwrap();
    assert!(document.contains("<w:sectPr "));
    assert!(document.contains(r#"w:type="default""#));
    assert!(document.contains("Body"));

    let rels = part(&parts, "word/_rels/document.xml.rels").unwrap();
    assert!(rels.contains(r#"Target="header1.xml""#));
    let content_types = part(&parts, "[Content_Types].xml").unwrap();
    assert!(content_types.contains(r#"PartName="/word/header1.xml""#));
}

#[test]
fn test_existing_header_keeps_its_content() {
    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());
    let input = fixtures::docx(
        SECTION_WITH_HEADER,
        Some(r#"<w:p><w:r><w:t>Letterhead</w:t></w:r></w:p>"#),
    );

    let output = watermarker
        .watermark("letter.docx", &input, &config(WatermarkPosition::TopLeft))
        .unwrap();
    assert_eq!(output.report.stamped, 1);

    let parts = unzip(&output.bytes);
    assert!(part(&parts, "word/header2.xml").is_none());

    let header = part(&parts, "word/header1.xml").unwrap();
    assert!(header.contains("Letterhead"));
    assert!(header.find("Letterhead").unwrap() < header.find("<v:shape ").unwrap());
    assert!(header.contains("mso-position-horizontal:left"));
    assert!(header.contains("mso-position-vertical:top"));

    let document = part(&parts, "word/document.xml").unwrap();
    assert_eq!(document.matches("headerReference").count(), 1);
}

#[test]
fn test_diagonal_places_a_grid_of_shapes() {
    let input = fixtures::docx(SECTION_WITH_HEADER, Some(""));
    let mut document = DocxDocument::from_bytes(&input).unwrap();
    assert_eq!(document.header_count(), 1);
    assert_eq!(document.header_part(0), Some("word/header1.xml"));

    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());
    let font = watermarker.fonts().resolve(40.0);
    let report = docmark::render::DocumentRenderer::new().render(
        &mut document,
        &config(WatermarkPosition::Diagonal),
        &font,
    );
    assert_eq!((report.units, report.stamped, report.failed), (18, 18, 0));

    let parts = unzip(&document.to_bytes().unwrap());
    let header = part(&parts, "word/header1.xml").unwrap();
    assert_eq!(header.matches("<v:shape ").count(), 18);
    // The shape type is declared once per header
    assert_eq!(header.matches("<v:shapetype ").count(), 1);
    assert_eq!(header.matches("mso-left-percent:").count(), 18);
}

#[test]
fn test_empty_text_still_produces_a_valid_document() {
    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());
    let config = WatermarkConfig::builder("").build().unwrap();
    let input = fixtures::docx("<w:p/>", None);

    let output = watermarker.watermark("blank.docx", &input, &config).unwrap();
    assert_eq!(output.report.stamped, 0);

    let parts = unzip(&output.bytes);
    assert!(part(&parts, "word/header1.xml").is_none());
    assert!(DocxDocument::from_bytes(&output.bytes).is_ok());
}

#[test]
fn test_garbage_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());
    let result = watermarker.watermark(
        "broken.docx",
        b"PK but not really",
        &config(WatermarkPosition::Center),
    );
    assert!(matches!(result, Err(docmark::WatermarkError::Decode { .. })));
}
