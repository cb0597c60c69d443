// PDF watermarking through the public API

use docmark::codec::pdf::LopdfDocument;
use docmark::render::{PageHost, PdfRenderer};
use docmark::watermark::ResolvedFont;
use docmark::{WatermarkConfig, WatermarkPosition};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

use super::fixtures;

const LETTER: Option<[i64; 4]> = Some([0, 0, 612, 792]);

fn config(position: WatermarkPosition) -> WatermarkConfig {
    WatermarkConfig::builder("CONFIDENTIAL")
        .position(position)
        .build()
        .unwrap()
}

fn page_ids(document: &Document) -> Vec<ObjectId> {
    document.get_pages().into_values().collect()
}

fn contents(document: &Document, page: ObjectId) -> Object {
    document
        .get_dictionary(page)
        .unwrap()
        .get(b"Contents")
        .unwrap()
        .clone()
}

fn number(object: &Object) -> f64 {
    match object {
        Object::Integer(value) => *value as f64,
        Object::Real(value) => f64::from(*value),
        other => panic!("expected a number, got {:?}", other),
    }
}

/// Operators of the last content stream of a stamped page.
fn stamp_operators(document: &Document, page: ObjectId) -> Vec<String> {
    let Object::Array(streams) = contents(document, page) else {
        panic!("stamped page should have a contents array");
    };
    let last = streams.last().unwrap().as_reference().unwrap();
    let stream = document.get_object(last).unwrap().as_stream().unwrap();
    Content::decode(&stream.content)
        .unwrap()
        .operations
        .into_iter()
        .map(|op| op.operator)
        .collect()
}

// Test: 3 pages where page 2 cannot be sized -> pages 1 and 3 stamped,
// page 2 left exactly as it was
#[test]
fn test_failing_middle_page_is_left_untouched() {
    let input = fixtures::pdf(&[LETTER, None, LETTER]);
    let original = Document::load_mem(&input).unwrap();
    let original_page2 = contents(&original, page_ids(&original)[1])
        .as_reference()
        .unwrap();

    let mut document = LopdfDocument::from_bytes(&input).unwrap();
    let report = PdfRenderer::default().render(
        &mut document,
        &config(WatermarkPosition::Center),
        &ResolvedFont::synthetic(40.0),
    );
    assert_eq!((report.units, report.stamped, report.failed), (3, 2, 1));

    let output = Document::load_mem(&document.to_bytes().unwrap()).unwrap();
    let pages = page_ids(&output);
    assert_eq!(pages.len(), 3);

    assert_eq!(contents(&output, pages[1]).as_reference().unwrap(), original_page2);
    for page in [pages[0], pages[2]] {
        let Object::Array(streams) = contents(&output, page) else {
            panic!("page should be stamped");
        };
        // q-wrapper, original stream, stamp
        assert_eq!(streams.len(), 3);
        let operators = stamp_operators(&output, page);
        assert_eq!(operators.iter().filter(|op| *op == "Tj").count(), 1);
        assert!(operators.contains(&"gs".to_string()));
        assert_eq!(operators.first().map(String::as_str), Some("Q"));
    }
}

#[test]
fn test_opacity_is_applied_through_ext_gstate() {
    let input = fixtures::pdf(&[LETTER]);
    let mut document = LopdfDocument::from_bytes(&input).unwrap();
    let config = WatermarkConfig::builder("DRAFT")
        .opacity(0.5)
        .position(WatermarkPosition::TopLeft)
        .build()
        .unwrap();
    PdfRenderer::default().render(&mut document, &config, &ResolvedFont::synthetic(24.0));

    let output = Document::load_mem(&document.to_bytes().unwrap()).unwrap();
    let page = page_ids(&output)[0];
    let resources = output
        .get_dictionary(page)
        .unwrap()
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap();
    let states = resources.get(b"ExtGState").unwrap().as_dict().unwrap();
    let state_id = states.get(b"DocmarkGS500").unwrap().as_reference().unwrap();
    let state = output.get_dictionary(state_id).unwrap();
    assert_eq!(number(state.get(b"ca").unwrap()), 0.5);
    assert_eq!(number(state.get(b"CA").unwrap()), 0.5);

    let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
    assert!(fonts.has(b"DocmarkF0"));
}

#[test]
fn test_diagonal_tiles_the_page() {
    let input = fixtures::pdf(&[LETTER]);
    let mut document = LopdfDocument::from_bytes(&input).unwrap();
    PdfRenderer::default().render(
        &mut document,
        &config(WatermarkPosition::Diagonal),
        &ResolvedFont::synthetic(20.0),
    );

    let output = Document::load_mem(&document.to_bytes().unwrap()).unwrap();
    let operators = stamp_operators(&output, page_ids(&output)[0]);
    let draws = operators.iter().filter(|op| *op == "Tj").count();
    assert!(draws > 4, "expected a tiled grid, got {} draws", draws);
    assert_eq!(draws, operators.iter().filter(|op| *op == "Tm").count());
}

#[test]
fn test_page_sizes_are_read_per_page() {
    let input = fixtures::pdf(&[LETTER, Some([0, 0, 300, 200])]);
    let document = LopdfDocument::from_bytes(&input).unwrap();
    assert_eq!(document.page_count(), 2);
    let small = document.page_size(1).unwrap();
    assert_eq!((small.width, small.height), (300.0, 200.0));
    assert!(document.page_size(1).is_ok());
    assert!(document.page_size(5).is_err());
}

// Test: a portrait MediaBox shown landscape through an inherited /Rotate 90
#[test]
fn test_rotated_page_is_planned_as_displayed() {
    let input = fixtures::rotated_pdf([0, 0, 612, 792], 90);
    let mut document = LopdfDocument::from_bytes(&input).unwrap();
    let size = document.page_size(0).unwrap();
    assert_eq!(size.rotation, 90);
    assert_eq!(size.display_size(), (792.0, 612.0));

    let config = WatermarkConfig::builder("LANDSCAPE")
        .position(WatermarkPosition::Center)
        .rotation_degrees(0.0)
        .build()
        .unwrap();
    let report =
        PdfRenderer::default().render(&mut document, &config, &ResolvedFont::synthetic(30.0));
    assert_eq!(report.stamped, 1);

    let output = Document::load_mem(&document.to_bytes().unwrap()).unwrap();
    let Object::Array(streams) = contents(&output, page_ids(&output)[0]) else {
        panic!("page should be stamped");
    };
    let last = streams.last().unwrap().as_reference().unwrap();
    let stream = output.get_object(last).unwrap().as_stream().unwrap();
    let content = Content::decode(&stream.content).unwrap();
    let tm = content
        .operations
        .iter()
        .find(|op| op.operator == "Tm")
        .unwrap();
    let m: Vec<f64> = tm.operands.iter().map(number).collect();
    // Baseline runs up the MediaBox so it reads horizontally once displayed
    assert_eq!(&m[..4], &[0.0, 1.0, -1.0, 0.0]);
    assert!((0.0..=612.0).contains(&m[4]), "{:?}", m);
    assert!((0.0..=792.0).contains(&m[5]), "{:?}", m);
}

#[test]
fn test_end_to_end_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());
    let output = watermarker
        .watermark(
            "Quarterly Report.PDF",
            &fixtures::pdf(&[LETTER, LETTER]),
            &config(WatermarkPosition::BottomRight),
        )
        .unwrap();

    assert_eq!(output.file_name, "watermarked_Quarterly Report.PDF");
    assert_eq!(output.report.stamped, 2);
    assert!(output.bytes.starts_with(b"%PDF-"));
    assert_eq!(Document::load_mem(&output.bytes).unwrap().get_pages().len(), 2);
}

#[test]
fn test_empty_text_keeps_pages_and_still_encodes() {
    let input = fixtures::pdf(&[LETTER]);
    let mut document = LopdfDocument::from_bytes(&input).unwrap();
    let config = WatermarkConfig::builder("").build().unwrap();
    let report =
        PdfRenderer::default().render(&mut document, &config, &ResolvedFont::synthetic(40.0));
    assert_eq!(report.stamped, 0);

    let output = Document::load_mem(&document.to_bytes().unwrap()).unwrap();
    let page = page_ids(&output)[0];
    assert!(matches!(contents(&output, page), Object::Reference(_)));
}
