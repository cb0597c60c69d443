// Format dispatch and streaming entry points

use docmark::{RendererKind, WatermarkConfig, WatermarkError};
use rstest::rstest;

use super::fixtures;

fn config() -> WatermarkConfig {
    WatermarkConfig::builder("DRAFT").build().unwrap()
}

#[rstest]
#[case("scan.png", RendererKind::Raster)]
#[case("report.pdf", RendererKind::Pdf)]
#[case("budget.xlsx", RendererKind::Spreadsheet)]
#[case("memo.docx", RendererKind::Document)]
fn test_kind_follows_extension(#[case] name: &str, #[case] kind: RendererKind) {
    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());
    let input = match kind {
        RendererKind::Raster => fixtures::png(16, 16, [0, 0, 0, 255]),
        RendererKind::Pdf => fixtures::pdf(&[Some([0, 0, 200, 200])]),
        RendererKind::Spreadsheet => fixtures::xlsx(&["<sheetData/>"]),
        RendererKind::Document => fixtures::docx("<w:p/>", None),
    };

    let output = watermarker.watermark(name, &input, &config()).unwrap();
    assert_eq!(output.kind, kind);
    assert!(output.file_name.starts_with("watermarked_"));
    assert!(!output.bytes.is_empty());
}

#[rstest]
#[case("old.doc")]
#[case("old.xls")]
#[case("slides.pptx")]
#[case("README")]
fn test_unsupported_files_are_rejected(#[case] name: &str) {
    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());
    let err = watermarker
        .watermark(name, &fixtures::png(4, 4, [0, 0, 0, 255]), &config())
        .unwrap_err();
    assert!(matches!(err, WatermarkError::UnsupportedFormat { .. }));
}

// Test: content is decoded by extension, so a PNG named .pdf fails to decode
#[test]
fn test_mislabelled_content_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());
    let err = watermarker
        .watermark("image.pdf", &fixtures::png(4, 4, [0, 0, 0, 255]), &config())
        .unwrap_err();
    assert!(matches!(err, WatermarkError::Decode { .. }));
}

#[test]
fn test_stream_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());
    let input = fixtures::pdf(&[Some([0, 0, 612, 792])]);

    let mut output = Vec::new();
    let file = watermarker
        .watermark_stream("in.pdf", input.as_slice(), &mut output, &config())
        .unwrap();
    assert_eq!(file.bytes, output);
    assert_eq!(file.report.stamped, 1);
}

#[test]
fn test_watermarker_can_be_shared_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let watermarker = fixtures::synthetic_watermarker(dir.path());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let watermarker = watermarker.clone();
            std::thread::spawn(move || {
                let input = fixtures::pdf(&[Some([0, 0, 300 + i, 400])]);
                watermarker
                    .watermark("shared.pdf", &input, &config())
                    .map(|file| file.report.stamped)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 1);
    }
}
