// XLSX picture embedding and sheet geometry

use docmark::codec::xlsx::XlsxWorkbook;
use docmark::render::{CellRange, SheetHost};
use docmark::watermark::FontSource;
use docmark::{WatermarkConfig, WatermarkPosition};

use super::fixtures::{self, part, unzip};

const RANGE: CellRange = CellRange {
    first_col: 0,
    first_row: 0,
    last_col: 3,
    last_row: 9,
};

fn picture() -> Vec<u8> {
    fixtures::png(8, 6, [200, 0, 0, 80])
}

#[test]
fn test_embed_creates_drawing_media_and_relationships() {
    let input = fixtures::xlsx(&[r#"<sheetData><row r="1"><c r="A1"/></row></sheetData>"#]);
    let mut workbook = XlsxWorkbook::from_bytes(&input).unwrap();
    assert_eq!(workbook.sheet_count(), 1);
    assert_eq!(workbook.sheet_part(0), Some("xl/worksheets/sheet1.xml"));

    workbook.embed_picture(0, &picture(), (800, 600), RANGE).unwrap();
    let parts = unzip(&workbook.to_bytes().unwrap());

    let sheet = part(&parts, "xl/worksheets/sheet1.xml").unwrap();
    assert!(sheet.contains(r#"<drawing xmlns:r=""#));
    assert!(sheet.find("<drawing").unwrap() > sheet.find("</sheetData>").unwrap());

    let sheet_rels = part(&parts, "xl/worksheets/_rels/sheet1.xml.rels").unwrap();
    assert!(sheet_rels.contains(r#"Target="../drawings/drawing1.xml""#));

    let drawing = part(&parts, "xl/drawings/drawing1.xml").unwrap();
    assert!(drawing.contains("<xdr:twoCellAnchor"));
    assert!(drawing.contains("<xdr:col>3</xdr:col>"));
    assert!(drawing.contains("<xdr:row>9</xdr:row>"));
    assert!(drawing.contains(r#"cx="7620000""#));
    assert!(drawing.contains(r#"cy="5715000""#));

    let drawing_rels = part(&parts, "xl/drawings/_rels/drawing1.xml.rels").unwrap();
    assert!(drawing_rels.contains(r#"Target="../media/image1.png""#));

    let (_, media) = parts
        .iter()
        .find(|(name, _)| name == "xl/media/image1.png")
        .unwrap();
    assert_eq!(media, &picture());

    let content_types = part(&parts, "[Content_Types].xml").unwrap();
    assert!(content_types.contains(r#"Extension="png""#));
    assert!(content_types.contains(r#"PartName="/xl/drawings/drawing1.xml""#));
}

#[test]
fn test_second_picture_reuses_drawing() {
    let input = fixtures::xlsx(&["<sheetData/>"]);
    let mut workbook = XlsxWorkbook::from_bytes(&input).unwrap();
    workbook.embed_picture(0, &picture(), (8, 6), RANGE).unwrap();
    workbook.embed_picture(0, &picture(), (8, 6), RANGE).unwrap();

    let parts = unzip(&workbook.to_bytes().unwrap());
    assert!(part(&parts, "xl/drawings/drawing2.xml").is_none());
    assert!(part(&parts, "xl/media/image2.png").is_some());

    let drawing = part(&parts, "xl/drawings/drawing1.xml").unwrap();
    assert_eq!(drawing.matches("<xdr:twoCellAnchor").count(), 2);
    assert!(drawing.contains(r#"<xdr:cNvPr id="2""#));
    assert!(drawing.contains(r#"<xdr:cNvPr id="3""#));

    let sheet = part(&parts, "xl/worksheets/sheet1.xml").unwrap();
    assert_eq!(sheet.matches("<drawing ").count(), 1);
}

// Test: <drawing> must come before <legacyDrawing> in the worksheet
#[test]
fn test_drawing_is_inserted_before_legacy_drawing() {
    let input = fixtures::xlsx(&[r#"<sheetData/><legacyDrawing r:id="rId7"/>"#]);
    let mut workbook = XlsxWorkbook::from_bytes(&input).unwrap();
    workbook.embed_picture(0, &picture(), (8, 6), RANGE).unwrap();

    let parts = unzip(&workbook.to_bytes().unwrap());
    let sheet = part(&parts, "xl/worksheets/sheet1.xml").unwrap();
    let drawing = sheet.find("<drawing ").unwrap();
    assert!(drawing < sheet.find("<legacyDrawing").unwrap());
    assert!(drawing > sheet.find("<sheetData/>").unwrap());
}

#[test]
fn test_bad_sheet_index_leaves_package_untouched() {
    let input = fixtures::xlsx(&["<sheetData/>"]);
    let mut workbook = XlsxWorkbook::from_bytes(&input).unwrap();
    let before = workbook.package().part_names().count();

    assert!(workbook.embed_picture(3, &picture(), (8, 6), RANGE).is_err());
    assert_eq!(workbook.package().part_names().count(), before);
}

#[test]
fn test_layout_reflects_used_range() {
    let input = fixtures::xlsx(&[
        r#"<cols><col min="1" max="2" width="20"/></cols><sheetData><row r="1"><c r="A1"/></row><row r="4" ht="30" customHeight="1"><c r="C4"/></row></sheetData>"#,
        "<sheetData/>",
    ]);
    let workbook = XlsxWorkbook::from_bytes(&input).unwrap();
    assert_eq!(workbook.sheet_count(), 2);

    let layout = workbook.sheet_layout(0).unwrap();
    assert_eq!(layout.used_columns(), 3);
    assert_eq!(layout.last_row(), 3);
    assert_eq!(layout.column_widths, vec![140.0, 140.0, 64.0]);
    assert_eq!(layout.row_heights[3], 40.0);

    let empty = workbook.sheet_layout(1).unwrap();
    assert_eq!(empty.canvas_size(), (800, 600));
}

#[test]
fn test_end_to_end_xlsx() {
    let watermarker = fixtures::system_watermarker();
    let config = WatermarkConfig::builder("INTERNAL")
        .position(WatermarkPosition::TopRight)
        .build()
        .unwrap();
    let input = fixtures::xlsx(&["<sheetData/>", "<sheetData/>"]);
    let output = watermarker.watermark("budget.xlsx", &input, &config).unwrap();

    assert_eq!(output.file_name, "watermarked_budget.xlsx");
    assert_eq!(output.report.units, 2);
    assert_eq!(output.report.failed, 0);

    let parts = unzip(&output.bytes);
    let workbook = XlsxWorkbook::from_bytes(&output.bytes).unwrap();
    assert_eq!(workbook.sheet_count(), 2);

    if watermarker.fonts().source() != FontSource::Synthetic {
        assert_eq!(output.report.stamped, 2);
        assert!(part(&parts, "xl/drawings/drawing1.xml").is_some());
        assert!(part(&parts, "xl/drawings/drawing2.xml").is_some());
    } else {
        assert_eq!(output.report.stamped, 0);
    }
}
