//! XLSX workbook adapter.
//!
//! Reads sheet geometry from worksheet XML and embeds pictures through a
//! DrawingML drawing part, creating one when the sheet has none.

use std::collections::HashMap;

use tracing::debug;

use super::ooxml::{
    escape, rel_type, relative_target, resolve_target, root_end, scan_tags, splice, OoxmlError,
    Package, Tag, TagKind, NS_RELATIONSHIPS,
};
use crate::error::{RenderError, WatermarkError};
use crate::render::{CellRange, SheetHost, SheetLayout};

const FORMAT: &str = "XLSX";

const NS_SPREADSHEET_DRAWING: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const NS_DRAWING_MAIN: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const CONTENT_TYPE_DRAWING: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";

/// Pixels per character of column width.
const PX_PER_WIDTH_CHAR: f32 = 7.0;
const DEFAULT_COLUMN_WIDTH_PX: f32 = 64.0;
const DEFAULT_ROW_HEIGHT_PT: f32 = 15.0;
const EMU_PER_PX: u64 = 9525;

/// Worksheet children that must follow `<drawing>`.
const AFTER_DRAWING: [&str; 9] = [
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

fn points_to_px(points: f32) -> f32 {
    points * 96.0 / 72.0
}

#[derive(Debug, Clone)]
pub struct XlsxWorkbook {
    package: Package,
    /// Worksheet part names in workbook order.
    sheets: Vec<String>,
}

impl XlsxWorkbook {
    pub fn from_bytes(data: &[u8]) -> Result<Self, WatermarkError> {
        let package =
            Package::from_bytes(data).map_err(|e| WatermarkError::decode(FORMAT, e.to_string()))?;
        let sheets =
            worksheet_parts(&package).map_err(|e| WatermarkError::decode(FORMAT, e.to_string()))?;

        debug!(sheets = sheets.len(), "Loaded XLSX workbook");
        Ok(Self { package, sheets })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WatermarkError> {
        self.package
            .to_bytes()
            .map_err(|e| WatermarkError::encode(FORMAT, e.to_string()))
    }

    pub fn sheet_part(&self, index: usize) -> Option<&str> {
        self.sheets.get(index).map(String::as_str)
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    fn sheet(&self, index: usize) -> Result<&str, RenderError> {
        self.sheet_part(index)
            .ok_or(RenderError::NoSuchUnit { index })
    }

    /// Drawing part already attached to the sheet, if any.
    fn existing_drawing(&self, sheet: &str, tags: &[Tag]) -> Result<Option<String>, OoxmlError> {
        let Some(id) = tags
            .iter()
            .find(|tag| tag.is_open() && tag.depth == 1 && tag.local_name == "drawing")
            .and_then(|tag| tag.attribute_local("id"))
        else {
            return Ok(None);
        };

        let rels = self.package.relationships(sheet)?;
        Ok(rels
            .get(id)
            .map(|rel| resolve_target(sheet, &rel.target))
            .filter(|part| self.package.contains(part)))
    }

    /// Create an empty drawing part and reference it from the sheet.
    fn attach_drawing(&mut self, sheet: &str, xml: &str, tags: &[Tag]) -> Result<String, OoxmlError> {
        let drawing = self.package.unused_part_name("xl/drawings/drawing", "xml");
        self.package.set_part(
            &drawing,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>{}<xdr:wsDr xmlns:xdr="{}" xmlns:a="{}"></xdr:wsDr>"#,
                "\n", NS_SPREADSHEET_DRAWING, NS_DRAWING_MAIN
            )
            .into_bytes(),
        );

        let mut content_types = self.package.content_types()?;
        content_types.ensure_override(&drawing, CONTENT_TYPE_DRAWING);
        self.package.set_content_types(&content_types);

        let mut rels = self.package.relationships(sheet)?;
        let id = rels.add(rel_type::DRAWING, &relative_target(sheet, &drawing));
        self.package.set_relationships(sheet, &rels);

        let root = root_end(tags, sheet)?;
        let offset = tags
            .iter()
            .find(|tag| {
                tag.is_open() && tag.depth == 1 && AFTER_DRAWING.contains(&tag.local_name.as_str())
            })
            .map(|tag| tag.start)
            .unwrap_or(root.start);
        let element = format!(
            r#"<{}drawing xmlns:r="{}" r:id="{}"/>"#,
            root.prefix(),
            NS_RELATIONSHIPS,
            id
        );
        self.package
            .set_part(sheet, splice(xml, offset, &element).into_bytes());

        debug!(sheet, drawing = %drawing, "Attached new drawing part");
        Ok(drawing)
    }

    fn embed(
        &mut self,
        sheet: &str,
        png: &[u8],
        size: (u32, u32),
        range: CellRange,
    ) -> Result<(), OoxmlError> {
        let sheet_xml = self.package.part_str(sheet)?.to_string();
        let sheet_tags = scan_tags(&sheet_xml, sheet)?;

        let drawing = match self.existing_drawing(sheet, &sheet_tags)? {
            Some(drawing) => drawing,
            None => self.attach_drawing(sheet, &sheet_xml, &sheet_tags)?,
        };

        let media = self.package.unused_part_name("xl/media/image", "png");
        self.package.set_part(&media, png.to_vec());
        let mut content_types = self.package.content_types()?;
        content_types.ensure_default("png", "image/png");
        self.package.set_content_types(&content_types);

        let mut rels = self.package.relationships(&drawing)?;
        let image_id = rels.add(rel_type::IMAGE, &relative_target(&drawing, &media));
        self.package.set_relationships(&drawing, &rels);

        let drawing_xml = self.package.part_str(&drawing)?.to_string();
        let drawing_tags = scan_tags(&drawing_xml, &drawing)?;
        let shape_id = drawing_tags
            .iter()
            .filter(|tag| tag.is_open() && tag.local_name == "cNvPr")
            .filter_map(|tag| tag.attribute("id")?.parse::<u32>().ok())
            .max()
            .unwrap_or(1)
            + 1;

        let anchor = picture_anchor(shape_id, &image_id, size, range);
        let offset = root_end(&drawing_tags, &drawing)?.start;
        self.package
            .set_part(&drawing, splice(&drawing_xml, offset, &anchor).into_bytes());

        debug!(sheet, drawing = %drawing, media = %media, shape_id, "Embedded watermark picture");
        Ok(())
    }
}

/// Worksheet parts listed in `xl/workbook.xml`, skipping chartsheets.
fn worksheet_parts(package: &Package) -> Result<Vec<String>, OoxmlError> {
    let workbook = package.root_target(rel_type::OFFICE_DOCUMENT)?;
    let rels = package.relationships(&workbook)?;
    let tags = scan_tags(package.part_str(&workbook)?, &workbook)?;

    Ok(tags
        .iter()
        .filter(|tag| tag.is_open() && tag.local_name == "sheet")
        .filter_map(|tag| rels.get(tag.attribute_local("id")?))
        .filter(|rel| rel.rel_type == rel_type::WORKSHEET)
        .map(|rel| resolve_target(&workbook, &rel.target))
        .collect())
}

/// `"AB12"` -> `(28, 12)`, both 1-based.
fn parse_cell_reference(reference: &str) -> Option<(u32, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }

    let mut column = 0u32;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        column = column
            .checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }
    Some((column, digits.parse().ok()?))
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}

/// Column widths and row heights of the used range.
pub fn sheet_layout_from_xml(xml: &str, part: &str) -> Result<SheetLayout, OoxmlError> {
    let tags = scan_tags(xml, part)?;

    let mut default_column_px = DEFAULT_COLUMN_WIDTH_PX;
    let mut default_row_px = points_to_px(DEFAULT_ROW_HEIGHT_PT);
    let mut column_widths: HashMap<u32, f32> = HashMap::new();
    let mut row_heights: HashMap<u32, f32> = HashMap::new();

    let mut max_column = 0u32;
    let mut max_row = 0u32;
    let mut current_row = 0u32;
    let mut current_column = 0u32;

    for tag in tags.iter().filter(|tag| tag.kind != TagKind::End) {
        match tag.local_name.as_str() {
            "sheetFormatPr" => {
                let number = |name: &str| tag.attribute(name).and_then(|v| v.parse::<f32>().ok());
                if let Some(width) = number("defaultColWidth") {
                    default_column_px = width * PX_PER_WIDTH_CHAR;
                }
                if let Some(height) = number("defaultRowHeight") {
                    default_row_px = points_to_px(height);
                }
            }
            "col" => {
                let min = tag.attribute("min").and_then(|v| v.parse::<u32>().ok());
                let max = tag.attribute("max").and_then(|v| v.parse::<u32>().ok());
                let (Some(min), Some(max)) = (min, max) else {
                    continue;
                };
                let width = if is_true(tag.attribute("hidden")) {
                    0.0
                } else {
                    match tag.attribute("width").and_then(|v| v.parse::<f32>().ok()) {
                        Some(width) => width * PX_PER_WIDTH_CHAR,
                        None => continue,
                    }
                };
                // Ranges like 1..16384 are common; only the used part matters
                for column in min..=max.min(min.saturating_add(16_384)) {
                    column_widths.insert(column, width);
                }
            }
            "row" => {
                current_row = tag
                    .attribute("r")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(current_row + 1);
                current_column = 0;
                if is_true(tag.attribute("hidden")) {
                    row_heights.insert(current_row, 0.0);
                } else if let Some(height) = tag.attribute("ht").and_then(|v| v.parse::<f32>().ok()) {
                    row_heights.insert(current_row, points_to_px(height));
                }
            }
            "c" => {
                let (column, row) = tag
                    .attribute("r")
                    .and_then(parse_cell_reference)
                    .unwrap_or((current_column + 1, current_row.max(1)));
                current_column = column;
                max_column = max_column.max(column);
                max_row = max_row.max(row);
            }
            _ => {}
        }
    }

    Ok(SheetLayout {
        column_widths: (1..=max_column)
            .map(|c| column_widths.get(&c).copied().unwrap_or(default_column_px))
            .collect(),
        row_heights: (1..=max_row)
            .map(|r| row_heights.get(&r).copied().unwrap_or(default_row_px))
            .collect(),
    })
}

fn picture_anchor(shape_id: u32, image_id: &str, size: (u32, u32), range: CellRange) -> String {
    let (width, height) = size;
    format!(
        concat!(
            r#"<xdr:twoCellAnchor xmlns:xdr="{xdr}" xmlns:a="{a}" xmlns:r="{r}" editAs="oneCell">"#,
            "<xdr:from><xdr:col>{c0}</xdr:col><xdr:colOff>0</xdr:colOff>",
            "<xdr:row>{r0}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>",
            "<xdr:to><xdr:col>{c1}</xdr:col><xdr:colOff>0</xdr:colOff>",
            "<xdr:row>{r1}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to>",
            "<xdr:pic><xdr:nvPicPr>",
            r#"<xdr:cNvPr id="{id}" name="{name}" descr="{name}"/>"#,
            r#"<xdr:cNvPicPr><a:picLocks noChangeAspect="1"/></xdr:cNvPicPr>"#,
            "</xdr:nvPicPr>",
            r#"<xdr:blipFill><a:blip r:embed="{embed}"/><a:stretch><a:fillRect/></a:stretch></xdr:blipFill>"#,
            r#"<xdr:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></xdr:spPr>"#,
            "</xdr:pic><xdr:clientData/></xdr:twoCellAnchor>"
        ),
        xdr = NS_SPREADSHEET_DRAWING,
        a = NS_DRAWING_MAIN,
        r = NS_RELATIONSHIPS,
        c0 = range.first_col,
        r0 = range.first_row,
        c1 = range.last_col,
        r1 = range.last_row,
        id = shape_id,
        name = escape(&format!("Watermark {}", shape_id)),
        embed = image_id,
        cx = u64::from(width) * EMU_PER_PX,
        cy = u64::from(height) * EMU_PER_PX,
    )
}

impl SheetHost for XlsxWorkbook {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet_layout(&self, index: usize) -> Result<SheetLayout, RenderError> {
        let sheet = self.sheet(index)?;
        let xml = self.package.part_str(sheet)?;
        Ok(sheet_layout_from_xml(xml, sheet)?)
    }

    fn embed_picture(
        &mut self,
        index: usize,
        png: &[u8],
        size: (u32, u32),
        range: CellRange,
    ) -> Result<(), RenderError> {
        let sheet = self.sheet(index)?.to_string();
        // Work on a copy so a failure leaves the package untouched
        let snapshot = self.package.clone();
        self.embed(&sheet, png, size, range).map_err(|e| {
            self.package = snapshot;
            RenderError::from(e)
        })
    }
}
