//! DOCX document adapter.
//!
//! Exposes each distinct default page header as a [`HeaderHost`] slot and
//! writes background text shapes into it as VML WordArt. Sections without
//! a default header share one header created on first use.

use tracing::debug;

use super::ooxml::{
    escape, rel_type, relative_target, resolve_target, root_end, scan_tags, splice, OoxmlError,
    Package, TagKind, NS_RELATIONSHIPS,
};
use crate::error::{RenderError, WatermarkError};
use crate::render::document::{BackgroundTextShape, ShapePlacement};
use crate::render::HeaderHost;

const FORMAT: &str = "DOCX";

const NS_WORDPROCESSING: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_VML: &str = "urn:schemas-microsoft-com:vml";
const NS_OFFICE: &str = "urn:schemas-microsoft-com:office:office";
const CONTENT_TYPE_HEADER: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml";

const TEXT_SHAPE_TYPE_ID: &str = "_x0000_t136";
const BEHIND_TEXT_Z_INDEX: i64 = -251_657_216;

/// Standard WordArt "plain text" shape type.
const TEXT_SHAPE_TYPE: &str = concat!(
    r#"<v:shapetype id="_x0000_t136" coordsize="21600,21600" o:spt="136" adj="10800" "#,
    r#"path="m@7,l@8,m@5,21600l@6,21600e">"#,
    "<v:formulas>",
    r#"<v:f eqn="sum #0 0 10800"/><v:f eqn="prod #0 2 1"/><v:f eqn="sum 21600 0 @1"/>"#,
    r#"<v:f eqn="sum 0 0 @2"/><v:f eqn="sum 21600 0 @3"/><v:f eqn="if @0 @3 0"/>"#,
    r#"<v:f eqn="if @0 21600 @1"/><v:f eqn="if @0 0 @2"/><v:f eqn="if @0 @4 21600"/>"#,
    r#"<v:f eqn="mid @5 @6"/><v:f eqn="mid @8 @5"/><v:f eqn="mid @7 @8"/>"#,
    r#"<v:f eqn="mid @6 @7"/><v:f eqn="sum @6 0 @5"/>"#,
    "</v:formulas>",
    r#"<v:path textpathok="t" o:connecttype="custom" "#,
    r#"o:connectlocs="@9,0;@10,10800;@11,21600;@12,10800" o:connectangles="270,180,90,0"/>"#,
    r#"<v:textpath on="t" fitshape="t"/>"#,
    r#"<o:lock v:ext="edit" text="t" shapetype="t"/>"#,
    "</v:shapetype>"
);

#[derive(Debug, Clone, PartialEq, Eq)]
enum HeaderSlot {
    /// A default header referenced by at least one section.
    Existing(String),
    /// Shared header for sections without one, created lazily.
    Missing { created: Option<String> },
}

#[derive(Debug, Clone)]
pub struct DocxDocument {
    package: Package,
    document_part: String,
    slots: Vec<HeaderSlot>,
    next_shape: u32,
}

impl DocxDocument {
    pub fn from_bytes(data: &[u8]) -> Result<Self, WatermarkError> {
        let package =
            Package::from_bytes(data).map_err(|e| WatermarkError::decode(FORMAT, e.to_string()))?;
        let document_part = package
            .root_target(rel_type::OFFICE_DOCUMENT)
            .map_err(|e| WatermarkError::decode(FORMAT, e.to_string()))?;
        let slots = header_slots(&package, &document_part)
            .map_err(|e| WatermarkError::decode(FORMAT, e.to_string()))?;

        debug!(document = %document_part, headers = slots.len(), "Loaded DOCX document");
        Ok(Self {
            package,
            document_part,
            slots,
            next_shape: 1,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WatermarkError> {
        self.package
            .to_bytes()
            .map_err(|e| WatermarkError::encode(FORMAT, e.to_string()))
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Header part behind `header`, if it exists yet.
    pub fn header_part(&self, header: usize) -> Option<&str> {
        match self.slots.get(header)? {
            HeaderSlot::Existing(part) => Some(part),
            HeaderSlot::Missing { created } => created.as_deref(),
        }
    }

    fn add_shape(&mut self, header: usize, shape: &BackgroundTextShape) -> Result<(), OoxmlError> {
        let (part, created) = match &self.slots[header] {
            HeaderSlot::Existing(part) => (part.clone(), false),
            HeaderSlot::Missing {
                created: Some(part),
            } => (part.clone(), false),
            HeaderSlot::Missing { created: None } => (self.create_header()?, true),
        };

        self.append_shape(&part, shape)?;
        if created {
            self.slots[header] = HeaderSlot::Missing {
                created: Some(part),
            };
        }
        Ok(())
    }

    /// New empty header referenced by every section that lacks a default
    /// header.
    fn create_header(&mut self) -> Result<String, OoxmlError> {
        let document = self.document_part.clone();
        let header = self.package.unused_part_name("word/header", "xml");
        self.package.set_part(
            &header,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>{}<w:hdr xmlns:w="{}" xmlns:r="{}" xmlns:v="{}" xmlns:o="{}"></w:hdr>"#,
                "\n", NS_WORDPROCESSING, NS_RELATIONSHIPS, NS_VML, NS_OFFICE
            )
            .into_bytes(),
        );

        let mut content_types = self.package.content_types()?;
        content_types.ensure_override(&header, CONTENT_TYPE_HEADER);
        self.package.set_content_types(&content_types);

        let mut rels = self.package.relationships(&document)?;
        let id = rels.add(rel_type::HEADER, &relative_target(&document, &header));
        self.package.set_relationships(&document, &rels);

        let reference = format!(
            r#"<w:headerReference xmlns:w="{}" xmlns:r="{}" w:type="default" r:id="{}"/>"#,
            NS_WORDPROCESSING, NS_RELATIONSHIPS, id
        );
        let xml = self.package.part_str(&document)?.to_string();
        let updated = insert_header_references(&xml, &document, &reference)?;
        self.package.set_part(&document, updated.into_bytes());

        debug!(header = %header, relationship = %id, "Created default page header");
        Ok(header)
    }

    fn append_shape(&mut self, part: &str, shape: &BackgroundTextShape) -> Result<(), OoxmlError> {
        let xml = self.package.part_str(part)?.to_string();
        let tags = scan_tags(&xml, part)?;
        let has_shape_type = tags.iter().any(|tag| {
            tag.is_open()
                && tag.local_name == "shapetype"
                && tag.attribute("id") == Some(TEXT_SHAPE_TYPE_ID)
        });

        let paragraph = shape_paragraph(self.next_shape, shape, !has_shape_type);
        let offset = root_end(&tags, part)?.start;
        self.package
            .set_part(part, splice(&xml, offset, &paragraph).into_bytes());
        self.next_shape += 1;
        Ok(())
    }
}

/// Default header relationship id of every section, in document order.
fn section_headers(xml: &str, part: &str) -> Result<Vec<Option<String>>, OoxmlError> {
    let mut sections = Vec::new();
    let mut current: Option<Option<String>> = None;

    for tag in scan_tags(xml, part)? {
        match (tag.local_name.as_str(), tag.kind) {
            ("sectPr", TagKind::Start) => current = Some(None),
            ("sectPr", TagKind::Empty) => sections.push(None),
            ("sectPr", TagKind::End) => sections.extend(current.take()),
            ("headerReference", TagKind::Start | TagKind::Empty) => {
                if let Some(section) = current.as_mut() {
                    let is_default = tag.attribute_local("type").unwrap_or("default") == "default";
                    if is_default && section.is_none() {
                        *section = tag.attribute_local("id").map(str::to_string);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(sections)
}

fn header_slots(package: &Package, document: &str) -> Result<Vec<HeaderSlot>, OoxmlError> {
    let sections = section_headers(package.part_str(document)?, document)?;
    let rels = package.relationships(document)?;

    let mut slots: Vec<HeaderSlot> = Vec::new();
    for id in sections.iter().flatten() {
        let Some(rel) = rels.get(id) else {
            continue;
        };
        let part = resolve_target(document, &rel.target);
        if !package.contains(&part) {
            continue;
        }
        let slot = HeaderSlot::Existing(part);
        if !slots.contains(&slot) {
            slots.push(slot);
        }
    }

    if sections.is_empty() || sections.iter().any(Option::is_none) {
        slots.push(HeaderSlot::Missing { created: None });
    }
    Ok(slots)
}

/// Add `reference` to each section without a default header, creating a
/// body-level section when the document has none.
fn insert_header_references(xml: &str, part: &str, reference: &str) -> Result<String, OoxmlError> {
    let tags = scan_tags(xml, part)?;

    // (start, end, replacement) edits, applied back to front
    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    let mut open: Option<(usize, bool)> = None;
    let mut saw_section = false;

    for tag in &tags {
        match (tag.local_name.as_str(), tag.kind) {
            ("sectPr", TagKind::Start) => {
                saw_section = true;
                open = Some((tag.end, false));
            }
            ("sectPr", TagKind::Empty) => {
                saw_section = true;
                let source = &xml[tag.start..tag.end];
                let opening = source.trim_end_matches("/>").trim_end();
                edits.push((
                    tag.start,
                    tag.end,
                    format!("{}>{}</{}>", opening, reference, tag.name),
                ));
            }
            ("sectPr", TagKind::End) => {
                if let Some((after_start, false)) = open.take() {
                    edits.push((after_start, after_start, reference.to_string()));
                }
            }
            ("headerReference", TagKind::Start | TagKind::Empty) => {
                if let Some((_, has_default)) = open.as_mut() {
                    if tag.attribute_local("type").unwrap_or("default") == "default" {
                        *has_default = true;
                    }
                }
            }
            _ => {}
        }
    }

    if !saw_section {
        let body_end = tags
            .iter()
            .find(|tag| tag.kind == TagKind::End && tag.local_name == "body")
            .ok_or_else(|| OoxmlError::Xml {
                part: part.to_string(),
                message: "document has no body".to_string(),
            })?;
        edits.push((
            body_end.start,
            body_end.start,
            format!(
                r#"<w:sectPr xmlns:w="{}">{}</w:sectPr>"#,
                NS_WORDPROCESSING, reference
            ),
        ));
    }

    let mut out = xml.to_string();
    edits.sort_by_key(|(start, _, _)| *start);
    for (start, end, replacement) in edits.into_iter().rev() {
        out.replace_range(start..end, &replacement);
    }
    Ok(out)
}

/// CSS length without float noise, e.g. `32` or `25.6`.
fn css_number(value: f32) -> String {
    let formatted = format!("{:.2}", value);
    match formatted.trim_end_matches('0').trim_end_matches('.') {
        "" | "-" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn shape_style(shape: &BackgroundTextShape) -> String {
    let mut style = format!(
        "position:absolute;margin-left:0;margin-top:0;width:{}pt;height:{}pt;rotation:{};z-index:{}",
        css_number(shape.width_pt),
        css_number(shape.height_pt),
        shape.rotation_degrees,
        BEHIND_TEXT_Z_INDEX
    );
    match shape.placement {
        ShapePlacement::Aligned {
            horizontal,
            vertical,
        } => style.push_str(&format!(
            ";mso-position-horizontal:{};mso-position-horizontal-relative:margin;mso-position-vertical:{};mso-position-vertical-relative:margin",
            horizontal.as_str(),
            vertical.as_str()
        )),
        // Percent offsets are written in tenths of a percent
        ShapePlacement::PagePercent { left, top } => style.push_str(&format!(
            ";mso-left-percent:{};mso-top-percent:{};mso-position-horizontal-relative:page;mso-position-vertical-relative:page",
            left * 10,
            top * 10
        )),
    }
    style
}

/// A self-contained header paragraph carrying one text shape.
fn shape_paragraph(number: u32, shape: &BackgroundTextShape, with_shape_type: bool) -> String {
    format!(
        concat!(
            r#"<w:p xmlns:w="{w}" xmlns:v="{v}" xmlns:o="{o}"><w:r><w:pict>"#,
            "{shape_type}",
            r##"<v:shape id="DocmarkWatermark{number}" o:spid="_x0000_s{spid}" type="#{type_id}" "##,
            r#"style="{style}" o:allowincell="f" fillcolor="{color}" stroked="f">"#,
            r#"<v:fill opacity="{opacity}"/>"#,
            r#"<v:textpath style="font-family:&quot;{family}&quot;;font-size:{size}pt" string="{text}"/>"#,
            "</v:shape></w:pict></w:r></w:p>"
        ),
        w = NS_WORDPROCESSING,
        v = NS_VML,
        o = NS_OFFICE,
        shape_type = if with_shape_type { TEXT_SHAPE_TYPE } else { "" },
        number = number,
        spid = 2049 + number,
        type_id = TEXT_SHAPE_TYPE_ID,
        style = shape_style(shape),
        color = shape.color.to_hex(),
        opacity = css_number(shape.opacity),
        family = escape(&shape.font_family),
        size = css_number(shape.font_size_pt),
        text = escape(&shape.text),
    )
}

impl HeaderHost for DocxDocument {
    fn header_count(&self) -> usize {
        self.slots.len()
    }

    fn add_background_text(
        &mut self,
        header: usize,
        shape: &BackgroundTextShape,
    ) -> Result<(), RenderError> {
        if header >= self.slots.len() {
            return Err(RenderError::NoSuchUnit { index: header });
        }
        let snapshot = self.package.clone();
        self.add_shape(header, shape).map_err(|e| {
            self.package = snapshot;
            RenderError::from(e)
        })
    }
}
