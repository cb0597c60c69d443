//! Minimal Office Open XML package model.
//!
//! A package is kept as an ordered list of zip entries so untouched parts
//! round-trip byte for byte. XML parts are edited by splicing fragments at
//! byte offsets found with a streaming scan, which preserves everything we
//! do not understand.

use std::borrow::Cow;
use std::io::{Cursor, Read, Write};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::RenderError;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

pub const NS_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Relationship type URIs.
pub mod rel_type {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const WORKSHEET: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
    pub const DRAWING: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    pub const HEADER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
}

#[derive(Debug, thiserror::Error)]
pub enum OoxmlError {
    #[error("Invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("Missing package part: {0}")]
    MissingPart(String),

    #[error("Part {0} is not valid UTF-8")]
    Encoding(String),
}

impl From<OoxmlError> for RenderError {
    fn from(err: OoxmlError) -> Self {
        RenderError::Package(err.to_string())
    }
}

/// Zip entries in their original order.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    pub fn from_bytes(data: &[u8]) -> Result<Self, OoxmlError> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)?;
            parts.push((name, content));
        }

        if !parts.iter().any(|(name, _)| name == CONTENT_TYPES_PART) {
            return Err(OoxmlError::MissingPart(CONTENT_TYPES_PART.to_string()));
        }
        Ok(Self { parts })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, OoxmlError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, content) in &self.parts {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(content)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(name, _)| name.as_str())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.parts
            .iter()
            .position(|(part, _)| part == name)
            .or_else(|| {
                self.parts
                    .iter()
                    .position(|(part, _)| part.eq_ignore_ascii_case(name))
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.position(name).map(|i| self.parts[i].1.as_slice())
    }

    pub fn part_str(&self, name: &str) -> Result<&str, OoxmlError> {
        let bytes = self
            .part(name)
            .ok_or_else(|| OoxmlError::MissingPart(name.to_string()))?;
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        std::str::from_utf8(bytes).map_err(|_| OoxmlError::Encoding(name.to_string()))
    }

    /// Replace a part, or append it when new.
    pub fn set_part(&mut self, name: &str, content: Vec<u8>) {
        match self.position(name) {
            Some(i) => self.parts[i].1 = content,
            None => self.parts.push((name.to_string(), content)),
        }
    }

    /// First free `{prefix}{n}.{extension}` with `n >= 1`.
    pub fn unused_part_name(&self, prefix: &str, extension: &str) -> String {
        (1..)
            .map(|n| format!("{}{}.{}", prefix, n, extension))
            .find(|name| !self.contains(name))
            .unwrap_or_else(|| format!("{}0.{}", prefix, extension))
    }

    /// Relationships of `source` (empty when the part has none).
    pub fn relationships(&self, source: &str) -> Result<Relationships, OoxmlError> {
        let rels_part = rels_part_name(source);
        if !self.contains(&rels_part) {
            return Ok(Relationships::default());
        }
        Relationships::parse(self.part_str(&rels_part)?, &rels_part)
    }

    pub fn set_relationships(&mut self, source: &str, relationships: &Relationships) {
        self.set_part(&rels_part_name(source), relationships.to_xml().into_bytes());
    }

    pub fn content_types(&self) -> Result<ContentTypes, OoxmlError> {
        ContentTypes::parse(self.part_str(CONTENT_TYPES_PART)?)
    }

    pub fn set_content_types(&mut self, content_types: &ContentTypes) {
        self.set_part(CONTENT_TYPES_PART, content_types.to_xml().into_bytes());
    }

    /// Part targeted by the first package-level relationship of `rel_type`.
    pub fn root_target(&self, rel_type: &str) -> Result<String, OoxmlError> {
        let rels = self.relationships("")?;
        rels.first_of_type(rel_type)
            .map(|rel| resolve_target("", &rel.target))
            .ok_or_else(|| OoxmlError::MissingPart(format!("relationship {}", rel_type)))
    }
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_part_name(source: &str) -> String {
    match source.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", source),
    }
}

fn directory_of(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve a relationship target against its source part.
pub fn resolve_target(source: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if directory_of(source).is_empty() => target.to_string(),
        None => format!("{}/{}", directory_of(source), target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relative target from `source` to `part`, as written in a `.rels` file.
pub fn relative_target(source: &str, part: &str) -> String {
    let from: Vec<&str> = directory_of(source)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let to: Vec<&str> = part.split('/').filter(|s| !s.is_empty()).collect();

    let common = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = vec![".."; from.len() - common];
    segments.extend(&to[common..]);
    segments.join("/")
}

pub fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

/// Insert `fragment` at byte `offset`.
pub fn splice(xml: &str, offset: usize, fragment: &str) -> String {
    let mut out = String::with_capacity(xml.len() + fragment.len());
    out.push_str(&xml[..offset]);
    out.push_str(fragment);
    out.push_str(&xml[offset..]);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Start,
    Empty,
    End,
}

/// One tag found by [`scan_tags`], with its byte span in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub kind: TagKind,
    /// Qualified name, e.g. `w:sectPr`.
    pub name: String,
    pub local_name: String,
    pub attributes: Vec<(String, String)>,
    /// Byte offset of `<`.
    pub start: usize,
    /// Byte offset just past `>`.
    pub end: usize,
    /// Root element is depth 0.
    pub depth: usize,
}

impl Tag {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute by local name, ignoring the prefix.
    pub fn attribute_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.rsplit(':').next() == Some(local))
            .map(|(_, value)| value.as_str())
    }

    /// Namespace prefix including the colon, or empty.
    pub fn prefix(&self) -> &str {
        match self.name.rfind(':') {
            Some(i) => &self.name[..=i],
            None => "",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.kind, TagKind::Start | TagKind::Empty)
    }
}

/// Every element tag in document order.
pub fn scan_tags(xml: &str, part: &str) -> Result<Vec<Tag>, OoxmlError> {
    let xml_error = |message: String| OoxmlError::Xml {
        part: part.to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut tags = Vec::new();
    let mut depth = 0usize;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(format!("at byte {}: {}", reader.buffer_position(), e)))?;
        let end = reader.buffer_position() as usize;

        match event {
            Event::Start(ref e) => {
                tags.push(open_tag(&reader, e, TagKind::Start, start, end, depth)?);
                depth += 1;
            }
            Event::Empty(ref e) => {
                tags.push(open_tag(&reader, e, TagKind::Empty, start, end, depth)?);
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                tags.push(Tag {
                    kind: TagKind::End,
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    local_name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    attributes: Vec::new(),
                    start,
                    end,
                    depth,
                });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(tags)
}

fn open_tag(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
    kind: TagKind,
    start: usize,
    end: usize,
    depth: usize,
) -> Result<Tag, OoxmlError> {
    let mut attributes = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(reader)
            .map(|v| v.into_owned())
            .unwrap_or_default();
        attributes.push((key, value));
    }

    Ok(Tag {
        kind,
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        local_name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        attributes,
        start,
        end,
        depth,
    })
}

/// The closing tag of the root element.
pub fn root_end<'a>(tags: &'a [Tag], part: &str) -> Result<&'a Tag, OoxmlError> {
    tags.iter()
        .rev()
        .find(|tag| tag.kind == TagKind::End && tag.depth == 0)
        .ok_or_else(|| OoxmlError::Xml {
            part: part.to_string(),
            message: "root element has no closing tag".to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// Contents of a `.rels` part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(xml: &str, part: &str) -> Result<Self, OoxmlError> {
        let items = scan_tags(xml, part)?
            .into_iter()
            .filter(|tag| tag.is_open() && tag.local_name == "Relationship")
            .filter_map(|tag| {
                Some(Relationship {
                    id: tag.attribute("Id")?.to_string(),
                    rel_type: tag.attribute("Type")?.to_string(),
                    target: tag.attribute("Target")?.to_string(),
                    external: tag.attribute("TargetMode") == Some("External"),
                })
            })
            .collect();
        Ok(Self { items })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|rel| rel.id == id)
    }

    pub fn first_of_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.items.iter().find(|rel| rel.rel_type == rel_type)
    }

    /// Add an internal relationship and return its new id.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let next = self
            .items
            .iter()
            .filter_map(|rel| rel.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = (next..)
            .map(|n| format!("rId{}", n))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or_else(|| format!("rId{}", next));

        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external: false,
        });
        id
    }

    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>{}<Relationships xmlns="{}">"#,
            "\n", NS_PACKAGE_RELATIONSHIPS
        );
        for rel in &self.items {
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape(&rel.id),
                escape(&rel.rel_type),
                escape(&rel.target),
                if rel.external {
                    r#" TargetMode="External""#
                } else {
                    ""
                }
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }
}

/// Contents of `[Content_Types].xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml: &str) -> Result<Self, OoxmlError> {
        let mut types = Self::default();
        for tag in scan_tags(xml, CONTENT_TYPES_PART)? {
            if !tag.is_open() {
                continue;
            }
            let content_type = tag.attribute("ContentType").unwrap_or_default().to_string();
            match tag.local_name.as_str() {
                "Default" => {
                    if let Some(extension) = tag.attribute("Extension") {
                        types.defaults.push((extension.to_string(), content_type));
                    }
                }
                "Override" => {
                    if let Some(part_name) = tag.attribute("PartName") {
                        types.overrides.push((part_name.to_string(), content_type));
                    }
                }
                _ => {}
            }
        }
        Ok(types)
    }

    pub fn ensure_default(&mut self, extension: &str, content_type: &str) {
        if !self
            .defaults
            .iter()
            .any(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        {
            self.defaults
                .push((extension.to_string(), content_type.to_string()));
        }
    }

    /// Register an override for `part` (given without the leading slash).
    pub fn ensure_override(&mut self, part: &str, content_type: &str) {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        match self
            .overrides
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(&part_name))
        {
            Some(entry) => entry.1 = content_type.to_string(),
            None => self.overrides.push((part_name, content_type.to_string())),
        }
    }

    pub fn override_for(&self, part: &str) -> Option<&str> {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        self.overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&part_name))
            .map(|(_, content_type)| content_type.as_str())
    }

    pub fn default_for(&self, extension: &str) -> Option<&str> {
        self.defaults
            .iter()
            .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
            .map(|(_, content_type)| content_type.as_str())
    }

    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>{}<Types xmlns="{}">"#,
            "\n", NS_CONTENT_TYPES
        );
        for (extension, content_type) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape(extension),
                escape(content_type)
            ));
        }
        for (part_name, content_type) in &self.overrides {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape(part_name),
                escape(content_type)
            ));
        }
        xml.push_str("</Types>");
        xml
    }
}
