//! PDF adapter on top of `lopdf`.
//!
//! Stamps are appended as a new content stream drawn after the original
//! page content, which is wrapped in `q`/`Q` so our text starts from the
//! default graphics state. Fonts and the opacity ExtGState are added as
//! shared objects and registered in each stamped page's resources.

use std::collections::{BTreeMap, HashMap};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

use crate::error::{RenderError, WatermarkError};
use crate::render::pdf::{PageHost, PageSize, TextStamp};

const FORMAT: &str = "pdf";
const FONT_RESOURCE: &str = "DocmarkF0";
const GSTATE_PREFIX: &str = "DocmarkGS";

/// A loaded PDF exposing page-level stamping.
pub struct LopdfDocument {
    document: Document,
    pages: Vec<ObjectId>,
    fonts: HashMap<String, EmbeddedFont>,
    graphics_states: HashMap<u32, ObjectId>,
}

/// A font object already added to the document.
#[derive(Debug, Clone)]
struct EmbeddedFont {
    id: ObjectId,
    encoding: TextEncoding,
}

#[derive(Debug, Clone)]
enum TextEncoding {
    /// Two-byte glyph ids, Identity-H.
    GlyphIds(HashMap<char, u16>),
    /// Single-byte WinAnsi for the standard Helvetica fallback.
    WinAnsi,
}

impl TextEncoding {
    fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::GlyphIds(glyphs) => text
                .chars()
                .flat_map(|c| glyphs.get(&c).copied().unwrap_or(0).to_be_bytes())
                .collect(),
            Self::WinAnsi => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

impl LopdfDocument {
    pub fn from_bytes(data: &[u8]) -> Result<Self, WatermarkError> {
        let document =
            Document::load_mem(data).map_err(|e| WatermarkError::decode(FORMAT, e.to_string()))?;
        if document.is_encrypted() {
            return Err(WatermarkError::decode(
                FORMAT,
                "encrypted documents are not supported",
            ));
        }

        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        debug!(pages = pages.len(), "Loaded PDF document");
        Ok(Self {
            document,
            pages,
            fonts: HashMap::new(),
            graphics_states: HashMap::new(),
        })
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>, WatermarkError> {
        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|e| WatermarkError::encode(FORMAT, e.to_string()))?;
        Ok(output)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn page_id(&self, index: usize) -> Result<ObjectId, RenderError> {
        self.pages
            .get(index)
            .copied()
            .ok_or(RenderError::NoSuchUnit { index })
    }

    /// Font object for a stamp, embedding it on first use.
    ///
    /// Faces that cannot be embedded are drawn with standard Helvetica. The
    /// plan was computed with the resolved face's metrics, so right and
    /// bottom anchored text may sit a little off its margin in that case.
    fn font_for(&mut self, stamp: &TextStamp<'_>) -> EmbeddedFont {
        let key = format!("{}\u{0}{}", stamp.font.family(), stamp.text);
        if let Some(font) = self.fonts.get(&key) {
            return font.clone();
        }

        let font = match stamp.font.embeddable_truetype() {
            Some(data) => match embed_truetype(&mut self.document, data, stamp) {
                Some(font) => font,
                None => add_helvetica(&mut self.document),
            },
            None => add_helvetica(&mut self.document),
        };
        self.fonts.insert(key, font.clone());
        font
    }

    /// Page dictionary, resolving inherited attributes through `Parent`.
    fn inherited<'a>(&'a self, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
        let mut current = self.document.get_dictionary(page_id).ok()?;
        for _ in 0..64 {
            if let Ok(value) = current.get(key) {
                return Some(value);
            }
            let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
            current = self.document.get_dictionary(parent).ok()?;
        }
        None
    }

    fn owned_dict(&self, object: &Object) -> Option<Dictionary> {
        match object {
            Object::Dictionary(dict) => Some(dict.clone()),
            Object::Reference(id) => self.document.get_dictionary(*id).ok().cloned(),
            _ => None,
        }
    }

    /// Effective resources with our font and graphics state added.
    fn stamped_resources(
        &self,
        page_id: ObjectId,
        font_id: ObjectId,
        gs_name: &str,
        gs_id: ObjectId,
    ) -> Dictionary {
        let mut resources = self
            .inherited(page_id, b"Resources")
            .and_then(|object| self.owned_dict(object))
            .unwrap_or_else(Dictionary::new);

        for (category, name, id) in [
            (b"Font".as_slice(), FONT_RESOURCE, font_id),
            (b"ExtGState".as_slice(), gs_name, gs_id),
        ] {
            let mut entries = resources
                .get(category)
                .ok()
                .and_then(|object| self.owned_dict(object))
                .unwrap_or_else(Dictionary::new);
            entries.set(name, Object::Reference(id));
            resources.set(category, Object::Dictionary(entries));
        }
        resources
    }

    /// Current content streams of a page as references. Inline streams are
    /// moved into their own objects.
    fn existing_contents(&mut self, page_id: ObjectId) -> Vec<Object> {
        let contents = match self.document.get_dictionary(page_id) {
            Ok(page) => page.get(b"Contents").ok().cloned(),
            Err(_) => None,
        };
        match contents {
            Some(Object::Reference(id)) => match self.document.get_object(id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(id)],
            },
            Some(Object::Array(items)) => items,
            Some(Object::Stream(stream)) => vec![Object::Reference(self.document.add_object(stream))],
            _ => Vec::new(),
        }
    }

    /// Shared ExtGState for an opacity, created on first use.
    fn graphics_state(&mut self, opacity: f32) -> (String, ObjectId) {
        let key = (opacity * 1000.0).round() as u32;
        let name = format!("{}{}", GSTATE_PREFIX, key);
        let document = &mut self.document;
        let id = *self.graphics_states.entry(key).or_insert_with(|| {
            document.add_object(dictionary! {
                "Type" => "ExtGState",
                "ca" => Object::Real(opacity),
                "CA" => Object::Real(opacity),
            })
        });
        (name, id)
    }
}

impl PageHost for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize, RenderError> {
        let page_id = self.page_id(index)?;
        let media_box = self
            .inherited(page_id, b"MediaBox")
            .ok_or_else(|| RenderError::Pdf(format!("page {} has no MediaBox", index + 1)))?;
        let rect = match media_box {
            Object::Reference(id) => self.document.get_object(*id).ok(),
            other => Some(other),
        }
        .and_then(|object| object.as_array().ok())
        .and_then(|items| rectangle(items))
        .ok_or_else(|| RenderError::Pdf(format!("page {} has a malformed MediaBox", index + 1)))?;
        let rotate = self
            .inherited(page_id, b"Rotate")
            .and_then(number)
            .map_or(0, |degrees| degrees.round() as i64);
        Ok(PageSize::from_media_box(rect).with_rotation(rotate))
    }

    fn stamp_text(&mut self, index: usize, stamp: &TextStamp<'_>) -> Result<(), RenderError> {
        let page_id = self.page_id(index)?;
        let font = self.font_for(stamp);
        let (gs_name, gs_id) = self.graphics_state(stamp.opacity);
        let content = stamp_content(stamp, &font.encoding, &gs_name)?;
        let resources = self.stamped_resources(page_id, font.id, &gs_name, gs_id);

        let existing = self.existing_contents(page_id);
        let contents = if existing.is_empty() {
            let stamp_id = self.document.add_object(Stream::new(dictionary! {}, content));
            vec![Object::Reference(stamp_id)]
        } else {
            let open_id = self
                .document
                .add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
            let mut body = b"Q\n".to_vec();
            body.extend(content);
            let stamp_id = self.document.add_object(Stream::new(dictionary! {}, body));

            let mut contents = Vec::with_capacity(existing.len() + 2);
            contents.push(Object::Reference(open_id));
            contents.extend(existing);
            contents.push(Object::Reference(stamp_id));
            contents
        };

        let page = self
            .document
            .get_object_mut(page_id)
            .and_then(|object| object.as_dict_mut())
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Array(contents));
        Ok(())
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn rectangle(items: &[Object]) -> Option<[f32; 4]> {
    if items.len() != 4 {
        return None;
    }
    Some([
        number(&items[0])?,
        number(&items[1])?,
        number(&items[2])?,
        number(&items[3])?,
    ])
}

/// Operators drawing every instruction of the stamp.
fn stamp_content(
    stamp: &TextStamp<'_>,
    encoding: &TextEncoding,
    gs_name: &str,
) -> Result<Vec<u8>, RenderError> {
    let [r, g, b] = stamp.color.to_unit_rgb();
    let text = Object::String(encoding.encode(stamp.text), StringFormat::Hexadecimal);

    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(gs_name.as_bytes().to_vec())]),
        Operation::new("rg", vec![r.into(), g.into(), b.into()]),
    ];
    for matrix in stamp.text_matrices() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![
                Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                stamp.font.size().into(),
            ],
        ));
        operations.push(Operation::new(
            "Tm",
            matrix.iter().map(|value| Object::Real(*value)).collect(),
        ));
        operations.push(Operation::new("Tj", vec![text.clone()]));
        operations.push(Operation::new("ET", vec![]));
    }
    operations.push(Operation::new("Q", vec![]));

    Content { operations }
        .encode()
        .map_err(|e| RenderError::Pdf(e.to_string()))
}

fn add_helvetica(document: &mut Document) -> EmbeddedFont {
    let id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    EmbeddedFont {
        id,
        encoding: TextEncoding::WinAnsi,
    }
}

/// Embed a TrueType face as a Type0 font with Identity-H encoding.
///
/// The whole font program is embedded, once per document and text; `W`
/// lists only the glyphs the stamp text uses. Large CJK faces therefore
/// add several megabytes to the output. Pointing `bundled_font` at a
/// smaller face keeps files small until glyph subsetting lands here.
fn embed_truetype(
    document: &mut Document,
    data: &[u8],
    stamp: &TextStamp<'_>,
) -> Option<EmbeddedFont> {
    let face = ttf_parser::Face::parse(data, 0).ok()?;
    let units_per_em = f32::from(face.units_per_em());
    let to_pdf_units = |value: f32| (value * 1000.0 / units_per_em).round() as i64;

    let mut glyphs = HashMap::new();
    let mut widths = BTreeMap::new();
    for c in stamp.text.chars() {
        let glyph = face.glyph_index(c).map(|id| id.0).unwrap_or(0);
        glyphs.insert(c, glyph);
        let advance = face
            .glyph_hor_advance(ttf_parser::GlyphId(glyph))
            .unwrap_or(0);
        widths.insert(glyph, to_pdf_units(f32::from(advance)));
    }

    let base_font = postscript_name(stamp.font.family());
    let bbox = face.global_bounding_box();
    let cap_height = face.capital_height().unwrap_or(face.ascender());

    let mut font_file = Stream::new(dictionary! { "Length1" => data.len() as i64 }, data.to_vec());
    if let Err(e) = font_file.compress() {
        debug!(error = %e, "Embedding font program uncompressed");
    }
    let font_file_id = document.add_object(font_file);

    let descriptor_id = document.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(base_font.clone().into_bytes()),
        "Flags" => 32,
        "FontBBox" => vec![
            to_pdf_units(f32::from(bbox.x_min)).into(),
            to_pdf_units(f32::from(bbox.y_min)).into(),
            to_pdf_units(f32::from(bbox.x_max)).into(),
            to_pdf_units(f32::from(bbox.y_max)).into(),
        ],
        "ItalicAngle" => 0,
        "Ascent" => to_pdf_units(f32::from(face.ascender())),
        "Descent" => to_pdf_units(f32::from(face.descender())),
        "CapHeight" => to_pdf_units(f32::from(cap_height)),
        "StemV" => 80,
        "FontFile2" => Object::Reference(font_file_id),
    });

    let mut w = Vec::with_capacity(widths.len() * 2);
    for (glyph, width) in widths {
        w.push(Object::Integer(i64::from(glyph)));
        w.push(Object::Array(vec![Object::Integer(width)]));
    }

    let cid_font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(base_font.clone().into_bytes()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => Object::Reference(descriptor_id),
        "DW" => 1000,
        "W" => Object::Array(w),
        "CIDToGIDMap" => "Identity",
    });

    let id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(base_font.into_bytes()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
    });

    Some(EmbeddedFont {
        id,
        encoding: TextEncoding::GlyphIds(glyphs),
    })
}

/// PDF name-safe PostScript name from a family name.
fn postscript_name(family: &str) -> String {
    let name: String = family
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if name.is_empty() {
        "DocmarkWatermark".to_string()
    } else {
        name
    }
}
