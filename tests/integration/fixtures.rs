// Programmatic input documents for the integration tests

use std::io::{Cursor, Read, Write};
use std::path::Path;

use docmark::codec::raster::encode_png;
use docmark::config::{FontConfig, RendererSettings};
use docmark::Watermarker;
use image::{Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_HEADER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";

/// Watermarker that never finds a real font, so output is deterministic.
pub fn synthetic_watermarker(font_dir: &Path) -> Watermarker {
    Watermarker::new(
        FontConfig {
            bundled_font: None,
            fallback_families: Vec::new(),
            logical_families: Vec::new(),
            font_dirs: vec![font_dir.to_path_buf()],
        },
        RendererSettings::default(),
    )
}

/// Watermarker using whatever fonts the machine has.
pub fn system_watermarker() -> Watermarker {
    Watermarker::new(FontConfig::default(), RendererSettings::default())
}

pub fn png(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    encode_png(&RgbaImage::from_pixel(width, height, Rgba(pixel))).unwrap()
}

/// One page per entry; `None` leaves the page without any MediaBox.
pub fn pdf(media_boxes: &[Option<[i64; 4]>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for media_box in media_boxes {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
        };
        if let Some(rect) = media_box {
            page.set(
                "MediaBox",
                rect.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
            );
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => media_boxes.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// One page whose `/Rotate` is inherited from the page tree root.
pub fn rotated_pdf(media_box: [i64; 4], rotate: i64) -> Vec<u8> {
    let mut doc = Document::load_mem(&pdf(&[Some(media_box)])).unwrap();
    let pages_id = doc
        .catalog()
        .unwrap()
        .get(b"Pages")
        .unwrap()
        .as_reference()
        .unwrap();
    doc.get_object_mut(pages_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Rotate", Object::Integer(rotate));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn zip(parts: &[(&str, String)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Every entry of a zip archive as text, in archive order.
pub fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}

pub fn part(parts: &[(String, Vec<u8>)], name: &str) -> Option<String> {
    parts
        .iter()
        .find(|(part, _)| part == name)
        .map(|(_, content)| String::from_utf8_lossy(content).into_owned())
}

fn package_rels(target: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{}"><Relationship Id="rId1" Type="{}" Target="{}"/></Relationships>"#,
        NS_PKG_RELS, REL_OFFICE_DOCUMENT, target
    )
}

/// Workbook with one worksheet per `<sheetData>` body.
pub fn xlsx(sheets: &[&str]) -> Vec<u8> {
    let mut overrides = String::new();
    let mut sheet_entries = String::new();
    let mut sheet_rels = String::new();
    let mut parts: Vec<(String, String)> = Vec::new();

    for (i, body) in sheets.iter().enumerate() {
        let n = i + 1;
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            n
        ));
        sheet_entries.push_str(&format!(
            r#"<sheet name="Sheet{n}" sheetId="{n}" r:id="rId{n}"/>"#,
            n = n
        ));
        sheet_rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="{t}" Target="worksheets/sheet{n}.xml"/>"#,
            n = n,
            t = REL_WORKSHEET
        ));
        parts.push((
            format!("xl/worksheets/sheet{}.xml", n),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{}" xmlns:r="{}">{}</worksheet>"#,
                NS_MAIN, NS_R, body
            ),
        ));
    }

    let mut all = vec![
        (
            "[Content_Types].xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="{}"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{}</Types>"#,
                NS_CONTENT_TYPES, overrides
            ),
        ),
        ("_rels/.rels".to_string(), package_rels("xl/workbook.xml")),
        (
            "xl/workbook.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{}" xmlns:r="{}"><sheets>{}</sheets></workbook>"#,
                NS_MAIN, NS_R, sheet_entries
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{}">{}</Relationships>"#,
                NS_PKG_RELS, sheet_rels
            ),
        ),
    ];
    all.extend(parts);

    let borrowed: Vec<(&str, String)> = all
        .iter()
        .map(|(name, content)| (name.as_str(), content.clone()))
        .collect();
    zip(&borrowed)
}

/// Document whose `<w:body>` is `body`, plus optional `word/header1.xml`
/// registered as relationship `rId9`.
pub fn docx(body: &str, header: Option<&str>) -> Vec<u8> {
    let mut parts = vec![
        (
            "[Content_Types].xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="{}"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
                NS_CONTENT_TYPES
            ),
        ),
        ("_rels/.rels", package_rels("word/document.xml")),
        (
            "word/document.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="{}" xmlns:r="{}"><w:body>{}</w:body></w:document>"#,
                NS_W, NS_R, body
            ),
        ),
    ];

    if let Some(header) = header {
        parts.push((
            "word/_rels/document.xml.rels",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{}"><Relationship Id="rId9" Type="{}" Target="header1.xml"/></Relationships>"#,
                NS_PKG_RELS, REL_HEADER
            ),
        ));
        parts.push((
            "word/header1.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><w:hdr xmlns:w="{}">{}</w:hdr>"#,
                NS_W, header
            ),
        ));
    }
    zip(&parts)
}
