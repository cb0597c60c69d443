//! Font resolution and text metrics.
//!
//! [`FontResolver`] walks a fixed fallback chain once and caches the winning
//! face for the lifetime of the resolver:
//!
//! 1. the bundled font asset at the configured path
//! 2. the first installed family from the CJK fallback list
//! 3. the first installed generic sans-serif family
//! 4. any other installed face, preferring regular styles
//! 5. a metrics-only synthetic face
//!
//! Resolution never fails. The synthetic face measures text but draws
//! nothing, so a host without fonts still produces well-formed output.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use ab_glyph::{Font, FontArc, FontVec, GlyphId, PxScale, ScaleFont};
use tracing::{debug, info, warn};

use crate::config::FontConfig;

pub const DEFAULT_BUNDLED_FONT: &str = "assets/fonts/simsun.ttf";

pub const DEFAULT_FALLBACK_FAMILIES: [&str; 5] = [
    "SimSun",
    "Microsoft YaHei",
    "PingFang SC",
    "Heiti SC",
    "WenQuanYi Micro Hei",
];

pub const DEFAULT_LOGICAL_FAMILIES: [&str; 5] = [
    "DejaVu Sans",
    "Liberation Sans",
    "Arial",
    "Helvetica",
    "Noto Sans",
];

const FONT_EXTENSIONS: [&str; 4] = ["ttf", "otf", "ttc", "otc"];
const MAX_SCAN_DEPTH: usize = 6;

const SYNTHETIC_NARROW_ADVANCE: f32 = 0.6;
const SYNTHETIC_WIDE_ADVANCE: f32 = 1.0;
const SYNTHETIC_LINE_HEIGHT: f32 = 1.15;
const SYNTHETIC_ASCENT: f32 = 0.9;
const SYNTHETIC_FAMILY: &str = "sans-serif";

/// Width and height queries used by the geometry engine.
pub trait FontMetrics {
    /// Advance width of `text` on a single line.
    fn text_width(&self, text: &str) -> f32;

    /// Distance between consecutive baselines.
    fn line_height(&self) -> f32;
}

/// Errors from a single step of the fallback chain.
#[derive(Debug, thiserror::Error)]
pub enum FontLoadError {
    #[error("No bundled font path configured")]
    NotConfigured,

    #[error("Font file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read font file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid font data in {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },

    #[error("None of the font families {0:?} are installed")]
    NoMatchingFamily(Vec<String>),
}

/// Which step of the fallback chain produced the face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSource {
    Bundled,
    System,
    Logical,
    /// Some installed face outside both family lists.
    Installed,
    Synthetic,
}

impl FontSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundled => "bundled",
            Self::System => "system",
            Self::Logical => "logical",
            Self::Installed => "installed",
            Self::Synthetic => "synthetic",
        }
    }
}

/// Read and sanity-check a font file.
pub fn load_font_asset(path: &Path) -> Result<Vec<u8>, FontLoadError> {
    if !path.is_file() {
        return Err(FontLoadError::NotFound(path.to_path_buf()));
    }

    let data = fs::read(path).map_err(|source| FontLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    ttf_parser::Face::parse(&data, 0).map_err(|e| FontLoadError::Invalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(data)
}

/// A parsed face plus the raw bytes it came from.
#[derive(Clone)]
struct LoadedFace {
    font: FontArc,
    data: Arc<Vec<u8>>,
    index: u32,
    family: String,
    source: FontSource,
}

impl LoadedFace {
    fn from_bytes(
        path: &Path,
        data: Vec<u8>,
        index: u32,
        source: FontSource,
    ) -> Result<Self, FontLoadError> {
        let family = face_families(&data, index)
            .and_then(|(display, _)| display)
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| SYNTHETIC_FAMILY.to_string());

        let font = FontVec::try_from_vec_and_index(data.clone(), index).map_err(|e| {
            FontLoadError::Invalid {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            font: FontArc::new(font),
            data: Arc::new(data),
            index,
            family,
            source,
        })
    }
}

/// Family names of one face: the preferred English display name plus every
/// localized family name for matching.
fn face_families(data: &[u8], index: u32) -> Option<(Option<String>, Vec<String>)> {
    let face = ttf_parser::Face::parse(data, index).ok()?;

    let mut display = None;
    let mut all = Vec::new();
    for name_id in [
        ttf_parser::name_id::TYPOGRAPHIC_FAMILY,
        ttf_parser::name_id::FAMILY,
    ] {
        for name in face.names() {
            if name.name_id != name_id || !name.is_unicode() {
                continue;
            }
            let Some(value) = name.to_string() else {
                continue;
            };
            // 0x0409: English (United States)
            if display.is_none() && name.language_id == 0x0409 {
                display = Some(value.clone());
            }
            if !all.contains(&value) {
                all.push(value);
            }
        }
    }

    let display = display.or_else(|| all.first().cloned());
    Some((display, all))
}

/// Platform font directories, searched when none are configured.
pub fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    dirs
}

#[derive(Debug)]
struct SystemFontEntry {
    families: Vec<String>,
    path: PathBuf,
    index: u32,
    regular: bool,
}

/// Family names of every installed face, built once per resolver.
#[derive(Debug, Default)]
struct SystemFontIndex {
    entries: Vec<SystemFontEntry>,
}

impl SystemFontIndex {
    fn scan(dirs: &[PathBuf]) -> Self {
        let mut entries = Vec::new();
        let mut pending: Vec<(PathBuf, usize)> = dirs.iter().map(|d| (d.clone(), 0)).collect();

        while let Some((dir, depth)) = pending.pop() {
            let Ok(read_dir) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    if depth < MAX_SCAN_DEPTH {
                        pending.push((path, depth + 1));
                    }
                } else if has_font_extension(&path) {
                    index_font_file(&path, &mut entries);
                }
            }
        }

        // Deterministic lookup regardless of directory iteration order.
        entries.sort_by(|a, b| a.path.cmp(&b.path).then(a.index.cmp(&b.index)));
        debug!(faces = entries.len(), "Indexed installed fonts");
        Self { entries }
    }

    /// First installed face matching the families in order, preferring the
    /// regular style.
    fn find(&self, families: &[String]) -> Option<&SystemFontEntry> {
        families.iter().find_map(|wanted| {
            let mut matches = self.entries.iter().filter(|entry| {
                entry
                    .families
                    .iter()
                    .any(|family| family.eq_ignore_ascii_case(wanted))
            });
            let first = matches.next()?;
            if first.regular {
                return Some(first);
            }
            matches.find(|entry| entry.regular).or(Some(first))
        })
    }

    /// Every face, regular styles first, each group in path order.
    fn by_preference(&self) -> impl Iterator<Item = &SystemFontEntry> {
        let regular = self.entries.iter().filter(|entry| entry.regular);
        regular.chain(self.entries.iter().filter(|entry| !entry.regular))
    }
}

fn has_font_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn index_font_file(path: &Path, entries: &mut Vec<SystemFontEntry>) {
    let Ok(data) = fs::read(path) else {
        return;
    };
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    for index in 0..count {
        let Ok(face) = ttf_parser::Face::parse(&data, index) else {
            continue;
        };
        let regular = face.is_regular();
        if let Some((_, families)) = face_families(&data, index) {
            if !families.is_empty() {
                entries.push(SystemFontEntry {
                    families,
                    path: path.to_path_buf(),
                    index,
                    regular,
                });
            }
        }
    }
}

/// Resolves the watermark font once and hands out sized handles.
pub struct FontResolver {
    config: FontConfig,
    face: OnceLock<Option<LoadedFace>>,
}

impl FontResolver {
    pub fn new(config: FontConfig) -> Self {
        Self {
            config,
            face: OnceLock::new(),
        }
    }

    /// A font handle at the given em size. Loads the face on first use.
    pub fn resolve(&self, size: f32) -> ResolvedFont {
        let face = self.face.get_or_init(|| self.load_face()).clone();
        ResolvedFont { face, size }
    }

    /// Which fallback step won, resolving the face if needed.
    pub fn source(&self) -> FontSource {
        self.face
            .get_or_init(|| self.load_face())
            .as_ref()
            .map(|face| face.source)
            .unwrap_or(FontSource::Synthetic)
    }

    fn load_face(&self) -> Option<LoadedFace> {
        match self.load_bundled() {
            Ok(face) => return Some(announce(face)),
            Err(e) => debug!(error = %e, "Bundled font unavailable"),
        }

        let dirs = if self.config.font_dirs.is_empty() {
            system_font_dirs()
        } else {
            self.config.font_dirs.clone()
        };
        let index = SystemFontIndex::scan(&dirs);

        for (families, source) in [
            (&self.config.fallback_families, FontSource::System),
            (&self.config.logical_families, FontSource::Logical),
        ] {
            match load_installed(&index, families, source) {
                Ok(face) => return Some(announce(face)),
                Err(e) => debug!(error = %e, source = source.as_str(), "Font fallback step failed"),
            }
        }

        for entry in index.by_preference() {
            match load_entry(entry, FontSource::Installed) {
                Ok(face) => return Some(announce(face)),
                Err(e) => debug!(error = %e, "Skipping installed font"),
            }
        }

        warn!("No usable font found, watermark text will be measured but not drawn");
        None
    }

    fn load_bundled(&self) -> Result<LoadedFace, FontLoadError> {
        let path = self
            .config
            .bundled_font
            .as_deref()
            .ok_or(FontLoadError::NotConfigured)?;
        let data = load_font_asset(path)?;
        LoadedFace::from_bytes(path, data, 0, FontSource::Bundled)
    }
}

fn load_installed(
    index: &SystemFontIndex,
    families: &[String],
    source: FontSource,
) -> Result<LoadedFace, FontLoadError> {
    let entry = index
        .find(families)
        .ok_or_else(|| FontLoadError::NoMatchingFamily(families.to_vec()))?;
    load_entry(entry, source)
}

fn load_entry(entry: &SystemFontEntry, source: FontSource) -> Result<LoadedFace, FontLoadError> {
    let data = fs::read(&entry.path).map_err(|source| FontLoadError::Io {
        path: entry.path.clone(),
        source,
    })?;
    LoadedFace::from_bytes(&entry.path, data, entry.index, source)
}

fn announce(face: LoadedFace) -> LoadedFace {
    info!(
        family = %face.family,
        source = face.source.as_str(),
        "Resolved watermark font"
    );
    face
}

/// A font at a specific em size.
#[derive(Clone)]
pub struct ResolvedFont {
    face: Option<LoadedFace>,
    size: f32,
}

impl ResolvedFont {
    /// Handle backed by the synthetic face only.
    pub fn synthetic(size: f32) -> Self {
        Self { face: None, size }
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn source(&self) -> FontSource {
        self.face
            .as_ref()
            .map(|face| face.source)
            .unwrap_or(FontSource::Synthetic)
    }

    pub fn family(&self) -> &str {
        self.face
            .as_ref()
            .map(|face| face.family.as_str())
            .unwrap_or(SYNTHETIC_FAMILY)
    }

    /// Glyph outlines, absent for the synthetic face.
    pub fn font(&self) -> Option<&FontArc> {
        self.face.as_ref().map(|face| &face.font)
    }

    /// Pixel scale that makes `size` the em size of the face.
    pub fn px_scale(&self) -> PxScale {
        match self.font() {
            Some(font) => {
                let units_per_em = font.units_per_em().unwrap_or(1000.0);
                PxScale::from(self.size * font.height_unscaled() / units_per_em)
            }
            None => PxScale::from(self.size),
        }
    }

    /// Distance from the top of the line box to the baseline.
    pub fn ascent(&self) -> f32 {
        match self.font() {
            Some(font) => font.as_scaled(self.px_scale()).ascent(),
            None => self.size * SYNTHETIC_ASCENT,
        }
    }

    /// Raw TrueType bytes when the face can be embedded as a CID font.
    ///
    /// Collections and CFF-flavored faces return `None`.
    pub fn embeddable_truetype(&self) -> Option<&[u8]> {
        let face = self.face.as_ref()?;
        if face.index != 0 || ttf_parser::fonts_in_collection(&face.data).is_some() {
            return None;
        }
        let parsed = ttf_parser::Face::parse(&face.data, 0).ok()?;
        parsed.tables().glyf.is_some().then_some(face.data.as_slice())
    }

    /// Glyph id for `c` in the resolved face.
    pub fn glyph_id(&self, c: char) -> Option<GlyphId> {
        self.font().map(|font| font.glyph_id(c))
    }
}

impl std::fmt::Debug for ResolvedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFont")
            .field("family", &self.family())
            .field("source", &self.source())
            .field("size", &self.size)
            .finish()
    }
}

impl FontMetrics for ResolvedFont {
    fn text_width(&self, text: &str) -> f32 {
        let Some(font) = self.font() else {
            return text
                .chars()
                .map(|c| {
                    if is_wide(c) {
                        SYNTHETIC_WIDE_ADVANCE
                    } else {
                        SYNTHETIC_NARROW_ADVANCE
                    }
                })
                .sum::<f32>()
                * self.size;
        };

        let scaled = font.as_scaled(self.px_scale());
        let mut width = 0.0f32;
        let mut prev_glyph: Option<GlyphId> = None;
        for c in text.chars() {
            let glyph_id = scaled.glyph_id(c);
            if let Some(prev) = prev_glyph {
                width += scaled.kern(prev, glyph_id);
            }
            width += scaled.h_advance(glyph_id);
            prev_glyph = Some(glyph_id);
        }
        width
    }

    fn line_height(&self) -> f32 {
        match self.font() {
            Some(font) => {
                let scaled = font.as_scaled(self.px_scale());
                scaled.height() + scaled.line_gap()
            }
            None => self.size * SYNTHETIC_LINE_HEIGHT,
        }
    }
}

/// East Asian wide and fullwidth ranges.
fn is_wide(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x115F
            | 0x2E80..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x20000..=0x3FFFD
    )
}
