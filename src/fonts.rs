//! Font registry and text measurement using `ttf-parser`.
//!
//! Faces are registered under a name (`Doc1Font`, `Doc1Font-Bold`, ...) and
//! grouped into families so that `<b>`/`<i>` markup can switch faces. The
//! PDF standard faces (Helvetica, Times-Roman, Courier) are always present
//! and measured with an average-width heuristic.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ConfigError, ResourceError};

/// A PDF standard-14 face that needs no embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFace {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl BuiltinFace {
    const ALL: [(&'static str, BuiltinFace); 12] = [
        ("Helvetica", BuiltinFace::Helvetica),
        ("Helvetica-Bold", BuiltinFace::HelveticaBold),
        ("Helvetica-Oblique", BuiltinFace::HelveticaOblique),
        ("Helvetica-BoldOblique", BuiltinFace::HelveticaBoldOblique),
        ("Times-Roman", BuiltinFace::TimesRoman),
        ("Times-Bold", BuiltinFace::TimesBold),
        ("Times-Italic", BuiltinFace::TimesItalic),
        ("Times-BoldItalic", BuiltinFace::TimesBoldItalic),
        ("Courier", BuiltinFace::Courier),
        ("Courier-Bold", BuiltinFace::CourierBold),
        ("Courier-Oblique", BuiltinFace::CourierOblique),
        ("Courier-BoldOblique", BuiltinFace::CourierBoldOblique),
    ];

    fn is_bold(self) -> bool {
        matches!(
            self,
            BuiltinFace::HelveticaBold
                | BuiltinFace::HelveticaBoldOblique
                | BuiltinFace::TimesBold
                | BuiltinFace::TimesBoldItalic
                | BuiltinFace::CourierBold
                | BuiltinFace::CourierBoldOblique
        )
    }

    fn is_monospace(self) -> bool {
        matches!(
            self,
            BuiltinFace::Courier
                | BuiltinFace::CourierBold
                | BuiltinFace::CourierOblique
                | BuiltinFace::CourierBoldOblique
        )
    }
}

/// Glyph source of a registered face.
#[derive(Debug, Clone)]
pub enum FaceSource {
    Builtin(BuiltinFace),
    /// Raw TTF bytes, shared between aliases.
    Embedded(Arc<Vec<u8>>),
}

/// A registered face with vertical metrics in font units.
#[derive(Debug, Clone)]
pub struct FontData {
    pub source: FaceSource,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

impl FontData {
    fn builtin(face: BuiltinFace) -> Self {
        Self {
            source: FaceSource::Builtin(face),
            units_per_em: 1000.0,
            ascender: 750.0,
            descender: -250.0,
        }
    }
}

/// Face names of one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFamily {
    pub regular: String,
    pub bold: String,
    pub italic: String,
    pub bold_italic: String,
}

impl FontFamily {
    fn face(&self, bold: bool, italic: bool) -> &str {
        match (bold, italic) {
            (false, false) => &self.regular,
            (true, false) => &self.bold,
            (false, true) => &self.italic,
            (true, true) => &self.bold_italic,
        }
    }
}

/// Fonts registered for one build.
#[derive(Debug, Clone)]
pub struct FontManager {
    faces: HashMap<String, FontData>,
    families: HashMap<String, FontFamily>,
    /// face name → (family, bold, italic)
    membership: HashMap<String, (String, bool, bool)>,
}

impl FontManager {
    /// A registry holding only the standard faces.
    pub fn new() -> Self {
        let mut mgr = Self {
            faces: HashMap::new(),
            families: HashMap::new(),
            membership: HashMap::new(),
        };
        for (name, face) in BuiltinFace::ALL {
            mgr.faces.insert(name.to_string(), FontData::builtin(face));
        }
        mgr.register_family("Helvetica", "Helvetica", "Helvetica-Bold", "Helvetica-Oblique", "Helvetica-BoldOblique");
        mgr.register_family("Times-Roman", "Times-Roman", "Times-Bold", "Times-Italic", "Times-BoldItalic");
        mgr.register_family("Courier", "Courier", "Courier-Bold", "Courier-Oblique", "Courier-BoldOblique");
        mgr
    }

    /// Register a TTF face under `name`.
    ///
    /// Returns `Ok(false)` when the file does not exist and `required` is
    /// false; a missing required file or an unparsable file is an error.
    pub fn add_font(&mut self, name: &str, path: &Path, required: bool) -> Result<bool, ResourceError> {
        if !path.is_file() {
            if required {
                return Err(ResourceError::FontFileMissing(path.to_path_buf()));
            }
            log::debug!("optional face {name} not found at {}", path.display());
            return Ok(false);
        }

        let bytes = std::fs::read(path).map_err(|e| ResourceError::InvalidFont {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let face = ttf_parser::Face::parse(&bytes, 0).map_err(|e| ResourceError::InvalidFont {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            source: FaceSource::Embedded(Arc::new(bytes)),
        };
        log::debug!("registered face {name} from {}", path.display());
        self.faces.insert(name.to_string(), data);
        Ok(true)
    }

    /// Register a family: the regular face is required, the variants are
    /// optional. A missing variant is registered as an alias of the regular
    /// face so `{name}-Bold` and friends always resolve.
    pub fn add_font_family(
        &mut self,
        name: &str,
        regular: &Path,
        italic: Option<&Path>,
        bold: Option<&Path>,
        bold_italic: Option<&Path>,
    ) -> Result<(), ResourceError> {
        self.add_font(name, regular, true)?;

        let variants = [
            (format!("{name}-Italic"), italic),
            (format!("{name}-Bold"), bold),
            (format!("{name}-BoldItalic"), bold_italic),
        ];
        for (face_name, path) in &variants {
            let loaded = match path {
                Some(p) => self.add_font(face_name, p, false)?,
                None => false,
            };
            if !loaded {
                log::debug!("{face_name} aliases {name}");
                if let Some(data) = self.faces.get(name).cloned() {
                    self.faces.insert(face_name.clone(), data);
                }
            }
        }

        let [(italic, _), (bold, _), (bold_italic, _)] = &variants;
        self.register_family(name, name, bold, italic, bold_italic);
        Ok(())
    }

    fn register_family(&mut self, family: &str, regular: &str, bold: &str, italic: &str, bold_italic: &str) {
        let fam = FontFamily {
            regular: regular.to_string(),
            bold: bold.to_string(),
            italic: italic.to_string(),
            bold_italic: bold_italic.to_string(),
        };
        for (face, b, i) in [
            (regular, false, false),
            (bold, true, false),
            (italic, false, true),
            (bold_italic, true, true),
        ] {
            self.membership.insert(face.to_string(), (family.to_string(), b, i));
        }
        self.families.insert(family.to_string(), fam);
    }

    pub fn has_face(&self, name: &str) -> bool {
        self.faces.contains_key(name)
    }

    pub fn family(&self, name: &str) -> Option<&FontFamily> {
        self.families.get(name)
    }

    /// Fail with [`ConfigError::FontNotFound`] unless `name` is registered.
    pub fn require(&self, name: &str) -> Result<(), ConfigError> {
        if self.has_face(name) {
            Ok(())
        } else {
            Err(ConfigError::FontNotFound(name.to_string()))
        }
    }

    /// Face to draw with when `bold` / `italic` markup applies on top of
    /// `base`. Faces outside any family are returned unchanged.
    pub fn resolve_face<'a>(&'a self, base: &'a str, bold: bool, italic: bool) -> &'a str {
        match self.membership.get(base) {
            Some((family, b, i)) => match self.families.get(family) {
                Some(fam) => fam.face(*b || bold, *i || italic),
                None => base,
            },
            None => base,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FontData> {
        self.faces.get(name)
    }

    fn data_or_default(&self, name: &str) -> FontData {
        self.faces
            .get(name)
            .cloned()
            .unwrap_or_else(|| FontData::builtin(BuiltinFace::Helvetica))
    }

    /// Width of `text` in points at `font_size`.
    ///
    /// Embedded faces sum glyph advances. Standard faces use an average
    /// character width: 0.5 × size (0.55 bold, 0.6 Courier).
    pub fn measure_text_width(&self, text: &str, font_size: f32, face: &str) -> f32 {
        let data = self.data_or_default(face);
        match &data.source {
            FaceSource::Builtin(b) => {
                let avg = if b.is_monospace() {
                    0.6
                } else if b.is_bold() {
                    0.55
                } else {
                    0.5
                };
                text.chars().count() as f32 * font_size * avg
            }
            FaceSource::Embedded(bytes) => match ttf_parser::Face::parse(bytes, 0) {
                Ok(parsed) => {
                    let scale = font_size / data.units_per_em;
                    text.chars()
                        .map(|ch| match parsed.glyph_index(ch) {
                            Some(gid) => parsed.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                            None => font_size * 0.5,
                        })
                        .sum()
                }
                Err(_) => text.chars().count() as f32 * font_size * 0.5,
            },
        }
    }

    /// Ascender in points.
    pub fn ascender(&self, font_size: f32, face: &str) -> f32 {
        let data = self.data_or_default(face);
        data.ascender * font_size / data.units_per_em
    }

    /// Descender in points (negative below the baseline).
    pub fn descender(&self, font_size: f32, face: &str) -> f32 {
        let data = self.data_or_default(face);
        data.descender * font_size / data.units_per_em
    }

    /// Embedded faces as `(name, bytes)`, for the PDF writer.
    pub fn embedded_faces(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.faces.iter().filter_map(|(name, data)| match &data.source {
            FaceSource::Embedded(bytes) => Some((name.as_str(), bytes.as_slice())),
            FaceSource::Builtin(_) => None,
        })
    }

    pub fn builtin_face(&self, name: &str) -> Option<BuiltinFace> {
        match self.faces.get(name).map(|d| &d.source) {
            Some(FaceSource::Builtin(b)) => Some(*b),
            _ => None,
        }
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}
