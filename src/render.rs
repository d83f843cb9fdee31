//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).
//!
//! Standard faces are written as builtin fonts in WinAnsiEncoding; faces
//! registered from TTF files are embedded once each and shared by every run
//! that uses them.

use std::collections::HashMap;

use printpdf::*;

use crate::error::{Md2PdfError, Result};
use crate::fonts::{BuiltinFace, FontManager};
use crate::layout_config::*;
use crate::style;

/// pt → mm
const PT_TO_MM: f32 = 0.352778;

#[derive(Clone)]
enum PdfFace {
    Builtin(BuiltinFont),
    Embedded(FontId),
}

/// Render a LayoutConfig into PDF bytes.
pub fn render_pdf(config: &LayoutConfig, fonts: &FontManager) -> Result<Vec<u8>> {
    let page_w = Mm(config.page_width_pt * PT_TO_MM);
    let page_h = Mm(config.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&config.info.title);
    doc.metadata.info.author = config.info.author.clone();
    doc.metadata.info.creator = config.info.creator.clone();
    doc.metadata.info.subject = config.info.subject.clone();
    doc.metadata.info.keywords = config.info.keywords.clone();

    let faces = register_faces(&mut doc, config, fonts)?;

    let mut pages = Vec::new();
    for page_layout in &config.pages {
        let mut ops = Vec::new();
        for lbox in &page_layout.boxes {
            render_box(&mut ops, lbox, config.page_height_pt, &faces);
        }
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    // Ensure at least one page.
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    log::debug!("rendered {} pages, {} bytes", config.pages.len(), bytes.len());
    Ok(bytes)
}

/// Map every face name used by the layout to a PDF font, embedding TTF
/// faces that are actually used.
fn register_faces(
    doc: &mut PdfDocument,
    config: &LayoutConfig,
    fonts: &FontManager,
) -> Result<HashMap<String, PdfFace>> {
    let mut used: Vec<&str> = Vec::new();
    for page in &config.pages {
        for lbox in &page.boxes {
            let runs = lbox.lines.iter().flat_map(|l| l.runs.iter()).chain(lbox.marker.iter());
            for run in runs {
                if !used.contains(&run.font.as_str()) {
                    used.push(&run.font);
                }
            }
        }
    }

    let embedded: HashMap<&str, &[u8]> = fonts.embedded_faces().collect();
    // Aliased faces share their bytes; embed each distinct buffer once.
    let mut by_bytes: HashMap<*const u8, FontId> = HashMap::new();
    let mut faces = HashMap::new();

    for name in used {
        let face = if let Some(bytes) = embedded.get(name) {
            let id = match by_bytes.get(&bytes.as_ptr()) {
                Some(id) => id.clone(),
                None => {
                    let mut warnings = Vec::new();
                    let parsed = ParsedFont::from_bytes(bytes, 0, &mut warnings).ok_or_else(|| {
                        Md2PdfError::Render(format!("failed to parse font face {name}"))
                    })?;
                    let id = doc.add_font(&parsed);
                    by_bytes.insert(bytes.as_ptr(), id.clone());
                    id
                }
            };
            PdfFace::Embedded(id)
        } else {
            let builtin = fonts.builtin_face(name).unwrap_or_else(|| {
                log::warn!("unknown face {name}, falling back to Helvetica");
                BuiltinFace::Helvetica
            });
            PdfFace::Builtin(builtin_font(builtin))
        };
        faces.insert(name.to_string(), face);
    }
    Ok(faces)
}

fn builtin_font(face: BuiltinFace) -> BuiltinFont {
    match face {
        BuiltinFace::Helvetica => BuiltinFont::Helvetica,
        BuiltinFace::HelveticaBold => BuiltinFont::HelveticaBold,
        BuiltinFace::HelveticaOblique => BuiltinFont::HelveticaOblique,
        BuiltinFace::HelveticaBoldOblique => BuiltinFont::HelveticaBoldOblique,
        BuiltinFace::TimesRoman => BuiltinFont::TimesRoman,
        BuiltinFace::TimesBold => BuiltinFont::TimesBold,
        BuiltinFace::TimesItalic => BuiltinFont::TimesItalic,
        BuiltinFace::TimesBoldItalic => BuiltinFont::TimesBoldItalic,
        BuiltinFace::Courier => BuiltinFont::Courier,
        BuiltinFace::CourierBold => BuiltinFont::CourierBold,
        BuiltinFace::CourierOblique => BuiltinFont::CourierOblique,
        BuiltinFace::CourierBoldOblique => BuiltinFont::CourierBoldOblique,
    }
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: deliberately non-UTF-8 in the 0x80-0xFF range; printpdf copies
    // builtin-font text into the content stream byte for byte.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

fn rgb(c: style::Color) -> Color {
    Color::Rgb(Rgb {
        r: c.r,
        g: c.g,
        b: c.b,
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

fn rule(ops: &mut Vec<Op>, x1: f32, x2: f32, y: f32, width: f32, color: style::Color) {
    ops.push(Op::SetOutlineThickness { pt: Pt(width) });
    ops.push(Op::SetOutlineColor { col: rgb(color) });
    ops.push(Op::DrawLine {
        line: Line {
            points: vec![point(x1, y), point(x2, y)],
            is_closed: false,
        },
    });
}

/// Render one placed paragraph box into PDF ops.
fn render_box(ops: &mut Vec<Op>, lbox: &LayoutBox, page_height: f32, faces: &HashMap<String, PdfFace>) {
    // PDF origin is bottom-left; layout origin is top-left.
    let top = page_height - lbox.y;
    let pad = lbox.border.as_ref().map_or(0.0, |b| b.padding);
    let (x1, x2) = (lbox.x - pad, lbox.x + lbox.width + pad);
    let (y1, y2) = (top - lbox.height - pad, top + pad);

    if let Some(bg) = lbox.background_color {
        ops.push(Op::SetFillColor { col: rgb(bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: vec![point(x1, y1), point(x2, y1), point(x2, y2), point(x1, y2)],
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    if let Some(border) = &lbox.border {
        ops.push(Op::SetOutlineColor { col: rgb(border.color) });
        ops.push(Op::SetOutlineThickness { pt: Pt(border.width) });
        ops.push(Op::DrawLine {
            line: Line {
                points: vec![point(x1, y2), point(x2, y2), point(x2, y1), point(x1, y1)],
                is_closed: true,
            },
        });
    }

    if let Some(marker) = &lbox.marker {
        if let Some(first) = lbox.lines.first() {
            write_run(ops, marker, lbox.x, top - first.baseline, faces);
        }
    }

    for line in &lbox.lines {
        let baseline = top - line.baseline;
        for run in &line.runs {
            write_run(ops, run, lbox.x, baseline, faces);
            let (rx1, rx2) = (lbox.x + run.x, lbox.x + run.x + run.width);
            if let Some(u) = run.underline {
                rule(ops, rx1, rx2, baseline + u.offset, u.width, run.color);
            }
            if let Some(s) = run.strike {
                rule(ops, rx1, rx2, baseline + s.offset, s.width, run.color);
            }
        }
    }
}

fn write_run(ops: &mut Vec<Op>, run: &TextRun, left: f32, baseline: f32, faces: &HashMap<String, PdfFace>) {
    if run.text.is_empty() {
        return;
    }
    let face = faces
        .get(&run.font)
        .cloned()
        .unwrap_or(PdfFace::Builtin(BuiltinFont::Helvetica));

    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(left + run.x),
            y: Pt(baseline),
        },
    });
    ops.push(Op::SetFillColor { col: rgb(run.color) });
    match face {
        PdfFace::Builtin(font) => {
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(run.font_size),
                font,
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(to_winlatin(&run.text))],
                font,
            });
        }
        PdfFace::Embedded(font) => {
            ops.push(Op::SetFontSize {
                size: Pt(run.font_size),
                font: font.clone(),
            });
            ops.push(Op::WriteText {
                items: vec![TextItem::Text(run.text.clone())],
                font,
            });
        }
    }
    ops.push(Op::EndTextSection);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, font: &str) -> TextRun {
        TextRun {
            text: text.into(),
            font: font.into(),
            font_size: 10.0,
            color: style::Color::BLACK,
            x: 0.0,
            width: 20.0,
            underline: Some(Decoration { offset: -1.25, width: 0.7 }),
            strike: None,
        }
    }

    #[test]
    fn render_empty_layout() {
        let bytes = render_pdf(&LayoutConfig::a4(), &FontManager::default()).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn render_styled_box() {
        let mut config = LayoutConfig::a4();
        config.info.title = "Styled".into();
        config.info.keywords = vec!["a".into(), "b".into()];
        let mut b = LayoutBox::new(56.69, 56.69, 400.0, 12.0);
        b.background_color = Some(style::Color::rgb(0.9, 0.9, 0.9));
        b.border = Some(BorderStyle {
            width: 1.0,
            color: style::Color::BLACK,
            padding: 2.0,
        });
        b.lines.push(TextLine {
            baseline: 8.5,
            runs: vec![run("caf\u{e9}", "Helvetica-Bold"), run("x", "NoSuchFace")],
        });
        b.marker = Some(run("\u{2022}", "Helvetica"));
        config.pages.push(PageLayout { page_index: 0, boxes: vec![b] });

        let bytes = render_pdf(&config, &FontManager::default()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn winlatin_maps_typographic_characters() {
        let bytes = to_winlatin("\u{2022}a\u{00A0}\u{4e2d}").into_bytes();
        assert_eq!(bytes, vec![0x95, b'a', b' ', b'?']);
    }
}
