//! Layout config – the frozen page description handed to the PDF writer.
//! Every glyph run is already positioned; rendering does no measuring.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::style::Color;

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub info: DocumentInfo,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PageLayout>,
}

/// PDF document information dictionary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
    pub creator: String,
    pub subject: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A placed paragraph (or the part of one that fits on this page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Style the box was laid out with, for debugging dumps.
    #[serde(default)]
    pub style: String,
    pub background_color: Option<Color>,
    pub border: Option<BorderStyle>,
    pub lines: Vec<TextLine>,
    pub marker: Option<TextRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: Color,
    /// Distance between the text and the border.
    pub padding: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Baseline, measured from the box top.
    pub baseline: f32,
    pub runs: Vec<TextRun>,
}

/// Text drawn in one face; `x` is relative to the box's left edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub font: String,
    pub font_size: f32,
    pub color: Color,
    pub x: f32,
    pub width: f32,
    pub underline: Option<Decoration>,
    pub strike: Option<Decoration>,
}

/// A horizontal rule drawn relative to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decoration {
    /// Positive is above the baseline.
    pub offset: f32,
    pub width: f32,
}

impl LayoutConfig {
    /// An empty A4 portrait layout.
    pub fn a4() -> Self {
        Self {
            info: DocumentInfo::default(),
            // 210mm × 297mm
            page_width_pt: 595.28,
            page_height_pt: 841.89,
            pages: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// All text on `page`, one entry per line, runs joined by spaces.
    pub fn page_text(&self, page: usize) -> Vec<String> {
        self.pages
            .get(page)
            .map(|p| {
                p.boxes
                    .iter()
                    .flat_map(|b| b.lines.iter())
                    .map(|l| l.runs.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join(" "))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            style: String::new(),
            background_color: None,
            border: None,
            lines: Vec::new(),
            marker: None,
        }
    }
}
