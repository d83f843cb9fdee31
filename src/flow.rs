//! Flow elements and the builder that accumulates them for one document.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::fonts::FontManager;
use crate::inline::three_columns;
use crate::style::{ParagraphStyle, StyleSheet, StyleValue};

/// Marker style of a bullet list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulletType {
    #[default]
    Bullet,
    Decimal,
    LowerAlpha,
    UpperAlpha,
    LowerRoman,
    UpperRoman,
}

impl BulletType {
    /// `bullet`, `1`, `a`, `A`, `i` or `I`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bullet" => Some(BulletType::Bullet),
            "1" => Some(BulletType::Decimal),
            "a" => Some(BulletType::LowerAlpha),
            "A" => Some(BulletType::UpperAlpha),
            "i" => Some(BulletType::LowerRoman),
            "I" => Some(BulletType::UpperRoman),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BulletType::Bullet => "bullet",
            BulletType::Decimal => "1",
            BulletType::LowerAlpha => "a",
            BulletType::UpperAlpha => "A",
            BulletType::LowerRoman => "i",
            BulletType::UpperRoman => "I",
        }
    }

    /// Marker text of the item at zero-based `index`.
    pub fn label(&self, index: usize) -> String {
        let n = index + 1;
        match self {
            BulletType::Bullet => "\u{2022}".to_string(),
            BulletType::Decimal => format!("{n}."),
            BulletType::LowerAlpha => format!("{}.", alpha(n)),
            BulletType::UpperAlpha => format!("{}.", alpha(n).to_uppercase()),
            BulletType::LowerRoman => format!("{}.", roman(n)),
            BulletType::UpperRoman => format!("{}.", roman(n).to_uppercase()),
        }
    }
}

fn alpha(mut n: usize) -> String {
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
    }
    out.iter().rev().collect()
}

fn roman(mut n: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for (value, digits) in TABLE {
        while n >= value {
            out.push_str(digits);
            n -= value;
        }
    }
    out
}

/// A paragraph of markup text in a resolved style.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub text: String,
    pub style: ParagraphStyle,
}

impl Paragraph {
    /// Whitespace runs (including newlines) collapse to one space.
    pub fn new(text: &str, style: ParagraphStyle) -> Self {
        Self {
            text: text.split_ascii_whitespace().collect::<Vec<_>>().join(" "),
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowElement {
    Paragraph(Paragraph),
    Spacer {
        width: f32,
        height: f32,
        is_glue: bool,
    },
    BulletList {
        items: Vec<Paragraph>,
        bullet_type: BulletType,
    },
    /// Elements laid out on one page when they fit.
    KeepTogether(Vec<FlowElement>),
}

impl FlowElement {
    pub fn kind(&self) -> &'static str {
        match self {
            FlowElement::Paragraph(_) => "paragraph",
            FlowElement::Spacer { .. } => "spacer",
            FlowElement::BulletList { .. } => "bullet list",
            FlowElement::KeepTogether(_) => "keep-together",
        }
    }
}

/// Accumulates the flow of one build together with its style sheet and
/// font registry.
///
/// Elements appended with `keep_together` are held back until the next
/// element appended without it; that element closes the group and the whole
/// group is emitted as one [`FlowElement::KeepTogether`].
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    pub styles: StyleSheet,
    pub fonts: FontManager,
    elements: Vec<FlowElement>,
    keep_together: Vec<FlowElement>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // -- registration -------------------------------------------------------

    pub fn add_font(&mut self, name: &str, path: &Path, required: bool) -> Result<&mut Self> {
        self.fonts.add_font(name, path, required)?;
        Ok(self)
    }

    pub fn add_font_family(
        &mut self,
        name: &str,
        regular: &Path,
        italic: Option<&Path>,
        bold: Option<&Path>,
        bold_italic: Option<&Path>,
    ) -> Result<&mut Self> {
        self.fonts
            .add_font_family(name, regular, italic, bold, bold_italic)?;
        Ok(self)
    }

    /// Register a style from engine (camelCase) attributes. A `parent`
    /// attribute names an already registered style to inherit from.
    pub fn add_style(&mut self, name: &str, attributes: &BTreeMap<String, StyleValue>) -> Result<&mut Self> {
        let parent = match attributes.get("parent") {
            Some(p) => Some(self.styles.get(&p.to_string())?.clone()),
            None => None,
        };
        let style = ParagraphStyle::from_attributes(name, attributes, parent.as_ref())?;
        self.fonts.require(&style.font_name)?;
        if attributes.contains_key("bulletFontName") {
            self.fonts.require(&style.bullet_font_name)?;
        }
        log::debug!("registered style {name:?} ({} {})", style.font_name, style.font_size);
        self.styles.add(style);
        Ok(self)
    }

    fn style(&self, name: &str) -> std::result::Result<ParagraphStyle, ConfigError> {
        self.styles.get(name).cloned()
    }

    // -- builders -----------------------------------------------------------

    pub fn build_paragraph(&self, text: &str, style: &str) -> Result<FlowElement> {
        Ok(FlowElement::Paragraph(Paragraph::new(text, self.style(style)?)))
    }

    pub fn build_spacer(&self, width: f32, height: f32, is_glue: bool) -> FlowElement {
        FlowElement::Spacer {
            width,
            height,
            is_glue,
        }
    }

    pub fn build_list(&self, values: &[String], style: &str, bullet_type: BulletType) -> Result<FlowElement> {
        let style = self.style(style)?;
        Ok(FlowElement::BulletList {
            items: values
                .iter()
                .map(|v| Paragraph::new(v, style.clone()))
                .collect(),
            bullet_type,
        })
    }

    pub fn build_keep_together(&self, elements: Vec<FlowElement>) -> FlowElement {
        FlowElement::KeepTogether(elements)
    }

    // -- appenders ----------------------------------------------------------

    pub fn append_element(&mut self, element: FlowElement, keep_together: bool) {
        log::trace!("append {} (keep_together={keep_together})", element.kind());
        if keep_together {
            self.keep_together.push(element);
        } else if !self.keep_together.is_empty() {
            self.keep_together.push(element);
            let group = std::mem::take(&mut self.keep_together);
            self.elements.push(FlowElement::KeepTogether(group));
        } else {
            self.elements.push(element);
        }
    }

    pub fn append_paragraph(&mut self, text: &str, style: &str, keep_together: bool) -> Result<&mut Self> {
        let paragraph = self.build_paragraph(text, style)?;
        self.append_element(paragraph, keep_together);
        Ok(self)
    }

    pub fn append_spacer(&mut self, width: f32, height: f32, is_glue: bool, keep_together: bool) -> &mut Self {
        let spacer = self.build_spacer(width, height, is_glue);
        self.append_element(spacer, keep_together);
        self
    }

    /// Append a `left / center / right` line `size` characters wide.
    pub fn append_three_columns_paragraph(
        &mut self,
        parts: [&str; 3],
        size: i64,
        style: &str,
        keep_together: bool,
    ) -> Result<&mut Self> {
        let text = three_columns(parts, size);
        self.append_paragraph(&text, style, keep_together)
    }

    pub fn append_bullet_list(
        &mut self,
        values: &[String],
        style: &str,
        bullet_type: BulletType,
        keep_together: bool,
    ) -> Result<&mut Self> {
        let list = self.build_list(values, style, bullet_type)?;
        self.append_element(list, keep_together);
        Ok(self)
    }

    // -- access -------------------------------------------------------------

    /// Emitted elements, not counting a group still pending.
    pub fn elements(&self) -> &[FlowElement] {
        &self.elements
    }

    /// Elements held back by an open keep-together group.
    pub fn pending(&self) -> &[FlowElement] {
        &self.keep_together
    }

    /// Take the flow for layout. A group still pending is closed and
    /// emitted as a final keep-together element.
    pub fn finish(&mut self) -> Vec<FlowElement> {
        if !self.keep_together.is_empty() {
            log::debug!(
                "closing trailing keep-together group of {} elements",
                self.keep_together.len()
            );
            let group = std::mem::take(&mut self.keep_together);
            self.elements.push(FlowElement::KeepTogether(group));
        }
        std::mem::take(&mut self.elements)
    }
}
