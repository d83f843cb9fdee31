//! Style resolver and the layout engine's paragraph styles.
//!
//! Configuration styles ([`crate::config::Style`]) are merged over the
//! document defaults with [`resolve_style`], translated to the engine's
//! camelCase attribute names, and registered in a [`StyleSheet`] as
//! [`ParagraphStyle`]s.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::config::Style;
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve a named style against the document defaults.
///
/// The result is `{**defaults, **style}`: the named style's own values win on
/// every key both declare.
pub fn resolve_style(name: &str, defaults: &Style, catalog: &[Style]) -> Result<Style, ConfigError> {
    let style = catalog
        .iter()
        .find(|s| s.name.as_deref() == Some(name))
        .ok_or_else(|| ConfigError::StyleNotFound(name.to_string()))?;
    Ok(style.merged_over(defaults))
}

static RE_CAMEL_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_([a-z])").expect("static regex"));

/// `space_before` → `spaceBefore`.
pub fn camel_case_key(key: &str) -> String {
    RE_CAMEL_CASE
        .replace_all(key, |caps: &Captures| caps[1].to_uppercase())
        .into_owned()
}

// ---------------------------------------------------------------------------
// Attribute values
// ---------------------------------------------------------------------------

/// Paragraph alignment understood by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    Left = 0,
    Center = 1,
    Right = 2,
    Justify = 4,
}

impl Alignment {
    /// Map a symbolic configuration name (`TA_LEFT`, ...) to an alignment.
    /// Unrecognised names yield `None` so the engine default applies.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "TA_LEFT" => Some(Alignment::Left),
            "TA_CENTER" => Some(Alignment::Center),
            "TA_RIGHT" => Some(Alignment::Right),
            "TA_JUSTIFY" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

/// A length that is either absolute points or an expression relative to the
/// font size, e.g. `"-0.125*F"` or `"10%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measure {
    Number(f32),
    Expr(String),
}

impl Measure {
    /// Evaluate against a font size. `None` when the expression is not one of
    /// the supported forms.
    pub fn resolve(&self, font_size: f32) -> Option<f32> {
        match self {
            Measure::Number(n) => Some(*n),
            Measure::Expr(expr) => {
                let expr = expr.trim();
                if expr.is_empty() {
                    None
                } else if let Some(factor) = expr.strip_suffix("*F") {
                    factor.trim().parse::<f32>().ok().map(|f| f * font_size)
                } else if let Some(pct) = expr.strip_suffix('%') {
                    pct.trim().parse::<f32>().ok().map(|p| p / 100.0 * font_size)
                } else {
                    expr.parse::<f32>().ok()
                }
            }
        }
    }
}

/// A style attribute value as handed to [`StyleSheet::add_style`].
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Number(f32),
    Integer(i64),
    Text(String),
    Alignment(Alignment),
}

impl From<f32> for StyleValue {
    fn from(v: f32) -> Self {
        StyleValue::Number(v)
    }
}

impl From<i64> for StyleValue {
    fn from(v: i64) -> Self {
        StyleValue::Integer(v)
    }
}

impl From<String> for StyleValue {
    fn from(v: String) -> Self {
        StyleValue::Text(v)
    }
}

impl From<&str> for StyleValue {
    fn from(v: &str) -> Self {
        StyleValue::Text(v.to_string())
    }
}

impl From<Alignment> for StyleValue {
    fn from(v: Alignment) -> Self {
        StyleValue::Alignment(v)
    }
}

impl From<Measure> for StyleValue {
    fn from(v: Measure) -> Self {
        match v {
            Measure::Number(n) => StyleValue::Number(n),
            Measure::Expr(e) => StyleValue::Text(e),
        }
    }
}

impl std::fmt::Display for StyleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StyleValue::Number(n) => write!(f, "{n}"),
            StyleValue::Integer(i) => write!(f, "{i}"),
            StyleValue::Text(s) => f.write_str(s),
            StyleValue::Alignment(a) => write!(f, "{a:?}"),
        }
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        if hex.len() == 6 {
            Some(Self::rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?))
        } else if hex.len() == 3 {
            Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            ))
        } else {
            None
        }
    }

    /// Parse `#rrggbb`, `#rgb`, `0xrrggbb` or a basic colour name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with('#') {
            return Self::from_hex(value);
        }
        if let Some(hex) = value.strip_prefix("0x") {
            return Self::from_hex(hex);
        }
        let named = match value.to_ascii_lowercase().as_str() {
            "black" => Self::BLACK,
            "white" => Self::rgb(1.0, 1.0, 1.0),
            "red" => Self::rgb(1.0, 0.0, 0.0),
            "green" => Self::rgb(0.0, 0.5, 0.0),
            "blue" => Self::rgb(0.0, 0.0, 1.0),
            "yellow" => Self::rgb(1.0, 1.0, 0.0),
            "orange" => Self::rgb(1.0, 0.647, 0.0),
            "purple" => Self::rgb(0.5, 0.0, 0.5),
            "navy" => Self::rgb(0.0, 0.0, 0.5),
            "maroon" => Self::rgb(0.5, 0.0, 0.0),
            "teal" => Self::rgb(0.0, 0.5, 0.5),
            "silver" => Self::rgb(0.753, 0.753, 0.753),
            "gray" | "grey" => Self::rgb(0.5, 0.5, 0.5),
            "darkgray" | "darkgrey" => Self::rgb(0.663, 0.663, 0.663),
            "lightgray" | "lightgrey" => Self::rgb(0.827, 0.827, 0.827),
            _ => return None,
        };
        Some(named)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextTransform {
    Uppercase,
    Lowercase,
    Capitalize,
}

impl TextTransform {
    pub fn apply(&self, text: &str) -> String {
        match self {
            TextTransform::Uppercase => text.to_uppercase(),
            TextTransform::Lowercase => text.to_lowercase(),
            TextTransform::Capitalize => {
                let mut out = String::with_capacity(text.len());
                let mut at_word_start = true;
                for c in text.chars() {
                    if at_word_start && c.is_alphabetic() {
                        out.extend(c.to_uppercase());
                    } else {
                        out.push(c);
                    }
                    at_word_start = c.is_whitespace();
                }
                out
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Engine-side paragraph style
// ---------------------------------------------------------------------------

/// Fully resolved paragraph style consumed by the layout engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParagraphStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: f32,
    /// Explicit leading; `None` means 1.2 × font size.
    pub leading: Option<f32>,
    pub left_indent: f32,
    pub right_indent: f32,
    pub first_line_indent: f32,
    pub alignment: Alignment,
    pub space_before: f32,
    pub space_after: f32,
    pub bullet_font_name: String,
    pub bullet_font_size: f32,
    pub bullet_indent: f32,
    pub text_color: Color,
    pub back_color: Option<Color>,
    pub border_width: f32,
    pub border_padding: f32,
    pub border_color: Option<Color>,
    pub border_radius: Option<f32>,
    pub allow_widows: bool,
    pub allow_orphans: bool,
    pub text_transform: Option<TextTransform>,
    pub split_long_words: bool,
    pub justify_last_line: bool,
    pub underline_width: Option<Measure>,
    pub underline_offset: Measure,
    pub underline_gap: f32,
    pub strike_width: Option<Measure>,
    pub strike_offset: Measure,
    pub strike_gap: f32,
    /// Accepted attributes the engine stores but does not act on.
    pub passive: BTreeMap<String, String>,
}

impl Default for ParagraphStyle {
    fn default() -> Self {
        Self {
            name: "Normal".to_string(),
            font_name: "Helvetica".to_string(),
            font_size: 10.0,
            leading: Some(12.0),
            left_indent: 0.0,
            right_indent: 0.0,
            first_line_indent: 0.0,
            alignment: Alignment::Left,
            space_before: 0.0,
            space_after: 0.0,
            bullet_font_name: "Helvetica".to_string(),
            bullet_font_size: 10.0,
            bullet_indent: 0.0,
            text_color: Color::BLACK,
            back_color: None,
            border_width: 0.0,
            border_padding: 0.0,
            border_color: None,
            border_radius: None,
            allow_widows: true,
            allow_orphans: false,
            text_transform: None,
            split_long_words: true,
            justify_last_line: false,
            underline_width: None,
            underline_offset: Measure::Expr("-0.125*F".to_string()),
            underline_gap: 1.0,
            strike_width: None,
            strike_offset: Measure::Expr("0.25*F".to_string()),
            strike_gap: 1.0,
            passive: BTreeMap::new(),
        }
    }
}

const PASSIVE_ATTRIBUTES: &[&str] = &[
    "wordWrap",
    "endDots",
    "bulletAnchor",
    "justifyBreaks",
    "spaceShrinkage",
    "linkUnderline",
    "hyphenationLang",
    "uriWasteReduce",
    "embeddedHyphenation",
];

impl ParagraphStyle {
    /// Build a style from engine (camelCase) attributes, starting from
    /// `parent` or the engine defaults.
    pub fn from_attributes(
        name: &str,
        attributes: &BTreeMap<String, StyleValue>,
        parent: Option<&ParagraphStyle>,
    ) -> Result<Self, ConfigError> {
        let mut style = parent.cloned().unwrap_or_default();
        style.name = name.to_string();
        if parent.is_none() && attributes.contains_key("fontSize") {
            style.leading = None;
        }
        for (key, value) in attributes {
            style.apply(key, value)?;
        }
        Ok(style)
    }

    /// Distance between consecutive baselines.
    pub fn line_height(&self) -> f32 {
        self.leading.unwrap_or(self.font_size * 1.2)
    }

    fn apply(&mut self, key: &str, value: &StyleValue) -> Result<(), ConfigError> {
        match key {
            "parent" => {}
            "fontName" => self.font_name = self.text(key, value),
            "fontSize" => self.font_size = self.number(key, value)?,
            "leading" => self.leading = Some(self.number(key, value)?),
            "leftIndent" => self.left_indent = self.number(key, value)?,
            "rightIndent" => self.right_indent = self.number(key, value)?,
            "firstLineIndent" => self.first_line_indent = self.number(key, value)?,
            "alignment" => self.alignment = self.alignment_value(key, value)?,
            "spaceBefore" => self.space_before = self.number(key, value)?,
            "spaceAfter" => self.space_after = self.number(key, value)?,
            "bulletFontName" => self.bullet_font_name = self.text(key, value),
            "bulletFontSize" => self.bullet_font_size = self.number(key, value)?,
            "bulletIndent" => self.bullet_indent = self.number(key, value)?,
            "textColor" => self.text_color = self.color(key, value)?,
            "backColor" => self.back_color = Some(self.color(key, value)?),
            "borderWidth" => self.border_width = self.number(key, value)?,
            "borderPadding" => self.border_padding = self.number(key, value)?,
            "borderColor" => self.border_color = Some(self.color(key, value)?),
            "borderRadius" => self.border_radius = Some(self.number(key, value)?),
            "allowWidows" => self.allow_widows = self.flag(key, value)?,
            "allowOrphans" => self.allow_orphans = self.flag(key, value)?,
            "textTransform" => {
                self.text_transform = match self.text(key, value).to_ascii_lowercase().as_str() {
                    "uppercase" => Some(TextTransform::Uppercase),
                    "lowercase" => Some(TextTransform::Lowercase),
                    "capitalize" => Some(TextTransform::Capitalize),
                    "" | "none" => None,
                    _ => return Err(self.invalid(key, value)),
                }
            }
            "splitLongWords" => self.split_long_words = self.flag(key, value)?,
            "justifyLastLine" => self.justify_last_line = self.flag(key, value)?,
            "underlineWidth" => self.underline_width = Some(self.measure(key, value)?),
            "underlineOffset" => self.underline_offset = self.measure(key, value)?,
            "underlineGap" => self.underline_gap = self.number(key, value)?,
            "strikeWidth" => self.strike_width = Some(self.measure(key, value)?),
            "strikeOffset" => self.strike_offset = self.measure(key, value)?,
            "strikeGap" => self.strike_gap = self.number(key, value)?,
            other if PASSIVE_ATTRIBUTES.contains(&other) => {
                self.passive.insert(other.to_string(), value.to_string());
            }
            other => {
                return Err(ConfigError::UnknownStyleAttribute {
                    style: self.name.clone(),
                    attribute: other.to_string(),
                })
            }
        }
        Ok(())
    }

    fn invalid(&self, key: &str, value: &StyleValue) -> ConfigError {
        ConfigError::InvalidStyleValue {
            style: self.name.clone(),
            attribute: key.to_string(),
            value: value.to_string(),
        }
    }

    fn text(&self, _key: &str, value: &StyleValue) -> String {
        value.to_string()
    }

    fn number(&self, key: &str, value: &StyleValue) -> Result<f32, ConfigError> {
        match value {
            StyleValue::Number(n) => Ok(*n),
            StyleValue::Integer(i) => Ok(*i as f32),
            StyleValue::Text(s) => s.trim().parse().map_err(|_| self.invalid(key, value)),
            StyleValue::Alignment(_) => Err(self.invalid(key, value)),
        }
    }

    fn flag(&self, key: &str, value: &StyleValue) -> Result<bool, ConfigError> {
        match value {
            StyleValue::Number(n) => Ok(*n != 0.0),
            StyleValue::Integer(i) => Ok(*i != 0),
            StyleValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" | "" => Ok(false),
                _ => Err(self.invalid(key, value)),
            },
            StyleValue::Alignment(_) => Err(self.invalid(key, value)),
        }
    }

    fn measure(&self, key: &str, value: &StyleValue) -> Result<Measure, ConfigError> {
        let measure = match value {
            StyleValue::Number(n) => Measure::Number(*n),
            StyleValue::Integer(i) => Measure::Number(*i as f32),
            StyleValue::Text(s) => Measure::Expr(s.clone()),
            StyleValue::Alignment(_) => return Err(self.invalid(key, value)),
        };
        match &measure {
            Measure::Expr(e) if !e.trim().is_empty() && measure.resolve(1.0).is_none() => {
                Err(self.invalid(key, value))
            }
            _ => Ok(measure),
        }
    }

    fn color(&self, key: &str, value: &StyleValue) -> Result<Color, ConfigError> {
        match value {
            StyleValue::Text(s) => Color::parse(s).ok_or_else(|| self.invalid(key, value)),
            _ => Err(self.invalid(key, value)),
        }
    }

    fn alignment_value(&self, key: &str, value: &StyleValue) -> Result<Alignment, ConfigError> {
        match value {
            StyleValue::Alignment(a) => Ok(*a),
            StyleValue::Integer(0) => Ok(Alignment::Left),
            StyleValue::Integer(1) => Ok(Alignment::Center),
            StyleValue::Integer(2) => Ok(Alignment::Right),
            StyleValue::Integer(4) => Ok(Alignment::Justify),
            StyleValue::Text(s) => Alignment::from_symbol(s).ok_or_else(|| self.invalid(key, value)),
            _ => Err(self.invalid(key, value)),
        }
    }
}

// ---------------------------------------------------------------------------
// Style sheet
// ---------------------------------------------------------------------------

/// Named paragraph styles registered for one build. Registering a name twice
/// replaces the earlier style.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    styles: HashMap<String, ParagraphStyle>,
}

impl StyleSheet {
    /// An empty sheet.
    pub fn empty() -> Self {
        Self {
            styles: HashMap::new(),
        }
    }

    pub fn add(&mut self, style: ParagraphStyle) {
        self.styles.insert(style.name.clone(), style);
    }

    pub fn get(&self, name: &str) -> Result<&ParagraphStyle, ConfigError> {
        self.styles
            .get(name)
            .ok_or_else(|| ConfigError::StyleNotFound(name.to_string()))
    }
}

/// The sample sheet every build starts from: `Normal`, `BodyText`, `Title`,
/// `Heading1`–`Heading3`, `Bullet` and `Code`.
impl Default for StyleSheet {
    fn default() -> Self {
        let normal = ParagraphStyle::default();
        let derive = |name: &str, f: &dyn Fn(&mut ParagraphStyle)| {
            let mut s = normal.clone();
            s.name = name.to_string();
            f(&mut s);
            s
        };

        let mut sheet = Self::empty();
        sheet.add(derive("BodyText", &|s| s.space_before = 6.0));
        sheet.add(derive("Title", &|s| {
            s.font_name = "Helvetica-Bold".to_string();
            s.font_size = 18.0;
            s.leading = Some(22.0);
            s.alignment = Alignment::Center;
            s.space_after = 6.0;
        }));
        sheet.add(derive("Heading1", &|s| {
            s.font_name = "Helvetica-Bold".to_string();
            s.font_size = 18.0;
            s.leading = Some(22.0);
            s.space_after = 6.0;
        }));
        sheet.add(derive("Heading2", &|s| {
            s.font_name = "Helvetica-Bold".to_string();
            s.font_size = 14.0;
            s.leading = Some(18.0);
            s.space_before = 12.0;
            s.space_after = 6.0;
        }));
        sheet.add(derive("Heading3", &|s| {
            s.font_name = "Helvetica-BoldOblique".to_string();
            s.font_size = 12.0;
            s.leading = Some(14.0);
            s.space_before = 12.0;
            s.space_after = 6.0;
        }));
        sheet.add(derive("Bullet", &|s| s.space_before = 3.0));
        sheet.add(derive("Code", &|s| {
            s.font_name = "Courier".to_string();
            s.font_size = 8.0;
            s.leading = Some(8.8);
            s.left_indent = 36.0;
        }));
        sheet.add(normal);
        sheet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(name: &str) -> Style {
        Style {
            name: Some(name.to_string()),
            ..Style::default()
        }
    }

    #[test]
    fn named_style_wins_over_defaults() {
        let defaults = Style {
            font_size: Some(10.0),
            space_before: Some(10.0),
            ..Style::default()
        };
        let catalog = vec![Style {
            font_size: Some(16.0),
            ..style("Title")
        }];

        let resolved = resolve_style("Title", &defaults, &catalog).unwrap();
        assert_eq!(resolved.font_size, Some(16.0));
        assert_eq!(resolved.space_before, Some(10.0));
        assert_eq!(resolved.name.as_deref(), Some("Title"));
    }

    #[test]
    fn missing_style_is_a_config_error() {
        let err = resolve_style("Nope", &Style::default(), &[]).unwrap_err();
        assert!(matches!(err, ConfigError::StyleNotFound(n) if n == "Nope"));
    }

    #[test]
    fn camel_case_conversion() {
        assert_eq!(camel_case_key("font_name"), "fontName");
        assert_eq!(camel_case_key("first_line_indent"), "firstLineIndent");
        assert_eq!(camel_case_key("leading"), "leading");
    }

    #[test]
    fn alignment_symbols() {
        assert_eq!(Alignment::from_symbol("TA_JUSTIFY"), Some(Alignment::Justify));
        assert_eq!(Alignment::from_symbol("TA_CENTER"), Some(Alignment::Center));
        assert_eq!(Alignment::from_symbol("centre"), None);
    }

    #[test]
    fn paragraph_style_from_attributes() {
        let mut attrs = BTreeMap::new();
        attrs.insert("fontName".to_string(), StyleValue::from("Courier"));
        attrs.insert("fontSize".to_string(), StyleValue::from(11_i64));
        attrs.insert("alignment".to_string(), StyleValue::from(Alignment::Justify));
        attrs.insert("textColor".to_string(), StyleValue::from("#ff0000"));
        attrs.insert("wordWrap".to_string(), StyleValue::from("CJK"));

        let style = ParagraphStyle::from_attributes("Body", &attrs, None).unwrap();
        assert_eq!(style.font_name, "Courier");
        assert_eq!(style.font_size, 11.0);
        assert!((style.line_height() - 13.2).abs() < 0.001);
        assert_eq!(style.alignment, Alignment::Justify);
        assert_eq!(style.text_color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(style.passive.get("wordWrap").map(String::as_str), Some("CJK"));
    }

    #[test]
    fn unknown_engine_attribute_is_rejected() {
        let mut attrs = BTreeMap::new();
        attrs.insert("fontWeight".to_string(), StyleValue::from("bold"));
        let err = ParagraphStyle::from_attributes("Body", &attrs, None).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStyleAttribute { .. }));
    }

    #[test]
    fn child_style_inherits_parent() {
        let sheet = StyleSheet::default();
        let parent = sheet.get("Title").unwrap();
        let mut attrs = BTreeMap::new();
        attrs.insert("fontSize".to_string(), StyleValue::from(20.0_f32));
        let child = ParagraphStyle::from_attributes("Big Title", &attrs, Some(parent)).unwrap();
        assert_eq!(child.font_name, "Helvetica-Bold");
        assert_eq!(child.alignment, Alignment::Center);
        assert_eq!(child.font_size, 20.0);
    }

    #[test]
    fn measures_resolve_against_font_size() {
        assert_eq!(Measure::Expr("-0.125*F".into()).resolve(8.0), Some(-1.0));
        assert_eq!(Measure::Expr("50%".into()).resolve(10.0), Some(5.0));
        assert_eq!(Measure::Number(2.0).resolve(10.0), Some(2.0));
        assert_eq!(Measure::Expr("wide".into()).resolve(10.0), None);
    }

    #[test]
    fn colours() {
        assert_eq!(Color::parse("#fff"), Some(Color::rgb(1.0, 1.0, 1.0)));
        assert_eq!(Color::parse("black"), Some(Color::BLACK));
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn non_ascii_hex_colour_is_rejected() {
        assert_eq!(Color::parse("#a€bc"), None);
        assert_eq!(Color::parse("#€"), None);
        assert_eq!(Color::parse("0xé1234"), None);

        let mut attrs = BTreeMap::new();
        attrs.insert("textColor".to_string(), StyleValue::from("#a€bc"));
        let err = ParagraphStyle::from_attributes("Odd", &attrs, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStyleValue { .. }), "{err:?}");
    }
}
