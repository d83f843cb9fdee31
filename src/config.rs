//! Configuration model: fonts, named styles, report rules and defaults.
//!
//! A configuration is a TOML document:
//!
//! ```toml
//! [[fonts]]
//! name = "Body"
//! regular = "fonts/Body-Regular.ttf"
//!
//! [[styles]]
//! name = "Title"
//! font_size = 16
//! alignment = "TA_CENTER"
//!
//! [[reports]]
//! style = "Title"
//! attributes = [{ name = "id", value = "title" }]
//!
//! [defaults.style]
//! font_size = 10
//!
//! [defaults.report]
//! style = "Body"
//! ```
//!
//! Every section is optional; an empty document is a valid, empty config.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dom::Node;
use crate::error::{ConfigError, Result};
use crate::style::{camel_case_key, Alignment, Measure, StyleValue};

// ---------------------------------------------------------------------------
// Style
// ---------------------------------------------------------------------------

/// Generates [`Style`] from a fixed `field: type` table. Every field is
/// optional; the table order is the order attributes are handed to the
/// engine.
macro_rules! style_fields {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// A named bundle of typography attributes. All attributes are
        /// optional; absent ones fall back to the defaults style and then to
        /// the engine defaults.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct Style {
            #[serde(skip_serializing_if = "Option::is_none")]
            pub name: Option<String>,
            $(
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl Style {
            /// Configuration names of every typography attribute.
            pub const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            /// `{**defaults, **self}`: own values win, gaps are filled from
            /// `defaults`.
            pub fn merged_over(&self, defaults: &Style) -> Style {
                Style {
                    name: self.name.clone().or_else(|| defaults.name.clone()),
                    $($field: self.$field.clone().or_else(|| defaults.$field.clone()),)*
                }
            }

            /// Raw `(snake_case name, value)` pairs in table order.
            pub fn attributes(&self) -> Vec<(&'static str, Option<StyleValue>)> {
                vec![$((stringify!($field), self.$field.clone().map(StyleValue::from)),)*]
            }
        }
    };
}

style_fields! {
    font_name: String,
    font_size: f32,
    leading: f32,
    left_indent: f32,
    right_indent: f32,
    first_line_indent: f32,
    alignment: String,
    space_before: f32,
    space_after: f32,
    bullet_font_name: String,
    bullet_font_size: f32,
    bullet_indent: f32,
    text_color: String,
    back_color: String,
    word_wrap: String,
    border_width: f32,
    border_padding: f32,
    border_color: String,
    border_radius: f32,
    allow_widows: i64,
    allow_orphans: i64,
    text_transform: String,
    end_dots: String,
    split_long_words: i64,
    underline_width: Measure,
    bullet_anchor: String,
    justify_last_line: i64,
    justify_breaks: i64,
    space_shrinkage: f32,
    strike_width: Measure,
    underline_offset: Measure,
    underline_gap: f32,
    strike_offset: Measure,
    strike_gap: f32,
    link_underline: i64,
    hyphenation_lang: String,
    uri_waste_reduce: f32,
    embedded_hyphenation: i64,
}

impl Style {
    /// The alignment as an engine value. Unrecognised or absent names give
    /// `None`.
    pub fn resolved_alignment(&self) -> Option<Alignment> {
        self.alignment.as_deref().and_then(Alignment::from_symbol)
    }

    /// Engine attributes: camelCase keys, absent values dropped, alignment
    /// mapped to its engine constant.
    pub fn engine_attributes(&self) -> BTreeMap<String, StyleValue> {
        self.attributes()
            .into_iter()
            .filter_map(|(key, value)| {
                let value = if key == "alignment" {
                    self.resolved_alignment().map(StyleValue::Alignment)
                } else {
                    value
                };
                value.map(|v| (camel_case_key(key), v))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Fonts, reports, defaults
// ---------------------------------------------------------------------------

/// A font family. Paths are relative to the build's root directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Font {
    pub name: String,
    pub regular: String,
    pub bold: Option<String>,
    pub italic: Option<String>,
    pub bold_italic: Option<String>,
}

/// `(name, value)` predicate of a report rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportAttribute {
    pub name: String,
    pub value: String,
}

impl ReportAttribute {
    /// `tag` compares against the node tag, anything else against the node
    /// attribute of that name. A missing attribute never matches.
    pub fn matches(&self, node: &Node) -> bool {
        if self.name == "tag" {
            node.tag.as_str() == self.value
        } else {
            node.attribute(&self.name) == Some(self.value.as_str())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub style: Option<String>,
    pub attributes: Vec<ReportAttribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub style: Style,
    pub report: Report,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fonts: Vec<Font>,
    pub styles: Vec<Style>,
    pub reports: Vec<Report>,
    pub defaults: Defaults,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        loads_config(&text)
    }

    pub fn is_empty(&self) -> bool {
        *self == Config::default()
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        for (idx, report) in self.reports.iter().enumerate() {
            if let Some(attr) = report.attributes.iter().find(|a| a.name.trim().is_empty()) {
                return Err(ConfigError::MalformedPredicate(format!(
                    "report #{idx} has a predicate without a name (value {:?})",
                    attr.value
                )));
            }
        }
        Ok(())
    }
}

/// Read and parse a configuration from any reader.
pub fn load_config(mut reader: impl Read) -> Result<Config> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    loads_config(&text)
}

/// Parse a configuration from TOML text.
pub fn loads_config(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text)?;
    config.validate()?;
    log::debug!(
        "loaded config: {} fonts, {} styles, {} reports",
        config.fonts.len(),
        config.styles.len(),
        config.reports.len()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Md2PdfError;

    const CONFIG: &str = r#"
[[fonts]]
name = "Doc1Font"
regular = "fonts/Doc1-Regular.ttf"
bold = "fonts/Doc1-Bold.ttf"

[[styles]]
name = "Title"
font_name = "Doc1Font-Bold"
font_size = 16
space_after = 20
alignment = "TA_LEFT"

[[styles]]
name = "Body"
font_name = "Doc1Font"
underline_offset = "-0.125*F"

[[reports]]
style = "Title"
attributes = [{ name = "tag", value = "h1" }, { name = "id", value = "title" }]

[defaults.style]
font_size = 10
alignment = "TA_JUSTIFY"
allow_widows = 0

[defaults.report]
style = "Body"
"#;

    #[test]
    fn empty_document_is_empty_config() {
        let config = loads_config("").unwrap();
        assert!(config.is_empty());
        assert!(config.defaults.report.style.is_none());
    }

    #[test]
    fn sections_are_loaded_in_order() {
        let config = loads_config(CONFIG).unwrap();
        assert_eq!(config.fonts[0].name, "Doc1Font");
        assert_eq!(config.fonts[0].bold.as_deref(), Some("fonts/Doc1-Bold.ttf"));
        assert_eq!(config.fonts[0].italic, None);

        let names: Vec<_> = config.styles.iter().map(|s| s.name.as_deref()).collect();
        assert_eq!(names, vec![Some("Title"), Some("Body")]);
        assert_eq!(config.styles[0].font_size, Some(16.0));
        assert_eq!(config.styles[0].strike_width, None);
        assert_eq!(
            config.styles[1].underline_offset,
            Some(Measure::Expr("-0.125*F".to_string()))
        );

        assert_eq!(config.reports[0].attributes.len(), 2);
        assert_eq!(config.defaults.style.allow_widows, Some(0));
        assert_eq!(config.defaults.report.style.as_deref(), Some("Body"));
    }

    #[test]
    fn engine_attributes_are_camel_case_without_gaps() {
        let config = loads_config(CONFIG).unwrap();
        let merged = config.styles[0].merged_over(&config.defaults.style);
        let attrs = merged.engine_attributes();

        assert_eq!(attrs.get("fontName"), Some(&StyleValue::Text("Doc1Font-Bold".into())));
        assert_eq!(attrs.get("spaceAfter"), Some(&StyleValue::Number(20.0)));
        assert_eq!(attrs.get("allowWidows"), Some(&StyleValue::Integer(0)));
        assert_eq!(attrs.get("alignment"), Some(&StyleValue::Alignment(Alignment::Left)));
        assert!(!attrs.contains_key("leading"));
        assert!(!attrs.contains_key("name"));
    }

    #[test]
    fn unknown_alignment_is_dropped() {
        let style = Style {
            alignment: Some("TA_MIDDLE".to_string()),
            ..Style::default()
        };
        assert_eq!(style.resolved_alignment(), None);
        assert!(style.engine_attributes().is_empty());
    }

    #[test]
    fn nameless_predicate_is_rejected() {
        let err = loads_config("[[reports]]\nstyle = \"x\"\nattributes = [{ value = \"h1\" }]\n")
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::Config(ConfigError::MalformedPredicate(_))));
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = loads_config("[[styles]\nname = ").unwrap_err();
        assert!(matches!(err, Md2PdfError::Toml(_)));
    }

    #[test]
    fn field_table_covers_all_attributes() {
        assert_eq!(Style::FIELDS.len(), 38);
        assert_eq!(Style::default().attributes().len(), Style::FIELDS.len());
    }
}
