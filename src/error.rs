//! Error types shared by every stage of a build.
//!
//! Configuration and content errors abort the current build; nothing is
//! written. Missing optional font faces are not errors (see
//! [`crate::fonts::FontManager::add_font_family`]).

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T, E = Md2PdfError> = std::result::Result<T, E>;

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Md2PdfError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("invalid configuration document: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("template error: {0}")]
    Template(String),

    #[error("serialisation failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A configuration references something that does not exist or is malformed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("style {0:?} not found")]
    StyleNotFound(String),

    #[error("font {0:?} is not registered")]
    FontNotFound(String),

    #[error("unknown style attribute {attribute:?} in style {style:?}")]
    UnknownStyleAttribute { style: String, attribute: String },

    #[error("invalid value {value:?} for {attribute:?} in style {style:?}")]
    InvalidStyleValue {
        style: String,
        attribute: String,
        value: String,
    },

    #[error("malformed report predicate: {0}")]
    MalformedPredicate(String),
}

/// The document content cannot be turned into flow elements.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("three-column block needs exactly 3 '#'-separated parts, got {found} in {text:?}")]
    ColumnCount { text: String, found: usize },

    #[error("attribute {attribute:?} is not a number: {value:?}")]
    InvalidNumber { attribute: String, value: String },

    #[error("unknown inline decoration {token:?} in {spec:?}")]
    UnknownDecoration { token: String, spec: String },
}

/// A file-backed resource could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("font file {} does not exist", .0.display())]
    FontFileMissing(PathBuf),

    #[error("font file {} could not be parsed: {reason}", .path.display())]
    InvalidFont { path: PathBuf, reason: String },
}
