//! # md2pdf – Markdown + report configuration → paginated PDF
//!
//! The pipeline stages are:
//!
//! 1. **Markdown** – text + metadata header → HTML ([`markdown`])
//! 2. **Templates** – header values and helpers substituted ([`templates`])
//! 3. **Tag tree** – HTML → [`dom::Node`] tree ([`dom`])
//! 4. **Flow** – report matching and style resolution turn top-level nodes
//!    into paragraphs, lists and keep-together groups ([`document`],
//!    [`report`], [`style`], [`inline`], [`flow`])
//! 5. **Layout** – wrap lines and paginate into A4 pages ([`layout`],
//!    [`pagination`])
//! 6. **Render** – emit PDF bytes via printpdf ([`render`])
//!
//! ```no_run
//! use md2pdf::{loads_config, Md2Pdf, SaveMeta};
//!
//! let config = loads_config(&std::fs::read_to_string("config.toml")?)?;
//! let version = Md2Pdf::version(&config)?;
//! Md2Pdf::new()
//!     .setup(config, None)?
//!     .build_from_file("docs/sample.md")?
//!     .save("sample.pdf", &SaveMeta { version, ..SaveMeta::default() })?;
//! # Ok::<(), md2pdf::Md2PdfError>(())
//! ```

pub mod config;
pub mod document;
pub mod dom;
pub mod error;
pub mod flow;
pub mod fonts;
pub mod inline;
pub mod layout;
pub mod layout_config;
pub mod markdown;
pub mod pagination;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod style;
pub mod templates;

// Re-exports for convenience
pub use config::{load_config, loads_config, Config};
pub use document::{Md2Pdf, SaveMeta};
pub use error::{Md2PdfError, Result};
pub use pipeline::{generate_pdf, PageOrientation, PipelineConfig};
