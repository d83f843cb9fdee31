//! `Md2Pdf` – the Markdown front-end over a [`DocumentBuilder`].
//!
//! A build is: [`Md2Pdf::setup`] with a configuration, one or more
//! `build_from_*` calls, then [`Md2Pdf::save`].

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::dom::{html_to_tree, Node, Tag};
use crate::error::{ConfigError, ContentError, Result};
use crate::flow::{BulletType, DocumentBuilder, FlowElement};
use crate::inline::{format_value, split_columns, Directives};
use crate::layout_config::{DocumentInfo, LayoutConfig};
use crate::markdown::{Headers, MarkdownParser};
use crate::pipeline::{generate_pdf, PipelineConfig};
use crate::report::find_report;
use crate::style::resolve_style;
use crate::templates::{JinjaEngine, TemplateEngine};

/// Metadata written into the PDF at save time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveMeta {
    pub title: String,
    /// Author and creator.
    pub name: String,
    pub version: String,
    pub keywords: Vec<String>,
}

impl SaveMeta {
    fn info(&self) -> DocumentInfo {
        DocumentInfo {
            title: self.title.clone(),
            author: self.name.clone(),
            creator: self.name.clone(),
            subject: format!("version=\"{}\"", self.version),
            keywords: self.keywords.clone(),
        }
    }
}

pub struct Md2Pdf {
    builder: DocumentBuilder,
    config: Config,
    root_dir: PathBuf,
    md_parser: MarkdownParser,
    templates: Box<dyn TemplateEngine + Send>,
    pipeline: PipelineConfig,
}

impl std::fmt::Debug for Md2Pdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Md2Pdf")
            .field("builder", &self.builder)
            .field("config", &self.config)
            .field("root_dir", &self.root_dir)
            .field("md_parser", &self.md_parser)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl Default for Md2Pdf {
    fn default() -> Self {
        Self::new()
    }
}

impl Md2Pdf {
    pub fn new() -> Self {
        Self {
            builder: DocumentBuilder::new(),
            config: Config::default(),
            root_dir: PathBuf::from("."),
            md_parser: MarkdownParser::new(),
            templates: Box::new(JinjaEngine::new()),
            pipeline: PipelineConfig::default(),
        }
    }

    /// Replace the template engine used by `build_from_html`.
    pub fn with_template_engine(mut self, engine: impl TemplateEngine + Send + 'static) -> Self {
        self.templates = Box::new(engine);
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Content hash of any serialisable value: the first 4 bytes of the
    /// SHA-256 of its JSON form, as 8 hex digits.
    pub fn version(data: &impl Serialize) -> Result<String> {
        let bytes = serde_json::to_vec(data)?;
        let digest = Sha256::digest(&bytes);
        Ok(digest[..4].iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Register the configuration's fonts (paths relative to `root_dir`) and
    /// styles (each merged over the defaults style).
    pub fn setup(&mut self, config: Config, root_dir: Option<&Path>) -> Result<&mut Self> {
        self.root_dir = root_dir.map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        for font in &config.fonts {
            let path = |p: &Option<String>| p.as_ref().map(|p| self.root_dir.join(p));
            let (italic, bold, bold_italic) = (path(&font.italic), path(&font.bold), path(&font.bold_italic));
            self.builder.add_font_family(
                &font.name,
                &self.root_dir.join(&font.regular),
                italic.as_deref(),
                bold.as_deref(),
                bold_italic.as_deref(),
            )?;
        }

        let defaults = &config.defaults.style;
        for (idx, style) in config.styles.iter().enumerate() {
            let name = style.name.as_deref().ok_or_else(|| ConfigError::InvalidStyleValue {
                style: format!("#{idx}"),
                attribute: "name".to_string(),
                value: String::new(),
            })?;
            let resolved = resolve_style(name, defaults, &config.styles)?;
            self.builder.add_style(name, &resolved.engine_attributes())?;
        }

        log::info!(
            "setup: {} font families, {} styles from {}",
            config.fonts.len(),
            config.styles.len(),
            self.root_dir.display()
        );
        self.config = config;
        Ok(self)
    }

    /// Translate the top-level children of a tag tree into flow elements.
    pub fn build_from_data(&mut self, data: &Node) -> Result<&mut Self> {
        for child in &data.children {
            let style = find_report(child, &self.config.reports, &self.config.defaults.report)
                .style_name()
                .to_string();
            let classes = child.classes();
            let directives = Directives::from_classes(&classes);
            let keep_together = directives.keep_together;

            match &child.tag {
                tag if tag.is_heading() || *tag == Tag::P => {
                    if directives.three_columns {
                        let parts = split_columns(&child.value)?;
                        let size = size_attribute(child)?;
                        self.builder
                            .append_three_columns_paragraph(parts, size, &style, keep_together)?;
                    } else {
                        let value = format_value(&child.value, &classes, child.attribute("style").unwrap_or(""));
                        self.builder.append_paragraph(&value, &style, keep_together)?;
                    }
                }
                Tag::Ul => {
                    // The last item decides the decoration of every item.
                    let (item_classes, key_style) = match child.children.last() {
                        Some(last) => (last.classes(), last.attribute("style").unwrap_or("")),
                        None => (Vec::new(), ""),
                    };
                    let values: Vec<String> = child
                        .children
                        .iter()
                        .map(|item| format_value(&item.value, &item_classes, key_style))
                        .collect();
                    self.builder
                        .append_bullet_list(&values, &style, BulletType::Bullet, keep_together)?;
                }
                other => log::trace!("skipping <{}> block", other.as_str()),
            }
        }
        Ok(self)
    }

    /// Render `text` as a template against `headers`, then build from the
    /// resulting HTML.
    pub fn build_from_html(&mut self, text: &str, headers: &Headers) -> Result<&mut Self> {
        let html = self.templates.render(text, headers)?;
        let tree = html_to_tree(&html);
        self.build_from_data(&tree)
    }

    pub fn build_from_md(&mut self, text: &str) -> Result<&mut Self> {
        let (html, headers) = self.md_parser.parse(text);
        self.build_from_html(&html, &headers)
    }

    pub fn build_from_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let (html, headers) = self.md_parser.from_reader(File::open(path.as_ref())?)?;
        self.build_from_html(&html, &headers)
    }

    /// Emitted flow elements, not counting a pending keep-together group.
    pub fn elements(&self) -> &[FlowElement] {
        self.builder.elements()
    }

    pub fn builder(&self) -> &DocumentBuilder {
        &self.builder
    }

    /// Lay out and render everything built so far. The flow is consumed.
    pub fn render(&mut self, meta: &SaveMeta) -> Result<(Vec<u8>, LayoutConfig)> {
        let flow = self.builder.finish();
        log::info!("rendering {} flow elements", flow.len());
        generate_pdf(&flow, &self.builder.fonts, &self.pipeline, meta.info())
    }

    pub fn save_to_writer(&mut self, mut writer: impl Write, meta: &SaveMeta) -> Result<LayoutConfig> {
        let (bytes, layout) = self.render(meta)?;
        writer.write_all(&bytes)?;
        Ok(layout)
    }

    pub fn save(&mut self, path: impl AsRef<Path>, meta: &SaveMeta) -> Result<LayoutConfig> {
        let path = path.as_ref();
        let layout = self.save_to_writer(File::create(path)?, meta)?;
        log::info!("wrote {} ({} pages)", path.display(), layout.pages.len());
        Ok(layout)
    }
}

/// The `size` attribute of a three-column block; absent means 0.
fn size_attribute(node: &Node) -> Result<i64> {
    match node.attribute("size") {
        None => Ok(0),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ContentError::InvalidNumber {
                attribute: "size".to_string(),
                value: raw.to_string(),
            }
            .into()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loads_config;
    use crate::error::Md2PdfError;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r#"
[[styles]]
name = "Doc1 Title"
font_name = "Helvetica-Bold"
font_size = 16
space_before = 0
space_after = 20
alignment = "TA_LEFT"

[[styles]]
name = "Doc1 subtitle"
font_name = "Helvetica-Bold"
font_size = 12
space_after = 10

[[styles]]
name = "Doc1 Body"
font_name = "Helvetica"

[[reports]]
style = "Doc1 Title"
attributes = [{ name = "id", value = "title" }]

[[reports]]
style = "Doc1 subtitle"
attributes = [{ name = "tag", value = "h2" }, { name = "class", value = "subtitle" }]

[defaults.style]
font_size = 10
alignment = "TA_JUSTIFY"

[defaults.report]
style = "Doc1 Body"
"#;

    const MD: &str = r#"# The title {: #title}

left#center#right
{: .3-columns size=73}

## The subtitle {: .subtitle}

The paragraph:

* item 1
* item 2
* item 3

Formatted: {{ underscore('underscore') }}, {{ italic('italic') }},
{{ bold('bold') }},  {{ bold(italic('bold-italic')) }}, {{ italic(bold('italic-bold')) }}

key: value
{: .key-value style="italic,bold,underscore" }

* item1: value1
* item2: value2
* item3: value3
{: .key-value}
"#;

    const MD_WITH_KEEP_TOGETHER: &str = "\
# The title {: #title .keep-together}

## The subtitle {: .subtitle .keep-together}

The paragraph:
{: .keep-together }

* item 1
* item 2
* item 3
";

    #[derive(Debug, PartialEq)]
    enum Seen {
        P(String, String),
        List(Vec<String>, BulletType, String),
        Keep(Vec<Seen>),
        Spacer,
    }

    fn p(text: &str, style: &str) -> Seen {
        Seen::P(text.to_string(), style.to_string())
    }

    fn list(items: &[&str], style: &str) -> Seen {
        Seen::List(
            items.iter().map(|s| s.to_string()).collect(),
            BulletType::Bullet,
            style.to_string(),
        )
    }

    fn seen(element: &FlowElement) -> Seen {
        match element {
            FlowElement::Paragraph(p) => Seen::P(p.text.clone(), p.style.name.clone()),
            FlowElement::BulletList { items, bullet_type } => Seen::List(
                items.iter().map(|i| i.text.clone()).collect(),
                *bullet_type,
                items.first().map(|i| i.style.name.clone()).unwrap_or_default(),
            ),
            FlowElement::KeepTogether(inner) => Seen::Keep(inner.iter().map(seen).collect()),
            FlowElement::Spacer { .. } => Seen::Spacer,
        }
    }

    fn doc() -> Md2Pdf {
        let mut doc = Md2Pdf::new();
        doc.setup(loads_config(CONFIG).unwrap(), None).unwrap();
        doc
    }

    #[test]
    fn markdown_to_flow() {
        let mut doc = doc();
        doc.build_from_md(MD).unwrap();
        let space = "&nbsp;".repeat(29);
        let got: Vec<Seen> = doc.elements().iter().map(seen).collect();
        assert_eq!(
            got,
            vec![
                p("The title", "Doc1 Title"),
                p(&format!("left{space}center{space}right"), "Doc1 Body"),
                p("The subtitle", "Doc1 subtitle"),
                p("The paragraph:", "Doc1 Body"),
                list(&["item 1", "item 2", "item 3"], "Doc1 Body"),
                p(
                    "Formatted: <u>underscore</u>, <i>italic</i>, <b>bold</b>, \
                     <b><i>bold-italic</i></b>, <i><b>italic-bold</b></i>",
                    "Doc1 Body"
                ),
                p("<u><b><i>key:</i></b></u> value", "Doc1 Body"),
                list(
                    &["<b>item1:</b> value1", "<b>item2:</b> value2", "<b>item3:</b> value3"],
                    "Doc1 Body"
                ),
            ]
        );
    }

    #[test]
    fn keep_together_groups_until_closed() {
        let mut doc = doc();
        doc.build_from_md(MD_WITH_KEEP_TOGETHER).unwrap();
        let got: Vec<Seen> = doc.elements().iter().map(seen).collect();
        assert_eq!(
            got,
            vec![Seen::Keep(vec![
                p("The title", "Doc1 Title"),
                // "subtitle keep-together" is not the class "subtitle"
                p("The subtitle", "Doc1 Body"),
                p("The paragraph:", "Doc1 Body"),
                list(&["item 1", "item 2", "item 3"], "Doc1 Body"),
            ])]
        );
    }

    #[test]
    fn title_and_list_scenario() {
        let mut doc = doc();
        doc.build_from_md("# Report {: #title}\n\n* a\n* b\n* c\n").unwrap();
        let got: Vec<Seen> = doc.elements().iter().map(seen).collect();
        assert_eq!(got, vec![p("Report", "Doc1 Title"), list(&["a", "b", "c"], "Doc1 Body")]);
    }

    #[test]
    fn styles_merge_over_defaults() {
        let doc = doc();
        let body = doc.builder().styles.get("Doc1 Body").unwrap();
        assert_eq!(body.font_size, 10.0);
        assert_eq!(body.alignment, crate::style::Alignment::Justify);
        let title = doc.builder().styles.get("Doc1 Title").unwrap();
        assert_eq!(title.alignment, crate::style::Alignment::Left);
    }

    #[test]
    fn headers_feed_templates() {
        let mut doc = doc();
        doc.build_from_md("Title: Quarterly\nAuthor: Ann\n\nBy {{ author }} for {{ title }}\n")
            .unwrap();
        let got: Vec<Seen> = doc.elements().iter().map(seen).collect();
        assert_eq!(got, vec![p("By Ann for Quarterly", "Doc1 Body")]);
    }

    #[test]
    fn three_columns_without_size_is_unpadded() {
        let mut doc = doc();
        doc.build_from_md("a#b#c\n{: .3-columns}\n").unwrap();
        let got: Vec<Seen> = doc.elements().iter().map(seen).collect();
        assert_eq!(got, vec![p("abc", "Doc1 Body")]);
    }

    #[test]
    fn content_errors_abort() {
        let err = doc().build_from_md("a#b\n{: .3-columns}\n").err().unwrap();
        assert!(matches!(err, Md2PdfError::Content(ContentError::ColumnCount { found: 2, .. })));

        let err = doc().build_from_md("a#b#c\n{: .3-columns size=wide}\n").err().unwrap();
        assert!(matches!(err, Md2PdfError::Content(ContentError::InvalidNumber { .. })));
    }

    #[test]
    fn missing_default_report_fails_on_first_block() {
        let mut doc = Md2Pdf::new();
        doc.setup(Config::default(), None).unwrap();
        let err = doc.build_from_md("text\n").err().unwrap();
        assert!(matches!(err, Md2PdfError::Config(ConfigError::StyleNotFound(ref s)) if s.is_empty()));
    }

    #[test]
    fn unknown_style_font_is_rejected() {
        let config = loads_config("[[styles]]\nname = \"X\"\nfont_name = \"Nope\"\n").unwrap();
        let err = Md2Pdf::new().setup(config, None).err().unwrap();
        assert!(matches!(err, Md2PdfError::Config(ConfigError::FontNotFound(_))));
    }

    #[test]
    fn version_is_stable_hex() {
        let config = loads_config(CONFIG).unwrap();
        let a = Md2Pdf::version(&config).unwrap();
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, Md2Pdf::version(&config).unwrap());
        assert_ne!(a, Md2Pdf::version(&Config::default()).unwrap());
    }

    #[test]
    fn save_writes_a_pdf() {
        let mut doc = doc();
        doc.build_from_md(MD_WITH_KEEP_TOGETHER).unwrap();
        let meta = SaveMeta {
            title: "Sample".into(),
            name: "Ann".into(),
            version: "abcd1234".into(),
            keywords: vec!["pdf".into()],
        };
        let mut out = Vec::new();
        let layout = doc.save_to_writer(&mut out, &meta).unwrap();
        assert_eq!(&out[0..5], b"%PDF-");
        assert_eq!(layout.info.subject, "version=\"abcd1234\"");
        assert_eq!(layout.info.creator, "Ann");
        assert_eq!(layout.pages.len(), 1);
        assert!(doc.elements().is_empty());
    }
}
