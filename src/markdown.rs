//! Markdown front-end: metadata header, `pulldown-cmark` events to HTML and
//! `{: ...}` attribute lists.

use std::fmt::Write as _;
use std::io::Read;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::Result;

/// Metadata header values: one value is a string, several are a list.
pub type Headers = Map<String, Value>;

static RE_META_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ ]{0,3}([A-Za-z0-9_-]+):\s*(.*)$").expect("static regex")
});

static RE_META_MORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ ]{4,}(.*)$").expect("static regex"));

static RE_ATTR_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.*?)(?:^|\s+)\{(:[^{}\n]*|[#.][^{}\n]*)\}\s*$").expect("static regex")
});

static RE_ATTR_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"#(?P<id>[^\s"'}]+)|\.(?P<class>[^\s"'}]+)|(?P<key>[\w-]+)=(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s"'}]+))"#,
    )
    .expect("static regex")
});

/// Converts Markdown to HTML and extracts its metadata header.
#[derive(Debug, Clone)]
pub struct MarkdownParser {
    options: Options,
}

impl MarkdownParser {
    pub fn new() -> Self {
        Self {
            options: Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH,
        }
    }

    /// `(html, headers)` for a Markdown document.
    pub fn parse(&self, text: &str) -> (String, Headers) {
        let (headers, body) = split_meta(text);
        let mut writer = HtmlWriter::default();
        for event in Parser::new_ext(body, self.options) {
            writer.event(event);
        }
        (writer.finish(), headers)
    }

    pub fn from_reader(&self, mut reader: impl Read) -> Result<(String, Headers)> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(self.parse(&text))
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Metadata header
// ---------------------------------------------------------------------------

/// Split a leading `key: value` block off `text`.
///
/// The block may be fenced by `---` (closed by `---` or `...`). Keys are
/// lower-cased; lines indented by four or more spaces continue the previous
/// key. The block ends at the first blank or non-matching line.
pub fn split_meta(text: &str) -> (Headers, &str) {
    let mut values: Vec<(String, Vec<String>)> = Vec::new();
    let mut rest = text;
    let mut first = true;

    while !rest.is_empty() {
        let (line, next) = match rest.find('\n') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };
        let line = line.trim_end_matches('\r');

        if first && line.trim() == "---" {
            first = false;
            rest = next;
            continue;
        }
        first = false;

        if line.trim().is_empty() {
            rest = next;
            break;
        }
        if matches!(line.trim(), "---" | "...") {
            rest = next;
            break;
        }
        if let Some(caps) = RE_META_KEY.captures(line) {
            values.push((caps[1].to_lowercase(), vec![caps[2].trim().to_string()]));
        } else if let (Some(caps), Some((_, last))) = (RE_META_MORE.captures(line), values.last_mut()) {
            last.push(caps[1].trim().to_string());
        } else {
            break;
        }
        rest = next;
    }

    let mut headers = Headers::new();
    for (key, mut vals) in values {
        let value = if vals.len() == 1 {
            Value::String(vals.remove(0))
        } else {
            Value::Array(vals.into_iter().map(Value::String).collect())
        };
        headers.insert(key, value);
    }
    (headers, rest)
}

// ---------------------------------------------------------------------------
// Attribute lists
// ---------------------------------------------------------------------------

/// Attributes declared by a `{: #id .class key=value }` list, in HTML
/// order: `id`, `class`, then the rest as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrList {
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub pairs: Vec<(String, String)>,
}

impl AttrList {
    pub fn parse(spec: &str) -> Self {
        let mut attrs = AttrList::default();
        for caps in RE_ATTR_TOKEN.captures_iter(spec) {
            if let Some(id) = caps.name("id") {
                attrs.id = Some(id.as_str().to_string());
            } else if let Some(class) = caps.name("class") {
                attrs.classes.push(class.as_str().to_string());
            } else if let Some(key) = caps.name("key") {
                let value = caps
                    .name("dq")
                    .or_else(|| caps.name("sq"))
                    .or_else(|| caps.name("bare"))
                    .map_or("", |m| m.as_str());
                attrs.pairs.push((key.as_str().to_string(), value.to_string()));
            }
        }
        attrs
    }

    /// Strip a trailing attribute list from block content.
    pub fn split_trailing(content: &str) -> (&str, Option<AttrList>) {
        match RE_ATTR_LIST.captures(content) {
            Some(caps) => {
                let body = caps.get(1).map_or("", |m| m.as_str());
                let spec = caps[2].trim_start_matches(':');
                (body, Some(AttrList::parse(spec)))
            }
            None => (content, None),
        }
    }

    fn write_html(&self, out: &mut String) {
        if let Some(id) = &self.id {
            let _ = write!(out, " id=\"{}\"", escape_attr(id));
        }
        if !self.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape_attr(&self.classes.join(" ")));
        }
        for (key, value) in &self.pairs {
            let _ = write!(out, " {key}=\"{}\"", escape_attr(value));
        }
    }
}

// ---------------------------------------------------------------------------
// HTML writer
// ---------------------------------------------------------------------------

/// Blocks that may carry an attribute list are written when they close.
struct Frame {
    tag: String,
    start: usize,
}

#[derive(Default)]
struct HtmlWriter {
    out: String,
    frames: Vec<Frame>,
    in_table_head: bool,
    in_image: bool,
}

impl HtmlWriter {
    fn event(&mut self, event: Event<'_>) {
        if self.in_image {
            if matches!(event, Event::End(TagEnd::Image)) {
                self.in_image = false;
            }
            return;
        }
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.out.push_str(&escape_text(&text)),
            Event::Code(code) => {
                let _ = write!(self.out, "<code>{}</code>", escape_text(&code));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.out.push_str(&html),
            Event::SoftBreak => self.out.push('\n'),
            Event::HardBreak => self.out.push_str("<br />\n"),
            Event::Rule => self.out.push_str("<hr />\n"),
            Event::TaskListMarker(checked) => self.out.push_str(if checked { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn open_frame(&mut self, tag: impl Into<String>) {
        self.frames.push(Frame {
            tag: tag.into(),
            start: self.out.len(),
        });
    }

    fn close_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let content = self.out.split_off(frame.start);
        let (body, attrs) = AttrList::split_trailing(&content);

        let _ = write!(self.out, "<{}", frame.tag);
        if let Some(attrs) = attrs {
            attrs.write_html(&mut self.out);
        }
        let _ = writeln!(self.out, ">{}</{}>", body.trim_end(), frame.tag);
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.open_frame("p"),
            Tag::Heading { level, .. } => self.open_frame(format!("{level}")),
            Tag::Item => self.open_frame("li"),
            Tag::List(Some(1)) => self.out.push_str("<ol>\n"),
            Tag::List(Some(start)) => {
                let _ = writeln!(self.out, "<ol start=\"{start}\">");
            }
            Tag::List(None) => self.out.push_str("<ul>\n"),
            Tag::BlockQuote(_) => self.out.push_str("<blockquote>\n"),
            Tag::CodeBlock(kind) => match kind {
                CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                    let _ = write!(self.out, "<pre><code class=\"language-{}\">", escape_attr(&lang));
                }
                _ => self.out.push_str("<pre><code>"),
            },
            Tag::Table(_) => self.out.push_str("<table>\n"),
            Tag::TableHead => {
                self.in_table_head = true;
                self.out.push_str("<thead>\n<tr>\n");
            }
            Tag::TableRow => self.out.push_str("<tr>\n"),
            Tag::TableCell => self.out.push_str(if self.in_table_head { "<th>" } else { "<td>" }),
            Tag::Emphasis => self.out.push_str("<em>"),
            Tag::Strong => self.out.push_str("<strong>"),
            Tag::Strikethrough => self.out.push_str("<del>"),
            Tag::Link { dest_url, .. } => {
                let _ = write!(self.out, "<a href=\"{}\">", escape_attr(&dest_url));
            }
            Tag::Image { dest_url, .. } => {
                let _ = write!(self.out, "<img src=\"{}\" />", escape_attr(&dest_url));
                self.in_image = true;
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item => self.close_frame(),
            TagEnd::List(true) => self.out.push_str("</ol>\n"),
            TagEnd::List(false) => self.out.push_str("</ul>\n"),
            TagEnd::BlockQuote(_) => self.out.push_str("</blockquote>\n"),
            TagEnd::CodeBlock => self.out.push_str("</code></pre>\n"),
            TagEnd::Table => self.out.push_str("</tbody>\n</table>\n"),
            TagEnd::TableHead => {
                self.in_table_head = false;
                self.out.push_str("</tr>\n</thead>\n<tbody>\n");
            }
            TagEnd::TableRow => self.out.push_str("</tr>\n"),
            TagEnd::TableCell => self.out.push_str(if self.in_table_head { "</th>\n" } else { "</td>\n" }),
            TagEnd::Emphasis => self.out.push_str("</em>"),
            TagEnd::Strong => self.out.push_str("</strong>"),
            TagEnd::Strikethrough => self.out.push_str("</del>"),
            TagEnd::Link => self.out.push_str("</a>"),
            _ => {}
        }
    }

    fn finish(mut self) -> String {
        while !self.frames.is_empty() {
            self.close_frame();
        }
        let len = self.out.trim_end().len();
        self.out.truncate(len);
        self.out
    }
}

/// Quotes are left alone so template expressions survive.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NO_HEADERS: &str = "# THE TITLE {: #the-title }\n\
                              \n\
                              ## The Subtitle {: #the-subtitle }\n\
                              \n\
                              * item 1\n\
                              * item 2\n\
                              \n\
                              this is a\n\
                              paragraph\n\
                              {: .the-paragraph }\n";

    const EXPECTED: &str = "<h1 id=\"the-title\">THE TITLE</h1>\n\
                            <h2 id=\"the-subtitle\">The Subtitle</h2>\n\
                            <ul>\n\
                            <li>item 1</li>\n\
                            <li>item 2</li>\n\
                            </ul>\n\
                            <p class=\"the-paragraph\">this is a\n\
                            paragraph</p>";

    #[test]
    fn empty_document() {
        let (html, headers) = MarkdownParser::new().parse("");
        assert_eq!(html, "");
        assert!(headers.is_empty());
    }

    #[test]
    fn attribute_lists_become_html_attributes() {
        let (html, headers) = MarkdownParser::new().parse(NO_HEADERS);
        assert_eq!(html, EXPECTED);
        assert!(headers.is_empty());
    }

    #[test]
    fn metadata_header_is_extracted() {
        let text = format!("name: The Name\nOrganization: The Organization\n\n{NO_HEADERS}");
        let (html, headers) = MarkdownParser::new().parse(&text);
        assert_eq!(html, EXPECTED);
        assert_eq!(headers["name"], Value::String("The Name".into()));
        assert_eq!(headers["organization"], Value::String("The Organization".into()));
    }

    #[test]
    fn fenced_header_with_continuation_lines() {
        let text = "---\ntitle: Report\nauthors: Ann\n    Bob\n---\nBody text\n";
        let (headers, body) = split_meta(text);
        assert_eq!(headers["title"], Value::String("Report".into()));
        assert_eq!(
            headers["authors"],
            Value::Array(vec![Value::String("Ann".into()), Value::String("Bob".into())])
        );
        assert_eq!(body, "Body text\n");
    }

    #[test]
    fn document_without_header_is_untouched() {
        let (headers, body) = split_meta("# Title\n\ntext\n");
        assert!(headers.is_empty());
        assert_eq!(body, "# Title\n\ntext\n");
    }

    #[test]
    fn attribute_list_tokens() {
        let attrs = AttrList::parse(r#" #t .a .3-columns size=73 style="italic,bold" x='y z' "#);
        assert_eq!(attrs.id.as_deref(), Some("t"));
        assert_eq!(attrs.classes, vec!["a", "3-columns"]);
        assert_eq!(
            attrs.pairs,
            vec![
                ("size".to_string(), "73".to_string()),
                ("style".to_string(), "italic,bold".to_string()),
                ("x".to_string(), "y z".to_string()),
            ]
        );
    }

    #[test]
    fn trailing_attribute_list_on_last_list_item() {
        let md = "* item1: value1\n* item2: value2\n{: .key-value}\n";
        let (html, _) = MarkdownParser::new().parse(md);
        assert_eq!(
            html,
            "<ul>\n<li>item1: value1</li>\n<li class=\"key-value\">item2: value2</li>\n</ul>"
        );
    }

    #[test]
    fn template_expressions_keep_their_quotes() {
        let (html, _) = MarkdownParser::new().parse("Say {{ bold('hi') }} & {{ italic(\"x\") }} 1 < 2\n");
        assert_eq!(html, "<p>Say {{ bold('hi') }} &amp; {{ italic(\"x\") }} 1 &lt; 2</p>");
    }

    #[test]
    fn braces_without_marker_are_text() {
        let (html, _) = MarkdownParser::new().parse("set {a, b}\n");
        assert_eq!(html, "<p>set {a, b}</p>");
    }

    #[test]
    fn attribute_list_needs_leading_space() {
        let parser = MarkdownParser::new();
        assert_eq!(parser.parse("count{#n}\n").0, "<p>count{#n}</p>");
        assert_eq!(parser.parse("Each {{#each}}\n").0, "<p>Each {{#each}}</p>");
        assert_eq!(parser.parse("{.note}\n").0, "<p class=\"note\"></p>");
        assert_eq!(parser.parse("Tagged {.note}\n").0, "<p class=\"note\">Tagged</p>");
    }

    #[test]
    fn inline_formatting() {
        let (html, _) = MarkdownParser::new().parse("**bold** and *it* ~~gone~~ `x<y`\n");
        assert_eq!(
            html,
            "<p><strong>bold</strong> and <em>it</em> <del>gone</del> <code>x&lt;y</code></p>"
        );
    }

    #[test]
    fn tables_are_rendered() {
        let (html, _) = MarkdownParser::new().parse("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.starts_with("<table>"));
        assert!(html.contains("<th>a</th>"));
        assert!(html.contains("<td>2</td>"));
    }
}
