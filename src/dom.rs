//! HTML reader – converts rendered HTML into a generic tag tree.
//!
//! We support the controlled subset produced by the markdown front-end:
//! - Block: p, h1-h6, ul, ol, li, table parts, div, blockquote, pre, hr
//! - Inline: em, strong, b, i, u, s, strike, del, code, a, span, br
//!
//! Block elements become [`Node`]s. Inline elements are folded into the
//! enclosing node's `value` as paragraph markup (`<b>`, `<i>`, `<u>`,
//! `<strike>`, `<br/>`); tags without a markup counterpart keep only their
//! text.

use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Tag tree types
// ---------------------------------------------------------------------------

/// The tag name of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Synthetic wrapper around a whole document.
    Root,
    P,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Ul,
    Ol,
    Li,
    Table,
    Thead,
    Tbody,
    Tr,
    Td,
    Th,
    Div,
    Blockquote,
    Pre,
    Hr,
    Em,
    Strong,
    B,
    I,
    U,
    S,
    Strike,
    Del,
    Code,
    A,
    Span,
    Br,
    Img,
    /// Catch-all for unknown tags – kept as blocks.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "data" => Tag::Root,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "h5" => Tag::H5,
            "h6" => Tag::H6,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "div" => Tag::Div,
            "blockquote" => Tag::Blockquote,
            "pre" => Tag::Pre,
            "hr" => Tag::Hr,
            "em" => Tag::Em,
            "strong" => Tag::Strong,
            "b" => Tag::B,
            "i" => Tag::I,
            "u" => Tag::U,
            "s" => Tag::S,
            "strike" => Tag::Strike,
            "del" => Tag::Del,
            "code" => Tag::Code,
            "a" => Tag::A,
            "span" => Tag::Span,
            "br" => Tag::Br,
            "img" => Tag::Img,
            other => Tag::Unknown(other.to_string()),
        }
    }

    /// Lower-case tag name as written in HTML.
    pub fn as_str(&self) -> &str {
        match self {
            Tag::Root => "data",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::H4 => "h4",
            Tag::H5 => "h5",
            Tag::H6 => "h6",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Table => "table",
            Tag::Thead => "thead",
            Tag::Tbody => "tbody",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Div => "div",
            Tag::Blockquote => "blockquote",
            Tag::Pre => "pre",
            Tag::Hr => "hr",
            Tag::Em => "em",
            Tag::Strong => "strong",
            Tag::B => "b",
            Tag::I => "i",
            Tag::U => "u",
            Tag::S => "s",
            Tag::Strike => "strike",
            Tag::Del => "del",
            Tag::Code => "code",
            Tag::A => "a",
            Tag::Span => "span",
            Tag::Br => "br",
            Tag::Img => "img",
            Tag::Unknown(name) => name,
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, Tag::H1 | Tag::H2 | Tag::H3 | Tag::H4 | Tag::H5 | Tag::H6)
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Tag::Em
                | Tag::Strong
                | Tag::B
                | Tag::I
                | Tag::U
                | Tag::S
                | Tag::Strike
                | Tag::Del
                | Tag::Code
                | Tag::A
                | Tag::Span
                | Tag::Br
                | Tag::Img
        )
    }

    fn is_void(&self) -> bool {
        matches!(self, Tag::Br | Tag::Img | Tag::Hr)
    }

    /// Paragraph markup tag an inline element folds into.
    fn markup(&self) -> Option<&'static str> {
        match self {
            Tag::Em | Tag::I => Some("i"),
            Tag::Strong | Tag::B => Some("b"),
            Tag::U => Some("u"),
            Tag::S | Tag::Strike | Tag::Del => Some("strike"),
            _ => None,
        }
    }
}

/// A node of the tag tree: tag, trimmed text value (paragraph markup),
/// attributes and block children.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub tag: Tag,
    pub value: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            value: String::new(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Parser – simple recursive descent over HTML
// ---------------------------------------------------------------------------

/// Raw parse tree, before inline folding.
#[derive(Debug, Clone)]
enum RawNode {
    Element(RawElement),
    Text(String),
}

#[derive(Debug, Clone)]
struct RawElement {
    tag: Tag,
    attributes: BTreeMap<String, String>,
    children: Vec<RawNode>,
}

/// Parse an HTML fragment into a tag tree rooted at a synthetic
/// [`Tag::Root`] node whose children are the fragment's top-level blocks.
pub fn html_to_tree(html: &str) -> Node {
    let mut parser = Parser::new(html);
    let root = RawElement {
        tag: Tag::Root,
        attributes: BTreeMap::new(),
        children: parser.parse_nodes(),
    };
    fold(&root)
}

fn fold(elem: &RawElement) -> Node {
    let mut node = Node::new(elem.tag.clone());
    node.attributes = elem.attributes.clone();

    let mut value = String::new();
    for child in &elem.children {
        collect(child, &mut value, &mut node.children);
    }
    node.value = value.trim().to_string();

    if node.tag == Tag::Li && node.value.is_empty() {
        node.value = node
            .children
            .iter()
            .filter(|c| c.tag == Tag::P)
            .map(|c| c.value.as_str())
            .collect::<Vec<_>>()
            .join(" ");
    }
    node
}

fn collect(raw: &RawNode, value: &mut String, blocks: &mut Vec<Node>) {
    match raw {
        RawNode::Text(text) => value.push_str(text),
        RawNode::Element(e) if e.tag == Tag::Br => value.push_str("<br/>"),
        RawNode::Element(e) if e.tag.is_inline() => {
            let markup = e.tag.markup();
            if let Some(m) = markup {
                value.push_str(&format!("<{m}>"));
            }
            for child in &e.children {
                collect(child, value, blocks);
            }
            if let Some(m) = markup {
                value.push_str(&format!("</{m}>"));
            }
        }
        RawNode::Element(e) => blocks.push(fold(e)),
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Names of the elements currently open, outermost first.
    open: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            open: Vec::new(),
        }
    }

    /// Children up to the closing tag of an open element. Closing tags that
    /// match nothing open are skipped.
    fn parse_nodes(&mut self) -> Vec<RawNode> {
        let mut nodes = Vec::new();
        while !self.eof() {
            if self.starts_with("</") {
                let name = self.closing_name();
                if self.open.iter().any(|open| *open == name) {
                    break;
                }
                if !name.is_empty() {
                    log::trace!("skipping unmatched </{name}>");
                    self.skip_past(">");
                    continue;
                }
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    /// Lower-cased name of the closing tag at the cursor.
    fn closing_name(&self) -> String {
        self.input[self.pos + 2..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ':'))
            .collect::<String>()
            .to_ascii_lowercase()
    }

    fn parse_node(&mut self) -> Option<RawNode> {
        if self.starts_with("<!--") {
            self.skip_past("-->");
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past(">");
            return None;
        }
        if self.starts_with("<") && self.next_is_tag_start() {
            Some(self.parse_element())
        } else {
            Some(self.parse_text())
        }
    }

    fn next_is_tag_start(&self) -> bool {
        self.input[self.pos + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn parse_text(&mut self) -> RawNode {
        let start = self.pos;
        self.advance();
        while !self.eof() && !self.starts_with("<") {
            self.advance();
        }
        RawNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self) -> RawNode {
        self.advance(); // '<'
        let name = self.parse_name().to_ascii_lowercase();
        let tag = Tag::from_name(&name);
        let mut elem = RawElement {
            tag,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        };

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if self.pos == before {
                // Stray character inside the tag.
                self.advance();
                continue;
            }
            elem.attributes.insert(key, value);
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return RawNode::Element(elem);
        }
        if self.starts_with(">") {
            self.advance();
        }
        if elem.tag.is_void() {
            return RawNode::Element(elem);
        }

        self.open.push(name);
        elem.children = self.parse_nodes();
        let name = self.open.pop().unwrap_or_default();

        // A closing tag for an outer element closes this one implicitly.
        if self.starts_with("</") && self.closing_name() == name {
            self.skip_past(">");
        }
        RawNode::Element(elem)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance();
        self.skip_whitespace();
        (key, self.parse_attr_value())
    }

    fn parse_attr_value(&mut self) -> String {
        let quote = if self.starts_with("\"") {
            Some('"')
        } else if self.starts_with("'") {
            Some('\'')
        } else {
            None
        };
        match quote {
            Some(q) => {
                self.advance();
                let start = self.pos;
                while !self.eof() && self.current_char() != q {
                    self.advance();
                }
                let value = decode_entities(&self.input[start..self.pos]);
                if !self.eof() {
                    self.advance();
                }
                value
            }
            None => {
                let start = self.pos;
                while !self.eof() {
                    let c = self.current_char();
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.advance();
                }
                decode_entities(&self.input[start..self.pos])
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn skip_past(&mut self, end: &str) {
        match self.input[self.pos..].find(end) {
            Some(idx) => self.pos += idx + end.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance(&mut self) {
        if let Some(c) = self.input[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Decode character references in one pass: `&amp;lt;` becomes `&lt;`, not
/// `<`. Unknown references are kept verbatim.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = rest[1..]
            .find(';')
            .filter(|&end| end > 0 && end <= 10)
            .and_then(|end| entity(&rest[1..1 + end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 2..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        _ => {
            let code = name.strip_prefix('#')?;
            let n = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(n)
        }
    }
}
