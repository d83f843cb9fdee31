//! Paragraph layout – turns flow elements into measured blocks of lines.
//!
//! Paragraph text is a small markup language: `<b>`, `<i>`, `<u>`,
//! `<strike>` (or `<s>`), `<br/>` and character entities. Whitespace runs
//! collapse to one space; `&nbsp;` is a non-breaking space. Lines are filled
//! greedily, measuring every fragment in its own face.

use std::sync::LazyLock;

use regex::Regex;

use crate::dom::decode_entities;
use crate::flow::{FlowElement, Paragraph};
use crate::fonts::FontManager;
use crate::style::{Alignment, ParagraphStyle};

/// Extra left indent of list items; the marker sits in this gutter.
pub const LIST_INDENT: f32 = 18.0;

const EPSILON: f32 = 0.01;

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<\s*(/?)\s*([A-Za-z][A-Za-z0-9]*)\b[^<>]*?(/?)\s*>").expect("static regex")
});

// ---------------------------------------------------------------------------
// Markup
// ---------------------------------------------------------------------------

/// A run of text sharing one set of decorations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Span(Span),
    Break,
}

#[derive(Debug, Clone, Copy, Default)]
struct Depth {
    bold: u32,
    italic: u32,
    underline: u32,
    strike: u32,
}

impl Depth {
    fn span(&self, text: String) -> Span {
        Span {
            text,
            bold: self.bold > 0,
            italic: self.italic > 0,
            underline: self.underline > 0,
            strike: self.strike > 0,
        }
    }

    fn counter(&mut self, tag: &str) -> Option<&mut u32> {
        match tag {
            "b" | "strong" => Some(&mut self.bold),
            "i" | "em" => Some(&mut self.italic),
            "u" => Some(&mut self.underline),
            "strike" | "s" | "del" => Some(&mut self.strike),
            _ => None,
        }
    }
}

/// Tokenise paragraph markup. Unknown tags are dropped; a `<` that does not
/// start a tag is text.
pub fn parse_markup(markup: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut depth = Depth::default();
    let mut text = String::new();
    let mut rest = markup;

    let flush = |text: &mut String, depth: &Depth, tokens: &mut Vec<Token>| {
        if !text.is_empty() {
            tokens.push(Token::Span(depth.span(decode_entities(text))));
            text.clear();
        }
    };

    while let Some(pos) = rest.find('<') {
        text.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let Some(caps) = RE_TAG.captures(rest) else {
            text.push('<');
            rest = &rest[1..];
            continue;
        };
        let whole = caps.get(0).map_or(1, |m| m.end());
        let closing = !caps[1].is_empty();
        let self_closing = !caps[3].is_empty();
        let name = caps[2].to_ascii_lowercase();

        flush(&mut text, &depth, &mut tokens);
        if name == "br" {
            tokens.push(Token::Break);
        } else if let Some(counter) = depth.counter(&name) {
            if closing {
                *counter = counter.saturating_sub(1);
            } else if !self_closing {
                *counter += 1;
            }
        } else {
            log::trace!("ignoring unsupported inline tag <{name}>");
        }
        rest = &rest[whole..];
    }
    text.push_str(rest);
    flush(&mut text, &depth, &mut tokens);
    tokens
}

// ---------------------------------------------------------------------------
// Measured lines
// ---------------------------------------------------------------------------

/// A fragment of text placed on a line; `x` is relative to the line start.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedFragment {
    pub text: String,
    pub face: String,
    pub x: f32,
    pub width: f32,
    pub underline: bool,
    pub strike: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    pub fragments: Vec<PlacedFragment>,
    pub width: f32,
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    face: String,
    width: f32,
    underline: bool,
    strike: bool,
}

#[derive(Debug, Clone, Default)]
struct Word {
    pieces: Vec<Piece>,
    width: f32,
    /// Width of the space separating this word from the previous one.
    gap: f32,
}

enum Item {
    Word(Word),
    Break,
}

struct Measurer<'a> {
    fonts: &'a FontManager,
    style: &'a ParagraphStyle,
}

impl Measurer<'_> {
    fn face(&self, span: &Span) -> String {
        self.fonts
            .resolve_face(&self.style.font_name, span.bold, span.italic)
            .to_string()
    }

    fn width(&self, text: &str, face: &str) -> f32 {
        self.fonts.measure_text_width(text, self.style.font_size, face)
    }

    fn words(&self, tokens: &[Token]) -> Vec<Item> {
        let mut items = Vec::new();
        let mut word = Word::default();
        // Face of the whitespace run preceding the next word.
        let mut pending_gap: Option<String> = None;
        let mut seen_word = false;

        for token in tokens {
            let span = match token {
                Token::Break => {
                    if !word.pieces.is_empty() {
                        items.push(Item::Word(std::mem::take(&mut word)));
                    }
                    items.push(Item::Break);
                    pending_gap = None;
                    seen_word = false;
                    continue;
                }
                Token::Span(span) => span,
            };

            let text = match self.style.text_transform {
                Some(t) => t.apply(&span.text),
                None => span.text.clone(),
            };
            let face = self.face(span);

            for c in text.chars() {
                if c.is_ascii_whitespace() {
                    if !word.pieces.is_empty() {
                        items.push(Item::Word(std::mem::take(&mut word)));
                    }
                    if seen_word {
                        pending_gap = Some(face.clone());
                    }
                    continue;
                }
                if word.pieces.is_empty() {
                    if let Some(gap_face) = pending_gap.take() {
                        word.gap = self.width(" ", &gap_face);
                    }
                }
                seen_word = true;
                match word.pieces.last_mut() {
                    Some(p) if p.face == face && p.underline == span.underline && p.strike == span.strike => {
                        p.text.push(c)
                    }
                    _ => word.pieces.push(Piece {
                        text: c.to_string(),
                        face: face.clone(),
                        width: 0.0,
                        underline: span.underline,
                        strike: span.strike,
                    }),
                }
            }
        }
        if !word.pieces.is_empty() {
            items.push(Item::Word(word));
        }

        for item in &mut items {
            if let Item::Word(w) = item {
                for p in &mut w.pieces {
                    p.width = self.width(&p.text, &p.face);
                }
                w.width = w.pieces.iter().map(|p| p.width).sum();
            }
        }
        items
    }

    /// Cut a word wider than `avail` into pieces that fit, one character at
    /// least per piece.
    fn split_word(&self, word: Word, avail: f32) -> Vec<Word> {
        let mut out = Vec::new();
        let mut current = Word {
            gap: word.gap,
            ..Word::default()
        };
        for piece in word.pieces {
            for c in piece.text.chars() {
                let w = self.width(&c.to_string(), &piece.face);
                if !current.pieces.is_empty() && current.width + w > avail + EPSILON {
                    out.push(std::mem::take(&mut current));
                }
                current.width += w;
                match current.pieces.last_mut() {
                    Some(p) if p.face == piece.face && p.underline == piece.underline && p.strike == piece.strike => {
                        p.text.push(c);
                        p.width += w;
                    }
                    _ => current.pieces.push(Piece {
                        text: c.to_string(),
                        face: piece.face.clone(),
                        width: w,
                        underline: piece.underline,
                        strike: piece.strike,
                    }),
                }
            }
        }
        if !current.pieces.is_empty() {
            out.push(current);
        }
        out
    }
}

struct RawLine {
    words: Vec<Word>,
    /// Ended by `<br/>` rather than by wrapping or the paragraph end.
    forced: bool,
}

/// Wrap and align a paragraph into lines.
///
/// `width` is the frame width; the style's indents are applied inside it.
pub fn layout_paragraph(paragraph: &Paragraph, fonts: &FontManager, width: f32) -> Vec<Line> {
    let style = &paragraph.style;
    let measure = Measurer { fonts, style };
    let avail = (width - style.left_indent - style.right_indent).max(1.0);
    let first_avail = (avail - style.first_line_indent).max(1.0);

    let mut lines: Vec<RawLine> = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut current_width = 0.0f32;

    let line_avail = |lines: &Vec<RawLine>| if lines.is_empty() { first_avail } else { avail };

    let mut queue: Vec<Item> = measure.words(&parse_markup(&paragraph.text));
    queue.reverse();

    while let Some(item) = queue.pop() {
        match item {
            Item::Break => {
                lines.push(RawLine {
                    words: std::mem::take(&mut current),
                    forced: true,
                });
                current_width = 0.0;
            }
            Item::Word(word) => {
                let limit = line_avail(&lines);
                let gap = if current.is_empty() { 0.0 } else { word.gap };

                if !current.is_empty() && current_width + gap + word.width > limit + EPSILON {
                    lines.push(RawLine {
                        words: std::mem::take(&mut current),
                        forced: false,
                    });
                    current_width = 0.0;
                    queue.push(Item::Word(word));
                    continue;
                }
                if current.is_empty() && word.width > limit + EPSILON && style.split_long_words {
                    let mut parts = measure.split_word(word, limit);
                    if parts.len() > 1 {
                        parts.reverse();
                        queue.extend(parts.into_iter().map(|mut w| {
                            w.gap = 0.0;
                            Item::Word(w)
                        }));
                        continue;
                    }
                    if let Some(w) = parts.pop() {
                        current_width = w.width;
                        current.push(w);
                    }
                    continue;
                }
                current_width += gap + word.width;
                current.push(word);
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(RawLine {
            words: current,
            forced: false,
        });
    }

    let count = lines.len();
    lines
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| {
            let last = idx + 1 == count || raw.forced;
            let indent = if idx == 0 { style.first_line_indent } else { 0.0 };
            let limit = if idx == 0 { first_avail } else { avail };
            place_line(raw.words, style, indent, limit, last)
        })
        .collect()
}

fn place_line(words: Vec<Word>, style: &ParagraphStyle, indent: f32, limit: f32, last: bool) -> Line {
    let natural: f32 = words
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.width } else { w.gap + w.width })
        .sum();
    let slack = (limit - natural).max(0.0);
    let gaps = words.len().saturating_sub(1);

    let (offset, extra) = match style.alignment {
        Alignment::Left => (0.0, 0.0),
        Alignment::Center => (slack / 2.0, 0.0),
        Alignment::Right => (slack, 0.0),
        Alignment::Justify if gaps > 0 && (!last || style.justify_last_line) => (0.0, slack / gaps as f32),
        Alignment::Justify => (0.0, 0.0),
    };

    let mut x = style.left_indent + indent + offset;
    let mut fragments = Vec::new();
    for (i, word) in words.into_iter().enumerate() {
        if i > 0 {
            x += word.gap + extra;
        }
        for piece in word.pieces {
            let width = piece.width;
            fragments.push(PlacedFragment {
                text: piece.text,
                face: piece.face,
                x,
                width,
                underline: piece.underline,
                strike: piece.strike,
            });
            x += width;
        }
    }
    Line {
        fragments,
        width: natural + extra * gaps as f32,
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// List marker drawn in the gutter left of an item.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub text: String,
    pub face: String,
    pub font_size: f32,
    /// Relative to the frame's left edge.
    pub x: f32,
}

/// A laid-out paragraph, ready to be placed in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphBlock {
    pub lines: Vec<Line>,
    pub style: ParagraphStyle,
    /// Horizontal shift of the whole block (list indentation).
    pub indent: f32,
    pub marker: Option<Marker>,
}

impl ParagraphBlock {
    pub fn line_height(&self) -> f32 {
        self.style.line_height()
    }

    pub fn height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(ParagraphBlock),
    Spacer { height: f32 },
    /// Blocks to keep on one page.
    Group(Vec<Block>),
}

impl Block {
    /// Height including vertical spacing, as if placed mid-page.
    pub fn total_height(&self) -> f32 {
        match self {
            Block::Paragraph(p) => p.style.space_before + p.height() + p.style.space_after,
            Block::Spacer { height } => *height,
            Block::Group(blocks) => blocks.iter().map(Block::total_height).sum(),
        }
    }
}

/// Lay out a whole flow for a frame `width` points wide.
pub fn layout_flow(elements: &[FlowElement], fonts: &FontManager, width: f32) -> Vec<Block> {
    let mut blocks = Vec::new();
    for element in elements {
        layout_element(element, fonts, width, &mut blocks);
    }
    blocks
}

fn layout_element(element: &FlowElement, fonts: &FontManager, width: f32, out: &mut Vec<Block>) {
    match element {
        FlowElement::Paragraph(p) => out.push(Block::Paragraph(ParagraphBlock {
            lines: layout_paragraph(p, fonts, width),
            style: p.style.clone(),
            indent: 0.0,
            marker: None,
        })),
        FlowElement::Spacer { height, .. } => out.push(Block::Spacer { height: *height }),
        FlowElement::BulletList { items, bullet_type } => {
            for (idx, item) in items.iter().enumerate() {
                let style = &item.style;
                let marker = Marker {
                    text: bullet_type.label(idx),
                    face: style.bullet_font_name.clone(),
                    font_size: style.bullet_font_size,
                    x: style.left_indent + style.bullet_indent,
                };
                out.push(Block::Paragraph(ParagraphBlock {
                    lines: layout_paragraph(item, fonts, width - LIST_INDENT),
                    style: style.clone(),
                    indent: LIST_INDENT,
                    marker: Some(marker),
                }));
            }
        }
        FlowElement::KeepTogether(inner) => {
            let mut group = Vec::new();
            for e in inner {
                layout_element(e, fonts, width, &mut group);
            }
            out.push(Block::Group(group));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::BulletType;
    use pretty_assertions::assert_eq;

    fn style() -> ParagraphStyle {
        ParagraphStyle::default()
    }

    fn texts(line: &Line) -> String {
        line.fragments.iter().map(|f| f.text.as_str()).collect::<Vec<_>>().join("|")
    }

    #[test]
    fn markup_tokens() {
        let tokens = parse_markup("a <b>b<i>c</i></b><br/><u>d &amp;lt;</u> 1 < 2 <font x=1>e</font>");
        assert_eq!(
            tokens,
            vec![
                Token::Span(Span { text: "a ".into(), ..Span::default() }),
                Token::Span(Span { text: "b".into(), bold: true, ..Span::default() }),
                Token::Span(Span { text: "c".into(), bold: true, italic: true, ..Span::default() }),
                Token::Break,
                Token::Span(Span { text: "d &lt;".into(), underline: true, ..Span::default() }),
                Token::Span(Span { text: " 1 < 2 ".into(), ..Span::default() }),
                Token::Span(Span { text: "e".into(), ..Span::default() }),
            ]
        );
    }

    #[test]
    fn short_paragraph_is_one_line() {
        let fonts = FontManager::default();
        let p = Paragraph::new("Hello <b>world</b>", style());
        let lines = layout_paragraph(&p, &fonts, 400.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(texts(&lines[0]), "Hello|world");
        assert_eq!(lines[0].fragments[1].face, "Helvetica-Bold");
        // 5 × 5 + space 5 + 5 × 5.5
        assert!((lines[0].width - 57.5).abs() < 0.01);
    }

    #[test]
    fn words_glued_across_markup_stay_together() {
        let fonts = FontManager::default();
        let p = Paragraph::new("<b>key:</b>value next", style());
        // "key:value" = 4 × 5.5 + 5 × 5 = 47 wide, fits in 50 but "next" does not.
        let lines = layout_paragraph(&p, &fonts, 50.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(texts(&lines[0]), "key:|value");
        assert_eq!(texts(&lines[1]), "next");
    }

    #[test]
    fn non_breaking_spaces_do_not_wrap() {
        let fonts = FontManager::default();
        let p = Paragraph::new("left&nbsp;&nbsp;right", style());
        let lines = layout_paragraph(&p, &fonts, 20.0);
        assert_eq!(lines.len(), 3); // split_long_words cuts the single word
        let p = Paragraph::new("left right", style());
        assert_eq!(layout_paragraph(&p, &fonts, 30.0).len(), 2);
    }

    #[test]
    fn hard_break_forces_a_line() {
        let fonts = FontManager::default();
        let p = Paragraph::new("one<br/>two", style());
        let lines = layout_paragraph(&p, &fonts, 500.0);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn alignment_offsets() {
        let fonts = FontManager::default();
        let mut s = style();
        s.alignment = Alignment::Center;
        let lines = layout_paragraph(&Paragraph::new("abcd", s.clone()), &fonts, 100.0);
        assert!((lines[0].fragments[0].x - 40.0).abs() < 0.01);

        s.alignment = Alignment::Right;
        let lines = layout_paragraph(&Paragraph::new("abcd", s), &fonts, 100.0);
        assert!((lines[0].fragments[0].x - 80.0).abs() < 0.01);
    }

    #[test]
    fn justify_stretches_all_but_last_line() {
        let fonts = FontManager::default();
        let mut s = style();
        s.alignment = Alignment::Justify;
        let p = Paragraph::new("aa bb cc dd ee ff", s);
        let lines = layout_paragraph(&p, &fonts, 42.0);
        assert!(lines.len() > 1);
        assert!((lines[0].width - 42.0).abs() < 0.01);
        assert!(lines.last().unwrap().width < 42.0);
    }

    #[test]
    fn text_transform_applies() {
        let fonts = FontManager::default();
        let mut s = style();
        s.text_transform = Some(crate::style::TextTransform::Uppercase);
        let lines = layout_paragraph(&Paragraph::new("shout", s), &fonts, 200.0);
        assert_eq!(texts(&lines[0]), "SHOUT");
    }

    #[test]
    fn list_items_get_markers_and_indent() {
        let fonts = FontManager::default();
        let items = vec![Paragraph::new("one", style()), Paragraph::new("two", style())];
        let blocks = layout_flow(
            &[FlowElement::BulletList { items, bullet_type: BulletType::Decimal }],
            &fonts,
            300.0,
        );
        assert_eq!(blocks.len(), 2);
        let Block::Paragraph(second) = &blocks[1] else { panic!("expected paragraph") };
        assert_eq!(second.indent, LIST_INDENT);
        assert_eq!(second.marker.as_ref().map(|m| m.text.as_str()), Some("2."));
    }

    #[test]
    fn keep_together_becomes_a_group() {
        let fonts = FontManager::default();
        let flow = vec![FlowElement::KeepTogether(vec![
            FlowElement::Paragraph(Paragraph::new("a", style())),
            FlowElement::Spacer { width: 0.0, height: 30.0, is_glue: false },
        ])];
        let blocks = layout_flow(&flow, &fonts, 300.0);
        let Block::Group(inner) = &blocks[0] else { panic!("expected group") };
        assert_eq!(inner.len(), 2);
        assert!((blocks[0].total_height() - 42.0).abs() < 0.01);
    }
}
