//! Pagination – flows laid-out blocks down a single frame per page.
//!
//! Handles:
//! - space before a block is dropped at the top of a page
//! - paragraphs split between lines, honouring orphan/widow control
//! - lists split between (and inside) items
//! - a spacer that does not fit ends the page and is dropped
//! - keep-together groups move to a fresh page when they fit on one

use crate::fonts::FontManager;
use crate::layout::{Block, Line, ParagraphBlock};
use crate::layout_config::*;
use crate::style::{Color, ParagraphStyle};

/// Default page margins in points (20 mm).
pub const PAGE_MARGIN_PT: f32 = 56.69;

const EPSILON: f32 = 0.01;

struct Paginator<'a> {
    fonts: &'a FontManager,
    left: f32,
    top: f32,
    width: f32,
    height: f32,
    pages: Vec<PageLayout>,
    current: Vec<LayoutBox>,
    /// Distance from the frame top already used on this page.
    cursor: f32,
}

impl<'a> Paginator<'a> {
    fn at_top(&self) -> bool {
        self.cursor <= EPSILON
    }

    fn remaining(&self) -> f32 {
        self.height - self.cursor
    }

    fn new_page(&mut self) {
        let boxes = std::mem::take(&mut self.current);
        log::trace!("page {} closed with {} boxes", self.pages.len() + 1, boxes.len());
        self.pages.push(PageLayout {
            page_index: self.pages.len(),
            boxes,
        });
        self.cursor = 0.0;
    }

    fn place(&mut self, block: &Block) {
        match block {
            Block::Paragraph(p) => self.place_paragraph(p),
            Block::Spacer { height } => {
                if *height <= self.remaining() + EPSILON {
                    self.cursor += height;
                } else {
                    self.new_page();
                }
            }
            Block::Group(blocks) => {
                let mut total = block.total_height();
                if self.at_top() {
                    total -= leading_space(blocks);
                }
                if total > self.remaining() + EPSILON && !self.at_top() {
                    let fresh = block.total_height() - leading_space(blocks);
                    if fresh <= self.height + EPSILON {
                        self.new_page();
                    } else {
                        log::debug!("keep-together group of {fresh:.1}pt exceeds a page, splitting");
                    }
                }
                for b in blocks {
                    self.place(b);
                }
            }
        }
    }

    fn place_paragraph(&mut self, p: &ParagraphBlock) {
        let style = &p.style;
        let lh = p.line_height();
        let total = p.lines.len();
        let mut start = 0;

        loop {
            let before = if start == 0 && !self.at_top() { style.space_before } else { 0.0 };
            let left = total - start;
            let fit = (((self.remaining() - before) / lh) + EPSILON).floor().max(0.0) as usize;

            if fit >= left {
                self.emit(p, start..total, before);
                self.cursor += style.space_after;
                return;
            }

            let mut n = fit;
            if !style.allow_orphans && start == 0 && n == 1 && total > 1 {
                n = 0;
            }
            if !style.allow_widows && n > 0 && left - n == 1 {
                n -= 1;
            }
            if n == 0 {
                if !self.at_top() {
                    self.new_page();
                    continue;
                }
                n = fit.max(1);
                if n >= left {
                    self.emit(p, start..total, before);
                    self.cursor += style.space_after;
                    return;
                }
            }
            self.emit(p, start..start + n, before);
            start += n;
            self.new_page();
        }
    }

    fn emit(&mut self, p: &ParagraphBlock, range: std::ops::Range<usize>, before: f32) {
        let style = &p.style;
        let lh = p.line_height();
        let first = range.start == 0;
        let count = range.len();

        let mut lbox = LayoutBox::new(
            self.left + p.indent,
            self.top + self.cursor + before,
            self.width - p.indent,
            count as f32 * lh,
        );
        lbox.style = style.name.clone();
        lbox.background_color = style.back_color;
        if style.border_width > 0.0 {
            lbox.border = Some(BorderStyle {
                width: style.border_width,
                color: style.border_color.unwrap_or(Color::BLACK),
                padding: style.border_padding,
            });
        }

        let baseline = baseline_offset(self.fonts, style);
        lbox.lines = p.lines[range]
            .iter()
            .enumerate()
            .map(|(i, line)| TextLine {
                baseline: i as f32 * lh + baseline,
                runs: runs(line, style),
            })
            .collect();

        if first {
            lbox.marker = p.marker.as_ref().map(|m| TextRun {
                text: m.text.clone(),
                font: m.face.clone(),
                font_size: m.font_size,
                color: style.text_color,
                x: m.x - p.indent,
                width: self.fonts.measure_text_width(&m.text, m.font_size, &m.face),
                underline: None,
                strike: None,
            });
        }

        self.cursor += before + lbox.height;
        self.current.push(lbox);
    }

    fn finish(mut self) -> Vec<PageLayout> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.new_page();
        }
        self.pages
    }
}

fn leading_space(blocks: &[Block]) -> f32 {
    match blocks.first() {
        Some(Block::Paragraph(p)) => p.style.space_before,
        Some(Block::Group(inner)) => leading_space(inner),
        _ => 0.0,
    }
}

/// Baseline of the first line below the line top, centring the face's
/// ascent/descent box inside the leading.
fn baseline_offset(fonts: &FontManager, style: &ParagraphStyle) -> f32 {
    let ascent = fonts.ascender(style.font_size, &style.font_name);
    let descent = fonts.descender(style.font_size, &style.font_name);
    (style.line_height() + ascent + descent) / 2.0
}

fn runs(line: &Line, style: &ParagraphStyle) -> Vec<TextRun> {
    let size = style.font_size;
    let underline = Decoration {
        offset: style.underline_offset.resolve(size).unwrap_or(-0.125 * size),
        width: style
            .underline_width
            .as_ref()
            .and_then(|m| m.resolve(size))
            .unwrap_or(size / 14.0),
    };
    let strike = Decoration {
        offset: style.strike_offset.resolve(size).unwrap_or(0.25 * size),
        width: style
            .strike_width
            .as_ref()
            .and_then(|m| m.resolve(size))
            .unwrap_or(size / 14.0),
    };
    line.fragments
        .iter()
        .map(|f| TextRun {
            text: f.text.clone(),
            font: f.face.clone(),
            font_size: size,
            color: style.text_color,
            x: f.x,
            width: f.width,
            underline: f.underline.then_some(underline),
            strike: f.strike.then_some(strike),
        })
        .collect()
}

/// Flow `blocks` into pages of `page_width` × `page_height` points with a
/// uniform `page_margin`. At least one (possibly blank) page is produced.
pub fn paginate(
    blocks: &[Block],
    page_width: f32,
    page_height: f32,
    page_margin: f32,
    fonts: &FontManager,
) -> LayoutConfig {
    let mut paginator = Paginator {
        fonts,
        left: page_margin,
        top: page_margin,
        width: page_width - 2.0 * page_margin,
        height: page_height - 2.0 * page_margin,
        pages: Vec::new(),
        current: Vec::new(),
        cursor: 0.0,
    };
    for block in blocks {
        paginator.place(block);
    }
    let pages = paginator.finish();
    log::debug!("paginated {} blocks into {} pages", blocks.len(), pages.len());

    LayoutConfig {
        info: DocumentInfo::default(),
        page_width_pt: page_width,
        page_height_pt: page_height,
        pages,
    }
}
