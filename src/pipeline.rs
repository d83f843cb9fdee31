//! Pipeline – ties together layout, pagination, and rendering of a built
//! flow into a single function call.

use crate::error::Result;
use crate::flow::FlowElement;
use crate::fonts::FontManager;
use crate::layout::layout_flow;
use crate::layout_config::{DocumentInfo, LayoutConfig};
use crate::pagination::{paginate, PAGE_MARGIN_PT};
use crate::render::render_pdf;

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// Configuration for the PDF generation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Page margin in points (default: 20 mm).
    pub page_margin: f32,
    /// Swaps effective width/height when `Landscape`.
    pub orientation: PageOrientation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            page_margin: PAGE_MARGIN_PT,
            orientation: PageOrientation::Portrait,
        }
    }
}

impl PipelineConfig {
    pub fn effective_width(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_width,
            PageOrientation::Landscape => self.page_height,
        }
    }

    pub fn effective_height(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_height,
            PageOrientation::Landscape => self.page_width,
        }
    }

    pub fn a4_landscape() -> Self {
        Self {
            orientation: PageOrientation::Landscape,
            ..Self::default()
        }
    }

    /// Width available to text between the margins.
    pub fn frame_width(&self) -> f32 {
        self.effective_width() - 2.0 * self.page_margin
    }
}

/// Lay out and paginate a flow without rendering – useful for testing.
pub fn compute_layout_config(
    elements: &[FlowElement],
    fonts: &FontManager,
    config: &PipelineConfig,
    info: DocumentInfo,
) -> LayoutConfig {
    let blocks = layout_flow(elements, fonts, config.frame_width());
    let mut layout = paginate(
        &blocks,
        config.effective_width(),
        config.effective_height(),
        config.page_margin,
        fonts,
    );
    layout.info = info;
    layout
}

/// Full pipeline: flow → PDF bytes, returning the layout that was rendered.
pub fn generate_pdf(
    elements: &[FlowElement],
    fonts: &FontManager,
    config: &PipelineConfig,
    info: DocumentInfo,
) -> Result<(Vec<u8>, LayoutConfig)> {
    let layout = compute_layout_config(elements, fonts, config, info);
    let bytes = render_pdf(&layout, fonts)?;
    Ok((bytes, layout))
}
