use std::collections::HashSet;

use serde::Serialize;

use super::{
    PageSurface, PlacedLine, SurfaceError, TextStyle, TextboxMode, TextboxOutcome, TextboxRequest,
    layout_textbox, line_bbox,
};
use crate::fonts::{FontId, FontMetrics, TextMeasure, estimate_text_width};
use crate::geometry::{Point, Rect, Rgb};

/// Everything a [`MemorySurface`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SurfaceOp {
    Erase {
        regions: Vec<Rect>,
    },
    Fill {
        rect: Rect,
        color: Rgb,
    },
    Text {
        origin: Point,
        text: String,
        style: TextStyle,
        width: f32,
    },
    Textbox {
        rect: Rect,
        style: TextStyle,
        mode: TextboxMode,
        lines: Vec<PlacedLine>,
    },
}

/// A glyph line as it would appear on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawnLine {
    pub text: String,
    pub bbox: Rect,
    pub style: TextStyle,
}

/// Page surface that records operations instead of rendering them.
///
/// Used for dry runs and as the observable surface in tests.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    page: Rect,
    metrics: FontMetrics,
    ops: Vec<SurfaceOp>,
    transparent_erase: bool,
    failing_fonts: HashSet<FontId>,
}

impl MemorySurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            page: Rect::new(0.0, 0.0, width, height),
            metrics: FontMetrics::default(),
            ops: Vec::new(),
            transparent_erase: true,
            failing_fonts: HashSet::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: FontMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Makes `erase_text` report [`SurfaceError::Unsupported`].
    pub fn without_transparent_erase(mut self) -> Self {
        self.transparent_erase = false;
        self
    }

    /// Makes every draw with `font` fail.
    pub fn failing_font(mut self, font: FontId) -> Self {
        self.failing_fonts.insert(font);
        self
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<SurfaceOp> {
        self.ops
    }

    /// Every drawn line with its glyph box, in drawing order.
    pub fn drawn_lines(&self) -> Vec<DrawnLine> {
        let mut drawn = Vec::new();
        for op in &self.ops {
            match op {
                SurfaceOp::Text {
                    origin,
                    text,
                    style,
                    width,
                } => drawn.push(DrawnLine {
                    text: text.clone(),
                    bbox: line_bbox(*origin, *width, style.size),
                    style: *style,
                }),
                SurfaceOp::Textbox { style, lines, .. } => {
                    drawn.extend(lines.iter().map(|line| DrawnLine {
                        text: line.text.clone(),
                        bbox: line_bbox(line.origin, line.width, style.size),
                        style: *style,
                    }));
                }
                SurfaceOp::Erase { .. } | SurfaceOp::Fill { .. } => {}
            }
        }
        drawn
    }

    fn check_font(&self, font: FontId) -> Result<(), SurfaceError> {
        if self.failing_fonts.contains(&font) {
            return Err(SurfaceError::Draw(format!("font {font} unavailable")));
        }
        Ok(())
    }
}

impl TextMeasure for MemorySurface {
    fn text_width(&self, text: &str, font: FontId, size: f32) -> Option<f32> {
        self.metrics.text_width(text, font, size)
    }
}

impl PageSurface for MemorySurface {
    fn page_rect(&self) -> Rect {
        self.page
    }

    fn erase_text(&mut self, regions: &[Rect]) -> Result<(), SurfaceError> {
        if !self.transparent_erase {
            return Err(SurfaceError::Unsupported("transparent text removal"));
        }
        self.ops.push(SurfaceOp::Erase {
            regions: regions.to_vec(),
        });
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb) -> Result<(), SurfaceError> {
        self.ops.push(SurfaceOp::Fill { rect, color });
        Ok(())
    }

    fn insert_text(
        &mut self,
        origin: Point,
        text: &str,
        style: &TextStyle,
    ) -> Result<(), SurfaceError> {
        self.check_font(style.font)?;
        let width = self
            .metrics
            .text_width(text, style.font, style.size)
            .unwrap_or_else(|| estimate_text_width(text, style.size));
        self.ops.push(SurfaceOp::Text {
            origin,
            text: text.to_string(),
            style: *style,
            width,
        });
        Ok(())
    }

    fn insert_textbox(
        &mut self,
        request: &TextboxRequest<'_>,
    ) -> Result<TextboxOutcome, SurfaceError> {
        self.check_font(request.style.font)?;
        let layout = layout_textbox(request, &self.metrics, self.page);
        let outcome = TextboxOutcome {
            fits: layout.fits,
            lines_drawn: layout.lines.len(),
            overflow: layout.overflow,
        };
        if !layout.lines.is_empty() {
            self.ops.push(SurfaceOp::Textbox {
                rect: request.rect,
                style: request.style,
                mode: request.mode,
                lines: layout.lines,
            });
        }
        Ok(outcome)
    }
}
