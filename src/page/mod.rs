//! Page model shared by the PDF backend and the in-memory surface.

pub mod memory;

use serde::Serialize;
use thiserror::Error;

use crate::fonts::{FontId, TextMeasure, estimate_text_width};
use crate::geometry::{Point, Rect, Rgb};
use crate::layout::{LINE_HEIGHT, lines_fit, wrap_text};

/// Portion of the font size above the baseline.
pub const ASCENT: f32 = 0.8;
/// Portion of the font size below the baseline.
pub const DESCENT: f32 = 0.2;

/// A styled run of text as laid out on the source page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFragment {
    pub text: String,
    pub bbox: Rect,
    /// Source font name as found in the document.
    pub font: String,
    pub size: f32,
    pub color: Rgb,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextLine {
    pub fragments: Vec<TextFragment>,
}

impl TextLine {
    pub fn bbox(&self) -> Option<Rect> {
        Rect::union_all(self.fragments.iter().map(|fragment| &fragment.bbox))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StructureCounts {
    pub blocks: usize,
    pub lines: usize,
    pub spans: usize,
}

/// Extracted text of one page in block, line, fragment order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageText {
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<TextBlock>,
    /// Bounding boxes of raster images drawn on the page.
    pub images: Vec<Rect>,
}

impl PageText {
    pub fn page_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    pub fn lines(&self) -> impl Iterator<Item = &TextLine> {
        self.blocks.iter().flat_map(|block| block.lines.iter())
    }

    pub fn fragments(&self) -> impl Iterator<Item = &TextFragment> {
        self.lines().flat_map(|line| line.fragments.iter())
    }

    pub fn structure(&self) -> StructureCounts {
        StructureCounts {
            blocks: self.blocks.len(),
            lines: self.lines().count(),
            spans: self.fragments().count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextStyle {
    pub font: FontId,
    pub size: f32,
    pub color: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextboxMode {
    /// Draw only when every line fits the box.
    Fit,
    /// Draw regardless, dropping lines that would leave the page.
    Force,
}

#[derive(Debug, Clone, Copy)]
pub struct TextboxRequest<'a> {
    pub rect: Rect,
    pub text: &'a str,
    pub style: TextStyle,
    pub mode: TextboxMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextboxOutcome {
    pub fits: bool,
    pub lines_drawn: usize,
    /// Height by which the wrapped text exceeds the box; zero when it fits.
    pub overflow: f32,
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("operation not supported by this surface: {0}")]
    Unsupported(&'static str),
    #[error("draw failed: {0}")]
    Draw(String),
    #[error("content stream error: {0}")]
    Encoding(String),
}

/// Drawing target for one page.
///
/// Coordinates use a top-left origin in points; implementations convert to
/// their native space.
pub trait PageSurface: TextMeasure {
    fn page_rect(&self) -> Rect;

    /// Removes the original glyphs inside `regions` without painting over
    /// anything else. Surfaces that cannot do this return
    /// [`SurfaceError::Unsupported`].
    fn erase_text(&mut self, regions: &[Rect]) -> Result<(), SurfaceError>;

    fn fill_rect(&mut self, rect: Rect, color: Rgb) -> Result<(), SurfaceError>;

    /// Draws a single line with its baseline starting at `origin`.
    fn insert_text(&mut self, origin: Point, text: &str, style: &TextStyle)
    -> Result<(), SurfaceError>;

    fn insert_textbox(&mut self, request: &TextboxRequest<'_>)
    -> Result<TextboxOutcome, SurfaceError>;
}

/// One wrapped line of a textbox with its baseline origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedLine {
    pub origin: Point,
    pub text: String,
    pub width: f32,
}

/// Result of laying out a textbox before anything is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct TextboxLayout {
    pub lines: Vec<PlacedLine>,
    pub fits: bool,
    pub overflow: f32,
}

/// Wraps `request.text` into its box and decides which lines get drawn.
///
/// In [`TextboxMode::Fit`] nothing is placed when the text does not fit; in
/// [`TextboxMode::Force`] every line whose glyphs stay on `page` is placed.
pub fn layout_textbox(
    request: &TextboxRequest<'_>,
    measure: &dyn TextMeasure,
    page: Rect,
) -> TextboxLayout {
    let style = request.style;
    let width_of = |text: &str| {
        measure
            .text_width(text, style.font, style.size)
            .unwrap_or_else(|| estimate_text_width(text, style.size))
    };
    let rect = request.rect;
    let wrapped = wrap_text(request.text, rect.width(), width_of);
    let fits = lines_fit(&wrapped, style.size, rect.width(), rect.height(), width_of);
    let line_height = style.size * LINE_HEIGHT;
    let overflow = (wrapped.len() as f32 * line_height - rect.height()).max(0.0);
    let overflow = if fits { 0.0 } else { overflow };

    if !fits && request.mode == TextboxMode::Fit {
        return TextboxLayout {
            lines: Vec::new(),
            fits,
            overflow,
        };
    }

    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(index, text)| PlacedLine {
            origin: Point::new(
                rect.x0,
                rect.y0 + index as f32 * line_height + style.size * ASCENT,
            ),
            width: width_of(&text),
            text,
        })
        .filter(|line| line.origin.y + style.size * DESCENT <= page.y1 + 1e-3)
        .collect();

    TextboxLayout {
        lines,
        fits,
        overflow,
    }
}

/// Glyph box of a single line drawn at `origin`.
pub fn line_bbox(origin: Point, width: f32, size: f32) -> Rect {
    Rect::new(
        origin.x,
        origin.y - size * ASCENT,
        origin.x + width,
        origin.y + size * DESCENT,
    )
}
