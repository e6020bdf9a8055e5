//! Content-stream interpretation: a simplified text and graphics state
//! machine that locates every text-showing operator on a page.

use std::collections::{HashMap, HashSet};

use lopdf::content::Operation;
use lopdf::{Document, Encoding, Object, decode_text_string};
use crate::fonts::{FontContext, FontId, TextMeasure, estimate_text_width};
use crate::geometry::{Rect, Rgb};
use crate::page::{ASCENT, DESCENT};

pub(crate) type Matrix = [f32; 6];

pub(crate) const IDENTITY_MATRIX: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Kerning (thousandths of an em) beyond which a TJ gap reads as a space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// `a` then `b`: the matrix product `a x b` in PDF row-vector convention.
pub(crate) fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

pub(crate) fn apply(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

/// What the interpreter needs to know about one font resource.
#[derive(Debug, Default)]
pub(crate) struct FontResource<'a> {
    pub(crate) base_font: String,
    /// Code-to-text mapping resolved by lopdf, `ToUnicode` CMaps included.
    pub(crate) encoding: Option<Encoding<'a>>,
    pub(crate) first_char: u32,
    /// Glyph widths in 1/1000 em, indexed from `first_char`.
    pub(crate) widths: Vec<f32>,
    /// Two-byte codes (composite fonts).
    pub(crate) two_byte: bool,
    /// CID widths from the descendant font's `/W`.
    pub(crate) cid_widths: HashMap<u32, f32>,
    /// The descendant's `/DW`; `None` without a descendant font.
    pub(crate) default_width: Option<f32>,
}

impl FontResource<'_> {
    pub(crate) fn decode(&self, bytes: &[u8]) -> String {
        self.encoding
            .as_ref()
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
            .unwrap_or_else(|| decode_plain(bytes))
    }

    fn cid_width(&self, code: u32) -> Option<f32> {
        self.cid_widths.get(&code).copied().or(self.default_width)
    }
}

/// Strings shown without a known font encoding: PDFDocEncoding unless a
/// byte order mark says otherwise.
pub(crate) fn decode_plain(bytes: &[u8]) -> String {
    decode_text_string(&Object::string_literal(bytes))
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
}

#[derive(Debug, Default)]
pub(crate) struct PageResources<'a> {
    pub(crate) fonts: HashMap<Vec<u8>, FontResource<'a>>,
    pub(crate) images: HashSet<Vec<u8>>,
}

/// Page geometry: the MediaBox as `[llx, lly, urx, ury]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageBox(pub(crate) [f32; 4]);

impl PageBox {
    pub(crate) fn width(&self) -> f32 {
        (self.0[2] - self.0[0]).abs()
    }

    pub(crate) fn height(&self) -> f32 {
        (self.0[3] - self.0[1]).abs()
    }

    /// PDF user space to top-left page space.
    pub(crate) fn to_page(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.0[0], self.0[3] - y)
    }

    /// Top-left page space to PDF user space.
    pub(crate) fn to_user(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.0[0], self.0[3] - y)
    }
}

/// How a text-showing operator positioned its glyphs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ShowKind {
    Tj,
    TjArray,
    /// `'`: next line, then show.
    NextLine,
    /// `"`: set word/char spacing, next line, then show.
    NextLineSpaced { word_spacing: f32, char_spacing: f32 },
}

/// One text-showing operator found in the content stream.
#[derive(Debug, Clone)]
pub(crate) struct ShowRecord {
    pub(crate) op_index: usize,
    pub(crate) kind: ShowKind,
    pub(crate) text: String,
    /// Glyph box in top-left page space.
    pub(crate) bbox: Rect,
    pub(crate) font_name: String,
    /// Rendered size after text and graphics scaling.
    pub(crate) size: f32,
    pub(crate) color: Rgb,
    /// Horizontal displacement in unscaled text space, including Th.
    pub(crate) advance: f32,
    /// Font size operand of the active `Tf`.
    pub(crate) font_size: f32,
    pub(crate) horiz_scale: f32,
}

#[derive(Debug, Default)]
pub(crate) struct ContentScan {
    pub(crate) shows: Vec<ShowRecord>,
    pub(crate) images: Vec<Rect>,
}

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    fill: Rgb,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY_MATRIX,
            fill: Rgb::BLACK,
        }
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font_key: Vec<u8>,
    font_size: f32,
    text_matrix: Matrix,
    line_matrix: Matrix,
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        let new_tx = self.line_matrix[0] * tx + self.line_matrix[2] * ty + self.line_matrix[4];
        let new_ty = self.line_matrix[1] * tx + self.line_matrix[3] * ty + self.line_matrix[5];
        self.line_matrix[4] = new_tx;
        self.line_matrix[5] = new_ty;
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }
}

/// Walks `ops` and records every text show and image placement.
pub(crate) struct Interpreter<'a> {
    resources: &'a PageResources<'a>,
    fonts: &'a FontContext,
    page: PageBox,
    graphics: GraphicsState,
    stack: Vec<GraphicsState>,
    text: TextState,
    scan: ContentScan,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(resources: &'a PageResources<'a>, fonts: &'a FontContext, page: PageBox) -> Self {
        Self {
            resources,
            fonts,
            page,
            graphics: GraphicsState::default(),
            stack: Vec::new(),
            text: TextState::default(),
            scan: ContentScan::default(),
        }
    }

    pub(crate) fn run(mut self, ops: &[Operation]) -> ContentScan {
        for (index, op) in ops.iter().enumerate() {
            self.step(index, op);
        }
        self.scan
    }

    fn step(&mut self, index: usize, op: &Operation) {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => self.stack.push(self.graphics),
            "Q" => {
                if let Some(previous) = self.stack.pop() {
                    self.graphics = previous;
                }
            }
            "cm" => {
                let values = numbers(operands);
                if values.len() == 6 {
                    let m = [values[0], values[1], values[2], values[3], values[4], values[5]];
                    self.graphics.ctm = multiply(&m, &self.graphics.ctm);
                }
            }
            "g" => {
                if let Some(level) = operands.first().and_then(number) {
                    self.graphics.fill = Rgb::from_gray(level);
                }
            }
            "rg" => {
                let values = numbers(operands);
                if values.len() == 3 {
                    self.graphics.fill = Rgb::from_components(values[0], values[1], values[2]);
                }
            }
            "k" => {
                let values = numbers(operands);
                if values.len() == 4 {
                    self.graphics.fill = Rgb::from_cmyk(values[0], values[1], values[2], values[3]);
                }
            }
            "sc" | "scn" => {
                let values = numbers(operands);
                self.graphics.fill = match values.as_slice() {
                    [gray] => Rgb::from_gray(*gray),
                    [r, g, b] => Rgb::from_components(*r, *g, *b),
                    [c, m, y, k] => Rgb::from_cmyk(*c, *m, *y, *k),
                    _ => self.graphics.fill,
                };
            }
            "cs" => self.graphics.fill = Rgb::BLACK,
            "BT" => {
                self.text.text_matrix = IDENTITY_MATRIX;
                self.text.line_matrix = IDENTITY_MATRIX;
            }
            "Tf" => {
                if let (Some(Object::Name(key)), Some(size)) =
                    (operands.first(), operands.get(1).and_then(number))
                {
                    self.text.font_key = key.clone();
                    self.text.font_size = size;
                }
            }
            "Tm" => {
                let values = numbers(operands);
                if values.len() == 6 {
                    let m = [values[0], values[1], values[2], values[3], values[4], values[5]];
                    self.text.text_matrix = m;
                    self.text.line_matrix = m;
                }
            }
            "Td" => {
                let values = numbers(operands);
                if values.len() == 2 {
                    self.text.translate_line(values[0], values[1]);
                }
            }
            "TD" => {
                let values = numbers(operands);
                if values.len() == 2 {
                    self.text.leading = -values[1];
                    self.text.translate_line(values[0], values[1]);
                }
            }
            "T*" => self.text.next_line(),
            "TL" => {
                if let Some(value) = operands.first().and_then(number) {
                    self.text.leading = value;
                }
            }
            "Tc" => {
                if let Some(value) = operands.first().and_then(number) {
                    self.text.char_spacing = value;
                }
            }
            "Tw" => {
                if let Some(value) = operands.first().and_then(number) {
                    self.text.word_spacing = value;
                }
            }
            "Tz" => {
                if let Some(value) = operands.first().and_then(number) {
                    self.text.horiz_scale = value / 100.0;
                }
            }
            "Ts" => {
                if let Some(value) = operands.first().and_then(number) {
                    self.text.text_rise = value;
                }
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(index, ShowKind::Tj, &[ShowPart::Bytes(bytes)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let parts: Vec<ShowPart<'_>> = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(ShowPart::Bytes(bytes)),
                            other => number(other).map(ShowPart::Kern),
                        })
                        .collect();
                    self.show(index, ShowKind::TjArray, &parts);
                }
            }
            "'" => {
                self.text.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(index, ShowKind::NextLine, &[ShowPart::Bytes(bytes)]);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac), Some(Object::String(bytes, _))) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                    operands.get(2),
                ) {
                    self.text.word_spacing = aw;
                    self.text.char_spacing = ac;
                    self.text.next_line();
                    let kind = ShowKind::NextLineSpaced {
                        word_spacing: aw,
                        char_spacing: ac,
                    };
                    self.show(index, kind, &[ShowPart::Bytes(bytes)]);
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = operands.first()
                    && self.resources.images.contains(name)
                {
                    self.record_image();
                }
            }
            _ => {}
        }
    }

    fn record_image(&mut self) {
        let ctm = &self.graphics.ctm;
        let corners = [
            apply(ctm, 0.0, 0.0),
            apply(ctm, 1.0, 0.0),
            apply(ctm, 0.0, 1.0),
            apply(ctm, 1.0, 1.0),
        ];
        let points: Vec<(f32, f32)> = corners
            .iter()
            .map(|(x, y)| self.page.to_page(*x, *y))
            .collect();
        let rect = Rect::new(
            points.iter().map(|p| p.0).fold(f32::INFINITY, f32::min),
            points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min),
            points.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max),
            points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max),
        );
        if !rect.is_degenerate() {
            self.scan.images.push(rect);
        }
    }

    fn show(&mut self, op_index: usize, kind: ShowKind, parts: &[ShowPart<'_>]) {
        let resources = self.resources;
        let font = resources.fonts.get(&self.text.font_key);
        let font_name = font.map(|f| f.base_font.clone()).unwrap_or_default();
        let measure_font = self.fonts.mapper.map(&font_name);
        let state = &self.text;
        let start = multiply(&state.text_matrix, &self.graphics.ctm);
        let (x_start, y_baseline) = apply(&start, 0.0, state.text_rise);
        let scale_y = (start[2].powi(2) + start[3].powi(2)).sqrt();
        let size = (state.font_size * scale_y).abs();

        let mut text = String::new();
        let mut advance = 0.0;
        for part in parts {
            match part {
                ShowPart::Bytes(bytes) => {
                    let decoded = match font {
                        Some(resource) => resource.decode(bytes),
                        None => decode_plain(bytes),
                    };
                    let dx = self.string_advance(font, measure_font, bytes, &decoded);
                    text.push_str(&decoded);
                    advance += dx;
                    self.text.advance_x(dx);
                }
                ShowPart::Kern(amount) => {
                    let dx = -amount / 1000.0 * self.text.font_size * self.text.horiz_scale;
                    if *amount < -TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                    advance += dx;
                    self.text.advance_x(dx);
                }
            }
        }

        let end = multiply(&self.text.text_matrix, &self.graphics.ctm);
        let (x_end, _) = apply(&end, 0.0, self.text.text_rise);
        let (x0, baseline) = self.page.to_page(x_start.min(x_end), y_baseline);
        let (x1, _) = self.page.to_page(x_start.max(x_end), y_baseline);
        let bbox = Rect::new(x0, baseline - size * ASCENT, x1, baseline + size * DESCENT);

        self.scan.shows.push(ShowRecord {
            op_index,
            kind,
            text,
            bbox,
            font_name,
            size,
            color: self.graphics.fill,
            advance,
            font_size: self.text.font_size,
            horiz_scale: self.text.horiz_scale,
        });
    }

    /// Text-space displacement of one string operand, spacing included.
    fn string_advance(
        &self,
        font: Option<&FontResource<'_>>,
        measure_font: FontId,
        bytes: &[u8],
        decoded: &str,
    ) -> f32 {
        let state = &self.text;
        let fallback_em = |text: &str| {
            self.fonts
                .metrics
                .text_width(text, measure_font, 1.0)
                .unwrap_or_else(|| estimate_text_width(text, 1.0))
        };

        let (glyph_em, codes, spaces) = match font {
            Some(resource) if !resource.two_byte => {
                let mut em = 0.0;
                for byte in bytes {
                    let width = (*byte as u32)
                        .checked_sub(resource.first_char)
                        .and_then(|slot| resource.widths.get(slot as usize))
                        .copied()
                        .filter(|width| *width > 0.0);
                    em += match width {
                        Some(width) => width / 1000.0,
                        None => fallback_em(&resource.decode(&[*byte])),
                    };
                }
                let spaces = bytes.iter().filter(|byte| **byte == b' ').count();
                (em, bytes.len(), spaces)
            }
            Some(resource) => {
                let codes: Vec<u32> = bytes
                    .chunks(2)
                    .map(|pair| pair.iter().fold(0, |code, byte| code << 8 | u32::from(*byte)))
                    .collect();
                let em = match resource.default_width {
                    Some(_) => {
                        codes
                            .iter()
                            .filter_map(|code| resource.cid_width(*code))
                            .sum::<f32>()
                            / 1000.0
                    }
                    None => fallback_em(decoded),
                };
                (em, codes.len(), 0)
            }
            None => {
                let spaces = decoded.chars().filter(|ch| *ch == ' ').count();
                (fallback_em(decoded), decoded.chars().count(), spaces)
            }
        };

        (glyph_em * state.font_size
            + state.char_spacing * codes as f32
            + state.word_spacing * spaces as f32)
            * state.horiz_scale
    }
}

enum ShowPart<'a> {
    Bytes(&'a [u8]),
    Kern(f32),
}

/// Rewrites `ops`, replacing each listed show with an invisible equivalent.
///
/// The replacement moves the text position exactly as far as the original
/// glyphs did, so text that follows on the same line keeps its place.
pub(crate) fn remove_shows(ops: &[Operation], shows: &[&ShowRecord]) -> Vec<Operation> {
    let by_index: HashMap<usize, &ShowRecord> =
        shows.iter().map(|show| (show.op_index, *show)).collect();
    let mut rewritten = Vec::with_capacity(ops.len());
    for (index, op) in ops.iter().enumerate() {
        let Some(show) = by_index.get(&index) else {
            rewritten.push(op.clone());
            continue;
        };
        match show.kind {
            ShowKind::Tj | ShowKind::TjArray => {}
            ShowKind::NextLine => rewritten.push(Operation::new("T*", vec![])),
            ShowKind::NextLineSpaced {
                word_spacing,
                char_spacing,
            } => {
                rewritten.push(Operation::new("Tw", vec![Object::Real(word_spacing)]));
                rewritten.push(Operation::new("Tc", vec![Object::Real(char_spacing)]));
                rewritten.push(Operation::new("T*", vec![]));
            }
        }
        let scale = show.font_size * show.horiz_scale;
        if scale.abs() > f32::EPSILON && show.advance.abs() > f32::EPSILON {
            let kern = -show.advance * 1000.0 / scale;
            rewritten.push(Operation::new(
                "TJ",
                vec![Object::Array(vec![Object::Real(kern)])],
            ));
        }
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn string(text: &str) -> Object {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    }

    fn resources() -> PageResources<'static> {
        let mut resources = PageResources::default();
        resources.fonts.insert(
            b"F1".to_vec(),
            FontResource {
                base_font: "Courier".to_string(),
                ..FontResource::default()
            },
        );
        resources.images.insert(b"Im1".to_vec());
        resources
    }

    fn scan(ops: &[Operation]) -> ContentScan {
        let resources = resources();
        let fonts = FontContext::default();
        Interpreter::new(&resources, &fonts, PageBox([0.0, 0.0, 595.0, 842.0])).run(ops)
    }

    #[test]
    fn locates_a_simple_show() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(10)]),
            op("Td", vec![Object::Integer(72), Object::Integer(742)]),
            op("Tj", vec![string("Hello")]),
            op("ET", vec![]),
        ];
        let result = scan(&ops);
        assert_eq!(result.shows.len(), 1);
        let show = &result.shows[0];
        assert_eq!(show.text, "Hello");
        assert_eq!(show.font_name, "Courier");
        // Courier: 0.6 em per glyph
        assert!((show.bbox.x0 - 72.0).abs() < 1e-3);
        assert!((show.bbox.x1 - 102.0).abs() < 1e-3);
        assert!((show.bbox.y0 - 92.0).abs() < 1e-3);
        assert!((show.bbox.y1 - 102.0).abs() < 1e-3);
    }

    #[test]
    fn tracks_fill_color_and_graphics_stack() {
        let ops = vec![
            op("q", vec![]),
            op("rg", vec![Object::Integer(1), Object::Integer(0), Object::Integer(0)]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
            op("Tj", vec![string("black")]),
            op("rg", vec![Object::Real(0.2), Object::Real(0.4), Object::Real(0.6)]),
            op("Tj", vec![string("blue")]),
            op("ET", vec![]),
        ];
        let result = scan(&ops);
        assert_eq!(result.shows[0].color, Rgb::BLACK);
        assert_eq!(result.shows[1].color.to_packed(), 0x336699);
    }

    #[test]
    fn scaled_text_matrix_scales_the_size() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(1)]),
            op(
                "Tm",
                vec![
                    Object::Integer(14),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(14),
                    Object::Integer(100),
                    Object::Integer(500),
                ],
            ),
            op("Tj", vec![string("Big")]),
            op("ET", vec![]),
        ];
        let result = scan(&ops);
        assert!((result.shows[0].size - 14.0).abs() < 1e-4);
        assert!((result.shows[0].bbox.width() - 3.0 * 0.6 * 14.0).abs() < 1e-3);
    }

    #[test]
    fn tj_arrays_insert_spaces_at_wide_kerning() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(10)]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    string("Hello"),
                    Object::Integer(-300),
                    string("world"),
                    Object::Integer(-50),
                    string("!"),
                ])],
            ),
            op("ET", vec![]),
        ];
        let result = scan(&ops);
        assert_eq!(result.shows[0].text, "Hello world!");
        // 11 glyphs at 6pt plus 3pt and 0.5pt of kerning
        assert!((result.shows[0].advance - 69.5).abs() < 1e-3);
    }

    #[test]
    fn images_are_placed_through_the_ctm() {
        let ops = vec![
            op("q", vec![]),
            op(
                "cm",
                vec![
                    Object::Integer(200),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(100),
                    Object::Integer(50),
                    Object::Integer(600),
                ],
            ),
            op("Do", vec![Object::Name(b"Im1".to_vec())]),
            op("Q", vec![]),
            op("Do", vec![Object::Name(b"Fm0".to_vec())]),
        ];
        let result = scan(&ops);
        assert_eq!(result.images, vec![Rect::new(50.0, 142.0, 250.0, 242.0)]);
    }

    #[test]
    fn removed_shows_keep_the_text_position() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(10)]),
            op("Td", vec![Object::Integer(72), Object::Integer(700)]),
            op("Tj", vec![string("Erase")]),
            op("Tj", vec![string("Keep")]),
            op("'", vec![string("Next")]),
            op("ET", vec![]),
        ];
        let before = scan(&ops);
        let targets: Vec<&ShowRecord> = before
            .shows
            .iter()
            .filter(|show| show.text != "Keep")
            .collect();
        let rewritten = remove_shows(&ops, &targets);
        let after = scan(&rewritten);

        let texts: Vec<&str> = after
            .shows
            .iter()
            .map(|show| show.text.as_str())
            .filter(|text| !text.is_empty())
            .collect();
        assert_eq!(texts, vec!["Keep"]);
        let keep_before = before.shows.iter().find(|show| show.text == "Keep").unwrap();
        let keep_after = after.shows.iter().find(|show| show.text == "Keep").unwrap();
        assert!((keep_before.bbox.x0 - keep_after.bbox.x0).abs() < 1e-3);
        assert!(rewritten.iter().any(|op| op.operator == "T*"));
    }
}
