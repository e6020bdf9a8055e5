use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::Face;
use ttf_parser::name_id;

use super::{FontFamily, FontId};

/// Anything that can report the advance width of a string in points.
///
/// `None` means the width is unknown for this font; callers fall back to an
/// average-glyph estimate.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font: FontId, size: f32) -> Option<f32>;
}

/// Advance widths for the printable ASCII range (0x20..=0x7E), 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, //
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, //
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, //
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, //
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, //
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, //
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, //
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, //
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, //
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, //
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, //
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

const TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278, //
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500, //
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778, //
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500, //
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500, //
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

const TIMES_ITALIC_WIDTHS: [u16; 95] = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278, //
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500, //
    920, 611, 611, 667, 722, 611, 611, 722, 722, 333, 444, 667, 556, 833, 667, 722, //
    611, 722, 611, 500, 556, 722, 611, 833, 611, 556, 556, 389, 278, 389, 422, 500, //
    333, 500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444, 278, 722, 500, 500, //
    500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541,
];

const TIMES_BOLD_ITALIC_WIDTHS: [u16; 95] = [
    250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333, 250, 278, //
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500, //
    832, 667, 667, 667, 722, 667, 667, 722, 778, 389, 500, 667, 611, 889, 722, 722, //
    611, 722, 667, 556, 611, 722, 667, 889, 667, 611, 611, 333, 278, 333, 570, 500, //
    333, 500, 500, 444, 500, 444, 333, 500, 556, 278, 278, 500, 278, 778, 556, 500, //
    500, 500, 389, 389, 278, 556, 444, 667, 500, 444, 389, 348, 220, 348, 570,
];

const COURIER_WIDTH: u16 = 600;

/// A standard-font width table plus the advances used for accented Latin
/// letters outside it.
struct WidthTable {
    ascii: &'static [u16; 95],
    upper: f32,
    lower: f32,
}

impl WidthTable {
    fn for_font(font: FontId) -> Option<Self> {
        let (ascii, upper, lower) = match font {
            FontId::Helv | FontId::HelvItalic => (&HELVETICA_WIDTHS, 722.0, 556.0),
            FontId::HelvBold | FontId::HelvBoldItalic => (&HELVETICA_BOLD_WIDTHS, 722.0, 611.0),
            FontId::Times => (&TIMES_ROMAN_WIDTHS, 722.0, 444.0),
            FontId::TimesBold => (&TIMES_BOLD_WIDTHS, 722.0, 500.0),
            FontId::TimesItalic => (&TIMES_ITALIC_WIDTHS, 611.0, 444.0),
            FontId::TimesBoldItalic => (&TIMES_BOLD_ITALIC_WIDTHS, 667.0, 500.0),
            FontId::Cour | FontId::CourBold => return None,
        };
        Some(Self { ascii, upper, lower })
    }

    fn char_units(&self, ch: char) -> f32 {
        let code = ch as u32;
        if (0x20..=0x7E).contains(&code) {
            return self.ascii[(code - 0x20) as usize] as f32;
        }
        if ch.is_whitespace() {
            return self.ascii[0] as f32;
        }
        if ch.is_alphabetic() && code <= 0x24F {
            return if ch.is_uppercase() { self.upper } else { self.lower };
        }
        estimate_char_units(ch) * 1000.0
    }
}

/// Glyph metrics loaded from a TrueType/OpenType file.
#[derive(Clone)]
pub struct TrueTypeFace {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl std::fmt::Debug for TrueTypeFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrueTypeFace")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .field("face_index", &self.face_index)
            .finish()
    }
}

impl TrueTypeFace {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn measure(&self, text: &str, font_size: f32) -> Option<f32> {
        let face = Face::parse(&self.data, self.face_index).ok()?;
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        let units = self.units_per_em.max(1) as f32;
        Some(advance as f32 * (font_size / units))
    }
}

pub fn load_truetype_face(path: &Path) -> Result<TrueTypeFace> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_face_from_data(&data)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

fn load_face_from_data(data: &[u8]) -> Result<TrueTypeFace> {
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            return Ok(TrueTypeFace {
                data: Arc::new(data.to_vec()),
                units_per_em,
                space_advance,
                family: extract_family_name(&face),
                face_index: index,
            });
        }
    }
    Err(anyhow!("failed to parse font data"))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

/// Width source for the substitute fonts.
///
/// Widths come from the standard-font tables; a TrueType file configured for
/// the sans or serif family overrides the table.
#[derive(Debug, Clone, Default)]
pub struct FontMetrics {
    sans: Option<TrueTypeFace>,
    serif: Option<TrueTypeFace>,
}

impl FontMetrics {
    pub fn with_sans_face(mut self, face: TrueTypeFace) -> Self {
        self.sans = Some(face);
        self
    }

    pub fn with_serif_face(mut self, face: TrueTypeFace) -> Self {
        self.serif = Some(face);
        self
    }

    fn override_for(&self, family: FontFamily) -> Option<&TrueTypeFace> {
        match family {
            FontFamily::Sans => self.sans.as_ref(),
            FontFamily::Serif => self.serif.as_ref(),
            FontFamily::Mono => None,
        }
    }
}

impl TextMeasure for FontMetrics {
    fn text_width(&self, text: &str, font: FontId, size: f32) -> Option<f32> {
        if !size.is_finite() || size <= 0.0 {
            return None;
        }
        if let Some(face) = self.override_for(font.family()) {
            return face.measure(text, size);
        }
        match WidthTable::for_font(font) {
            Some(table) => {
                let units: f32 = text
                    .chars()
                    .filter(|ch| *ch != '\n')
                    .map(|ch| table.char_units(ch))
                    .sum();
                Some(units * size / 1000.0)
            }
            None => {
                let count = text.chars().filter(|ch| *ch != '\n').count();
                Some(count as f32 * COURIER_WIDTH as f32 * size / 1000.0)
            }
        }
    }
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    }
}

/// Rough width of `text` at `font_size` when no metrics are available.
pub fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(estimate_char_units).sum::<f32>() * font_size
}
