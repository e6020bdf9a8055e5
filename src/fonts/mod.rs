mod metrics;

use serde::Serialize;

pub use metrics::{FontMetrics, TextMeasure, TrueTypeFace, estimate_text_width, load_truetype_face};

/// The closed set of substitute fonts text is redrawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FontId {
    #[serde(rename = "helv")]
    Helv,
    #[serde(rename = "helv-b")]
    HelvBold,
    #[serde(rename = "helv-i")]
    HelvItalic,
    #[serde(rename = "helv-bi")]
    HelvBoldItalic,
    #[serde(rename = "cour")]
    Cour,
    #[serde(rename = "cour-b")]
    CourBold,
    #[serde(rename = "times")]
    Times,
    #[serde(rename = "times-b")]
    TimesBold,
    #[serde(rename = "times-i")]
    TimesItalic,
    #[serde(rename = "times-bi")]
    TimesBoldItalic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Sans,
    Mono,
    Serif,
}

impl FontId {
    /// Generic font used when nothing better is known or a draw must be retried.
    pub const REGULAR: FontId = FontId::Helv;

    pub fn as_str(self) -> &'static str {
        match self {
            FontId::Helv => "helv",
            FontId::HelvBold => "helv-b",
            FontId::HelvItalic => "helv-i",
            FontId::HelvBoldItalic => "helv-bi",
            FontId::Cour => "cour",
            FontId::CourBold => "cour-b",
            FontId::Times => "times",
            FontId::TimesBold => "times-b",
            FontId::TimesItalic => "times-i",
            FontId::TimesBoldItalic => "times-bi",
        }
    }

    /// PostScript name of the standard font backing this id.
    pub fn base_font(self) -> &'static str {
        match self {
            FontId::Helv => "Helvetica",
            FontId::HelvBold => "Helvetica-Bold",
            FontId::HelvItalic => "Helvetica-Oblique",
            FontId::HelvBoldItalic => "Helvetica-BoldOblique",
            FontId::Cour => "Courier",
            FontId::CourBold => "Courier-Bold",
            FontId::Times => "Times-Roman",
            FontId::TimesBold => "Times-Bold",
            FontId::TimesItalic => "Times-Italic",
            FontId::TimesBoldItalic => "Times-BoldItalic",
        }
    }

    pub fn family(self) -> FontFamily {
        match self {
            FontId::Helv | FontId::HelvBold | FontId::HelvItalic | FontId::HelvBoldItalic => {
                FontFamily::Sans
            }
            FontId::Cour | FontId::CourBold => FontFamily::Mono,
            FontId::Times | FontId::TimesBold | FontId::TimesItalic | FontId::TimesBoldItalic => {
                FontFamily::Serif
            }
        }
    }
}

impl std::fmt::Display for FontId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps arbitrary source font names onto [`FontId`]s.
///
/// Proportional families all land on Helvetica unless `serif` is set, in
/// which case Times-like names keep a serif face.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontMapper {
    serif: bool,
}

impl FontMapper {
    pub fn new(serif: bool) -> Self {
        Self { serif }
    }

    pub fn map(&self, source_font: &str) -> FontId {
        let normalized = normalize_font_name(source_font);
        if normalized.is_empty() {
            return FontId::REGULAR;
        }
        let bold = normalized.contains("bold");
        let italic = normalized.contains("italic") || normalized.contains("oblique");

        if normalized.contains("courier")
            || normalized.contains("mono")
            || normalized.contains("console")
        {
            return if bold { FontId::CourBold } else { FontId::Cour };
        }

        if self.serif && is_serif_name(&normalized) {
            return match (bold, italic) {
                (true, true) => FontId::TimesBoldItalic,
                (true, false) => FontId::TimesBold,
                (false, true) => FontId::TimesItalic,
                (false, false) => FontId::Times,
            };
        }

        match (bold, italic) {
            (true, true) => FontId::HelvBoldItalic,
            (true, false) => FontId::HelvBold,
            (false, true) => FontId::HelvItalic,
            (false, false) => FontId::Helv,
        }
    }
}

fn normalize_font_name(name: &str) -> String {
    name.chars()
        .filter(|ch| !matches!(ch, '-' | ' ' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_serif_name(normalized: &str) -> bool {
    normalized.contains("times") || (normalized.contains("serif") && !normalized.contains("sans"))
}

/// Font mapping plus width metrics, shared by extraction and drawing.
#[derive(Debug, Clone, Default)]
pub struct FontContext {
    pub mapper: FontMapper,
    pub metrics: FontMetrics,
}

impl FontContext {
    pub fn new(mapper: FontMapper, metrics: FontMetrics) -> Self {
        Self { mapper, metrics }
    }
}
