use serde::Serialize;
use thiserror::Error;

use super::wrap::{FIT_EPSILON, lines_fit, wrap_text};
use crate::fonts::{FontId, TextMeasure};

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("target box is degenerate ({width} x {height})")]
    DegenerateBox { width: f32, height: f32 },
    #[error("invalid base font size: {0}")]
    InvalidFontSize(f32),
}

/// Knobs of the shrink policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    /// Initial target as a fraction of the original size.
    pub shrink_factor: f32,
    /// Absolute lower bound on any resolved size.
    pub min_font_size: f32,
    /// Lower bound relative to the original size.
    pub min_size_ratio: f32,
    pub decay_factor: f32,
    pub max_attempts: usize,
    /// Keep the original size and let the renderer overflow instead of shrinking.
    pub preserve_font_size: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            shrink_factor: 0.85,
            min_font_size: 5.0,
            min_size_ratio: 0.5,
            decay_factor: 0.9,
            max_attempts: 6,
            preserve_font_size: false,
        }
    }
}

impl FitConfig {
    pub fn floor_size(&self, base_size: f32) -> f32 {
        if self.preserve_font_size {
            return base_size;
        }
        self.min_font_size.max(base_size * self.min_size_ratio)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FitRequest<'a> {
    pub text: &'a str,
    pub font: FontId,
    pub base_size: f32,
    pub box_width: f32,
    pub box_height: f32,
    /// Average glyph width at `base_size`, used when the measurer has no metrics.
    pub avg_glyph_width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitOutcome {
    pub font_size: f32,
    pub fits: bool,
    /// The text fits on one line at `font_size` within the box width.
    pub single_line: bool,
    pub floor_size: f32,
}

/// Width of `text` at `size`, measured or estimated from the average glyph.
pub(crate) struct SizedWidth<'a> {
    pub(crate) measure: &'a dyn TextMeasure,
    pub(crate) font: FontId,
    pub(crate) base_size: f32,
    pub(crate) avg_glyph_width: f32,
}

impl SizedWidth<'_> {
    pub(crate) fn width(&self, text: &str, size: f32) -> f32 {
        match self.measure.text_width(text, self.font, size) {
            Some(width) if width.is_finite() && width >= 0.0 => width,
            _ => {
                let glyph = self.avg_glyph_width.max(0.5);
                glyph * (size / self.base_size) * text.chars().count() as f32
            }
        }
    }

    pub(crate) fn wrap(&self, text: &str, size: f32, max_width: f32) -> Vec<String> {
        wrap_text(text, max_width, |candidate| self.width(candidate, size))
    }

    fn fits(&self, text: &str, size: f32, width: f32, height: f32) -> bool {
        let lines = self.wrap(text, size, width);
        lines_fit(&lines, size, width, height, |line| self.width(line, size))
    }
}

/// Chooses the font size for `request.text` inside its box.
///
/// The result never drops below the configured floor. When even the floor
/// does not fit, the floor is returned with `fits == false` and the caller
/// decides how to place the overflow.
pub fn fit(
    request: &FitRequest<'_>,
    measure: &dyn TextMeasure,
    config: &FitConfig,
) -> Result<FitOutcome, FitError> {
    let FitRequest {
        text,
        box_width,
        box_height,
        base_size,
        ..
    } = *request;
    if !box_width.is_finite() || !box_height.is_finite() || box_width <= 0.0 || box_height <= 0.0
    {
        return Err(FitError::DegenerateBox {
            width: box_width,
            height: box_height,
        });
    }
    if !base_size.is_finite() || base_size <= 0.0 {
        return Err(FitError::InvalidFontSize(base_size));
    }

    let sized = SizedWidth {
        measure,
        font: request.font,
        base_size,
        avg_glyph_width: request.avg_glyph_width,
    };
    let floor = config.floor_size(base_size);
    let outcome = |size: f32, fits: bool| FitOutcome {
        font_size: size,
        fits,
        single_line: !text.contains('\n')
            && sized.width(text.trim(), size) <= box_width + FIT_EPSILON,
        floor_size: floor,
    };

    if config.preserve_font_size {
        let fits = sized.fits(text, base_size, box_width, box_height);
        return Ok(outcome(base_size, fits));
    }

    let mut size = (base_size * config.shrink_factor).max(floor);
    let width = sized.width(text.trim(), size);
    if width > box_width && width > 0.0 {
        let usable = (box_width - 0.5).max(0.0);
        size = (size * usable / width).max(floor);
    }
    if sized.fits(text, size, box_width, box_height) {
        return Ok(outcome(size, true));
    }

    for _ in 0..config.max_attempts {
        if size <= floor {
            break;
        }
        size = (size * config.decay_factor).max(floor);
        if sized.fits(text, size, box_width, box_height) {
            return Ok(outcome(size, true));
        }
    }

    let fits = sized.fits(text, floor, box_width, box_height);
    Ok(outcome(floor, fits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontMetrics;

    /// Every glyph is exactly half an em wide.
    struct HalfEm;

    impl TextMeasure for HalfEm {
        fn text_width(&self, text: &str, _font: FontId, size: f32) -> Option<f32> {
            Some(text.chars().count() as f32 * size * 0.5)
        }
    }

    struct NoMetrics;

    impl TextMeasure for NoMetrics {
        fn text_width(&self, _text: &str, _font: FontId, _size: f32) -> Option<f32> {
            None
        }
    }

    fn request(text: &str, base_size: f32, box_width: f32, box_height: f32) -> FitRequest<'_> {
        FitRequest {
            text,
            font: FontId::Helv,
            base_size,
            box_width,
            box_height,
            avg_glyph_width: base_size * 0.5,
        }
    }

    #[test]
    fn short_text_uses_the_shrunk_base_size() {
        let outcome = fit(&request("Hi", 12.0, 100.0, 14.0), &HalfEm, &FitConfig::default()).unwrap();
        assert!((outcome.font_size - 10.2).abs() < 1e-4);
        assert!(outcome.fits);
        assert!(outcome.single_line);
    }

    #[test]
    fn proportional_shrink_targets_the_box_width() {
        // 20 glyphs at 10.2pt are 102pt wide; the box is 60pt.
        let text = "abcdefghijklmnopqrst";
        let outcome = fit(&request(text, 12.0, 60.0, 13.0), &HalfEm, &FitConfig::default()).unwrap();
        assert!(outcome.fits);
        assert!(outcome.single_line);
        assert!(outcome.font_size >= 6.0);
        assert!(HalfEm.text_width(text, FontId::Helv, outcome.font_size).unwrap() <= 60.0);
    }

    #[test]
    fn overflow_returns_the_floor_without_fitting() {
        let text = "a very long translated sentence that cannot possibly fit in a tiny box";
        let outcome = fit(&request(text, 12.0, 30.0, 10.0), &HalfEm, &FitConfig::default()).unwrap();
        assert_eq!(outcome.font_size, 6.0);
        assert!(!outcome.fits);
        assert!(!outcome.single_line);
    }

    #[test]
    fn floor_respects_the_absolute_minimum() {
        let config = FitConfig::default();
        assert_eq!(config.floor_size(6.0), 5.0);
        assert_eq!(config.floor_size(20.0), 10.0);
    }

    #[test]
    fn result_never_goes_below_the_floor() {
        let config = FitConfig::default();
        for width in [1.0_f32, 5.0, 20.0, 80.0, 400.0] {
            for base in [4.0_f32, 8.0, 12.0, 30.0] {
                let outcome = fit(&request("overflowing words here", base, width, 8.0), &HalfEm, &config)
                    .unwrap();
                assert!(outcome.font_size >= config.floor_size(base) - 1e-4);
            }
        }
    }

    #[test]
    fn fitting_at_the_floor_is_reported() {
        let config = FitConfig::default();
        let text = "twelve chars";
        let floor = config.floor_size(12.0);
        let needed = HalfEm.text_width(text, FontId::Helv, floor).unwrap();
        let outcome = fit(&request(text, 12.0, needed, 7.0), &HalfEm, &config).unwrap();
        assert!(outcome.fits);
    }

    #[test]
    fn wider_boxes_never_get_smaller_fonts() {
        let config = FitConfig::default();
        let text = "monotonic font sizes for growing boxes";
        let mut previous = 0.0;
        for width in [20.0_f32, 40.0, 60.0, 90.0, 120.0, 200.0, 400.0] {
            let outcome = fit(&request(text, 12.0, width, 14.0), &HalfEm, &config).unwrap();
            assert!(outcome.font_size + 1e-4 >= previous, "width {width}");
            previous = outcome.font_size;
        }
    }

    #[test]
    fn average_glyph_fallback_scales_with_size() {
        let outcome = fit(&request("abcdefghij", 10.0, 30.0, 12.0), &NoMetrics, &FitConfig::default())
            .unwrap();
        // fallback width: 5pt per glyph at 10pt
        assert!(outcome.fits);
        assert!(outcome.font_size * 0.5 * 10.0 <= 30.0 + 1e-3);
    }

    #[test]
    fn serif_fitting_measures_real_glyph_widths() {
        let metrics = FontMetrics::default();
        let text = "WWWWWWWWWW";
        let request = FitRequest {
            text,
            font: FontId::Times,
            base_size: 10.0,
            box_width: 80.0,
            box_height: 12.0,
            avg_glyph_width: 5.5,
        };
        let outcome = fit(&request, &metrics, &FitConfig::default()).unwrap();
        // 944/1000 em per W: 80.24pt at the shrunk 8.5pt
        assert!(outcome.fits);
        assert!(outcome.font_size < 8.5);
        let width = metrics.text_width(text, FontId::Times, outcome.font_size).unwrap();
        assert!(width <= 80.0);
    }

    #[test]
    fn preserve_policy_keeps_the_original_size() {
        let config = FitConfig {
            preserve_font_size: true,
            ..FitConfig::default()
        };
        let outcome = fit(&request("much too long for the box", 12.0, 20.0, 12.0), &HalfEm, &config)
            .unwrap();
        assert_eq!(outcome.font_size, 12.0);
        assert!(!outcome.fits);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let config = FitConfig::default();
        let metrics = FontMetrics::default();
        assert!(matches!(
            fit(&request("x", 12.0, 0.0, 10.0), &metrics, &config),
            Err(FitError::DegenerateBox { .. })
        ));
        assert!(matches!(
            fit(&request("x", f32::NAN, 10.0, 10.0), &metrics, &config),
            Err(FitError::InvalidFontSize(_))
        ));
    }
}
