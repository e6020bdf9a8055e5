//! Per-page rewriting: plan every replacement, erase the originals, then
//! draw the translations.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fonts::{FontId, FontMapper, TextMeasure};
use crate::geometry::{Point, Rect, Rgb};
use crate::layout::{
    ContentClass, FitConfig, FitError, FitRequest, GroupConfig, TranslatableUnit,
    distribute_words, fit, group_line,
};
use crate::page::{
    DESCENT, PageSurface, PageText, SurfaceError, TextFragment, TextStyle, TextboxMode,
    TextboxRequest,
};
use crate::translate::TranslationAdapter;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewriteOptions {
    pub group: GroupConfig,
    pub fit: FitConfig,
    /// Spread a multi-fragment unit's translation back over its fragments.
    pub distribute: bool,
    /// Redraw units whose translation equals the source text.
    pub redraw_unchanged: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            group: GroupConfig::default(),
            fit: FitConfig::default(),
            distribute: true,
            redraw_unchanged: false,
        }
    }
}

/// Fully resolved instruction for drawing one unit or one slice of a unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplacementPlan {
    pub target_rect: Rect,
    pub render_text: String,
    pub source_text: String,
    pub font: FontId,
    pub font_size: f32,
    pub floor_size: f32,
    pub color: Rgb,
    pub fits: bool,
    pub single_line: bool,
}

/// The caller asked to stop; partial work for the page must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("translation canceled")]
pub struct Canceled;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageReport {
    pub units: usize,
    /// Units left alone because the translation changed nothing.
    pub unchanged: usize,
    /// Units dropped before planning (blank or structurally unusable).
    pub skipped: usize,
    pub planned: usize,
    pub drawn: usize,
    /// Plans forced onto the page at the floor size.
    pub overflowed: usize,
    /// Plans drawn with the regular font after the mapped one failed.
    pub fallbacks: usize,
    pub failed: usize,
    /// Originals were painted over because transparent removal was unavailable.
    pub opaque_erase: bool,
}

/// Everything decided for a page before it is touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PagePlan {
    pub plans: Vec<ReplacementPlan>,
    /// Rectangles whose original glyphs are removed.
    pub erase: Vec<Rect>,
    pub report: PageReport,
}

enum Placement {
    Line,
    Boxed,
    Forced,
}

pub struct PageRewriter<'a> {
    adapter: &'a TranslationAdapter,
    mapper: FontMapper,
    options: RewriteOptions,
}

impl<'a> PageRewriter<'a> {
    pub fn new(adapter: &'a TranslationAdapter, mapper: FontMapper, options: RewriteOptions) -> Self {
        Self {
            adapter,
            mapper,
            options,
        }
    }

    /// Groups, translates and fits every unit of `page` without drawing.
    ///
    /// `cancel` is polled before each line.
    pub fn plan_page(
        &self,
        page: &PageText,
        measure: &dyn TextMeasure,
        cancel: &dyn Fn() -> bool,
    ) -> Result<PagePlan, Canceled> {
        let page_rect = page.page_rect();
        let mut plan = PagePlan::default();
        for line in page.lines() {
            if cancel() {
                return Err(Canceled);
            }
            for unit in group_line(&line.fragments, &self.options.group) {
                plan.report.units += 1;
                self.plan_unit(&unit, page_rect, measure, &mut plan);
            }
        }
        Ok(plan)
    }

    fn plan_unit(
        &self,
        unit: &TranslatableUnit,
        page_rect: Rect,
        measure: &dyn TextMeasure,
        plan: &mut PagePlan,
    ) {
        if unit.class == ContentClass::Blank {
            plan.report.skipped += 1;
            return;
        }
        let source = unit.text();
        let translated = self.adapter.translate(&source);
        if translated.trim() == source.trim() && !self.options.redraw_unchanged {
            plan.report.unchanged += 1;
            return;
        }

        match self.fit_unit(unit, &source, &translated, page_rect, measure) {
            Ok(plans) => {
                for replacement in &plans {
                    debug!(
                        text = %replacement.render_text,
                        font = %replacement.font,
                        size = replacement.font_size,
                        fits = replacement.fits,
                        "planned replacement"
                    );
                }
                plan.report.planned += plans.len();
                plan.erase.push(unit.rect);
                plan.plans.extend(plans);
            }
            Err(err) => {
                warn!(%err, text = %source, "leaving unit untouched");
                plan.report.skipped += 1;
            }
        }
    }

    fn fit_unit(
        &self,
        unit: &TranslatableUnit,
        source: &str,
        translated: &str,
        page_rect: Rect,
        measure: &dyn TextMeasure,
    ) -> Result<Vec<ReplacementPlan>, FitError> {
        let regions: Vec<&TextFragment> = unit
            .members
            .iter()
            .filter(|member| !member.text.trim().is_empty())
            .collect();

        if self.options.distribute && regions.len() > 1 {
            let weights: Vec<usize> = regions
                .iter()
                .map(|member| member.text.trim().chars().count())
                .collect();
            let parts = distribute_words(translated, &weights);
            let mut plans = Vec::with_capacity(parts.len());
            for (member, part) in regions.iter().zip(parts) {
                if part.is_empty() {
                    continue;
                }
                let slice = Slice {
                    rect: member.bbox,
                    source: member.text.trim(),
                    text: &part,
                    style: member,
                };
                plans.push(self.fit_slice(&slice, page_rect, measure)?);
            }
            return Ok(plans);
        }

        let slice = Slice {
            rect: unit.rect,
            source,
            text: translated,
            style: unit.representative(),
        };
        Ok(vec![self.fit_slice(&slice, page_rect, measure)?])
    }

    fn fit_slice(
        &self,
        slice: &Slice<'_>,
        page_rect: Rect,
        measure: &dyn TextMeasure,
    ) -> Result<ReplacementPlan, FitError> {
        let target = slice.rect.clip_to(&page_rect);
        let render_text = slice.text.trim();
        let font = self.mapper.map(&slice.style.font);
        let source_chars = slice.source.chars().count().max(1);
        let request = FitRequest {
            text: render_text,
            font,
            base_size: slice.style.size,
            box_width: target.width(),
            box_height: target.height(),
            avg_glyph_width: slice.rect.width() / source_chars as f32,
        };
        let outcome = fit(&request, measure, &self.options.fit)?;
        Ok(ReplacementPlan {
            target_rect: target,
            render_text: render_text.to_string(),
            source_text: slice.source.to_string(),
            font,
            font_size: outcome.font_size,
            floor_size: outcome.floor_size,
            color: slice.style.color,
            fits: outcome.fits,
            single_line: outcome.single_line,
        })
    }

    /// Plans `page`, erases the originals from `surface` and draws the plans.
    pub fn rewrite<S: PageSurface>(
        &self,
        page: &PageText,
        surface: &mut S,
        cancel: &dyn Fn() -> bool,
    ) -> Result<PageReport, Canceled> {
        let plan = self.plan_page(page, &*surface, cancel)?;
        self.apply(page, plan, surface, cancel)
    }

    /// Erase and draw phases for a plan built by [`PageRewriter::plan_page`].
    pub fn apply<S: PageSurface>(
        &self,
        page: &PageText,
        plan: PagePlan,
        surface: &mut S,
        cancel: &dyn Fn() -> bool,
    ) -> Result<PageReport, Canceled> {
        let PagePlan {
            plans,
            erase,
            mut report,
        } = plan;
        if cancel() {
            return Err(Canceled);
        }

        if !erase.is_empty() {
            report.opaque_erase = erase_regions(surface, &erase, &page.images);
        }

        for plan in &plans {
            if cancel() {
                return Err(Canceled);
            }
            self.draw(surface, plan, &mut report);
        }

        info!(
            page = page.index + 1,
            units = report.units,
            drawn = report.drawn,
            overflowed = report.overflowed,
            skipped = report.skipped,
            "page rewritten"
        );
        Ok(report)
    }

    fn draw<S: PageSurface>(&self, surface: &mut S, plan: &ReplacementPlan, report: &mut PageReport) {
        let style = TextStyle {
            font: plan.font,
            size: plan.font_size,
            color: plan.color,
        };
        let placement = match self.place(surface, plan, style) {
            Ok(placement) => placement,
            Err(err) => {
                warn!(%err, text = %plan.render_text, "draw failed; retrying with the regular font");
                let fallback = TextStyle {
                    font: FontId::REGULAR,
                    color: Rgb::BLACK,
                    ..style
                };
                match self.place(surface, plan, fallback) {
                    Ok(placement) => {
                        report.fallbacks += 1;
                        placement
                    }
                    Err(err) => {
                        warn!(%err, text = %plan.render_text, "giving up on unit");
                        report.failed += 1;
                        return;
                    }
                }
            }
        };
        report.drawn += 1;
        if matches!(placement, Placement::Forced) {
            report.overflowed += 1;
        }
    }

    fn place<S: PageSurface>(
        &self,
        surface: &mut S,
        plan: &ReplacementPlan,
        style: TextStyle,
    ) -> Result<Placement, SurfaceError> {
        let rect = plan.target_rect;
        if plan.single_line && plan.fits {
            let origin = Point::new(rect.x0, rect.y1 - style.size * DESCENT);
            surface.insert_text(origin, &plan.render_text, &style)?;
            return Ok(Placement::Line);
        }

        let config = &self.options.fit;
        let mut request = TextboxRequest {
            rect,
            text: &plan.render_text,
            style,
            mode: TextboxMode::Fit,
        };
        if surface.insert_textbox(&request)?.fits {
            return Ok(Placement::Boxed);
        }
        for _ in 0..config.max_attempts {
            if request.style.size <= plan.floor_size {
                break;
            }
            request.style.size = (request.style.size * config.decay_factor).max(plan.floor_size);
            if surface.insert_textbox(&request)?.fits {
                return Ok(Placement::Boxed);
            }
        }

        request.style.size = plan.floor_size;
        request.mode = TextboxMode::Force;
        let outcome = surface.insert_textbox(&request)?;
        warn!(
            text = %plan.render_text,
            size = plan.floor_size,
            overflow = outcome.overflow,
            "text overflows its box; placed at the minimum size"
        );
        Ok(Placement::Forced)
    }
}

/// Source side of one fit: where the text goes and whose style it takes.
struct Slice<'a> {
    rect: Rect,
    source: &'a str,
    text: &'a str,
    style: &'a TextFragment,
}

/// Removes the original glyphs, painting white over them only when the
/// surface cannot remove text and no image lies underneath. Returns whether
/// the opaque fallback was used.
fn erase_regions<S: PageSurface>(surface: &mut S, regions: &[Rect], images: &[Rect]) -> bool {
    let err = match surface.erase_text(regions) {
        Ok(()) => return false,
        Err(err) => err,
    };
    warn!(%err, "transparent text removal unavailable; painting over originals");
    for region in regions {
        if images.iter().any(|image| image.intersects(region)) {
            warn!(?region, "original text overlaps an image; left in place");
            continue;
        }
        if let Err(err) = surface.fill_rect(*region, Rgb::WHITE) {
            warn!(%err, ?region, "failed to paint over original text");
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Arc;

    use super::*;
    use crate::fonts::FontMetrics;
    use crate::page::memory::{MemorySurface, SurfaceOp};
    use crate::page::{TextBlock, TextLine};
    use crate::translate::{TextTranslator, TranslateError, TranslationCache};

    fn fragment(text: &str, font: &str, x0: f32, baseline: f32, size: f32) -> TextFragment {
        let width = FontMetrics::default()
            .text_width(text, FontMapper::default().map(font), size)
            .unwrap_or(size * 0.5 * text.len() as f32);
        TextFragment {
            text: text.to_string(),
            bbox: Rect::new(x0, baseline - size * 0.8, x0 + width, baseline + size * 0.2),
            font: font.to_string(),
            size,
            color: Rgb::from_packed(0x336699),
        }
    }

    fn page(lines: Vec<Vec<TextFragment>>) -> PageText {
        PageText {
            index: 0,
            width: 595.0,
            height: 842.0,
            blocks: vec![TextBlock {
                lines: lines
                    .into_iter()
                    .map(|fragments| TextLine { fragments })
                    .collect(),
            }],
            images: Vec::new(),
        }
    }

    fn adapter(translator: impl TextTranslator + 'static) -> TranslationAdapter {
        TranslationAdapter::new(Arc::new(translator), Arc::new(TranslationCache::new(64)))
    }

    fn never() -> bool {
        false
    }

    fn to_spanish(text: &str) -> Result<String, TranslateError> {
        Ok(match text {
            "Hello world" => "Hola mundo entero y mucho mas".to_string(),
            "Annual report" => "Informe anual".to_string(),
            other => other.to_string(),
        })
    }

    #[test]
    fn identity_translation_leaves_the_page_alone() {
        let adapter = adapter(|text: &str| -> Result<String, TranslateError> { Ok(text.to_string()) });
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let mut surface = MemorySurface::new(595.0, 842.0);
        let page = page(vec![vec![fragment("Hello world", "Helvetica", 72.0, 100.0, 12.0)]]);

        let report = rewriter.rewrite(&page, &mut surface, &never).unwrap();
        assert_eq!(report.units, 1);
        assert_eq!(report.unchanged, 1);
        assert!(surface.ops().is_empty());
    }

    #[test]
    fn redrawn_identity_keeps_units_and_sizes_in_bounds() {
        let adapter = adapter(|text: &str| -> Result<String, TranslateError> { Ok(text.to_string()) });
        let options = RewriteOptions {
            redraw_unchanged: true,
            ..RewriteOptions::default()
        };
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), options);
        let mut surface = MemorySurface::new(595.0, 842.0);
        let page = page(vec![
            vec![fragment("Annual report", "Helvetica-Bold", 72.0, 100.0, 18.0)],
            vec![
                fragment("Revenue", "Helvetica", 72.0, 130.0, 10.0),
                fragment("1,234.50", "Helvetica", 300.0, 130.0, 10.0),
            ],
        ]);

        let report = rewriter.rewrite(&page, &mut surface, &never).unwrap();
        assert_eq!(report.units, 3);
        assert_eq!(report.drawn, 3);
        let drawn = surface.drawn_lines();
        assert_eq!(drawn.len(), 3);
        for (line, source) in drawn.iter().zip([18.0_f32, 10.0, 10.0]) {
            assert!(line.style.size <= source * 0.85 + 1e-4);
            assert!(line.style.size >= source * 0.5 - 1e-4);
        }
        assert_eq!(drawn[0].style.font, FontId::HelvBold);
        assert_eq!(drawn[0].style.color.to_packed(), 0x336699);
    }

    #[test]
    fn longer_translations_shrink_to_the_original_width() {
        let adapter = adapter(to_spanish);
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let mut surface = MemorySurface::new(595.0, 842.0);
        let source = fragment("Hello world", "Helvetica", 72.0, 100.0, 12.0);
        let page = page(vec![vec![source.clone()]]);

        let report = rewriter.rewrite(&page, &mut surface, &never).unwrap();
        assert_eq!(report.drawn, 1);
        assert!(matches!(surface.ops()[0], SurfaceOp::Erase { .. }));
        let drawn = surface.drawn_lines();
        assert!(drawn[0].style.size < 12.0 * 0.85);
        assert!(drawn[0].style.size >= 6.0 - 1e-4);
    }

    #[test]
    fn cancel_before_the_first_line_touches_nothing() {
        let adapter = adapter(to_spanish);
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let mut surface = MemorySurface::new(595.0, 842.0);
        let page = page(vec![vec![fragment("Hello world", "Helvetica", 72.0, 100.0, 12.0)]]);

        let result = rewriter.rewrite(&page, &mut surface, &|| true);
        assert_eq!(result, Err(Canceled));
        assert!(surface.ops().is_empty());
        assert_eq!(adapter.stats().backend_calls, 0);
    }

    #[test]
    fn cancel_between_lines_stops_the_page() {
        let adapter = adapter(to_spanish);
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let mut surface = MemorySurface::new(595.0, 842.0);
        let page = page(vec![
            vec![fragment("Hello world", "Helvetica", 72.0, 100.0, 12.0)],
            vec![fragment("Annual report", "Helvetica", 72.0, 130.0, 12.0)],
        ]);
        let polls = Cell::new(0);
        let cancel = || {
            polls.set(polls.get() + 1);
            polls.get() > 1
        };

        assert_eq!(rewriter.rewrite(&page, &mut surface, &cancel), Err(Canceled));
        assert!(surface.ops().is_empty());
        assert_eq!(adapter.stats().backend_calls, 1);
    }

    #[test]
    fn numeric_units_pass_through_untouched() {
        let adapter = adapter(|_: &str| -> Result<String, TranslateError> { Ok("nope".to_string()) });
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let mut surface = MemorySurface::new(595.0, 842.0);
        let page = page(vec![vec![fragment("3.14", "Helvetica", 72.0, 100.0, 12.0)]]);

        let report = rewriter.rewrite(&page, &mut surface, &never).unwrap();
        assert_eq!(report.unchanged, 1);
        assert!(surface.ops().is_empty());
        assert_eq!(adapter.stats().backend_calls, 0);
    }

    #[test]
    fn backend_failures_degrade_to_the_source_text() {
        let adapter = adapter(|_: &str| -> Result<String, TranslateError> {
            Err(TranslateError::EmptyResponse)
        });
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let mut surface = MemorySurface::new(595.0, 842.0);
        let page = page(vec![vec![fragment("Hello world", "Helvetica", 72.0, 100.0, 12.0)]]);

        let report = rewriter.rewrite(&page, &mut surface, &never).unwrap();
        assert_eq!(report.unchanged, 1);
        assert!(surface.ops().is_empty());
    }

    #[test]
    fn opaque_fallback_skips_regions_over_images() {
        let adapter = adapter(to_spanish);
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let mut surface = MemorySurface::new(595.0, 842.0).without_transparent_erase();
        let mut page = page(vec![
            vec![fragment("Hello world", "Helvetica", 72.0, 100.0, 12.0)],
            vec![fragment("Annual report", "Helvetica", 72.0, 300.0, 12.0)],
        ]);
        page.images.push(Rect::new(50.0, 250.0, 400.0, 350.0));

        let report = rewriter.rewrite(&page, &mut surface, &never).unwrap();
        assert!(report.opaque_erase);
        let fills: Vec<&SurfaceOp> = surface
            .ops()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Fill { .. }))
            .collect();
        assert_eq!(fills.len(), 1);
        assert!(matches!(fills[0], SurfaceOp::Fill { rect, color } if rect.y1 < 200.0 && *color == Rgb::WHITE));
        assert_eq!(report.drawn, 2);
    }

    #[test]
    fn failing_fonts_fall_back_to_regular_black() {
        let adapter = adapter(to_spanish);
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let mut surface = MemorySurface::new(595.0, 842.0).failing_font(FontId::HelvBold);
        let page = page(vec![vec![fragment("Annual report", "Arial-BoldMT", 72.0, 100.0, 12.0)]]);

        let report = rewriter.rewrite(&page, &mut surface, &never).unwrap();
        assert_eq!(report.fallbacks, 1);
        let drawn = surface.drawn_lines();
        assert_eq!(drawn[0].style.font, FontId::Helv);
        assert_eq!(drawn[0].style.color, Rgb::BLACK);
    }

    #[test]
    fn draw_failures_are_isolated_per_unit() {
        let adapter = adapter(to_spanish);
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let mut surface = MemorySurface::new(595.0, 842.0)
            .failing_font(FontId::HelvBold)
            .failing_font(FontId::Helv);
        let page = page(vec![
            vec![fragment("Annual report", "Arial-BoldMT", 72.0, 100.0, 12.0)],
            vec![fragment("Hello world", "Courier", 72.0, 130.0, 12.0)],
        ]);

        let report = rewriter.rewrite(&page, &mut surface, &never).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.drawn, 1);
        assert_eq!(surface.drawn_lines()[0].style.font, FontId::Cour);
    }

    #[test]
    fn multi_fragment_units_are_distributed_over_their_fragments() {
        let adapter = adapter(|_: &str| -> Result<String, TranslateError> {
            Ok("uno dos tres cuatro".to_string())
        });
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let first = fragment("Total", "Helvetica", 72.0, 100.0, 12.0);
        let second = fragment("amount", "Helvetica-Bold", first.bbox.x1 + 3.0, 100.0, 12.0);
        let page = page(vec![vec![first.clone(), second.clone()]]);

        let plan = rewriter
            .plan_page(&page, &FontMetrics::default(), &never)
            .unwrap();
        assert_eq!(plan.erase.len(), 1);
        assert_eq!(plan.plans.len(), 2);
        let words: Vec<&str> = plan
            .plans
            .iter()
            .flat_map(|plan| plan.render_text.split_whitespace())
            .collect();
        assert_eq!(words, vec!["uno", "dos", "tres", "cuatro"]);
        assert_eq!(plan.plans[0].target_rect, first.bbox);
        assert_eq!(plan.plans[1].font, FontId::HelvBold);
    }

    #[test]
    fn overflowing_text_is_forced_at_the_floor() {
        let adapter = adapter(|_: &str| -> Result<String, TranslateError> {
            Ok("una traduccion muchisimo mas larga que el texto original de partida".to_string())
        });
        let rewriter = PageRewriter::new(&adapter, FontMapper::default(), RewriteOptions::default());
        let mut surface = MemorySurface::new(595.0, 842.0);
        let page = page(vec![vec![fragment("Hi", "Helvetica", 72.0, 100.0, 12.0)]]);

        let report = rewriter.rewrite(&page, &mut surface, &never).unwrap();
        assert_eq!(report.overflowed, 1);
        let drawn = surface.drawn_lines();
        assert!(!drawn.is_empty());
        assert!(drawn.iter().all(|line| (line.style.size - 6.0).abs() < 1e-4));
        assert!(drawn.iter().all(|line| line.bbox.x1 <= 595.0));
    }
}
