//! Whole-document translation: pages of an output copy are rewritten one at
//! a time from the untouched source.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::fonts::FontContext;
use crate::page::memory::{MemorySurface, SurfaceOp};
use crate::pdf::{PdfDocument, PdfError};
use crate::rewrite::{Canceled, PagePlan, PageReport, PageRewriter, ReplacementPlan, RewriteOptions};
use crate::translate::TranslationAdapter;

/// Size of the page added when the source has none (A4 portrait, points).
pub const BLANK_PAGE_SIZE: (f32, f32) = (595.0, 842.0);

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("translation canceled")]
    Canceled,
    #[error(transparent)]
    Pdf(#[from] PdfError),
}

impl From<Canceled> for DocumentError {
    fn from(_: Canceled) -> Self {
        DocumentError::Canceled
    }
}

#[derive(Debug)]
pub struct TranslatedDocument {
    pub document: PdfDocument,
    /// Pages in the source document.
    pub total_pages: usize,
    pub reports: Vec<PageReport>,
    /// Zero-based pages left as they were because they could not be read
    /// or rewritten.
    pub failed_pages: Vec<usize>,
}

/// Dry-run output for one page.
#[derive(Debug, Clone, Serialize)]
pub struct PagePreview {
    /// One-based page number.
    pub page: usize,
    pub plans: Vec<ReplacementPlan>,
    pub report: PageReport,
    pub ops: Vec<SurfaceOp>,
}

/// Opens `path` and translates every page.
///
/// I/O and parse failures on open are fatal; everything after that degrades
/// per page except cancellation.
pub fn translate_document(
    path: &Path,
    fonts: FontContext,
    adapter: &TranslationAdapter,
    options: &RewriteOptions,
    progress: &dyn Fn(usize, usize),
    cancel: &dyn Fn() -> bool,
) -> Result<TranslatedDocument, DocumentError> {
    let source = PdfDocument::open(path)?.with_fonts(fonts);
    translate_pdf(&source, adapter, options, progress, cancel)
}

/// Translates `source` into a new document; `source` is never modified.
///
/// `progress(current, total)` runs after every page and `cancel` before every
/// page and every line. A canceled run drops the partial output.
pub fn translate_pdf(
    source: &PdfDocument,
    adapter: &TranslationAdapter,
    options: &RewriteOptions,
    progress: &dyn Fn(usize, usize),
    cancel: &dyn Fn() -> bool,
) -> Result<TranslatedDocument, DocumentError> {
    let total_pages = source.page_count();
    let mut output = source.clone_for_output();
    let rewriter = PageRewriter::new(adapter, source.fonts().mapper, *options);
    let mut reports = Vec::with_capacity(total_pages);
    let mut failed_pages = Vec::new();

    if total_pages == 0 {
        let (width, height) = BLANK_PAGE_SIZE;
        output.add_blank_page(width, height)?;
        info!("source has no pages; added a blank page");
    }

    for index in 0..total_pages {
        if cancel() {
            return Err(DocumentError::Canceled);
        }
        match rewrite_page(source, &mut output, &rewriter, index, cancel) {
            Ok(report) => reports.push(report),
            Err(DocumentError::Canceled) => return Err(DocumentError::Canceled),
            Err(err) => {
                warn!(page = index + 1, %err, "page left untranslated");
                failed_pages.push(index);
            }
        }
        progress(index + 1, total_pages);
    }

    Ok(TranslatedDocument {
        document: output,
        total_pages,
        reports,
        failed_pages,
    })
}

fn rewrite_page(
    source: &PdfDocument,
    output: &mut PdfDocument,
    rewriter: &PageRewriter<'_>,
    index: usize,
    cancel: &dyn Fn() -> bool,
) -> Result<PageReport, DocumentError> {
    let page = source.page_text(index)?;
    let mut surface = output.surface(index)?;
    let report = rewriter.rewrite(&page, &mut surface, cancel)?;
    surface.commit()?;
    Ok(report)
}

/// Plans and replays every page on in-memory surfaces without producing a PDF.
pub fn preview_pdf(
    source: &PdfDocument,
    adapter: &TranslationAdapter,
    options: &RewriteOptions,
    cancel: &dyn Fn() -> bool,
) -> Result<Vec<PagePreview>, DocumentError> {
    let rewriter = PageRewriter::new(adapter, source.fonts().mapper, *options);
    let mut previews = Vec::with_capacity(source.page_count());
    for index in 0..source.page_count() {
        if cancel() {
            return Err(DocumentError::Canceled);
        }
        let page = match source.page_text(index) {
            Ok(page) => page,
            Err(err) => {
                warn!(page = index + 1, %err, "page skipped");
                continue;
            }
        };
        let mut surface = MemorySurface::new(page.width, page.height)
            .with_metrics(source.fonts().metrics.clone());
        let plan: PagePlan = rewriter.plan_page(&page, &surface, cancel)?;
        let plans = plan.plans.clone();
        let report = rewriter.apply(&page, plan, &mut surface, cancel)?;
        previews.push(PagePreview {
            page: index + 1,
            plans,
            report,
            ops: surface.into_ops(),
        });
    }
    Ok(previews)
}
