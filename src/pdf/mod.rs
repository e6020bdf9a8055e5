//! lopdf-backed documents: loading, per-page extraction and the drawing
//! surface the rewriter paints on.

mod content;
mod encoding;
mod extract;
mod writer;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use thiserror::Error;
use tracing::debug;

use content::{Interpreter, PageBox, ShowRecord, remove_shows};
use encoding::encode_win_ansi;
use extract::{assemble_blocks, fragment_from_show, page_resources};
use writer::{
    append_content, font_dictionary, font_resource_name, page_box, read_content, rect_ops,
    register_fonts, replace_content, text_ops,
};

use crate::fonts::{FontContext, FontId, TextMeasure};
use crate::geometry::{Point, Rect, Rgb};
use crate::page::{
    PageSurface, PageText, SurfaceError, TextStyle, TextboxOutcome, TextboxRequest,
    layout_textbox,
};

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    #[error("encrypted PDFs are not supported")]
    Encrypted,
    #[error("page {0} not found")]
    PageNotFound(usize),
    #[error("failed to write PDF: {0}")]
    Write(String),
}

/// An open PDF together with the fonts used to measure and redraw its text.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    doc: Document,
    fonts: FontContext,
    font_objects: BTreeMap<FontId, ObjectId>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path).map_err(|source| PdfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        let doc = Document::load_mem(bytes).map_err(|err| PdfError::Parse(err.to_string()))?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(PdfError::Encrypted);
        }
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: Document) -> Self {
        Self {
            doc,
            fonts: FontContext::default(),
            font_objects: BTreeMap::new(),
        }
    }

    /// A document with an empty page tree.
    pub fn new_empty() -> Self {
        let mut document = Self::from_document(Document::with_version("1.5"));
        document.install_page_tree();
        document
    }

    pub fn with_fonts(mut self, fonts: FontContext) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn fonts(&self) -> &FontContext {
        &self.fonts
    }

    pub fn inner(&self) -> &Document {
        &self.doc
    }

    /// The copy translated text is written into; `self` stays untouched.
    pub fn clone_for_output(&self) -> Self {
        self.clone()
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    fn page_id(&self, index: usize) -> Result<ObjectId, PdfError> {
        u32::try_from(index + 1)
            .ok()
            .and_then(|number| self.doc.get_pages().get(&number).copied())
            .ok_or(PdfError::PageNotFound(index))
    }

    /// Blocks, lines and fragments of page `index` (zero based) plus its
    /// image regions, in top-left page coordinates.
    pub fn page_text(&self, index: usize) -> Result<PageText, PdfError> {
        let page_id = self.page_id(index)?;
        let page = page_box(&self.doc, page_id);
        let ops = decode_operations(&self.doc, page_id)
            .map_err(|err| PdfError::Parse(format!("page {}: {err}", index + 1)))?;
        let resources = page_resources(&self.doc, page_id);
        let scan = Interpreter::new(&resources, &self.fonts, page).run(&ops);

        let fragments = scan
            .shows
            .into_iter()
            .filter_map(fragment_from_show)
            .collect();
        Ok(PageText {
            index,
            width: page.width(),
            height: page.height(),
            blocks: assemble_blocks(fragments),
            images: scan.images,
        })
    }

    pub fn surface(&mut self, index: usize) -> Result<PdfPageSurface<'_>, PdfError> {
        let page_id = self.page_id(index)?;
        let page = page_box(&self.doc, page_id);
        Ok(PdfPageSurface {
            document: self,
            page_id,
            page,
            erased: None,
            pending: Vec::new(),
            used_fonts: BTreeSet::new(),
        })
    }

    pub fn add_blank_page(&mut self, width: f32, height: f32) -> Result<(), PdfError> {
        let pages_id = match self.pages_root() {
            Some(id) => id,
            None => self.install_page_tree(),
        };
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => Dictionary::new(),
        });

        let pages = self
            .doc
            .get_object_mut(pages_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| PdfError::Write(err.to_string()))?;
        match pages.get_mut(b"Kids") {
            Ok(Object::Array(kids)) => kids.push(Object::Reference(page_id)),
            _ => pages.set("Kids", vec![Object::Reference(page_id)]),
        }
        let count = pages
            .get(b"Count")
            .and_then(Object::as_i64)
            .unwrap_or(0);
        pages.set("Count", count + 1);
        Ok(())
    }

    pub fn save(&mut self, path: &Path) -> Result<(), PdfError> {
        self.prepare_for_write();
        self.doc
            .save(path)
            .map(|_| ())
            .map_err(|err| PdfError::Write(err.to_string()))
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        self.prepare_for_write();
        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|err| PdfError::Write(err.to_string()))?;
        Ok(bytes)
    }

    fn prepare_for_write(&mut self) {
        let pruned = self.doc.prune_objects();
        self.font_objects.clear();
        if !pruned.is_empty() {
            debug!(objects = pruned.len(), "dropped unreferenced objects");
        }
        self.doc.compress();
    }

    fn pages_root(&self) -> Option<ObjectId> {
        let root = self.doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
        self.doc
            .get_object(root)
            .ok()?
            .as_dict()
            .ok()?
            .get(b"Pages")
            .ok()?
            .as_reference()
            .ok()
    }

    fn install_page_tree(&mut self) -> ObjectId {
        let pages_id = self.doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        pages_id
    }

    fn write_page(
        &mut self,
        page_id: ObjectId,
        erased: Option<Vec<Operation>>,
        pending: Vec<Operation>,
        used_fonts: BTreeSet<FontId>,
    ) -> lopdf::Result<()> {
        if let Some(ops) = erased {
            replace_content(&mut self.doc, page_id, ops)?;
        }
        if pending.is_empty() {
            return Ok(());
        }
        let fonts: BTreeMap<FontId, ObjectId> = used_fonts
            .into_iter()
            .map(|font| (font, self.font_object(font)))
            .collect();
        register_fonts(&mut self.doc, page_id, &fonts)?;
        append_content(&mut self.doc, page_id, pending)
    }

    fn font_object(&mut self, font: FontId) -> ObjectId {
        if let Some(id) = self.font_objects.get(&font) {
            return *id;
        }
        let id = self.doc.add_object(font_dictionary(font));
        self.font_objects.insert(font, id);
        id
    }
}

fn decode_operations(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<Operation>> {
    let bytes = read_content(doc, page_id);
    Ok(Content::decode(&bytes)?.operations)
}

/// Drawing surface over one page of a [`PdfDocument`].
///
/// Erasure and drawing are both buffered; the page is only modified by
/// [`PdfPageSurface::commit`], and a surface dropped without committing
/// leaves it as it was.
pub struct PdfPageSurface<'a> {
    document: &'a mut PdfDocument,
    page_id: ObjectId,
    page: PageBox,
    /// Page content with the erased shows removed.
    erased: Option<Vec<Operation>>,
    pending: Vec<Operation>,
    used_fonts: BTreeSet<FontId>,
}

impl PdfPageSurface<'_> {
    /// Writes the erased content and everything drawn so far to the page.
    ///
    /// On failure the page dictionary is restored, so the page keeps its
    /// original text.
    pub fn commit(self) -> Result<(), PdfError> {
        let PdfPageSurface {
            document,
            page_id,
            erased,
            pending,
            used_fonts,
            ..
        } = self;
        if erased.is_none() && pending.is_empty() {
            return Ok(());
        }
        let snapshot = document
            .doc
            .get_object(page_id)
            .cloned()
            .map_err(|err| PdfError::Write(err.to_string()))?;
        let result = document.write_page(page_id, erased, pending, used_fonts);
        if let Err(err) = result {
            document.doc.objects.insert(page_id, snapshot);
            return Err(PdfError::Write(err.to_string()));
        }
        Ok(())
    }

    fn push_line(
        &mut self,
        origin: Point,
        text: &str,
        style: &TextStyle,
    ) -> Result<(), SurfaceError> {
        if !style.size.is_finite() || style.size <= 0.0 {
            return Err(SurfaceError::Draw(format!("invalid font size {}", style.size)));
        }
        if !origin.x.is_finite() || !origin.y.is_finite() {
            return Err(SurfaceError::Draw("origin is not finite".to_string()));
        }
        let (bytes, missing) = encode_win_ansi(text);
        if missing > 0 {
            debug!(missing, font = %style.font, "characters outside WinAnsi replaced");
        }
        let resource = font_resource_name(style.font);
        let position = self.page.to_user(origin.x, origin.y);
        self.pending
            .extend(text_ops(&resource, style.size, style.color, position, bytes));
        self.used_fonts.insert(style.font);
        Ok(())
    }
}

impl TextMeasure for PdfPageSurface<'_> {
    fn text_width(&self, text: &str, font: FontId, size: f32) -> Option<f32> {
        self.document.fonts.metrics.text_width(text, font, size)
    }
}

impl PageSurface for PdfPageSurface<'_> {
    fn page_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.page.width(), self.page.height())
    }

    fn erase_text(&mut self, regions: &[Rect]) -> Result<(), SurfaceError> {
        if regions.is_empty() {
            return Ok(());
        }
        let buffered = self.erased.is_some();
        let ops = match self.erased.take() {
            Some(ops) => ops,
            None => decode_operations(&self.document.doc, self.page_id)
                .map_err(|err| SurfaceError::Encoding(err.to_string()))?,
        };
        let resources = page_resources(&self.document.doc, self.page_id);
        let scan = Interpreter::new(&resources, &self.document.fonts, self.page).run(&ops);
        let targets: Vec<&ShowRecord> = scan
            .shows
            .iter()
            .filter(|show| {
                let center = show.bbox.center();
                regions.iter().any(|region| region.contains_point(center))
            })
            .collect();
        if targets.is_empty() {
            self.erased = buffered.then_some(ops);
            return Ok(());
        }
        debug!(removed = targets.len(), "removing original text operators");
        self.erased = Some(remove_shows(&ops, &targets));
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb) -> Result<(), SurfaceError> {
        if rect.is_degenerate() {
            return Ok(());
        }
        let (x, y) = self.page.to_user(rect.x0, rect.y1);
        self.pending
            .extend(rect_ops(x, y, rect.width(), rect.height(), color));
        Ok(())
    }

    fn insert_text(
        &mut self,
        origin: Point,
        text: &str,
        style: &TextStyle,
    ) -> Result<(), SurfaceError> {
        self.push_line(origin, text, style)
    }

    fn insert_textbox(
        &mut self,
        request: &TextboxRequest<'_>,
    ) -> Result<TextboxOutcome, SurfaceError> {
        let layout = layout_textbox(request, &self.document.fonts.metrics, self.page_rect());
        for line in &layout.lines {
            self.push_line(line.origin, &line.text, &request.style)?;
        }
        Ok(TextboxOutcome {
            fits: layout.fits,
            lines_drawn: layout.lines.len(),
            overflow: layout.overflow,
        })
    }
}
