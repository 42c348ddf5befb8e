use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::images::{self, PageImage};
use crate::parser::backend::{LopdfBackend, PageId, PdfBackend};
use crate::parser::layout::{extract_page_layout, PageFrame, PageLayout};
use crate::parser::table::{find_table_regions, TableDetectorConfig};
use crate::types::{BBox, GlyphSpan, PageGeometry, TextBlock};
use crate::OutlineError;

/// Everything the heading pipeline needs from a parsed PDF.
///
/// Pages are addressed by 0-based index. Lookups that a document may simply
/// not support (tables, images) default to "nothing found".
pub trait DocumentDecoder {
    fn page_count(&self) -> usize;

    fn page_geometry(&self, page: usize) -> Result<PageGeometry, OutlineError>;

    /// Plain text of one page.
    fn page_text(&self, page: usize) -> Result<String, OutlineError>;

    /// Text blocks in reading order: top-to-bottom, then left-to-right.
    fn text_blocks(&self, page: usize) -> Result<Vec<TextBlock>, OutlineError>;

    /// Glyph runs whose centre lies inside `region`.
    fn spans_in(&self, page: usize, region: &BBox) -> Result<Vec<GlyphSpan>, OutlineError>;

    fn find_tables(&self, _page: usize) -> Result<Vec<BBox>, OutlineError> {
        Ok(Vec::new())
    }

    fn has_images(&self, _page: usize) -> Result<bool, OutlineError> {
        Ok(false)
    }

    /// The page's most prominent image, used as OCR input.
    fn page_image(&self, _page: usize) -> Result<Option<PageImage>, OutlineError> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// LopdfDecoder
// ---------------------------------------------------------------------------

/// [`DocumentDecoder`] over a document parsed with `lopdf`.
///
/// Page layouts are computed on first use and cached for the decoder's
/// lifetime. Dropping the decoder releases the document.
pub struct LopdfDecoder {
    backend: LopdfBackend,
    page_ids: Vec<PageId>,
    layouts: RefCell<Vec<Option<Rc<PageLayout>>>>,
    table_config: TableDetectorConfig,
    source: String,
}

impl LopdfDecoder {
    pub fn open(path: &Path) -> Result<Self, OutlineError> {
        let backend = LopdfBackend::load_path(path)?;
        Ok(Self::from_backend(backend, path.display().to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, OutlineError> {
        let backend = LopdfBackend::load_bytes(data)?;
        Ok(Self::from_backend(backend, "<memory>".to_string()))
    }

    fn from_backend(backend: LopdfBackend, source: String) -> Self {
        let page_ids: Vec<PageId> = backend.pages().into_values().collect();
        log::debug!("opened {} ({} pages)", source, page_ids.len());
        Self {
            layouts: RefCell::new(vec![None; page_ids.len()]),
            backend,
            page_ids,
            table_config: TableDetectorConfig::default(),
            source,
        }
    }

    pub fn with_table_config(mut self, config: TableDetectorConfig) -> Self {
        self.table_config = config;
        self
    }

    fn page_id(&self, page: usize) -> Result<PageId, OutlineError> {
        self.page_ids.get(page).copied().ok_or_else(|| {
            OutlineError::Lookup(format!(
                "page index {} out of range ({} pages)",
                page,
                self.page_ids.len()
            ))
        })
    }

    /// Visible box and rotation of the page, as displayed.
    fn frame(&self, page_id: PageId) -> Result<PageFrame, OutlineError> {
        Ok(PageFrame::new(
            self.backend.crop_box(page_id)?,
            self.backend.rotation(page_id)?,
        ))
    }

    fn layout(&self, page: usize) -> Result<Rc<PageLayout>, OutlineError> {
        if let Some(cached) = self.layouts.borrow().get(page).cloned().flatten() {
            return Ok(cached);
        }

        let page_id = self.page_id(page)?;
        let frame = self.frame(page_id)?;
        let layout = Rc::new(extract_page_layout(&self.backend, page_id, &frame)?);
        log::debug!(
            "page {}: {} spans, {} blocks",
            page + 1,
            layout.spans.len(),
            layout.blocks.len()
        );

        if let Some(slot) = self.layouts.borrow_mut().get_mut(page) {
            *slot = Some(Rc::clone(&layout));
        }
        Ok(layout)
    }
}

impl DocumentDecoder for LopdfDecoder {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_geometry(&self, page: usize) -> Result<PageGeometry, OutlineError> {
        let (width, height) = self.frame(self.page_id(page)?)?.size();
        Ok(PageGeometry::new(width, height))
    }

    fn page_text(&self, page: usize) -> Result<String, OutlineError> {
        Ok(self.layout(page)?.text())
    }

    fn text_blocks(&self, page: usize) -> Result<Vec<TextBlock>, OutlineError> {
        Ok(self.layout(page)?.blocks.clone())
    }

    fn spans_in(&self, page: usize, region: &BBox) -> Result<Vec<GlyphSpan>, OutlineError> {
        Ok(self.layout(page)?.spans_in(region))
    }

    fn find_tables(&self, page: usize) -> Result<Vec<BBox>, OutlineError> {
        let layout = self.layout(page)?;
        Ok(find_table_regions(&layout.spans, &self.table_config))
    }

    fn has_images(&self, page: usize) -> Result<bool, OutlineError> {
        images::page_has_images(&self.backend, self.page_id(page)?)
    }

    fn page_image(&self, page: usize) -> Result<Option<PageImage>, OutlineError> {
        images::largest_page_image(&self.backend, self.page_id(page)?)
    }
}

impl Drop for LopdfDecoder {
    fn drop(&mut self) {
        log::debug!("released {}", self.source);
    }
}
