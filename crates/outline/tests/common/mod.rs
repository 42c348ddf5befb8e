//! In-memory [`DocumentDecoder`] for driving the pipeline with synthetic
//! documents. Every line is a single block backed by a single glyph span.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use outline::images::{ImageFormat, PageImage};
use outline::{BBox, DocumentDecoder, GlyphSpan, OutlineError, PageGeometry, TextBlock};

pub const LETTER_WIDTH: f32 = 612.0;
pub const LETTER_HEIGHT: f32 = 792.0;

#[derive(Debug, Clone)]
pub struct FakeLine {
    pub text: String,
    pub bbox: BBox,
    pub font_size: f32,
    pub is_bold: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub lines: Vec<FakeLine>,
    pub tables: Vec<BBox>,
    pub has_images: bool,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A left-aligned line at `y0`, as tall as its font size.
    pub fn line(self, text: &str, y0: f32, font_size: f32) -> Self {
        self.line_at(text, 72.0, y0, font_size, false)
    }

    pub fn bold(self, text: &str, y0: f32, font_size: f32) -> Self {
        self.line_at(text, 72.0, y0, font_size, true)
    }

    pub fn line_at(mut self, text: &str, x0: f32, y0: f32, font_size: f32, is_bold: bool) -> Self {
        let width = text.chars().count() as f32 * font_size * 0.5;
        self.lines.push(FakeLine {
            text: text.to_string(),
            bbox: BBox::new(x0, y0, x0 + width, y0 + font_size),
            font_size,
            is_bold,
        });
        self
    }

    /// Ordinary body paragraph text.
    pub fn body(self, y0: f32) -> Self {
        self.line(
            "Body text continues here with enough words to count toward the baseline.",
            y0,
            10.0,
        )
    }

    pub fn table(mut self, region: BBox) -> Self {
        self.tables.push(region);
        self
    }

    pub fn with_images(mut self) -> Self {
        self.has_images = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeDecoder {
    pub pages: Vec<FakePage>,
    pub fail_blocks_on: Option<usize>,
    pub fail_spans: bool,
    pub fail_tables: bool,
    /// Shared so callers can inspect it after the decoder is consumed.
    pub table_calls: Rc<Cell<usize>>,
}

impl FakeDecoder {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    fn page(&self, page: usize) -> Result<&FakePage, OutlineError> {
        self.pages
            .get(page)
            .ok_or_else(|| OutlineError::Lookup(format!("no page {}", page)))
    }
}

impl DocumentDecoder for FakeDecoder {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_geometry(&self, page: usize) -> Result<PageGeometry, OutlineError> {
        self.page(page)?;
        Ok(PageGeometry::new(LETTER_WIDTH, LETTER_HEIGHT))
    }

    fn page_text(&self, page: usize) -> Result<String, OutlineError> {
        Ok(self
            .page(page)?
            .lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn text_blocks(&self, page: usize) -> Result<Vec<TextBlock>, OutlineError> {
        if self.fail_blocks_on == Some(page) {
            return Err(OutlineError::Open(format!("broken content stream on page {}", page)));
        }
        let mut blocks: Vec<TextBlock> = self
            .page(page)?
            .lines
            .iter()
            .map(|l| TextBlock {
                text: l.text.clone(),
                bbox: l.bbox,
            })
            .collect();
        blocks.sort_by(|a, b| a.bbox.y0.total_cmp(&b.bbox.y0).then(a.bbox.x0.total_cmp(&b.bbox.x0)));
        Ok(blocks)
    }

    fn spans_in(&self, page: usize, region: &BBox) -> Result<Vec<GlyphSpan>, OutlineError> {
        if self.fail_spans {
            return Err(OutlineError::Lookup("font table unreadable".into()));
        }
        Ok(self
            .page(page)?
            .lines
            .iter()
            .filter(|l| {
                let (cx, cy) = l.bbox.center();
                region.contains_point(cx, cy)
            })
            .map(|l| GlyphSpan {
                text: l.text.clone(),
                bbox: l.bbox,
                font_size: l.font_size,
                is_bold: l.is_bold,
            })
            .collect())
    }

    fn find_tables(&self, page: usize) -> Result<Vec<BBox>, OutlineError> {
        self.table_calls.set(self.table_calls.get() + 1);
        if self.fail_tables {
            return Err(OutlineError::Lookup("table finder crashed".into()));
        }
        Ok(self.page(page)?.tables.clone())
    }

    fn has_images(&self, page: usize) -> Result<bool, OutlineError> {
        Ok(self.page(page)?.has_images)
    }

    fn page_image(&self, page: usize) -> Result<Option<PageImage>, OutlineError> {
        if !self.page(page)?.has_images {
            return Ok(None);
        }
        Ok(Some(PageImage {
            name: "Im1".to_string(),
            width: 1224,
            height: 1584,
            format: ImageFormat::Png,
            bytes: Vec::new(),
        }))
    }
}
