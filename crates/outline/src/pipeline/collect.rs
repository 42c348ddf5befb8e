use crate::config::HeuristicsConfig;
use crate::decoder::DocumentDecoder;
use crate::ocr::{OcrCapability, OcrEngine};
use crate::text::collapse_whitespace;
use crate::types::{BBox, Line, TextBlock};
use crate::OutlineError;

/// One list of lines per page, in each page's block order.
///
/// Block extraction errors abort collection. Typography lookups never do:
/// a failed span lookup falls back to the default size, not bold.
pub fn collect_lines(
    decoder: &dyn DocumentDecoder,
    ocr: &OcrCapability,
    config: &HeuristicsConfig,
) -> Result<Vec<Vec<Line>>, OutlineError> {
    (0..decoder.page_count())
        .map(|page| {
            let blocks = page_blocks(decoder, ocr, page)?;
            Ok(lines_from_blocks(decoder, page, blocks, config))
        })
        .collect()
}

fn lines_from_blocks(
    decoder: &dyn DocumentDecoder,
    page: usize,
    blocks: Vec<TextBlock>,
    config: &HeuristicsConfig,
) -> Vec<Line> {
    blocks
        .into_iter()
        .filter_map(|block| {
            let text = collapse_whitespace(&block.text);
            if text.is_empty() {
                return None;
            }
            let (font_size, is_bold) = font_stats(decoder, page, &block.bbox, config.default_font_size);
            Some(Line {
                page,
                text,
                bbox: block.bbox,
                font_size,
                is_bold,
            })
        })
        .collect()
}

/// Median span size and "any span bold" for the spans inside `bbox`.
pub fn font_stats(
    decoder: &dyn DocumentDecoder,
    page: usize,
    bbox: &BBox,
    default_size: f32,
) -> (f32, bool) {
    match decoder.spans_in(page, bbox) {
        Ok(spans) if !spans.is_empty() => {
            let sizes: Vec<f32> = spans.iter().map(|s| s.font_size).collect();
            let is_bold = spans.iter().any(|s| s.is_bold);
            (median(sizes).unwrap_or(default_size), is_bold)
        }
        Ok(_) => (default_size, false),
        Err(e) => {
            log::warn!("span lookup failed on page {}: {}", page + 1, e);
            (default_size, false)
        }
    }
}

/// Text blocks for a page, falling back to OCR when the page has no text
/// layer but does carry images.
fn page_blocks(
    decoder: &dyn DocumentDecoder,
    ocr: &OcrCapability,
    page: usize,
) -> Result<Vec<TextBlock>, OutlineError> {
    let blocks = decoder.text_blocks(page)?;
    if !blocks.is_empty() {
        return Ok(blocks);
    }
    let Some(engine) = ocr.engine() else {
        return Ok(blocks);
    };

    match decoder.has_images(page) {
        Ok(true) => {}
        Ok(false) => return Ok(blocks),
        Err(e) => {
            log::warn!("image lookup failed on page {}: {}", page + 1, e);
            return Ok(blocks);
        }
    }

    match ocr_page(decoder, engine, page) {
        Ok(recognized) => {
            log::debug!("page {}: {} lines from OCR", page + 1, recognized.len());
            Ok(recognized)
        }
        Err(e) => {
            log::warn!("OCR failed on page {}: {}", page + 1, e);
            Ok(Vec::new())
        }
    }
}

fn ocr_page(
    decoder: &dyn DocumentDecoder,
    engine: &dyn OcrEngine,
    page: usize,
) -> Result<Vec<TextBlock>, OutlineError> {
    let image = decoder
        .page_image(page)?
        .ok_or_else(|| OutlineError::Ocr("no readable image on page".into()))?;
    let geometry = decoder.page_geometry(page)?;
    engine.recognize(&image, &geometry)
}

fn median(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
