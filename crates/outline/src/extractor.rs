use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::config::HeuristicsConfig;
use crate::decoder::{DocumentDecoder, LopdfDecoder};
use crate::ocr::OcrCapability;
use crate::pipeline::{
    apply_drop_set, build_outline, classify_document, collect_lines,
    detect_repeated_headers_footers, extract_title, in_dense_layout, merge_multiline_headings,
    pick_candidates,
};
use crate::types::{BBox, DocumentProfile, Outline, PageGeometry};
use crate::OutlineError;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Where a document is in the pipeline. Transitions are strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Opened,
    Classified,
    LinesCollected,
    BoilerplateMasked,
    Merged,
    CandidatesSelected,
    Titled,
    Leveled,
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Opened => "opened",
            Stage::Classified => "classified",
            Stage::LinesCollected => "lines collected",
            Stage::BoilerplateMasked => "boilerplate masked",
            Stage::Merged => "merged",
            Stage::CandidatesSelected => "candidates selected",
            Stage::Titled => "titled",
            Stage::Leveled => "leveled",
            Stage::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// OutlineExtractor
// ---------------------------------------------------------------------------

/// Per-document extraction state.
///
/// Build one per document and consume it with [`OutlineExtractor::extract`].
/// The table cache and profile belong to this document only.
pub struct OutlineExtractor<D: DocumentDecoder> {
    decoder: D,
    config: HeuristicsConfig,
    ocr: OcrCapability,
    table_cache: HashMap<usize, Vec<BBox>>,
    profile: Option<DocumentProfile>,
    stage: Stage,
}

impl<D: DocumentDecoder> OutlineExtractor<D> {
    pub fn new(decoder: D, config: HeuristicsConfig, ocr: OcrCapability) -> Self {
        log::debug!("stage: {} ({} pages)", Stage::Opened, decoder.page_count());
        Self {
            decoder,
            config,
            ocr,
            table_cache: HashMap::new(),
            profile: None,
            stage: Stage::Opened,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn profile(&self) -> Option<DocumentProfile> {
        self.profile
    }

    fn advance(&mut self, stage: Stage) {
        log::debug!("stage: {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn failed(&self, err: OutlineError) -> OutlineError {
        match err {
            OutlineError::Stage { .. } => err,
            other => OutlineError::Stage {
                stage: self.stage,
                message: other.to_string(),
            },
        }
    }

    /// Classify the document from its first page.
    pub fn classify(&mut self) -> Result<DocumentProfile, OutlineError> {
        if let Some(profile) = self.profile {
            return Ok(profile);
        }
        let first_page = if self.decoder.page_count() > 0 {
            self.decoder.page_text(0)?
        } else {
            String::new()
        };
        let profile = classify_document(&first_page);
        self.profile = Some(profile);
        Ok(profile)
    }

    /// Run every stage and produce the outline.
    ///
    /// Panics inside a stage are caught and reported as a stage failure.
    /// The decoder is dropped, and the document released, on every path.
    pub fn extract(mut self) -> Result<Outline, OutlineError> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run()));
        let result = match result {
            Ok(inner) => inner.map_err(|e| self.failed(e)),
            Err(payload) => Err(OutlineError::Stage {
                stage: self.stage,
                message: panic_message(payload.as_ref()),
            }),
        };
        self.advance(Stage::Closed);
        result
    }

    fn run(&mut self) -> Result<Outline, OutlineError> {
        let profile = self.classify()?;
        log::debug!("document profile: {}", profile);
        self.advance(Stage::Classified);

        let pages = collect_lines(&self.decoder, &self.ocr, &self.config)?;
        log::debug!(
            "collected {} lines",
            pages.iter().map(Vec::len).sum::<usize>()
        );
        self.advance(Stage::LinesCollected);

        let geometries = self.page_geometries();
        let drops = detect_repeated_headers_footers(&pages, &geometries, &self.config);
        log::debug!("masking {} boilerplate lines", drops.len());
        let filtered = apply_drop_set(&pages, &drops);
        self.advance(Stage::BoilerplateMasked);

        let merged = merge_multiline_headings(filtered, &self.config);
        self.advance(Stage::Merged);

        let decoder = &self.decoder;
        let cache = &mut self.table_cache;
        let candidates = pick_candidates(&merged, &self.config, |line| {
            in_dense_layout(line, cached_tables(cache, decoder, line.page))
        });
        log::debug!("selected {} candidates", candidates.len());
        self.advance(Stage::CandidatesSelected);

        let title = merged.first().and_then(|first| extract_title(first));
        self.advance(Stage::Titled);

        let outline = build_outline(title.as_deref(), candidates, self.config.max_levels);
        self.advance(Stage::Leveled);

        log::info!(
            "outline: title {:?}, {} headings",
            title.as_deref().unwrap_or(""),
            outline.len()
        );
        Ok(Outline {
            title: title.unwrap_or_default(),
            outline,
        })
    }

    /// Geometry per page; a failed lookup leaves that page out of
    /// boilerplate detection.
    fn page_geometries(&self) -> Vec<Option<PageGeometry>> {
        (0..self.decoder.page_count())
            .map(|page| match self.decoder.page_geometry(page) {
                Ok(geometry) => Some(geometry),
                Err(e) => {
                    log::warn!("no geometry for page {}: {}", page + 1, e);
                    None
                }
            })
            .collect()
    }
}

/// Table regions for `page`, detected at most once per document. Detection
/// failures count as "no tables".
fn cached_tables<'c>(
    cache: &'c mut HashMap<usize, Vec<BBox>>,
    decoder: &dyn DocumentDecoder,
    page: usize,
) -> &'c [BBox] {
    cache.entry(page).or_insert_with(|| {
        decoder.find_tables(page).unwrap_or_else(|e| {
            log::warn!("table detection failed on page {}: {}", page + 1, e);
            Vec::new()
        })
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run the pipeline over any decoder.
pub fn extract_outline_with<D: DocumentDecoder>(
    decoder: D,
    config: &HeuristicsConfig,
    ocr: &OcrCapability,
) -> Result<Outline, OutlineError> {
    OutlineExtractor::new(decoder, config.clone(), ocr.clone()).extract()
}

/// Open `path` and extract its outline, surfacing any failure.
pub fn try_extract_outline(
    path: &Path,
    config: &HeuristicsConfig,
    ocr: &OcrCapability,
) -> Result<Outline, OutlineError> {
    let decoder = LopdfDecoder::open(path)?.with_table_config(config.tables.clone());
    extract_outline_with(decoder, config, ocr)
}

/// Like [`try_extract_outline`], but any failure yields the empty outline.
pub fn extract_outline_or_default(
    path: &Path,
    config: &HeuristicsConfig,
    ocr: &OcrCapability,
) -> Outline {
    try_extract_outline(path, config, ocr).unwrap_or_else(|e| {
        log::error!("error processing {}: {}", path.display(), e);
        Outline::default()
    })
}

/// Outline of the PDF at `path` with default thresholds and no OCR.
///
/// Never fails: malformed, encrypted and unreadable files produce
/// `{title: "", outline: []}`.
pub fn extract_outline(path: impl AsRef<Path>) -> Outline {
    extract_outline_or_default(
        path.as_ref(),
        &HeuristicsConfig::default(),
        &OcrCapability::Absent,
    )
}

/// Classification of the PDF at `path`.
pub fn document_profile(path: &Path) -> Result<DocumentProfile, OutlineError> {
    let decoder = LopdfDecoder::open(path)?;
    let mut extractor =
        OutlineExtractor::new(decoder, HeuristicsConfig::default(), OcrCapability::Absent);
    extractor.classify()
}

/// Text of every page, concatenated and trimmed.
pub fn extract_text_with(decoder: &dyn DocumentDecoder) -> Result<String, OutlineError> {
    let mut text = String::new();
    for page in 0..decoder.page_count() {
        let page_text = decoder.page_text(page)?;
        if !page_text.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&page_text);
        }
    }
    Ok(text.trim().to_string())
}

pub fn extract_text(path: &Path) -> Result<String, OutlineError> {
    let decoder = LopdfDecoder::open(path)?;
    extract_text_with(&decoder)
}
