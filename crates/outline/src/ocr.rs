//! Optional OCR for pages that carry no text layer.
//!
//! OCR is a capability resolved once at startup and injected into the
//! extractor. When no engine is available, image-only pages simply
//! contribute no lines.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::images::PageImage;
use crate::text::collapse_whitespace;
use crate::types::{BBox, PageGeometry, TextBlock};
use crate::OutlineError;

/// Recognizes text lines in a rendered page image.
pub trait OcrEngine: Send + Sync {
    /// Text lines found in `image`, with boxes in the page coordinate space
    /// described by `geometry`.
    fn recognize(
        &self,
        image: &PageImage,
        geometry: &PageGeometry,
    ) -> Result<Vec<TextBlock>, OutlineError>;

    fn name(&self) -> &str;
}

/// Whether an OCR engine is available to the extractor.
#[derive(Clone, Default)]
pub enum OcrCapability {
    #[default]
    Absent,
    Present(Arc<dyn OcrEngine>),
}

impl OcrCapability {
    /// Look for a `tesseract` binary on `PATH`, recognizing `language`
    /// (a tesseract language code such as `eng` or `eng+deu`).
    pub fn detect(language: &str) -> Self {
        match TesseractOcr::locate().map(|engine| engine.with_language(language)) {
            Some(engine) => {
                log::info!(
                    "OCR enabled: {} ({})",
                    engine.binary.display(),
                    engine.language
                );
                OcrCapability::Present(Arc::new(engine))
            }
            None => {
                log::info!("OCR unavailable: tesseract not found on PATH");
                OcrCapability::Absent
            }
        }
    }

    pub fn engine(&self) -> Option<&dyn OcrEngine> {
        match self {
            OcrCapability::Absent => None,
            OcrCapability::Present(engine) => Some(engine.as_ref()),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, OcrCapability::Present(_))
    }
}

impl fmt::Debug for OcrCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrCapability::Absent => write!(f, "Absent"),
            OcrCapability::Present(engine) => write!(f, "Present({})", engine.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tesseract
// ---------------------------------------------------------------------------

/// Runs the `tesseract` command line tool and reads its TSV output.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            language: "eng".to_string(),
        }
    }

    pub fn locate() -> Option<Self> {
        which::which("tesseract").ok().map(Self::new)
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn command(&self, image_path: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("tsv");
        cmd
    }

    fn run(&self, image_path: &Path) -> Result<String, OutlineError> {
        let out = self
            .command(image_path)
            .output()
            .map_err(|e| OutlineError::Ocr(format!("cannot spawn tesseract: {}", e)))?;

        if !out.status.success() {
            return Err(OutlineError::Ocr(format!(
                "tesseract exited with status {}: {}",
                out.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(
        &self,
        image: &PageImage,
        geometry: &PageGeometry,
    ) -> Result<Vec<TextBlock>, OutlineError> {
        if image.width == 0 || image.height == 0 {
            return Ok(Vec::new());
        }

        let mut tmp = tempfile::Builder::new()
            .prefix("pdfoutline-")
            .suffix(&format!(".{}", image.format.extension()))
            .tempfile()?;
        tmp.write_all(&image.bytes)?;
        tmp.flush()?;

        let tsv = self.run(tmp.path())?;
        let scale_x = geometry.width / image.width as f32;
        let scale_y = geometry.height / image.height as f32;
        Ok(parse_tsv_lines(&tsv, scale_x, scale_y))
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Word-level TSV columns, in tesseract's order.
const TSV_COLUMNS: usize = 12;
const LEVEL_LINE: u32 = 4;
const LEVEL_WORD: u32 = 5;

#[derive(Default)]
struct OcrLine {
    bbox: Option<BBox>,
    words: Vec<String>,
}

/// Turn tesseract TSV into one block per recognized line, in reading order.
///
/// Line geometry comes from the level-4 records, text from the level-5 word
/// records that share the same block, paragraph and line numbers. Pixel
/// coordinates are scaled into page space.
pub fn parse_tsv_lines(tsv: &str, scale_x: f32, scale_y: f32) -> Vec<TextBlock> {
    let mut lines: BTreeMap<(u32, u32, u32, u32), OcrLine> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < TSV_COLUMNS - 1 {
            continue;
        }
        let nums: Vec<u32> = fields[..6].iter().filter_map(|f| f.parse().ok()).collect();
        if nums.len() != 6 {
            continue;
        }
        let key = (nums[1], nums[2], nums[3], nums[4]);
        let geometry: Vec<f32> = fields[6..10].iter().filter_map(|f| f.parse().ok()).collect();

        match nums[0] {
            LEVEL_LINE if geometry.len() == 4 => {
                let (left, top, width, height) = (geometry[0], geometry[1], geometry[2], geometry[3]);
                lines.entry(key).or_default().bbox = Some(BBox::new(
                    left * scale_x,
                    top * scale_y,
                    (left + width) * scale_x,
                    (top + height) * scale_y,
                ));
            }
            LEVEL_WORD => {
                let confident = fields
                    .get(10)
                    .and_then(|c| c.parse::<f32>().ok())
                    .is_some_and(|c| c >= 0.0);
                let word = fields.get(11).map(|w| w.trim()).unwrap_or_default();
                if confident && !word.is_empty() {
                    lines.entry(key).or_default().words.push(word.to_string());
                }
            }
            _ => {}
        }
    }

    let mut blocks: Vec<TextBlock> = lines
        .into_values()
        .filter_map(|line| {
            let text = collapse_whitespace(&line.words.join(" "));
            match (line.bbox, text.is_empty()) {
                (Some(bbox), false) => Some(TextBlock { text, bbox }),
                _ => None,
            }
        })
        .collect();

    blocks.sort_by(|a, b| a.bbox.y0.total_cmp(&b.bbox.y0).then(a.bbox.x0.total_cmp(&b.bbox.x0)));
    blocks
}
