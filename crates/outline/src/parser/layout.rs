//! Glyph-run extraction and block assembly.
//!
//! Walks a page's content stream with a simplified text-rendering state
//! machine, converts every shown string into a [`TextSpan`] in page space
//! (origin top-left, y downward) and groups spans into layout blocks.
//!
//! ```text
//! content ops  ->  TextSpan[]  ->  Segment[]  ->  TextBlock[]
//!   (per page)      extract        group_spans    group_segments
//! ```

use std::collections::HashMap;

use super::backend::{
    decode_text_simple, get_number_from_value, BackendFontInfo, PageId, PdfBackend, PdfValue,
};
use crate::text::{is_spaceless_script_char, normalize_text};
use crate::types::{BBox, GlyphSpan, TextBlock};
use crate::OutlineError;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A single run of text at a specific position on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BBox,
    /// Baseline y in page space.
    pub baseline: f32,
    pub font_size: f32,
    pub is_bold: bool,
}

impl TextSpan {
    pub fn to_glyph_span(&self) -> GlyphSpan {
        GlyphSpan {
            text: self.text.clone(),
            bbox: self.bbox,
            font_size: self.font_size,
            is_bold: self.is_bold,
        }
    }
}

/// The displayed page: the visible box of user space, turned clockwise by
/// the page's `/Rotate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    /// Visible region in user space, `[llx, lly, urx, ury]`.
    pub bounds: [f32; 4],
    /// 0, 90, 180 or 270.
    pub rotation: u16,
}

impl PageFrame {
    /// Values that are not a multiple of 90 round down to one.
    pub fn new(bounds: [f32; 4], rotation: i64) -> Self {
        let rotation = (rotation.rem_euclid(360) / 90 * 90) as u16;
        PageFrame { bounds, rotation }
    }

    pub fn upright(bounds: [f32; 4]) -> Self {
        PageFrame::new(bounds, 0)
    }

    /// Displayed `(width, height)`.
    pub fn size(&self) -> (f32, f32) {
        let [llx, lly, urx, ury] = self.bounds;
        match self.rotation {
            90 | 270 => (ury - lly, urx - llx),
            _ => (urx - llx, ury - lly),
        }
    }

    /// Map a user-space point to page space (origin top-left, y downward).
    pub fn to_page(&self, x: f32, y: f32) -> (f32, f32) {
        let [llx, lly, urx, ury] = self.bounds;
        match self.rotation {
            90 => (y - lly, x - llx),
            180 => (urx - x, y - lly),
            270 => (ury - y, urx - x),
            _ => (x - llx, ury - y),
        }
    }
}

/// A horizontally contiguous piece of one visual line.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub bbox: BBox,
    pub baseline: f32,
    pub font_size: f32,
    pub is_bold: bool,
}

/// Everything the decoder keeps about one page.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub spans: Vec<TextSpan>,
    pub blocks: Vec<TextBlock>,
}

impl PageLayout {
    /// Plain text of the page, one block per line.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Spans whose centre lies inside `region`.
    pub fn spans_in(&self, region: &BBox) -> Vec<GlyphSpan> {
        self.spans
            .iter()
            .filter(|s| {
                let (cx, cy) = s.bbox.center();
                region.contains_point(cx, cy)
            })
            .map(TextSpan::to_glyph_span)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Spans whose baselines differ by no more than this share a line.
const Y_TOLERANCE: f32 = 1.0;

/// Approximate glyph advance as a fraction of font size when the font does
/// not declare widths.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Minimum gap (in points) between adjacent spans before a space is inserted.
const MIN_WORD_GAP: f32 = 1.5;

/// A horizontal gap wider than this multiple of the font size splits a line
/// into separate segments (columns, table cells).
const SEGMENT_GAP_FACTOR: f32 = 3.0;

/// Segments whose baselines are further apart than this multiple of the
/// font size start a new block.
const BLOCK_GAP_FACTOR: f32 = 1.4;

/// Segments joined into one block must agree on size within this tolerance.
const FONT_SIZE_TOLERANCE: f32 = 0.5;

/// Fractions of the font size above and below the baseline covered by a
/// span's box.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

// ---------------------------------------------------------------------------
// Matrix helpers
// ---------------------------------------------------------------------------

/// A 2x3 affine matrix `[a, b, c, d, e, f]`, row-vector convention.
type Matrix = [f32; 6];

const IDENTITY_MATRIX: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m1 x m2`: apply `m1` first, then `m2`.
fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn matrix_from_operands(operands: &[PdfValue]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let vals: Vec<f32> = operands
        .iter()
        .take(6)
        .filter_map(get_number_from_value)
        .collect();
    (vals.len() == 6).then(|| [vals[0], vals[1], vals[2], vals[3], vals[4], vals[5]])
}

// ---------------------------------------------------------------------------
// Internal: PDF text-state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TextState {
    font: BackendFontInfo,
    font_size: f32,
    text_matrix: Matrix,
    line_matrix: Matrix,
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: BackendFontInfo::default(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    /// Advance the text matrix horizontally by `dx` text-space units.
    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Multiply the line matrix by a translation (Td / TD / T*).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let new_tx = self.line_matrix[0] * tx + self.line_matrix[2] * ty + self.line_matrix[4];
        let new_ty = self.line_matrix[1] * tx + self.line_matrix[3] * ty + self.line_matrix[5];
        self.line_matrix[4] = new_tx;
        self.line_matrix[5] = new_ty;
        self.text_matrix = self.line_matrix;
    }

    /// Horizontal displacement, in text space, of showing `bytes`.
    fn advance_for(&self, bytes: &[u8], decoded: &str) -> f32 {
        let simple = !self.font.is_composite && !self.font.widths.is_empty();
        let mut total = 0.0;
        if simple {
            for &b in bytes {
                let w = self
                    .font
                    .glyph_width(b)
                    .map(|w| w / 1000.0)
                    .unwrap_or(APPROX_CHAR_WIDTH_RATIO);
                total += w * self.font_size + self.char_spacing;
                if b == b' ' {
                    total += self.word_spacing;
                }
            }
        } else {
            for ch in decoded.chars() {
                total += self.font_size * APPROX_CHAR_WIDTH_RATIO + self.char_spacing;
                if ch == ' ' {
                    total += self.word_spacing;
                }
            }
        }
        total * self.horiz_scale
    }
}

/// Walks one page's operators and collects spans.
struct SpanCollector<'a> {
    backend: &'a dyn PdfBackend,
    page_id: PageId,
    fonts: Vec<BackendFontInfo>,
    frame: PageFrame,
    state: TextState,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    spans: Vec<TextSpan>,
}

impl<'a> SpanCollector<'a> {
    fn new(backend: &'a dyn PdfBackend, page_id: PageId, frame: PageFrame) -> Self {
        Self {
            backend,
            page_id,
            fonts: backend.page_fonts(page_id).unwrap_or_default(),
            frame,
            state: TextState::default(),
            ctm: IDENTITY_MATRIX,
            ctm_stack: Vec::new(),
            spans: Vec::new(),
        }
    }

    fn run(mut self, ops: &[super::backend::ContentOp]) -> Vec<TextSpan> {
        for op in ops {
            let operands = &op.operands;
            match op.operator.as_str() {
                // -- Graphics state ----------------------------------------
                "q" => self.ctm_stack.push(self.ctm),
                "Q" => {
                    if let Some(saved) = self.ctm_stack.pop() {
                        self.ctm = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_from_operands(operands) {
                        self.ctm = multiply(&m, &self.ctm);
                    }
                }

                // -- Text object / positioning ----------------------------
                "BT" => {
                    self.state.text_matrix = IDENTITY_MATRIX;
                    self.state.line_matrix = IDENTITY_MATRIX;
                }
                "ET" => {}
                "Tf" => self.handle_tf(operands),
                "Tm" => {
                    if let Some(m) = matrix_from_operands(operands) {
                        self.state.text_matrix = m;
                        self.state.line_matrix = m;
                    }
                }
                "Td" | "TD" => {
                    if operands.len() >= 2 {
                        let tx = get_number_from_value(&operands[0]).unwrap_or(0.0);
                        let ty = get_number_from_value(&operands[1]).unwrap_or(0.0);
                        if op.operator == "TD" {
                            self.state.leading = -ty;
                        }
                        self.state.translate_line(tx, ty);
                    }
                }
                "T*" => {
                    let leading = self.state.leading;
                    self.state.translate_line(0.0, -leading);
                }
                "TL" => {
                    if let Some(v) = operands.first().and_then(get_number_from_value) {
                        self.state.leading = v;
                    }
                }

                // -- Spacing / scaling ------------------------------------
                "Tc" => {
                    if let Some(v) = operands.first().and_then(get_number_from_value) {
                        self.state.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(v) = operands.first().and_then(get_number_from_value) {
                        self.state.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(v) = operands.first().and_then(get_number_from_value) {
                        self.state.horiz_scale = v / 100.0;
                    }
                }
                "Ts" => {
                    if let Some(v) = operands.first().and_then(get_number_from_value) {
                        self.state.text_rise = v;
                    }
                }

                // -- Show text --------------------------------------------
                "Tj" => {
                    if let Some(first) = operands.first() {
                        self.show_string(first);
                    }
                }
                "TJ" => {
                    if let Some(PdfValue::Array(arr)) = operands.first() {
                        self.show_array(arr);
                    }
                }
                "'" => {
                    let leading = self.state.leading;
                    self.state.translate_line(0.0, -leading);
                    if let Some(first) = operands.first() {
                        self.show_string(first);
                    }
                }
                "\"" => {
                    if operands.len() >= 3 {
                        if let Some(aw) = get_number_from_value(&operands[0]) {
                            self.state.word_spacing = aw;
                        }
                        if let Some(ac) = get_number_from_value(&operands[1]) {
                            self.state.char_spacing = ac;
                        }
                        let leading = self.state.leading;
                        self.state.translate_line(0.0, -leading);
                        self.show_string(&operands[2]);
                    }
                }

                _ => {}
            }
        }

        self.spans
    }

    fn handle_tf(&mut self, operands: &[PdfValue]) {
        if operands.len() < 2 {
            return;
        }
        let key = match &operands[0] {
            PdfValue::Name(n) | PdfValue::Str(n) => n.clone(),
            _ => return,
        };
        self.state.font_size = get_number_from_value(&operands[1]).unwrap_or(0.0);
        self.state.font = self
            .fonts
            .iter()
            .find(|info| info.name == key)
            .cloned()
            .unwrap_or_else(|| BackendFontInfo {
                base_font: Some(String::from_utf8_lossy(&key).into_owned()),
                name: key,
                ..Default::default()
            });
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let decoded = self
            .backend
            .decode_text(self.page_id, &self.state.font.name, bytes);
        if decoded.is_empty() {
            decode_text_simple(bytes)
        } else {
            decoded
        }
    }

    fn show_string(&mut self, operand: &PdfValue) {
        let PdfValue::Str(bytes) = operand else {
            return;
        };
        let text = self.decode(bytes);
        let start = self.state.text_matrix;
        let dx = self.state.advance_for(bytes, &text);
        self.state.advance_x(dx);
        let end = self.state.text_matrix;
        self.push_span(&text, &start, &end);
    }

    /// `TJ` arrays interleave strings with kerning adjustments in thousandths
    /// of text space. Large adjustments read as word gaps.
    fn show_array(&mut self, arr: &[PdfValue]) {
        let mut buf = String::new();
        let mut start: Option<Matrix> = None;

        for elem in arr {
            match elem {
                PdfValue::Str(bytes) => {
                    let fragment = self.decode(bytes);
                    if start.is_none() {
                        start = Some(self.state.text_matrix);
                    }
                    buf.push_str(&fragment);
                    let dx = self.state.advance_for(bytes, &fragment);
                    self.state.advance_x(dx);
                }
                val => {
                    if let Some(adj) = get_number_from_value(val) {
                        let dx = -adj / 1000.0 * self.state.font_size * self.state.horiz_scale;
                        let gap_threshold = self.state.font_size
                            * APPROX_CHAR_WIDTH_RATIO
                            * self.state.horiz_scale
                            * 0.3;
                        if dx > gap_threshold && !buf.is_empty() && !buf.ends_with(' ') {
                            buf.push(' ');
                        }
                        self.state.advance_x(dx);
                    }
                }
            }
        }

        if let Some(start) = start {
            let end = self.state.text_matrix;
            self.push_span(buf.trim_end(), &start, &end);
        }
    }

    /// Convert a shown string into a page-space span.
    fn push_span(&mut self, text: &str, start: &Matrix, end: &Matrix) {
        if text.trim().is_empty() {
            return;
        }
        let rise = self.state.text_rise;
        let rm_start = multiply(start, &self.ctm);
        let rm_end = multiply(end, &self.ctm);

        let x = rm_start[2] * rise + rm_start[4];
        let y = rm_start[3] * rise + rm_start[5];
        let x_end = rm_end[2] * rise + rm_end[4];
        let y_end = rm_end[3] * rise + rm_end[5];

        let up_len = (rm_start[2].powi(2) + rm_start[3].powi(2)).sqrt();
        let font_size = (self.state.font_size * up_len).abs();
        if font_size <= 0.0 || up_len <= 0.0 {
            return;
        }

        // Glyph box corners along the text's own up direction, then mapped
        // through the page frame so rotated pages come out upright.
        let (ux, uy) = (rm_start[2] / up_len, rm_start[3] / up_len);
        let (asc, desc) = (font_size * ASCENT, font_size * DESCENT);
        let corners = [
            (x + ux * asc, y + uy * asc),
            (x - ux * desc, y - uy * desc),
            (x_end + ux * asc, y_end + uy * asc),
            (x_end - ux * desc, y_end - uy * desc),
        ]
        .map(|(cx, cy)| self.frame.to_page(cx, cy));

        let x0 = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let y0 = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let x1 = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let y1 = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);
        let (_, baseline) = self.frame.to_page(x, y);

        self.spans.push(TextSpan {
            text: text.to_string(),
            bbox: BBox::new(x0, y0, x1, y1),
            baseline,
            font_size,
            is_bold: self.state.font.is_bold(),
        });
    }
}

// ---------------------------------------------------------------------------
// Public API: span extraction
// ---------------------------------------------------------------------------

/// Walk a single page's content stream and produce its spans in page space.
///
/// Handles `q`/`Q`/`cm` for the current transformation matrix and the text
/// operators `BT`, `ET`, `Tf`, `Tm`, `Td`, `TD`, `T*`, `TL`, `Tc`, `Tw`,
/// `Tz`, `Ts`, `Tj`, `TJ`, `'` and `"`. Everything else is ignored.
pub fn extract_page_spans(
    backend: &dyn PdfBackend,
    page_id: PageId,
    frame: &PageFrame,
) -> Result<Vec<TextSpan>, OutlineError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    Ok(SpanCollector::new(backend, page_id, *frame).run(&ops))
}

/// Extract spans and assemble blocks for one page.
pub fn extract_page_layout(
    backend: &dyn PdfBackend,
    page_id: PageId,
    frame: &PageFrame,
) -> Result<PageLayout, OutlineError> {
    let spans = extract_page_spans(backend, page_id, frame)?;
    let segments = group_spans_into_segments(&spans);
    let blocks = group_segments_into_blocks(segments);
    Ok(PageLayout { spans, blocks })
}

// ---------------------------------------------------------------------------
// Public API: span -> segment grouping
// ---------------------------------------------------------------------------

/// Group spans into line segments.
///
/// Spans within [`Y_TOLERANCE`] of a line's first baseline share the line.
/// Within a line, spans are joined left to right until a gap wider than
/// [`SEGMENT_GAP_FACTOR`] times the font size, which starts a new segment.
pub fn group_spans_into_segments(spans: &[TextSpan]) -> Vec<Segment> {
    let mut sorted: Vec<&TextSpan> = spans.iter().collect();
    sorted.sort_by(|a, b| {
        a.baseline
            .total_cmp(&b.baseline)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut lines: Vec<Vec<&TextSpan>> = Vec::new();
    let mut current_y = f32::NAN;
    for span in sorted {
        match lines.last_mut() {
            Some(line) if (span.baseline - current_y).abs() <= Y_TOLERANCE => line.push(span),
            _ => {
                current_y = span.baseline;
                lines.push(vec![span]);
            }
        }
    }

    let mut segments = Vec::new();
    for mut line in lines {
        line.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
        let mut run: Vec<&TextSpan> = Vec::new();
        for span in line {
            if let Some(prev) = run.last() {
                let gap = span.bbox.x0 - prev.bbox.x1;
                if gap > SEGMENT_GAP_FACTOR * prev.font_size.max(span.font_size) {
                    segments.push(assemble_segment(&run));
                    run.clear();
                }
            }
            run.push(span);
        }
        if !run.is_empty() {
            segments.push(assemble_segment(&run));
        }
    }

    segments
}

/// Join left-to-right spans into one segment, inserting spaces at real gaps.
fn assemble_segment(spans: &[&TextSpan]) -> Segment {
    let mut text = String::new();
    let mut bbox = spans[0].bbox;
    let mut prev: Option<&TextSpan> = None;

    for span in spans {
        if let Some(p) = prev {
            let gap = span.bbox.x0 - p.bbox.x1;
            let needs_space = gap >= MIN_WORD_GAP
                && !boundary_is_spaceless(&p.text, &span.text)
                && !text.ends_with(' ')
                && !span.text.starts_with(' ');
            if needs_space {
                text.push(' ');
            }
        }
        text.push_str(&span.text);
        bbox = bbox.union(&span.bbox);
        prev = Some(span);
    }

    let font_size = dominant_font_size(spans);
    let bold_chars: usize = spans
        .iter()
        .filter(|s| s.is_bold)
        .map(|s| s.text.chars().count())
        .sum();
    let total_chars: usize = spans.iter().map(|s| s.text.chars().count()).sum();

    Segment {
        text,
        bbox,
        baseline: spans[0].baseline,
        font_size,
        is_bold: bold_chars * 2 > total_chars,
    }
}

/// The font size covering the most characters.
fn dominant_font_size(spans: &[&TextSpan]) -> f32 {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for s in spans {
        let key = (s.font_size * 100.0).round() as i32;
        *counts.entry(key).or_insert(0) += s.text.chars().count();
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(k, _)| k as f32 / 100.0)
        .unwrap_or(0.0)
}

fn boundary_is_spaceless(prev: &str, next: &str) -> bool {
    match (prev.chars().next_back(), next.chars().next()) {
        (Some(l), Some(f)) => is_spaceless_script_char(l) && is_spaceless_script_char(f),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Public API: segment -> block grouping
// ---------------------------------------------------------------------------

fn continues_block(last: &Segment, next: &Segment) -> bool {
    let overlaps = next.bbox.x0 < last.bbox.x1 && last.bbox.x0 < next.bbox.x1;
    let same_size = (next.font_size - last.font_size).abs() < FONT_SIZE_TOLERANCE;
    let step = next.baseline - last.baseline;
    overlaps
        && same_size
        && next.is_bold == last.is_bold
        && step > 0.0
        && step <= last.font_size * BLOCK_GAP_FACTOR
}

/// Group segments into blocks in reading order (top-to-bottom, then
/// left-to-right).
///
/// A segment joins an open block when it overlaps the block's last segment
/// horizontally, shares its size and boldness, and sits directly below it.
/// Block text is the segments' text joined with single spaces.
pub fn group_segments_into_blocks(mut segments: Vec<Segment>) -> Vec<TextBlock> {
    segments.sort_by(|a, b| {
        a.baseline
            .total_cmp(&b.baseline)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut groups: Vec<Vec<Segment>> = Vec::new();
    for segment in segments {
        let target = groups.iter().rposition(|g| {
            g.last()
                .is_some_and(|last| continues_block(last, &segment))
        });
        match target {
            Some(idx) => groups[idx].push(segment),
            None => groups.push(vec![segment]),
        }
    }

    let mut blocks: Vec<TextBlock> = groups
        .into_iter()
        .filter_map(|group| {
            let bbox = group
                .iter()
                .skip(1)
                .fold(group[0].bbox, |acc, s| acc.union(&s.bbox));
            let raw = group
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let text = normalize_text(&raw);
            (!text.is_empty()).then_some(TextBlock { text, bbox })
        })
        .collect();

    blocks.sort_by(|a, b| a.bbox.y0.total_cmp(&b.bbox.y0).then(a.bbox.x0.total_cmp(&b.bbox.x0)));
    blocks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
