use crate::config::HeuristicsConfig;
use crate::types::Line;

/// Whether `next` continues the heading in `current`: similar size, directly
/// below it, left edges aligned.
fn continues(current: &Line, next: &Line, config: &HeuristicsConfig) -> bool {
    let size_close = (next.font_size - current.font_size).abs() <= config.merge_font_tolerance;
    let gap = next.bbox.y0 - current.bbox.y1;
    let adjacent = gap >= 0.0 && gap <= current.font_size * config.merge_gap_factor;
    let aligned = (next.bbox.x0 - current.bbox.x0).abs() <= config.merge_alignment;
    size_close && adjacent && aligned
}

/// Collapse wrapped headings into single lines, page by page.
///
/// Each page is sorted by (top, left) and scanned once. A line absorbs its
/// successors for as long as they continue it; the comparison is always
/// against the merged line, so its font size stays that of the first line
/// while its box grows.
pub fn merge_multiline_headings(pages: Vec<Vec<Line>>, config: &HeuristicsConfig) -> Vec<Vec<Line>> {
    pages
        .into_iter()
        .map(|mut lines| {
            lines.sort_by(|a, b| a.bbox.y0.total_cmp(&b.bbox.y0).then(a.bbox.x0.total_cmp(&b.bbox.x0)));

            let mut merged: Vec<Line> = Vec::with_capacity(lines.len());
            let mut iter = lines.into_iter().peekable();
            while let Some(mut current) = iter.next() {
                while let Some(next) = iter.next_if(|next| continues(&current, next, config)) {
                    current.absorb(&next);
                }
                merged.push(current);
            }
            merged
        })
        .collect()
}
