use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::HeuristicsConfig;
use crate::types::{DropSet, Line, PageGeometry};

fn digit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d").expect("valid regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s@]").expect("valid regex"))
}

/// Normalize a line for repeat detection: digits become `@`, whitespace
/// collapses, case folds and punctuation goes.
///
/// `"Page 3 of 10"` and `"Page 4 of 10"` both normalize to `"page @ of @@"`.
pub fn normalize_for_repeat(text: &str) -> String {
    let s = digit_re().replace_all(text, "@");
    let s = whitespace_re().replace_all(&s, " ");
    let s = s.trim().to_lowercase();
    punctuation_re().replace_all(&s, "").into_owned()
}

/// Minimum number of occurrences for an edge text to count as boilerplate.
pub fn repeat_threshold(page_count: usize, page_fraction: f32) -> usize {
    let fraction = (page_count as f32 * page_fraction).ceil() as usize;
    fraction.max(2)
}

/// Positions of lines that sit in a page's top or bottom band and whose
/// normalized text recurs on enough pages.
///
/// Pages without geometry contribute nothing.
pub fn detect_repeated_headers_footers(
    pages: &[Vec<Line>],
    geometries: &[Option<PageGeometry>],
    config: &HeuristicsConfig,
) -> DropSet {
    let mut positions: HashMap<String, Vec<(usize, usize)>> = HashMap::new();

    for (page_idx, lines) in pages.iter().enumerate() {
        let Some(geometry) = geometries.get(page_idx).copied().flatten() else {
            continue;
        };
        for (line_idx, line) in lines.iter().enumerate() {
            if !geometry.in_edge_band(&line.bbox, config.edge_band_fraction) {
                continue;
            }
            let normalized = normalize_for_repeat(&line.text);
            if normalized.chars().count() > config.boilerplate_min_len {
                positions
                    .entry(normalized)
                    .or_default()
                    .push((page_idx, line_idx));
            }
        }
    }

    let threshold = repeat_threshold(pages.len(), config.boilerplate_page_fraction);
    positions
        .into_iter()
        .filter(|(text, found)| {
            let repeated = found.len() >= threshold;
            if repeated {
                log::debug!("boilerplate {:?} on {} lines", text, found.len());
            }
            repeated
        })
        .flat_map(|(_, found)| found)
        .collect()
}

/// Copy of `pages` without the lines named in `drops`.
pub fn apply_drop_set(pages: &[Vec<Line>], drops: &DropSet) -> Vec<Vec<Line>> {
    pages
        .iter()
        .enumerate()
        .map(|(page_idx, lines)| {
            lines
                .iter()
                .enumerate()
                .filter(|(line_idx, _)| !drops.contains(page_idx, *line_idx))
                .map(|(_, line)| line.clone())
                .collect()
        })
        .collect()
}
