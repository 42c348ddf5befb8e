use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use crate::pipeline::noise::has_corrupted_text;
use crate::types::{HeadingCandidate, HeadingLevel, Line, OutlineEntry};

/// Font size rounded to one decimal, as an integer key.
fn size_key(font_size: f32) -> i64 {
    (font_size * 10.0).round() as i64
}

/// The largest line on the first page, unless its text is corrupted.
///
/// Ties go to the earliest line.
pub fn extract_title(first_page: &[Line]) -> Option<String> {
    let largest = first_page
        .iter()
        .reduce(|best, line| if line.font_size > best.font_size { line } else { best })?;

    if has_corrupted_text(&largest.text) {
        log::debug!("title candidate rejected as corrupted: {:?}", largest.text);
        return None;
    }
    Some(largest.text.clone())
}

/// Rank distinct rounded sizes, largest first, and give each candidate the
/// level of its size. Only the top `max_levels` sizes get a rank of their own;
/// everything smaller collapses into the last level.
pub fn assign_levels(candidates: &mut [HeadingCandidate], max_levels: usize) {
    let sizes: BTreeSet<Reverse<i64>> = candidates
        .iter()
        .map(|c| Reverse(size_key(c.line.font_size)))
        .collect();
    let ranks: HashMap<i64, HeadingLevel> = sizes
        .into_iter()
        .take(max_levels)
        .enumerate()
        .map(|(rank, Reverse(key))| (key, HeadingLevel::from_rank(rank)))
        .collect();

    for candidate in candidates.iter_mut() {
        let level = ranks
            .get(&size_key(candidate.line.font_size))
            .copied()
            .unwrap_or(HeadingLevel::H3);
        candidate.level = Some(level);
    }
}

/// Final outline: leveled candidates in (page, top) order, minus the title.
pub fn build_outline(
    title: Option<&str>,
    mut candidates: Vec<HeadingCandidate>,
    max_levels: usize,
) -> Vec<OutlineEntry> {
    assign_levels(&mut candidates, max_levels);
    candidates.sort_by(|a, b| {
        a.line
            .page
            .cmp(&b.line.page)
            .then(a.line.bbox.y0.total_cmp(&b.line.bbox.y0))
    });

    candidates
        .into_iter()
        .filter(|c| Some(c.line.text.as_str()) != title)
        .map(|c| OutlineEntry {
            level: c.level.unwrap_or(HeadingLevel::H3),
            text: c.line.text,
            page: c.line.page + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBox;

    fn line(page: usize, text: &str, y0: f32, font_size: f32) -> Line {
        Line {
            page,
            text: text.to_string(),
            bbox: BBox::new(72.0, y0, 400.0, y0 + font_size),
            font_size,
            is_bold: false,
        }
    }

    fn candidate(page: usize, text: &str, y0: f32, font_size: f32) -> HeadingCandidate {
        HeadingCandidate::new(line(page, text, y0, font_size))
    }

    #[test]
    fn test_title_is_largest_first_page_line() {
        let lines = vec![
            line(0, "Annual Report", 80.0, 28.0),
            line(0, "Prepared for the board", 130.0, 12.0),
        ];
        assert_eq!(extract_title(&lines).as_deref(), Some("Annual Report"));
    }

    #[test]
    fn test_title_tie_goes_to_first() {
        let lines = vec![line(0, "First Big", 80.0, 24.0), line(0, "Second Big", 130.0, 24.0)];
        assert_eq!(extract_title(&lines).as_deref(), Some("First Big"));
    }

    #[test]
    fn test_corrupted_title_is_dropped() {
        let lines = vec![
            line(0, "Annual Report Annual Report 2024", 80.0, 28.0),
            line(0, "Clean subtitle", 130.0, 20.0),
        ];
        assert_eq!(extract_title(&lines), None);
    }

    #[test]
    fn test_no_lines_no_title() {
        assert_eq!(extract_title(&[]), None);
    }

    #[test]
    fn test_levels_by_distinct_size() {
        let sizes = [24.0, 24.0, 18.0, 18.0, 14.0, 14.0, 14.0, 11.0];
        let mut candidates: Vec<HeadingCandidate> = sizes
            .iter()
            .enumerate()
            .map(|(i, &s)| candidate(0, &format!("Heading {}", i), i as f32 * 40.0, s))
            .collect();
        assign_levels(&mut candidates, 3);
        let levels: Vec<HeadingLevel> = candidates.iter().filter_map(|c| c.level).collect();
        use HeadingLevel::*;
        assert_eq!(levels, vec![H1, H1, H2, H2, H3, H3, H3, H3]);
    }

    #[test]
    fn test_sizes_round_to_one_decimal() {
        let mut candidates = vec![
            candidate(0, "Alpha Beta", 0.0, 16.04),
            candidate(0, "Gamma Delta", 40.0, 15.96),
            candidate(0, "Epsilon Zeta", 80.0, 12.0),
        ];
        assign_levels(&mut candidates, 3);
        assert_eq!(candidates[0].level, Some(HeadingLevel::H1));
        assert_eq!(candidates[1].level, Some(HeadingLevel::H1));
        assert_eq!(candidates[2].level, Some(HeadingLevel::H2));
    }

    #[test]
    fn test_outline_sorted_and_title_excluded() {
        let candidates = vec![
            candidate(1, "Later Section", 300.0, 18.0),
            candidate(0, "Annual Report", 80.0, 28.0),
            candidate(1, "Earlier Section", 100.0, 18.0),
            candidate(0, "Overview Part", 400.0, 18.0),
        ];
        let outline = build_outline(Some("Annual Report"), candidates, 3);
        let texts: Vec<&str> = outline.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Overview Part", "Earlier Section", "Later Section"]);
        assert_eq!(outline[0].page, 1);
        assert_eq!(outline[2].page, 2);
        // The title's size still takes the top rank.
        assert!(outline.iter().all(|e| e.level == HeadingLevel::H2));
    }

    #[test]
    fn test_empty_candidates() {
        assert!(build_outline(Some("Title"), Vec::new(), 3).is_empty());
    }
}
