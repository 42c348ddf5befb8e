use crate::config::HeuristicsConfig;
use crate::pipeline::noise::has_corrupted_text;
use crate::types::{HeadingCandidate, Line};

/// Mean font size of body-like lines (more than `baseline_min_words` words)
/// across the document.
pub fn baseline_font_size(pages: &[Vec<Line>], config: &HeuristicsConfig) -> f32 {
    let sizes: Vec<f32> = pages
        .iter()
        .flatten()
        .filter(|line| line.word_count() > config.baseline_min_words)
        .map(|line| line.font_size)
        .collect();

    if sizes.is_empty() {
        config.default_font_size
    } else {
        sizes.iter().sum::<f32>() / sizes.len() as f32
    }
}

/// Lexical shape test: word count in range, not starting lowercase, not
/// corrupted.
pub fn has_heading_shape(text: &str, config: &HeuristicsConfig) -> bool {
    let text = text.trim();
    if text.is_empty() || has_corrupted_text(text) {
        return false;
    }
    let words = text.split_whitespace().count();
    if words < config.min_candidate_words || words > config.max_candidate_words {
        return false;
    }
    !text.chars().next().is_some_and(char::is_lowercase)
}

/// Typographic prominence relative to the document baseline.
pub fn is_prominent(line: &Line, baseline: f32, config: &HeuristicsConfig) -> bool {
    line.font_size > baseline * config.candidate_size_factor || line.is_bold
}

/// Scan merged lines in page order and keep the likely headings.
///
/// `in_dense_layout` is consulted last, only for lines that pass every other
/// test, so table detection runs for as few pages as possible.
pub fn pick_candidates<F>(
    pages: &[Vec<Line>],
    config: &HeuristicsConfig,
    mut in_dense_layout: F,
) -> Vec<HeadingCandidate>
where
    F: FnMut(&Line) -> bool,
{
    let baseline = baseline_font_size(pages, config);
    log::debug!("baseline font size {:.2}", baseline);

    pages
        .iter()
        .flatten()
        .filter(|line| has_heading_shape(&line.text, config))
        .filter(|line| is_prominent(line, baseline, config))
        .filter(|line| !in_dense_layout(*line))
        .cloned()
        .map(HeadingCandidate::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBox;

    fn line(page: usize, text: &str, font_size: f32, is_bold: bool) -> Line {
        Line {
            page,
            text: text.to_string(),
            bbox: BBox::new(72.0, 100.0, 400.0, 100.0 + font_size),
            font_size,
            is_bold,
        }
    }

    fn no_tables(_: &Line) -> bool {
        false
    }

    #[test]
    fn test_baseline_uses_multi_word_lines() {
        let pages = vec![vec![
            line(0, "Big Title", 30.0, false),
            line(0, "body text with many words", 10.0, false),
            line(0, "another body line here", 12.0, false),
        ]];
        let baseline = baseline_font_size(&pages, &HeuristicsConfig::default());
        assert!((baseline - 11.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_baseline_defaults_to_twelve() {
        let pages = vec![vec![line(0, "Two words", 30.0, false)]];
        let baseline = baseline_font_size(&pages, &HeuristicsConfig::default());
        assert!((baseline - 12.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_large_and_bold_lines_selected() {
        let pages = vec![vec![
            line(0, "Executive Summary", 18.0, false),
            line(0, "Key Findings", 10.0, true),
            line(0, "body text with many words", 10.0, false),
        ]];
        let picked = pick_candidates(&pages, &HeuristicsConfig::default(), no_tables);
        let texts: Vec<&str> = picked.iter().map(|c| c.line.text.as_str()).collect();
        assert_eq!(texts, vec!["Executive Summary", "Key Findings"]);
        assert!(picked.iter().all(|c| c.level.is_none()));
    }

    #[test]
    fn test_shape_rules() {
        let config = HeuristicsConfig::default();
        assert!(!has_heading_shape("Introduction", &config));
        assert!(!has_heading_shape("continued from previous page", &config));
        assert!(!has_heading_shape("", &config));
        let fifteen = "One Two Three Four Five Six Seven Eight Nine Ten Eleven Twelve Thirteen Fourteen Fifteen";
        assert!(has_heading_shape(fifteen, &config));
        assert!(!has_heading_shape(&format!("{} Sixteen", fifteen), &config));
        assert!(has_heading_shape("2.1 Scope", &config));
    }

    #[test]
    fn test_corrupted_text_never_selected() {
        let pages = vec![vec![
            line(0, "the cat sat the cat sat on the mat", 24.0, true),
            line(0, "The Cat Sat The Cat Sat On The Mat", 24.0, true),
            line(0, "body text with many words", 10.0, false),
        ]];
        let picked = pick_candidates(&pages, &HeuristicsConfig::default(), no_tables);
        assert!(picked.is_empty());
    }

    #[test]
    fn test_dense_layout_excluded() {
        let pages = vec![vec![
            line(0, "Quarterly Totals", 10.0, true),
            line(0, "Notes on Method", 10.0, true),
        ]];
        let mut asked = 0;
        let picked = pick_candidates(&pages, &HeuristicsConfig::default(), |l: &Line| {
            asked += 1;
            l.text.starts_with("Quarterly")
        });
        assert_eq!(asked, 2);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].line.text, "Notes on Method");
    }

    #[test]
    fn test_dense_layout_only_checked_for_survivors() {
        let pages = vec![vec![line(0, "plain lowercase sentence", 10.0, false)]];
        let mut asked = 0;
        let picked = pick_candidates(&pages, &HeuristicsConfig::default(), |_: &Line| {
            asked += 1;
            true
        });
        assert!(picked.is_empty());
        assert_eq!(asked, 0);
    }
}
