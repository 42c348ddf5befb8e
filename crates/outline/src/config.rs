use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::parser::table::TableDetectorConfig;
use crate::OutlineError;

/// Numeric thresholds used by the heading-detection passes.
///
/// The defaults are the tuned values; a TOML file only needs to name the
/// fields it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Fraction of page height treated as header (top) and footer (bottom).
    pub edge_band_fraction: f32,
    /// Normalized boilerplate text must be strictly longer than this.
    pub boilerplate_min_len: usize,
    /// Fraction of pages a text must recur on to count as boilerplate.
    pub boilerplate_page_fraction: f32,
    /// Max font size difference (points) for two lines to merge.
    pub merge_font_tolerance: f32,
    /// Max vertical gap, as a multiple of the upper line's font size.
    pub merge_gap_factor: f32,
    /// Max left-edge misalignment (page units) for two lines to merge.
    pub merge_alignment: f32,
    /// A candidate's size must exceed `baseline * candidate_size_factor`
    /// unless it is bold.
    pub candidate_size_factor: f32,
    pub min_candidate_words: usize,
    pub max_candidate_words: usize,
    /// Lines with more words than this feed the baseline average.
    pub baseline_min_words: usize,
    /// Size used when no span metadata is available.
    pub default_font_size: f32,
    /// Number of distinct sizes that get their own level.
    pub max_levels: usize,
    /// Table detection, used by the dense-layout check.
    pub tables: TableDetectorConfig,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            edge_band_fraction: 0.15,
            boilerplate_min_len: 4,
            boilerplate_page_fraction: 0.4,
            merge_font_tolerance: 1.5,
            merge_gap_factor: 0.5,
            merge_alignment: 15.0,
            candidate_size_factor: 1.2,
            min_candidate_words: 2,
            max_candidate_words: 15,
            baseline_min_words: 2,
            default_font_size: 12.0,
            max_levels: 3,
            tables: TableDetectorConfig::default(),
        }
    }
}

impl HeuristicsConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, OutlineError> {
        toml::from_str(s).map_err(|e| OutlineError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, OutlineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
