//! The heading-detection passes, in pipeline order.
//!
//! ```text
//! classify -> collect -> boilerplate -> merge -> select (+ noise) -> level
//! ```

pub mod boilerplate;
pub mod classify;
pub mod collect;
pub mod level;
pub mod merge;
pub mod noise;
pub mod select;

pub use boilerplate::{apply_drop_set, detect_repeated_headers_footers, normalize_for_repeat};
pub use classify::classify_document;
pub use collect::collect_lines;
pub use level::{assign_levels, build_outline, extract_title};
pub use merge::merge_multiline_headings;
pub use noise::{has_corrupted_text, in_dense_layout};
pub use select::{baseline_font_size, pick_candidates};
