use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page space: origin top-left, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        BBox { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Smallest rectangle covering both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// True when the two boxes share a region of non-zero area.
    pub fn intersects(&self, other: &BBox) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    pub fn new(width: f32, height: f32) -> Self {
        PageGeometry { width, height }
    }

    /// Whether `bbox` sits entirely inside the top or bottom band covering
    /// `fraction` of the page height.
    pub fn in_edge_band(&self, bbox: &BBox, fraction: f32) -> bool {
        bbox.y1 < self.height * fraction || bbox.y0 > self.height * (1.0 - fraction)
    }
}

/// A run of glyphs sharing one font, as reported by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphSpan {
    pub text: String,
    pub bbox: BBox,
    pub font_size: f32,
    pub is_bold: bool,
}

/// A layout block as reported by the decoder, before typography lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub bbox: BBox,
}

/// One visually distinct text unit on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// 0-based page index.
    pub page: usize,
    pub text: String,
    pub bbox: BBox,
    pub font_size: f32,
    pub is_bold: bool,
}

impl Line {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Fold `next` into this line: text joined with a single space, box
    /// widened to the union, boldness OR-ed.
    pub fn absorb(&mut self, next: &Line) {
        let joined = format!("{} {}", self.text.trim(), next.text.trim());
        self.text = joined.trim().to_string();
        self.bbox = self.bbox.union(&next.bbox);
        self.is_bold = self.is_bold || next.is_bold;
    }
}

/// Positions `(page index, line index)` of repeated boilerplate lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropSet(HashSet<(usize, usize)>);

impl DropSet {
    pub fn contains(&self, page: usize, line: usize) -> bool {
        self.0.contains(&(page, line))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(usize, usize)> for DropSet {
    fn from_iter<I: IntoIterator<Item = (usize, usize)>>(iter: I) -> Self {
        DropSet(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    /// Map a 0-based size rank to a level; anything past the third rank
    /// collapses into `H3`.
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            0 => HeadingLevel::H1,
            1 => HeadingLevel::H2,
            _ => HeadingLevel::H3,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HeadingLevel::H1 => 1,
            HeadingLevel::H2 => 2,
            HeadingLevel::H3 => 3,
        }
    }
}

impl fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}", self.as_u8())
    }
}

/// A line judged plausibly a heading. `level` is filled in by the level
/// assigner.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingCandidate {
    pub line: Line,
    pub level: Option<HeadingLevel>,
}

impl HeadingCandidate {
    pub fn new(line: Line) -> Self {
        HeadingCandidate { line, level: None }
    }
}

/// Advisory classification of a document from its first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentProfile {
    Form,
    Report,
}

impl fmt::Display for DocumentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentProfile::Form => write!(f, "form"),
            DocumentProfile::Report => write!(f, "report"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    pub level: HeadingLevel,
    pub text: String,
    /// 1-based page number.
    pub page: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Outline {
    pub title: String,
    pub outline: Vec<OutlineEntry>,
}

impl Outline {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.outline.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_union() {
        let a = BBox::new(10.0, 10.0, 50.0, 20.0);
        let b = BBox::new(5.0, 22.0, 40.0, 30.0);
        assert_eq!(a.union(&b), BBox::new(5.0, 10.0, 50.0, 30.0));
    }

    #[test]
    fn test_bbox_intersects_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 15.0, 15.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn test_bbox_touching_edges_do_not_intersect() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_empty_bbox_never_intersects() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let empty = BBox::new(3.0, 3.0, 3.0, 8.0);
        assert!(!a.intersects(&empty));
    }

    #[test]
    fn test_edge_band() {
        let page = PageGeometry::new(612.0, 792.0);
        assert!(page.in_edge_band(&BBox::new(50.0, 20.0, 300.0, 40.0), 0.15));
        assert!(page.in_edge_band(&BBox::new(50.0, 760.0, 300.0, 775.0), 0.15));
        assert!(!page.in_edge_band(&BBox::new(50.0, 300.0, 300.0, 320.0), 0.15));
        // Straddling the band boundary is not "in" the band.
        assert!(!page.in_edge_band(&BBox::new(50.0, 100.0, 300.0, 130.0), 0.15));
    }

    #[test]
    fn test_line_absorb() {
        let mut first = Line {
            page: 0,
            text: "Chapter 1:".to_string(),
            bbox: BBox::new(72.0, 100.0, 160.0, 118.0),
            font_size: 18.0,
            is_bold: false,
        };
        let second = Line {
            page: 0,
            text: " Introduction ".to_string(),
            bbox: BBox::new(70.0, 122.0, 200.0, 140.0),
            font_size: 18.0,
            is_bold: true,
        };
        first.absorb(&second);
        assert_eq!(first.text, "Chapter 1: Introduction");
        assert_eq!(first.bbox, BBox::new(70.0, 100.0, 200.0, 140.0));
        assert!(first.is_bold);
    }

    #[test]
    fn test_heading_level_from_rank() {
        assert_eq!(HeadingLevel::from_rank(0), HeadingLevel::H1);
        assert_eq!(HeadingLevel::from_rank(1), HeadingLevel::H2);
        assert_eq!(HeadingLevel::from_rank(2), HeadingLevel::H3);
        assert_eq!(HeadingLevel::from_rank(7), HeadingLevel::H3);
    }

    #[test]
    fn test_heading_level_serializes_as_tag() {
        let entry = OutlineEntry {
            level: HeadingLevel::H2,
            text: "Scope".to_string(),
            page: 3,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"level":"H2","text":"Scope","page":3}"#);
    }

    #[test]
    fn test_profile_display() {
        assert_eq!(DocumentProfile::Form.to_string(), "form");
        assert_eq!(DocumentProfile::Report.to_string(), "report");
    }

    #[test]
    fn test_empty_outline_is_fallback() {
        let outline = Outline::default();
        assert!(outline.is_empty());
        assert_eq!(
            serde_json::to_string(&outline).unwrap(),
            r#"{"title":"","outline":[]}"#
        );
    }

    #[test]
    fn test_drop_set_contains() {
        let drops: DropSet = vec![(0, 3), (2, 1)].into_iter().collect();
        assert!(drops.contains(0, 3));
        assert!(!drops.contains(3, 0));
        assert_eq!(drops.len(), 2);
    }
}
