use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::layout::TextSpan;
use crate::types::BBox;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// One horizontally contiguous cell inside a row.
#[derive(Debug, Clone)]
pub struct TableCell {
    pub x: f32,
    pub bbox: BBox,
}

/// A visual row of spans sharing a baseline, split into cells.
#[derive(Debug, Clone)]
pub struct TableRowData {
    pub y: f32,
    pub font_size: f32,
    pub cells: Vec<TableCell>,
}

/// A detected table region within a page.
#[derive(Debug, Clone)]
pub struct DetectedTable {
    pub region: BBox,
    /// Sorted X positions that mark the left edge of each column.
    pub columns: Vec<f32>,
    pub rows: Vec<TableRowData>,
}

/// Tuning knobs for the table detection heuristic.
///
/// Read from the `[tables]` section of the heuristics TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDetectorConfig {
    /// Minimum number of rows required for a region to qualify as a table.
    pub min_rows: usize,
    pub min_columns: usize,
    /// Maximum number of columns allowed (guards against noise).
    pub max_columns: usize,
    /// `y_tolerance = median_font_size * factor` when grouping spans into rows.
    pub y_tolerance_factor: f32,
    /// A horizontal gap of at least `font_size * factor` starts a new cell.
    pub cell_gap_factor: f32,
    /// Consecutive rows further apart than `font_size * factor` end a run.
    pub max_row_spacing_factor: f32,
    /// Fraction of rows that must align with a column position for it to be
    /// accepted, and fraction of rows that must align overall.
    pub min_alignment_ratio: f32,
    /// Minimum horizontal distance (in points) between two column boundaries.
    pub min_column_gap: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 20,
            y_tolerance_factor: 0.3,
            cell_gap_factor: 1.5,
            max_row_spacing_factor: 2.5,
            min_alignment_ratio: 0.5,
            min_column_gap: 10.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Bounding boxes of every table-like region on a page.
pub fn find_table_regions(spans: &[TextSpan], config: &TableDetectorConfig) -> Vec<BBox> {
    detect_tables(spans, config)
        .into_iter()
        .map(|t| t.region)
        .collect()
}

// ---------------------------------------------------------------------------
// Table detection pipeline
// ---------------------------------------------------------------------------

/// Detect table regions from a page's spans.
///
/// 1. Group spans into rows by baseline, tolerance from the median font size.
/// 2. Split each row into cells at wide horizontal gaps.
/// 3. Cut the rows into runs of consecutive multi-cell rows.
/// 4. Accept a run when its cells line up in enough columns.
pub fn detect_tables(spans: &[TextSpan], config: &TableDetectorConfig) -> Vec<DetectedTable> {
    if spans.is_empty() {
        return Vec::new();
    }

    let y_tolerance = compute_y_tolerance(spans, config.y_tolerance_factor);
    let rows = group_into_rows(spans, y_tolerance, config.cell_gap_factor);

    split_into_runs(rows, config)
        .into_iter()
        .filter_map(|run| accept_run(run, config))
        .collect()
}

/// Group spans into rows by baseline and split each row into cells.
///
/// Rows are returned top-to-bottom; cells left-to-right.
pub fn group_into_rows(spans: &[TextSpan], y_tolerance: f32, gap_factor: f32) -> Vec<TableRowData> {
    let mut sorted: Vec<&TextSpan> = spans.iter().collect();
    sorted.sort_by(|a, b| {
        a.baseline
            .total_cmp(&b.baseline)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut grouped: Vec<Vec<&TextSpan>> = Vec::new();
    let mut current_y = f32::NAN;
    for span in sorted {
        match grouped.last_mut() {
            Some(row) if (span.baseline - current_y).abs() <= y_tolerance => row.push(span),
            _ => {
                current_y = span.baseline;
                grouped.push(vec![span]);
            }
        }
    }

    grouped
        .into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            let y = row.iter().map(|s| s.baseline).sum::<f32>() / row.len() as f32;
            let font_size = row.iter().map(|s| s.font_size).fold(0.0_f32, f32::max);
            let gap = font_size * gap_factor;

            let mut cells: Vec<TableCell> = Vec::new();
            for span in row {
                match cells.last_mut() {
                    Some(cell) if span.bbox.x0 - cell.bbox.x1 < gap => {
                        cell.bbox = cell.bbox.union(&span.bbox);
                    }
                    _ => cells.push(TableCell {
                        x: span.bbox.x0,
                        bbox: span.bbox,
                    }),
                }
            }

            TableRowData {
                y,
                font_size,
                cells,
            }
        })
        .collect()
}

/// Maximal runs of consecutive rows that each have at least two cells and
/// sit close enough together.
fn split_into_runs(rows: Vec<TableRowData>, config: &TableDetectorConfig) -> Vec<Vec<TableRowData>> {
    let mut runs: Vec<Vec<TableRowData>> = Vec::new();
    let mut current: Vec<TableRowData> = Vec::new();

    for row in rows {
        if row.cells.len() < 2 {
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(prev) = current.last() {
            let spacing = row.y - prev.y;
            if spacing > prev.font_size.max(row.font_size) * config.max_row_spacing_factor {
                runs.push(std::mem::take(&mut current));
            }
        }
        current.push(row);
    }
    if !current.is_empty() {
        runs.push(current);
    }

    runs.retain(|run| run.len() >= config.min_rows);
    runs
}

fn accept_run(rows: Vec<TableRowData>, config: &TableDetectorConfig) -> Option<DetectedTable> {
    let columns = detect_columns(&rows, config);
    if columns.len() < config.min_columns || columns.len() > config.max_columns {
        return None;
    }

    // A row is aligned if it matches at least half the columns.
    let aligned_rows = rows
        .iter()
        .filter(|row| {
            let aligned_cols = columns
                .iter()
                .filter(|&&col_x| {
                    row.cells
                        .iter()
                        .any(|c| (c.x - col_x).abs() < config.min_column_gap)
                })
                .count();
            aligned_cols >= columns.len().div_ceil(2)
        })
        .count();

    let ratio = aligned_rows as f32 / rows.len() as f32;
    if ratio < config.min_alignment_ratio {
        return None;
    }

    let region = rows
        .iter()
        .flat_map(|r| r.cells.iter().map(|c| c.bbox))
        .reduce(|acc, b| acc.union(&b))?;

    Some(DetectedTable {
        region,
        columns,
        rows,
    })
}

/// Detect column boundaries from a set of table rows.
///
/// Buckets the X-start of every cell, keeps buckets present in at least
/// `min_alignment_ratio` of the rows and merges positions closer than
/// `min_column_gap`.
pub fn detect_columns(rows: &[TableRowData], config: &TableDetectorConfig) -> Vec<f32> {
    if rows.is_empty() {
        return Vec::new();
    }

    let total_rows = rows.len();

    let mut x_freq: BTreeMap<i32, (f32, usize)> = BTreeMap::new();
    for row in rows {
        // One vote per bucket per row.
        let mut seen_buckets: HashSet<i32> = HashSet::new();
        for cell in &row.cells {
            let bucket = cell.x.round() as i32;
            if seen_buckets.insert(bucket) {
                let entry = x_freq.entry(bucket).or_insert((0.0, 0));
                entry.0 += cell.x;
                entry.1 += 1;
            }
        }
    }

    let min_count = (total_rows as f32 * config.min_alignment_ratio).ceil() as usize;
    let mut candidates: Vec<f32> = x_freq
        .values()
        .filter(|(_, count)| *count >= min_count)
        .map(|(sum, count)| sum / *count as f32)
        .collect();
    candidates.sort_by(f32::total_cmp);

    let mut columns: Vec<f32> = Vec::new();
    for x in candidates {
        if columns
            .last()
            .is_some_and(|&last| (x - last).abs() < config.min_column_gap)
        {
            continue;
        }
        columns.push(x);
    }

    columns
}

/// Median font size times `factor`, never below one point.
fn compute_y_tolerance(spans: &[TextSpan], factor: f32) -> f32 {
    if spans.is_empty() {
        return 1.0;
    }
    let mut sizes: Vec<f32> = spans.iter().map(|s| s.font_size).collect();
    sizes.sort_by(f32::total_cmp);
    let median = sizes[sizes.len() / 2];
    (median * factor).max(1.0)
}
