//! Column width tracking for auto-sizing streamed sheets
//!
//! Rows leave memory when they are flushed, so a column cannot be measured
//! by scanning it at the end. Instead the aggregator observes every cell as
//! it is written and keeps one running maximum per tracked column. Columns
//! that are not tracked are never measured and their history is lost.

use crate::error::{ExcelError, Result};
use crate::types::{CellValue, Row};
use std::collections::{BTreeMap, BTreeSet};

/// Padding added to any non-empty cell, in characters
pub const CELL_PADDING: f64 = 0.71;

/// Widest column XLSX accepts, in characters
pub const MAX_COLUMN_WIDTH: f64 = 255.0;

/// Which columns are sampled
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackedColumnSet {
    /// Nothing is tracked
    #[default]
    None,
    /// Every column except the listed ones
    AllExcept(BTreeSet<u32>),
    /// Only the listed columns
    Only(BTreeSet<u32>),
}

impl TrackedColumnSet {
    pub fn contains(&self, col: u32) -> bool {
        match self {
            TrackedColumnSet::None => false,
            TrackedColumnSet::AllExcept(excluded) => !excluded.contains(&col),
            TrackedColumnSet::Only(included) => included.contains(&col),
        }
    }

    /// Returns true if `col` was not tracked before
    pub fn insert(&mut self, col: u32) -> bool {
        match self {
            TrackedColumnSet::None => {
                *self = TrackedColumnSet::Only(BTreeSet::from([col]));
                true
            }
            TrackedColumnSet::AllExcept(excluded) => excluded.remove(&col),
            TrackedColumnSet::Only(included) => included.insert(col),
        }
    }

    /// Returns true if `col` was tracked before
    pub fn remove(&mut self, col: u32) -> bool {
        match self {
            TrackedColumnSet::None => false,
            TrackedColumnSet::AllExcept(excluded) => excluded.insert(col),
            TrackedColumnSet::Only(included) => {
                let removed = included.remove(&col);
                if included.is_empty() {
                    *self = TrackedColumnSet::None;
                }
                removed
            }
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, TrackedColumnSet::AllExcept(_))
    }
}

/// Width of a value in characters, as a spreadsheet would render it
pub fn estimate_width(value: &CellValue) -> f64 {
    let text = value.display_text();
    if text.is_empty() {
        return 0.0;
    }
    let widest_line = text
        .lines()
        .map(|line| line.chars().map(char_width).sum::<f64>())
        .fold(0.0, f64::max);
    widest_line + CELL_PADDING
}

fn char_width(c: char) -> f64 {
    // CJK, Hangul and fullwidth forms render roughly two columns wide
    match c as u32 {
        0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6 | 0x20000..=0x3FFFD => 2.0,
        _ => 1.0,
    }
}

/// Running maximum width per tracked column
#[derive(Debug, Default)]
pub struct ColumnWidthAggregator {
    tracked: TrackedColumnSet,
    widths: BTreeMap<u32, f64>,
}

impl ColumnWidthAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cell write; untracked columns are ignored
    pub fn observe(&mut self, col: u32, value: &CellValue) {
        if !self.tracked.contains(col) {
            return;
        }
        let width = estimate_width(value);
        let entry = self.widths.entry(col).or_insert(0.0);
        if width > *entry {
            *entry = width;
        }
    }

    /// Capture a row's contribution before it leaves memory
    pub fn finalize_row(&mut self, row: &Row) {
        if matches!(self.tracked, TrackedColumnSet::None) {
            return;
        }
        for cell in row.cells() {
            self.observe(cell.col, &cell.value);
        }
    }

    /// Widest value seen in `col` since it started being tracked
    pub fn query(&self, col: u32) -> Result<f64> {
        if !self.tracked.contains(col) {
            return Err(ExcelError::ColumnNotTracked { col });
        }
        Ok(self.widths.get(&col).copied().unwrap_or(0.0))
    }

    pub fn is_tracked(&self, col: u32) -> bool {
        self.tracked.contains(col)
    }

    pub fn track(&mut self, col: u32) -> bool {
        self.tracked.insert(col)
    }

    pub fn track_columns<I: IntoIterator<Item = u32>>(&mut self, cols: I) {
        for col in cols {
            self.track(col);
        }
    }

    /// Track every column; widths already gathered are kept
    pub fn track_all(&mut self) {
        self.tracked = TrackedColumnSet::AllExcept(BTreeSet::new());
    }

    /// Stop tracking `col` and forget its width
    pub fn untrack(&mut self, col: u32) -> bool {
        self.widths.remove(&col);
        self.tracked.remove(col)
    }

    pub fn untrack_columns<I: IntoIterator<Item = u32>>(&mut self, cols: I) {
        for col in cols {
            self.untrack(col);
        }
    }

    pub fn untrack_all(&mut self) {
        self.tracked = TrackedColumnSet::None;
        self.widths.clear();
    }

    pub fn is_tracking_all(&self) -> bool {
        self.tracked.is_all()
    }

    /// Columns tracked explicitly or that have been observed in track-all mode
    pub fn tracked_columns(&self) -> BTreeSet<u32> {
        match &self.tracked {
            TrackedColumnSet::None => BTreeSet::new(),
            TrackedColumnSet::Only(cols) => cols.clone(),
            TrackedColumnSet::AllExcept(excluded) => self
                .widths
                .keys()
                .filter(|col| !excluded.contains(col))
                .copied()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellStyle;

    #[test]
    fn test_untracked_column_is_error() {
        let mut agg = ColumnWidthAggregator::new();
        agg.observe(0, &CellValue::from("a long value"));

        assert!(matches!(
            agg.query(0),
            Err(ExcelError::ColumnNotTracked { col: 0 })
        ));
    }

    #[test]
    fn test_running_max_never_decreases() {
        let mut agg = ColumnWidthAggregator::new();
        agg.track(2);

        agg.observe(2, &CellValue::from("longer text"));
        agg.observe(2, &CellValue::from("short"));

        assert_eq!(agg.query(2).unwrap(), 11.0 + CELL_PADDING);
    }

    #[test]
    fn test_retrack_resets_history() {
        let mut agg = ColumnWidthAggregator::new();
        agg.track(0);
        agg.observe(0, &CellValue::from("0123456789"));

        assert!(agg.untrack(0));
        agg.track(0);
        assert_eq!(agg.query(0).unwrap(), 0.0);
    }

    #[test]
    fn test_track_all_with_exclusions() {
        let mut agg = ColumnWidthAggregator::new();
        agg.track_all();
        agg.untrack(1);

        agg.observe(0, &CellValue::Int(12345));
        agg.observe(1, &CellValue::from("ignored"));

        assert!(agg.is_tracked(7));
        assert!(!agg.is_tracked(1));
        assert_eq!(agg.query(0).unwrap(), 5.0 + CELL_PADDING);
        assert_eq!(agg.tracked_columns(), BTreeSet::from([0]));

        agg.track(1);
        assert!(agg.is_tracked(1));
        agg.untrack_all();
        assert!(!agg.is_tracked(0));
    }

    #[test]
    fn test_finalize_row_samples_tracked_cells() {
        let mut agg = ColumnWidthAggregator::new();
        agg.track_columns([0, 2]);

        let mut row = Row::new(0);
        row.set_cell(0, "abc".into(), CellStyle::Default).unwrap();
        row.set_cell(1, "not tracked".into(), CellStyle::Default).unwrap();
        row.set_cell(2, CellValue::Bool(false), CellStyle::Default).unwrap();
        agg.finalize_row(&row);

        assert_eq!(agg.query(0).unwrap(), 3.0 + CELL_PADDING);
        assert_eq!(agg.query(2).unwrap(), 5.0 + CELL_PADDING);
        assert!(agg.query(1).is_err());
    }

    #[test]
    fn test_estimate_width() {
        assert_eq!(estimate_width(&CellValue::Empty), 0.0);
        assert_eq!(estimate_width(&CellValue::Formula("SUM(A:A)".into())), 0.0);
        assert_eq!(estimate_width(&CellValue::from("ab\nabcd")), 4.0 + CELL_PADDING);
        assert_eq!(estimate_width(&CellValue::from("表")), 2.0 + CELL_PADDING);
    }
}
