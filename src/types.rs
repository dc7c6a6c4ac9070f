//! Type definitions for spreadsheet data

use crate::error::{ExcelError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Largest 0-based row index an XLSX sheet can hold (1,048,576 rows)
pub const MAX_ROW_INDEX: u32 = 1_048_575;

/// Largest 0-based column index an XLSX sheet can hold (column XFD)
pub const MAX_COLUMN_INDEX: u32 = 16_383;

/// Cell style presets for formatting
///
/// A style is a lookup id into the table written to `xl/styles.xml`; cells
/// never own style data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellStyle {
    /// Default style - no formatting
    #[default]
    Default = 0,
    /// Bold text for headers
    HeaderBold = 1,
    /// Integer format with thousand separator (#,##0)
    NumberInteger = 2,
    /// Decimal format with 2 places (#,##0.00)
    NumberDecimal = 3,
    /// Currency format ($#,##0.00)
    NumberCurrency = 4,
    /// Percentage format (0.00%)
    NumberPercentage = 5,
    /// Date format (MM/DD/YYYY)
    DateDefault = 6,
    /// DateTime format (MM/DD/YYYY HH:MM:SS)
    DateTimestamp = 7,
    /// Bold text for emphasis
    TextBold = 8,
    /// Italic text for notes
    TextItalic = 9,
    /// Yellow background highlight
    HighlightYellow = 10,
    /// Green background highlight
    HighlightGreen = 11,
    /// Red background highlight
    HighlightRed = 12,
    /// Thin borders on all sides
    BorderThin = 13,
}

impl CellStyle {
    /// Get the style index for XML
    pub fn index(&self) -> u32 {
        *self as u32
    }
}

/// Represents a single cell value in a worksheet
///
/// Values are opaque to the streaming core; only the encoder and the width
/// estimator look inside them.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell
    #[default]
    Empty,
    /// String value
    String(String),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// DateTime value (Excel serial date number)
    DateTime(f64),
    /// Error value (e.g. "#N/A")
    Error(String),
    /// Formula value (e.g., "SUM(A1:A10)"), written as-is and never evaluated
    Formula(String),
}

impl CellValue {
    /// Text a spreadsheet application would render for this value.
    ///
    /// Formulas have no cached result here, so they render as nothing.
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Empty | CellValue::Formula(_) => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) | CellValue::DateTime(f) if !f.is_finite() => {
                "#NUM!".to_string()
            }
            CellValue::Float(f) | CellValue::DateTime(f) => f.to_string(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.clone(),
        }
    }

    /// Check if cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Formula(formula) => write!(f, "={}", formula.trim_start_matches('=')),
            other => write!(f, "{}", other.display_text()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// A cell owned by its row
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    /// Column index (0-based)
    pub col: u32,
    /// Cell value
    pub value: CellValue,
    /// Style id into the workbook style table
    pub style: CellStyle,
}

impl Cell {
    /// Create a new cell with the default style
    pub fn new(col: u32, value: CellValue) -> Self {
        Cell {
            col,
            value,
            style: CellStyle::Default,
        }
    }

    /// Get Excel-style reference of this cell in `row` (e.g., "A1", "B2")
    pub fn reference(&self, row: u32) -> String {
        format!("{}{}", column_letter(self.col), row + 1)
    }
}

/// Convert column index to Excel letters (0 -> A, 25 -> Z, 26 -> AA)
pub fn column_letter(col: u32) -> String {
    let mut result = String::new();
    let mut col = col + 1;

    while col > 0 {
        col -= 1;
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }

    result
}

/// A row of cells keyed by column
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Row {
    index: u32,
    cells: BTreeMap<u32, Cell>,
    height: Option<f32>,
    hidden: bool,
}

impl Row {
    /// Create an empty row
    pub fn new(index: u32) -> Self {
        Row {
            index,
            cells: BTreeMap::new(),
            height: None,
            hidden: false,
        }
    }

    /// Build a row from consecutive values starting at column A
    pub fn from_values<I, V>(index: u32, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let mut row = Row::new(index);
        for (col, value) in values.into_iter().enumerate() {
            row.set_cell(col as u32, value.into(), CellStyle::Default)?;
        }
        Ok(row)
    }

    /// Row index (0-based)
    pub fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: u32) {
        self.index = index;
    }

    /// Get cell at column index
    pub fn cell(&self, col: u32) -> Option<&Cell> {
        self.cells.get(&col)
    }

    /// Cells in ascending column order
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Set or replace a cell
    pub fn set_cell(&mut self, col: u32, value: CellValue, style: CellStyle) -> Result<&Cell> {
        if col > MAX_COLUMN_INDEX {
            return Err(ExcelError::InvalidCell(format!(
                "column {} exceeds maximum column index {}",
                col, MAX_COLUMN_INDEX
            )));
        }
        let cell = self.cells.entry(col).or_insert_with(|| Cell::new(col, CellValue::Empty));
        cell.value = value;
        cell.style = style;
        Ok(cell)
    }

    /// Remove a cell, returning it if present
    pub fn remove_cell(&mut self, col: u32) -> Option<Cell> {
        self.cells.remove(&col)
    }

    /// Custom row height in points
    pub fn height(&self) -> Option<f32> {
        self.height
    }

    pub fn set_height(&mut self, height: Option<f32>) {
        self.height = height;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Get number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if row has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_reference() {
        let cell = Cell::new(0, CellValue::Empty);
        assert_eq!(cell.reference(0), "A1");

        let cell = Cell::new(25, CellValue::Empty);
        assert_eq!(cell.reference(0), "Z1");

        let cell = Cell::new(26, CellValue::Empty);
        assert_eq!(cell.reference(9), "AA10");

        assert_eq!(column_letter(MAX_COLUMN_INDEX), "XFD");
    }

    #[test]
    fn test_row_cells_are_ordered() {
        let mut row = Row::new(4);
        row.set_cell(3, "d".into(), CellStyle::Default).unwrap();
        row.set_cell(0, "a".into(), CellStyle::HeaderBold).unwrap();

        let cols: Vec<u32> = row.cells().map(|c| c.col).collect();
        assert_eq!(cols, vec![0, 3]);
        assert_eq!(row.cell(0).unwrap().style, CellStyle::HeaderBold);
    }

    #[test]
    fn test_column_out_of_range() {
        let mut row = Row::new(0);
        let err = row
            .set_cell(MAX_COLUMN_INDEX + 1, CellValue::Int(1), CellStyle::Default)
            .unwrap_err();
        assert!(matches!(err, ExcelError::InvalidCell(_)));
    }

    #[test]
    fn test_display_text() {
        assert_eq!(CellValue::Bool(true).display_text(), "TRUE");
        assert_eq!(CellValue::Int(-42).display_text(), "-42");
        assert_eq!(CellValue::Float(f64::NAN).display_text(), "#NUM!");
        assert_eq!(CellValue::Formula("SUM(A1:A2)".into()).display_text(), "");
        assert_eq!(CellValue::Formula("SUM(A1:A2)".into()).to_string(), "=SUM(A1:A2)");
    }
}
