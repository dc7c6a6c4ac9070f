//! Error types for the sxstream library

use thiserror::Error;

/// Result type alias for sxstream operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Main error type for all streaming workbook operations
#[derive(Error, Debug)]
pub enum ExcelError {
    /// Row index is below the flush boundary of its sheet
    #[error("Row {row} has already been written to disk and cannot be modified (flushed rows: 0..{boundary})")]
    RowAlreadyFlushed { row: u32, boundary: u32 },

    /// Row index is already resident in the window
    #[error("Row {row} already exists in the row window")]
    RowIndexCollision { row: u32 },

    /// Window is full and the new row would be evicted on arrival
    #[error("Row {row} is below every resident row (lowest resident: {lowest_resident}) and the window is full")]
    RowBelowWindow { row: u32, lowest_resident: u32 },

    /// Row index outside the format's row range
    #[error("Invalid row index {row}: maximum allowed is {max}")]
    InvalidRowIndex { row: u32, max: u32 },

    /// Operation needs a resident row that is not in the window
    #[error("Row {row} is not resident in the row window")]
    RowNotResident { row: u32 },

    /// Auto-sizing requested for a column that is not tracked
    #[error("Column {col} is not tracked for auto-sizing; call track_column_for_auto_sizing first")]
    ColumnNotTracked { col: u32 },

    /// Failure reading, writing or disposing a sheet's spill file
    #[error("Spill store I/O error for sheet '{sheet}': {source}")]
    SpillIo {
        sheet: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid cell reference
    #[error("Invalid cell reference: {0}")]
    InvalidCell(String),

    /// Invalid sheet name or sheet not found
    #[error("Sheet '{sheet}' not found. Available sheets: {available}")]
    SheetNotFound { sheet: String, available: String },

    /// Sheet name already used in this workbook
    #[error("Sheet '{0}' already exists")]
    DuplicateSheet(String),

    /// Invalid construction parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error occurred while writing the output archive
    #[error("Failed to write Excel file: {0}")]
    WriteError(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ExcelError {
    /// Wrap an I/O failure of the spill file backing `sheet`
    pub(crate) fn spill(sheet: &str, source: std::io::Error) -> Self {
        ExcelError::SpillIo {
            sheet: sheet.to_string(),
            source,
        }
    }

    /// True for errors raised by the spill store
    pub fn is_spill_error(&self) -> bool {
        matches!(self, ExcelError::SpillIo { .. })
    }
}
