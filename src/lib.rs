//! # sxstream
//!
//! A bounded-memory streaming XLSX writer.
//!
//! ## Features
//!
//! - **Fixed memory per sheet**: only a window of recent rows stays in memory
//! - **Spill files**: older rows are encoded once and appended to a temp file
//! - **Encrypted spill**: optional AES-256-GCM with a per-file in-memory key
//! - **Compressed spill**: optional deflate of every spilled row
//! - **Auto-sizing**: column widths tracked as cells are written, including
//!   rows already spilled
//! - **Templates**: start from existing rows that count as already flushed
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sxstream::{CellStyle, CellValue, StreamingOptions, StreamingWorkbook, WindowSize};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = StreamingOptions::default()
//!     .with_window_size(WindowSize::rows(100)?)
//!     .with_encrypted_spill(true);
//! let mut workbook = StreamingWorkbook::with_options(options);
//!
//! let sheet = workbook.create_sheet("Sales")?;
//! sheet.track_column_for_auto_sizing(0);
//!
//! sheet
//!     .create_row(0)?
//!     .set_styled_cell(0, "Region", CellStyle::HeaderBold)?
//!     .set_styled_cell(1, "Total", CellStyle::HeaderBold)?;
//!
//! for i in 1..=1_000_000u32 {
//!     let mut row = sheet.create_row(i)?;
//!     row.set_cell(0, format!("Region {}", i % 50))?;
//!     row.set_cell(1, CellValue::Float(i as f64 * 1.5))?;
//! }
//!
//! sheet.auto_size_column(0)?;
//! workbook.save("sales.xlsx")?;
//! workbook.dispose()?;
//! # Ok(())
//! # }
//! ```
//!
//! Rows below the flush boundary are gone from memory: creating or changing
//! them fails with [`ExcelError::RowAlreadyFlushed`].

pub mod error;
pub mod streaming;
pub mod types;

pub use error::{ExcelError, Result};
pub use streaming::{
    ArchiveSink, MemoryArchive, RowMut, StreamingOptions, StreamingSheet, StreamingWorkbook,
    TemplateSheet, WindowProfile, WindowSize, WorkbookTemplate, ZipArchive,
};
pub use types::{Cell, CellStyle, CellValue, Row};
