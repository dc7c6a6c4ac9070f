//! Bounded-memory streaming writer
//!
//! Each sheet keeps a window of recent rows in memory. When the window is
//! full the lowest row is encoded and appended to a per-sheet spill file;
//! on write the spill file is replayed ahead of the rows still resident.
//!
//! - [`RowWindow`]: ordered resident rows and the flush boundary
//! - [`SpillStore`]: append-only temp file, optionally compressed and encrypted
//! - [`ColumnWidthAggregator`]: running column widths for auto-sizing
//! - [`assembler`]: package parts plus sheets into an [`ArchiveSink`]

pub mod assembler;
mod cipher;
pub mod encoder;
mod flush;
pub mod memory;
pub mod package;
pub mod sheet;
pub mod spill;
pub mod tracker;
pub mod window;
pub mod workbook;

pub use assembler::{ArchiveSink, MemoryArchive, ZipArchive};
pub use encoder::{RowEncoder, SheetHeader, XmlRowEncoder};
pub use memory::{StreamingOptions, WindowProfile, WindowSize, DEFAULT_WINDOW_SIZE};
pub use sheet::{RowMut, StreamingSheet};
pub use spill::{SpillContext, SpillReplay, SpillStore};
pub use tracker::{ColumnWidthAggregator, TrackedColumnSet};
pub use window::RowWindow;
pub use workbook::{StreamingWorkbook, TemplateSheet, WorkbookTemplate};

/// Workbook sized from the `MEMORY_LIMIT_MB` environment variable
///
/// # Examples
///
/// ```no_run
/// use sxstream::streaming::create_workbook_auto;
///
/// let mut workbook = create_workbook_auto();
/// workbook.create_sheet("Sheet1")?.write_row(0, ["Name", "Age"])?;
/// workbook.save("output.xlsx")?;
/// # Ok::<(), sxstream::ExcelError>(())
/// ```
pub fn create_workbook_auto() -> StreamingWorkbook {
    StreamingWorkbook::with_options(StreamingOptions::from_env())
}

/// Workbook using the window of a given memory profile
pub fn create_workbook_with_profile(profile: WindowProfile) -> StreamingWorkbook {
    StreamingWorkbook::with_options(StreamingOptions::default().with_profile(profile))
}
