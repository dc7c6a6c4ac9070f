//! Streaming worksheet: a row window backed by a spill store

use super::encoder::{RowEncoder, SheetHeader};
use super::flush::FlushCoordinator;
use super::memory::WindowSize;
use super::spill::{SpillContext, SpillStore};
use super::tracker::{estimate_width, ColumnWidthAggregator, MAX_COLUMN_WIDTH};
use super::window::RowWindow;
use crate::error::{ExcelError, Result};
use crate::types::{Cell, CellStyle, CellValue, Row, MAX_COLUMN_INDEX};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// A worksheet that keeps at most a fixed number of rows in memory
///
/// Rows must be created in a way that never goes back below the flush
/// boundary: once a row has been spilled, no row at or below its index can
/// be created or modified again. Operations that need random access to
/// history (cloning, shifting rows) are not offered.
pub struct StreamingSheet {
    name: String,
    window: RowWindow,
    widths: ColumnWidthAggregator,
    column_widths: BTreeMap<u32, f64>,
    spill: Option<SpillStore>,
    context: Rc<SpillContext>,
    encoder: Rc<dyn RowEncoder>,
    scratch: Vec<u8>,
}

impl StreamingSheet {
    pub(crate) fn new(
        name: &str,
        window_size: WindowSize,
        context: Rc<SpillContext>,
        encoder: Rc<dyn RowEncoder>,
    ) -> Self {
        StreamingSheet {
            name: name.to_string(),
            window: RowWindow::new(window_size),
            widths: ColumnWidthAggregator::new(),
            column_widths: BTreeMap::new(),
            spill: None,
            context,
            encoder,
            scratch: Vec::with_capacity(4096),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window_size(&self) -> WindowSize {
        self.window.size()
    }

    /// Create a new row at `index`
    ///
    /// When the window is full the lowest resident row is spilled first, so
    /// the window never holds more than its capacity.
    ///
    /// Fails with `InvalidRowIndex` past the last sheet row,
    /// `RowAlreadyFlushed` below the flush boundary, `RowIndexCollision` if
    /// the row is resident, and `RowBelowWindow` if the window is full and
    /// `index` is below every resident row. A failed spill leaves the window
    /// and boundary unchanged.
    pub fn create_row(&mut self, index: u32) -> Result<RowMut<'_>> {
        self.window.check_admissible(index)?;
        if self.window.is_full() {
            if let Some(lowest) = self.window.first_index().filter(|&lowest| index < lowest) {
                return Err(ExcelError::RowBelowWindow {
                    row: index,
                    lowest_resident: lowest,
                });
            }
            self.coordinator().make_room(1)?;
        }

        let row = self.window.insert(Row::new(index))?;
        Ok(RowMut {
            row,
            widths: &mut self.widths,
        })
    }

    /// Create a row and fill it with consecutive values from column A
    pub fn write_row<I, V>(&mut self, index: u32, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let mut row = self.create_row(index)?;
        for (col, value) in values.into_iter().enumerate() {
            row.set_cell(col as u32, value)?;
        }
        Ok(())
    }

    /// Resident row at `index`
    pub fn row(&self, index: u32) -> Option<&Row> {
        self.window.get(index)
    }

    /// Mutable access to a resident row
    pub fn row_mut(&mut self, index: u32) -> Option<RowMut<'_>> {
        let row = self.window.get_mut(index)?;
        Some(RowMut {
            row,
            widths: &mut self.widths,
        })
    }

    /// Resident rows in ascending order
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.window.iter()
    }

    /// Remove a resident row. Flushed rows cannot be removed.
    pub fn remove_row(&mut self, index: u32) -> Result<Option<Row>> {
        self.window.remove(index)
    }

    /// Move a resident row to a new index
    pub fn change_row_num(&mut self, index: u32, new_index: u32) -> Result<()> {
        self.window.rekey(index, new_index)
    }

    /// Spill every resident row now
    pub fn flush_buffered_data(&mut self) -> Result<()> {
        self.coordinator().flush_all()?;
        Ok(())
    }

    /// Spill all but the newest `keep` resident rows
    pub fn flush_rows(&mut self, keep: usize) -> Result<()> {
        self.coordinator().flush_rows(keep)?;
        Ok(())
    }

    /// Rows below this index have been spilled
    pub fn flush_boundary(&self) -> u32 {
        self.window.boundary()
    }

    /// Index of the last spilled row, if any
    pub fn last_flushed_row_num(&self) -> Option<u32> {
        self.window.boundary().checked_sub(1)
    }

    pub fn all_rows_flushed(&self) -> bool {
        self.window.is_empty()
    }

    pub fn resident_row_count(&self) -> usize {
        self.window.len()
    }

    /// Lowest resident row index
    pub fn first_row_num(&self) -> Option<u32> {
        self.window.first_index()
    }

    /// Highest row index ever created, resident or spilled
    pub fn last_row_num(&self) -> Option<u32> {
        self.window.last_index().or_else(|| self.last_flushed_row_num())
    }

    pub fn track_column_for_auto_sizing(&mut self, col: u32) {
        self.widths.track(col);
    }

    pub fn track_columns_for_auto_sizing<I: IntoIterator<Item = u32>>(&mut self, cols: I) {
        self.widths.track_columns(cols);
    }

    pub fn track_all_columns_for_auto_sizing(&mut self) {
        self.widths.track_all();
    }

    /// Returns true if the column was tracked
    pub fn untrack_column_for_auto_sizing(&mut self, col: u32) -> bool {
        self.widths.untrack(col)
    }

    pub fn untrack_columns_for_auto_sizing<I: IntoIterator<Item = u32>>(&mut self, cols: I) {
        self.widths.untrack_columns(cols);
    }

    pub fn untrack_all_columns_for_auto_sizing(&mut self) {
        self.widths.untrack_all();
    }

    pub fn is_column_tracked_for_auto_sizing(&self, col: u32) -> bool {
        self.widths.is_tracked(col)
    }

    pub fn tracked_columns(&self) -> BTreeSet<u32> {
        self.widths.tracked_columns()
    }

    /// Size `col` to its widest value, including rows already spilled
    ///
    /// The width is stored as the column's explicit width and returned.
    pub fn auto_size_column(&mut self, col: u32) -> Result<f64> {
        let tracked = self.widths.query(col)?;
        let resident = self
            .window
            .iter()
            .filter_map(|row| row.cell(col))
            .map(|cell| estimate_width(&cell.value))
            .fold(0.0, f64::max);

        let width = tracked.max(resident).min(MAX_COLUMN_WIDTH);
        if width > 0.0 {
            self.column_widths.insert(col, width);
        }
        Ok(width)
    }

    /// Set an explicit column width in characters
    pub fn set_column_width(&mut self, col: u32, width: f64) -> Result<()> {
        if col > MAX_COLUMN_INDEX {
            return Err(ExcelError::InvalidCell(format!(
                "column {} exceeds maximum column index {}",
                col, MAX_COLUMN_INDEX
            )));
        }
        self.column_widths.insert(col, width.clamp(0.0, MAX_COLUMN_WIDTH));
        Ok(())
    }

    pub fn column_width(&self, col: u32) -> Option<f64> {
        self.column_widths.get(&col).copied()
    }

    /// Path of the spill file while one exists
    pub fn spill_path(&self) -> Option<&Path> {
        self.spill.as_ref().and_then(SpillStore::path)
    }

    /// Release the spill file. Safe to call more than once; afterwards the
    /// sheet can no longer flush.
    pub fn dispose(&mut self) -> Result<()> {
        match &mut self.spill {
            Some(store) => store.dispose(),
            None => {
                self.spill = Some(SpillStore::disposed(&self.name));
                Ok(())
            }
        }
    }

    pub(crate) fn seed_rows<I: IntoIterator<Item = Row>>(&mut self, rows: I) -> Result<usize> {
        let seeded = self.coordinator().seed(rows)?;
        debug!(sheet = %self.name, seeded, boundary = self.window.boundary(), "seeded template rows");
        Ok(seeded)
    }

    /// Emit this sheet's complete XML: header, spilled rows, resident rows, footer
    pub(crate) fn write_to<F>(&mut self, mut emit: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let mut buffer = Vec::with_capacity(4096);
        self.encoder.sheet_header(
            &SheetHeader {
                name: &self.name,
                column_widths: &self.column_widths,
            },
            &mut buffer,
        )?;
        emit(buffer.as_slice())?;

        let mut spilled = 0u64;
        if let Some(store) = self.spill.as_mut() {
            for fragment in store.replay()? {
                emit(fragment?.as_slice())?;
                spilled += 1;
            }
        }

        let mut last_index = self.window.boundary().checked_sub(1);
        for row in self.window.iter() {
            debug_assert!(last_index.map_or(true, |last| row.index() > last));
            buffer.clear();
            self.encoder.encode_row(row, &mut buffer)?;
            emit(buffer.as_slice())?;
            last_index = Some(row.index());
        }

        buffer.clear();
        self.encoder.sheet_footer(&mut buffer)?;
        emit(buffer.as_slice())?;

        debug!(
            sheet = %self.name,
            spilled,
            resident = self.window.len(),
            "assembled sheet"
        );
        Ok(())
    }

    fn coordinator(&mut self) -> FlushCoordinator<'_> {
        FlushCoordinator {
            sheet: &self.name,
            window: &mut self.window,
            widths: &mut self.widths,
            spill: &mut self.spill,
            context: &self.context,
            encoder: self.encoder.as_ref(),
            scratch: &mut self.scratch,
        }
    }
}

impl std::fmt::Debug for StreamingSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingSheet")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("spill", &self.spill)
            .finish_non_exhaustive()
    }
}

/// Mutable handle to a resident row
///
/// Every cell write goes through the sheet's width tracker so that
/// auto-sizing still sees the value after the row is spilled.
#[derive(Debug)]
pub struct RowMut<'a> {
    row: &'a mut Row,
    widths: &'a mut ColumnWidthAggregator,
}

impl RowMut<'_> {
    pub fn index(&self) -> u32 {
        self.row.index()
    }

    pub fn set_cell<V: Into<CellValue>>(&mut self, col: u32, value: V) -> Result<&mut Self> {
        self.set_styled_cell(col, value, CellStyle::Default)
    }

    pub fn set_styled_cell<V: Into<CellValue>>(
        &mut self,
        col: u32,
        value: V,
        style: CellStyle,
    ) -> Result<&mut Self> {
        let cell = self.row.set_cell(col, value.into(), style)?;
        self.widths.observe(col, &cell.value);
        Ok(self)
    }

    pub fn remove_cell(&mut self, col: u32) -> Option<Cell> {
        self.row.remove_cell(col)
    }

    pub fn cell(&self, col: u32) -> Option<&Cell> {
        self.row.cell(col)
    }

    pub fn set_height(&mut self, height: Option<f32>) -> &mut Self {
        self.row.set_height(height);
        self
    }

    pub fn set_hidden(&mut self, hidden: bool) -> &mut Self {
        self.row.set_hidden(hidden);
        self
    }

    pub fn as_row(&self) -> &Row {
        self.row
    }
}
