//! Moving rows from a sheet's window into its spill store

use super::encoder::RowEncoder;
use super::spill::{SpillContext, SpillStore};
use super::tracker::ColumnWidthAggregator;
use super::window::RowWindow;
use crate::error::Result;
use crate::types::Row;
use tracing::{debug, trace};

/// Borrowed view of the parts of a sheet that take part in a flush
pub(crate) struct FlushCoordinator<'a> {
    pub(crate) sheet: &'a str,
    pub(crate) window: &'a mut RowWindow,
    pub(crate) widths: &'a mut ColumnWidthAggregator,
    pub(crate) spill: &'a mut Option<SpillStore>,
    pub(crate) context: &'a SpillContext,
    pub(crate) encoder: &'a dyn RowEncoder,
    pub(crate) scratch: &'a mut Vec<u8>,
}

impl FlushCoordinator<'_> {
    /// Spill the lowest resident row. Returns its index, or `None` if the
    /// window is empty.
    ///
    /// If encoding or spilling fails the row stays resident and the
    /// boundary does not move.
    pub(crate) fn evict_oldest(&mut self) -> Result<Option<u32>> {
        let Some(row) = self.window.oldest() else {
            return Ok(None);
        };
        let index = row.index();

        self.widths.finalize_row(row);
        self.scratch.clear();
        self.encoder.encode_row(row, self.scratch)?;
        open_store(self.spill, self.context, self.sheet)?.append(self.scratch)?;

        self.window.pop_oldest();
        trace!(sheet = self.sheet, row = index, "evicted row");
        Ok(Some(index))
    }

    /// Evict until `extra` more rows fit into the window
    pub(crate) fn make_room(&mut self, extra: usize) -> Result<usize> {
        let overflow = self.window.overflow_with(extra);
        for _ in 0..overflow {
            self.evict_oldest()?;
        }
        Ok(overflow)
    }

    /// Spill all but the newest `keep` resident rows
    pub(crate) fn flush_rows(&mut self, keep: usize) -> Result<usize> {
        let count = self.window.len().saturating_sub(keep);
        for _ in 0..count {
            self.evict_oldest()?;
        }
        if count > 0 {
            debug!(
                sheet = self.sheet,
                flushed = count,
                boundary = self.window.boundary(),
                "flushed rows"
            );
        }
        Ok(count)
    }

    /// Spill every resident row
    pub(crate) fn flush_all(&mut self) -> Result<usize> {
        self.flush_rows(0)
    }

    /// Write rows that never enter the window, e.g. from a template.
    ///
    /// Rows must be ascending and at or above the current boundary.
    pub(crate) fn seed<I: IntoIterator<Item = Row>>(&mut self, rows: I) -> Result<usize> {
        let mut seeded = 0;
        for row in rows {
            self.window.check_admissible(row.index())?;
            self.widths.finalize_row(&row);
            self.scratch.clear();
            self.encoder.encode_row(&row, self.scratch)?;
            open_store(self.spill, self.context, self.sheet)?.append(self.scratch)?;
            self.window.advance_boundary(row.index().saturating_add(1));
            seeded += 1;
        }
        Ok(seeded)
    }
}

/// The sheet's spill store, created on first use
fn open_store<'s>(
    spill: &'s mut Option<SpillStore>,
    context: &SpillContext,
    sheet: &str,
) -> Result<&'s mut SpillStore> {
    let store = match spill.take() {
        Some(store) => store,
        None => SpillStore::open(context, sheet)?,
    };
    Ok(spill.insert(store))
}
