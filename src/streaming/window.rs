//! Bounded, ordered set of rows a sheet keeps in memory

use super::memory::WindowSize;
use crate::error::{ExcelError, Result};
use crate::types::{Row, MAX_ROW_INDEX};
use std::collections::BTreeMap;

/// Resident rows of one sheet plus its flush boundary
///
/// Every index below `boundary` has been spilled and can never come back.
#[derive(Debug)]
pub struct RowWindow {
    rows: BTreeMap<u32, Row>,
    size: WindowSize,
    boundary: u32,
}

impl RowWindow {
    pub fn new(size: WindowSize) -> Self {
        Self::with_boundary(size, 0)
    }

    /// Window whose rows below `boundary` already live elsewhere
    pub fn with_boundary(size: WindowSize, boundary: u32) -> Self {
        RowWindow {
            rows: BTreeMap::new(),
            size,
            boundary,
        }
    }

    pub fn size(&self) -> WindowSize {
        self.size
    }

    pub fn boundary(&self) -> u32 {
        self.boundary
    }

    /// Check that `index` may become a resident row
    pub fn check_admissible(&self, index: u32) -> Result<()> {
        if index > MAX_ROW_INDEX {
            return Err(ExcelError::InvalidRowIndex {
                row: index,
                max: MAX_ROW_INDEX,
            });
        }
        if index < self.boundary {
            return Err(ExcelError::RowAlreadyFlushed {
                row: index,
                boundary: self.boundary,
            });
        }
        if self.rows.contains_key(&index) {
            return Err(ExcelError::RowIndexCollision { row: index });
        }
        Ok(())
    }

    /// True when admitting one more row requires an eviction first
    pub fn is_full(&self) -> bool {
        self.size
            .capacity()
            .is_some_and(|capacity| self.rows.len() >= capacity)
    }

    /// Number of rows that must leave before `extra` more can be admitted
    pub fn overflow_with(&self, extra: usize) -> usize {
        self.size
            .capacity()
            .map_or(0, |capacity| (self.rows.len() + extra).saturating_sub(capacity))
    }

    pub fn insert(&mut self, row: Row) -> Result<&mut Row> {
        let index = row.index();
        self.check_admissible(index)?;
        Ok(self.rows.entry(index).or_insert(row))
    }

    /// Move a resident row to `new_index`, keeping its cells
    pub fn rekey(&mut self, old_index: u32, new_index: u32) -> Result<()> {
        if !self.rows.contains_key(&old_index) {
            return Err(self.not_resident(old_index));
        }
        if old_index == new_index {
            return Ok(());
        }
        self.check_admissible(new_index)?;
        if let Some(mut row) = self.rows.remove(&old_index) {
            row.set_index(new_index);
            self.rows.insert(new_index, row);
        }
        Ok(())
    }

    pub fn remove(&mut self, index: u32) -> Result<Option<Row>> {
        if index < self.boundary {
            return Err(ExcelError::RowAlreadyFlushed {
                row: index,
                boundary: self.boundary,
            });
        }
        Ok(self.rows.remove(&index))
    }

    pub fn get(&self, index: u32) -> Option<&Row> {
        self.rows.get(&index)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut Row> {
        self.rows.get_mut(&index)
    }

    /// Lowest resident row, the next one to be evicted
    pub fn oldest(&self) -> Option<&Row> {
        self.rows.values().next()
    }

    /// Remove the lowest resident row and move the boundary past it
    pub fn pop_oldest(&mut self) -> Option<Row> {
        let (index, row) = self.rows.pop_first()?;
        self.advance_boundary(index.saturating_add(1));
        Some(row)
    }

    /// Raise the boundary; lower values are ignored
    pub fn advance_boundary(&mut self, boundary: u32) {
        debug_assert!(self
            .rows
            .keys()
            .next()
            .map_or(true, |&lowest| lowest >= boundary));
        self.boundary = self.boundary.max(boundary);
    }

    /// Resident rows in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_index(&self) -> Option<u32> {
        self.rows.keys().next().copied()
    }

    pub fn last_index(&self) -> Option<u32> {
        self.rows.keys().next_back().copied()
    }

    fn not_resident(&self, index: u32) -> ExcelError {
        if index < self.boundary {
            ExcelError::RowAlreadyFlushed {
                row: index,
                boundary: self.boundary,
            }
        } else {
            ExcelError::RowNotResident { row: index }
        }
    }
}
