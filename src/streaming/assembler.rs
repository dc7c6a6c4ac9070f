//! Writing a workbook's sheets and package parts into an archive

use super::package;
use super::sheet::StreamingSheet;
use crate::error::{ExcelError, Result};
use chrono::Utc;
use indexmap::IndexMap;
use s_zip::StreamingZipWriter;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Destination for the entries of an XLSX package
///
/// Entries are written one at a time: `start_entry` closes the previous one.
pub trait ArchiveSink {
    fn start_entry(&mut self, name: &str) -> Result<()>;

    fn write_data(&mut self, data: &[u8]) -> Result<()>;
}

/// ZIP file on disk, compressed as it is written
pub struct ZipArchive {
    writer: StreamingZipWriter<File>,
}

impl ZipArchive {
    pub fn create<P: AsRef<Path>>(path: P, compression_level: u32) -> Result<Self> {
        let writer = StreamingZipWriter::with_compression(path.as_ref(), compression_level)
            .map_err(|e| ExcelError::WriteError(e.to_string()))?;
        Ok(ZipArchive { writer })
    }

    /// Write the central directory and close the file
    pub fn finish(self) -> Result<()> {
        self.writer
            .finish()
            .map_err(|e| ExcelError::WriteError(e.to_string()))?;
        Ok(())
    }
}

impl ArchiveSink for ZipArchive {
    fn start_entry(&mut self, name: &str) -> Result<()> {
        self.writer
            .start_entry(name)
            .map_err(|e| ExcelError::WriteError(e.to_string()))
    }

    fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.writer
            .write_data(data)
            .map_err(|e| ExcelError::WriteError(e.to_string()))
    }
}

/// In-memory archive keeping each entry's bytes, in write order
#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: IndexMap<String, Vec<u8>>,
    current: Option<String>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Entry contents as UTF-8, if present and valid
    pub fn entry_str(&self, name: &str) -> Option<&str> {
        self.entry(name).and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ArchiveSink for MemoryArchive {
    fn start_entry(&mut self, name: &str) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(ExcelError::WriteError(format!(
                "duplicate archive entry '{}'",
                name
            )));
        }
        self.entries.insert(name.to_string(), Vec::new());
        self.current = Some(name.to_string());
        Ok(())
    }

    fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let entry = self
            .current
            .as_ref()
            .and_then(|name| self.entries.get_mut(name))
            .ok_or_else(|| ExcelError::WriteError("no archive entry started".to_string()))?;
        entry.extend_from_slice(data);
        Ok(())
    }
}

/// Write a complete package: fixed parts first, then every sheet in order
///
/// Each sheet is emitted as its spilled rows followed by its resident rows.
/// Nothing is consumed, so the same sheets can be assembled again.
pub fn assemble<'a, S, I>(sheets: I, sink: &mut S) -> Result<()>
where
    S: ArchiveSink + ?Sized,
    I: IntoIterator<Item = &'a mut StreamingSheet>,
{
    let mut sheets: Vec<&mut StreamingSheet> = sheets.into_iter().collect();
    let count = sheets.len();

    let parts = [
        (package::CONTENT_TYPES, package::content_types(count)),
        (package::ROOT_RELS, package::root_rels()),
        (
            package::WORKBOOK,
            package::workbook(sheets.iter().map(|sheet| sheet.name())),
        ),
        (package::WORKBOOK_RELS, package::workbook_rels(count)),
        (package::STYLES, package::styles()),
        (package::SHARED_STRINGS, package::shared_strings()),
        (package::APP_PROPS, package::app_props()),
        (package::CORE_PROPS, package::core_props(Utc::now())),
    ];
    for (name, bytes) in parts {
        sink.start_entry(name)?;
        sink.write_data(&bytes)?;
    }

    for (i, sheet) in sheets.iter_mut().enumerate() {
        let entry = package::worksheet_entry(i + 1);
        debug!(sheet = sheet.name(), entry = %entry, "writing worksheet");
        sink.start_entry(&entry)?;
        sheet.write_to(|bytes| sink.write_data(bytes))?;
    }

    info!(sheets = count, "assembled workbook");
    Ok(())
}
