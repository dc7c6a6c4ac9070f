//! Streaming workbook: owns sheets and writes the final package

use super::assembler::{assemble, ArchiveSink, ZipArchive};
use super::encoder::{RowEncoder, XmlRowEncoder};
use super::memory::StreamingOptions;
use super::sheet::StreamingSheet;
use super::spill::SpillContext;
use crate::error::{ExcelError, Result};
use crate::types::Row;
use indexmap::IndexMap;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

const MAX_SHEET_NAME_LEN: usize = 31;
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Rows to start a sheet with; they are written before anything created later
#[derive(Debug, Clone, Default)]
pub struct TemplateSheet {
    pub name: String,
    /// Ascending by row index
    pub rows: Vec<Row>,
}

impl TemplateSheet {
    pub fn new<S: Into<String>>(name: S, rows: Vec<Row>) -> Self {
        TemplateSheet {
            name: name.into(),
            rows,
        }
    }
}

/// Existing content a streaming workbook is built on top of
#[derive(Debug, Clone, Default)]
pub struct WorkbookTemplate {
    pub sheets: Vec<TemplateSheet>,
}

impl WorkbookTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, sheet: TemplateSheet) -> Self {
        self.sheets.push(sheet);
        self
    }
}

/// Workbook whose sheets keep only a bounded window of rows in memory
///
/// # Examples
///
/// ```no_run
/// use sxstream::{StreamingOptions, StreamingWorkbook, WindowSize};
///
/// let options = StreamingOptions::default().with_window_size(WindowSize::rows(100)?);
/// let mut workbook = StreamingWorkbook::with_options(options);
/// let sheet = workbook.create_sheet("Data")?;
/// for i in 0..100_000u32 {
///     sheet.write_row(i, [format!("row {}", i)])?;
/// }
/// workbook.save("data.xlsx")?;
/// workbook.dispose()?;
/// # Ok::<(), sxstream::ExcelError>(())
/// ```
pub struct StreamingWorkbook {
    sheets: IndexMap<String, StreamingSheet>,
    options: StreamingOptions,
    context: Rc<SpillContext>,
    encoder: Rc<dyn RowEncoder>,
    disposed: bool,
}

impl StreamingWorkbook {
    pub fn new() -> Self {
        Self::with_options(StreamingOptions::default())
    }

    pub fn with_options(options: StreamingOptions) -> Self {
        Self::with_encoder(options, XmlRowEncoder)
    }

    /// Workbook whose rows are serialized by `encoder`
    pub fn with_encoder<E: RowEncoder + 'static>(options: StreamingOptions, encoder: E) -> Self {
        let context = Rc::new(SpillContext::from_options(&options));
        debug!(
            window = ?options.window_size,
            temp_dir = %context.temp_dir().display(),
            compress = context.compress(),
            encrypt = context.encrypt(),
            "created streaming workbook"
        );
        StreamingWorkbook {
            sheets: IndexMap::new(),
            options,
            context,
            encoder: Rc::new(encoder),
            disposed: false,
        }
    }

    /// Start from existing sheets; their rows count as already flushed
    pub fn from_template(template: WorkbookTemplate, options: StreamingOptions) -> Result<Self> {
        let mut workbook = Self::with_options(options);
        for sheet in template.sheets {
            workbook.create_sheet(&sheet.name)?.seed_rows(sheet.rows)?;
        }
        Ok(workbook)
    }

    pub fn options(&self) -> &StreamingOptions {
        &self.options
    }

    pub fn create_sheet(&mut self, name: &str) -> Result<&mut StreamingSheet> {
        validate_sheet_name(name)?;
        if self.position(name).is_some() {
            return Err(ExcelError::DuplicateSheet(name.to_string()));
        }

        let sheet = StreamingSheet::new(
            name,
            self.options.window_size,
            Rc::clone(&self.context),
            Rc::clone(&self.encoder),
        );
        Ok(self.sheets.entry(name.to_string()).or_insert(sheet))
    }

    /// Sheet named `name`, compared ignoring ASCII case
    pub fn sheet(&self, name: &str) -> Result<&StreamingSheet> {
        match self.position(name) {
            Some(index) => Ok(&self.sheets[index]),
            None => Err(self.not_found(name)),
        }
    }

    pub fn sheet_mut(&mut self, name: &str) -> Result<&mut StreamingSheet> {
        if let Some(index) = self.position(name) {
            return Ok(&mut self.sheets[index]);
        }
        Err(self.not_found(name))
    }

    /// Sheet at a 0-based position in workbook order
    pub fn sheet_at_mut(&mut self, index: usize) -> Result<&mut StreamingSheet> {
        if index < self.sheets.len() {
            return Ok(&mut self.sheets[index]);
        }
        Err(self.not_found(&index.to_string()))
    }

    /// Remove a sheet and delete its spill file
    pub fn remove_sheet(&mut self, name: &str) -> Result<()> {
        let removed = self
            .position(name)
            .and_then(|index| self.sheets.shift_remove_index(index));
        let Some((_, mut sheet)) = removed else {
            return Err(self.not_found(name));
        };
        sheet.dispose()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.keys().map(String::as_str).collect()
    }

    pub fn number_of_sheets(&self) -> usize {
        self.sheets.len()
    }

    /// Write the whole package to `sink`
    ///
    /// Resident rows are encoded but kept, so the workbook can be written
    /// again or extended afterwards.
    pub fn write<S: ArchiveSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        assemble(self.sheets.values_mut(), sink)
    }

    /// Write an `.xlsx` file at `path`
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut archive = ZipArchive::create(path, self.options.zip_compression_level)?;
        self.write(&mut archive)?;
        archive.finish()?;
        info!(path = %path.display(), sheets = self.sheets.len(), "saved workbook");
        Ok(())
    }

    /// Delete every sheet's spill file. Safe to call more than once.
    ///
    /// All sheets are disposed even if one fails; the first error is returned.
    pub fn dispose(&mut self) -> Result<()> {
        let mut first_error = None;
        for sheet in self.sheets.values_mut() {
            if let Err(e) = sheet.dispose() {
                warn!(sheet = sheet.name(), error = %e, "failed to dispose sheet");
                first_error.get_or_insert(e);
            }
        }
        self.disposed = true;
        first_error.map_or(Ok(()), Err)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Sheet names are unique ignoring ASCII case, so at most one matches
    fn position(&self, name: &str) -> Option<usize> {
        self.sheets
            .keys()
            .position(|existing| existing.eq_ignore_ascii_case(name))
    }

    fn not_found(&self, name: &str) -> ExcelError {
        ExcelError::SheetNotFound {
            sheet: name.to_string(),
            available: self.sheet_names().join(", "),
        }
    }
}

impl Default for StreamingWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamingWorkbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingWorkbook")
            .field("sheets", &self.sheets)
            .field("options", &self.options)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Drop for StreamingWorkbook {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        if let Err(e) = self.dispose() {
            warn!(error = %e, "failed to clean up spill files on drop");
        }
    }
}

fn validate_sheet_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        "sheet name is empty"
    } else if name.chars().count() > MAX_SHEET_NAME_LEN {
        "sheet name is longer than 31 characters"
    } else if name.contains(FORBIDDEN_SHEET_CHARS) {
        "sheet name contains one of [ ] : * ? / \\"
    } else if name.starts_with('\'') || name.ends_with('\'') {
        "sheet name starts or ends with an apostrophe"
    } else {
        return Ok(());
    };
    Err(ExcelError::InvalidConfig(format!("{}: '{}'", reason, name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::assembler::MemoryArchive;
    use crate::streaming::memory::WindowSize;
    use tempfile::{tempdir, TempDir};

    fn workbook(rows: usize) -> (TempDir, StreamingWorkbook) {
        let dir = tempdir().unwrap();
        let options = StreamingOptions::default()
            .with_window_size(WindowSize::rows(rows).unwrap())
            .with_temp_dir(dir.path());
        (dir, StreamingWorkbook::with_options(options))
    }

    #[test]
    fn test_sheet_names_are_checked() {
        let (_dir, mut wb) = workbook(10);
        wb.create_sheet("Data").unwrap();

        assert!(matches!(
            wb.create_sheet("data"),
            Err(ExcelError::DuplicateSheet(_))
        ));
        assert!(matches!(
            wb.create_sheet("a/b"),
            Err(ExcelError::InvalidConfig(_))
        ));
        assert!(wb.create_sheet(&"x".repeat(32)).is_err());
        assert!(wb.create_sheet("").is_err());
    }

    #[test]
    fn test_lookup_and_removal() -> Result<()> {
        let (_dir, mut wb) = workbook(10);
        wb.create_sheet("First")?;
        wb.create_sheet("Second")?;
        wb.create_sheet("Third")?;

        assert_eq!(wb.sheet_at_mut(1)?.name(), "Second");
        wb.remove_sheet("Second")?;
        assert_eq!(wb.sheet_names(), vec!["First", "Third"]);
        assert_eq!(wb.sheet_at_mut(1)?.name(), "Third");

        match wb.sheet("Second") {
            Err(ExcelError::SheetNotFound { available, .. }) => {
                assert_eq!(available, "First, Third")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(wb.sheet_at_mut(2).is_err());
        Ok(())
    }

    #[test]
    fn test_names_resolve_ignoring_case() -> Result<()> {
        let (_dir, mut wb) = workbook(10);
        wb.create_sheet("Data")?;
        wb.create_sheet("Other")?;

        assert_eq!(wb.sheet("DATA")?.name(), "Data");
        assert_eq!(wb.sheet_mut("other")?.name(), "Other");

        wb.remove_sheet("data")?;
        assert_eq!(wb.sheet_names(), vec!["Other"]);
        assert!(matches!(
            wb.sheet("Data"),
            Err(ExcelError::SheetNotFound { .. })
        ));
        wb.create_sheet("DATA")?;
        assert_eq!(wb.sheet_names(), vec!["Other", "DATA"]);
        Ok(())
    }

    #[test]
    fn test_template_rows_are_flushed() -> Result<()> {
        let dir = tempdir()?;
        let template = WorkbookTemplate::new().with_sheet(TemplateSheet::new(
            "Report",
            vec![
                Row::from_values(0, ["Name", "Score"])?,
                Row::from_values(1, ["seed", "1"])?,
            ],
        ));
        let options = StreamingOptions::default().with_temp_dir(dir.path());
        let mut wb = StreamingWorkbook::from_template(template, options)?;

        let sheet = wb.sheet_mut("Report")?;
        assert_eq!(sheet.flush_boundary(), 2);
        assert!(sheet.all_rows_flushed());
        assert!(matches!(
            sheet.create_row(1),
            Err(ExcelError::RowAlreadyFlushed { row: 1, boundary: 2 })
        ));
        sheet.write_row(2, ["new", "2"])?;

        let mut archive = MemoryArchive::new();
        wb.write(&mut archive)?;
        let xml = archive.entry_str("xl/worksheets/sheet1.xml").unwrap();
        let seed = xml.find(">seed<").unwrap();
        let new = xml.find(">new<").unwrap();
        assert!(seed < new);
        Ok(())
    }

    #[test]
    fn test_dispose_is_idempotent() -> Result<()> {
        let (dir, mut wb) = workbook(1);
        let sheet = wb.create_sheet("Data")?;
        for i in 0..3 {
            sheet.write_row(i, [i as i64])?;
        }
        let path = sheet.spill_path().unwrap().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());

        wb.dispose()?;
        wb.dispose()?;
        assert!(!path.exists());
        assert!(wb.is_disposed());
        Ok(())
    }
}
