//! Append-only temp-file store holding rows evicted from a sheet's window
//!
//! Every appended fragment is written as one frame:
//!
//! ```text
//! [u32 LE payload length][payload]
//! ```
//!
//! where the payload is the fragment, optionally deflated, then optionally
//! sealed with the store's [`SpillCipher`]. Frames are only ever appended;
//! [`SpillStore::replay`] reads them back in order.

use super::cipher::SpillCipher;
use super::memory::StreamingOptions;
use crate::error::{ExcelError, Result};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const WRITE_BUFFER_SIZE: usize = 64 * 1024;
const FRAME_HEADER_LEN: u64 = 4;

/// Settings shared by every spill store of a workbook
///
/// Built once per workbook and handed to each store when it opens, instead
/// of reading process-wide settings.
#[derive(Debug, Clone)]
pub struct SpillContext {
    temp_dir: PathBuf,
    compress: bool,
    encrypt: bool,
}

impl SpillContext {
    pub fn new<P: Into<PathBuf>>(temp_dir: P, compress: bool, encrypt: bool) -> Self {
        SpillContext {
            temp_dir: temp_dir.into(),
            compress,
            encrypt,
        }
    }

    pub fn from_options(options: &StreamingOptions) -> Self {
        SpillContext::new(
            options
                .temp_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            options.compress_spill,
            options.encrypt_spill,
        )
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    pub fn encrypt(&self) -> bool {
        self.encrypt
    }
}

impl Default for SpillContext {
    fn default() -> Self {
        SpillContext::from_options(&StreamingOptions::default())
    }
}

/// Writable handle behind a spill store
pub(crate) trait SpillFile: Write {
    /// Cut the file back to `len` bytes and continue writing there
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl SpillFile for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len)).map(|_| ())
    }
}

enum State {
    Open {
        file: NamedTempFile,
        writer: BufWriter<Box<dyn SpillFile>>,
    },
    /// A failed append lost or left behind bytes; only dispose is allowed
    Broken { file: NamedTempFile },
    Disposed,
}

/// Spill store of one sheet
pub struct SpillStore {
    sheet: String,
    state: State,
    cipher: Option<SpillCipher>,
    compress: bool,
    fragments: u64,
    committed: u64,
}

impl SpillStore {
    /// Create the backing temp file for `sheet`
    pub fn open(context: &SpillContext, sheet: &str) -> Result<Self> {
        Self::open_with(context, sheet, |handle| handle)
    }

    /// Like [`SpillStore::open`], writing through `wrap(handle)`
    pub(crate) fn open_with<W, F>(context: &SpillContext, sheet: &str, wrap: F) -> Result<Self>
    where
        W: SpillFile + 'static,
        F: FnOnce(File) -> W,
    {
        let file = tempfile::Builder::new()
            .prefix("sxstream-sheet")
            .suffix(".xml")
            .tempfile_in(context.temp_dir())
            .map_err(|e| ExcelError::spill(sheet, e))?;
        let handle = file
            .as_file()
            .try_clone()
            .map_err(|e| ExcelError::spill(sheet, e))?;
        let handle: Box<dyn SpillFile> = Box::new(wrap(handle));

        debug!(
            sheet,
            path = %file.path().display(),
            encrypted = context.encrypt(),
            compressed = context.compress(),
            "opened spill store"
        );

        Ok(SpillStore {
            sheet: sheet.to_string(),
            state: State::Open {
                file,
                writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, handle),
            },
            cipher: context.encrypt().then(SpillCipher::generate),
            compress: context.compress(),
            fragments: 0,
            committed: 0,
        })
    }

    /// A store that was never opened and refuses all I/O
    pub(crate) fn disposed(sheet: &str) -> Self {
        SpillStore {
            sheet: sheet.to_string(),
            state: State::Disposed,
            cipher: None,
            compress: false,
            fragments: 0,
            committed: 0,
        }
    }

    /// Append one self-contained fragment
    ///
    /// A failed append is rolled back when every earlier frame had already
    /// reached the file. Otherwise earlier frames may be lost with the write
    /// buffer, and the store refuses everything but [`SpillStore::dispose`].
    pub fn append(&mut self, fragment: &[u8]) -> Result<()> {
        let payload = self
            .encode_payload(fragment)
            .map_err(|e| ExcelError::spill(&self.sheet, e))?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            ExcelError::spill(
                &self.sheet,
                io::Error::new(io::ErrorKind::InvalidInput, "spill fragment exceeds 4 GiB"),
            )
        })?;

        let State::Open { writer, .. } = &mut self.state else {
            return Err(self.unavailable());
        };
        let drained = writer.buffer().is_empty();
        let written = writer
            .write_all(&len.to_le_bytes())
            .and_then(|_| writer.write_all(&payload));

        match written {
            Ok(()) => {
                self.fragments += 1;
                self.committed += FRAME_HEADER_LEN + payload.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.recover(drained);
                Err(ExcelError::spill(&self.sheet, e))
            }
        }
    }

    /// Read back every fragment in append order
    pub fn replay(&mut self) -> Result<SpillReplay<'_>> {
        let reader = match &mut self.state {
            State::Open { file, writer } => {
                writer
                    .flush()
                    .map_err(|e| ExcelError::spill(&self.sheet, e))?;
                file.reopen().map_err(|e| ExcelError::spill(&self.sheet, e))?
            }
            _ => return Err(self.unavailable()),
        };

        Ok(SpillReplay {
            reader: BufReader::new(reader.take(self.committed)),
            store: self,
            sequence: 0,
        })
    }

    /// Delete the backing file. Safe to call more than once.
    pub fn dispose(&mut self) -> Result<()> {
        let file = match std::mem::replace(&mut self.state, State::Disposed) {
            State::Open { file, writer } => {
                // buffered bytes are discarded, not flushed
                drop(writer.into_parts());
                file
            }
            State::Broken { file } => file,
            State::Disposed => return Ok(()),
        };

        let path = file.path().to_path_buf();
        file.close().map_err(|e| ExcelError::spill(&self.sheet, e))?;
        debug!(sheet = %self.sheet, path = %path.display(), fragments = self.fragments, "disposed spill store");
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.state, State::Disposed)
    }

    /// Path of the backing file while it exists
    pub fn path(&self) -> Option<&Path> {
        match &self.state {
            State::Open { file, .. } | State::Broken { file } => Some(file.path()),
            State::Disposed => None,
        }
    }

    /// Number of fragments appended so far
    pub fn fragment_count(&self) -> u64 {
        self.fragments
    }

    /// Bytes of complete frames accepted by the store
    pub fn bytes_written(&self) -> u64 {
        self.committed
    }

    fn encode_payload(&self, fragment: &[u8]) -> io::Result<Vec<u8>> {
        let mut payload = if self.compress {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
            encoder.write_all(fragment)?;
            encoder.finish()?
        } else {
            fragment.to_vec()
        };
        if let Some(cipher) = &self.cipher {
            payload = cipher.seal(self.fragments, &payload)?;
        }
        Ok(payload)
    }

    fn decode_payload(&self, sequence: u64, payload: Vec<u8>) -> io::Result<Vec<u8>> {
        let payload = match &self.cipher {
            Some(cipher) => cipher.open(sequence, &payload)?,
            None => payload,
        };
        if self.compress {
            let mut fragment = Vec::with_capacity(payload.len() * 4);
            DeflateDecoder::new(payload.as_slice()).read_to_end(&mut fragment)?;
            Ok(fragment)
        } else {
            Ok(payload)
        }
    }

    /// Settle the state after a failed append
    ///
    /// `drained` tells whether the write buffer was empty before the append,
    /// i.e. whether all committed bytes were already in the file.
    fn recover(&mut self, drained: bool) {
        let (file, writer) = match std::mem::replace(&mut self.state, State::Disposed) {
            State::Open { file, writer } => (file, writer),
            other => {
                self.state = other;
                return;
            }
        };
        let (mut handle, _) = writer.into_parts();

        if !drained {
            warn!(
                sheet = %self.sheet,
                fragments = self.fragments,
                "buffered spill frames were lost; store is no longer usable"
            );
            self.state = State::Broken { file };
            return;
        }

        self.state = match handle.truncate_to(self.committed) {
            Ok(()) => State::Open {
                file,
                writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, handle),
            },
            Err(e) => {
                warn!(sheet = %self.sheet, error = %e, "could not roll back partial spill frame");
                State::Broken { file }
            }
        };
    }

    fn unavailable(&self) -> ExcelError {
        let reason = match self.state {
            State::Broken { .. } => "spill store is unusable after a failed write",
            _ => "spill store has been disposed",
        };
        ExcelError::spill(&self.sheet, io::Error::other(reason))
    }
}

impl std::fmt::Debug for SpillStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpillStore")
            .field("sheet", &self.sheet)
            .field("path", &self.path())
            .field("encrypted", &self.cipher.is_some())
            .field("compressed", &self.compress)
            .field("fragments", &self.fragments)
            .finish()
    }
}

impl Drop for SpillStore {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!("Error removing spill file on drop: {e}");
        }
    }
}

/// Iterator over the fragments of a [`SpillStore`], in append order
pub struct SpillReplay<'a> {
    reader: BufReader<io::Take<File>>,
    store: &'a SpillStore,
    sequence: u64,
}

impl std::fmt::Debug for SpillReplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpillReplay")
            .field("sheet", &self.store.sheet)
            .field("sequence", &self.sequence)
            .field("fragments", &self.store.fragments)
            .finish_non_exhaustive()
    }
}

impl SpillReplay<'_> {
    fn read_frame(&mut self) -> io::Result<Vec<u8>> {
        let mut header = [0u8; FRAME_HEADER_LEN as usize];
        self.reader.read_exact(&mut header)?;
        let mut payload = vec![0u8; u32::from_le_bytes(header) as usize];
        self.reader.read_exact(&mut payload)?;
        self.store.decode_payload(self.sequence, payload)
    }
}

impl Iterator for SpillReplay<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.sequence >= self.store.fragments {
            return None;
        }
        let frame = self
            .read_frame()
            .map_err(|e| ExcelError::spill(&self.store.sheet, e));
        self.sequence += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.store.fragments - self.sequence) as usize;
        (remaining, Some(remaining))
    }
}

/// Spill handle that runs out of space after a fixed number of bytes
#[cfg(test)]
pub(crate) struct FailAfter {
    inner: File,
    limit: u64,
    written: u64,
}

#[cfg(test)]
impl FailAfter {
    pub(crate) fn new(inner: File, limit: u64) -> Self {
        FailAfter {
            inner,
            limit,
            written: 0,
        }
    }
}

#[cfg(test)]
impl Write for FailAfter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > self.limit {
            return Err(io::Error::other("no space left on device"));
        }
        self.inner.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
impl SpillFile for FailAfter {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.inner.truncate_to(len)?;
        self.written = len;
        Ok(())
    }
}
