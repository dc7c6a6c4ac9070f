//! Window sizing and construction options for streaming workbooks

use crate::error::{ExcelError, Result};
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Rows kept in memory per sheet when nothing else is configured
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// How many rows each sheet keeps resident before spilling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSize {
    /// Keep at most this many rows per sheet in memory
    Bounded(NonZeroUsize),
    /// Never flush automatically; every row stays resident until write
    Unbounded,
}

impl WindowSize {
    /// Bounded window of `rows` rows; zero is rejected
    pub fn rows(rows: usize) -> Result<Self> {
        NonZeroUsize::new(rows)
            .map(WindowSize::Bounded)
            .ok_or_else(|| ExcelError::InvalidConfig("window size must be at least 1 row".into()))
    }

    /// Capacity in rows, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        match self {
            WindowSize::Bounded(n) => Some(n.get()),
            WindowSize::Unbounded => None,
        }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        WindowProfile::Low.window_size()
    }
}

/// Memory profile for different pod sizes
#[derive(Debug, Clone, Copy)]
pub enum WindowProfile {
    /// Small pods (< 512MB): 100 rows per sheet
    Low,
    /// Medium pods (512MB-1GB): 1,000 rows per sheet
    Medium,
    /// Large pods (> 1GB): 10,000 rows per sheet
    High,
    /// Custom window
    Custom { window_size: WindowSize },
}

impl WindowProfile {
    /// Pick a profile from a memory limit in MB
    pub fn from_memory_mb(memory_mb: usize) -> Self {
        if memory_mb < 512 {
            WindowProfile::Low
        } else if memory_mb < 1024 {
            WindowProfile::Medium
        } else {
            WindowProfile::High
        }
    }

    /// Detect from environment variable MEMORY_LIMIT_MB
    pub fn from_env() -> Self {
        std::env::var("MEMORY_LIMIT_MB")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .map(Self::from_memory_mb)
            .unwrap_or(WindowProfile::Low)
    }

    pub fn window_size(&self) -> WindowSize {
        let rows = match self {
            WindowProfile::Low => DEFAULT_WINDOW_SIZE,
            WindowProfile::Medium => 1_000,
            WindowProfile::High => 10_000,
            WindowProfile::Custom { window_size } => return *window_size,
        };
        NonZeroUsize::new(rows).map_or(WindowSize::Unbounded, WindowSize::Bounded)
    }
}

/// Options for building a [`StreamingWorkbook`](super::StreamingWorkbook)
#[derive(Debug, Clone)]
pub struct StreamingOptions {
    pub window_size: WindowSize,
    /// Deflate each spilled fragment
    pub compress_spill: bool,
    /// Encrypt spill files with a per-sheet in-memory key
    pub encrypt_spill: bool,
    /// Directory for spill files; system temp dir when `None`
    pub temp_dir: Option<PathBuf>,
    /// Compression level (0-9) of the output archive
    pub zip_compression_level: u32,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        StreamingOptions {
            window_size: WindowSize::default(),
            compress_spill: false,
            encrypt_spill: false,
            temp_dir: None,
            zip_compression_level: 6,
        }
    }
}

impl StreamingOptions {
    /// Options derived from the `MEMORY_LIMIT_MB` environment variable
    pub fn from_env() -> Self {
        StreamingOptions::default().with_profile(WindowProfile::from_env())
    }

    pub fn with_profile(self, profile: WindowProfile) -> Self {
        self.with_window_size(profile.window_size())
    }

    pub fn with_window_size(mut self, window_size: WindowSize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_compressed_spill(mut self, compress: bool) -> Self {
        self.compress_spill = compress;
        self
    }

    pub fn with_encrypted_spill(mut self, encrypt: bool) -> Self {
        self.encrypt_spill = encrypt;
        self
    }

    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_zip_compression_level(mut self, level: u32) -> Self {
        self.zip_compression_level = level.min(9);
        self
    }
}
