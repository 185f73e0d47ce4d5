//! Where workspace descriptions are read from.

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;

/// Abstraction over a file source.
pub trait ContentSource {
    /// Read a file at the given logical path and return its content as a string.
    fn read_to_string(&mut self, path: &Utf8Path) -> Result<String>;
}

/// Reads files directly from the local filesystem.
pub struct FsSource;

impl ContentSource for FsSource {
    fn read_to_string(&mut self, path: &Utf8Path) -> Result<String> {
        std::fs::read_to_string(path.as_std_path()).with_context(|| format!("Failed to read {}", path))
    }
}

/// Files held in memory, keyed by logical path.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: BTreeMap<Utf8PathBuf, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<Utf8PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }
}

impl ContentSource for MemorySource {
    fn read_to_string(&mut self, path: &Utf8Path) -> Result<String> {
        let key = path.as_str().trim_start_matches("./");
        self.files
            .get(Utf8Path::new(key))
            .cloned()
            .ok_or_else(|| anyhow!("File {} not found", path))
    }
}
