//! A directory of named stores sharing one folder and one access mode.

use std::fs;
use std::path::{Path, PathBuf};

use waygraph_common::Result;

use super::DataAccess;

/// Backing strategy for every store created from a [`Directory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// In-memory segments, written out as a whole on flush.
    Ram,
    /// Memory-mapped files.
    Mmap,
}

/// Factory for the named stores of one graph. The folder is created up
/// front; repeated `find_create` calls for a name address the same file with
/// the same mode.
pub struct Directory {
    path: PathBuf,
    mode: AccessMode,
}

impl Directory {
    pub fn new<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        Ok(Self { path, mode })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Hand out a store handle for `name` within this directory.
    pub fn find_create(&self, name: &str) -> DataAccess {
        let file = self.path.join(name);
        match self.mode {
            AccessMode::Ram => DataAccess::ram(file),
            AccessMode::Mmap => DataAccess::mmap(file),
        }
    }

    /// Delete every file in the directory. For discarding an aborted build.
    pub fn clear(&self) -> Result<()> {
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}
