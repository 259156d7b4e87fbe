//! Private working copies of source spreadsheets
//!
//! A session never reads the caller's file directly: the source is copied
//! into a uniquely named file next to the other temp files, the workbook is
//! decoded from that copy, and the copy is deleted when the session ends.

use crate::error::{ExcelError, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile, TempPath};

/// Create an empty, uniquely named file in `dir` for a copy of `original`.
///
/// The name keeps the original stem as a prefix and the original extension,
/// since calamine picks the decoder from the extension.
pub fn create_temp_file(original: &Path, dir: &Path) -> io::Result<NamedTempFile> {
    let stem = original
        .file_stem()
        .map(|s| format!("{}-", s.to_string_lossy()))
        .unwrap_or_default();
    let suffix = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    Builder::new()
        .prefix(&stem)
        .suffix(&suffix)
        .tempfile_in(dir)
}

/// A session-owned copy of a source file, deleted exactly once
#[derive(Debug)]
pub struct PrivateCopy {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl PrivateCopy {
    /// Copy `original` into a fresh temp file inside `dir`
    pub fn create(original: &Path, dir: &Path) -> Result<Self> {
        let mut source = File::open(original)?;
        let mut temp_file = create_temp_file(original, dir)?;

        io::copy(&mut source, temp_file.as_file_mut())?;
        temp_file.flush()?;

        let temp = temp_file.into_temp_path();
        let path = temp.to_path_buf();
        log::debug!(
            "copied '{}' to private file '{}'",
            original.display(),
            path.display()
        );

        Ok(PrivateCopy {
            path,
            temp: Some(temp),
        })
    }

    /// Location of the copy
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the copy has not been removed yet
    pub fn is_live(&self) -> bool {
        self.temp.is_some()
    }

    /// Delete the copy. Calling it again after a successful removal is a no-op.
    ///
    /// A copy that already vanished from disk counts as removed.
    pub fn remove(&mut self) -> Result<()> {
        let Some(temp) = self.temp.take() else {
            return Ok(());
        };

        match temp.close() {
            Ok(()) => {
                log::debug!("deleted private file '{}'", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExcelError::Cleanup {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}
