//! Exclusive administrative access to one working-copy directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::AdmError;
use crate::layout;

/// An exclusive advisory lock on one working-copy directory.
///
/// Holding an `AdmAccess` is the precondition for every mutating operation
/// on the directory's administrative area; the log runner refuses to work
/// without one. The lock is a marker file created with `create_new`
/// semantics, so two processes cannot both hold it. Dropping the access
/// releases the lock.
#[derive(Debug)]
pub struct AdmAccess {
    dir: PathBuf,
    locked: bool,
}

impl AdmAccess {
    /// Opens `dir` and acquires its write lock.
    ///
    /// Fails with [`AdmError::NotWorkingCopy`] when `dir` has no
    /// administrative area and with [`AdmError::Locked`] when another
    /// access already holds the lock.
    pub fn open(dir: &Path) -> Result<Self, AdmError> {
        if !layout::is_working_copy(dir) {
            return Err(AdmError::NotWorkingCopy {
                path: dir.to_path_buf(),
            });
        }
        let lock_path = layout::adm_path(dir, &[layout::ADM_LOCK]);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => Ok(Self {
                dir: dir.to_path_buf(),
                locked: true,
            }),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => Err(AdmError::Locked {
                path: dir.to_path_buf(),
            }),
            Err(error) => Err(AdmError::io("acquire directory lock", lock_path, error)),
        }
    }

    /// The working-copy directory this access guards.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The administrative directory.
    #[must_use]
    pub fn adm_dir(&self) -> PathBuf {
        layout::adm_dir(&self.dir)
    }

    /// Joins `parts` under the administrative directory.
    #[must_use]
    pub fn adm_path(&self, parts: &[&str]) -> PathBuf {
        layout::adm_path(&self.dir, parts)
    }

    /// The scratch directory for in-flight operations.
    #[must_use]
    pub fn tmp_dir(&self) -> PathBuf {
        self.adm_path(&[layout::ADM_TMP])
    }

    /// Resolves a working-copy-relative path against the directory.
    #[must_use]
    pub fn wc_path(&self, relative: &str) -> PathBuf {
        self.dir.join(relative)
    }

    /// Releases the lock explicitly. Errors that would be swallowed by
    /// `Drop` surface here instead.
    pub fn close(mut self) -> Result<(), AdmError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), AdmError> {
        if !self.locked {
            return Ok(());
        }
        self.locked = false;
        let lock_path = layout::adm_path(&self.dir, &[layout::ADM_LOCK]);
        crate::fsutil::remove_file_if_present(&lock_path)
            .map(|_| ())
            .map_err(|error| AdmError::io("release directory lock", lock_path, error))
    }
}

impl Drop for AdmAccess {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
