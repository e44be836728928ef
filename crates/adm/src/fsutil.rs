//! Filesystem idioms shared by the engine crates.
//!
//! Everything here is deliberately small: write-temp-then-rename, removal
//! that tolerates absence, permission-bit twiddling, and mtime access. The
//! callers layer their own error context on top of the raw [`io::Error`]s.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};

use filetime::FileTime;

static NEXT_TEMP_FILE_ID: AtomicUsize = AtomicUsize::new(0);

/// Produces a unique sibling temp path for `dest`.
fn temp_sibling(dest: &Path) -> PathBuf {
    let id = NEXT_TEMP_FILE_ID.fetch_add(1, Ordering::Relaxed);
    let base = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_owned());
    let name = format!(".{base}.{}.{id}.tmp", process::id());
    dest.with_file_name(name)
}

/// Writes `contents` to `dest` atomically: the bytes land in a sibling
/// temp file which is then renamed over the destination. A reader never
/// observes a partially written file.
pub fn write_atomic(dest: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = temp_sibling(dest);
    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, dest)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Removes `path` if it exists. Returns whether a file was removed.
pub fn remove_file_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

/// Renames `src` to `dst`. Returns `Ok(false)` when the source is absent.
pub fn rename_if_present(src: &Path, dst: &Path) -> io::Result<bool> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound && !src.exists() => Ok(false),
        Err(error) => Err(error),
    }
}

/// Sets or clears the read-only bit on `path`.
pub fn set_read_only(path: &Path, read_only: bool) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    let mut permissions = metadata.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = permissions.mode();
        let new_mode = if read_only {
            mode & !0o222
        } else {
            // Grant write to every class that already has read.
            mode | ((mode & 0o444) >> 1)
        };
        permissions.set_mode(new_mode);
    }
    #[cfg(not(unix))]
    {
        permissions.set_readonly(read_only);
    }
    fs::set_permissions(path, permissions)
}

/// Sets or clears the executable bits on `path`.
///
/// Each permission class that can read the file gains (or loses) execute.
/// No-op on platforms without Unix permission bits.
pub fn set_executable(path: &Path, executable: bool) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::symlink_metadata(path)?;
        let mut permissions = metadata.permissions();
        let mode = permissions.mode();
        let new_mode = if executable {
            mode | ((mode & 0o444) >> 2)
        } else {
            mode & !0o111
        };
        permissions.set_mode(new_mode);
        fs::set_permissions(path, permissions)?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, executable);
    }
    Ok(())
}

/// Reports whether `path` currently has any executable bit set.
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::symlink_metadata(path)
            .map(|metadata| metadata.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        false
    }
}

/// Returns the last-modification time of `path`.
pub fn file_mtime(path: &Path) -> io::Result<FileTime> {
    let metadata = fs::symlink_metadata(path)?;
    Ok(FileTime::from_last_modification_time(&metadata))
}

/// Sets the last-modification time of `path`.
pub fn set_file_mtime(path: &Path, mtime: FileTime) -> io::Result<()> {
    filetime::set_file_mtime(path, mtime)
}

/// Allocates a unique scratch path inside `tmp_dir`.
#[must_use]
pub fn unique_tmp_path(tmp_dir: &Path, hint: &str) -> PathBuf {
    let id = NEXT_TEMP_FILE_ID.fetch_add(1, Ordering::Relaxed);
    tmp_dir.join(format!("{hint}.{}.{id}.tmp", process::id()))
}
