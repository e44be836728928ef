//! Names and paths inside the administrative area.
//!
//! The administrative directory name and every file name below it are part
//! of the on-disk format; tools interoperating with existing working copies
//! must reproduce them exactly.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AdmError;

/// Name of the hidden administrative directory inside each versioned
/// directory.
pub const ADM_DIR_NAME: &str = ".svn";

/// Administrative format-version marker file.
pub const ADM_FORMAT: &str = "format";

/// The entry table file.
pub const ADM_ENTRIES: &str = "entries";

/// Base name of the first operation-log segment.
pub const ADM_LOG: &str = "log";

/// The directory-destruction sentinel. Zero bytes of content; its mere
/// presence carries the signal.
pub const ADM_KILLME: &str = "KILLME";

/// Advisory write-lock marker.
pub const ADM_LOCK: &str = "lock";

/// Scratch space for in-flight operations.
pub const ADM_TMP: &str = "tmp";

/// Pristine text bases, one `<name>.svn-base` per file entry.
pub const ADM_TEXT_BASE: &str = "text-base";

/// Committed property lists, one `<name>.svn-base` per entry.
pub const ADM_PROP_BASE: &str = "prop-base";

/// Working property lists, one `<name>.svn-work` per entry.
pub const ADM_PROPS: &str = "props";

/// Cached ("wc") properties for every entry of the directory, one file.
pub const ADM_WCPROPS: &str = "all-wcprops";

/// Structured tree-conflict descriptors for the directory's victims.
pub const ADM_TREE_CONFLICTS: &str = "tree-conflicts";

/// Committed property list of the directory itself.
pub const ADM_DIR_PROP_BASE: &str = "dir-prop-base";

/// Working property list of the directory itself.
pub const ADM_DIR_PROPS: &str = "dir-props";

/// Format version written by freshly created administrative areas.
pub const ADM_FORMAT_VERSION: u32 = 8;

/// Returns the file name of log segment `number`.
///
/// Segment 0 is the bare base name; later segments append a numeric
/// suffix (`log.1`, `log.2`, ...).
#[must_use]
pub fn log_segment_name(number: usize) -> String {
    if number == 0 {
        ADM_LOG.to_owned()
    } else {
        format!("{ADM_LOG}.{number}")
    }
}

/// Returns the administrative directory of `dir`.
#[must_use]
pub fn adm_dir(dir: &Path) -> PathBuf {
    dir.join(ADM_DIR_NAME)
}

/// Joins `parts` under the administrative directory of `dir`.
#[must_use]
pub fn adm_path(dir: &Path, parts: &[&str]) -> PathBuf {
    let mut path = adm_dir(dir);
    for part in parts {
        path.push(part);
    }
    path
}

/// Returns the text-base path for the entry named `name` in `dir`.
#[must_use]
pub fn text_base_path(dir: &Path, name: &str) -> PathBuf {
    adm_path(dir, &[ADM_TEXT_BASE, &format!("{name}.svn-base")])
}

/// Returns the staged (write-ahead) text-base path for `name`.
#[must_use]
pub fn tmp_text_base_path(dir: &Path, name: &str) -> PathBuf {
    adm_path(dir, &[ADM_TMP, ADM_TEXT_BASE, &format!("{name}.svn-base")])
}

/// Returns the committed-property path for `name`; the empty name selects
/// the directory's own property list.
#[must_use]
pub fn prop_base_path(dir: &Path, name: &str) -> PathBuf {
    if name.is_empty() {
        adm_path(dir, &[ADM_DIR_PROP_BASE])
    } else {
        adm_path(dir, &[ADM_PROP_BASE, &format!("{name}.svn-base")])
    }
}

/// Returns the staged (write-ahead) committed-property path for `name`.
#[must_use]
pub fn tmp_prop_base_path(dir: &Path, name: &str) -> PathBuf {
    if name.is_empty() {
        adm_path(dir, &[ADM_TMP, ADM_DIR_PROP_BASE])
    } else {
        adm_path(dir, &[ADM_TMP, ADM_PROP_BASE, &format!("{name}.svn-base")])
    }
}

/// Returns the working-property path for `name`; the empty name selects
/// the directory's own property list.
#[must_use]
pub fn working_props_path(dir: &Path, name: &str) -> PathBuf {
    if name.is_empty() {
        adm_path(dir, &[ADM_DIR_PROPS])
    } else {
        adm_path(dir, &[ADM_PROPS, &format!("{name}.svn-work")])
    }
}

/// Reports whether `dir` carries an administrative area.
#[must_use]
pub fn is_working_copy(dir: &Path) -> bool {
    adm_path(dir, &[ADM_FORMAT]).is_file()
}

/// Creates a fresh administrative area under `dir`.
///
/// Lays out the scratch and pristine-store subdirectories and writes the
/// format marker. The entry table is the caller's to seed; this helper
/// leaves it absent.
pub fn create_adm_area(dir: &Path) -> Result<(), AdmError> {
    let adm = adm_dir(dir);
    for sub in [
        adm.clone(),
        adm.join(ADM_TMP),
        adm.join(ADM_TMP).join(ADM_TEXT_BASE),
        adm.join(ADM_TMP).join(ADM_PROP_BASE),
        adm.join(ADM_TEXT_BASE),
        adm.join(ADM_PROP_BASE),
        adm.join(ADM_PROPS),
    ] {
        fs::create_dir_all(&sub)
            .map_err(|error| AdmError::io("create administrative directory", sub.clone(), error))?;
    }
    let format = adm.join(ADM_FORMAT);
    crate::fsutil::write_atomic(&format, format!("{ADM_FORMAT_VERSION}\n").as_bytes())
        .map_err(|error| AdmError::io("write format marker", format, error))
}

/// Reads the format version of the administrative area under `dir`.
pub fn read_format(dir: &Path) -> Result<u32, AdmError> {
    let path = adm_path(dir, &[ADM_FORMAT]);
    let text = fs::read_to_string(&path).map_err(|error| {
        if error.kind() == std::io::ErrorKind::NotFound {
            AdmError::NotWorkingCopy {
                path: dir.to_path_buf(),
            }
        } else {
            AdmError::io("read format marker", path.clone(), error)
        }
    })?;
    text.trim().parse::<u32>().map_err(|_| AdmError::Codec {
        offset: 0,
        detail: format!("invalid format marker '{}'", text.trim()),
    })
}

/// Rewrites the format marker of `dir` to `version`.
pub fn write_format(dir: &Path, version: u32) -> Result<(), AdmError> {
    let path = adm_path(dir, &[ADM_FORMAT]);
    crate::fsutil::write_atomic(&path, format!("{version}\n").as_bytes())
        .map_err(|error| AdmError::io("write format marker", path, error))
}
