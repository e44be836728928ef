//! The working-file writer.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use adm::fsutil;
use entries::props::{
    PROP_EOL_STYLE, PROP_EXECUTABLE, PROP_KEYWORDS, PROP_NEEDS_LOCK, PROP_SPECIAL,
};
use entries::PropertyList;
use filetime::FileTime;
use translate::{special, EolStyle, Keywords, TranslatingWriter};

use crate::error::WorkfileError;

/// Parameters for opening a [`WorkingFileWriter`].
///
/// Everything needed to derive translation requirements and deferred
/// attributes: the file's property list, its last-commit metadata, and
/// lock state.
#[derive(Clone, Debug)]
pub struct InstallParams<'a> {
    /// Versioned properties of the file being installed.
    pub props: &'a PropertyList,
    /// Explicit mtime to stamp at install; `None` keeps the write time.
    pub final_mtime: Option<FileTime>,
    /// Last-changed revision (keyword expansion).
    pub changed_rev: Option<u64>,
    /// Last-changed date (keyword expansion).
    pub changed_date: Option<&'a str>,
    /// Last-changed author (keyword expansion).
    pub changed_author: Option<&'a str>,
    /// Whether the caller holds the repository lock for this file.
    pub has_lock: bool,
    /// Whether the file is freshly added (no pristine predecessor).
    pub is_added: bool,
    /// Repository root URL (keyword expansion).
    pub repos_root_url: Option<&'a str>,
    /// Repository path below the root (keyword expansion).
    pub repos_relpath: Option<&'a str>,
}

impl<'a> InstallParams<'a> {
    /// Parameters with the given properties and everything else unset.
    #[must_use]
    pub fn new(props: &'a PropertyList) -> Self {
        Self {
            props,
            final_mtime: None,
            changed_rev: None,
            changed_date: None,
            changed_author: None,
            has_lock: false,
            is_added: false,
            repos_root_url: None,
            repos_relpath: None,
        }
    }
}

enum Sink {
    Plain(fs::File),
    Translating(TranslatingWriter<fs::File>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(file) => file.write(buf),
            Self::Translating(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(file) => file.flush(),
            Self::Translating(writer) => writer.flush(),
        }
    }
}

/// Stages and atomically installs one translated, permissioned working
/// file. Ephemeral: one writer per install call.
pub struct WorkingFileWriter {
    tmp_path: PathBuf,
    sink: Option<Sink>,
    special: bool,
    read_only: bool,
    executable: bool,
    final_mtime: Option<FileTime>,
    finalized: Option<(FileTime, u64)>,
    installed: bool,
}

impl WorkingFileWriter {
    /// Opens a writer staging into `tmp_dir`.
    ///
    /// `name` is the working file's base name (it feeds the `Id` keyword
    /// and the temp-file name hint). Translation requirements and
    /// deferred attributes are derived from `params`.
    pub fn open(
        tmp_dir: &Path,
        name: &str,
        params: &InstallParams<'_>,
    ) -> Result<Self, WorkfileError> {
        let special = params.props.contains_key(PROP_SPECIAL);
        let executable = !special && params.props.contains_key(PROP_EXECUTABLE);
        let read_only = !special && params.props.contains_key(PROP_NEEDS_LOCK) && !params.has_lock;

        let tmp_path = fsutil::unique_tmp_path(tmp_dir, name);
        let file = fs::File::create(&tmp_path)
            .map_err(|error| WorkfileError::io("create staging file", &tmp_path, error))?;

        let sink = if special {
            // Special files stage their detranslated representation verbatim.
            Sink::Plain(file)
        } else {
            let eol = EolStyle::from_value(params.props.get(PROP_EOL_STYLE).map(String::as_str));
            let keywords = match params.props.get(PROP_KEYWORDS) {
                Some(list) => {
                    let url = match (params.repos_root_url, params.repos_relpath) {
                        (Some(root), Some(relpath)) => {
                            Some(format!("{}/{}", root.trim_end_matches('/'), relpath))
                        }
                        _ => None,
                    };
                    Keywords::from_property(
                        list,
                        name,
                        params.changed_rev,
                        url.as_deref(),
                        params.changed_date,
                        params.changed_author,
                    )
                }
                None => Keywords::default(),
            };
            if eol == EolStyle::None && keywords.is_empty() {
                Sink::Plain(file)
            } else {
                Sink::Translating(TranslatingWriter::new(file, eol, keywords, true))
            }
        };

        Ok(Self {
            tmp_path,
            sink: Some(sink),
            special,
            read_only,
            executable,
            final_mtime: params.final_mtime,
            finalized: None,
            installed: false,
        })
    }

    /// The (possibly translating) write sink for content producers.
    pub fn stream(&mut self) -> Result<&mut (dyn Write + '_), WorkfileError> {
        match self.sink.as_mut() {
            Some(sink) => Ok(sink),
            None => Err(WorkfileError::Misuse {
                detail: "stream requested after finalize",
            }),
        }
    }

    /// Closes the content stream and applies deferred attributes to the
    /// staged file, without moving it into place.
    ///
    /// Returns the staged file's resulting mtime and size so callers can
    /// decide entry metadata before committing to the final path.
    pub fn finalize(&mut self) -> Result<(FileTime, u64), WorkfileError> {
        if let Some(result) = self.finalized {
            return Ok(result);
        }
        let sink = self.sink.take().ok_or(WorkfileError::Misuse {
            detail: "finalize called twice on a closed writer",
        })?;
        match sink {
            Sink::Plain(mut file) => {
                file.flush()
                    .map_err(|error| WorkfileError::io("flush staging file", &self.tmp_path, error))?;
                file.sync_all()
                    .map_err(|error| WorkfileError::io("sync staging file", &self.tmp_path, error))?;
            }
            Sink::Translating(writer) => {
                let file = writer
                    .finish()
                    .map_err(|error| WorkfileError::io("finish translation", &self.tmp_path, error))?;
                file.sync_all()
                    .map_err(|error| WorkfileError::io("sync staging file", &self.tmp_path, error))?;
            }
        }

        if !self.special {
            if let Some(mtime) = self.final_mtime {
                fsutil::set_file_mtime(&self.tmp_path, mtime)
                    .map_err(|error| WorkfileError::io("stamp staged mtime", &self.tmp_path, error))?;
            }
            if self.executable {
                fsutil::set_executable(&self.tmp_path, true)
                    .map_err(|error| WorkfileError::io("set executable bit", &self.tmp_path, error))?;
            }
            if self.read_only {
                fsutil::set_read_only(&self.tmp_path, true)
                    .map_err(|error| WorkfileError::io("set read-only bit", &self.tmp_path, error))?;
            }
        }

        let metadata = fs::symlink_metadata(&self.tmp_path)
            .map_err(|error| WorkfileError::io("inspect staged file", &self.tmp_path, error))?;
        let result = (
            FileTime::from_last_modification_time(&metadata),
            metadata.len(),
        );
        self.finalized = Some(result);
        Ok(result)
    }

    /// Moves the staged content into place at `target`, consuming the
    /// writer.
    ///
    /// Regular files install with one atomic rename; special files are
    /// re-created as symlinks from the staged representation. A missing
    /// parent directory is the caller's error and surfaces as-is.
    pub fn install(mut self, target: &Path) -> Result<(), WorkfileError> {
        if self.finalized.is_none() {
            self.finalize()?;
        }
        if self.special {
            special::create_special_from_repr(&self.tmp_path, target)?;
            fsutil::remove_file_if_present(&self.tmp_path)
                .map_err(|error| WorkfileError::io("remove staging file", &self.tmp_path, error))?;
        } else {
            // An existing read-only target would make rename fail on some
            // platforms; clear the bit first, tolerating absence.
            match fsutil::set_read_only(target, false) {
                Ok(()) => {}
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => {
                    return Err(WorkfileError::io("unprotect install target", target, error));
                }
            }
            fs::rename(&self.tmp_path, target)
                .map_err(|error| WorkfileError::io("install working file", target, error))?;
        }
        self.installed = true;
        Ok(())
    }

    /// Rollback path: deletes the staged temp file when `install` never
    /// ran. Safe to call repeatedly.
    pub fn close(&mut self) -> Result<(), WorkfileError> {
        self.sink = None;
        if self.installed {
            return Ok(());
        }
        fsutil::remove_file_if_present(&self.tmp_path)
            .map(|_| ())
            .map_err(|error| WorkfileError::io("remove staging file", &self.tmp_path, error))
    }
}

impl Drop for WorkingFileWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
