//! Special-file (symlink) detranslated representation.
//!
//! Repository form of a special file is one line, `link TARGET`. The
//! working-copy form is the symlink itself.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TranslateError;

const LINK_PREFIX: &str = "link ";

/// Parses a detranslated representation into its symlink target.
#[must_use]
pub fn parse_link(contents: &[u8]) -> Option<PathBuf> {
    let text = std::str::from_utf8(contents).ok()?;
    let target = text.strip_prefix(LINK_PREFIX)?.trim_end_matches('\n');
    if target.is_empty() {
        None
    } else {
        Some(PathBuf::from(target))
    }
}

/// Produces the detranslated representation for a symlink target.
#[must_use]
pub fn unparse_link(target: &Path) -> Vec<u8> {
    format!("{LINK_PREFIX}{}", target.display()).into_bytes()
}

/// Materializes the special file described by `repr_path` at `target`.
///
/// Any existing file or link at `target` is replaced.
pub fn create_special_from_repr(repr_path: &Path, target: &Path) -> Result<(), TranslateError> {
    let contents = fs::read(repr_path)
        .map_err(|error| TranslateError::io("read special representation", repr_path, error))?;
    let link_target = parse_link(&contents).ok_or_else(|| TranslateError::MalformedSpecial {
        path: repr_path.to_path_buf(),
    })?;

    #[cfg(unix)]
    {
        match fs::symlink_metadata(target) {
            Ok(_) => {
                fs::remove_file(target)
                    .map_err(|error| TranslateError::io("replace special file", target, error))?;
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(TranslateError::io("inspect special file", target, error));
            }
        }
        std::os::unix::fs::symlink(&link_target, target)
            .map_err(|error| TranslateError::io("create symlink", target, error))
    }
    #[cfg(not(unix))]
    {
        let _ = link_target;
        Err(TranslateError::SpecialUnsupported)
    }
}

/// Reads the symlink at `path` back into detranslated form.
pub fn detranslate_special(path: &Path) -> Result<Vec<u8>, TranslateError> {
    let target = fs::read_link(path)
        .map_err(|error| TranslateError::io("read symlink target", path, error))?;
    Ok(unparse_link(&target))
}

/// Reports whether `path` is a symlink.
#[must_use]
pub fn is_special(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_unparse_round_trip() {
        let repr = unparse_link(Path::new("../shared/config"));
        assert_eq!(repr, b"link ../shared/config".to_vec());
        assert_eq!(
            parse_link(&repr),
            Some(PathBuf::from("../shared/config"))
        );
    }

    #[test]
    fn rejects_non_link_payloads() {
        assert!(parse_link(b"plain contents").is_none());
        assert!(parse_link(b"link ").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn creates_and_detranslates_symlinks() {
        let temp = tempfile::tempdir().unwrap();
        let repr = temp.path().join("repr");
        fs::write(&repr, b"link destination").unwrap();
        let link = temp.path().join("the-link");

        create_special_from_repr(&repr, &link).unwrap();
        assert!(is_special(&link));
        assert_eq!(detranslate_special(&link).unwrap(), b"link destination");

        // Replacing an existing link succeeds.
        fs::write(&repr, b"link elsewhere").unwrap();
        create_special_from_repr(&repr, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("elsewhere"));
    }
}
