#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Keyword and end-of-line translation between repository-normal and
//! working-copy form. Repository form keeps contracted keywords
//! (`$Revision$`) and LF line endings; translating toward the working
//! copy expands keywords against commit metadata and rewrites line
//! endings per `svn:eol-style`; detranslating reverses both.
//!
//! # Design
//!
//! - [`TranslatingWriter`] wraps any [`std::io::Write`] sink and performs
//!   line-buffered translation: keywords never span line endings, so the
//!   writer holds at most one partial line.
//! - [`Keywords`] is the expansion table built from changed-revision,
//!   URL, date, and author; [`EolStyle`] is the decoded
//!   `svn:eol-style` value.
//! - Special files (symlinks) have a one-line detranslated form,
//!   `link TARGET`, handled by [`special`].

pub mod eol;
pub mod error;
pub mod keywords;
pub mod special;
pub mod stream;

pub use eol::EolStyle;
pub use error::TranslateError;
pub use keywords::Keywords;
pub use stream::TranslatingWriter;

use std::fs;
use std::io::Write;
use std::path::Path;

/// Translates `src` into `dst` in one pass.
///
/// `expand` selects the direction: `true` expands keywords and applies
/// `eol`; `false` contracts keywords (use [`EolStyle::Lf`] to normalize
/// endings back to repository form, [`EolStyle::None`] to leave them).
pub fn translate_file(
    src: &Path,
    dst: &Path,
    eol: EolStyle,
    keywords: &Keywords,
    expand: bool,
) -> Result<(), TranslateError> {
    let contents = fs::read(src)
        .map_err(|error| TranslateError::io("read translation source", src, error))?;
    let out = fs::File::create(dst)
        .map_err(|error| TranslateError::io("create translation target", dst, error))?;
    let mut writer = TranslatingWriter::new(out, eol, keywords.clone(), expand);
    writer
        .write_all(&contents)
        .and_then(|()| writer.finish().map(drop))
        .map_err(|error| TranslateError::io("translate file", dst, error))
}
