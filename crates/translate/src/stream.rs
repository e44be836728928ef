//! The translating stream wrapper.

use std::io::{self, Write};

use crate::eol::EolStyle;
use crate::keywords::Keywords;

/// A [`Write`] adapter that performs keyword and EOL translation on the
/// bytes flowing through it.
///
/// Translation is line-buffered: complete lines are translated and
/// forwarded immediately, at most one partial line is held back. A
/// trailing `\r` is also held until the next write decides whether it
/// belongs to a `\r\n` pair. Call [`finish`](Self::finish) to flush the
/// final partial line and recover the inner writer; dropping the adapter
/// without finishing loses any buffered tail.
#[derive(Debug)]
pub struct TranslatingWriter<W: Write> {
    inner: W,
    pending: Vec<u8>,
    eol: EolStyle,
    keywords: Keywords,
    expand: bool,
}

impl<W: Write> TranslatingWriter<W> {
    /// Wraps `inner`. `expand` selects expansion (toward the working
    /// copy) versus contraction (toward the repository).
    pub fn new(inner: W, eol: EolStyle, keywords: Keywords, expand: bool) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            eol,
            keywords,
            expand,
        }
    }

    /// Flushes the final partial line and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            // A lone trailing CR is a line ending too.
            if line == b"\r" {
                self.emit_eol(b"\r")?;
            } else if let Some(body) = line.strip_suffix(b"\r") {
                let translated = self.keywords.translate_line(body, self.expand);
                self.inner.write_all(&translated)?;
                self.emit_eol(b"\r")?;
            } else {
                let translated = self.keywords.translate_line(&line, self.expand);
                self.inner.write_all(&translated)?;
            }
        }
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn emit_line(&mut self, line: &[u8], original_eol: &'static [u8]) -> io::Result<()> {
        let translated = self.keywords.translate_line(line, self.expand);
        self.inner.write_all(&translated)?;
        self.emit_eol(original_eol)
    }

    fn emit_eol(&mut self, original: &'static [u8]) -> io::Result<()> {
        match self.eol.bytes() {
            Some(eol) => self.inner.write_all(eol),
            None => self.inner.write_all(original),
        }
    }

    /// Drains every complete line currently buffered.
    fn drain(&mut self) -> io::Result<()> {
        loop {
            let Some(pos) = self
                .pending
                .iter()
                .position(|&byte| byte == b'\n' || byte == b'\r')
            else {
                return Ok(());
            };
            // Keep a trailing CR: the next byte decides CR vs CRLF.
            if self.pending[pos] == b'\r' && pos + 1 == self.pending.len() {
                return Ok(());
            }
            let eol_len = if self.pending[pos] == b'\r' && self.pending[pos + 1] == b'\n' {
                2
            } else {
                1
            };
            let original: &'static [u8] = match &self.pending[pos..pos + eol_len] {
                b"\r\n" => b"\r\n",
                b"\r" => b"\r",
                _ => b"\n",
            };
            let rest = self.pending.split_off(pos + eol_len);
            let line = std::mem::replace(&mut self.pending, rest);
            self.emit_line(&line[..pos], original)?;
        }
    }
}

impl<W: Write> Write for TranslatingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drain()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Partial lines stay buffered; only the inner sink flushes.
        self.inner.flush()
    }
}
