//! Keyword expansion and contraction.
//!
//! A keyword appears in file content as `$Name$` (contracted) or
//! `$Name: value $` (expanded). Expansion substitutes values derived
//! from the last commit; contraction strips them back for repository
//! storage. Keywords are capped at [`MAX_KEYWORD_LEN`] bytes between the
//! dollar signs and never span line endings.

use std::collections::BTreeMap;

/// Longest recognized `$...$` span, dollars excluded.
pub const MAX_KEYWORD_LEN: usize = 255;

/// The keyword table: canonical and alias names mapped to their
/// expansion values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keywords {
    values: BTreeMap<String, String>,
}

impl Keywords {
    /// Builds the table from an `svn:keywords` property value and commit
    /// metadata.
    ///
    /// `list` is the space/comma-separated keyword request; unknown names
    /// are ignored. `name` is the file's base name (used by `Id`).
    #[must_use]
    pub fn from_property(
        list: &str,
        name: &str,
        revision: Option<u64>,
        url: Option<&str>,
        date: Option<&str>,
        author: Option<&str>,
    ) -> Self {
        let mut values = BTreeMap::new();
        let rev_value = revision.map(|rev| rev.to_string());
        for word in list.split([' ', '\t', ',']).filter(|word| !word.is_empty()) {
            match word {
                "Revision" | "Rev" | "LastChangedRevision" => {
                    if let Some(rev) = &rev_value {
                        values.insert(word.to_owned(), rev.clone());
                    }
                }
                "Date" | "LastChangedDate" => {
                    if let Some(date) = date {
                        values.insert(word.to_owned(), date.to_owned());
                    }
                }
                "Author" | "LastChangedBy" => {
                    if let Some(author) = author {
                        values.insert(word.to_owned(), author.to_owned());
                    }
                }
                "HeadURL" | "URL" => {
                    if let Some(url) = url {
                        values.insert(word.to_owned(), url.to_owned());
                    }
                }
                "Id" => {
                    let id = format!(
                        "{name} {} {} {}",
                        rev_value.as_deref().unwrap_or("?"),
                        date.unwrap_or("?"),
                        author.unwrap_or("?"),
                    );
                    values.insert(word.to_owned(), id);
                }
                _ => {}
            }
        }
        Self { values }
    }

    /// Reports whether the table is empty (translation is a no-op).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Expands or contracts every keyword in `line`, which must not
    /// contain line endings.
    #[must_use]
    pub fn translate_line(&self, line: &[u8], expand: bool) -> Vec<u8> {
        if self.values.is_empty() || !line.contains(&b'$') {
            return line.to_vec();
        }
        let mut out = Vec::with_capacity(line.len());
        let mut pos = 0;
        while pos < line.len() {
            if line[pos] != b'$' {
                out.push(line[pos]);
                pos += 1;
                continue;
            }
            match self.match_keyword(&line[pos..]) {
                Some((consumed, name)) => {
                    if expand {
                        out.extend_from_slice(b"$");
                        out.extend_from_slice(name.as_bytes());
                        out.extend_from_slice(b": ");
                        out.extend_from_slice(self.values[&name].as_bytes());
                        out.extend_from_slice(b" $");
                    } else {
                        out.extend_from_slice(b"$");
                        out.extend_from_slice(name.as_bytes());
                        out.extend_from_slice(b"$");
                    }
                    pos += consumed;
                }
                None => {
                    out.push(b'$');
                    pos += 1;
                }
            }
        }
        out
    }

    /// Tries to match a keyword at the start of `input` (which begins
    /// with `$`). Returns the matched span length and the keyword name.
    fn match_keyword(&self, input: &[u8]) -> Option<(usize, String)> {
        let close = input[1..]
            .iter()
            .take(MAX_KEYWORD_LEN + 1)
            .position(|&byte| byte == b'$')?
            + 1;
        let body = std::str::from_utf8(&input[1..close]).ok()?;
        let name = match body.split_once(':') {
            Some((name, _value)) => name,
            None => body,
        };
        if self.values.contains_key(name) {
            Some((close + 1, name.to_owned()))
        } else {
            None
        }
    }
}
