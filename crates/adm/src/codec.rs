//! The attribute-framed element codec.
//!
//! Administrative files (log segments, the entry table, cached properties,
//! tree-conflict records) are sequences of self-closing elements:
//!
//! ```text
//! <mv name="tmp/iota" dest="iota"/>
//! ```
//!
//! Attribute values are double-quoted and entity-escaped. The codec keeps
//! attributes in emission order so serialized output is deterministic, and
//! it reports parse failures with a byte offset so callers can distinguish
//! "corrupt from the first byte" from "corrupt partway through".

use crate::error::AdmError;

/// One parsed or to-be-printed element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    /// Creates an element with the given tag and no attributes.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
        }
    }

    /// Returns the element tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the value of `name`, if present.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets `name` to `value`, replacing any previous value in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(attr, _)| *attr == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name, value));
        }
    }

    /// Builder-style [`set_attr`](Self::set_attr).
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Iterates over attributes in emission order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Appends the serialized element (and a trailing newline) to `out`.
    pub fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push('\n');
            out.push(' ');
            out.push(' ');
            out.push(' ');
            out.push_str(name);
            out.push('=');
            out.push('"');
            escape_into(value, out);
            out.push('"');
        }
        out.push_str("/>\n");
    }
}

fn escape_into(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            other => out.push(other),
        }
    }
}

fn malformed(offset: usize, detail: impl Into<String>) -> AdmError {
    AdmError::Codec {
        offset,
        detail: detail.into(),
    }
}

/// Parses every element in `input`.
///
/// The input is treated as the body of a synthetic wrapper document: only
/// self-closing elements and whitespace may appear at the top level. An
/// empty input yields an empty vector.
pub fn parse_all(input: &str) -> Result<Vec<Element>, AdmError> {
    let bytes = input.as_bytes();
    let mut pos = 0usize;
    let mut elements = Vec::new();

    while pos < bytes.len() {
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if bytes[pos] != b'<' {
            return Err(malformed(pos, "expected '<'"));
        }
        let start = pos;
        pos += 1;
        let tag_start = pos;
        while pos < bytes.len() && is_name_byte(bytes[pos]) {
            pos += 1;
        }
        if pos == tag_start {
            return Err(malformed(start, "missing element tag"));
        }
        let mut element = Element::new(&input[tag_start..pos]);

        loop {
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos >= bytes.len() {
                return Err(malformed(start, "unterminated element"));
            }
            if bytes[pos] == b'/' {
                if pos + 1 >= bytes.len() || bytes[pos + 1] != b'>' {
                    return Err(malformed(pos, "expected '/>'"));
                }
                pos += 2;
                break;
            }
            let name_start = pos;
            while pos < bytes.len() && is_name_byte(bytes[pos]) {
                pos += 1;
            }
            if pos == name_start {
                return Err(malformed(pos, "expected attribute name"));
            }
            let name = &input[name_start..pos];
            if pos >= bytes.len() || bytes[pos] != b'=' {
                return Err(malformed(pos, format!("attribute '{name}' missing '='")));
            }
            pos += 1;
            if pos >= bytes.len() || bytes[pos] != b'"' {
                return Err(malformed(pos, format!("attribute '{name}' missing '\"'")));
            }
            pos += 1;
            let value_start = pos;
            while pos < bytes.len() && bytes[pos] != b'"' {
                pos += 1;
            }
            if pos >= bytes.len() {
                return Err(malformed(value_start, "unterminated attribute value"));
            }
            let value = unescape(&input[value_start..pos], value_start)?;
            element.set_attr(name, value);
            pos += 1;
        }
        elements.push(element);
    }

    Ok(elements)
}

/// Serializes `elements` back into file text.
#[must_use]
pub fn write_all(elements: &[Element]) -> String {
    let mut out = String::new();
    for element in elements {
        element.write_to(&mut out);
    }
    out
}

const fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b':' || byte == b'_' || byte == b'.'
}

fn unescape(raw: &str, offset: usize) -> Result<String, AdmError> {
    if !raw.contains('&') {
        return Ok(raw.to_owned());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let semi = tail
            .find(';')
            .ok_or_else(|| malformed(offset, "unterminated entity"))?;
        let entity = &tail[1..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = entity
                    .strip_prefix('#')
                    .and_then(|digits| digits.parse::<u32>().ok())
                    .and_then(char::from_u32)
                    .ok_or_else(|| malformed(offset, format!("unknown entity '&{entity};'")))?;
                out.push(code);
            }
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
