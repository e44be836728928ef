//! End-of-line styles.

/// Decoded `svn:eol-style` value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EolStyle {
    /// No translation; line endings pass through untouched.
    #[default]
    None,
    /// The platform's native ending.
    Native,
    /// Line feed.
    Lf,
    /// Carriage return + line feed.
    Crlf,
    /// Carriage return.
    Cr,
}

impl EolStyle {
    /// Decodes a property value. Absent or unrecognized values mean no
    /// translation.
    #[must_use]
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some("native") => Self::Native,
            Some("LF") => Self::Lf,
            Some("CRLF") => Self::Crlf,
            Some("CR") => Self::Cr,
            _ => Self::None,
        }
    }

    /// The byte sequence this style writes, or `None` for pass-through.
    #[must_use]
    pub const fn bytes(self) -> Option<&'static [u8]> {
        match self {
            Self::None => None,
            Self::Native => {
                #[cfg(windows)]
                {
                    Some(b"\r\n")
                }
                #[cfg(not(windows))]
                {
                    Some(b"\n")
                }
            }
            Self::Lf => Some(b"\n"),
            Self::Crlf => Some(b"\r\n"),
            Self::Cr => Some(b"\r"),
        }
    }
}
