//! Text arguments that may arrive as narrow or wide character data.
//!
//! Remote peers send either one-byte or two-byte character units, and callers
//! hand the encoder either borrowed or owned text. [`TextParam`] captures all
//! four shapes so the wire buffer can dispatch on them with a single `match`.

use std::borrow::Cow;
use std::fmt;

/// Width in bytes of one encoded character unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CharWidth {
    /// One byte per unit (UTF-8 code units).
    Narrow = 1,
    /// Two bytes per unit (UTF-16 code units).
    Wide = 2,
}

impl CharWidth {
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// Interpret the character-size byte of an encoded record.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(CharWidth::Narrow),
            2 => Some(CharWidth::Wide),
            _ => None,
        }
    }
}

/// Borrowed or owned text in either unit width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextParam<'a> {
    Narrow(&'a str),
    Wide(&'a [u16]),
    OwnedNarrow(String),
    OwnedWide(Vec<u16>),
}

impl<'a> TextParam<'a> {
    /// Encode `text` as UTF-16 units.
    pub fn wide_from_str(text: &str) -> TextParam<'static> {
        TextParam::OwnedWide(text.encode_utf16().collect())
    }

    pub fn width(&self) -> CharWidth {
        match self {
            TextParam::Narrow(_) | TextParam::OwnedNarrow(_) => CharWidth::Narrow,
            TextParam::Wide(_) | TextParam::OwnedWide(_) => CharWidth::Wide,
        }
    }

    /// Number of character units (not bytes, not chars).
    pub fn unit_len(&self) -> usize {
        match self {
            TextParam::Narrow(s) => s.len(),
            TextParam::OwnedNarrow(s) => s.len(),
            TextParam::Wide(units) => units.len(),
            TextParam::OwnedWide(units) => units.len(),
        }
    }

    /// Number of bytes the units occupy once encoded.
    pub fn encoded_len(&self) -> usize {
        self.unit_len() * self.width().bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.unit_len() == 0
    }

    /// Detach from any borrowed storage.
    pub fn into_owned(self) -> TextParam<'static> {
        match self {
            TextParam::Narrow(s) => TextParam::OwnedNarrow(s.to_owned()),
            TextParam::Wide(units) => TextParam::OwnedWide(units.to_vec()),
            TextParam::OwnedNarrow(s) => TextParam::OwnedNarrow(s),
            TextParam::OwnedWide(units) => TextParam::OwnedWide(units),
        }
    }

    /// Render as a Rust string; unpaired surrogates become U+FFFD.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            TextParam::Narrow(s) => Cow::Borrowed(s),
            TextParam::OwnedNarrow(s) => Cow::Borrowed(s.as_str()),
            TextParam::Wide(units) => Cow::Owned(String::from_utf16_lossy(units)),
            TextParam::OwnedWide(units) => Cow::Owned(String::from_utf16_lossy(units)),
        }
    }

    /// Visit the narrow bytes or wide units without copying.
    pub fn visit<R>(
        &self,
        narrow: impl FnOnce(&[u8]) -> R,
        wide: impl FnOnce(&[u16]) -> R,
    ) -> R {
        match self {
            TextParam::Narrow(s) => narrow(s.as_bytes()),
            TextParam::OwnedNarrow(s) => narrow(s.as_bytes()),
            TextParam::Wide(units) => wide(units),
            TextParam::OwnedWide(units) => wide(units),
        }
    }
}

impl<'a> From<&'a str> for TextParam<'a> {
    fn from(s: &'a str) -> Self {
        TextParam::Narrow(s)
    }
}

impl<'a> From<&'a String> for TextParam<'a> {
    fn from(s: &'a String) -> Self {
        TextParam::Narrow(s.as_str())
    }
}

impl From<String> for TextParam<'static> {
    fn from(s: String) -> Self {
        TextParam::OwnedNarrow(s)
    }
}

impl<'a> From<&'a [u16]> for TextParam<'a> {
    fn from(units: &'a [u16]) -> Self {
        TextParam::Wide(units)
    }
}

impl From<Vec<u16>> for TextParam<'static> {
    fn from(units: Vec<u16>) -> Self {
        TextParam::OwnedWide(units)
    }
}

impl fmt::Display for TextParam<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
