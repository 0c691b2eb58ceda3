//! Fixed-capacity byte buffer used to encode and decode framed messages.
//!
//! Integers are stored big-endian. Strings are a `u32` unit count followed by
//! that many character units, each written individually in network order so
//! narrow and wide peers agree on the layout regardless of host endianness.
//!
//! Bounds violations never panic: appends are rejected and leave the buffer
//! untouched, reads yield zero (or a truncated string), and both report
//! through the diagnostic channel.

use std::fmt;

use encoding_rs::WINDOWS_1252;
use log::error;
use thiserror::Error;

use crate::string_param::{CharWidth, TextParam};

/// Errors raised when an append would exceed the buffer capacity.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[error("attempt to write beyond end of buffer: need {needed} bytes at offset {cursor}, capacity {capacity}")]
    Overflow {
        cursor: usize,
        needed: usize,
        capacity: usize,
    },
}

/// Owned byte storage with a read/write cursor.
///
/// Invariant: `cursor <= length <= capacity`. Writers advance both `cursor`
/// and `length`; readers advance `cursor` and never move past `length`.
pub struct WireBuffer {
    data: Box<[u8]>,
    length: usize,
    cursor: usize,
}

impl WireBuffer {
    /// Allocate a zeroed buffer able to hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            length: 0,
            cursor: 0,
        }
    }

    /// Wrap received bytes ready for decoding from the start.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec().into_boxed_slice(),
            length: bytes.len(),
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid bytes (written or received).
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes still available to read.
    pub fn remaining(&self) -> usize {
        self.length - self.cursor
    }

    /// Move the cursor back to the start without discarding content.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Forget all content; capacity is retained.
    pub fn clear(&mut self) {
        self.cursor = 0;
        self.length = 0;
    }

    /// The valid portion of the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Unfilled storage after the valid bytes, for socket reads.
    pub fn spare_capacity_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.length..]
    }

    /// Mark `count` bytes of spare capacity as received.
    ///
    /// Counts past the end of the storage are clamped.
    pub fn set_received(&mut self, count: usize) {
        self.length = (self.length + count).min(self.capacity());
    }

    pub fn append_u8(&mut self, value: u8) -> Result<(), BufferError> {
        self.append_raw(&[value])
    }

    pub fn append_u16(&mut self, value: u16) -> Result<(), BufferError> {
        self.append_raw(&value.to_be_bytes())
    }

    pub fn append_u32(&mut self, value: u32) -> Result<(), BufferError> {
        self.append_raw(&value.to_be_bytes())
    }

    /// Append a narrow (UTF-8) string.
    pub fn append_string(&mut self, text: &str) -> Result<(), BufferError> {
        self.append_text(&TextParam::Narrow(text))
    }

    /// Append `text` as UTF-16 units.
    pub fn append_wide_string(&mut self, text: &str) -> Result<(), BufferError> {
        self.append_text(&TextParam::wide_from_str(text))
    }

    /// Append a length-prefixed string of either width.
    ///
    /// The whole encoded size is checked before anything is written, so a
    /// rejected string never leaves a dangling prefix behind.
    pub fn append_text(&mut self, text: &TextParam<'_>) -> Result<(), BufferError> {
        let units = text.unit_len();
        let Ok(prefix) = u32::try_from(units) else {
            return Err(self.overflow(usize::MAX));
        };
        self.check_room(4 + text.encoded_len())?;
        self.put(&prefix.to_be_bytes());
        match text {
            TextParam::Narrow(s) => self.put(s.as_bytes()),
            TextParam::OwnedNarrow(s) => self.put(s.as_bytes()),
            TextParam::Wide(units) => self.put_wide(units),
            TextParam::OwnedWide(units) => self.put_wide(units),
        }
        Ok(())
    }

    /// Copy the valid bytes of `other` at the cursor.
    pub fn append_buffer(&mut self, other: &WireBuffer) -> Result<(), BufferError> {
        self.append_raw(other.as_bytes())
    }

    pub fn read_u8(&mut self) -> u8 {
        self.read_array::<1>().map_or(0, |b| b[0])
    }

    pub fn read_u16(&mut self) -> u16 {
        self.read_array::<2>().map_or(0, u16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> u32 {
        self.read_array::<4>().map_or(0, u32::from_be_bytes)
    }

    /// Read a length-prefixed string encoded with `width`-byte units.
    ///
    /// A prefix claiming more units than remain is truncated to what is
    /// available; the cursor advances by the truncated amount. Narrow text
    /// that is not valid UTF-8 is decoded as Windows-1252.
    pub fn read_string(&mut self, width: CharWidth) -> String {
        let claimed = self.read_u32() as usize;
        let unit = width.bytes();
        let available = self.remaining() / unit;
        let units = if claimed > available {
            error!(
                "WireBuffer::read_string: string of {claimed} units truncated to {available}"
            );
            available
        } else {
            claimed
        };
        let start = self.cursor;
        let end = start + units * unit;
        self.cursor = end;
        let raw = &self.data[start..end];
        match width {
            CharWidth::Narrow => decode_narrow(raw),
            CharWidth::Wide => {
                let wide: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&wide)
            }
        }
    }

    fn append_raw(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.check_room(bytes.len())?;
        self.put(bytes);
        Ok(())
    }

    fn check_room(&self, needed: usize) -> Result<(), BufferError> {
        if self.capacity().saturating_sub(self.cursor) < needed {
            return Err(self.overflow(needed));
        }
        Ok(())
    }

    fn overflow(&self, needed: usize) -> BufferError {
        let err = BufferError::Overflow {
            cursor: self.cursor,
            needed,
            capacity: self.capacity(),
        };
        error!("WireBuffer: {err}");
        err
    }

    // Callers have already checked capacity.
    fn put(&mut self, bytes: &[u8]) {
        let end = self.cursor + bytes.len();
        self.data[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
        self.length = self.length.max(end);
    }

    fn put_wide(&mut self, units: &[u16]) {
        for unit in units {
            self.put(&unit.to_be_bytes());
        }
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.remaining() < N {
            error!(
                "WireBuffer: attempt to read {N} bytes at offset {} beyond length {}",
                self.cursor, self.length
            );
            return None;
        }
        let mut out = [0; N];
        out.copy_from_slice(&self.data[self.cursor..self.cursor + N]);
        self.cursor += N;
        Some(out)
    }
}

fn decode_narrow(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_owned(),
        Err(_) => {
            let (text, _, _) = WINDOWS_1252.decode(raw);
            text.into_owned()
        }
    }
}

impl Default for WireBuffer {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl Clone for WireBuffer {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            length: self.length,
            cursor: self.cursor,
        }
    }
}

impl fmt::Debug for WireBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireBuffer")
            .field("capacity", &self.capacity())
            .field("length", &self.length)
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn append_u32_is_big_endian() {
        let mut buffer = WireBuffer::with_capacity(8);
        buffer.append_u32(0x0102_0304).expect("room for u32");
        assert_eq!(buffer.as_bytes(), &[1, 2, 3, 4]);
        assert_eq!(buffer.cursor(), 4);
    }

    #[rstest]
    fn narrow_string_layout() {
        let mut buffer = WireBuffer::with_capacity(8);
        buffer.append_string("hi").expect("room for string");
        assert_eq!(buffer.as_bytes(), &[0, 0, 0, 2, b'h', b'i']);
    }

    #[rstest]
    fn wide_string_layout() {
        let mut buffer = WireBuffer::with_capacity(8);
        buffer.append_wide_string("A").expect("room for string");
        assert_eq!(buffer.as_bytes(), &[0, 0, 0, 1, 0x00, 0x41]);
        buffer.rewind();
        assert_eq!(buffer.read_string(CharWidth::Wide), "A");
    }

    #[rstest]
    fn read_past_length_yields_zero() {
        let mut buffer = WireBuffer::from_bytes(&[0, 0]);
        assert_eq!(buffer.read_u32(), 0);
        assert_eq!(buffer.cursor(), 0);
        assert_eq!(buffer.read_u16(), 0);
        assert_eq!(buffer.read_u8(), 0);
    }

    #[rstest]
    fn overflowing_append_leaves_buffer_untouched() {
        let mut buffer = WireBuffer::with_capacity(3);
        let err = buffer.append_u32(7).expect_err("u32 does not fit");
        assert_eq!(
            err,
            BufferError::Overflow {
                cursor: 0,
                needed: 4,
                capacity: 3
            }
        );
        assert!(buffer.is_empty());
        assert_eq!(buffer.cursor(), 0);
    }

    #[rstest]
    fn oversized_string_writes_no_prefix() {
        let mut buffer = WireBuffer::with_capacity(6);
        buffer.append_string("abc").expect_err("7 bytes do not fit");
        assert!(buffer.is_empty());
    }

    #[rstest]
    fn truncated_string_reads_what_is_available() {
        let mut buffer = WireBuffer::from_bytes(&[0, 0, 0, 9, b'a', b'b']);
        assert_eq!(buffer.read_string(CharWidth::Narrow), "ab");
        assert_eq!(buffer.remaining(), 0);
    }

    #[rstest]
    fn narrow_legacy_bytes_fall_back_to_windows_1252() {
        let mut buffer = WireBuffer::from_bytes(&[0, 0, 0, 1, 0xE9]);
        assert_eq!(buffer.read_string(CharWidth::Narrow), "\u{e9}");
    }

    #[rstest]
    fn append_buffer_copies_valid_bytes() {
        let mut inner = WireBuffer::with_capacity(16);
        inner.append_u16(0xBEEF).expect("room for u16");
        let mut outer = WireBuffer::with_capacity(16);
        outer.append_u8(1).expect("room for u8");
        outer.append_buffer(&inner).expect("room for inner");
        assert_eq!(outer.as_bytes(), &[1, 0xBE, 0xEF]);
    }

    #[rstest]
    fn set_received_clamps_to_capacity() {
        let mut buffer = WireBuffer::with_capacity(4);
        buffer.spare_capacity_mut()[..2].copy_from_slice(&[0, 5]);
        buffer.set_received(2);
        assert_eq!(buffer.read_u16(), 5);
        buffer.set_received(100);
        assert_eq!(buffer.len(), 4);
    }
}
