//! Byte-level layout of the wire buffer.

use femtologging_core::{BufferError, CharWidth, TextParam, WireBuffer};
use proptest::prelude::*;
use rstest::rstest;

#[rstest]
fn integers_are_big_endian() {
    let mut buffer = WireBuffer::with_capacity(16);
    buffer.append_u32(0x1234_5678).expect("room");
    buffer.append_u16(0xABCD).expect("room");
    buffer.append_u8(0x7F).expect("room");
    assert_eq!(
        buffer.as_bytes(),
        &[0x12, 0x34, 0x56, 0x78, 0xAB, 0xCD, 0x7F]
    );
    buffer.rewind();
    assert_eq!(buffer.read_u32(), 0x1234_5678);
    assert_eq!(buffer.read_u16(), 0xABCD);
    assert_eq!(buffer.read_u8(), 0x7F);
}

#[rstest]
fn string_is_length_prefixed() {
    let mut buffer = WireBuffer::with_capacity(16);
    buffer.append_string("abc").expect("room");
    assert_eq!(buffer.as_bytes(), &[0, 0, 0, 3, 0x61, 0x62, 0x63]);
}

#[rstest]
fn empty_string_is_just_a_prefix() {
    let mut buffer = WireBuffer::with_capacity(4);
    buffer.append_text(&TextParam::from("")).expect("room");
    assert_eq!(buffer.as_bytes(), &[0, 0, 0, 0]);
    buffer.rewind();
    assert_eq!(buffer.read_string(CharWidth::Narrow), "");
}

#[rstest]
fn overflow_leaves_buffer_unchanged() {
    let mut buffer = WireBuffer::with_capacity(6);
    buffer.append_u16(1).expect("room");
    let before = buffer.as_bytes().to_vec();
    assert!(matches!(
        buffer.append_u32(2),
        Err(BufferError::Overflow {
            cursor: 2,
            needed: 4,
            capacity: 6
        })
    ));
    assert!(buffer.append_string("xyz").is_err());
    assert_eq!(buffer.as_bytes(), before.as_slice());
    assert_eq!(buffer.cursor(), 2);
}

#[rstest]
fn wide_units_are_written_big_endian() {
    let mut buffer = WireBuffer::with_capacity(16);
    let units: Vec<u16> = vec![0x00E9, 0x4E2D];
    buffer
        .append_text(&TextParam::from(units.as_slice()))
        .expect("room");
    assert_eq!(buffer.as_bytes(), &[0, 0, 0, 2, 0x00, 0xE9, 0x4E, 0x2D]);
    buffer.rewind();
    assert_eq!(buffer.read_string(CharWidth::Wide), "\u{e9}\u{4e2d}");
}

proptest! {
    #[test]
    fn appended_strings_read_back(text in "\\PC{0,64}") {
        let mut buffer = WireBuffer::with_capacity(4 + text.len());
        buffer.append_string(&text).expect("sized to fit");
        prop_assert_eq!(buffer.len(), 4 + text.len());
        buffer.rewind();
        prop_assert_eq!(buffer.read_string(CharWidth::Narrow), text);
        prop_assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn cursor_never_passes_length(
        bytes in proptest::collection::vec(any::<u8>(), 0..32),
        reads in 0usize..20,
    ) {
        let mut buffer = WireBuffer::from_bytes(&bytes);
        for _ in 0..reads {
            buffer.read_u32();
            buffer.read_string(CharWidth::Wide);
        }
        prop_assert!(buffer.cursor() <= buffer.len());
        prop_assert!(buffer.len() <= buffer.capacity());
    }

    #[test]
    fn rejected_appends_change_nothing(capacity in 0usize..8, value in any::<u32>()) {
        let mut buffer = WireBuffer::with_capacity(capacity);
        let result = buffer.append_u32(value);
        prop_assert_eq!(result.is_ok(), capacity >= 4);
        if result.is_err() {
            prop_assert!(buffer.is_empty());
            prop_assert_eq!(buffer.cursor(), 0);
        }
    }
}
