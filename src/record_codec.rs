//! Binary encoding of log records for remote collectors.
//!
//! A record travels as one frame: a `u32` payload length followed by the
//! payload. The payload layout is
//!
//! ```text
//! u8 version, u8 char width,
//! string server, string logger, u32 level,
//! string ndc, string message, string thread,
//! u32 seconds, u32 microseconds,
//! string file, u32 line, string function
//! ```
//!
//! with integers big-endian and strings length-prefixed as described in
//! [`crate::wire_buffer`].

use thiserror::Error;

use crate::level::FemtoLevel;
use crate::log_record::{FemtoLogRecord, RecordMetadata};
use crate::string_param::CharWidth;
use crate::wire_buffer::{BufferError, WireBuffer};

/// Payload layout version written by this encoder.
pub const MESSAGE_VERSION: u8 = 3;
/// Largest frame, length prefix included.
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024;
/// Size of the frame length prefix.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Errors raised while decoding a payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unsupported message version {0}")]
    UnsupportedVersion(u8),
    #[error("unsupported character width {0}")]
    UnsupportedCharWidth(u8),
    #[error("frame of {0} bytes exceeds the maximum message size")]
    FrameTooLarge(usize),
}

/// A record decoded from the wire together with the sender's server name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedRecord {
    pub server_name: String,
    pub record: FemtoLogRecord,
}

/// Append the payload for `record` to `buffer`.
pub fn convert_to_buffer(
    buffer: &mut WireBuffer,
    record: &FemtoLogRecord,
    server_name: &str,
) -> Result<(), BufferError> {
    let metadata = &record.metadata;
    let (secs, micros) = metadata.epoch_parts();
    buffer.append_u8(MESSAGE_VERSION)?;
    buffer.append_u8(CharWidth::Narrow as u8)?;
    buffer.append_string(server_name)?;
    buffer.append_string(&record.logger)?;
    buffer.append_u32(record.level.wire_code())?;
    buffer.append_string(&metadata.ndc)?;
    buffer.append_string(&record.message)?;
    buffer.append_string(&metadata.thread)?;
    buffer.append_u32(secs)?;
    buffer.append_u32(micros)?;
    buffer.append_string(&metadata.filename)?;
    buffer.append_u32(metadata.line_number)?;
    buffer.append_string(&metadata.function)?;
    Ok(())
}

/// Decode one payload starting at the buffer's cursor.
///
/// Truncated fields decode as empty or zero rather than failing.
pub fn read_from_buffer(buffer: &mut WireBuffer) -> Result<DecodedRecord, CodecError> {
    let version = buffer.read_u8();
    if version != MESSAGE_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let width_byte = buffer.read_u8();
    let width = CharWidth::from_byte(width_byte)
        .ok_or(CodecError::UnsupportedCharWidth(width_byte))?;
    let server_name = buffer.read_string(width);
    let logger = buffer.read_string(width);
    let level = FemtoLevel::from_wire_code(buffer.read_u32());
    let ndc = buffer.read_string(width);
    let message = buffer.read_string(width);
    let thread = buffer.read_string(width);
    let secs = buffer.read_u32();
    let micros = buffer.read_u32();
    let filename = buffer.read_string(width);
    let line_number = buffer.read_u32();
    let function = buffer.read_string(width);
    let metadata = RecordMetadata {
        ndc,
        thread,
        timestamp: RecordMetadata::timestamp_from_parts(secs, micros),
        filename,
        line_number,
        function,
    };
    Ok(DecodedRecord {
        server_name,
        record: FemtoLogRecord {
            logger,
            level,
            message,
            metadata,
        },
    })
}

/// Encode `record` into `scratch`, then wrap it in a length-prefixed frame.
///
/// `scratch` is cleared first; its capacity bounds the payload size.
pub fn frame_record(
    scratch: &mut WireBuffer,
    record: &FemtoLogRecord,
    server_name: &str,
) -> Result<Vec<u8>, BufferError> {
    scratch.clear();
    convert_to_buffer(scratch, record, server_name)?;
    let payload = scratch.as_bytes();
    let len = u32::try_from(payload.len()).map_err(|_| BufferError::Overflow {
        cursor: 0,
        needed: payload.len(),
        capacity: MAX_MESSAGE_SIZE,
    })?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Capacity of the scratch buffer used for one payload.
pub const MAX_PAYLOAD_SIZE: usize = MAX_MESSAGE_SIZE - FRAME_HEADER_SIZE;

/// Validate a received frame length.
pub fn check_frame_len(len: u32) -> Result<usize, CodecError> {
    let len = len as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Err(CodecError::FrameTooLarge(len));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::time::{Duration, UNIX_EPOCH};

    #[fixture]
    fn record() -> FemtoLogRecord {
        let metadata = RecordMetadata {
            ndc: "req=9".into(),
            thread: "worker-1".into(),
            timestamp: UNIX_EPOCH + Duration::new(1_700_000_000, 250_000_000),
            filename: "main.rs".into(),
            line_number: 42,
            function: "main".into(),
        };
        FemtoLogRecord::with_metadata("app.db", FemtoLevel::Error, "query failed", metadata)
    }

    #[rstest]
    fn payload_starts_with_version_and_width(record: FemtoLogRecord) {
        let mut buffer = WireBuffer::with_capacity(MAX_PAYLOAD_SIZE);
        convert_to_buffer(&mut buffer, &record, "host-a").expect("fits");
        assert_eq!(&buffer.as_bytes()[..6], &[3, 1, 0, 0, 0, 6]);
        assert_eq!(&buffer.as_bytes()[6..12], b"host-a");
    }

    #[rstest]
    fn decodes_what_was_encoded(record: FemtoLogRecord) {
        let mut buffer = WireBuffer::with_capacity(MAX_PAYLOAD_SIZE);
        convert_to_buffer(&mut buffer, &record, "host-a").expect("fits");
        buffer.rewind();
        let decoded = read_from_buffer(&mut buffer).expect("valid payload");
        assert_eq!(decoded.server_name, "host-a");
        assert_eq!(decoded.record, record);
    }

    #[rstest]
    fn frame_carries_payload_length(record: FemtoLogRecord) {
        let mut scratch = WireBuffer::with_capacity(MAX_PAYLOAD_SIZE);
        let frame = frame_record(&mut scratch, &record, "h").expect("fits");
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - FRAME_HEADER_SIZE);
        assert_eq!(check_frame_len(len as u32), Ok(len));
    }

    #[rstest]
    fn oversized_message_is_rejected(record: FemtoLogRecord) {
        let big = FemtoLogRecord {
            message: "x".repeat(MAX_MESSAGE_SIZE),
            ..record
        };
        let mut scratch = WireBuffer::with_capacity(MAX_PAYLOAD_SIZE);
        assert!(frame_record(&mut scratch, &big, "h").is_err());
    }

    #[rstest]
    fn wrong_version_is_reported() {
        let mut buffer = WireBuffer::from_bytes(&[2, 1]);
        assert_eq!(
            read_from_buffer(&mut buffer),
            Err(CodecError::UnsupportedVersion(2))
        );
    }

    #[rstest]
    fn oversized_frame_length_is_rejected() {
        assert_eq!(
            check_frame_len(u32::MAX),
            Err(CodecError::FrameTooLarge(u32::MAX as usize))
        );
    }
}
