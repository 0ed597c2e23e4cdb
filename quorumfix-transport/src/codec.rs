/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Tokio codec for FIX message framing.
//!
//! Framing delegates to [`split_frame`] so the codec, the resend store and
//! the replay path agree on frame boundaries. Checksum validation is
//! optional here; the session layer decodes and validates the fields.

use bytes::{BufMut, Bytes, BytesMut};
use quorumfix_core::error::DecodeError;
use quorumfix_tagvalue::checksum::{calculate_checksum, parse_checksum};
use quorumfix_tagvalue::decoder::{CHECKSUM_TRAILER_LEN, split_frame};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Errors that can occur during codec operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stream cannot begin a valid FIX frame.
    #[error("framing error: {0}")]
    Framing(#[from] DecodeError),

    /// Checksum mismatch.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    ChecksumMismatch {
        /// Calculated checksum.
        calculated: u8,
        /// Declared checksum in message.
        declared: u8,
    },

    /// Message exceeds maximum size.
    #[error("message too large: {size} bytes exceeds maximum {max_size}")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max_size: usize,
    },

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tokio codec producing whole FIX frames.
#[derive(Debug, Clone)]
pub struct FixFrameCodec {
    /// Maximum message size in bytes.
    max_message_size: usize,
    /// Whether to validate checksums while framing.
    validate_checksum: bool,
}

impl FixFrameCodec {
    /// Creates a codec with default settings (1 MiB max, checksums on).
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_message_size: 1024 * 1024,
            validate_checksum: true,
        }
    }

    /// Sets the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Sets whether to validate checksums.
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }
}

impl Default for FixFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FixFrameCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() > self.max_message_size {
            return Err(CodecError::MessageTooLarge {
                size: src.len(),
                max_size: self.max_message_size,
            });
        }

        let Some(frame_len) = split_frame(src)? else {
            return Ok(None);
        };
        if frame_len > self.max_message_size {
            return Err(CodecError::MessageTooLarge {
                size: frame_len,
                max_size: self.max_message_size,
            });
        }

        let frame = src.split_to(frame_len);

        if self.validate_checksum {
            let trailer_start = frame_len - CHECKSUM_TRAILER_LEN;
            let declared = parse_checksum(&frame[trailer_start + 3..trailer_start + 6])
                .ok_or(DecodeError::InvalidBodyLength)?;
            let calculated = calculate_checksum(&frame[..trailer_start]);
            if calculated != declared {
                return Err(CodecError::ChecksumMismatch {
                    calculated,
                    declared,
                });
            }
        }

        Ok(Some(frame))
    }
}

impl Encoder<Bytes> for FixFrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if frame.len() > self.max_message_size {
            return Err(CodecError::MessageTooLarge {
                size: frame.len(),
                max_size: self.max_message_size,
            });
        }
        dst.put_slice(&frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumfix_core::types::Timestamp;
    use quorumfix_tagvalue::{FixEncoder, tags};

    fn heartbeat_frame() -> Bytes {
        let mut encoder = FixEncoder::new("FIX.4.4");
        encoder.put_str(tags::MSG_TYPE, "0");
        encoder.put_uint(tags::MSG_SEQ_NUM, 1);
        encoder.put_timestamp(tags::SENDING_TIME, Timestamp::from_millis(0));
        encoder.finish().freeze()
    }

    #[test]
    fn test_decode_waits_for_whole_frame() {
        let frame = heartbeat_frame();
        let mut codec = FixFrameCodec::new();
        let mut buffer = BytesMut::new();

        buffer.extend_from_slice(&frame[..10]);
        assert!(codec.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(&frame[10..]);
        let decoded = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(decoded.as_ref(), frame.as_ref());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let frame = heartbeat_frame();
        let mut codec = FixFrameCodec::new();
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&frame);
        buffer.extend_from_slice(&frame);

        assert!(codec.decode(&mut buffer).unwrap().is_some());
        assert!(codec.decode(&mut buffer).unwrap().is_some());
        assert!(codec.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut codec = FixFrameCodec::new();
        let mut buffer = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        assert!(codec.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let frame = heartbeat_frame();
        let mut codec = FixFrameCodec::new();
        let mut buffer = BytesMut::from(frame.as_ref());
        let len = buffer.len();
        buffer[len - 2] = if buffer[len - 2] == b'0' { b'1' } else { b'0' };

        assert!(matches!(
            codec.decode(&mut buffer),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_max_size_enforced() {
        let frame = heartbeat_frame();
        let mut codec = FixFrameCodec::new().with_max_message_size(8);
        let mut buffer = BytesMut::from(frame.as_ref());
        assert!(matches!(
            codec.decode(&mut buffer),
            Err(CodecError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_encoder_passthrough() {
        let frame = heartbeat_frame();
        let mut codec = FixFrameCodec::new();
        let mut out = BytesMut::new();
        codec.encode(frame.clone(), &mut out).unwrap();
        assert_eq!(out.as_ref(), frame.as_ref());
    }
}
