/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Possible-duplicate rewrite for resent frames.
//!
//! A stored outbound frame cannot be replayed verbatim: FIX requires
//! `PossDupFlag=Y`, the original SendingTime moved to `OrigSendingTime`, a
//! fresh SendingTime, and therefore new BodyLength and CheckSum values.

use crate::decoder::FieldIter;
use crate::encoder::FixEncoder;
use crate::fields::tags;
use bytes::BytesMut;
use quorumfix_core::error::EncodeError;
use quorumfix_core::types::Timestamp;

/// Rewrites a stored frame for resend as a possible duplicate.
///
/// # Arguments
/// * `frame` - The original outbound frame as sent
/// * `now` - The new SendingTime
///
/// # Errors
/// Returns `EncodeError` if the frame lacks a BeginString or SendingTime.
pub fn mark_possible_duplicate(frame: &[u8], now: Timestamp) -> Result<BytesMut, EncodeError> {
    let mut begin_string: Option<&[u8]> = None;
    let mut has_sending_time = false;
    for (tag, value) in FieldIter::new(frame) {
        match tag {
            tags::BEGIN_STRING => begin_string = Some(value),
            tags::SENDING_TIME => has_sending_time = true,
            _ => {}
        }
    }

    let begin_string = begin_string.ok_or(EncodeError::MissingRewriteField {
        tag: tags::BEGIN_STRING,
    })?;
    let begin_string =
        std::str::from_utf8(begin_string).map_err(|_| EncodeError::InvalidFieldValue {
            tag: tags::BEGIN_STRING,
            reason: "begin string is not utf-8".to_string(),
        })?;
    if !has_sending_time {
        return Err(EncodeError::MissingRewriteField {
            tag: tags::SENDING_TIME,
        });
    }

    let mut encoder = FixEncoder::new(begin_string);
    for (tag, value) in FieldIter::new(frame) {
        match tag {
            // Recomputed by finish(), or replaced below.
            tags::BEGIN_STRING
            | tags::BODY_LENGTH
            | tags::CHECK_SUM
            | tags::POSS_DUP_FLAG
            | tags::ORIG_SENDING_TIME => {}
            tags::MSG_TYPE => {
                encoder.put_raw(tag, value);
                encoder.put_bool(tags::POSS_DUP_FLAG, true);
            }
            tags::SENDING_TIME => {
                encoder.put_raw(tags::ORIG_SENDING_TIME, value);
                encoder.put_timestamp(tags::SENDING_TIME, now);
            }
            _ => encoder.put_raw(tag, value),
        }
    }

    Ok(encoder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodedMessage;
    use crate::fields::MsgType;
    use quorumfix_core::types::SeqNum;

    fn business_frame(sending_ms: u64) -> BytesMut {
        let mut encoder = FixEncoder::new("FIX.4.4");
        encoder.put_str(tags::MSG_TYPE, "D");
        encoder.put_str(tags::SENDER_COMP_ID, "GW");
        encoder.put_str(tags::TARGET_COMP_ID, "CLIENT");
        encoder.put_uint(tags::MSG_SEQ_NUM, 12);
        encoder.put_timestamp(tags::SENDING_TIME, Timestamp::from_millis(sending_ms));
        encoder.put_str(11, "ORDER-7");
        encoder.finish()
    }

    #[test]
    fn test_rewrite_sets_poss_dup_and_restamps() {
        let original = business_frame(1_000);
        let resent = mark_possible_duplicate(&original, Timestamp::from_millis(9_000)).unwrap();

        let decoded = DecodedMessage::decode(&resent, true).unwrap();
        assert!(decoded.poss_dup);
        assert_eq!(decoded.msg_type, MsgType::Business);
        assert_eq!(decoded.msg_seq_num, SeqNum::new(12));
        assert_eq!(decoded.sending_time, Some(Timestamp::from_millis(9_000)));

        let text = String::from_utf8_lossy(&resent);
        assert!(text.contains("122=19700101-00:00:01.000\x01"));
        assert!(text.contains("11=ORDER-7\x01"));
    }

    #[test]
    fn test_rewrite_is_idempotent_on_flags() {
        let original = business_frame(1_000);
        let once = mark_possible_duplicate(&original, Timestamp::from_millis(5_000)).unwrap();
        let twice = mark_possible_duplicate(&once, Timestamp::from_millis(6_000)).unwrap();

        let text = String::from_utf8_lossy(&twice);
        assert_eq!(text.matches("43=Y").count(), 1);
        assert_eq!(text.matches("122=").count(), 1);
    }

    #[test]
    fn test_rewrite_requires_sending_time() {
        let mut encoder = FixEncoder::new("FIX.4.4");
        encoder.put_str(tags::MSG_TYPE, "D");
        encoder.put_uint(tags::MSG_SEQ_NUM, 3);
        let frame = encoder.finish();

        assert!(matches!(
            mark_possible_duplicate(&frame, Timestamp::from_millis(1)),
            Err(EncodeError::MissingRewriteField { tag: 52 })
        ));
    }
}
