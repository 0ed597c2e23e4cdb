/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX frame location and decoding.
//!
//! [`split_frame`] locates whole messages in a byte stream for the transport
//! codec. [`DecodedMessage`] extracts the typed, session-relevant view of a
//! single frame; unknown body tags are skipped so business messages pass
//! through with only their header interpreted.

use crate::checksum::{calculate_checksum, parse_checksum};
use crate::encoder::SOH;
use crate::fields::{MsgType, tags};
use memchr::memchr;
use quorumfix_core::error::DecodeError;
use quorumfix_core::types::{CompId, SeqNum, SessionKey, Timestamp};

/// Length of the `10=ddd\x01` trailer.
pub const CHECKSUM_TRAILER_LEN: usize = 7;

/// Iterator over the `tag=value` fields of a FIX frame.
#[derive(Debug)]
pub struct FieldIter<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> FieldIter<'a> {
    /// Creates an iterator over the given frame bytes.
    #[inline]
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, offset: 0 }
    }
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.input[self.offset.min(self.input.len())..];
        if remaining.is_empty() {
            return None;
        }

        let eq_pos = memchr(b'=', remaining)?;
        let tag = parse_uint(&remaining[..eq_pos])?;
        let tag = u32::try_from(tag).ok()?;

        let value_start = eq_pos + 1;
        let soh_pos = memchr(SOH, &remaining[value_start..])?;
        let value = &remaining[value_start..value_start + soh_pos];

        self.offset += value_start + soh_pos + 1;
        Some((tag, value))
    }
}

/// Parses an unsigned ASCII integer.
#[inline]
#[must_use]
pub fn parse_uint(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || bytes.len() > 19 {
        return None;
    }
    let mut result: u64 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        result = result.checked_mul(10)?.checked_add((b - b'0') as u64)?;
    }
    Some(result)
}

/// Locates one complete FIX frame at the start of `buf`.
///
/// # Returns
/// - `Ok(Some(len))` when a whole frame of `len` bytes is present
/// - `Ok(None)` when more data is needed
///
/// # Errors
/// Returns `DecodeError` when the buffer cannot begin a valid frame, so the
/// transport can drop the connection instead of waiting forever.
pub fn split_frame(buf: &[u8]) -> Result<Option<usize>, DecodeError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    if &buf[..2] != b"8=" {
        return Err(DecodeError::InvalidBeginString);
    }

    let Some(begin_end) = memchr(SOH, buf) else {
        return Ok(None);
    };

    let rest = &buf[begin_end + 1..];
    if rest.len() < 2 {
        return Ok(None);
    }
    if &rest[..2] != b"9=" {
        return Err(DecodeError::InvalidBodyLength);
    }
    let Some(len_end) = memchr(SOH, rest) else {
        return Ok(None);
    };
    let body_length =
        parse_uint(&rest[2..len_end]).ok_or(DecodeError::InvalidBodyLength)? as usize;

    let body_start = begin_end + 1 + len_end + 1;
    let total = body_start + body_length + CHECKSUM_TRAILER_LEN;
    if buf.len() < total {
        return Ok(None);
    }

    let trailer = &buf[body_start + body_length..total];
    if &trailer[..3] != b"10=" || trailer[6] != SOH {
        return Err(DecodeError::InvalidBodyLength);
    }

    Ok(Some(total))
}

/// Typed view of the session-relevant fields of one FIX frame.
///
/// Fields not present on the wire are `None`/`false`. Business messages
/// populate only the header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Message classification from tag 35.
    pub msg_type: MsgType,
    /// MsgSeqNum (tag 34).
    pub msg_seq_num: SeqNum,
    /// PossDupFlag (tag 43).
    pub poss_dup: bool,
    /// SendingTime (tag 52).
    pub sending_time: Option<Timestamp>,
    /// SenderCompID (tag 49).
    pub sender_comp_id: Option<CompId>,
    /// TargetCompID (tag 56).
    pub target_comp_id: Option<CompId>,
    /// SenderSubID (tag 50).
    pub sender_sub_id: Option<CompId>,
    /// TargetSubID (tag 57).
    pub target_sub_id: Option<CompId>,
    /// SenderLocationID (tag 142).
    pub location_id: Option<CompId>,
    /// HeartBtInt in seconds (tag 108, Logon).
    pub heart_bt_int: Option<u64>,
    /// TestReqID (tag 112).
    pub test_req_id: Option<String>,
    /// GapFillFlag (tag 123, SequenceReset).
    pub gap_fill: bool,
    /// ResetSeqNumFlag (tag 141, Logon).
    pub reset_seq_num: bool,
    /// NewSeqNo (tag 36, SequenceReset).
    pub new_seq_no: Option<SeqNum>,
    /// BeginSeqNo (tag 7, ResendRequest).
    pub begin_seq_no: Option<SeqNum>,
    /// EndSeqNo (tag 16, ResendRequest).
    pub end_seq_no: Option<SeqNum>,
    /// RefSeqNum (tag 45, Reject).
    pub ref_seq_num: Option<SeqNum>,
    /// Text (tag 58).
    pub text: Option<String>,
}

impl DecodedMessage {
    /// Decodes one complete frame.
    ///
    /// # Arguments
    /// * `frame` - Exactly one frame as located by [`split_frame`]
    /// * `validate_checksum` - Whether to verify the declared checksum
    ///
    /// # Errors
    /// Returns `DecodeError` on structural faults, checksum mismatch or a
    /// missing MsgType/MsgSeqNum.
    pub fn decode(frame: &[u8], validate_checksum: bool) -> Result<Self, DecodeError> {
        if frame.len() < CHECKSUM_TRAILER_LEN + 4 {
            return Err(DecodeError::Incomplete);
        }

        if validate_checksum {
            let trailer_start = frame.len() - CHECKSUM_TRAILER_LEN;
            if &frame[trailer_start..trailer_start + 3] != b"10=" {
                return Err(DecodeError::Incomplete);
            }
            let declared = parse_checksum(&frame[trailer_start + 3..trailer_start + 6])
                .ok_or_else(|| DecodeError::InvalidFieldValue {
                    tag: tags::CHECK_SUM,
                    reason: "invalid checksum format".to_string(),
                })?;
            let calculated = calculate_checksum(&frame[..trailer_start]);
            if calculated != declared {
                return Err(DecodeError::ChecksumMismatch {
                    calculated,
                    declared,
                });
            }
        }

        let mut fields = FieldIter::new(frame);
        match fields.next() {
            Some((tags::BEGIN_STRING, _)) => {}
            _ => return Err(DecodeError::InvalidBeginString),
        }
        match fields.next() {
            Some((tags::BODY_LENGTH, _)) => {}
            _ => return Err(DecodeError::InvalidBodyLength),
        }

        let mut msg_type = None;
        let mut msg_seq_num = None;
        let mut message = Self {
            msg_type: MsgType::Business,
            msg_seq_num: SeqNum::new(0),
            poss_dup: false,
            sending_time: None,
            sender_comp_id: None,
            target_comp_id: None,
            sender_sub_id: None,
            target_sub_id: None,
            location_id: None,
            heart_bt_int: None,
            test_req_id: None,
            gap_fill: false,
            reset_seq_num: false,
            new_seq_no: None,
            begin_seq_no: None,
            end_seq_no: None,
            ref_seq_num: None,
            text: None,
        };

        for (tag, value) in fields {
            match tag {
                tags::MSG_TYPE => msg_type = Some(MsgType::classify(value)),
                tags::MSG_SEQ_NUM => {
                    msg_seq_num = Some(SeqNum::new(parse_required_uint(tag, value)?));
                }
                tags::POSS_DUP_FLAG => message.poss_dup = value == b"Y",
                tags::SENDING_TIME => message.sending_time = parse_timestamp(tag, value)?,
                tags::SENDER_COMP_ID => message.sender_comp_id = parse_comp_id(tag, value)?,
                tags::TARGET_COMP_ID => message.target_comp_id = parse_comp_id(tag, value)?,
                tags::SENDER_SUB_ID => message.sender_sub_id = parse_comp_id(tag, value)?,
                tags::TARGET_SUB_ID => message.target_sub_id = parse_comp_id(tag, value)?,
                tags::SENDER_LOCATION_ID => message.location_id = parse_comp_id(tag, value)?,
                tags::HEART_BT_INT => {
                    message.heart_bt_int = Some(parse_required_uint(tag, value)?);
                }
                tags::TEST_REQ_ID => {
                    message.test_req_id = Some(parse_string(value)?);
                }
                tags::GAP_FILL_FLAG => message.gap_fill = value == b"Y",
                tags::RESET_SEQ_NUM_FLAG => message.reset_seq_num = value == b"Y",
                tags::NEW_SEQ_NO => {
                    message.new_seq_no = Some(SeqNum::new(parse_required_uint(tag, value)?));
                }
                tags::BEGIN_SEQ_NO => {
                    message.begin_seq_no = Some(SeqNum::new(parse_required_uint(tag, value)?));
                }
                tags::END_SEQ_NO => {
                    message.end_seq_no = Some(SeqNum::new(parse_required_uint(tag, value)?));
                }
                tags::REF_SEQ_NUM => {
                    message.ref_seq_num = Some(SeqNum::new(parse_required_uint(tag, value)?));
                }
                tags::TEXT => message.text = Some(parse_string(value)?),
                tags::CHECK_SUM => break,
                _ => {}
            }
        }

        message.msg_type = msg_type.ok_or(DecodeError::MissingMsgType)?;
        message.msg_seq_num = msg_seq_num.ok_or(DecodeError::MissingRequiredField {
            tag: tags::MSG_SEQ_NUM,
        })?;

        Ok(message)
    }

    /// Builds the session key carried by this message's header, as written
    /// by the peer (peer's sender first).
    ///
    /// # Returns
    /// `None` if either comp id is absent.
    #[must_use]
    pub fn session_key(&self) -> Option<SessionKey> {
        let mut key = SessionKey::new(
            self.sender_comp_id.clone()?,
            self.target_comp_id.clone()?,
        );
        if let Some(id) = &self.sender_sub_id {
            key = key.with_sender_sub_id(id.clone());
        }
        if let Some(id) = &self.target_sub_id {
            key = key.with_target_sub_id(id.clone());
        }
        if let Some(id) = &self.location_id {
            key = key.with_location_id(id.clone());
        }
        Some(key)
    }
}

fn parse_required_uint(tag: u32, value: &[u8]) -> Result<u64, DecodeError> {
    parse_uint(value).ok_or_else(|| DecodeError::InvalidFieldValue {
        tag,
        reason: "not an unsigned integer".to_string(),
    })
}

fn parse_comp_id(tag: u32, value: &[u8]) -> Result<Option<CompId>, DecodeError> {
    let s = std::str::from_utf8(value)?;
    CompId::new(s)
        .map(Some)
        .ok_or_else(|| DecodeError::InvalidFieldValue {
            tag,
            reason: "comp id too long".to_string(),
        })
}

fn parse_timestamp(tag: u32, value: &[u8]) -> Result<Option<Timestamp>, DecodeError> {
    let s = std::str::from_utf8(value)?;
    Timestamp::parse_fix(s)
        .map(Some)
        .ok_or_else(|| DecodeError::InvalidFieldValue {
            tag,
            reason: "invalid timestamp".to_string(),
        })
}

fn parse_string(value: &[u8]) -> Result<String, DecodeError> {
    Ok(std::str::from_utf8(value)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::FixEncoder;

    fn logon_frame() -> bytes::BytesMut {
        let mut encoder = FixEncoder::new("FIX.4.4");
        encoder.put_str(tags::MSG_TYPE, "A");
        encoder.put_str(tags::SENDER_COMP_ID, "INIT");
        encoder.put_str(tags::TARGET_COMP_ID, "ACCEPT");
        encoder.put_uint(tags::MSG_SEQ_NUM, 1);
        encoder.put_timestamp(tags::SENDING_TIME, Timestamp::from_millis(1_000));
        encoder.put_uint(tags::ENCRYPT_METHOD, 0);
        encoder.put_uint(tags::HEART_BT_INT, 30);
        encoder.finish()
    }

    #[test]
    fn test_split_frame_whole_message() {
        let frame = logon_frame();
        assert_eq!(split_frame(&frame).unwrap(), Some(frame.len()));
    }

    #[test]
    fn test_split_frame_incomplete() {
        let frame = logon_frame();
        for cut in [1, 5, frame.len() / 2, frame.len() - 1] {
            assert_eq!(split_frame(&frame[..cut]).unwrap(), None, "cut at {cut}");
        }
    }

    #[test]
    fn test_split_frame_garbage_prefix() {
        assert!(matches!(
            split_frame(b"XX=FIX.4.4\x01"),
            Err(DecodeError::InvalidBeginString)
        ));
    }

    #[test]
    fn test_split_frame_two_messages() {
        let one = logon_frame();
        let mut both = one.clone();
        both.extend_from_slice(&one);
        assert_eq!(split_frame(&both).unwrap(), Some(one.len()));
    }

    #[test]
    fn test_decode_logon() {
        let frame = logon_frame();
        let decoded = DecodedMessage::decode(&frame, true).unwrap();

        assert_eq!(decoded.msg_type, MsgType::Logon);
        assert_eq!(decoded.msg_seq_num, SeqNum::new(1));
        assert_eq!(decoded.heart_bt_int, Some(30));
        assert_eq!(decoded.sender_comp_id.as_ref().unwrap().as_str(), "INIT");
        assert!(!decoded.poss_dup);
        assert_eq!(decoded.sending_time, Some(Timestamp::from_millis(1_000)));

        let key = decoded.session_key().unwrap();
        assert_eq!(key.sender_comp_id.as_str(), "INIT");
        assert_eq!(key.target_comp_id.as_str(), "ACCEPT");
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let mut frame = logon_frame();
        let len = frame.len();
        // Corrupt a digit of the declared checksum.
        frame[len - 2] = if frame[len - 2] == b'0' { b'1' } else { b'0' };
        assert!(matches!(
            DecodedMessage::decode(&frame, true),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
        // Without validation the same frame decodes.
        assert!(DecodedMessage::decode(&frame, false).is_ok());
    }

    #[test]
    fn test_decode_missing_seq_num() {
        let mut encoder = FixEncoder::new("FIX.4.4");
        encoder.put_str(tags::MSG_TYPE, "0");
        let frame = encoder.finish();
        assert!(matches!(
            DecodedMessage::decode(&frame, true),
            Err(DecodeError::MissingRequiredField { tag: 34 })
        ));
    }

    #[test]
    fn test_decode_resend_request_fields() {
        let mut encoder = FixEncoder::new("FIX.4.4");
        encoder.put_str(tags::MSG_TYPE, "2");
        encoder.put_uint(tags::MSG_SEQ_NUM, 4);
        encoder.put_uint(tags::BEGIN_SEQ_NO, 2);
        encoder.put_uint(tags::END_SEQ_NO, 0);
        let frame = encoder.finish();

        let decoded = DecodedMessage::decode(&frame, true).unwrap();
        assert_eq!(decoded.msg_type, MsgType::ResendRequest);
        assert_eq!(decoded.begin_seq_no, Some(SeqNum::new(2)));
        assert_eq!(decoded.end_seq_no, Some(SeqNum::new(0)));
    }

    #[test]
    fn test_decode_business_passthrough() {
        let mut encoder = FixEncoder::new("FIX.4.4");
        encoder.put_str(tags::MSG_TYPE, "D");
        encoder.put_uint(tags::MSG_SEQ_NUM, 9);
        encoder.put_str(11, "ORDER-1");
        encoder.put_char(54, '1');
        let frame = encoder.finish();

        let decoded = DecodedMessage::decode(&frame, true).unwrap();
        assert_eq!(decoded.msg_type, MsgType::Business);
        assert_eq!(decoded.msg_seq_num, SeqNum::new(9));
    }

    #[test]
    fn test_parse_uint() {
        assert_eq!(parse_uint(b"0"), Some(0));
        assert_eq!(parse_uint(b"34"), Some(34));
        assert_eq!(parse_uint(b""), None);
        assert_eq!(parse_uint(b"1x"), None);
    }
}
