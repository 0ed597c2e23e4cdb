/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session-level tag numbers and message-type classification.

/// FIX tag numbers interpreted by the session layer.
pub mod tags {
    /// BeginSeqNo (ResendRequest range start).
    pub const BEGIN_SEQ_NO: u32 = 7;
    /// BeginString.
    pub const BEGIN_STRING: u32 = 8;
    /// BodyLength.
    pub const BODY_LENGTH: u32 = 9;
    /// CheckSum.
    pub const CHECK_SUM: u32 = 10;
    /// EndSeqNo (ResendRequest range end, 0 = infinity).
    pub const END_SEQ_NO: u32 = 16;
    /// MsgSeqNum.
    pub const MSG_SEQ_NUM: u32 = 34;
    /// MsgType.
    pub const MSG_TYPE: u32 = 35;
    /// NewSeqNo (SequenceReset).
    pub const NEW_SEQ_NO: u32 = 36;
    /// PossDupFlag.
    pub const POSS_DUP_FLAG: u32 = 43;
    /// RefSeqNum (Reject).
    pub const REF_SEQ_NUM: u32 = 45;
    /// SenderCompID.
    pub const SENDER_COMP_ID: u32 = 49;
    /// SenderSubID.
    pub const SENDER_SUB_ID: u32 = 50;
    /// SendingTime.
    pub const SENDING_TIME: u32 = 52;
    /// TargetCompID.
    pub const TARGET_COMP_ID: u32 = 56;
    /// TargetSubID.
    pub const TARGET_SUB_ID: u32 = 57;
    /// Text.
    pub const TEXT: u32 = 58;
    /// EncryptMethod (Logon).
    pub const ENCRYPT_METHOD: u32 = 98;
    /// HeartBtInt (Logon).
    pub const HEART_BT_INT: u32 = 108;
    /// TestReqID (TestRequest / Heartbeat).
    pub const TEST_REQ_ID: u32 = 112;
    /// OrigSendingTime (resent messages).
    pub const ORIG_SENDING_TIME: u32 = 122;
    /// GapFillFlag (SequenceReset).
    pub const GAP_FILL_FLAG: u32 = 123;
    /// ResetSeqNumFlag (Logon).
    pub const RESET_SEQ_NUM_FLAG: u32 = 141;
    /// SenderLocationID.
    pub const SENDER_LOCATION_ID: u32 = 142;
}

/// Classification of a FIX message by its MsgType (tag 35).
///
/// The session layer handles the seven admin types; everything else is
/// business traffic that passes through opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    /// Heartbeat (`0`).
    Heartbeat,
    /// TestRequest (`1`).
    TestRequest,
    /// ResendRequest (`2`).
    ResendRequest,
    /// Reject (`3`).
    Reject,
    /// SequenceReset (`4`).
    SequenceReset,
    /// Logout (`5`).
    Logout,
    /// Logon (`A`).
    Logon,
    /// Any application-level message type.
    Business,
}

impl MsgType {
    /// Classifies the raw MsgType field value.
    #[must_use]
    pub fn classify(value: &[u8]) -> Self {
        match value {
            b"0" => Self::Heartbeat,
            b"1" => Self::TestRequest,
            b"2" => Self::ResendRequest,
            b"3" => Self::Reject,
            b"4" => Self::SequenceReset,
            b"5" => Self::Logout,
            b"A" => Self::Logon,
            _ => Self::Business,
        }
    }

    /// Returns the wire value for an admin type.
    ///
    /// # Panics
    /// Never panics; [`MsgType::Business`] has no single wire value and
    /// returns an empty slice.
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Heartbeat => b"0",
            Self::TestRequest => b"1",
            Self::ResendRequest => b"2",
            Self::Reject => b"3",
            Self::SequenceReset => b"4",
            Self::Logout => b"5",
            Self::Logon => b"A",
            Self::Business => b"",
        }
    }

    /// Returns true for the seven session-level admin types.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        !matches!(self, Self::Business)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_admin_types() {
        assert_eq!(MsgType::classify(b"0"), MsgType::Heartbeat);
        assert_eq!(MsgType::classify(b"1"), MsgType::TestRequest);
        assert_eq!(MsgType::classify(b"2"), MsgType::ResendRequest);
        assert_eq!(MsgType::classify(b"3"), MsgType::Reject);
        assert_eq!(MsgType::classify(b"4"), MsgType::SequenceReset);
        assert_eq!(MsgType::classify(b"5"), MsgType::Logout);
        assert_eq!(MsgType::classify(b"A"), MsgType::Logon);
    }

    #[test]
    fn test_classify_business() {
        assert_eq!(MsgType::classify(b"D"), MsgType::Business);
        assert_eq!(MsgType::classify(b"AE"), MsgType::Business);
        assert!(!MsgType::classify(b"8").is_admin());
        assert!(MsgType::classify(b"A").is_admin());
    }

    #[test]
    fn test_wire_round_trip() {
        for mt in [
            MsgType::Heartbeat,
            MsgType::TestRequest,
            MsgType::ResendRequest,
            MsgType::Reject,
            MsgType::SequenceReset,
            MsgType::Logout,
            MsgType::Logon,
        ] {
            assert_eq!(MsgType::classify(mt.as_bytes()), mt);
        }
    }
}
