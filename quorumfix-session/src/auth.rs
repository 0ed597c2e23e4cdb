/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Authentication seam for acceptor logons.

use quorumfix_core::types::SessionKey;
use quorumfix_tagvalue::DecodedMessage;

/// Credential check applied by an acceptor before answering a Logon.
pub trait AuthenticationStrategy: Send + Sync {
    /// Decides whether the logon identified by `key` may establish a session.
    ///
    /// # Arguments
    /// * `key` - The session key carried by the logon header
    /// * `logon` - The full decoded Logon, for credential fields
    fn authenticate(&self, key: &SessionKey, logon: &DecodedMessage) -> bool;
}

/// Accepts every logon. The default for closed deployments and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AuthenticationStrategy for AcceptAll {
    fn authenticate(&self, _key: &SessionKey, _logon: &DecodedMessage) -> bool {
        true
    }
}

/// Accepts logons whose sender comp id is on an allow list.
#[derive(Debug, Clone, Default)]
pub struct SenderAllowList {
    allowed: Vec<String>,
}

impl SenderAllowList {
    /// Creates an allow list from sender comp ids.
    #[must_use]
    pub fn new(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl AuthenticationStrategy for SenderAllowList {
    fn authenticate(&self, key: &SessionKey, _logon: &DecodedMessage) -> bool {
        self.allowed
            .iter()
            .any(|id| id == key.sender_comp_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumfix_tagvalue::{FixEncoder, tags};

    fn logon(sender: &str) -> DecodedMessage {
        let mut encoder = FixEncoder::new("FIX.4.4");
        encoder.put_str(tags::MSG_TYPE, "A");
        encoder.put_str(tags::SENDER_COMP_ID, sender);
        encoder.put_str(tags::TARGET_COMP_ID, "GW");
        encoder.put_uint(tags::MSG_SEQ_NUM, 1);
        encoder.put_uint(tags::HEART_BT_INT, 30);
        let frame = encoder.finish();
        DecodedMessage::decode(&frame, true).unwrap()
    }

    #[test]
    fn test_accept_all() {
        let msg = logon("ANYONE");
        let key = msg.session_key().unwrap();
        assert!(AcceptAll.authenticate(&key, &msg));
    }

    #[test]
    fn test_allow_list() {
        let strategy = SenderAllowList::new(["DESK1", "DESK2"]);

        let good = logon("DESK1");
        assert!(strategy.authenticate(&good.session_key().unwrap(), &good));

        let bad = logon("INTRUDER");
        assert!(!strategy.authenticate(&bad.session_key().unwrap(), &bad));
    }
}
