/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session states and roles.
//!
//! The machine is a tagged state enum with a transition-legality function.
//! Transitions are driven at runtime by wire events and timers, so the
//! states carry no data; per-episode data (gap targets, timer origins) lives
//! on the session itself.

use std::fmt;

/// Logical state of a FIX session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Transport connected, logon exchange not started.
    Connected,
    /// Initiator sent Logon, awaiting the reply.
    SentLogon,
    /// Session established, traffic flowing.
    Active,
    /// Gap detected, awaiting resent messages.
    AwaitingResend,
    /// Logout sent, awaiting the confirming Logout.
    AwaitingLogout,
    /// Session over; terminal.
    Disconnected,
    /// Administratively disabled; terminal.
    Disabled,
}

impl SessionState {
    /// Returns a short stable name for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::SentLogon => "SENT_LOGON",
            Self::Active => "ACTIVE",
            Self::AwaitingResend => "AWAITING_RESEND",
            Self::AwaitingLogout => "AWAITING_LOGOUT",
            Self::Disconnected => "DISCONNECTED",
            Self::Disabled => "DISABLED",
        }
    }

    /// Returns true for states that never transition again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Disabled)
    }

    /// Returns true while the logon handshake has completed and the session
    /// exchanges sequenced traffic.
    #[must_use]
    pub const fn is_established(self) -> bool {
        matches!(self, Self::Active | Self::AwaitingResend | Self::AwaitingLogout)
    }

    /// Checks whether a transition to `next` is legal.
    ///
    /// Every non-terminal state may move to `Disconnected` (timeouts,
    /// authentication failures, protocol violations) or to `Disabled`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Self::Disconnected | Self::Disabled) {
            return true;
        }
        matches!(
            (self, next),
            (Self::Connected, Self::SentLogon)
                | (Self::Connected, Self::Active)
                | (Self::SentLogon, Self::Active)
                | (Self::SentLogon, Self::AwaitingResend)
                | (Self::Active, Self::AwaitingResend)
                | (Self::AwaitingResend, Self::Active)
                | (Self::Active, Self::AwaitingLogout)
                | (Self::AwaitingResend, Self::AwaitingLogout)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role a session plays in the logon handshake.
///
/// Entry transitions differ per role; all other behavior is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRole {
    /// Dials out and sends the first Logon.
    Initiator,
    /// Accepts connections and answers inbound Logons.
    Acceptor,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initiator => "initiator",
            Self::Acceptor => "acceptor",
        })
    }
}
