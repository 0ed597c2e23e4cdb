/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error handler seam.
//!
//! One process-wide handler, passed explicitly to every component that can
//! fail outside session-protocol recovery. The session machine itself never
//! reports here; it resolves protocol conditions as transitions.

use parking_lot::Mutex;
use quorumfix_core::error::GatewayError;
use tracing::{error, warn};

/// Destination for unrecoverable and operational errors.
pub trait ErrorHandler: Send + Sync {
    /// Reports one error.
    fn on_error(&self, error: &GatewayError);
}

/// Handler logging through `tracing`: fatal faults at error level,
/// everything else at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn on_error(&self, err: &GatewayError) {
        if err.is_fatal() {
            error!(%err, "fatal gateway error");
        } else {
            warn!(%err, "gateway error");
        }
    }
}

/// Handler collecting error strings, for tests.
#[derive(Debug, Default)]
pub struct CollectingErrorHandler {
    errors: Mutex<Vec<String>>,
}

impl CollectingErrorHandler {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of collected error strings.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Number of collected errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// True when nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorHandler for CollectingErrorHandler {
    fn on_error(&self, err: &GatewayError) {
        self.errors.lock().push(err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumfix_core::error::StoreError;

    #[test]
    fn test_collecting_handler() {
        let handler = CollectingErrorHandler::new();
        assert!(handler.is_empty());

        handler.on_error(&GatewayError::Store(StoreError::Io("disk gone".into())));
        assert_eq!(handler.len(), 1);
        assert!(handler.errors()[0].contains("disk gone"));
    }

    #[test]
    fn test_tracing_handler_accepts_fatal() {
        // Only checks the call path; output goes to the subscriber.
        TracingErrorHandler.on_error(&GatewayError::Fatal {
            reason: "corrupt archive".into(),
        });
    }
}
