//! Batch cancellation token.

use crate::utils::Timestamp;
use chrono::Utc;
use parking_lot::RwLock;

/// Why and when a batch was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    /// Reason given by the first caller.
    pub reason: String,
    /// When the request arrived.
    pub requested_at: Timestamp,
}

/// Shared flag the batch driver checks before starting each stage.
///
/// A stage already running is never interrupted. Only the first request is
/// recorded.
#[derive(Debug, Default)]
pub struct CancellationToken {
    state: RwLock<Option<Cancellation>>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns false if it was already requested.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let mut state = self.state.write();
        if state.is_some() {
            return false;
        }
        *state = Some(Cancellation {
            reason: reason.into(),
            requested_at: Utc::now(),
        });
        true
    }

    /// Returns whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.read().is_some()
    }

    /// Returns the recorded request, if any.
    #[must_use]
    pub fn cancellation(&self) -> Option<Cancellation> {
        self.state.read().clone()
    }

    /// Returns the reason of the recorded request.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state.read().as_ref().map(|c| c.reason.clone())
    }
}
