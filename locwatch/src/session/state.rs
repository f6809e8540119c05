//! Session lifecycle states.

use serde::Serialize;

/// Lifecycle of one provider update stream.
///
/// ```text
/// Idle ──start──► Requesting ──UpdatesStarted / first fix──► Streaming
///   ▲                 │                                          │
///   │                 └──────────────stop─────────┬──────────────┘
///   │                                             ▼
///   └──────────────UpdatesStopped──────────── Stopping
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    /// `start_updates` issued, waiting for confirmation.
    Requesting,
    /// Provider confirmed; fixes are flowing.
    Streaming,
    /// `stop_updates` issued, waiting for confirmation.
    Stopping,
}

impl SessionState {
    /// Requesting or Streaming.
    #[inline]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Requesting | Self::Streaming)
    }

    /// Static name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Requesting => "Requesting",
            Self::Streaming => "Streaming",
            Self::Stopping => "Stopping",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do once the provider confirms a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Subscribers arrived while stopping; start again.
    Restart,
    /// Nobody is bound; the session can be dropped.
    Idle,
    /// The session was not stopping; the confirmation is stale.
    Ignored,
}
