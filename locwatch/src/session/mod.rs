//! Acquisition sessions.
//!
//! An [`AcquisitionSession`] is the live handle to one provider update stream
//! at one accuracy tier. Sessions are shared: every subscription whose needs
//! the tier covers binds to it, and the session stops when the last one
//! leaves.
//!
//! # Module Structure
//!
//! - `state`: [`SessionState`] lifecycle
//! - `acquisition`: the per-tier session and its start/stop serialization
//! - `table`: [`SessionTable`], at most one session per tier
//! - `policy`: [`RetryPolicy`] for transient start failures

mod acquisition;
mod policy;
mod state;
mod table;

pub use acquisition::AcquisitionSession;
pub use policy::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_SECS,
    DEFAULT_START_ATTEMPTS,
};
pub use state::{SessionState, StopOutcome};
pub use table::{SessionSnapshot, SessionTable};
