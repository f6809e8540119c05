//! Tier-keyed session table.
//!
//! At most one session exists per tier. A tier absent from the table is Idle.

use std::collections::BTreeMap;

use serde::Serialize;

use super::acquisition::AcquisitionSession;
use super::state::SessionState;
use crate::subscription::AccuracyTier;

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub tier: AccuracyTier,
    pub state: SessionState,
    pub ref_count: usize,
    pub paused: bool,
    pub restart_pending: bool,
    pub retry_pending: bool,
    /// Time since the provider confirmed the stream, if it is streaming.
    pub streaming_ms: Option<u64>,
    pub fixes_received: u64,
}

/// Sessions by tier, strictest first.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: BTreeMap<AccuracyTier, AcquisitionSession>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_mut(&mut self, tier: AccuracyTier) -> Option<&mut AcquisitionSession> {
        self.sessions.get_mut(&tier)
    }

    /// The session for `tier`, created Idle if absent.
    pub fn entry(&mut self, tier: AccuracyTier) -> &mut AcquisitionSession {
        self.sessions
            .entry(tier)
            .or_insert_with(|| AcquisitionSession::new(tier))
    }

    pub fn remove(&mut self, tier: AccuracyTier) -> Option<AcquisitionSession> {
        self.sessions.remove(&tier)
    }

    pub fn tiers(&self) -> Vec<AccuracyTier> {
        self.sessions.keys().copied().collect()
    }

    /// The coarsest wanted session that satisfies `need`.
    ///
    /// Coarsest first keeps power draw down when several sessions could serve.
    pub fn serving(&self, need: AccuracyTier) -> Option<AccuracyTier> {
        self.sessions
            .values()
            .rev()
            .find(|s| s.is_wanted() && s.tier().covers(need))
            .map(|s| s.tier())
    }

    /// Wanted sessions coarser than `tier`, strictest first.
    pub fn coarser_wanted(&self, tier: AccuracyTier) -> Vec<AccuracyTier> {
        self.sessions
            .values()
            .filter(|s| s.is_wanted() && tier.is_stricter_than(s.tier()))
            .map(|s| s.tier())
            .collect()
    }

    /// Tiers whose provider stream is running or being requested.
    pub fn live_tiers(&self) -> Vec<AccuracyTier> {
        self.sessions
            .values()
            .filter(|s| s.state().is_live() && s.start_accepted())
            .map(|s| s.tier())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .values()
            .map(|s| SessionSnapshot {
                tier: s.tier(),
                state: s.state(),
                ref_count: s.ref_count(),
                paused: s.is_paused(),
                restart_pending: s.restart_pending(),
                retry_pending: s.retry_pending(),
                streaming_ms: s
                    .started_at()
                    .map(|at| at.elapsed().as_millis() as u64),
                fixes_received: s.fixes_received(),
            })
            .collect()
    }

    /// Drop every session.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}
