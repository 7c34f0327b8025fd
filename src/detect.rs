//! Injected capability seam for achievement and strength/weakness detection
//!
//! The collector depends only on this trait, so detection heuristics can
//! evolve independently and be tested in isolation. Detectors are invoked
//! once per recorded event with the already-updated profile and the relevant
//! event history; whatever they return is merged into the profile's sets.

use crate::model::{AgentEvent, AgentProfile};

/// Strengths and weaknesses reported by a signal detector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalReport {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

/// External detection hooks invoked by the collector after each event
pub trait Detector {
    /// Achievement identifiers newly earned by this event
    ///
    /// `agent_history` and `session_history` both include the event being
    /// scored, oldest first.
    fn detect_achievements(
        &self,
        profile: &AgentProfile,
        event: &AgentEvent,
        agent_history: &[&AgentEvent],
        session_history: &[&AgentEvent],
    ) -> Vec<String>;

    /// Strengths and weaknesses derived from a rolling window of the agent's
    /// most recent events (window size `config::ROLLING_WINDOW`, newest last)
    fn detect_signals(&self, profile: &AgentProfile, window: &[&AgentEvent]) -> SignalReport;
}

/// Detector that never awards anything; the default when none is wired up
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDetector;

impl Detector for NoopDetector {
    fn detect_achievements(
        &self,
        _profile: &AgentProfile,
        _event: &AgentEvent,
        _agent_history: &[&AgentEvent],
        _session_history: &[&AgentEvent],
    ) -> Vec<String> {
        Vec::new()
    }

    fn detect_signals(&self, _profile: &AgentProfile, _window: &[&AgentEvent]) -> SignalReport {
        SignalReport::default()
    }
}
