//! Delegation tracker: scoped recorder for one agent invocation
//!
//! A tracker is opened by the collector when a delegation starts and
//! finalized exactly once when it ends, producing exactly one immutable
//! `AgentEvent`. Setters after finalization fail with
//! `TrackerAlreadyFinalized` so a stale handle can never corrupt a recorded
//! event.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::errors::{MetricsError, Result};
use crate::model::{AgentEvent, AgentStatus};
use crate::scoring;

/// Short-lived recorder for a single delegation
#[derive(Debug)]
pub struct DelegationTracker {
    agent_name: String,
    session_id: String,
    ticket_key: Option<String>,
    started_at: DateTime<Utc>,
    input_tokens: u64,
    output_tokens: u64,
    model_used: Option<String>,
    artifacts: Vec<String>,
    contribution_xp: i64,
    status: AgentStatus,
    error_message: Option<String>,
    finalized: bool,
}

impl DelegationTracker {
    /// Open a tracker bound to the active session
    ///
    /// Empty ticket keys are normalized to "no ticket" so they never pollute
    /// the session's tickets-worked set.
    pub(crate) fn open(agent_name: &str, session_id: &str, ticket_key: Option<&str>) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            session_id: session_id.to_string(),
            ticket_key: ticket_key.filter(|key| !key.is_empty()).map(String::from),
            started_at: Utc::now(),
            input_tokens: 0,
            output_tokens: 0,
            model_used: None,
            artifacts: Vec::new(),
            contribution_xp: 0,
            status: AgentStatus::Success,
            error_message: None,
            finalized: false,
        }
    }

    /// Agent name this tracker records for
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Overwrite the token counts for this delegation
    pub fn set_tokens(&mut self, input_tokens: u64, output_tokens: u64) -> Result<()> {
        self.ensure_open()?;
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        Ok(())
    }

    /// Record which model served the delegation
    pub fn set_model(&mut self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.model_used = Some(name.to_string());
        Ok(())
    }

    /// Append an artifact reference, e.g. "file:metrics.rs" or "pr:#42"
    ///
    /// Duplicates are tolerated; order is preserved.
    pub fn add_artifact(&mut self, reference: &str) -> Result<()> {
        self.ensure_open()?;
        self.artifacts.push(reference.to_string());
        Ok(())
    }

    /// Register an explicit contribution and accumulate its XP award
    ///
    /// Fails with `UnknownContributionKind` for kinds outside the award
    /// table, before any state changes.
    pub fn add_contribution(&mut self, kind: &str) -> Result<()> {
        self.ensure_open()?;
        self.contribution_xp += scoring::xp_for_contribution(kind)?;
        Ok(())
    }

    /// Mark the delegation failed with an error message
    pub fn set_error(&mut self, message: &str) -> Result<()> {
        self.ensure_open()?;
        self.status = AgentStatus::Error;
        self.error_message = Some(message.to_string());
        Ok(())
    }

    /// Override the delegation status, for timeout/blocked outcomes
    ///
    /// Absent any explicit status the delegation finalizes as `success`.
    pub fn set_status(&mut self, status: AgentStatus) -> Result<()> {
        self.ensure_open()?;
        self.status = status;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finalized {
            Err(MetricsError::TrackerAlreadyFinalized(
                self.agent_name.clone(),
            ))
        } else {
            Ok(())
        }
    }

    /// Close the tracker and produce its immutable event
    ///
    /// Duration comes from the open/close timestamps; cost from the token
    /// counts and the collector-supplied pricing policy. A second call fails
    /// with `TrackerAlreadyFinalized`.
    pub(crate) fn finalize(&mut self, pricing: &PricingConfig) -> Result<AgentEvent> {
        self.ensure_open()?;
        self.finalized = true;

        let ended_at = Utc::now();
        let duration_seconds =
            (ended_at - self.started_at).num_milliseconds() as f64 / 1000.0;

        Ok(AgentEvent {
            event_id: Uuid::new_v4().to_string(),
            agent_name: self.agent_name.clone(),
            session_id: self.session_id.clone(),
            ticket_key: self.ticket_key.clone(),
            started_at: self.started_at,
            ended_at,
            duration_seconds,
            status: self.status,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            total_tokens: self.input_tokens + self.output_tokens,
            estimated_cost_usd: pricing.estimate_cost(self.input_tokens, self.output_tokens),
            artifacts: self.artifacts.clone(),
            error_message: self.error_message.clone(),
            model_used: self.model_used.clone(),
            contribution_xp: self.contribution_xp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tracker() -> DelegationTracker {
        DelegationTracker::open("coding", "session-1", Some("AI-50"))
    }

    #[test]
    fn test_defaults_to_success_with_zero_tokens() {
        let mut tracker = open_tracker();
        let event = tracker.finalize(&PricingConfig::default()).unwrap();

        assert_eq!(event.agent_name, "coding");
        assert_eq!(event.session_id, "session-1");
        assert_eq!(event.ticket_key.as_deref(), Some("AI-50"));
        assert_eq!(event.status, AgentStatus::Success);
        assert_eq!(event.input_tokens, 0);
        assert_eq!(event.output_tokens, 0);
        assert_eq!(event.total_tokens, 0);
        assert!(event.estimated_cost_usd.abs() < f64::EPSILON);
        assert!(event.artifacts.is_empty());
        assert!(event.error_message.is_none());
        assert!(event.duration_seconds >= 0.0);
    }

    #[test]
    fn test_tokens_and_cost() {
        let mut tracker = open_tracker();
        tracker.set_tokens(1000, 500).unwrap();
        let event = tracker.finalize(&PricingConfig::default()).unwrap();

        assert_eq!(event.total_tokens, 1500);
        // (1000/1000 * 0.003) + (500/1000 * 0.015) = 0.0105
        assert!((event.estimated_cost_usd - 0.0105).abs() < 0.0001);
    }

    #[test]
    fn test_set_tokens_overwrites() {
        let mut tracker = open_tracker();
        tracker.set_tokens(100, 100).unwrap();
        tracker.set_tokens(1234, 5678).unwrap();
        let event = tracker.finalize(&PricingConfig::default()).unwrap();

        assert_eq!(event.input_tokens, 1234);
        assert_eq!(event.output_tokens, 5678);
        assert_eq!(event.total_tokens, 6912);
    }

    #[test]
    fn test_artifacts_preserve_order_and_duplicates() {
        let mut tracker = open_tracker();
        tracker.add_artifact("file:a.rs").unwrap();
        tracker.add_artifact("commit:abc123").unwrap();
        tracker.add_artifact("file:a.rs").unwrap();
        let event = tracker.finalize(&PricingConfig::default()).unwrap();

        assert_eq!(event.artifacts, vec!["file:a.rs", "commit:abc123", "file:a.rs"]);
    }

    #[test]
    fn test_set_error_marks_status() {
        let mut tracker = open_tracker();
        tracker.set_error("Authentication failed").unwrap();
        let event = tracker.finalize(&PricingConfig::default()).unwrap();

        assert_eq!(event.status, AgentStatus::Error);
        assert_eq!(event.error_message.as_deref(), Some("Authentication failed"));
    }

    #[test]
    fn test_set_status_timeout() {
        let mut tracker = open_tracker();
        tracker.set_status(AgentStatus::Timeout).unwrap();
        let event = tracker.finalize(&PricingConfig::default()).unwrap();

        assert_eq!(event.status, AgentStatus::Timeout);
    }

    #[test]
    fn test_contributions_accumulate() {
        let mut tracker = open_tracker();
        tracker.add_contribution("commit").unwrap();
        tracker.add_contribution("pr_merged").unwrap();
        let event = tracker.finalize(&PricingConfig::default()).unwrap();

        assert_eq!(event.contribution_xp, 35);
    }

    #[test]
    fn test_unknown_contribution_rejected() {
        let mut tracker = open_tracker();
        let err = tracker.add_contribution("celebration").unwrap_err();
        assert!(matches!(err, MetricsError::UnknownContributionKind(_)));
        // Nothing was accumulated
        let event = tracker.finalize(&PricingConfig::default()).unwrap();
        assert_eq!(event.contribution_xp, 0);
    }

    #[test]
    fn test_setters_fail_after_finalize() {
        let mut tracker = open_tracker();
        tracker.finalize(&PricingConfig::default()).unwrap();

        assert!(matches!(
            tracker.set_tokens(1, 1).unwrap_err(),
            MetricsError::TrackerAlreadyFinalized(_)
        ));
        assert!(matches!(
            tracker.add_artifact("file:x").unwrap_err(),
            MetricsError::TrackerAlreadyFinalized(_)
        ));
        assert!(matches!(
            tracker.set_error("late").unwrap_err(),
            MetricsError::TrackerAlreadyFinalized(_)
        ));
        assert!(matches!(
            tracker.finalize(&PricingConfig::default()).unwrap_err(),
            MetricsError::TrackerAlreadyFinalized(_)
        ));
    }

    #[test]
    fn test_empty_ticket_key_normalized() {
        let mut tracker = DelegationTracker::open("coding", "session-1", Some(""));
        let event = tracker.finalize(&PricingConfig::default()).unwrap();
        assert!(event.ticket_key.is_none());
    }
}
