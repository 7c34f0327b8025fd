//! Core data model: events, profiles, session summaries, dashboard state
//!
//! These types map one-to-one onto the persisted JSON document, so field
//! names here are the wire format that the dashboard UI and CLI read.
//! `AgentEvent` and `SessionSummary` are immutable once created;
//! `AgentProfile` is mutated in place by the collector after each event;
//! `DashboardState` is the sole unit of persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::scoring;

/// Schema version written to the metrics file
pub const STATE_VERSION: u32 = 1;

/// Outcome of a single agent delegation
///
/// Failures (`error`/`timeout`/`blocked`) are normal, expected events: they
/// are recorded like any other event, earn zero XP, and reset the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Delegation completed its work
    Success,
    /// Delegation failed with an error
    Error,
    /// Delegation exceeded its time budget
    Timeout,
    /// Delegation could not proceed (permissions, missing input)
    Blocked,
}

impl AgentStatus {
    /// True for any non-success outcome
    pub fn is_failure(self) -> bool {
        !matches!(self, AgentStatus::Success)
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// More work remains; the loop will start another session
    Continue,
    /// The session aborted
    Error,
    /// The run is finished
    Complete,
}

/// Whether a session kicked off the run or continued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Initializer,
    Continuation,
}

/// One delegation record, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Unique event identifier (UUID v4)
    pub event_id: String,
    /// Name of the agent that handled the delegation
    pub agent_name: String,
    /// Session this delegation belongs to
    pub session_id: String,
    /// Ticket the delegation worked on, if any
    pub ticket_key: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub status: AgentStatus,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// Cost computed from token counts and the pricing policy at finalize time
    pub estimated_cost_usd: f64,
    /// Artifact references produced by the delegation (ordered,
    /// duplicate-tolerant), e.g. "file:metrics.rs", "pr:#42"
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub model_used: Option<String>,
    /// XP earned from contribution kinds registered on the tracker
    /// (commits, PRs, tests written), summed at record time
    #[serde(default)]
    pub contribution_xp: i64,
}

/// Rolling-aggregate profile for one agent, keyed by agent name
///
/// Aggregates are accumulated at record time, never derived by replaying the
/// event log: evicting old events does not roll back the counters they
/// contributed to. `level` and `level_title` are pure projections of `xp`,
/// recomputed on every update and on load so a stale stored value can never
/// drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_name: String,
    pub total_invocations: u64,
    pub successful_invocations: u64,
    pub failed_invocations: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub total_duration_seconds: f64,

    // Derived ratios, recomputed on every update
    pub success_rate: f64,
    pub avg_duration_seconds: f64,
    pub avg_tokens_per_call: f64,
    pub cost_per_success_usd: f64,

    // Gamification
    pub xp: i64,
    /// Derived from `xp`; 1-8
    pub level: u32,
    /// Derived from `level`
    pub level_title: String,
    pub current_streak: u32,
    /// Historical maximum; only ever increases
    pub best_streak: u32,
    pub achievements: BTreeSet<String>,
    pub strengths: BTreeSet<String>,
    pub weaknesses: BTreeSet<String>,

    /// Event IDs of this agent's most recent delegations, newest last
    #[serde(default)]
    pub recent_events: Vec<String>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
    /// Status of the most recent delegation; persisted so the error-recovery
    /// bonus survives event eviction and process restarts
    #[serde(default)]
    pub last_status: Option<AgentStatus>,
}

impl AgentProfile {
    /// Explicit zero-valued factory for an agent seen for the first time
    pub fn new(agent_name: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            total_invocations: 0,
            successful_invocations: 0,
            failed_invocations: 0,
            total_tokens: 0,
            total_cost_usd: 0.0,
            total_duration_seconds: 0.0,
            success_rate: 0.0,
            avg_duration_seconds: 0.0,
            avg_tokens_per_call: 0.0,
            cost_per_success_usd: 0.0,
            xp: 0,
            level: 1,
            level_title: "Intern".to_string(),
            current_streak: 0,
            best_streak: 0,
            achievements: BTreeSet::new(),
            strengths: BTreeSet::new(),
            weaknesses: BTreeSet::new(),
            recent_events: Vec::new(),
            last_error: None,
            last_active: None,
            last_status: None,
        }
    }

    /// Recompute every derived field from the accumulated counters
    pub(crate) fn refresh_derived(&mut self) {
        self.level = scoring::level_from_xp(self.xp);
        // Level is always in 1-8 by construction of level_from_xp
        if let Ok(title) = scoring::level_title(self.level) {
            self.level_title = title.to_string();
        }

        if self.total_invocations > 0 {
            let calls = self.total_invocations as f64;
            self.success_rate = self.successful_invocations as f64 / calls;
            self.avg_duration_seconds = self.total_duration_seconds / calls;
            self.avg_tokens_per_call = self.total_tokens as f64 / calls;
        }
        if self.successful_invocations > 0 {
            self.cost_per_success_usd =
                self.total_cost_usd / self.successful_invocations as f64;
        }
    }
}

/// One per session, created at session end and immutable thereafter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub session_number: u64,
    pub session_type: SessionKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Distinct agent names invoked this session, sorted
    pub agents_invoked: Vec<String>,
    /// Distinct ticket keys touched this session, sorted; empty keys excluded
    pub tickets_worked: Vec<String>,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub total_duration_seconds: f64,
}

/// The root aggregate and sole unit of persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardState {
    /// Schema version tag; mismatches are treated as corruption on load
    pub version: u32,
    pub project_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_sessions: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub total_duration_seconds: f64,
    /// Agent name to profile; keys unique, values always fully initialized
    pub agents: BTreeMap<String, AgentProfile>,
    /// Oldest-first, capped at `config::MAX_EVENTS` on save
    pub events: Vec<AgentEvent>,
    /// Oldest-first, capped at `config::MAX_SESSIONS` on save
    pub sessions: Vec<SessionSummary>,
}

impl DashboardState {
    /// Fresh state for a project with no prior metrics file
    pub fn new(project_name: &str) -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION,
            project_name: project_name.to_string(),
            created_at: now,
            updated_at: now,
            total_sessions: 0,
            total_tokens: 0,
            total_cost_usd: 0.0,
            total_duration_seconds: 0.0,
            agents: BTreeMap::new(),
            events: Vec::new(),
            sessions: Vec::new(),
        }
    }

    /// Re-establish derived invariants after loading from disk
    ///
    /// A hand-edited or stale file may carry a level inconsistent with its
    /// XP, or an `updated_at` before `created_at`; both are repaired here
    /// rather than trusted.
    pub(crate) fn normalize(&mut self) {
        for profile in self.agents.values_mut() {
            profile.refresh_derived();
        }
        if self.updated_at < self.created_at {
            self.updated_at = self.created_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&AgentStatus::Success).unwrap(),
            "\"success\""
        );
        assert_eq!(
            serde_json::to_string(&AgentStatus::Timeout).unwrap(),
            "\"timeout\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Continue).unwrap(),
            "\"continue\""
        );
        assert_eq!(
            serde_json::to_string(&SessionKind::Initializer).unwrap(),
            "\"initializer\""
        );
    }

    #[test]
    fn test_is_failure() {
        assert!(!AgentStatus::Success.is_failure());
        assert!(AgentStatus::Error.is_failure());
        assert!(AgentStatus::Timeout.is_failure());
        assert!(AgentStatus::Blocked.is_failure());
    }

    #[test]
    fn test_new_profile_is_zeroed() {
        let profile = AgentProfile::new("coding");
        assert_eq!(profile.agent_name, "coding");
        assert_eq!(profile.total_invocations, 0);
        assert_eq!(profile.xp, 0);
        assert_eq!(profile.level, 1);
        assert_eq!(profile.level_title, "Intern");
        assert_eq!(profile.current_streak, 0);
        assert_eq!(profile.best_streak, 0);
        assert!(profile.achievements.is_empty());
        assert!(profile.last_status.is_none());
    }

    #[test]
    fn test_refresh_derived_ratios() {
        let mut profile = AgentProfile::new("coding");
        profile.total_invocations = 4;
        profile.successful_invocations = 3;
        profile.failed_invocations = 1;
        profile.total_tokens = 4000;
        profile.total_cost_usd = 0.6;
        profile.total_duration_seconds = 40.0;
        profile.xp = 75;
        profile.refresh_derived();

        assert!((profile.success_rate - 0.75).abs() < f64::EPSILON);
        assert!((profile.avg_duration_seconds - 10.0).abs() < f64::EPSILON);
        assert!((profile.avg_tokens_per_call - 1000.0).abs() < f64::EPSILON);
        assert!((profile.cost_per_success_usd - 0.2).abs() < f64::EPSILON);
        assert_eq!(profile.level, 2);
        assert_eq!(profile.level_title, "Junior");
    }

    #[test]
    fn test_normalize_repairs_drifted_level() {
        let mut state = DashboardState::new("test");
        let mut profile = AgentProfile::new("coding");
        profile.xp = 5000;
        profile.level = 2; // Stale stored value
        profile.level_title = "Junior".to_string();
        state.agents.insert("coding".to_string(), profile);
        state.updated_at = state.created_at - chrono::Duration::seconds(60);

        state.normalize();

        let profile = &state.agents["coding"];
        assert_eq!(profile.level, 8);
        assert_eq!(profile.level_title, "Fellow");
        assert!(state.updated_at >= state.created_at);
    }

    #[test]
    fn test_dashboard_json_field_names() {
        let state = DashboardState::new("my-project");
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();

        for key in [
            "version",
            "project_name",
            "created_at",
            "updated_at",
            "total_sessions",
            "total_tokens",
            "total_cost_usd",
            "total_duration_seconds",
            "agents",
            "events",
            "sessions",
        ] {
            assert!(json.get(key).is_some(), "missing top-level field {key}");
        }
        assert_eq!(json["version"], 1);
        assert_eq!(json["project_name"], "my-project");
    }
}
