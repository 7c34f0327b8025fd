//! Session lifecycle orchestration and profile bookkeeping
//!
//! The collector owns one `DashboardState` for the lifetime of the process
//! and mediates every write through the `MetricsStore`. One session is open
//! at a time; each delegation within it is wrapped in a tracker whose
//! finalized event updates the agent's profile (counters, streak, XP, level),
//! feeds the session accumulator, and is handed to the injected detectors.
//! State is persisted once per session, at `end_session`.
//!
//! Session-state misuse (`start_session` while one is active, `track_agent`
//! or `end_session` without one) is a programming mistake in the host and is
//! surfaced as a distinct error, never swallowed.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use uuid::Uuid;

use crate::config::{MetricsConfig, ROLLING_WINDOW};
use crate::detect::{Detector, NoopDetector};
use crate::errors::{MetricsError, Result};
use crate::model::{
    AgentEvent, AgentProfile, AgentStatus, DashboardState, SessionKind, SessionStatus,
    SessionSummary,
};
use crate::scoring;
use crate::store::{LoadOutcome, MetricsStore};
use crate::tracker::DelegationTracker;

/// Accumulator for the currently open session
#[derive(Debug)]
struct ActiveSession {
    session_id: String,
    session_number: u64,
    kind: SessionKind,
    started_at: DateTime<Utc>,
    agents_invoked: BTreeSet<String>,
    tickets_worked: BTreeSet<String>,
    total_tokens: u64,
    total_cost_usd: f64,
    total_duration_seconds: f64,
}

/// Single-writer metrics collector for one project directory
pub struct MetricsCollector {
    config: MetricsConfig,
    store: MetricsStore,
    state: DashboardState,
    detector: Box<dyn Detector>,
    active: Option<ActiveSession>,
    load_outcome: LoadOutcome,
}

impl MetricsCollector {
    /// Create a collector with the default no-op detector
    ///
    /// Loads prior state from the project's metrics file (or starts fresh)
    /// and configuration from an optional `delos.toml` alongside it.
    pub fn new(project_dir: &Path) -> Self {
        Self::with_detector(project_dir, Box::new(NoopDetector))
    }

    /// Create a collector with an injected achievement/signal detector
    pub fn with_detector(project_dir: &Path, detector: Box<dyn Detector>) -> Self {
        let config = MetricsConfig::load(project_dir);
        Self::with_config(project_dir, config, detector)
    }

    /// Create a collector with explicit configuration
    pub fn with_config(
        project_dir: &Path,
        config: MetricsConfig,
        detector: Box<dyn Detector>,
    ) -> Self {
        let store = MetricsStore::new(project_dir, &config);
        let (state, load_outcome) = store.load();
        if let LoadOutcome::CorruptionRecovered { backup } = &load_outcome {
            tracing::warn!(
                backup = %backup.display(),
                "Previous metrics file was unreadable; starting from a fresh state"
            );
        }
        Self {
            config,
            store,
            state,
            detector,
            active: None,
            load_outcome,
        }
    }

    /// How the initial load resolved, so hosts can log/alert on recovery
    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    /// Path of the persisted metrics file
    pub fn metrics_path(&self) -> &Path {
        self.store.path()
    }

    /// Open a new session
    ///
    /// Fails with `SessionAlreadyActive` if one is already open.
    pub fn start_session(&mut self, session_number: u64, is_initializer: bool) -> Result<String> {
        if let Some(active) = &self.active {
            return Err(MetricsError::SessionAlreadyActive(
                active.session_id.clone(),
            ));
        }

        let session_id = Uuid::new_v4().to_string();
        let kind = if is_initializer {
            SessionKind::Initializer
        } else {
            SessionKind::Continuation
        };
        tracing::info!(session_number, kind = ?kind, "Session started");

        self.active = Some(ActiveSession {
            session_id: session_id.clone(),
            session_number,
            kind,
            started_at: Utc::now(),
            agents_invoked: BTreeSet::new(),
            tickets_worked: BTreeSet::new(),
            total_tokens: 0,
            total_cost_usd: 0.0,
            total_duration_seconds: 0.0,
        });
        Ok(session_id)
    }

    /// Track one delegation inside a scoped work closure
    ///
    /// The closure receives the tracker to record tokens, artifacts,
    /// contributions, and errors; the event is finalized and recorded however
    /// the closure exits — normal return or unwind. A panicking closure is
    /// recorded as a failed delegation (the panic message becomes the error
    /// message) and the panic then resumes, so no delegation is ever silently
    /// dropped. A closure that wants fallible work simply returns its own
    /// `Result` as `T` and marks the delegation failed via `set_error` before
    /// bailing out.
    ///
    /// Fails with `NoActiveSession` outside a session.
    pub fn track_agent<T>(
        &mut self,
        agent_name: &str,
        ticket_key: Option<&str>,
        work: impl FnOnce(&mut DelegationTracker) -> T,
    ) -> Result<T> {
        let mut tracker = self.open_delegation(agent_name, ticket_key)?;
        match panic::catch_unwind(AssertUnwindSafe(|| work(&mut tracker))) {
            Ok(value) => {
                self.record_delegation(&mut tracker)?;
                Ok(value)
            }
            Err(payload) => {
                // The tracker is not yet finalized, so the setter cannot fail
                let _ = tracker.set_error(&panic_message(payload.as_ref()));
                if let Err(e) = self.record_delegation(&mut tracker) {
                    tracing::error!(
                        agent = tracker.agent_name(),
                        error = %e,
                        "Failed to record panicked delegation"
                    );
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Open a tracker bound to the active session, for hosts that need
    /// manual control over the delegation's lifetime
    ///
    /// Every opened tracker must be passed to `record_delegation` on every
    /// exit path — an unrecorded tracker leaves a gap in the event sequence.
    pub fn open_delegation(
        &mut self,
        agent_name: &str,
        ticket_key: Option<&str>,
    ) -> Result<DelegationTracker> {
        let active = self.active.as_ref().ok_or(MetricsError::NoActiveSession)?;
        Ok(DelegationTracker::open(
            agent_name,
            &active.session_id,
            ticket_key,
        ))
    }

    /// Finalize a tracker and record its event
    pub fn record_delegation(&mut self, tracker: &mut DelegationTracker) -> Result<AgentEvent> {
        if self.active.is_none() {
            return Err(MetricsError::NoActiveSession);
        }
        let event = tracker.finalize(&self.config.pricing)?;
        self.record_event(event.clone())?;
        Ok(event)
    }

    /// Fold one finalized event into the profile, the session accumulator,
    /// the global event sequence, and the detectors
    fn record_event(&mut self, event: AgentEvent) -> Result<()> {
        let active = self.active.as_mut().ok_or(MetricsError::NoActiveSession)?;

        // Session accumulator
        active.agents_invoked.insert(event.agent_name.clone());
        if let Some(ticket) = &event.ticket_key {
            active.tickets_worked.insert(ticket.clone());
        }
        active.total_tokens += event.total_tokens;
        active.total_cost_usd += event.estimated_cost_usd;
        active.total_duration_seconds += event.duration_seconds;

        // Profile update. The streak is advanced first so the streak and
        // recovery bonuses score against the post-event streak.
        let base_xp = self.config.base_xp;
        let profile = self
            .state
            .agents
            .entry(event.agent_name.clone())
            .or_insert_with(|| AgentProfile::new(&event.agent_name));

        let previous_status = profile.last_status;
        let (new_streak, new_best) =
            scoring::update_streak(profile.current_streak, event.status, profile.best_streak);
        let awarded = if event.status == AgentStatus::Success {
            scoring::total_xp_for_success(
                event.duration_seconds,
                i64::from(new_streak),
                previous_status,
                event.contribution_xp,
                base_xp,
            )
        } else {
            // Failures never earn XP
            0
        };

        profile.total_invocations += 1;
        if event.status == AgentStatus::Success {
            profile.successful_invocations += 1;
        } else {
            profile.failed_invocations += 1;
            if let Some(message) = &event.error_message {
                profile.last_error = Some(message.clone());
            }
        }
        profile.total_tokens += event.total_tokens;
        profile.total_cost_usd += event.estimated_cost_usd;
        profile.total_duration_seconds += event.duration_seconds;
        profile.xp += awarded;
        profile.current_streak = new_streak;
        profile.best_streak = new_best;
        profile.last_status = Some(event.status);
        profile.last_active = Some(event.ended_at);
        profile.recent_events.push(event.event_id.clone());
        if profile.recent_events.len() > ROLLING_WINDOW {
            let excess = profile.recent_events.len() - ROLLING_WINDOW;
            profile.recent_events.drain(..excess);
        }
        profile.refresh_derived();

        tracing::debug!(
            agent = %event.agent_name,
            status = ?event.status,
            xp_awarded = awarded,
            streak = new_streak,
            "Recorded delegation event"
        );

        // Append before snapshotting histories so the detectors see the
        // event they are scoring
        self.state.events.push(event.clone());

        let agent_history: Vec<&AgentEvent> = self
            .state
            .events
            .iter()
            .filter(|e| e.agent_name == event.agent_name)
            .collect();
        let session_history: Vec<&AgentEvent> = self
            .state
            .events
            .iter()
            .filter(|e| e.session_id == event.session_id)
            .collect();
        let window_start = agent_history.len().saturating_sub(ROLLING_WINDOW);

        let (achievements, signals) = {
            let Some(profile) = self.state.agents.get(&event.agent_name) else {
                return Ok(());
            };
            (
                self.detector
                    .detect_achievements(profile, &event, &agent_history, &session_history),
                self.detector
                    .detect_signals(profile, &agent_history[window_start..]),
            )
        };

        if let Some(profile) = self.state.agents.get_mut(&event.agent_name) {
            profile.achievements.extend(achievements);
            profile.strengths.extend(signals.strengths);
            profile.weaknesses.extend(signals.weaknesses);
        }
        Ok(())
    }

    /// Close the active session, roll up its summary, and persist
    ///
    /// Fails with `NoActiveSession` when none is open, leaving the state
    /// unmodified.
    pub fn end_session(&mut self, status: SessionStatus) -> Result<SessionSummary> {
        let active = self.active.take().ok_or(MetricsError::NoActiveSession)?;

        let summary = SessionSummary {
            session_id: active.session_id,
            session_number: active.session_number,
            session_type: active.kind,
            started_at: active.started_at,
            ended_at: Utc::now(),
            status,
            agents_invoked: active.agents_invoked.into_iter().collect(),
            tickets_worked: active.tickets_worked.into_iter().collect(),
            total_tokens: active.total_tokens,
            total_cost_usd: active.total_cost_usd,
            total_duration_seconds: active.total_duration_seconds,
        };

        self.state.sessions.push(summary.clone());
        self.state.total_sessions += 1;
        self.state.total_tokens += summary.total_tokens;
        self.state.total_cost_usd += summary.total_cost_usd;
        self.state.total_duration_seconds += summary.total_duration_seconds;

        self.store.save(&mut self.state)?;

        tracing::info!(
            session_number = summary.session_number,
            status = ?summary.status,
            agents = summary.agents_invoked.len(),
            tokens = summary.total_tokens,
            "Session ended"
        );
        Ok(summary)
    }

    /// Read-only snapshot of the full dashboard state
    pub fn dashboard_state(&self) -> &DashboardState {
        &self.state
    }

    /// Profile for one agent; `None` means the agent never ran
    pub fn agent_profile(&self, agent_name: &str) -> Option<&AgentProfile> {
        self.state.agents.get(agent_name)
    }
}

/// Best-effort human-readable message from a panic payload
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "delegation work panicked".to_string()
    }
}
