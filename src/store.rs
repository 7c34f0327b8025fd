//! Durable JSON persistence for the dashboard state
//!
//! The store is the sole writer of the metrics file. Saves apply FIFO
//! eviction, then write to a temp file in the same directory and atomically
//! rename it over the target, so a crash or concurrent reader only ever sees
//! the previous complete state or the new complete state, never a mix.
//!
//! Loads never block a session: a missing file yields a fresh state, and an
//! unreadable or schema-invalid file is copied to a `.corrupt` backup (user
//! data is never deleted silently) before falling back to a fresh state with
//! a `CorruptionRecovered` signal for the host to log.
//!
//! No cross-process locking: a single writer per file is assumed. The atomic
//! rename prevents torn reads, not lost updates from concurrent writers.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{MetricsConfig, MAX_EVENTS, MAX_SESSIONS};
use crate::errors::{MetricsError, Result};
use crate::model::{DashboardState, STATE_VERSION};

/// How the last load resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No backing file existed; a fresh state was created
    Created,
    /// The backing file parsed and validated cleanly
    Loaded,
    /// The backing file was unreadable; its bytes were preserved at `backup`
    /// and a fresh state was returned
    CorruptionRecovered { backup: PathBuf },
}

/// File-backed store for one project's dashboard state
#[derive(Debug)]
pub struct MetricsStore {
    path: PathBuf,
    project_name: String,
}

impl MetricsStore {
    /// Create a store for `<project_dir>/<config.metrics_file>`
    pub fn new(project_dir: &Path, config: &MetricsConfig) -> Self {
        let project_name = config.project_name.clone().unwrap_or_else(|| {
            project_dir
                .file_name()
                .map_or_else(|| "unknown".to_string(), |n| n.to_string_lossy().to_string())
        });
        Self {
            path: project_dir.join(&config.metrics_file),
            project_name,
        }
    }

    /// Path of the persisted metrics file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the dashboard state, repairing as needed
    ///
    /// Never fails: corruption falls back to a fresh state after preserving a
    /// backup, and derived fields are renormalized on every successful parse.
    pub fn load(&self) -> (DashboardState, LoadOutcome) {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No metrics file, starting fresh");
            return (DashboardState::new(&self.project_name), LoadOutcome::Created);
        }

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            // An existing-but-unreadable file is a persistence fault, not a
            // first run; signal recovery so the host can alert
            Err(e) => return self.recover(&format!("read failed: {e}")),
        };

        match serde_json::from_slice::<DashboardState>(&bytes) {
            Ok(mut state) if state.version == STATE_VERSION => {
                state.normalize();
                tracing::debug!(
                    events = state.events.len(),
                    sessions = state.sessions.len(),
                    agents = state.agents.len(),
                    "Loaded metrics file"
                );
                (state, LoadOutcome::Loaded)
            }
            Ok(state) => self.recover(&format!(
                "unsupported schema version {} (expected {STATE_VERSION})",
                state.version
            )),
            Err(e) => self.recover(&format!("parse failed: {e}")),
        }
    }

    /// Preserve the unreadable file and fall back to a fresh state
    fn recover(&self, reason: &str) -> (DashboardState, LoadOutcome) {
        let backup = self.path.with_extension("json.corrupt");
        match fs::copy(&self.path, &backup) {
            Ok(_) => tracing::warn!(
                path = %self.path.display(),
                backup = %backup.display(),
                reason,
                "Metrics file corrupt; preserved backup and starting fresh"
            ),
            Err(e) => tracing::error!(
                path = %self.path.display(),
                error = %e,
                reason,
                "Metrics file corrupt and backup failed; starting fresh"
            ),
        }
        (
            DashboardState::new(&self.project_name),
            LoadOutcome::CorruptionRecovered { backup },
        )
    }

    /// Persist the state durably
    ///
    /// Evicts oldest-first down to the retention caps, stamps `updated_at`,
    /// then writes atomically via temp-file-and-rename.
    pub fn save(&self, state: &mut DashboardState) -> Result<()> {
        Self::evict(state);
        state.updated_at = Utc::now();

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&tmp, json).map_err(|source| MetricsError::StoreWrite {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| MetricsError::StoreWrite {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(
            path = %self.path.display(),
            events = state.events.len(),
            sessions = state.sessions.len(),
            "Saved metrics file"
        );
        Ok(())
    }

    /// Trim events and sessions to their caps, oldest first
    fn evict(state: &mut DashboardState) {
        if state.events.len() > MAX_EVENTS {
            let excess = state.events.len() - MAX_EVENTS;
            state.events.drain(..excess);
            tracing::debug!(evicted = excess, "Evicted oldest events");
        }
        if state.sessions.len() > MAX_SESSIONS {
            let excess = state.sessions.len() - MAX_SESSIONS;
            state.sessions.drain(..excess);
            tracing::debug!(evicted = excess, "Evicted oldest sessions");
        }
    }
}
