#![allow(clippy::cast_precision_loss)] // Token counts to f64 for cost math is acceptable
#![allow(clippy::module_name_repetitions)] // e.g., MetricsStore in store module is fine
#![allow(clippy::missing_errors_doc)] // Error conditions are documented on the error enum

//! Delos - durable, gamified metrics for autonomous Claude Code agent loops
//!
//! Named after Westworld's parent company that keeps score on everything.
//! Instruments a coding-agent run loop with a persistent, queryable record of
//! per-agent performance: invocation outcomes, token/cost spend, streaks,
//! experience points, and levels, so a long-running session can be scored and
//! visualized without re-deriving statistics from raw logs on every read.
//!
//! The expected host flow:
//! - `start_session` once per loop iteration
//! - wrap each delegation in `track_agent` (or the explicit
//!   `open_delegation` / `record_delegation` pair)
//! - `end_session` exactly once, which rolls up a summary and persists
//!
//! Everything lands in a single JSON document per project directory, written
//! atomically (temp file + rename) with bounded retention. Consumers such as
//! the dashboard UI read that file or the in-memory accessors; they never
//! write it.

pub mod collector;
pub mod config;
pub mod detect;
pub mod errors;
pub mod model;
pub mod scoring;
pub mod store;
pub mod tracker;

pub use collector::MetricsCollector;
pub use config::{MetricsConfig, PricingConfig};
pub use detect::{Detector, NoopDetector, SignalReport};
pub use errors::{MetricsError, Result};
pub use model::{
    AgentEvent, AgentProfile, AgentStatus, DashboardState, SessionKind, SessionStatus,
    SessionSummary,
};
pub use store::{LoadOutcome, MetricsStore};
pub use tracker::DelegationTracker;
