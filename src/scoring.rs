//! Pure XP, level, and streak scoring functions
//!
//! Every award the collector grants flows through this module. All functions
//! are deterministic and side-effect free so the gamification rules can be
//! tested exhaustively in isolation and never depend on collector state.

use crate::errors::{MetricsError, Result};
use crate::model::AgentStatus;

/// XP floors per level; index 0 is the level-1 floor, strictly ascending
const LEVEL_THRESHOLDS: [i64; 8] = [0, 50, 150, 400, 800, 1500, 3000, 5000];

/// Title per level, index 0 = level 1
const LEVEL_TITLES: [&str; 8] = [
    "Intern",
    "Junior",
    "Mid-Level",
    "Senior",
    "Staff",
    "Principal",
    "Distinguished",
    "Fellow",
];

/// XP award table for explicit contribution kinds
const CONTRIBUTION_XP: [(&str, i64); 8] = [
    ("commit", 5),
    ("pr_created", 15),
    ("pr_merged", 30),
    ("test_written", 20),
    ("ticket_completed", 25),
    ("file_created", 3),
    ("file_modified", 2),
    ("issue_created", 8),
];

/// Base XP for one successful delegation
pub fn xp_for_success(base_xp: i64) -> i64 {
    base_xp
}

/// XP for an explicit contribution kind, from a fixed table
pub fn xp_for_contribution(kind: &str) -> Result<i64> {
    CONTRIBUTION_XP
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, xp)| *xp)
        .ok_or_else(|| MetricsError::UnknownContributionKind(kind.to_string()))
}

/// Speed bonus for fast delegations
///
/// Boundaries are strict less-than: exactly 30.0s earns 5, exactly 60.0s
/// earns 0.
pub fn speed_bonus(duration_seconds: f64) -> i64 {
    if duration_seconds < 30.0 {
        10
    } else if duration_seconds < 60.0 {
        5
    } else {
        0
    }
}

/// Bonus for bouncing back immediately after a failure
///
/// Applies only when the previous delegation failed and this success is the
/// first of a new streak (`current_streak == 1`).
pub fn error_recovery_bonus(current_streak: i64, previous_status: Option<AgentStatus>) -> i64 {
    match previous_status {
        Some(status) if status.is_failure() && current_streak == 1 => 10,
        _ => 0,
    }
}

/// One XP per consecutive success; negative streaks clamp to zero
pub fn streak_bonus(current_streak: i64) -> i64 {
    current_streak.max(0)
}

/// Total XP for one successful delegation
///
/// Sum of base + speed + recovery + streak + contribution. Callers award 0 XP
/// for non-success statuses; no bonus applies on failure.
pub fn total_xp_for_success(
    duration_seconds: f64,
    current_streak: i64,
    previous_status: Option<AgentStatus>,
    contribution_xp: i64,
    base_xp: i64,
) -> i64 {
    xp_for_success(base_xp)
        + speed_bonus(duration_seconds)
        + error_recovery_bonus(current_streak, previous_status)
        + streak_bonus(current_streak)
        + contribution_xp
}

/// XP floors per level, strictly ascending; index 0 = level 1
pub fn level_thresholds() -> &'static [i64] {
    &LEVEL_THRESHOLDS
}

/// Title for a level in 1-8
pub fn level_title(level: u32) -> Result<&'static str> {
    if (1..=LEVEL_TITLES.len() as u32).contains(&level) {
        Ok(LEVEL_TITLES[(level - 1) as usize])
    } else {
        Err(MetricsError::InvalidLevel(level))
    }
}

/// Highest level whose threshold is at or below the XP total
///
/// Clamped to level 8; negative XP maps to level 1.
pub fn level_from_xp(total_xp: i64) -> u32 {
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|&threshold| threshold <= total_xp)
        .map_or(1, |index| (index + 1) as u32)
}

/// XP still needed to reach the next level; 0 at max level
pub fn xp_for_next_level(total_xp: i64) -> i64 {
    let level = level_from_xp(total_xp) as usize;
    if level >= LEVEL_THRESHOLDS.len() {
        0
    } else {
        LEVEL_THRESHOLDS[level] - total_xp
    }
}

/// Progress within the current level as `(progress, span)`
///
/// `progress` is XP above the current level's floor; `span` is the width of
/// the level. At max level both are 0 so downstream progress bars never
/// divide by zero.
pub fn xp_progress_in_level(total_xp: i64) -> (i64, i64) {
    let level = level_from_xp(total_xp) as usize;
    if level >= LEVEL_THRESHOLDS.len() {
        return (0, 0);
    }
    let floor = LEVEL_THRESHOLDS[level - 1];
    let span = LEVEL_THRESHOLDS[level] - floor;
    ((total_xp - floor).max(0), span)
}

/// Streak transition for one recorded event
///
/// Success increments the streak and raises the best; any failure resets the
/// current streak to 0 and leaves the best untouched.
pub fn update_streak(
    previous_streak: u32,
    current_status: AgentStatus,
    best_streak: u32,
) -> (u32, u32) {
    if current_status == AgentStatus::Success {
        let new_current = previous_streak + 1;
        (new_current, best_streak.max(new_current))
    } else {
        (0, best_streak)
    }
}
