use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{RequirementId, TaskItemId};
use crate::model::task::RequirementKind;

//
// ─── SCORED RESULT ─────────────────────────────────────────────────────────────
//

/// Correctness of one requirement after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect,
    /// The requirement kind has no automated rule and is excluded from totals.
    Ungraded,
}

impl Outcome {
    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, Self::Correct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementScore {
    pub requirement_id: RequirementId,
    pub kind: RequirementKind,
    pub outcome: Outcome,
}

/// Earned/total pair restricted to one task item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemScore {
    pub item_id: TaskItemId,
    pub earned_points: u32,
    pub total_points: u32,
    pub requirements: Vec<RequirementScore>,
}

/// Aggregated score of a session.
///
/// When no requirement is scoreable, `score_percent` is `0` and
/// [`SessionResult::is_graded`] returns `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub total_points: u32,
    pub earned_points: u32,
    pub score_percent: u32,
    pub items: Vec<ItemScore>,
}

impl SessionResult {
    /// Returns false when the session contained no scoreable requirement.
    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.total_points > 0
    }

    #[must_use]
    pub fn item(&self, item_id: &TaskItemId) -> Option<&ItemScore> {
        self.items.iter().find(|i| &i.item_id == item_id)
    }
}

//
// ─── COMPLETED SESSION RECORD ──────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompletedSessionError {
    #[error("session label cannot be empty")]
    EmptyLabel,

    #[error("score percent must be <= 100, got {0}")]
    InvalidScorePercent(u32),

    #[error("earned points ({earned}) exceed total points ({total})")]
    PointsMismatch { earned: u32, total: u32 },
}

/// What the study-progress collaborator stores for a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSession {
    label: String,
    area: String,
    score_percent: u32,
    elapsed_minutes: u32,
    earned_points: u32,
    total_points: u32,
    completed_at: DateTime<Utc>,
}

impl CompletedSession {
    /// Build a record from a scored session.
    ///
    /// Elapsed time is rounded to the nearest whole minute.
    #[must_use]
    pub fn from_result(
        area: &str,
        result: &SessionResult,
        elapsed: chrono::Duration,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            label: format!("TBS: {area}"),
            area: area.to_owned(),
            score_percent: result.score_percent,
            elapsed_minutes: round_minutes(elapsed),
            earned_points: result.earned_points,
            total_points: result.total_points,
            completed_at,
        }
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `CompletedSessionError` if the label is empty or the score fields disagree.
    pub fn from_persisted(
        label: String,
        area: String,
        score_percent: u32,
        elapsed_minutes: u32,
        earned_points: u32,
        total_points: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, CompletedSessionError> {
        if label.trim().is_empty() {
            return Err(CompletedSessionError::EmptyLabel);
        }
        if score_percent > 100 {
            return Err(CompletedSessionError::InvalidScorePercent(score_percent));
        }
        if earned_points > total_points {
            return Err(CompletedSessionError::PointsMismatch {
                earned: earned_points,
                total: total_points,
            });
        }
        Ok(Self {
            label,
            area,
            score_percent,
            elapsed_minutes,
            earned_points,
            total_points,
            completed_at,
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn area(&self) -> &str {
        &self.area
    }

    #[must_use]
    pub fn score_percent(&self) -> u32 {
        self.score_percent
    }

    #[must_use]
    pub fn elapsed_minutes(&self) -> u32 {
        self.elapsed_minutes
    }

    #[must_use]
    pub fn earned_points(&self) -> u32 {
        self.earned_points
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

fn round_minutes(elapsed: chrono::Duration) -> u32 {
    let secs = elapsed.num_seconds().max(0);
    let minutes = (secs + 30) / 60;
    u32::try_from(minutes).unwrap_or(u32::MAX)
}
