use chrono::{DateTime, Duration, Utc};
use std::fmt;
use tracing::debug;

use tbs_core::model::{
    Answer, AnswerKey, AnswerSheet, CompletedSession, Outcome, ReferenceAnswer, Requirement,
    RequirementId, SessionResult, TaskItem, TaskItemId,
};
use tbs_core::scoring;
use tbs_core::timer::{CountdownTimer, TickOutcome};

use super::plan::Selection;
use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a simulation session.
///
/// `Loading` → `InProgress` → `Submitted`, or `Loading` → `Unavailable`
/// when the subject area has no task items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    InProgress,
    Submitted,
    Unavailable,
}

impl SessionPhase {
    /// Phases in which the viewed item may change.
    #[must_use]
    pub fn allows_navigation(self) -> bool {
        matches!(self, Self::InProgress | Self::Submitted)
    }
}

/// Result of a `submit` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// False when the session had already been submitted and nothing changed.
    pub newly_submitted: bool,
    pub result: SessionResult,
}

//
// ─── REVIEW ────────────────────────────────────────────────────────────────────
//

/// One requirement as shown in review mode.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementReview<'a> {
    pub requirement: &'a Requirement,
    pub answer: Option<&'a Answer>,
    pub outcome: Outcome,
    pub reference: ReferenceAnswer<'a>,
}

/// One task item as shown in review mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReview<'a> {
    pub item: &'a TaskItem,
    pub earned_points: u32,
    pub total_points: u32,
    pub requirements: Vec<RequirementReview<'a>>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One timed attempt at a selected set of task items.
///
/// Owns the items, the answer sheet and the countdown. Answers can only change
/// while `InProgress`; once submitted the result is frozen and only the viewed
/// item may change.
pub struct SimulationSession {
    area: String,
    phase: SessionPhase,
    items: Vec<TaskItem>,
    current: usize,
    answers: AnswerSheet,
    timer: CountdownTimer,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<SessionResult>,
    progress_recorded: bool,
}

impl SimulationSession {
    /// Create a session for a subject area in the `Loading` phase.
    #[must_use]
    pub fn new(area: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            phase: SessionPhase::Loading,
            items: Vec::new(),
            current: 0,
            answers: AnswerSheet::new(),
            timer: CountdownTimer::new(0),
            started_at: None,
            completed_at: None,
            result: None,
            progress_recorded: false,
        }
    }

    /// Create and load a session in one step.
    #[must_use]
    pub fn start(area: impl Into<String>, selection: Selection, started_at: DateTime<Utc>) -> Self {
        let mut session = Self::new(area);
        session.apply_selection(selection, started_at);
        session
    }

    /// Leave `Loading` with the selector's working set.
    ///
    /// `started_at` should come from the services layer clock to keep time deterministic.
    /// An empty selection moves the session to `Unavailable`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyLoaded` outside the `Loading` phase.
    pub fn load(
        &mut self,
        selection: Selection,
        started_at: DateTime<Utc>,
    ) -> Result<SessionPhase, SessionError> {
        if self.phase != SessionPhase::Loading {
            return Err(SessionError::AlreadyLoaded);
        }
        self.apply_selection(selection, started_at);
        Ok(self.phase)
    }

    fn apply_selection(&mut self, selection: Selection, started_at: DateTime<Utc>) {
        if selection.is_empty() {
            debug!(area = %self.area, "no task items available");
            self.phase = SessionPhase::Unavailable;
            return;
        }
        self.timer = CountdownTimer::new(selection.time_budget_seconds);
        self.items = selection.items;
        self.current = 0;
        self.started_at = Some(started_at);
        self.phase = SessionPhase::InProgress;
        debug!(
            area = %self.area,
            items = self.items.len(),
            budget_secs = self.timer.total_seconds(),
            "session in progress"
        );
    }

    #[must_use]
    pub fn area(&self) -> &str {
        &self.area
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.phase == SessionPhase::Submitted
    }

    #[must_use]
    pub fn items(&self) -> &[TaskItem] {
        &self.items
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_item(&self) -> Option<&TaskItem> {
        self.items.get(self.current)
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, item_id: &TaskItemId, requirement_id: &RequirementId) -> Option<&Answer> {
        self.answers.get(item_id, requirement_id)
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.timer.remaining_seconds()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Time between start and submission, once submitted. Never negative.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        Some((completed - started).max(Duration::zero()))
    }

    /// The frozen score, once submitted.
    #[must_use]
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total_items: self.items.len(),
            current_index: self.current,
            answered_requirements: self.answers.len(),
            total_requirements: self.items.iter().map(|i| i.requirements().len()).sum(),
            remaining_seconds: self.timer.remaining_seconds(),
            is_submitted: self.is_submitted(),
        }
    }

    /// Store the learner's answer for one requirement, replacing any earlier one.
    ///
    /// Returns the replaced answer, if any.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` unless the session is `InProgress`,
    /// `SessionError::UnknownRequirement` if the key does not exist in this session,
    /// and `SessionError::AnswerKindMismatch` if the answer shape does not fit the requirement.
    pub fn record_answer(
        &mut self,
        item_id: &TaskItemId,
        requirement_id: &RequirementId,
        answer: Answer,
    ) -> Result<Option<Answer>, SessionError> {
        if self.phase != SessionPhase::InProgress {
            return Err(SessionError::NotInProgress);
        }
        let requirement = self
            .items
            .iter()
            .find(|item| item.id() == item_id)
            .and_then(|item| item.requirement(requirement_id))
            .ok_or_else(|| SessionError::UnknownRequirement {
                item: item_id.clone(),
                requirement: requirement_id.clone(),
            })?;
        if requirement.kind() != answer.kind() {
            return Err(SessionError::kind_mismatch(
                requirement_id.clone(),
                requirement.kind(),
                answer.kind(),
            ));
        }

        Ok(self.answers.record(
            AnswerKey::new(item_id.clone(), requirement_id.clone()),
            answer,
        ))
    }

    /// Move the viewed item by `delta`, clamped to the item range.
    ///
    /// Returns the resulting index. No-op outside `InProgress`/`Submitted`.
    pub fn navigate(&mut self, delta: isize) -> usize {
        if !self.phase.allows_navigation() {
            return self.current;
        }
        let target = if delta < 0 {
            self.current.saturating_sub(delta.unsigned_abs())
        } else {
            self.current.saturating_add(delta.unsigned_abs())
        };
        self.current = self.clamp_index(target);
        self.current
    }

    /// View a specific item, clamped to the item range.
    ///
    /// Returns the resulting index. No-op outside `InProgress`/`Submitted`.
    pub fn jump_to(&mut self, index: usize) -> usize {
        if !self.phase.allows_navigation() {
            return self.current;
        }
        self.current = self.clamp_index(index);
        self.current
    }

    fn clamp_index(&self, index: usize) -> usize {
        index.min(self.items.len().saturating_sub(1))
    }

    /// Stop the clock, score every requirement and freeze the answers.
    ///
    /// Calling it again after submission changes nothing and returns the same
    /// result with `newly_submitted == false`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` while `Loading` or `Unavailable`.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<SubmitOutcome, SessionError> {
        match self.phase {
            SessionPhase::InProgress => {}
            SessionPhase::Submitted => {
                let result = self.result.clone().ok_or(SessionError::NotInProgress)?;
                return Ok(SubmitOutcome {
                    newly_submitted: false,
                    result,
                });
            }
            SessionPhase::Loading | SessionPhase::Unavailable => {
                return Err(SessionError::NotInProgress);
            }
        }

        self.timer.cancel();
        let result = scoring::aggregate(&self.items, &self.answers);
        self.result = Some(result.clone());
        self.completed_at = Some(now);
        self.phase = SessionPhase::Submitted;
        debug!(
            area = %self.area,
            earned = result.earned_points,
            total = result.total_points,
            "session submitted"
        );

        Ok(SubmitOutcome {
            newly_submitted: true,
            result,
        })
    }

    /// Advance the countdown by one second; expiry submits the session.
    ///
    /// Ticks outside `InProgress` are inert.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.phase != SessionPhase::InProgress {
            return TickOutcome::Inactive;
        }
        let outcome = self.timer.tick();
        if outcome == TickOutcome::Expired {
            debug!(area = %self.area, "time expired");
            // Phase was checked above, so submission cannot fail.
            let _ = self.submit(now);
        }
        outcome
    }

    /// Per-item view of answers, outcomes and reference answers.
    ///
    /// Returns `None` until the session has been submitted.
    #[must_use]
    pub fn review(&self) -> Option<Vec<ItemReview<'_>>> {
        let result = self.result.as_ref()?;
        let reviews = self
            .items
            .iter()
            .zip(&result.items)
            .map(|(item, score)| ItemReview {
                item,
                earned_points: score.earned_points,
                total_points: score.total_points,
                requirements: item
                    .requirements()
                    .iter()
                    .zip(&score.requirements)
                    .map(|(requirement, scored)| RequirementReview {
                        requirement,
                        answer: self.answers.get(item.id(), &requirement.id),
                        outcome: scored.outcome,
                        reference: requirement.reference(),
                    })
                    .collect(),
            })
            .collect();
        Some(reviews)
    }

    /// Study-history record for a submitted session.
    #[must_use]
    pub fn completed_record(&self) -> Option<CompletedSession> {
        let result = self.result.as_ref()?;
        let elapsed = self.elapsed()?;
        let completed_at = self.completed_at?;
        Some(CompletedSession::from_result(
            &self.area,
            result,
            elapsed,
            completed_at,
        ))
    }

    pub(crate) fn progress_recorded(&self) -> bool {
        self.progress_recorded
    }

    pub(crate) fn mark_progress_recorded(&mut self) {
        self.progress_recorded = true;
    }
}

impl fmt::Debug for SimulationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationSession")
            .field("area", &self.area)
            .field("phase", &self.phase)
            .field("items_len", &self.items.len())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("remaining_seconds", &self.timer.remaining_seconds())
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
