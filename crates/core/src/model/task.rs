use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{RequirementId, TaskItemId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TaskItemError {
    #[error("task item id cannot be empty")]
    EmptyId,

    #[error("task item {item} has an empty title")]
    EmptyTitle { item: TaskItemId },

    #[error("task item {item} must contain at least one requirement")]
    NoRequirements { item: TaskItemId },

    #[error("task item {item} time estimate must be > 0 minutes")]
    InvalidTimeEstimate { item: TaskItemId },

    #[error("task item {item} contains a requirement with an empty id")]
    EmptyRequirementId { item: TaskItemId },

    #[error("task item {item} repeats requirement id {requirement}")]
    DuplicateRequirement {
        item: TaskItemId,
        requirement: RequirementId,
    },

    #[error("requirement {requirement} has no options")]
    NoOptions { requirement: RequirementId },

    #[error("requirement {requirement} correct option {index} is out of range ({len} options)")]
    OptionOutOfRange {
        requirement: RequirementId,
        index: usize,
        len: usize,
    },

    #[error("requirement {requirement} has a non-finite correct answer")]
    InvalidCorrectAnswer { requirement: RequirementId },

    #[error("requirement {requirement} tolerance must be finite and >= 0")]
    InvalidTolerance { requirement: RequirementId },
}

//
// ─── REQUIREMENT KIND ──────────────────────────────────────────────────────────
//

/// Discriminant of a requirement, without its grading data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    JournalEntry,
    Calculation,
    MultipleChoice,
    WrittenResponse,
}

impl RequirementKind {
    /// Returns true when the kind has an automated correctness rule.
    ///
    /// Only `Calculation` and `MultipleChoice` count toward point totals.
    #[must_use]
    pub fn is_scoreable(self) -> bool {
        matches!(self, Self::Calculation | Self::MultipleChoice)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JournalEntry => "journal_entry",
            Self::Calculation => "calculation",
            Self::MultipleChoice => "multiple_choice",
            Self::WrittenResponse => "written_response",
        }
    }
}

//
// ─── GRADING DATA ──────────────────────────────────────────────────────────────
//

/// One journal entry row: an account with a debit or credit amount.
///
/// Template slots are rows with an empty account and no amounts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JournalLine {
    #[serde(default)]
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<f64>,
}

impl JournalLine {
    #[must_use]
    pub fn debit(account: impl Into<String>, amount: f64) -> Self {
        Self {
            account: account.into(),
            debit: Some(amount),
            credit: None,
        }
    }

    #[must_use]
    pub fn credit(account: impl Into<String>, amount: f64) -> Self {
        Self {
            account: account.into(),
            debit: None,
            credit: Some(amount),
        }
    }

    /// Returns true when the row carries no account and no amounts.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.account.trim().is_empty() && self.debit.is_none() && self.credit.is_none()
    }
}

/// A weighted criterion used to self-assess a written response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub criterion: String,
    pub weight: u32,
}

/// Type-specific grading data of a requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementSpec {
    JournalEntry {
        #[serde(default)]
        template: Vec<JournalLine>,
        correct_entries: Vec<JournalLine>,
    },
    Calculation {
        correct_answer: f64,
        #[serde(default)]
        tolerance: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    MultipleChoice {
        options: Vec<String>,
        correct_answer: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    WrittenResponse {
        #[serde(default)]
        rubric: Vec<RubricCriterion>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sample_response: Option<String>,
    },
}

impl RequirementSpec {
    #[must_use]
    pub fn kind(&self) -> RequirementKind {
        match self {
            Self::JournalEntry { .. } => RequirementKind::JournalEntry,
            Self::Calculation { .. } => RequirementKind::Calculation,
            Self::MultipleChoice { .. } => RequirementKind::MultipleChoice,
            Self::WrittenResponse { .. } => RequirementKind::WrittenResponse,
        }
    }
}

/// The reference material shown to the learner once a session is under review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceAnswer<'a> {
    JournalEntry {
        correct_entries: &'a [JournalLine],
    },
    Calculation {
        correct_answer: f64,
        tolerance: f64,
        explanation: Option<&'a str>,
    },
    MultipleChoice {
        correct_index: usize,
        correct_option: Option<&'a str>,
        explanation: Option<&'a str>,
    },
    WrittenResponse {
        sample_response: Option<&'a str>,
        rubric: &'a [RubricCriterion],
    },
}

//
// ─── REQUIREMENT ───────────────────────────────────────────────────────────────
//

/// One gradable or reviewable sub-question within a Task Item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub prompt: String,
    #[serde(flatten)]
    pub spec: RequirementSpec,
}

impl Requirement {
    #[must_use]
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, spec: RequirementSpec) -> Self {
        Self {
            id: RequirementId::new(id),
            prompt: prompt.into(),
            spec,
        }
    }

    #[must_use]
    pub fn kind(&self) -> RequirementKind {
        self.spec.kind()
    }

    #[must_use]
    pub fn is_scoreable(&self) -> bool {
        self.kind().is_scoreable()
    }

    /// Returns the correct answer and explanation for review mode.
    #[must_use]
    pub fn reference(&self) -> ReferenceAnswer<'_> {
        match &self.spec {
            RequirementSpec::JournalEntry {
                correct_entries, ..
            } => ReferenceAnswer::JournalEntry { correct_entries },
            RequirementSpec::Calculation {
                correct_answer,
                tolerance,
                explanation,
            } => ReferenceAnswer::Calculation {
                correct_answer: *correct_answer,
                tolerance: *tolerance,
                explanation: explanation.as_deref(),
            },
            RequirementSpec::MultipleChoice {
                options,
                correct_answer,
                explanation,
            } => ReferenceAnswer::MultipleChoice {
                correct_index: *correct_answer,
                correct_option: options.get(*correct_answer).map(String::as_str),
                explanation: explanation.as_deref(),
            },
            RequirementSpec::WrittenResponse {
                rubric,
                sample_response,
            } => ReferenceAnswer::WrittenResponse {
                sample_response: sample_response.as_deref(),
                rubric,
            },
        }
    }

    fn validate(&self) -> Result<(), TaskItemError> {
        match &self.spec {
            RequirementSpec::Calculation {
                correct_answer,
                tolerance,
                ..
            } => {
                if !correct_answer.is_finite() {
                    return Err(TaskItemError::InvalidCorrectAnswer {
                        requirement: self.id.clone(),
                    });
                }
                if !tolerance.is_finite() || *tolerance < 0.0 {
                    return Err(TaskItemError::InvalidTolerance {
                        requirement: self.id.clone(),
                    });
                }
            }
            RequirementSpec::MultipleChoice {
                options,
                correct_answer,
                ..
            } => {
                if options.is_empty() {
                    return Err(TaskItemError::NoOptions {
                        requirement: self.id.clone(),
                    });
                }
                if *correct_answer >= options.len() {
                    return Err(TaskItemError::OptionOutOfRange {
                        requirement: self.id.clone(),
                        index: *correct_answer,
                        len: options.len(),
                    });
                }
            }
            RequirementSpec::JournalEntry { .. } | RequirementSpec::WrittenResponse { .. } => {}
        }
        Ok(())
    }
}

//
// ─── TASK ITEM ─────────────────────────────────────────────────────────────────
//

/// Unvalidated task item, as authored in a question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItemDraft {
    pub id: TaskItemId,
    pub title: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_estimate_minutes: Option<u32>,
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

impl TaskItemDraft {
    /// Validate the draft into an immutable `TaskItem`.
    ///
    /// # Errors
    ///
    /// Returns `TaskItemError` if ids are empty or repeated, there are no
    /// requirements, or any requirement carries inconsistent grading data.
    pub fn validate(self) -> Result<TaskItem, TaskItemError> {
        if self.id.as_str().trim().is_empty() {
            return Err(TaskItemError::EmptyId);
        }
        if self.title.trim().is_empty() {
            return Err(TaskItemError::EmptyTitle { item: self.id });
        }
        if self.requirements.is_empty() {
            return Err(TaskItemError::NoRequirements { item: self.id });
        }
        if self.time_estimate_minutes == Some(0) {
            return Err(TaskItemError::InvalidTimeEstimate { item: self.id });
        }

        let mut seen = HashSet::with_capacity(self.requirements.len());
        for requirement in &self.requirements {
            if requirement.id.as_str().trim().is_empty() {
                return Err(TaskItemError::EmptyRequirementId {
                    item: self.id.clone(),
                });
            }
            if !seen.insert(&requirement.id) {
                return Err(TaskItemError::DuplicateRequirement {
                    item: self.id.clone(),
                    requirement: requirement.id.clone(),
                });
            }
            requirement.validate()?;
        }

        Ok(TaskItem {
            id: self.id,
            title: self.title,
            scenario: self.scenario,
            time_estimate_minutes: self.time_estimate_minutes,
            requirements: self.requirements,
            hints: self.hints,
            references: self.references,
        })
    }
}

/// One simulated exam exercise: a scenario and its ordered requirements.
///
/// Immutable once loaded. Deserialization runs the same validation as
/// [`TaskItemDraft::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaskItemDraft")]
pub struct TaskItem {
    id: TaskItemId,
    title: String,
    scenario: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_estimate_minutes: Option<u32>,
    requirements: Vec<Requirement>,
    hints: Vec<String>,
    references: Vec<String>,
}

impl TryFrom<TaskItemDraft> for TaskItem {
    type Error = TaskItemError;

    fn try_from(draft: TaskItemDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl TaskItem {
    #[must_use]
    pub fn id(&self) -> &TaskItemId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    #[must_use]
    pub fn time_estimate_minutes(&self) -> Option<u32> {
        self.time_estimate_minutes
    }

    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    #[must_use]
    pub fn requirement(&self, id: &RequirementId) -> Option<&Requirement> {
        self.requirements.iter().find(|r| &r.id == id)
    }

    #[must_use]
    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    #[must_use]
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Number of requirements that count toward the score.
    #[must_use]
    pub fn scoreable_count(&self) -> usize {
        self.requirements.iter().filter(|r| r.is_scoreable()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc(id: &str, correct: usize) -> Requirement {
        Requirement::new(
            id,
            "Pick one",
            RequirementSpec::MultipleChoice {
                options: vec!["A".into(), "B".into(), "C".into()],
                correct_answer: correct,
                explanation: None,
            },
        )
    }

    fn draft(requirements: Vec<Requirement>) -> TaskItemDraft {
        TaskItemDraft {
            id: TaskItemId::new("item-1"),
            title: "Leases".into(),
            scenario: "A lessee signs a five-year lease.".into(),
            time_estimate_minutes: Some(20),
            requirements,
            hints: Vec::new(),
            references: vec!["ASC 842".into()],
        }
    }

    #[test]
    fn validate_accepts_well_formed_item() {
        let item = draft(vec![mc("r1", 0), mc("r2", 2)]).validate().unwrap();
        assert_eq!(item.requirements().len(), 2);
        assert_eq!(item.scoreable_count(), 2);
        assert_eq!(item.references(), ["ASC 842".to_string()]);
    }

    #[test]
    fn validate_rejects_duplicate_requirement_ids() {
        let err = draft(vec![mc("r1", 0), mc("r1", 1)]).validate().unwrap_err();
        assert!(matches!(err, TaskItemError::DuplicateRequirement { .. }));
    }

    #[test]
    fn validate_rejects_out_of_range_option() {
        let err = draft(vec![mc("r1", 3)]).validate().unwrap_err();
        assert_eq!(
            err,
            TaskItemError::OptionOutOfRange {
                requirement: RequirementId::new("r1"),
                index: 3,
                len: 3,
            }
        );
    }

    #[test]
    fn validate_rejects_negative_tolerance() {
        let req = Requirement::new(
            "calc",
            "Compute",
            RequirementSpec::Calculation {
                correct_answer: 10.0,
                tolerance: -1.0,
                explanation: None,
            },
        );
        let err = draft(vec![req]).validate().unwrap_err();
        assert!(matches!(err, TaskItemError::InvalidTolerance { .. }));
    }

    #[test]
    fn validate_rejects_empty_requirements() {
        let err = draft(Vec::new()).validate().unwrap_err();
        assert!(matches!(err, TaskItemError::NoRequirements { .. }));
    }

    #[test]
    fn deserializes_tagged_requirements_with_default_tolerance() {
        let json = r#"{
            "id": "far-1",
            "title": "Bonds",
            "requirements": [
                {"id": "a", "prompt": "Interest?", "type": "calculation", "correct_answer": 1000.0},
                {"id": "b", "prompt": "Explain", "type": "written_response"},
                {"id": "c", "prompt": "Record", "type": "journal_entry",
                 "correct_entries": [{"account": "Cash", "debit": 500.0}]}
            ]
        }"#;
        let item: TaskItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.time_estimate_minutes(), None);
        let calc = item.requirement(&RequirementId::new("a")).unwrap();
        assert_eq!(
            calc.spec,
            RequirementSpec::Calculation {
                correct_answer: 1000.0,
                tolerance: 0.0,
                explanation: None,
            }
        );
        assert_eq!(item.scoreable_count(), 1);
    }

    #[test]
    fn deserialization_runs_validation() {
        let json = r#"{"id": "x", "title": "T", "requirements": []}"#;
        assert!(serde_json::from_str::<TaskItem>(json).is_err());
    }

    #[test]
    fn reference_exposes_correct_option_text() {
        let req = mc("r1", 1);
        match req.reference() {
            ReferenceAnswer::MultipleChoice {
                correct_index,
                correct_option,
                ..
            } => {
                assert_eq!(correct_index, 1);
                assert_eq!(correct_option, Some("B"));
            }
            other => panic!("unexpected reference: {other:?}"),
        }
    }
}
