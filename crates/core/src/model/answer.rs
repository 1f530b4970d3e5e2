use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::ids::{RequirementId, TaskItemId};
use crate::model::task::{JournalLine, RequirementKind};

/// A learner's response to one requirement.
///
/// The variant must match the kind of the requirement it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    JournalEntry(Vec<JournalLine>),
    /// Raw submitted text; coerced to a number when scored.
    Calculation(String),
    MultipleChoice(usize),
    WrittenResponse(String),
}

impl Answer {
    #[must_use]
    pub fn kind(&self) -> RequirementKind {
        match self {
            Self::JournalEntry(_) => RequirementKind::JournalEntry,
            Self::Calculation(_) => RequirementKind::Calculation,
            Self::MultipleChoice(_) => RequirementKind::MultipleChoice,
            Self::WrittenResponse(_) => RequirementKind::WrittenResponse,
        }
    }

    /// Convenience for numeric input that was already parsed by the caller.
    #[must_use]
    pub fn calculation(value: f64) -> Self {
        Self::Calculation(value.to_string())
    }
}

/// Key of an answer within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnswerKey {
    pub item_id: TaskItemId,
    pub requirement_id: RequirementId,
}

impl AnswerKey {
    #[must_use]
    pub fn new(item_id: TaskItemId, requirement_id: RequirementId) -> Self {
        Self {
            item_id,
            requirement_id,
        }
    }
}

/// Answers recorded during one session, at most one per key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnswerSheet {
    entries: HashMap<AnswerKey, Answer>,
}

impl AnswerSheet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an answer, replacing any previous answer for the same key.
    ///
    /// Returns the replaced answer, if any.
    pub fn record(&mut self, key: AnswerKey, answer: Answer) -> Option<Answer> {
        self.entries.insert(key, answer)
    }

    #[must_use]
    pub fn get(&self, item_id: &TaskItemId, requirement_id: &RequirementId) -> Option<&Answer> {
        // HashMap lookups need an owned key; answer sheets are small.
        self.entries
            .get(&AnswerKey::new(item_id.clone(), requirement_id.clone()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of answers recorded for one task item.
    #[must_use]
    pub fn answered_in(&self, item_id: &TaskItemId) -> usize {
        self.entries.keys().filter(|k| &k.item_id == item_id).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AnswerKey, &Answer)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(item: &str, req: &str) -> AnswerKey {
        AnswerKey::new(TaskItemId::new(item), RequirementId::new(req))
    }

    #[test]
    fn record_replaces_existing_answer() {
        let mut sheet = AnswerSheet::new();
        assert!(sheet.record(key("i1", "r1"), Answer::MultipleChoice(0)).is_none());
        let previous = sheet.record(key("i1", "r1"), Answer::MultipleChoice(2));

        assert_eq!(previous, Some(Answer::MultipleChoice(0)));
        assert_eq!(sheet.len(), 1);
        assert_eq!(
            sheet.get(&TaskItemId::new("i1"), &RequirementId::new("r1")),
            Some(&Answer::MultipleChoice(2))
        );
    }

    #[test]
    fn answered_in_counts_per_item() {
        let mut sheet = AnswerSheet::new();
        sheet.record(key("i1", "r1"), Answer::Calculation("10".into()));
        sheet.record(key("i1", "r2"), Answer::WrittenResponse("memo".into()));
        sheet.record(key("i2", "r1"), Answer::MultipleChoice(1));

        assert_eq!(sheet.answered_in(&TaskItemId::new("i1")), 2);
        assert_eq!(sheet.answered_in(&TaskItemId::new("i2")), 1);
        assert_eq!(sheet.answered_in(&TaskItemId::new("i3")), 0);
    }

    #[test]
    fn answer_kind_matches_variant() {
        assert_eq!(Answer::calculation(1.5).kind(), RequirementKind::Calculation);
        assert_eq!(
            Answer::JournalEntry(Vec::new()).kind(),
            RequirementKind::JournalEntry
        );
    }

    #[test]
    fn answer_json_shape_is_tagged() {
        let json = serde_json::to_string(&Answer::MultipleChoice(3)).unwrap();
        assert_eq!(json, r#"{"type":"multiple_choice","value":3}"#);
    }
}
