mod answer;
mod ids;
mod session;
mod task;

pub use ids::{ParseIdError, RequirementId, TaskItemId};

pub use answer::{Answer, AnswerKey, AnswerSheet};
pub use session::{
    CompletedSession, CompletedSessionError, ItemScore, Outcome, RequirementScore, SessionResult,
};
pub use task::{
    JournalLine, ReferenceAnswer, Requirement, RequirementKind, RequirementSpec, RubricCriterion,
    TaskItem, TaskItemDraft, TaskItemError,
};
