mod countdown;
mod plan;
mod progress;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use countdown::CountdownHandle;
pub use plan::{DEFAULT_ITEM_MINUTES, DEFAULT_MAX_ITEMS, Selection, Selector};
pub use progress::SessionProgress;
pub use service::{
    ItemReview, RequirementReview, SessionPhase, SimulationSession, SubmitOutcome,
};
pub use view::{StudyHistoryItem, StudyHistoryService, StudySessionId};
pub use workflow::SimulationLoopService;
