#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use tbs_core::Clock;
pub use sessions as session;

pub use error::SessionError;

pub use sessions::{
    CountdownHandle, DEFAULT_ITEM_MINUTES, DEFAULT_MAX_ITEMS, ItemReview, RequirementReview,
    Selection, Selector, SessionPhase, SessionProgress, SimulationLoopService, SimulationSession,
    StudyHistoryItem, StudyHistoryService, SubmitOutcome,
};
