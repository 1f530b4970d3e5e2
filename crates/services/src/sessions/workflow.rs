use std::sync::{Arc, Mutex};
use std::time::Duration;

use storage::repository::{QuestionBank, StudyProgressRepository};
use tbs_core::timer::TickOutcome;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::countdown::CountdownHandle;
use super::plan::Selector;
use super::service::{SimulationSession, SubmitOutcome};
use crate::Clock;
use crate::error::SessionError;

/// Orchestrates session start, submission and study-progress recording.
#[derive(Clone)]
pub struct SimulationLoopService {
    clock: Clock,
    bank: Arc<dyn QuestionBank>,
    progress: Arc<dyn StudyProgressRepository>,
    selector: Selector,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SimulationLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        bank: Arc<dyn QuestionBank>,
        progress: Arc<dyn StudyProgressRepository>,
    ) -> Self {
        Self {
            clock,
            bank,
            progress,
            selector: Selector::default(),
            pending: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Replace the time source used for later transitions.
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    /// Start a new session for a subject area.
    ///
    /// An area without task items yields a session in `SessionPhase::Unavailable`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the question bank cannot be read.
    pub async fn start_session(&self, area: &str) -> Result<SimulationSession, SessionError> {
        let mut session = SimulationSession::new(area);
        let pool = self.bank.task_items_for_area(area).await?;
        let pool_len = pool.len();
        let selection = self.selector.select(pool);
        let phase = session.load(selection, self.clock.now())?;
        info!(
            area,
            pool = pool_len,
            selected = session.item_count(),
            ?phase,
            "simulation session started"
        );
        Ok(session)
    }

    /// Submit the session and record it in study history once.
    ///
    /// A session already submitted or expired through `SimulationSession`
    /// directly is recorded here if it has not been yet. Recording is
    /// fire-and-forget: its failure is logged and never alters the returned
    /// result.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInProgress` if the session was never loaded
    /// or is unavailable.
    pub fn submit(&self, session: &mut SimulationSession) -> Result<SubmitOutcome, SessionError> {
        let outcome = session.submit(self.clock.now())?;
        if outcome.newly_submitted {
            info!(
                area = session.area(),
                score = outcome.result.score_percent,
                "simulation session submitted"
            );
        }
        self.record_progress(session);
        Ok(outcome)
    }

    /// Advance the session clock by one second, recording progress once submitted.
    pub fn tick(&self, session: &mut SimulationSession) -> TickOutcome {
        let outcome = session.tick(self.clock.now());
        if outcome == TickOutcome::Expired {
            info!(area = session.area(), "simulation session expired");
        }
        if session.is_submitted() {
            self.record_progress(session);
        }
        outcome
    }

    /// Drive the session clock on a fixed interval until expiry or submission.
    ///
    /// The driver only holds a weak reference: dropping the session stops it.
    /// Dropping or cancelling the returned handle stops it as well.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoRuntime` when called outside a Tokio runtime.
    pub fn spawn_countdown(
        &self,
        session: &Arc<Mutex<SimulationSession>>,
        period: Duration,
    ) -> Result<CountdownHandle, SessionError> {
        CountdownHandle::spawn(self.clone(), Arc::downgrade(session), period)
    }

    /// Wait for progress records spawned so far to finish.
    ///
    /// Intended for shutdown; the submission path never waits on recording.
    pub async fn flush_pending(&self) {
        let handles = self
            .pending
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default();
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "progress record task did not complete");
            }
        }
    }

    fn record_progress(&self, session: &mut SimulationSession) {
        if session.progress_recorded() {
            return;
        }
        let Some(record) = session.completed_record() else {
            return;
        };
        session.mark_progress_recorded();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                label = record.label(),
                "no async runtime; completed session not recorded"
            );
            return;
        };
        let progress = Arc::clone(&self.progress);
        let task = runtime.spawn(async move {
            match progress.record_completed_session(&record).await {
                Ok(id) => debug!(id, label = record.label(), "completed session recorded"),
                Err(err) => warn!(
                    label = record.label(),
                    error = %err,
                    "failed to record completed session"
                ),
            }
        });
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|task| !task.is_finished());
            pending.push(task);
        }
    }
}
