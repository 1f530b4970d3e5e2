use std::sync::{Mutex, Weak};
use std::time::Duration;

use tbs_core::timer::TickOutcome;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::service::SimulationSession;
use super::workflow::SimulationLoopService;
use crate::error::SessionError;

/// Background driver for a session's countdown.
///
/// Aborts the driving task when cancelled or dropped.
#[derive(Debug)]
pub struct CountdownHandle {
    task: Option<JoinHandle<()>>,
}

impl CountdownHandle {
    pub(crate) fn spawn(
        service: SimulationLoopService,
        session: Weak<Mutex<SimulationSession>>,
        period: Duration,
    ) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let task = runtime.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(session) = session.upgrade() else {
                    debug!("session dropped; countdown stopped");
                    break;
                };
                let outcome = {
                    let Ok(mut guard) = session.lock() else {
                        warn!("session lock poisoned; countdown stopped");
                        break;
                    };
                    service.tick(&mut guard)
                };
                if !matches!(outcome, TickOutcome::Running { .. }) {
                    debug!(?outcome, "countdown finished");
                    break;
                }
            }
        });
        Ok(Self { task: Some(task) })
    }

    /// Stop driving the countdown. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Clock, Selection, SessionPhase};
    use std::sync::Arc;
    use storage::repository::{InMemoryRepository, StudyProgressRepository};
    use tbs_core::model::{Requirement, RequirementSpec, TaskItem, TaskItemDraft, TaskItemId};
    use tbs_core::time::fixed_now;

    fn build_item(minutes: u32) -> TaskItem {
        TaskItemDraft {
            id: TaskItemId::new("timed"),
            title: "Timed".into(),
            scenario: String::new(),
            time_estimate_minutes: Some(minutes),
            requirements: vec![Requirement::new(
                "r1",
                "Compute",
                RequirementSpec::Calculation {
                    correct_answer: 10.0,
                    tolerance: 0.0,
                    explanation: None,
                },
            )],
            hints: Vec::new(),
            references: Vec::new(),
        }
        .validate()
        .unwrap()
    }

    fn fixture() -> (SimulationLoopService, InMemoryRepository, Arc<Mutex<SimulationSession>>) {
        let repo = InMemoryRepository::new();
        let service = SimulationLoopService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        let session = SimulationSession::start(
            "FAR",
            Selection::from_items(vec![build_item(1)]),
            fixed_now(),
        );
        (service, repo, Arc::new(Mutex::new(session)))
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expires_and_records_once() {
        let (service, repo, session) = fixture();
        let handle = service
            .spawn_countdown(&session, Duration::from_secs(1))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        service.flush_pending().await;

        {
            let guard = session.lock().unwrap();
            assert_eq!(guard.phase(), SessionPhase::Submitted);
            assert_eq!(guard.remaining_seconds(), 0);
        }
        assert!(handle.is_finished());
        assert_eq!(repo.list_recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_countdown_stops_ticking() {
        let (service, _repo, session) = fixture();
        let mut handle = service
            .spawn_countdown(&session, Duration::from_secs(1))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        handle.cancel();
        let remaining = session.lock().unwrap().remaining_seconds();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(remaining, 57);
        assert_eq!(session.lock().unwrap().remaining_seconds(), 57);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_session_ends_the_driver() {
        let (service, repo, session) = fixture();
        let handle = service
            .spawn_countdown(&session, Duration::from_secs(1))
            .unwrap();
        drop(session);

        tokio::time::sleep(Duration::from_secs(2)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(handle.is_finished());
        assert!(repo.list_recent(10).await.unwrap().is_empty());
    }

    #[test]
    fn spawning_outside_a_runtime_fails() {
        let (service, _repo, session) = fixture();
        let err = service
            .spawn_countdown(&session, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, SessionError::NoRuntime));
    }
}
