//! HTTP surface.
//!
//! Thin route handlers only: each service area exposes a `configure_routes`
//! scope and delegates to the engine or the config store. Long-running
//! operations go through `spawn_event_job`, which claims the event's busy
//! flag, runs the blocking work on the dedicated pool and reports through
//! the job controller; the client polls `/api/jobs/status/{job_id}`.

pub mod emails;
pub mod events;
pub mod jobs;
pub mod registrations;
pub mod students;
pub mod tabs;

use crate::job_controller::state::{CancelToken, JobUpdate, JobsState};
use crate::session::Session;
use crate::sheets::Engine;
use actix_web::web;
use common::jobs::JobStatus;
use common::model::event::Event;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Handle a blocking job uses to report progress percentages.
pub(crate) struct JobProgress {
    tx: mpsc::Sender<JobUpdate>,
    job_id: String,
}

impl JobProgress {
    pub(crate) fn report_percent(&self, percent: u32) {
        let _ = self.tx.blocking_send(JobUpdate::new(
            self.job_id.clone(),
            JobStatus::InProgress(percent),
        ));
    }
}

/// Claims the event's busy flag, registers the job and runs the blocking
/// work. Returns the job id for status polling; an event with an operation
/// already in flight is refused — the handler answers 409.
pub(crate) async fn spawn_event_job<F>(
    state: &web::Data<JobsState>,
    event_name: String,
    job: F,
) -> Result<String, String>
where
    F: FnOnce(CancelToken, JobProgress) -> Result<String, String> + Send + 'static,
{
    if !state.try_claim_event(&event_name) {
        return Err(format!(
            "another operation is already running for event {event_name:?}"
        ));
    }
    let job_id = Uuid::new_v4().to_string();
    let cancel = state.register_cancel(&job_id);
    state
        .jobs
        .write()
        .await
        .insert(job_id.clone(), JobStatus::Pending);

    let tx = state.tx.clone();
    let jobs_state = state.get_ref().clone();
    let id = job_id.clone();
    tokio::spawn(async move {
        let _ = tx
            .send(JobUpdate::new(id.clone(), JobStatus::InProgress(0)))
            .await;
        let progress = JobProgress {
            tx: tx.clone(),
            job_id: id.clone(),
        };
        let status = match tokio::task::spawn_blocking(move || job(cancel, progress)).await {
            Ok(Ok(message)) => JobStatus::Completed(message),
            Ok(Err(error)) => JobStatus::Failed(error),
            Err(join_error) => JobStatus::Failed(format!("task join error: {join_error}")),
        };
        let _ = tx.send(JobUpdate::new(id.clone(), status)).await;
        jobs_state.release_event(&event_name);
        jobs_state.clear_cancel(&id);
    });
    Ok(job_id)
}

/// Engine bound to this session's clients, for one event.
pub(crate) fn engine_for(session: &Session, event: Event, cancel: CancelToken) -> Engine {
    Engine::new(session.api.clone(), event, session.settings.clone(), cancel)
}
