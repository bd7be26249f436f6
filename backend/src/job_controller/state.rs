//! Shared state for long-running background jobs.
//!
//! Tab generation, registration sync and email batches run outside the
//! request/response cycle: the handler registers a job, spawns the work and
//! returns a job id the client polls via `/api/jobs/status/{job_id}`.
//!
//! The pieces:
//! - `JobsState`: clonable, thread-safe container injected as Actix app
//!   data. Holds the status map, the per-event busy flags and the
//!   cancellation tokens.
//! - `JobUpdate`: message a background job sends to report a status change.
//! - `start_job_updater`: the single consumer task applying those messages
//!   to the status map.
//! - `CancelToken`: cooperative cancellation; the engine checks it between
//!   retry sleeps, never mid-request.

use common::jobs::JobStatus;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock};

/// Cooperative cancellation flag shared between a job and its controller.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Status update for one background job, consumed by `start_job_updater`.
#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
}

impl JobUpdate {
    pub fn new(job_id: String, status: JobStatus) -> Self {
        JobUpdate { job_id, status }
    }
}

/// Thread-safe, shareable container for the state of all background jobs.
///
/// Only one operation may be in flight per event: operations claim the
/// event name before scheduling and release it when done. Concurrent
/// sessions against the same spreadsheet are not guarded here.
#[derive(Clone)]
pub struct JobsState {
    /// Single source of truth for every job's status.
    pub jobs: Arc<RwLock<HashMap<String, JobStatus>>>,
    /// Sender background jobs use to push status updates.
    pub tx: mpsc::Sender<JobUpdate>,
    busy_events: Arc<Mutex<HashSet<String>>>,
    cancel_tokens: Arc<Mutex<HashMap<String, CancelToken>>>,
}

impl JobsState {
    pub fn new() -> (Self, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(100);
        let state = JobsState {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
            busy_events: Arc::new(Mutex::new(HashSet::new())),
            cancel_tokens: Arc::new(Mutex::new(HashMap::new())),
        };
        (state, rx)
    }

    /// Claims the event's busy flag; false when an operation is already in
    /// flight for it.
    pub fn try_claim_event(&self, event_name: &str) -> bool {
        self.busy_events
            .lock()
            .unwrap()
            .insert(event_name.to_string())
    }

    pub fn release_event(&self, event_name: &str) {
        self.busy_events.lock().unwrap().remove(event_name);
    }

    /// Creates and stores the cancellation token for a new job.
    pub fn register_cancel(&self, job_id: &str) -> CancelToken {
        let token = CancelToken::default();
        self.cancel_tokens
            .lock()
            .unwrap()
            .insert(job_id.to_string(), token.clone());
        token
    }

    /// Cancels a job; false when the job is unknown or already finished.
    pub fn cancel_job(&self, job_id: &str) -> bool {
        match self.cancel_tokens.lock().unwrap().get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn clear_cancel(&self, job_id: &str) {
        self.cancel_tokens.lock().unwrap().remove(job_id);
    }
}

/// Applies `JobUpdate` messages to the shared status map. Spawned once at
/// startup and runs for the lifetime of the process.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        jobs.insert(update.job_id.clone(), update.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_flag_is_exclusive_per_event() {
        let (state, _rx) = JobsState::new();
        assert!(state.try_claim_event("Autumn"));
        assert!(!state.try_claim_event("Autumn"));
        assert!(state.try_claim_event("Spring"));
        state.release_event("Autumn");
        assert!(state.try_claim_event("Autumn"));
    }

    #[test]
    fn cancel_reaches_the_registered_token() {
        let (state, _rx) = JobsState::new();
        let token = state.register_cancel("job-1");
        assert!(!token.is_cancelled());
        assert!(state.cancel_job("job-1"));
        assert!(token.is_cancelled());
        assert!(!state.cancel_job("job-2"));
        state.clear_cancel("job-1");
        assert!(!state.cancel_job("job-1"));
    }
}
