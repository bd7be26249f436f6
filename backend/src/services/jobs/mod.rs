//! Background-job polling and cancellation.
//!
//! - `GET  /api/jobs/status/{job_id}` — the job's current `JobStatus`.
//! - `POST /api/jobs/cancel/{job_id}` — requests cooperative cancellation;
//!   the job stops at its next retry checkpoint, never mid-request.

mod cancel;
mod status;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/jobs";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/status/{job_id}", get().to(status::process))
        .route("/cancel/{job_id}", post().to(cancel::process))
}
