//! Tab generation and clearing.
//!
//! Both operations run as background jobs against the event's spreadsheet:
//! - `POST /api/tabs/generate` — provisions and fills every derived tab
//!   (registration, summary, accounting, overdue report, group balance,
//!   one payment tab per course).
//! - `POST /api/tabs/clear` — deletes everything except the raw intake tab.
//!
//! Responses carry a `job_id`; poll `/api/jobs/status/{job_id}`.

mod clear;
mod generate;

use actix_web::web::{post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/tabs";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/generate", post().to(generate::process))
        .route("/clear", post().to(clear::process))
}
