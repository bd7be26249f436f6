//! Email dispatch.
//!
//! `POST /api/emails/send` starts a background batch: extract the students
//! from the summary tab, render the template per due (student, type) pair,
//! send, and write the sent markers back. The job's `Completed` payload is
//! the JSON dispatch report — sent count plus per-message failures.

mod send;

use actix_web::web::{post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/emails";

pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/send", post().to(send::process))
}
