//! Event configuration endpoints.
//!
//! Events live wholesale in `Events.json`; every mutation re-reads and
//! re-writes the full list.
//!
//! Routes:
//! - `GET  /api/events` — the configured events.
//! - `POST /api/events/save` — upsert one event; validation errors come
//!   back as a field → message map with status 400.
//! - `POST /api/events/duplicate/{name}` — deep copy under a fresh id.

mod duplicate;
mod list;
mod save;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/events";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(list::process))
        .route("/save", post().to(save::process))
        .route("/duplicate/{name}", post().to(duplicate::process))
}
