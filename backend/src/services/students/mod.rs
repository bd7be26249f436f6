//! Student extraction endpoint.
//!
//! `GET /api/students/{event_name}` reads the computed summary tab and
//! returns the typed student list, commentary included. Synchronous from
//! the client's point of view; the remote reads run on the blocking pool.

mod get;

use actix_web::web::{get, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/students";

pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/{event_name}", get().to(self::get::process))
}
