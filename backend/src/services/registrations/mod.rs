//! Registration sync.
//!
//! `POST /api/registrations/sync` starts a background job appending the
//! registrations that arrived since the last sync. Only meaningful for
//! merged-course events; non-merged events keep themselves current through
//! their projection formulas and the job completes as a no-op.

mod sync;

use actix_web::web::{post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/registrations";

pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/sync", post().to(sync::process))
}
