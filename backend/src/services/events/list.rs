use crate::session::Session;
use actix_web::{web, HttpResponse, Responder};

pub(crate) async fn process(session: web::Data<Session>) -> impl Responder {
    match session.store.events() {
        Ok(events) => HttpResponse::Ok().json(events),
        Err(e) => HttpResponse::ServiceUnavailable().body(format!("Error loading events: {e}")),
    }
}
