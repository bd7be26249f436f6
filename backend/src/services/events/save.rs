use crate::session::Session;
use actix_web::{web, HttpResponse, Responder};
use common::model::event::Event;
use std::collections::BTreeMap;

enum SaveError {
    Validation(BTreeMap<String, String>),
    Store(String),
}

pub(crate) async fn process(
    session: web::Data<Session>,
    payload: web::Json<Event>,
) -> impl Responder {
    match save_event(&session, payload.into_inner()) {
        Ok(event) => HttpResponse::Ok().json(event),
        Err(SaveError::Validation(errors)) => HttpResponse::BadRequest().json(errors),
        Err(SaveError::Store(e)) => {
            HttpResponse::ServiceUnavailable().body(format!("Error saving event: {e}"))
        }
    }
}

/// Validates and upserts one event. A zero id means "new"; the definitive
/// id is assigned here.
fn save_event(session: &Session, mut event: Event) -> Result<Event, SaveError> {
    let errors = event.validate();
    if !errors.is_empty() {
        return Err(SaveError::Validation(errors));
    }

    let mut events = session
        .store
        .events()
        .map_err(|e| SaveError::Store(e.to_string()))?;
    if event.id == 0 {
        event.id = events.iter().map(|e| e.id).max().unwrap_or(0) + 1;
    }
    match events.iter_mut().find(|e| e.id == event.id) {
        Some(slot) => *slot = event.clone(),
        None => events.push(event.clone()),
    }
    session
        .store
        .save_events(&events)
        .map_err(|e| SaveError::Store(e.to_string()))?;
    Ok(event)
}
