use crate::session::Session;
use actix_web::{web, HttpResponse, Responder};
use common::model::event::Event;

pub(crate) async fn process(
    session: web::Data<Session>,
    name: web::Path<String>,
) -> impl Responder {
    match duplicate_event(&session, &name) {
        Ok(Some(event)) => HttpResponse::Ok().json(event),
        Ok(None) => HttpResponse::NotFound().body(format!("No event named {:?}", name.as_str())),
        Err(e) => HttpResponse::ServiceUnavailable().body(format!("Error duplicating event: {e}")),
    }
}

fn duplicate_event(session: &Session, name: &str) -> Result<Option<Event>, String> {
    let mut events = session.store.events().map_err(|e| e.to_string())?;
    let Some(source) = events.iter().find(|event| event.name == name) else {
        return Ok(None);
    };
    let mut copy = source.duplicate();
    copy.id = events.iter().map(|e| e.id).max().unwrap_or(0) + 1;
    events.push(copy.clone());
    session.store.save_events(&events).map_err(|e| e.to_string())?;
    Ok(Some(copy))
}
