use crate::job_controller::state::JobsState;
use crate::services::{engine_for, spawn_event_job};
use crate::session::Session;
use actix_web::{web, HttpResponse, Responder};
use common::requests::EventRequest;

pub(crate) async fn process(
    state: web::Data<JobsState>,
    session: web::Data<Session>,
    payload: web::Json<EventRequest>,
) -> impl Responder {
    let event = match session.event_by_name(&payload.event_name) {
        Ok(Some(event)) => event,
        Ok(None) => {
            return HttpResponse::NotFound()
                .body(format!("No event named {:?}", payload.event_name))
        }
        Err(e) => {
            return HttpResponse::ServiceUnavailable().body(format!("Error loading events: {e}"))
        }
    };

    let session = session.clone();
    let event_name = event.name.clone();
    match spawn_event_job(&state, event_name, move |cancel, _progress| {
        let mut engine = engine_for(&session, event, cancel);
        engine.generate_tabs().map_err(|e| e.to_string())?;
        Ok("tabs generated".to_string())
    })
    .await
    {
        Ok(job_id) => HttpResponse::Ok().json(serde_json::json!({ "job_id": job_id })),
        Err(busy) => HttpResponse::Conflict().body(busy),
    }
}
