use crate::job_controller::state::CancelToken;
use crate::services::engine_for;
use crate::session::Session;
use actix_web::{web, HttpResponse, Responder};

pub(crate) async fn process(
    session: web::Data<Session>,
    event_name: web::Path<String>,
) -> impl Responder {
    let event = match session.event_by_name(&event_name) {
        Ok(Some(event)) => event,
        Ok(None) => {
            return HttpResponse::NotFound()
                .body(format!("No event named {:?}", event_name.as_str()))
        }
        Err(e) => {
            return HttpResponse::ServiceUnavailable().body(format!("Error loading events: {e}"))
        }
    };

    let session = session.clone();
    let result = web::block(move || {
        let mut engine = engine_for(&session, event, CancelToken::default());
        engine.extract_students().map_err(|e| e.to_string())
    })
    .await;

    match result {
        Ok(Ok(students)) => HttpResponse::Ok().json(students),
        Ok(Err(e)) => {
            HttpResponse::ServiceUnavailable().body(format!("Error extracting students: {e}"))
        }
        Err(e) => HttpResponse::InternalServerError().body(format!("Task join error: {e}")),
    }
}
