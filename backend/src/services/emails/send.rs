use crate::job_controller::state::JobsState;
use crate::mailer::dispatch::Dispatcher;
use crate::services::{engine_for, spawn_event_job};
use crate::session::Session;
use actix_web::{web, HttpResponse, Responder};
use common::requests::SendEmailsRequest;

pub(crate) async fn process(
    state: web::Data<JobsState>,
    session: web::Data<Session>,
    payload: web::Json<SendEmailsRequest>,
) -> impl Responder {
    let request = payload.into_inner();
    let event = match session.event_by_name(&request.event_name) {
        Ok(Some(event)) => event,
        Ok(None) => {
            return HttpResponse::NotFound()
                .body(format!("No event named {:?}", request.event_name))
        }
        Err(e) => {
            return HttpResponse::ServiceUnavailable().body(format!("Error loading events: {e}"))
        }
    };

    let session = session.clone();
    let event_name = event.name.clone();
    match spawn_event_job(&state, event_name, move |cancel, progress| {
        let mut engine = engine_for(&session, event, cancel);
        let mut students = engine.extract_students().map_err(|e| e.to_string())?;

        let dispatcher = Dispatcher::new(&session.mailer, &session.templates);
        let report = dispatcher
            .send_batch(
                &mut engine,
                &mut students,
                request.email_type,
                request.is_test,
                |done, total| {
                    if total > 0 {
                        progress.report_percent(done * 100 / total);
                    }
                },
            )
            .map_err(|e| e.to_string())?;
        serde_json::to_string(&report).map_err(|e| e.to_string())
    })
    .await
    {
        Ok(job_id) => HttpResponse::Ok().json(serde_json::json!({ "job_id": job_id })),
        Err(busy) => HttpResponse::Conflict().body(busy),
    }
}
