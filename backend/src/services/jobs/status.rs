use crate::job_controller::state::JobsState;
use actix_web::{web, HttpResponse, Responder};

pub(crate) async fn process(
    job_id: web::Path<String>,
    state: web::Data<JobsState>,
) -> impl Responder {
    let jobs = state.jobs.read().await;
    if let Some(status) = jobs.get(job_id.as_str()) {
        HttpResponse::Ok().json(status)
    } else {
        HttpResponse::NotFound().body("Job ID not found")
    }
}
