use crate::job_controller::state::JobsState;
use actix_web::{web, HttpResponse, Responder};

pub(crate) async fn process(
    job_id: web::Path<String>,
    state: web::Data<JobsState>,
) -> impl Responder {
    if state.cancel_job(&job_id) {
        HttpResponse::Ok().body("Cancellation requested")
    } else {
        HttpResponse::NotFound().body("Job ID not found or already finished")
    }
}
