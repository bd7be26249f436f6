mod config;
mod job_controller;
mod mailer;
mod services;
mod session;
mod sheets;

use crate::config::FileStore;
use crate::job_controller::state::JobsState;
use crate::session::Session;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Session construction reads the config store and runs the SMTP
    // self-test; keep that off the async runtime.
    let session = tokio::task::spawn_blocking(|| Session::build(FileStore::from_env()))
        .await
        .map_err(std::io::Error::other)?
        .map_err(std::io::Error::other)?;
    let session = web::Data::new(session);

    let (jobs_state, rx) = JobsState::new();
    let updater_state = jobs_state.clone();
    tokio::spawn(async move {
        job_controller::state::start_job_updater(updater_state, rx).await;
    });

    let host = "127.0.0.1";
    let port = 8080;
    info!("Server running at http://{host}:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(1024 * 1024))
            .app_data(web::Data::new(jobs_state.clone()))
            .app_data(session.clone())
            .service(services::events::configure_routes())
            .service(services::tabs::configure_routes())
            .service(services::registrations::configure_routes())
            .service(services::emails::configure_routes())
            .service(services::students::configure_routes())
            .service(services::jobs::configure_routes())
    })
    .bind((host, port))?
    .run()
    .await
}
