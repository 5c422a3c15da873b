#[macro_use]
extern crate rocket;

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod models;
pub mod telemetry;
pub mod validation;
#[cfg(test)]
mod test;

use api::ActivityFairing;
use auth::{SessionStore, forbidden_api, not_found_api, unauthorized_api};
use config::AppConfig;
use db::Stores;
use error::AppError;
use mailer::Mailer;
use rocket::{Build, Rocket};
use telemetry::TelemetryFairing;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Figment(rocket::figment::Error),
    #[error("Environment error: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::figment::Error> for Error {
    fn from(value: rocket::figment::Error) -> Self {
        Error::Figment(value)
    }
}

pub fn init_rocket(
    config: AppConfig,
    stores: Stores,
    sessions: SessionStore,
    mailer: Box<dyn Mailer>,
) -> Rocket<Build> {
    info!("Starting student hub");

    rocket::build()
        .manage(config)
        .manage(stores)
        .manage(sessions)
        .manage(mailer)
        .mount("/api", api::routes())
        .register(
            "/api",
            catchers![unauthorized_api, forbidden_api, not_found_api],
        )
        .attach(TelemetryFairing)
        .attach(ActivityFairing)
}
