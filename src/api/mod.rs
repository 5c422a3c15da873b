pub mod activity;
pub mod admin;
pub mod auth;
pub mod goals;
pub mod habits;
pub mod notes;
pub mod pdfs;
pub mod security;
pub mod time;

use chrono::{Local, NaiveDate, NaiveDateTime};
use rocket::Route;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};

use crate::validation::{ValidationResponse, reject};

pub use activity::ActivityFairing;

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn new(success: bool) -> Json<Self> {
        Json(Self { success })
    }
}

/// Local calendar date used for every date-based rule.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Parses an optional `YYYY-MM-DD` query value.
pub fn parse_date(
    field: &str,
    value: Option<&str>,
) -> Result<Option<NaiveDate>, Custom<Json<ValidationResponse>>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                reject(
                    Status::UnprocessableEntity,
                    field,
                    "Dates must be formatted as YYYY-MM-DD",
                )
            }),
    }
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

pub fn routes() -> Vec<Route> {
    let mut routes = routes![health];
    routes.extend(auth::routes());
    routes.extend(security::routes());
    routes.extend(admin::routes());
    routes.extend(activity::routes());
    routes.extend(notes::routes());
    routes.extend(habits::routes());
    routes.extend(goals::routes());
    routes.extend(time::routes());
    routes.extend(pdfs::routes());
    routes
}
