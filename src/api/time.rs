use chrono::NaiveDateTime;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{User, Widget};
use crate::db::Stores;
use crate::db::time_entries::{self, EntryDraft, TimeFilter, TimeSummary};
use crate::models::TimeEntry;
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt, reject};

use super::{SuccessResponse, parse_date, today};

#[derive(Debug, Deserialize, Validate)]
pub struct EntryRequest {
    #[validate(length(min = 1, message = "Task name is required"))]
    pub task_name: String,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub duration_seconds: i64,
}

impl EntryRequest {
    fn into_draft(self) -> EntryDraft {
        EntryDraft {
            task_name: self.task_name.trim().to_string(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration_seconds: self.duration_seconds,
        }
    }
}

#[get("/time?<filter>&<start>&<end>")]
pub async fn api_time_summary(
    filter: Option<String>,
    start: Option<String>,
    end: Option<String>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<TimeSummary>> {
    user.require_widget(Widget::TimeTracker).validate_custom()?;

    let start = parse_date("start", start.as_deref())?;
    let end = parse_date("end", end.as_deref())?;
    let filter = TimeFilter::parse(filter.as_deref().unwrap_or("today"), start, end);

    let summary = time_entries::summary(&stores.time_entries, &user.email, &filter, today())
        .await
        .validate_custom()?;
    Ok(Json(summary))
}

/// Saves an entry recorded by the client's running timer.
#[post("/time/entries", data = "<entry>")]
pub async fn api_save_entry(
    entry: Json<EntryRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<TimeEntry>> {
    user.require_widget(Widget::TimeTracker).validate_custom()?;
    let entry = entry.validate_custom()?;

    let saved = time_entries::save_entry(&stores.time_entries, &user.email, entry.into_draft())
        .await
        .validate_custom()?;
    Ok(Json(saved))
}

#[post("/time/manual", data = "<entry>")]
pub async fn api_add_manual_entry(
    entry: Json<EntryRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<TimeEntry>> {
    user.require_widget(Widget::TimeTracker).validate_custom()?;
    let entry = entry.validate_custom()?;

    let saved = time_entries::add_manual_entry(&stores.time_entries, &user.email, entry.into_draft())
        .await
        .validate_custom()?;
    Ok(Json(saved))
}

#[put("/time/entries/<id>", data = "<entry>")]
pub async fn api_update_entry(
    id: i64,
    entry: Json<EntryRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<TimeEntry>> {
    user.require_widget(Widget::TimeTracker).validate_custom()?;
    let entry = entry.validate_custom()?;

    time_entries::update_entry(&stores.time_entries, id, &user.email, entry.into_draft())
        .await
        .validate_custom()?
        .map(Json)
        .ok_or_else(|| reject(Status::NotFound, "resource", "Time entry not found"))
}

#[delete("/time/entries/<id>")]
pub async fn api_delete_entry(
    id: i64,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<SuccessResponse>> {
    user.require_widget(Widget::TimeTracker).validate_custom()?;

    let deleted = time_entries::delete_entry(&stores.time_entries, id, &user.email)
        .await
        .validate_custom()?;
    Ok(SuccessResponse::new(deleted))
}

#[get("/time/recent-tasks")]
pub async fn api_recent_tasks(user: User, stores: &State<Stores>) -> ApiResult<Json<Vec<String>>> {
    user.require_widget(Widget::TimeTracker).validate_custom()?;

    let tasks = time_entries::recent_tasks(&stores.time_entries, &user.email)
        .await
        .validate_custom()?;
    Ok(Json(tasks))
}

pub fn routes() -> Vec<Route> {
    routes![
        api_time_summary,
        api_save_entry,
        api_add_manual_entry,
        api_update_entry,
        api_delete_entry,
        api_recent_tasks,
    ]
}
