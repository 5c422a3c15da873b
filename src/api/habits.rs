use chrono::NaiveDate;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::{Deserialize, Serialize};

use crate::auth::{User, Widget};
use crate::db::Stores;
use crate::db::habits::{self, HabitDraft};
use crate::models::{Frequency, Habit};
use crate::validation::{ApiResult, AppErrorExt, PermissionCheckExt, reject};

use super::{SuccessResponse, today};

#[derive(Debug, Deserialize)]
pub struct HabitRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub frequency_type: Frequency,
    #[serde(default)]
    pub custom_days: Vec<String>,
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub goal: String,
}

impl HabitRequest {
    fn into_draft(self) -> HabitDraft {
        HabitDraft {
            name: self.name,
            description: self.description,
            frequency_type: self.frequency_type,
            custom_days: self.custom_days,
            start_date: self.start_date.unwrap_or_else(today),
            goal: self.goal,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub habit_id: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub success: bool,
    pub completed: bool,
}

#[get("/habits")]
pub async fn api_get_habits(user: User, stores: &State<Stores>) -> ApiResult<Json<Vec<Habit>>> {
    user.require_widget(Widget::Habits).validate_custom()?;

    let habits = habits::get_habits(&stores.habits, &user.email)
        .await
        .validate_custom()?;
    Ok(Json(habits))
}

#[post("/habits", data = "<habit>")]
pub async fn api_create_habit(
    habit: Json<HabitRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<Habit>> {
    user.require_widget(Widget::Habits).validate_custom()?;

    let created = habits::create_habit(&stores.habits, &user.email, habit.into_inner().into_draft())
        .await
        .validate_custom()?;
    Ok(Json(created))
}

#[put("/habits/<id>", data = "<habit>")]
pub async fn api_update_habit(
    id: &str,
    habit: Json<HabitRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<Habit>> {
    user.require_widget(Widget::Habits).validate_custom()?;

    habits::update_habit(&stores.habits, id, &user.email, habit.into_inner().into_draft())
        .await
        .validate_custom()?
        .map(Json)
        .ok_or_else(|| reject(Status::NotFound, "resource", "Habit not found"))
}

#[delete("/habits/<id>")]
pub async fn api_delete_habit(
    id: &str,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<SuccessResponse>> {
    user.require_widget(Widget::Habits).validate_custom()?;

    let deleted = habits::delete_habit(&stores.habits, id, &user.email)
        .await
        .validate_custom()?;
    Ok(SuccessResponse::new(deleted))
}

#[post("/habits/toggle", data = "<toggle>")]
pub async fn api_toggle_habit(
    toggle: Json<ToggleRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<ToggleResponse>> {
    user.require_widget(Widget::Habits).validate_custom()?;

    let date = toggle.date.unwrap_or_else(today);
    let completed = habits::toggle_completion(&stores.habits, &toggle.habit_id, &user.email, date)
        .await
        .validate_custom()?;

    Ok(Json(ToggleResponse {
        success: true,
        completed,
    }))
}

pub fn routes() -> Vec<Route> {
    routes![
        api_get_habits,
        api_create_habit,
        api_update_habit,
        api_delete_habit,
        api_toggle_habit,
    ]
}
