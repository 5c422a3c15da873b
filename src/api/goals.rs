use std::collections::BTreeMap;

use chrono::NaiveDate;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{User, Widget};
use crate::db::Stores;
use crate::db::goals::{self, GoalAnalytics, GoalDraft, MilestoneDraft, TaskAction};
use crate::models::{DailyTask, Goal, Priority};
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt};

use super::{SuccessResponse, now, today};

#[derive(Debug, Deserialize)]
pub struct MilestoneRequest {
    pub title: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GoalRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub milestones: Vec<MilestoneRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    pub is_completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct TaskDetailRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskActionRequest {
    AddToDate {
        date: NaiveDate,
        title: String,
        #[serde(default)]
        description: String,
    },
    Edit {
        task_id: String,
        title: String,
        description: Option<String>,
    },
    Delete {
        task_id: String,
    },
}

impl From<TaskActionRequest> for TaskAction {
    fn from(request: TaskActionRequest) -> Self {
        match request {
            TaskActionRequest::AddToDate {
                date,
                title,
                description,
            } => TaskAction::AddToDate {
                date,
                title,
                description,
            },
            TaskActionRequest::Edit {
                task_id,
                title,
                description,
            } => TaskAction::Edit {
                task_id,
                title,
                description,
            },
            TaskActionRequest::Delete { task_id } => TaskAction::Delete { task_id },
        }
    }
}

#[get("/goals")]
pub async fn api_get_goals(user: User, stores: &State<Stores>) -> ApiResult<Json<Vec<Goal>>> {
    user.require_widget(Widget::Goals).validate_custom()?;

    let goals = goals::get_goals(&stores.goals, user.id, today())
        .await
        .validate_custom()?;
    Ok(Json(goals))
}

#[post("/goals", data = "<goal>")]
pub async fn api_create_goal(
    goal: Json<GoalRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<Goal>> {
    user.require_widget(Widget::Goals).validate_custom()?;
    let goal = goal.validate_custom()?;

    let draft = GoalDraft {
        title: goal.title.trim().to_string(),
        description: goal.description,
        category: goal.category,
        priority: goal.priority,
        start_date: goal.start_date,
        end_date: goal.end_date,
        milestones: goal
            .milestones
            .into_iter()
            .map(|m| MilestoneDraft {
                title: m.title,
                due_date: m.due_date,
            })
            .collect(),
    };

    let created = goals::create_goal(&stores.goals, user.id, draft, now())
        .await
        .validate_custom()?;
    Ok(Json(created))
}

#[delete("/goals/<id>")]
pub async fn api_delete_goal(
    id: &str,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<SuccessResponse>> {
    user.require_widget(Widget::Goals).validate_custom()?;

    let deleted = goals::delete_goal(&stores.goals, id, user.id)
        .await
        .validate_custom()?;
    Ok(SuccessResponse::new(deleted))
}

#[get("/goals/analytics")]
pub async fn api_goal_analytics(
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<GoalAnalytics>> {
    user.require_widget(Widget::Goals).validate_custom()?;

    let analytics = goals::analytics(&stores.goals, user.id, today())
        .await
        .validate_custom()?;
    Ok(Json(analytics))
}

#[get("/goals/<id>/tasks")]
pub async fn api_goal_tasks(
    id: &str,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<BTreeMap<String, Vec<DailyTask>>>> {
    user.require_widget(Widget::Goals).validate_custom()?;

    let tasks = goals::tasks_by_date(&stores.goals, id, user.id)
        .await
        .validate_custom()?;
    Ok(Json(tasks))
}

#[post("/goals/<id>/milestones/<milestone_id>/toggle", data = "<request>")]
pub async fn api_toggle_milestone(
    id: &str,
    milestone_id: &str,
    request: Json<CompletionRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<Goal>> {
    user.require_widget(Widget::Goals).validate_custom()?;

    let goal = goals::set_milestone_completed(
        &stores.goals,
        id,
        milestone_id,
        user.id,
        request.is_completed,
        today(),
        now(),
    )
    .await
    .validate_custom()?;
    Ok(Json(goal))
}

#[post("/goals/<id>/tasks/<task_id>/toggle", data = "<request>")]
pub async fn api_toggle_task(
    id: &str,
    task_id: &str,
    request: Json<CompletionRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<Goal>> {
    user.require_widget(Widget::Goals).validate_custom()?;

    let goal = goals::set_task_completed(
        &stores.goals,
        id,
        task_id,
        user.id,
        request.is_completed,
        today(),
        now(),
    )
    .await
    .validate_custom()?;
    Ok(Json(goal))
}

#[put("/goals/<id>/tasks/<task_id>", data = "<request>")]
pub async fn api_update_task(
    id: &str,
    task_id: &str,
    request: Json<TaskDetailRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<Goal>> {
    user.require_widget(Widget::Goals).validate_custom()?;

    let request = request.into_inner();
    let goal = goals::update_task_detail(
        &stores.goals,
        id,
        task_id,
        user.id,
        request.title,
        request.description,
        today(),
        now(),
    )
    .await
    .validate_custom()?;
    Ok(Json(goal))
}

#[post("/goals/<id>/tasks/action", data = "<request>")]
pub async fn api_task_action(
    id: &str,
    request: Json<TaskActionRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<Goal>> {
    user.require_widget(Widget::Goals).validate_custom()?;

    let goal = goals::task_action(
        &stores.goals,
        id,
        user.id,
        request.into_inner().into(),
        today(),
        now(),
    )
    .await
    .validate_custom()?;
    Ok(Json(goal))
}

#[post("/goals/<id>/redistribute")]
pub async fn api_redistribute_tasks(
    id: &str,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<Goal>> {
    user.require_widget(Widget::Goals).validate_custom()?;

    let goal = goals::redistribute_tasks(&stores.goals, id, user.id, today(), now())
        .await
        .validate_custom()?;
    Ok(Json(goal))
}

pub fn routes() -> Vec<Route> {
    routes![
        api_get_goals,
        api_create_goal,
        api_delete_goal,
        api_goal_analytics,
        api_goal_tasks,
        api_toggle_milestone,
        api_toggle_task,
        api_update_task,
        api_task_action,
        api_redistribute_tasks,
    ]
}
