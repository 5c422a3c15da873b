use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::auth::{
    NewAccount, PendingAction, Permission, Role, SessionStore, SessionToken, User, Widget,
    hash_secret,
};
use crate::config::AppConfig;
use crate::db::Stores;
use crate::db::users::{self, AdminUserUpdate};
use crate::mailer::Mailer;
use crate::validation::{
    ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt, reject,
};

use super::SuccessResponse;
use super::auth::{AuthResponse, hash_optional_pin, send_challenge};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(range(min = 1, max = 150, message = "Age must be between 1 and 150"))]
    pub age: Option<i32>,
    #[serde(default)]
    pub course: String,
    pub role: Option<String>,
    #[serde(default)]
    pub widget_permissions: Vec<String>,
    pub security_pin: Option<String>,
    pub confirm_security_pin: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub password: Option<String>,
    #[validate(range(min = 1, max = 150, message = "Age must be between 1 and 150"))]
    pub age: Option<i32>,
    #[serde(default)]
    pub course: String,
    pub role: String,
    #[serde(default)]
    pub widget_permissions: Vec<String>,
    pub security_pin: Option<String>,
    pub confirm_security_pin: Option<String>,
}

fn parse_role(role: Option<&str>) -> ApiResult<Role> {
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(Role::User),
        Some(role) => role
            .parse()
            .map_err(|_| reject(Status::UnprocessableEntity, "role", "Unknown role")),
    }
}

/// Normalizes widget keys, rejecting any that name no feature.
fn parse_widgets(keys: &[String]) -> ApiResult<Vec<String>> {
    keys.iter()
        .map(|key| {
            Widget::from_key(key.trim())
                .map(|widget| widget.key().to_string())
                .ok_or_else(|| {
                    reject(
                        Status::UnprocessableEntity,
                        "widget_permissions",
                        &format!("Unknown widget: {}", key),
                    )
                })
        })
        .collect()
}

fn course_for(role: Role, course: &str) -> String {
    match role {
        Role::Admin => "Administration".to_string(),
        _ if course.trim().is_empty() => "General".to_string(),
        _ => course.trim().to_string(),
    }
}

#[get("/admin/users")]
pub async fn api_list_users(user: User, stores: &State<Stores>) -> ApiResult<Json<Vec<User>>> {
    user.require_permission(Permission::ManageUsers)
        .validate_custom()?;

    let users = users::get_all_users(&stores.users).await.validate_custom()?;
    Ok(Json(users))
}

#[get("/admin/users/<id>")]
pub async fn api_get_user(id: i64, user: User, stores: &State<Stores>) -> ApiResult<Json<User>> {
    user.require_permission(Permission::ManageUsers)
        .validate_custom()?;

    let found = users::get_user(&stores.users, id).await.validate_custom()?;
    Ok(Json(found))
}

/// Queues a new account. It is written once the code mailed to the new
/// address is entered through `/api/verify-otp`.
#[post("/admin/users", data = "<request>")]
pub async fn api_create_user(
    request: Json<CreateUserRequest>,
    user: User,
    token: SessionToken,
    stores: &State<Stores>,
    sessions: &State<SessionStore>,
    config: &State<AppConfig>,
    mailer: &State<Box<dyn Mailer>>,
) -> ApiResult<Json<AuthResponse>> {
    user.require_permission(Permission::ManageUsers)
        .validate_custom()?;
    let request = request.validate_custom()?;

    let role = parse_role(request.role.as_deref())?;
    let widget_permissions = parse_widgets(&request.widget_permissions)?;
    let security_pin_hash = hash_optional_pin(
        request.security_pin.as_deref(),
        request.confirm_security_pin.as_deref(),
    )?;

    let email = request.email.trim().to_string();
    if users::user_exists(&stores.users, &email).await.validate_custom()? {
        return Err(reject(
            Status::Conflict,
            "email",
            "User with this email already exists",
        ));
    }

    let account = NewAccount {
        email: email.clone(),
        password_hash: hash_secret(&request.password).validate_custom()?,
        name: request.name.trim().to_string(),
        age: Some(request.age.unwrap_or(18)),
        course: course_for(role, &request.course),
        role,
        widget_permissions,
        security_pin_hash,
    };

    send_challenge(
        sessions,
        config,
        mailer.inner().as_ref(),
        &token,
        &email,
        PendingAction::AccountCreation(account),
    )
    .await
    .validate_custom()?;

    info!(admin = %user.email, email = %email, "Account creation pending verification");
    Ok(Json(AuthResponse {
        success: true,
        otp_required: true,
        ..Default::default()
    }))
}

#[put("/admin/users/<id>", data = "<request>")]
pub async fn api_update_user(
    id: i64,
    request: Json<UpdateUserRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<User>> {
    user.require_permission(Permission::ManageUsers)
        .validate_custom()?;
    let request = request.validate_custom()?;

    let role = parse_role(Some(&request.role))?;
    let widget_permissions = parse_widgets(&request.widget_permissions)?;
    let security_pin_hash = hash_optional_pin(
        request.security_pin.as_deref(),
        request.confirm_security_pin.as_deref(),
    )?;
    let password_hash = match request.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_secret(password).validate_custom()?),
        None => None,
    };

    let updated = users::admin_update_user(
        &stores.users,
        id,
        AdminUserUpdate {
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            password_hash,
            age: request.age,
            role,
            course: request.course,
            widget_permissions,
            security_pin_hash,
        },
    )
    .await
    .validate_custom()?;

    Ok(Json(updated))
}

#[delete("/admin/users/<id>")]
pub async fn api_delete_user(
    id: i64,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<SuccessResponse>> {
    user.require_permission(Permission::ManageUsers)
        .validate_custom()?;

    if id == user.id {
        return Err(reject(
            Status::BadRequest,
            "user",
            "You cannot delete your own account",
        ));
    }

    if !users::delete_account(stores, id).await.validate_custom()? {
        return Err(reject(Status::NotFound, "resource", "User not found"));
    }

    info!(admin = %user.email, user_id = id, "Deleted user");
    Ok(SuccessResponse::new(true))
}

pub fn routes() -> Vec<Route> {
    routes![
        api_list_users,
        api_get_user,
        api_create_user,
        api_update_user,
        api_delete_user,
    ]
}
