use chrono::Utc;
use rocket::http::{Cookie, CookieJar, Status};
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::{
    Identity, NewAccount, OtpError, OtpPurpose, PendingAction, Permission, Role, SESSION_COOKIE,
    SessionStore, SessionToken, User, hash_secret, otp, session_cookie, verify_secret,
};
use crate::config::AppConfig;
use crate::db::Stores;
use crate::db::users::{self, CredentialCheck, ProfileUpdate};
use crate::error::AppError;
use crate::mailer::Mailer;
use crate::validation::{
    ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt, check_pin, reject,
};

use super::SuccessResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub course: Option<String>,
    pub security_pin: Option<String>,
    pub confirm_security_pin: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1, message = "OTP is required"))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(range(min = 1, max = 150, message = "Age must be between 1 and 150"))]
    pub age: Option<i32>,
    #[serde(default)]
    pub course: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "OTP is required"))]
    pub otp: String,
    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

/// Outcome of a step in the sign-up, login or reset flows. Wrong passwords
/// and codes are reported here with `success: false`, not as HTTP errors.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AuthResponse {
    pub success: bool,
    pub user: Option<User>,
    pub otp_required: bool,
    pub error: Option<String>,
}

impl AuthResponse {
    fn signed_in(user: User) -> Json<Self> {
        Json(Self {
            success: true,
            user: Some(user),
            ..Default::default()
        })
    }

    fn otp_sent() -> Json<Self> {
        Json(Self {
            success: true,
            otp_required: true,
            ..Default::default()
        })
    }

    fn failed(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        })
    }
}

/// Starts a challenge on the caller's session and mails the code.
pub(crate) async fn send_challenge(
    sessions: &SessionStore,
    config: &AppConfig,
    mailer: &dyn Mailer,
    token: &SessionToken,
    to: &str,
    action: PendingAction,
) -> Result<(), AppError> {
    let purpose = action.purpose();
    let code = otp::begin_challenge(sessions, token.as_str(), action, config.otp_ttl(), Utc::now())?;
    mailer.send_otp(to, &code, purpose).await
}

/// Binds `user` to a fresh session and drops the previous one, so a token
/// issued before login never carries an identity.
fn sign_in(sessions: &SessionStore, cookies: &CookieJar<'_>, previous: &SessionToken, user: &User) {
    sessions.invalidate(previous.as_str());

    let session = sessions.create();
    sessions.update(&session.token, |s| {
        s.identity = Some(Identity {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        });
    });
    cookies.add_private(session_cookie(session.token));

    info!(email = %user.email, role = %user.role, "User signed in");
}

pub(crate) fn hash_optional_pin(pin: Option<&str>, confirm: Option<&str>) -> ApiResult<Option<String>> {
    match check_pin(pin, confirm)? {
        Some(pin) => Ok(Some(hash_secret(&pin).validate_custom()?)),
        None => Ok(None),
    }
}

#[post("/signup", data = "<signup>")]
pub async fn api_signup(
    signup: Json<SignupRequest>,
    token: SessionToken,
    stores: &State<Stores>,
    sessions: &State<SessionStore>,
    config: &State<AppConfig>,
    mailer: &State<Box<dyn Mailer>>,
) -> ApiResult<Json<AuthResponse>> {
    let signup = signup.validate_custom()?;
    let security_pin_hash = hash_optional_pin(
        signup.security_pin.as_deref(),
        signup.confirm_security_pin.as_deref(),
    )?;

    let email = signup.email.trim().to_string();
    if users::user_exists(&stores.users, &email).await.validate_custom()? {
        return Err(reject(
            Status::Conflict,
            "email",
            "User with this email already exists",
        ));
    }

    let account = NewAccount {
        email: email.clone(),
        password_hash: hash_secret(&signup.password).validate_custom()?,
        name: signup
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "New Student".to_string()),
        age: Some(signup.age.unwrap_or(18)),
        course: signup
            .course
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "General".to_string()),
        role: Role::User,
        widget_permissions: Vec::new(),
        security_pin_hash,
    };

    send_challenge(
        sessions,
        config,
        mailer.inner().as_ref(),
        &token,
        &email,
        PendingAction::Registration(account),
    )
    .await
    .validate_custom()?;

    Ok(AuthResponse::otp_sent())
}

#[post("/verify-otp", data = "<request>")]
pub async fn api_verify_otp(
    request: Json<VerifyOtpRequest>,
    token: SessionToken,
    cookies: &CookieJar<'_>,
    stores: &State<Stores>,
    sessions: &State<SessionStore>,
    config: &State<AppConfig>,
) -> ApiResult<Json<AuthResponse>> {
    let request = request.validate_custom()?;

    let challenge = match otp::complete_challenge(
        sessions,
        token.as_str(),
        &request.otp,
        &[
            OtpPurpose::Registration,
            OtpPurpose::AccountCreation,
            OtpPurpose::Login,
        ],
        config.otp_max_attempts,
        Utc::now(),
    ) {
        Ok(challenge) => challenge,
        Err(err) => return Ok(AuthResponse::failed(err.to_string())),
    };

    match challenge.action {
        PendingAction::Registration(account) => {
            let user = users::create_user(&stores.users, account)
                .await
                .validate_custom()?;
            sign_in(sessions, cookies, &token, &user);
            Ok(AuthResponse::signed_in(user))
        }
        PendingAction::AccountCreation(account) => {
            let user = users::create_user(&stores.users, account)
                .await
                .validate_custom()?;
            info!(email = %user.email, "Account created by administrator");
            Ok(Json(AuthResponse {
                success: true,
                user: Some(user),
                ..Default::default()
            }))
        }
        PendingAction::Login { user_id } => {
            let user = users::get_user(&stores.users, user_id)
                .await
                .validate_custom()?;
            sign_in(sessions, cookies, &token, &user);
            Ok(AuthResponse::signed_in(user))
        }
        PendingAction::PasswordReset { .. } => {
            Ok(AuthResponse::failed(OtpError::NoChallenge.to_string()))
        }
    }
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    token: SessionToken,
    cookies: &CookieJar<'_>,
    stores: &State<Stores>,
    sessions: &State<SessionStore>,
    config: &State<AppConfig>,
    mailer: &State<Box<dyn Mailer>>,
) -> ApiResult<Json<AuthResponse>> {
    let login = login.validate_custom()?;

    let check = users::authenticate_user(&stores.users, &login.email, &login.password)
        .await
        .validate_custom()?;

    let user = match check {
        CredentialCheck::Valid(user) => user,
        other => {
            let message = other.error_message().unwrap_or("Invalid email or password");
            return Ok(AuthResponse::failed(message));
        }
    };

    if config.login_otp.requires_otp(&user.role) {
        send_challenge(
            sessions,
            config,
            mailer.inner().as_ref(),
            &token,
            &user.email,
            PendingAction::Login { user_id: user.id },
        )
        .await
        .validate_custom()?;
        return Ok(AuthResponse::otp_sent());
    }

    sign_in(sessions, cookies, &token, &user);
    Ok(AuthResponse::signed_in(user))
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &CookieJar<'_>,
    sessions: &State<SessionStore>,
) -> Json<SuccessResponse> {
    if let Some(token) = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
    {
        sessions.invalidate(&token);
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));
    SuccessResponse::new(true)
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<User> {
    Json(user)
}

#[put("/profile", data = "<profile>")]
pub async fn api_update_profile(
    profile: Json<ProfileRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<User>> {
    user.require_permission(Permission::EditOwnProfile)
        .validate_custom()?;
    let profile = profile.validate_custom()?;

    let course = if profile.course.trim().is_empty() {
        user.course.clone()
    } else {
        profile.course.trim().to_string()
    };

    let updated = users::update_profile(
        &stores.users,
        user.id,
        ProfileUpdate {
            name: profile.name.trim().to_string(),
            age: profile.age,
            course,
        },
    )
    .await
    .validate_custom()?;

    Ok(Json(updated))
}

#[post("/change-password", data = "<request>")]
pub async fn api_change_password(
    request: Json<ChangePasswordRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<SuccessResponse>> {
    let request = request.validate_custom()?;

    let record = users::get_user_record(&stores.users, user.id)
        .await
        .validate_custom()?;
    if !verify_secret(&request.current_password, &record.password_hash) {
        warn!(user_id = user.id, "Password change with wrong current password");
        return Err(reject(
            Status::Unauthorized,
            "current_password",
            "Current password is incorrect",
        ));
    }

    let hash = hash_secret(&request.new_password).validate_custom()?;
    users::update_password_hash(&stores.users, user.id, hash)
        .await
        .validate_custom()?;

    Ok(SuccessResponse::new(true))
}

#[post("/password/forgot", data = "<request>")]
pub async fn api_forgot_password(
    request: Json<ForgotPasswordRequest>,
    token: SessionToken,
    stores: &State<Stores>,
    sessions: &State<SessionStore>,
    config: &State<AppConfig>,
    mailer: &State<Box<dyn Mailer>>,
) -> ApiResult<Json<AuthResponse>> {
    let request = request.validate_custom()?;

    let record = match users::find_by_email(&stores.users, &request.email)
        .await
        .validate_custom()?
    {
        Some(record) => record,
        None => return Err(reject(Status::NotFound, "email", "Email not found")),
    };

    send_challenge(
        sessions,
        config,
        mailer.inner().as_ref(),
        &token,
        &record.email,
        PendingAction::PasswordReset {
            email: record.email.clone(),
        },
    )
    .await
    .validate_custom()?;

    Ok(AuthResponse::otp_sent())
}

#[post("/password/reset", data = "<request>")]
pub async fn api_reset_password(
    request: Json<ResetPasswordRequest>,
    token: SessionToken,
    stores: &State<Stores>,
    sessions: &State<SessionStore>,
    config: &State<AppConfig>,
) -> ApiResult<Json<AuthResponse>> {
    let request = request.validate_custom()?;

    let challenge = match otp::complete_challenge(
        sessions,
        token.as_str(),
        &request.otp,
        &[OtpPurpose::PasswordReset],
        config.otp_max_attempts,
        Utc::now(),
    ) {
        Ok(challenge) => challenge,
        Err(err) => return Ok(AuthResponse::failed(err.to_string())),
    };

    let email = match challenge.action {
        PendingAction::PasswordReset { email } => email,
        _ => return Ok(AuthResponse::failed(OtpError::NoChallenge.to_string())),
    };

    let hash = hash_secret(&request.new_password).validate_custom()?;
    users::reset_password(&stores.users, &email, hash)
        .await
        .validate_custom()?;
    info!(email = %email, "Password reset completed");

    Ok(Json(AuthResponse {
        success: true,
        ..Default::default()
    }))
}

pub fn routes() -> Vec<Route> {
    routes![
        api_signup,
        api_verify_otp,
        api_login,
        api_logout,
        api_me,
        api_update_profile,
        api_change_password,
        api_forgot_password,
        api_reset_password,
    ]
}
