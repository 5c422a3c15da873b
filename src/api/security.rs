use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{Responder, Route, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::{Session, SessionStore, User};
use crate::config::AppConfig;
use crate::db::Stores;
use crate::db::users;
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt, ValidationResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct PinStatus {
    pub has_pin: bool,
    pub is_verified: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPinRequest {
    #[validate(length(min = 1, message = "PIN is required"))]
    pub pin: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyPinResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error side of routes behind the security PIN.
#[derive(Responder)]
pub enum PinGuardError {
    #[response(status = 401)]
    NeedsPin(Json<Value>),
    Rejected(Custom<Json<ValidationResponse>>),
}

impl From<Custom<Json<ValidationResponse>>> for PinGuardError {
    fn from(rejection: Custom<Json<ValidationResponse>>) -> Self {
        PinGuardError::Rejected(rejection)
    }
}

pub type PinResult<T> = Result<T, PinGuardError>;

/// Passes when the user has no PIN or has entered it in this session.
pub fn require_pin(user: &User, session: &Session) -> PinResult<()> {
    if !user.has_pin || session.pin_verified {
        return Ok(());
    }
    warn!(email = %user.email, "PIN verification required");
    Err(PinGuardError::NeedsPin(Json(json!({ "needs_pin": true }))))
}

#[get("/security/pin-status")]
pub async fn api_pin_status(user: Option<User>, session: Option<Session>) -> Json<PinStatus> {
    let status = match (user, session) {
        (Some(user), Some(session)) => PinStatus {
            has_pin: user.has_pin,
            is_verified: session.pin_verified,
        },
        _ => PinStatus {
            has_pin: false,
            is_verified: false,
        },
    };
    Json(status)
}

#[post("/security/verify-pin", data = "<request>")]
pub async fn api_verify_pin(
    request: Json<VerifyPinRequest>,
    user: Option<User>,
    session: Option<Session>,
    stores: &State<Stores>,
    sessions: &State<SessionStore>,
    config: &State<AppConfig>,
) -> ApiResult<Json<VerifyPinResponse>> {
    let request = request.validate_custom()?;

    let (user, session) = match (user, session) {
        (Some(user), Some(session)) => (user, session),
        _ => {
            return Ok(Json(VerifyPinResponse {
                success: false,
                message: Some("Session expired".to_string()),
            }));
        }
    };

    if !users::verify_pin(&stores.users, user.id, &request.pin)
        .await
        .validate_custom()?
    {
        let attempts = sessions
            .update(&session.token, |s| {
                s.pin_attempts += 1;
                s.pin_attempts
            })
            .unwrap_or(config.otp_max_attempts);
        warn!(user_id = user.id, attempts, "Incorrect PIN");

        // out of attempts: the session is dropped and the user signs in again
        if attempts >= config.otp_max_attempts {
            sessions.invalidate(&session.token);
            return Ok(Json(VerifyPinResponse {
                success: false,
                message: Some("Too many attempts. Please sign in again.".to_string()),
            }));
        }
        return Ok(Json(VerifyPinResponse {
            success: false,
            message: Some("Incorrect PIN".to_string()),
        }));
    }

    sessions.update(&session.token, |s| {
        s.pin_verified = true;
        s.pin_attempts = 0;
    });
    info!(user_id = user.id, "PIN verified");

    Ok(Json(VerifyPinResponse {
        success: true,
        message: None,
    }))
}

pub fn routes() -> Vec<Route> {
    routes![api_pin_status, api_verify_pin]
}
