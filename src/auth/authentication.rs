use rocket::Request;
use rocket::http::{Cookie, SameSite, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use tracing::Instrument;

use crate::db::Stores;

use super::User;
use super::session::{SESSION_COOKIE, Session, SessionStore};

/// Email of the user a request was authenticated as, cached on the request
/// by the [`User`] guard.
#[derive(Debug, Clone, Default)]
pub struct AuthenticatedEmail(pub Option<String>);

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .same_site(SameSite::Lax)
        .http_only(true)
        .build()
}

/// The token of the caller's session. A session is started, and its cookie
/// set, when the request carries none or an expired one.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionToken {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let sessions = match request.rocket().state::<SessionStore>() {
            Some(sessions) => sessions,
            None => {
                tracing::error!("Session store not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let cookies = request.cookies();
        if let Some(token) = cookies
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string())
        {
            if sessions.get(&token).is_some() {
                return Outcome::Success(SessionToken(token));
            }
        }

        let session = sessions.create();
        cookies.add_private(session_cookie(session.token.clone()));
        Outcome::Success(SessionToken(session.token))
    }
}

/// The caller's live session, if any. Never starts one.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let sessions = match request.rocket().state::<SessionStore>() {
            Some(sessions) => sessions,
            None => {
                tracing::error!("Session store not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let token = request
            .cookies()
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string());

        match token.and_then(|token| sessions.get(&token)) {
            Some(session) => Outcome::Success(session),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

async fn authenticate(request: &Request<'_>) -> Outcome<User, ()> {
    let session = match request.guard::<Session>().await {
        Outcome::Success(session) => session,
        Outcome::Error((status, _)) => return Outcome::Error((status, ())),
        Outcome::Forward(_) => return Outcome::Error((Status::Unauthorized, ())),
    };

    let identity = match session.identity {
        Some(identity) => identity,
        None => return Outcome::Error((Status::Unauthorized, ())),
    };

    let stores = match request.rocket().state::<Stores>() {
        Some(stores) => stores,
        None => {
            tracing::error!("Stores not found in managed state");
            return Outcome::Error((Status::InternalServerError, ()));
        }
    };

    match stores.users.find_by_id(&identity.user_id).await {
        Ok(Some(record)) => {
            let user = User::from(record);
            tracing::debug!(email = %user.email, role = %user.role, "User authenticated via session");
            request.local_cache(|| AuthenticatedEmail(Some(user.email.clone())));
            Outcome::Success(user)
        }
        Ok(None) => {
            tracing::warn!(user_id = identity.user_id, "Session refers to a deleted user");
            if let Some(sessions) = request.rocket().state::<SessionStore>() {
                sessions.invalidate(&session.token);
            }
            Outcome::Error((Status::Unauthorized, ()))
        }
        Err(err) => {
            err.log_and_record("Loading session user");
            Outcome::Error((Status::InternalServerError, ()))
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    Custom(
        Status::Unauthorized,
        Json(json!({
            "error": "Unauthorized",
            "message": "Authentication required"
        })),
    )
}

#[catch(403)]
pub fn forbidden_api(req: &Request) -> Custom<Json<Value>> {
    tracing::warn!(uri = %req.uri(), "Forbidden access attempt");
    Custom(
        Status::Forbidden,
        Json(json!({
            "error": "Forbidden",
            "message": "You don't have permission to perform this action"
        })),
    )
}

#[catch(404)]
pub fn not_found_api(_req: &Request) -> Custom<Json<Value>> {
    Custom(
        Status::NotFound,
        Json(json!({
            "error": "Not Found",
            "message": "Resource not found"
        })),
    )
}
