use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Method;
use rocket::serde::json::Json;
use rocket::{Request, Response, Route, State};

use crate::auth::{AuthenticatedEmail, Permission, User};
use crate::db::Stores;
use crate::db::activity::{self, ActivityRange, ActivityReport};
use crate::models::UserVisit;
use crate::validation::{ApiResult, AppErrorExt, PermissionCheckExt};

use super::{parse_date, today};

/// Records a visit for every successful GET under `/api` made by a signed-in
/// user.
pub struct ActivityFairing;

fn is_tracked(method: Method, path: &str) -> bool {
    method == Method::Get
        && path.starts_with("/api/")
        && path != "/api/health"
        && !path.starts_with("/api/admin/activity")
}

#[rocket::async_trait]
impl Fairing for ActivityFairing {
    fn info(&self) -> Info {
        Info {
            name: "User activity log",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if !response.status().class().is_success() {
            return;
        }

        let path = request.uri().path().to_string();
        if !is_tracked(request.method(), &path) {
            return;
        }

        let email = match &request.local_cache(|| AuthenticatedEmail(None)).0 {
            Some(email) => email.clone(),
            None => return,
        };

        let stores = match request.rocket().state::<Stores>() {
            Some(stores) => stores,
            None => return,
        };

        if let Err(err) = activity::log_visit(&stores.activity, &email, &path).await {
            err.log_and_record("Recording user visit");
        }
    }
}

#[get("/admin/activity?<filter>&<date>")]
pub async fn api_activity_report(
    filter: Option<String>,
    date: Option<String>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<ActivityReport>> {
    user.require_permission(Permission::ViewActivity)
        .validate_custom()?;

    let today = today();
    let date = parse_date("date", date.as_deref())?;
    let range = ActivityRange::parse(filter.as_deref().unwrap_or("Today"), date, today);

    let report = activity::report(&stores.activity, range, today)
        .await
        .validate_custom()?;
    Ok(Json(report))
}

#[get("/admin/activity/<email>?<filter>&<date>")]
pub async fn api_user_activity(
    email: &str,
    filter: Option<String>,
    date: Option<String>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<Vec<UserVisit>>> {
    user.require_permission(Permission::ViewActivity)
        .validate_custom()?;

    let today = today();
    let date = parse_date("date", date.as_deref())?;
    let range = ActivityRange::parse(filter.as_deref().unwrap_or("Today"), date, today);

    let visits = activity::user_visits(&stores.activity, email, range, today)
        .await
        .validate_custom()?;
    Ok(Json(visits))
}

pub fn routes() -> Vec<Route> {
    routes![api_activity_report, api_user_activity]
}
