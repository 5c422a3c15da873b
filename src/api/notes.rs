use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;

use crate::auth::{Session, User, Widget};
use crate::db::Stores;
use crate::db::notes;
use crate::models::Note;
use crate::validation::{AppErrorExt, PermissionCheckExt, reject};

use super::SuccessResponse;
use super::security::{PinResult, require_pin};

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

fn check_access(user: &User, session: &Session) -> PinResult<()> {
    user.require_widget(Widget::Notes).validate_custom()?;
    require_pin(user, session)
}

#[get("/notes")]
pub async fn api_get_notes(
    user: User,
    session: Session,
    stores: &State<Stores>,
) -> PinResult<Json<Vec<Note>>> {
    check_access(&user, &session)?;

    let notes = notes::get_notes(&stores.notes, &user.email)
        .await
        .validate_custom()?;
    Ok(Json(notes))
}

#[post("/notes", data = "<note>")]
pub async fn api_create_note(
    note: Json<NoteRequest>,
    user: User,
    session: Session,
    stores: &State<Stores>,
) -> PinResult<Json<Note>> {
    check_access(&user, &session)?;

    let created = notes::create_note(&stores.notes, &user.email, &note.title, &note.description)
        .await
        .validate_custom()?;
    Ok(Json(created))
}

#[put("/notes/<id>", data = "<note>")]
pub async fn api_update_note(
    id: i64,
    note: Json<NoteRequest>,
    user: User,
    session: Session,
    stores: &State<Stores>,
) -> PinResult<Json<Note>> {
    check_access(&user, &session)?;

    match notes::update_note(&stores.notes, id, &user.email, &note.title, &note.description)
        .await
        .validate_custom()?
    {
        Some(updated) => Ok(Json(updated)),
        None => Err(reject(Status::NotFound, "resource", "Note not found").into()),
    }
}

#[delete("/notes/<id>")]
pub async fn api_delete_note(
    id: i64,
    user: User,
    session: Session,
    stores: &State<Stores>,
) -> PinResult<Json<SuccessResponse>> {
    check_access(&user, &session)?;

    let deleted = notes::delete_note(&stores.notes, id, &user.email)
        .await
        .validate_custom()?;
    Ok(SuccessResponse::new(deleted))
}

pub fn routes() -> Vec<Route> {
    routes![api_get_notes, api_create_note, api_update_note, api_delete_note]
}
