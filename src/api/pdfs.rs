use rocket::data::{Data, ToByteUnit};
use rocket::fs::NamedFile;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use tracing::warn;

use crate::auth::{User, Widget};
use crate::config::AppConfig;
use crate::db::pdfs::{self, stored_file};
use crate::db::Stores;
use crate::error::AppError;
use crate::models::PdfRecord;
use crate::validation::{ApiResult, AppErrorExt, PermissionCheckExt, reject};

use super::SuccessResponse;

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub file_name: Option<String>,
}

#[get("/pdfs")]
pub async fn api_list_pdfs(user: User, stores: &State<Stores>) -> ApiResult<Json<Vec<PdfRecord>>> {
    user.require_widget(Widget::Pdfs).validate_custom()?;

    let records = pdfs::list_pdfs(&stores.pdfs, user.id)
        .await
        .validate_custom()?;
    Ok(Json(records))
}

/// Accepts the raw document as the request body. `name` is the display name
/// kept on the record.
#[post("/pdfs?<name>", data = "<data>")]
pub async fn api_upload_pdf(
    name: Option<String>,
    data: Data<'_>,
    user: User,
    stores: &State<Stores>,
    config: &State<AppConfig>,
) -> ApiResult<Json<PdfRecord>> {
    user.require_widget(Widget::Pdfs).validate_custom()?;

    let bytes = data
        .open(config.pdf_upload_limit_mib.mebibytes())
        .into_bytes()
        .await
        .map_err(AppError::from)
        .validate_custom()?;

    if !bytes.is_complete() {
        warn!(user_id = user.id, "PDF upload over the size limit");
        return Err(reject(
            Status::PayloadTooLarge,
            "file",
            "File exceeds the upload limit",
        ));
    }

    let record = pdfs::store_pdf(&stores.pdfs, &stores.pdf_dir, user.id, name, &bytes)
        .await
        .validate_custom()?;
    Ok(Json(record))
}

#[get("/pdfs/<id>")]
pub async fn api_download_pdf(id: i64, user: User, stores: &State<Stores>) -> ApiResult<NamedFile> {
    user.require_widget(Widget::Pdfs).validate_custom()?;

    let record = stores
        .pdfs
        .find_owned(&id, &user.id)
        .await
        .validate_custom()?
        .ok_or_else(|| reject(Status::NotFound, "resource", "PDF not found"))?;

    let path = stored_file(&stores.pdf_dir, &record)
        .ok_or_else(|| reject(Status::NotFound, "resource", "PDF file not found"))?;

    NamedFile::open(&path).await.map_err(|err| {
        warn!(error = %err, path = %path.display(), "Stored PDF could not be opened");
        reject(Status::NotFound, "resource", "PDF file not found")
    })
}

#[put("/pdfs/<id>", data = "<request>")]
pub async fn api_rename_pdf(
    id: i64,
    request: Json<RenameRequest>,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<PdfRecord>> {
    user.require_widget(Widget::Pdfs).validate_custom()?;

    let file_name = request
        .into_inner()
        .file_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    pdfs::rename_pdf(&stores.pdfs, id, user.id, file_name)
        .await
        .validate_custom()?
        .map(Json)
        .ok_or_else(|| reject(Status::NotFound, "resource", "PDF not found"))
}

#[delete("/pdfs/<id>")]
pub async fn api_delete_pdf(
    id: i64,
    user: User,
    stores: &State<Stores>,
) -> ApiResult<Json<SuccessResponse>> {
    user.require_widget(Widget::Pdfs).validate_custom()?;

    let deleted = pdfs::delete_pdf(&stores.pdfs, &stores.pdf_dir, id, user.id)
        .await
        .validate_custom()?;
    Ok(SuccessResponse::new(deleted))
}

pub fn routes() -> Vec<Route> {
    routes![
        api_list_pdfs,
        api_upload_pdf,
        api_download_pdf,
        api_rename_pdf,
        api_delete_pdf,
    ]
}
