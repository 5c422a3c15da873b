use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use rocket::tokio::fs;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::PdfRecord;

use super::store::{Change, JsonStore, Owned, Record};

const PDF_MAGIC: &[u8] = b"%PDF-";

impl Record for PdfRecord {
    type Id = i64;

    fn id(&self) -> &i64 {
        &self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Owned for PdfRecord {
    type Owner = i64;

    fn owner(&self) -> &i64 {
        &self.user_id
    }
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Location of a record's file inside `pdf_dir`. Only the final path
/// component of the stored name is honoured.
pub fn stored_file(pdf_dir: &Path, record: &PdfRecord) -> Option<PathBuf> {
    let name = Path::new(record.file_path.as_deref()?).file_name()?;
    Some(pdf_dir.join(name))
}

#[instrument(skip(store))]
pub async fn list_pdfs(store: &JsonStore<PdfRecord>, user_id: i64) -> Result<Vec<PdfRecord>, AppError> {
    let mut records = store.get_by_owner(&user_id).await?;
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(records)
}

/// Writes the document under a fresh name and registers it for the user.
#[instrument(skip(store, pdf_dir, bytes), fields(size = bytes.len()))]
pub async fn store_pdf(
    store: &JsonStore<PdfRecord>,
    pdf_dir: &Path,
    user_id: i64,
    file_name: Option<String>,
    bytes: &[u8],
) -> Result<PdfRecord, AppError> {
    if !is_pdf(bytes) {
        return Err(AppError::Validation("Only PDF files are allowed".to_string()));
    }

    fs::create_dir_all(pdf_dir).await?;
    let stored_name = format!("{}.pdf", Uuid::new_v4());
    let path = pdf_dir.join(&stored_name);
    fs::write(&path, bytes).await?;

    let record = PdfRecord {
        id: 0,
        user_id,
        file_name: file_name.filter(|n| !n.trim().is_empty()),
        file_path: Some(stored_name),
        created_at: Local::now().naive_local(),
    };

    match store.add(record).await {
        Ok(record) => {
            info!(pdf_id = record.id, "Stored PDF");
            Ok(record)
        }
        Err(err) => {
            if let Err(cleanup) = fs::remove_file(&path).await {
                warn!(error = %cleanup, path = %path.display(), "Failed to remove orphaned PDF");
            }
            Err(err)
        }
    }
}

#[instrument(skip(store))]
pub async fn rename_pdf(
    store: &JsonStore<PdfRecord>,
    id: i64,
    user_id: i64,
    file_name: Option<String>,
) -> Result<Option<PdfRecord>, AppError> {
    store
        .update(&id, &user_id, move |record| record.file_name = file_name)
        .await
}

/// Removes the record and its file. A file that is already gone is not an
/// error.
#[instrument(skip(store, pdf_dir))]
pub async fn delete_pdf(
    store: &JsonStore<PdfRecord>,
    pdf_dir: &Path,
    id: i64,
    user_id: i64,
) -> Result<bool, AppError> {
    let removed = store
        .modify(move |records| {
            match records
                .iter()
                .position(|r| r.id == id && r.user_id == user_id)
            {
                Some(index) => Change::Write(Some(records.remove(index))),
                None => Change::Keep(None),
            }
        })
        .await?;

    let record = match removed {
        Some(record) => record,
        None => return Ok(false),
    };

    remove_stored_file(pdf_dir, &record).await?;

    info!("Deleted PDF");
    Ok(true)
}

/// Removes the document behind `record`. A file that is already gone is
/// only logged.
pub async fn remove_stored_file(pdf_dir: &Path, record: &PdfRecord) -> Result<(), AppError> {
    let Some(path) = stored_file(pdf_dir, record) else {
        return Ok(());
    };
    match fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "PDF file already missing");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
