use chrono::Local;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::Note;

use super::store::{JsonStore, Owned, Record};

impl Record for Note {
    type Id = i64;

    fn id(&self) -> &i64 {
        &self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Owned for Note {
    type Owner = str;

    fn owner(&self) -> &str {
        &self.user_email
    }
}

fn require_content(title: &str, description: &str) -> Result<(), AppError> {
    if title.trim().is_empty() || description.trim().is_empty() {
        return Err(AppError::Validation(
            "Title and Description are required.".to_string(),
        ));
    }
    Ok(())
}

/// The user's notes, newest first.
#[instrument(skip(store))]
pub async fn get_notes(store: &JsonStore<Note>, email: &str) -> Result<Vec<Note>, AppError> {
    let mut notes = store.get_by_owner(email).await?;
    notes.sort_by(|a, b| b.created_date.cmp(&a.created_date));
    Ok(notes)
}

#[instrument(skip(store, description))]
pub async fn create_note(
    store: &JsonStore<Note>,
    email: &str,
    title: &str,
    description: &str,
) -> Result<Note, AppError> {
    require_content(title, description)?;
    info!("Creating note");

    store
        .add(Note {
            id: 0,
            user_email: email.to_string(),
            title: title.trim().to_string(),
            description: description.to_string(),
            created_date: Local::now().naive_local(),
        })
        .await
}

#[instrument(skip(store, description))]
pub async fn update_note(
    store: &JsonStore<Note>,
    id: i64,
    email: &str,
    title: &str,
    description: &str,
) -> Result<Option<Note>, AppError> {
    require_content(title, description)?;
    info!("Updating note");

    let title = title.trim().to_string();
    let description = description.to_string();
    store
        .update(&id, email, move |note| {
            note.title = title;
            note.description = description;
        })
        .await
}

#[instrument(skip(store))]
pub async fn delete_note(store: &JsonStore<Note>, id: i64, email: &str) -> Result<bool, AppError> {
    info!("Deleting note");
    store.delete(&id, email).await
}
