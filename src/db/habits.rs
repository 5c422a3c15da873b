use chrono::{Local, NaiveDate};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{Frequency, Habit};

use super::store::{Change, JsonStore, Owned, Record};

impl Record for Habit {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Owned for Habit {
    type Owner = str;

    fn owner(&self) -> &str {
        &self.user_email
    }
}

/// The editable part of a habit.
#[derive(Debug, Clone)]
pub struct HabitDraft {
    pub name: String,
    pub description: String,
    pub frequency_type: Frequency,
    pub custom_days: Vec<String>,
    pub start_date: NaiveDate,
    pub goal: String,
}

#[instrument(skip(store))]
pub async fn get_habits(store: &JsonStore<Habit>, email: &str) -> Result<Vec<Habit>, AppError> {
    store.get_by_owner(email).await
}

#[instrument(skip(store, draft), fields(name = %draft.name))]
pub async fn create_habit(
    store: &JsonStore<Habit>,
    email: &str,
    draft: HabitDraft,
) -> Result<Habit, AppError> {
    if draft.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    info!("Creating habit");

    store
        .add(Habit {
            id: String::new(),
            user_email: email.to_string(),
            name: draft.name.trim().to_string(),
            description: draft.description,
            frequency_type: draft.frequency_type,
            custom_days: draft.custom_days,
            start_date: draft.start_date,
            completed_dates: Vec::new(),
            created_date: Local::now().naive_local(),
            goal: draft.goal,
        })
        .await
}

/// Completion history is left untouched.
#[instrument(skip(store, draft))]
pub async fn update_habit(
    store: &JsonStore<Habit>,
    id: &str,
    email: &str,
    draft: HabitDraft,
) -> Result<Option<Habit>, AppError> {
    if draft.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    info!("Updating habit");

    store
        .update(&id.to_string(), email, move |habit| {
            habit.name = draft.name.trim().to_string();
            habit.description = draft.description;
            habit.frequency_type = draft.frequency_type;
            habit.custom_days = draft.custom_days;
            habit.start_date = draft.start_date;
            habit.goal = draft.goal;
        })
        .await
}

#[instrument(skip(store))]
pub async fn delete_habit(store: &JsonStore<Habit>, id: &str, email: &str) -> Result<bool, AppError> {
    info!("Deleting habit");
    store.delete(&id.to_string(), email).await
}

/// Flips completion of `date`: removes it when recorded, records it
/// otherwise. Returns whether the habit is now completed on that date. An
/// unknown habit reports `false` and nothing is written.
#[instrument(skip(store))]
pub async fn toggle_completion(
    store: &JsonStore<Habit>,
    id: &str,
    email: &str,
    date: NaiveDate,
) -> Result<bool, AppError> {
    store
        .modify(move |habits| {
            let habit = match habits
                .iter_mut()
                .find(|h| h.id == id && h.user_email == email)
            {
                Some(habit) => habit,
                None => return Change::Keep(false),
            };

            match habit.completed_dates.iter().position(|d| *d == date) {
                Some(index) => {
                    habit.completed_dates.remove(index);
                    Change::Write(false)
                }
                None => {
                    habit.completed_dates.push(date);
                    Change::Write(true)
                }
            }
        })
        .await
}
