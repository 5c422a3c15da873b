use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::TimeEntry;

use super::store::{JsonStore, Owned, Record};

impl Record for TimeEntry {
    type Id = i64;

    fn id(&self) -> &i64 {
        &self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Owned for TimeEntry {
    type Owner = str;

    fn owner(&self) -> &str {
        &self.user_email
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeFilter {
    Today,
    Yesterday,
    Week,
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    All,
}

impl TimeFilter {
    /// Unknown names select everything.
    pub fn parse(name: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "today" => TimeFilter::Today,
            "yesterday" => TimeFilter::Yesterday,
            "week" => TimeFilter::Week,
            "custom" => TimeFilter::Custom { start, end },
            _ => TimeFilter::All,
        }
    }

    pub fn matches(&self, started: NaiveDate, today: NaiveDate) -> bool {
        match self {
            TimeFilter::Today => started == today,
            TimeFilter::Yesterday => started == today - Duration::days(1),
            TimeFilter::Week => started >= today - Duration::days(7),
            TimeFilter::Custom { start, end } => {
                start.is_none_or(|s| started >= s) && end.is_none_or(|e| started <= e)
            }
            TimeFilter::All => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSummary {
    pub entries: Vec<TimeEntry>,
    pub total_seconds_today: i64,
    pub task_breakdown: BTreeMap<String, i64>,
}

/// Entry fields as submitted. Whichever of `end_time` and
/// `duration_seconds` is missing gets derived from the other.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub task_name: String,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub duration_seconds: i64,
}

impl EntryDraft {
    fn into_entry(self, email: &str) -> TimeEntry {
        let mut entry = TimeEntry {
            id: 0,
            user_email: email.to_string(),
            task_name: self.task_name,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_seconds: self.duration_seconds,
        };

        match entry.end_time {
            Some(end) if entry.duration_seconds == 0 => {
                entry.duration_seconds = (end - entry.start_time).num_seconds();
            }
            None if entry.duration_seconds > 0 => {
                entry.end_time = Some(entry.start_time + Duration::seconds(entry.duration_seconds));
            }
            _ => {}
        }

        entry.duration_seconds = entry.duration_seconds.max(0);
        entry
    }
}

/// The user's entries, most recent start first.
pub async fn get_entries(store: &JsonStore<TimeEntry>, email: &str) -> Result<Vec<TimeEntry>, AppError> {
    let mut entries = store.get_by_owner(email).await?;
    entries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    Ok(entries)
}

#[instrument(skip(store))]
pub async fn summary(
    store: &JsonStore<TimeEntry>,
    email: &str,
    filter: &TimeFilter,
    today: NaiveDate,
) -> Result<TimeSummary, AppError> {
    let entries = get_entries(store, email).await?;

    let mut total_seconds_today = 0;
    let mut task_breakdown = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.start_time.date() == today) {
        total_seconds_today += entry.duration_seconds;
        *task_breakdown.entry(entry.task_name.clone()).or_insert(0) += entry.duration_seconds;
    }

    let entries = entries
        .into_iter()
        .filter(|e| filter.matches(e.start_time.date(), today))
        .collect();

    Ok(TimeSummary {
        entries,
        total_seconds_today,
        task_breakdown,
    })
}

/// Stores an entry recorded by the running timer, as submitted.
#[instrument(skip(store, draft), fields(task = %draft.task_name))]
pub async fn save_entry(
    store: &JsonStore<TimeEntry>,
    email: &str,
    draft: EntryDraft,
) -> Result<TimeEntry, AppError> {
    info!("Saving timed entry");
    store
        .add(TimeEntry {
            id: 0,
            user_email: email.to_string(),
            task_name: draft.task_name,
            start_time: draft.start_time,
            end_time: draft.end_time,
            duration_seconds: draft.duration_seconds.max(0),
        })
        .await
}

#[instrument(skip(store, draft), fields(task = %draft.task_name))]
pub async fn add_manual_entry(
    store: &JsonStore<TimeEntry>,
    email: &str,
    draft: EntryDraft,
) -> Result<TimeEntry, AppError> {
    info!("Adding manual entry");
    store.add(draft.into_entry(email)).await
}

/// Replaces the entry's fields. The duration is recomputed from the end
/// time when there is one.
#[instrument(skip(store, draft))]
pub async fn update_entry(
    store: &JsonStore<TimeEntry>,
    id: i64,
    email: &str,
    draft: EntryDraft,
) -> Result<Option<TimeEntry>, AppError> {
    info!("Updating time entry");
    store
        .update(&id, email, move |entry| {
            entry.task_name = draft.task_name;
            entry.start_time = draft.start_time;
            entry.end_time = draft.end_time;
            entry.duration_seconds = match draft.end_time {
                Some(end) => (end - draft.start_time).num_seconds(),
                None => draft.duration_seconds,
            }
            .max(0);
        })
        .await
}

#[instrument(skip(store))]
pub async fn delete_entry(store: &JsonStore<TimeEntry>, id: i64, email: &str) -> Result<bool, AppError> {
    info!("Deleting time entry");
    store.delete(&id, email).await
}

/// Up to five distinct task names, most recently started first.
pub async fn recent_tasks(store: &JsonStore<TimeEntry>, email: &str) -> Result<Vec<String>, AppError> {
    let entries = get_entries(store, email).await?;
    let mut seen = HashSet::new();
    Ok(entries
        .into_iter()
        .map(|e| e.task_name)
        .filter(|name| seen.insert(name.clone()))
        .take(5)
        .collect())
}
