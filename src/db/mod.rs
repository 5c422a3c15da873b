pub mod activity;
pub mod goals;
pub mod habits;
pub mod notes;
pub mod pdfs;
pub mod store;
pub mod time_entries;
pub mod users;

use std::path::{Path, PathBuf};

use crate::models::{Goal, Habit, Note, PdfRecord, TimeEntry, UserRecord, UserVisit};

pub use store::{Change, JsonStore, Owned, Record, RecordId};

pub const USERS_FILE: &str = "students.json";
pub const NOTES_FILE: &str = "notes.json";
pub const HABITS_FILE: &str = "habits.json";
pub const GOALS_FILE: &str = "goals.json";
pub const TIME_ENTRIES_FILE: &str = "timeentries.json";
pub const ACTIVITY_FILE: &str = "user_activity.json";
pub const PDFS_FILE: &str = "user_pdfs.json";
pub const PDF_DIR: &str = "pdfs";

/// Every JSON file the service persists to, rooted at one data directory.
pub struct Stores {
    pub users: JsonStore<UserRecord>,
    pub notes: JsonStore<Note>,
    pub habits: JsonStore<Habit>,
    pub goals: JsonStore<Goal>,
    pub time_entries: JsonStore<TimeEntry>,
    pub activity: JsonStore<UserVisit>,
    pub pdfs: JsonStore<PdfRecord>,
    pub pdf_dir: PathBuf,
}

impl Stores {
    pub fn open(data_dir: &Path) -> Self {
        tracing::info!(data_dir = %data_dir.display(), "Opening data stores");

        Self {
            users: JsonStore::new(data_dir.join(USERS_FILE)),
            notes: JsonStore::new(data_dir.join(NOTES_FILE)),
            habits: JsonStore::new(data_dir.join(HABITS_FILE)),
            goals: JsonStore::new(data_dir.join(GOALS_FILE)),
            time_entries: JsonStore::new(data_dir.join(TIME_ENTRIES_FILE)),
            activity: JsonStore::new(data_dir.join(ACTIVITY_FILE)),
            pdfs: JsonStore::new(data_dir.join(PDFS_FILE)),
            pdf_dir: data_dir.join(PDF_DIR),
        }
    }
}
