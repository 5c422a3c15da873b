#[cfg(test)]
mod tests {
    use crate::db::JsonStore;
    use crate::db::store::staging_path;
    use crate::db::notes::{create_note, delete_note, get_notes, update_note};
    use crate::error::AppError;
    use crate::models::{Habit, Note};
    use chrono::{Local, NaiveDate};
    use rocket::tokio;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn note(email: &str, title: &str) -> Note {
        Note {
            id: 0,
            user_email: email.to_string(),
            title: title.to_string(),
            description: "body".to_string(),
            created_date: Local::now().naive_local(),
        }
    }

    fn habit(email: &str, name: &str) -> Habit {
        Habit {
            id: String::new(),
            user_email: email.to_string(),
            name: name.to_string(),
            description: String::new(),
            frequency_type: Default::default(),
            custom_days: Vec::new(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            completed_dates: Vec::new(),
            created_date: Local::now().naive_local(),
            goal: String::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_and_blank_files_read_as_empty() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Note> = JsonStore::new(dir.path().join("notes.json"));
        assert!(store.get_all().await.unwrap().is_empty());

        std::fs::write(store.path(), "   \n").unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error_and_left_untouched() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Note> = JsonStore::new(dir.path().join("notes.json"));
        std::fs::write(store.path(), "{not json").unwrap();

        let result = store.add(note("a@example.com", "x")).await;
        assert!(matches!(result, Err(AppError::Serialization(_))));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{not json");
    }

    #[tokio::test]
    async fn test_add_assigns_next_integer_id() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Note> = JsonStore::new(dir.path().join("notes.json"));

        let first = store.add(note("a@example.com", "one")).await.unwrap();
        let second = store.add(note("a@example.com", "two")).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        store.delete(&1, "a@example.com").await.unwrap();
        let third = store.add(note("a@example.com", "three")).await.unwrap();
        assert_eq!(third.id, 3);
    }

    #[tokio::test]
    async fn test_add_assigns_unique_string_ids() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Habit> = JsonStore::new(dir.path().join("habits.json"));

        let a = store.add(habit("a@example.com", "Read")).await.unwrap();
        let b = store.add(habit("a@example.com", "Run")).await.unwrap();
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.json");
        let store: JsonStore<Note> = JsonStore::new(&path);

        let written = vec![
            store.add(note("a@example.com", "one")).await.unwrap(),
            store.add(note("b@example.com", "two")).await.unwrap(),
        ];

        let reopened: JsonStore<Note> = JsonStore::new(&path);
        assert_eq!(reopened.get_all().await.unwrap(), written);
    }

    #[tokio::test]
    async fn test_delete_requires_matching_owner() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Note> = JsonStore::new(dir.path().join("notes.json"));
        let created = store.add(note("owner@example.com", "mine")).await.unwrap();

        assert!(!store.delete(&created.id, "intruder@example.com").await.unwrap());
        assert!(!store.delete(&999, "owner@example.com").await.unwrap());
        assert_eq!(store.get_all().await.unwrap().len(), 1);

        assert!(store.delete(&created.id, "owner@example.com").await.unwrap());
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_requires_matching_owner() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Note> = JsonStore::new(dir.path().join("notes.json"));
        let created = store.add(note("owner@example.com", "mine")).await.unwrap();

        let missed = store
            .update(&created.id, "intruder@example.com", |n| n.title = "stolen".into())
            .await
            .unwrap();
        assert!(missed.is_none());

        let updated = store
            .update(&created.id, "owner@example.com", |n| n.title = "renamed".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "renamed");
    }

    #[test]
    fn test_staging_path_is_unique_hidden_sibling() {
        let target = std::path::Path::new("/data/students.json");
        let first = staging_path(target);
        let second = staging_path(target);

        assert_ne!(first, second);
        assert_eq!(first.parent(), target.parent());
        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".students.json.tmp."));
        assert!(name.contains(&std::process::id().to_string()));
    }

    #[tokio::test]
    async fn test_separate_stores_on_one_file_never_corrupt_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.json");
        let server: Arc<JsonStore<Note>> = Arc::new(JsonStore::new(&path));
        let tool: Arc<JsonStore<Note>> = Arc::new(JsonStore::new(&path));

        let mut handles = Vec::new();
        for i in 0..10 {
            for store in [&server, &tool] {
                let store = Arc::clone(store);
                handles.push(tokio::spawn(async move {
                    store.add(note("a@example.com", &format!("n{}", i))).await
                }));
            }
        }
        for handle in handles {
            // a lost update is possible across stores, a torn file is not
            let _ = handle.await.unwrap();
        }

        let records = JsonStore::<Note>::new(&path).get_all().await.unwrap();
        assert!(!records.is_empty());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("notes.json")]);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store: Arc<JsonStore<Note>> = Arc::new(JsonStore::new(dir.path().join("notes.json")));

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.add(note("a@example.com", &format!("n{}", i))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut ids: Vec<i64> = store.get_all().await.unwrap().iter().map(|n| n.id).collect();
        ids.sort();
        assert_eq!(ids, (1..=20).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_note_rules() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<Note> = JsonStore::new(dir.path().join("notes.json"));

        let err = create_note(&store, "a@example.com", " ", "text").await.unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Title and Description are required.");

        let first = create_note(&store, "a@example.com", "First", "one").await.unwrap();
        let second = create_note(&store, "a@example.com", "Second", "two").await.unwrap();
        create_note(&store, "b@example.com", "Other", "three").await.unwrap();

        let notes = get_notes(&store, "a@example.com").await.unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].created_date >= notes[1].created_date);

        let updated = update_note(&store, first.id, "a@example.com", "Edited", "new")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Edited");
        assert!(
            update_note(&store, first.id, "b@example.com", "Edited", "new")
                .await
                .unwrap()
                .is_none()
        );

        assert!(delete_note(&store, second.id, "a@example.com").await.unwrap());
        assert_eq!(get_notes(&store, "a@example.com").await.unwrap().len(), 1);
    }
}
