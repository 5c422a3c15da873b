use std::collections::HashSet;
use std::fmt::Debug;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use rocket::tokio::io::AsyncWriteExt;
use rocket::tokio::{fs, sync::Mutex};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::AppError;

/// Identifier type of a stored record, able to pick a fresh value that does
/// not collide with the ids already in the file.
pub trait RecordId: Clone + PartialEq + Debug + Send + Sync {
    fn next<'a>(existing: impl Iterator<Item = &'a Self>) -> Self
    where
        Self: 'a;
}

impl RecordId for i64 {
    fn next<'a>(existing: impl Iterator<Item = &'a Self>) -> Self {
        existing.max().map_or(1, |max| max + 1)
    }
}

impl RecordId for String {
    fn next<'a>(existing: impl Iterator<Item = &'a Self>) -> Self {
        let taken: HashSet<&String> = existing.collect();
        loop {
            let candidate = Uuid::new_v4().to_string();
            if !taken.contains(&candidate) {
                return candidate;
            }
        }
    }
}

pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Id: RecordId;

    fn id(&self) -> &Self::Id;
    fn set_id(&mut self, id: Self::Id);
}

/// A record scoped to an owner. Updates and deletes only match when both
/// the id and the owner agree.
pub trait Owned: Record {
    type Owner: PartialEq + Debug + Send + Sync + ?Sized;

    fn owner(&self) -> &Self::Owner;
}

/// Outcome of a read-modify-write closure: whether the file must be rewritten.
pub enum Change<R> {
    Write(R),
    Keep(R),
}

/// Hidden sibling of `path` unique to this process and write, so separate
/// processes sharing a data directory never rename each other's partial file.
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("store");
    path.with_file_name(format!(
        ".{}.tmp.{}.{}",
        name,
        std::process::id(),
        Uuid::new_v4().simple()
    ))
}

/// A JSON array file read and rewritten whole on every operation.
///
/// Operations on one store are serialized, and writes go through a
/// temporary file renamed over the target.
pub struct JsonStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<T>, AppError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    async fn write(&self, records: &[T]) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(records)?;
        let staging = staging_path(&self.path);
        let written = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
            fs::rename(&staging, &self.path).await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(err.into());
        }

        debug!(path = %self.path.display(), count = records.len(), "Rewrote store");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn get_all(&self) -> Result<Vec<T>, AppError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    pub async fn filter<P>(&self, predicate: P) -> Result<Vec<T>, AppError>
    where
        P: Fn(&T) -> bool + Send,
    {
        let records = self.get_all().await?;
        Ok(records.into_iter().filter(|r| predicate(r)).collect())
    }

    pub async fn append(&self, record: T) -> Result<(), AppError> {
        self.modify(move |records| {
            records.push(record);
            Change::Write(())
        })
        .await
    }

    /// Removes every record matching `predicate` and returns them.
    pub async fn remove_where<P>(&self, predicate: P) -> Result<Vec<T>, AppError>
    where
        P: Fn(&T) -> bool + Send,
    {
        self.modify(move |records| {
            let (removed, kept): (Vec<T>, Vec<T>) =
                records.drain(..).partition(|r| predicate(r));
            *records = kept;
            if removed.is_empty() {
                Change::Keep(removed)
            } else {
                Change::Write(removed)
            }
        })
        .await
    }

    pub async fn modify<R, F>(&self, change: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut Vec<T>) -> Change<R> + Send,
        R: Send,
    {
        self.try_modify(move |records| Ok(change(records))).await
    }

    /// Loads every record, hands them to `change` and rewrites the file
    /// when it returns [`Change::Write`]. An error leaves the file untouched.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn try_modify<R, F>(&self, change: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut Vec<T>) -> Result<Change<R>, AppError> + Send,
        R: Send,
    {
        let _guard = self.lock.lock().await;
        let mut records = self.read().await?;

        match change(&mut records)? {
            Change::Write(result) => {
                self.write(&records).await?;
                Ok(result)
            }
            Change::Keep(result) => Ok(result),
        }
    }
}

impl<T: Record> JsonStore<T> {
    /// Appends `record` under a freshly assigned id and returns it.
    pub async fn add(&self, mut record: T) -> Result<T, AppError> {
        self.modify(move |records| {
            let id = T::Id::next(records.iter().map(Record::id));
            record.set_id(id);
            records.push(record.clone());
            Change::Write(record)
        })
        .await
    }

    pub async fn find_by_id(&self, id: &T::Id) -> Result<Option<T>, AppError> {
        let records = self.get_all().await?;
        Ok(records.into_iter().find(|r| r.id() == id))
    }
}

impl<T: Owned> JsonStore<T> {
    pub async fn get_by_owner(&self, owner: &T::Owner) -> Result<Vec<T>, AppError> {
        self.filter(|r| r.owner() == owner).await
    }

    pub async fn find_owned(&self, id: &T::Id, owner: &T::Owner) -> Result<Option<T>, AppError> {
        let records = self.get_all().await?;
        Ok(records
            .into_iter()
            .find(|r| r.id() == id && r.owner() == owner))
    }

    /// Applies `apply` to the record matching both `id` and `owner`.
    /// Returns `None` without writing when nothing matches.
    pub async fn update<F>(
        &self,
        id: &T::Id,
        owner: &T::Owner,
        apply: F,
    ) -> Result<Option<T>, AppError>
    where
        F: FnOnce(&mut T) + Send,
    {
        self.modify(move |records| {
            match records
                .iter_mut()
                .find(|r| r.id() == id && r.owner() == owner)
            {
                Some(record) => {
                    apply(record);
                    Change::Write(Some(record.clone()))
                }
                None => Change::Keep(None),
            }
        })
        .await
    }

    pub async fn delete(&self, id: &T::Id, owner: &T::Owner) -> Result<bool, AppError> {
        self.modify(move |records| {
            match records
                .iter()
                .position(|r| r.id() == id && r.owner() == owner)
            {
                Some(index) => {
                    records.remove(index);
                    Change::Write(true)
                }
                None => Change::Keep(false),
            }
        })
        .await
    }
}
