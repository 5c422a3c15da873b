use tracing::{info, instrument, warn};

use crate::auth::{NewAccount, Role, User, verify_secret};
use crate::error::AppError;
use crate::models::UserRecord;

use super::Stores;
use super::pdfs::remove_stored_file;
use super::store::{Change, JsonStore, Record, RecordId};

impl Record for UserRecord {
    type Id = i64;

    fn id(&self) -> &i64 {
        &self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

pub type UserStore = JsonStore<UserRecord>;

pub fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Result of checking an email and password against the credential store.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialCheck {
    Valid(User),
    UnknownEmail,
    WrongPassword,
}

impl CredentialCheck {
    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            CredentialCheck::Valid(_) => None,
            CredentialCheck::UnknownEmail => Some("Email not registered"),
            CredentialCheck::WrongPassword => Some("Incorrect password"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: String,
    pub age: Option<i32>,
    pub course: String,
}

/// Fields an administrator may change on any account. `None` leaves the
/// password or PIN as it is.
#[derive(Debug, Clone)]
pub struct AdminUserUpdate {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub age: Option<i32>,
    pub role: Role,
    pub course: String,
    pub widget_permissions: Vec<String>,
    pub security_pin_hash: Option<String>,
}

#[instrument(skip(store))]
pub async fn find_by_email(store: &UserStore, email: &str) -> Result<Option<UserRecord>, AppError> {
    let records = store.get_all().await?;
    Ok(records.into_iter().find(|r| same_email(&r.email, email)))
}

pub async fn user_exists(store: &UserStore, email: &str) -> Result<bool, AppError> {
    Ok(find_by_email(store, email).await?.is_some())
}

#[instrument(skip_all, fields(email = %email))]
pub async fn authenticate_user(
    store: &UserStore,
    email: &str,
    password: &str,
) -> Result<CredentialCheck, AppError> {
    info!("Authenticating user");

    let record = match find_by_email(store, email).await? {
        Some(record) => record,
        None => {
            warn!("Login attempt for unknown email");
            return Ok(CredentialCheck::UnknownEmail);
        }
    };

    if verify_secret(password, &record.password_hash) {
        Ok(CredentialCheck::Valid(User::from(record)))
    } else {
        warn!(user_id = record.id, "Incorrect password");
        Ok(CredentialCheck::WrongPassword)
    }
}

/// Adds the account unless the email is already registered.
#[instrument(skip_all, fields(email = %account.email, role = %account.role))]
pub async fn create_user(store: &UserStore, account: NewAccount) -> Result<User, AppError> {
    info!("Creating new user");

    store
        .try_modify(move |records| {
            if records.iter().any(|r| same_email(&r.email, &account.email)) {
                return Err(AppError::Conflict(
                    "User with this email already exists".to_string(),
                ));
            }

            let is_security_enabled = account.security_pin_hash.is_some();
            let record = UserRecord {
                id: i64::next(records.iter().map(|r| &r.id)),
                email: account.email.trim().to_string(),
                password_hash: account.password_hash,
                name: account.name,
                age: account.age,
                course: account.course,
                role: account.role,
                security_pin_hash: account.security_pin_hash,
                is_security_enabled,
                widget_permissions: account.widget_permissions,
            };

            let user = User::from(&record);
            records.push(record);
            Ok(Change::Write(user))
        })
        .await
}

#[instrument(skip(store))]
pub async fn get_user_record(store: &UserStore, id: i64) -> Result<UserRecord, AppError> {
    store
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
}

pub async fn get_user(store: &UserStore, id: i64) -> Result<User, AppError> {
    Ok(User::from(get_user_record(store, id).await?))
}

#[instrument(skip(store))]
pub async fn get_all_users(store: &UserStore) -> Result<Vec<User>, AppError> {
    let records = store.get_all().await?;
    Ok(records.iter().map(User::from).collect())
}

/// Runs `apply` against the record with `id`, failing with `NotFound` when
/// there is none.
async fn modify_user<F>(store: &UserStore, id: i64, apply: F) -> Result<User, AppError>
where
    F: FnOnce(&mut Vec<UserRecord>, usize) -> Result<(), AppError> + Send,
{
    store
        .try_modify(move |records| {
            let index = records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
            apply(records, index)?;
            Ok(Change::Write(User::from(&records[index])))
        })
        .await
}

#[instrument(skip(store))]
pub async fn update_profile(
    store: &UserStore,
    id: i64,
    update: ProfileUpdate,
) -> Result<User, AppError> {
    info!("Updating user profile");
    modify_user(store, id, move |records, index| {
        let record = &mut records[index];
        record.name = update.name;
        record.age = update.age;
        record.course = update.course;
        Ok(())
    })
    .await
}

#[instrument(skip_all, fields(user_id = id))]
pub async fn update_password_hash(
    store: &UserStore,
    id: i64,
    password_hash: String,
) -> Result<(), AppError> {
    info!("Updating user password");
    modify_user(store, id, move |records, index| {
        records[index].password_hash = password_hash;
        Ok(())
    })
    .await
    .map(|_| ())
}

#[instrument(skip_all, fields(email = %email))]
pub async fn reset_password(
    store: &UserStore,
    email: &str,
    password_hash: String,
) -> Result<(), AppError> {
    info!("Resetting user password");
    store
        .try_modify(move |records| {
            let record = records
                .iter_mut()
                .find(|r| same_email(&r.email, email))
                .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;
            record.password_hash = password_hash;
            Ok(Change::Write(()))
        })
        .await
}

#[instrument(skip_all, fields(user_id = id, email = %update.email))]
pub async fn admin_update_user(
    store: &UserStore,
    id: i64,
    update: AdminUserUpdate,
) -> Result<User, AppError> {
    info!("Updating user as administrator");
    modify_user(store, id, move |records, index| {
        let taken = records
            .iter()
            .any(|r| r.id != id && same_email(&r.email, &update.email));
        if taken {
            return Err(AppError::Conflict("Email is already in use".to_string()));
        }

        let record = &mut records[index];
        record.name = update.name;
        record.email = update.email.trim().to_string();
        record.age = update.age;
        record.role = update.role;
        record.widget_permissions = update.widget_permissions;
        record.course = match update.role {
            Role::Admin => "Administration".to_string(),
            _ if update.course.trim().is_empty() => "General".to_string(),
            _ => update.course,
        };

        if let Some(hash) = update.password_hash {
            record.password_hash = hash;
        }
        if let Some(hash) = update.security_pin_hash {
            record.security_pin_hash = Some(hash);
            record.is_security_enabled = true;
        }
        Ok(())
    })
    .await
}

#[instrument(skip(store))]
pub async fn delete_user(store: &UserStore, id: i64) -> Result<bool, AppError> {
    Ok(remove_user(store, id).await?.is_some())
}

async fn remove_user(store: &UserStore, id: i64) -> Result<Option<UserRecord>, AppError> {
    info!("Deleting user");
    store
        .modify(move |records| match records.iter().position(|r| r.id == id) {
            Some(index) => Change::Write(Some(records.remove(index))),
            None => Change::Keep(None),
        })
        .await
}

/// Deletes the account and everything it owns, so a later account that
/// reuses the id or the email starts empty. The activity log is kept.
#[instrument(skip(stores))]
pub async fn delete_account(stores: &Stores, id: i64) -> Result<bool, AppError> {
    let Some(record) = remove_user(&stores.users, id).await? else {
        return Ok(false);
    };
    let email = record.email.as_str();

    let notes = stores
        .notes
        .remove_where(|n| same_email(&n.user_email, email))
        .await?;
    let habits = stores
        .habits
        .remove_where(|h| same_email(&h.user_email, email))
        .await?;
    let entries = stores
        .time_entries
        .remove_where(|t| same_email(&t.user_email, email))
        .await?;
    let goals = stores.goals.remove_where(|g| g.user_id == id).await?;
    let documents = stores.pdfs.remove_where(|p| p.user_id == id).await?;
    for document in &documents {
        remove_stored_file(&stores.pdf_dir, document).await?;
    }

    info!(
        notes = notes.len(),
        habits = habits.len(),
        time_entries = entries.len(),
        goals = goals.len(),
        pdfs = documents.len(),
        "Removed account data"
    );
    Ok(true)
}

/// Checks `pin` against the user's stored PIN hash. Users without a PIN
/// never verify.
#[instrument(skip(store, pin))]
pub async fn verify_pin(store: &UserStore, id: i64, pin: &str) -> Result<bool, AppError> {
    let record = get_user_record(store, id).await?;
    Ok(match record.security_pin_hash.as_deref() {
        Some(hash) if record.is_security_enabled => verify_secret(pin.trim(), hash),
        _ => false,
    })
}
