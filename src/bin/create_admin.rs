use std::path::PathBuf;

use anyhow::anyhow;
use student_hub::Error;
use student_hub::auth::{NewAccount, Role, hash_secret};
use student_hub::config::load_environment;
use student_hub::db::Stores;
use student_hub::db::users::{create_user, user_exists};
use student_hub::telemetry::init_tracing;
use tracing::{info, warn};

fn required_var(name: &str) -> Result<String, Error> {
    dotenvy::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("{} must be set", name).into())
}

/// Seeds an administrator account into the data directory.
///
/// Reads `ADMIN_EMAIL`, `ADMIN_PASSWORD`, optional `ADMIN_NAME` and
/// `DATA_DIR` (default `data`).
#[tokio::main]
async fn main() -> Result<(), Error> {
    let env_result = load_environment();
    init_tracing();
    if let Err(e) = env_result {
        warn!("Failed to load environment files: {}", e);
    }

    let email = required_var("ADMIN_EMAIL")?;
    let password = required_var("ADMIN_PASSWORD")?;
    let name = dotenvy::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string());
    let data_dir = PathBuf::from(dotenvy::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));

    let stores = Stores::open(&data_dir);
    if user_exists(&stores.users, &email).await? {
        warn!(email = %email, "Account already exists, nothing to do");
        return Ok(());
    }

    let admin = create_user(
        &stores.users,
        NewAccount {
            email,
            password_hash: hash_secret(&password)?,
            name,
            age: None,
            course: "Administration".to_string(),
            role: Role::Admin,
            widget_permissions: Vec::new(),
            security_pin_hash: None,
        },
    )
    .await?;

    info!(id = admin.id, email = %admin.email, "Created administrator");
    Ok(())
}
