use std::path::{Path, PathBuf};

use rocket::figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::Role;

/// Whether a successful password check must be confirmed with an emailed code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginOtpPolicy {
    Never,
    Admins,
    Always,
}

impl LoginOtpPolicy {
    pub fn requires_otp(&self, role: &Role) -> bool {
        match self {
            LoginOtpPolicy::Never => false,
            LoginOtpPolicy::Admins => *role == Role::Admin,
            LoginOtpPolicy::Always => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub otp_ttl_secs: i64,
    pub otp_max_attempts: u32,
    pub session_idle_minutes: i64,
    pub login_otp: LoginOtpPolicy,
    pub mail_log: PathBuf,
    pub pdf_upload_limit_mib: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            otp_ttl_secs: 120,
            otp_max_attempts: 5,
            session_idle_minutes: 30,
            login_otp: LoginOtpPolicy::Admins,
            mail_log: PathBuf::from("data/logs/otp_emails.log"),
            pdf_upload_limit_mib: 10,
        }
    }
}

impl AppConfig {
    /// Reads the application keys out of Rocket's figment (`Rocket.toml`
    /// plus `ROCKET_*` variables). Keys Rocket itself uses are ignored.
    pub fn from_figment(figment: &Figment) -> Result<Self, rocket::figment::Error> {
        let config: AppConfig = figment.extract()?;
        info!(
            data_dir = %config.data_dir.display(),
            login_otp = ?config.login_otp,
            "Loaded application configuration"
        );
        Ok(config)
    }

    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.otp_ttl_secs)
    }

    pub fn session_idle(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_idle_minutes)
    }
}

/// Loads the dotenv files for the active profile. Later files override
/// earlier ones; missing files are skipped.
pub fn load_environment() -> Result<(), dotenvy::Error> {
    let profile = dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

    let profile_file = if profile == "production" {
        "config/prod.env"
    } else {
        "config/dev.env"
    };

    for env_file in ["config/common.env", profile_file, ".secrets.env"] {
        load_env_file(Path::new(env_file))?;
    }

    Ok(())
}

fn load_env_file(path: &Path) -> Result<(), dotenvy::Error> {
    if !path.exists() {
        debug!(path = %path.display(), "Environment file not found, skipping");
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!(path = %path.display(), "Loaded environment file");
    Ok(())
}
