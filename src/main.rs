#[macro_use]
extern crate rocket;

use rocket::tokio;
use student_hub::auth::SessionStore;
use student_hub::config::{AppConfig, load_environment};
use student_hub::db::Stores;
use student_hub::init_rocket;
use student_hub::mailer::LogMailer;
use student_hub::telemetry::init_tracing;
use tracing::{error, info, warn};

#[launch]
async fn rocket() -> _ {
    let env_result = load_environment();
    init_tracing();
    if let Err(e) = env_result {
        warn!("Failed to load environment files: {}", e);
    }

    let config = match AppConfig::from_figment(&rocket::Config::figment()) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid application configuration: {}", e);
            panic!("Invalid application configuration: {}", e);
        }
    };

    let stores = Stores::open(&config.data_dir);
    let mailer = LogMailer::new(config.mail_log.clone());
    let sessions = SessionStore::new(config.session_idle());

    let sessions_clone = sessions.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;

            let count = sessions_clone.clean_expired();
            if count > 0 {
                info!("Cleaned up {} expired sessions", count);
            }
        }
    });

    init_rocket(config, stores, sessions, Box::new(mailer))
}
