use std::path::PathBuf;

use chrono::Local;
use rocket::tokio::{fs, io::AsyncWriteExt};
use tracing::{info, instrument};

use crate::auth::OtpPurpose;
use crate::error::AppError;

#[rocket::async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<(), AppError>;
}

/// Delivers codes by appending them to a mail log, one line per message.
pub struct LogMailer {
    path: PathBuf,
}

impl LogMailer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn subject(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::Registration => "Verify your email address",
        OtpPurpose::AccountCreation => "Your new account verification code",
        OtpPurpose::Login => "Your login verification code",
        OtpPurpose::PasswordReset => "Your password reset code",
    }
}

#[rocket::async_trait]
impl Mailer for LogMailer {
    #[instrument(skip(self, code))]
    async fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let line = format!(
            "{} | To: {} | Subject: {} | OTP: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            to,
            subject(purpose),
            code
        );

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        info!(to = %to, purpose = ?purpose, "OTP email queued to mail log");
        Ok(())
    }
}
