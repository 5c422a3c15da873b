use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::Role;
use super::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OtpPurpose {
    Registration,
    AccountCreation,
    Login,
    PasswordReset,
}

/// An account waiting for its email address to be confirmed. The password
/// is already hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub age: Option<i32>,
    pub course: String,
    pub role: Role,
    pub widget_permissions: Vec<String>,
    pub security_pin_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Registration(NewAccount),
    AccountCreation(NewAccount),
    Login { user_id: i64 },
    PasswordReset { email: String },
}

impl PendingAction {
    pub fn purpose(&self) -> OtpPurpose {
        match self {
            PendingAction::Registration(_) => OtpPurpose::Registration,
            PendingAction::AccountCreation(_) => OtpPurpose::AccountCreation,
            PendingAction::Login { .. } => OtpPurpose::Login,
            PendingAction::PasswordReset { .. } => OtpPurpose::PasswordReset,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub action: PendingAction,
}

impl OtpChallenge {
    pub fn purpose(&self) -> OtpPurpose {
        self.action.purpose()
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("Session expired or invalid")]
    NoChallenge,

    #[error("OTP has expired")]
    Expired,

    #[error("Invalid OTP")]
    Mismatch,

    #[error("Too many attempts")]
    TooManyAttempts,
}

pub fn generate_code() -> String {
    rand::rng().random_range(100_000..=999_999).to_string()
}

/// Stores a fresh challenge in the session, replacing any earlier one, and
/// returns the code to send.
#[instrument(skip(sessions, token, action), fields(purpose = ?action.purpose()))]
pub fn begin_challenge(
    sessions: &SessionStore,
    token: &str,
    action: PendingAction,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, OtpError> {
    let code = generate_code();
    let challenge = OtpChallenge {
        code: code.clone(),
        issued_at: now,
        expires_at: now + ttl,
        attempts: 0,
        action,
    };

    sessions
        .update(token, |session| session.challenge = Some(challenge))
        .ok_or(OtpError::NoChallenge)?;

    info!("Issued OTP challenge");
    Ok(code)
}

/// Checks `input` against the session's challenge. On a match the challenge
/// is removed from the session and returned. A challenge whose purpose is
/// not in `accepted` is left alone.
#[instrument(skip(sessions, token, input))]
pub fn complete_challenge(
    sessions: &SessionStore,
    token: &str,
    input: &str,
    accepted: &[OtpPurpose],
    max_attempts: u32,
    now: DateTime<Utc>,
) -> Result<OtpChallenge, OtpError> {
    let outcome = sessions.update(token, |session| {
        let challenge = match session.challenge.as_mut() {
            Some(challenge) if accepted.contains(&challenge.purpose()) => challenge,
            _ => return Err(OtpError::NoChallenge),
        };

        if now > challenge.expires_at {
            session.challenge = None;
            return Err(OtpError::Expired);
        }

        if challenge.code != input {
            challenge.attempts += 1;
            if challenge.attempts >= max_attempts {
                session.challenge = None;
                return Err(OtpError::TooManyAttempts);
            }
            return Err(OtpError::Mismatch);
        }

        session.challenge.take().ok_or(OtpError::NoChallenge)
    });

    match outcome {
        Some(Ok(challenge)) => {
            info!(purpose = ?challenge.purpose(), "OTP challenge completed");
            Ok(challenge)
        }
        Some(Err(err)) => {
            warn!(error = %err, "OTP challenge rejected");
            Err(err)
        }
        None => Err(OtpError::NoChallenge),
    }
}
