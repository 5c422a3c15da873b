use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;

use super::Role;
use super::otp::OtpChallenge;

pub const SESSION_COOKIE: &str = "session_token";

const TOKEN_LENGTH: usize = 32;

/// Who the session belongs to once a login or registration completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub identity: Option<Identity>,
    pub pin_verified: bool,
    pub pin_attempts: u32,
    pub challenge: Option<OtpChallenge>,
}

impl Session {
    fn new(token: String, now: DateTime<Utc>) -> Self {
        Self {
            token,
            created_at: now,
            last_seen: now,
            identity: None,
            pin_verified: false,
            pin_attempts: 0,
            challenge: None,
        }
    }

    pub fn is_expired(&self, idle: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_seen > idle
    }
}

/// Server-side session state keyed by the token carried in the private
/// session cookie. Clones share the same sessions.
#[derive(Clone)]
pub struct SessionStore {
    idle: Duration,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn generate_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }

    pub fn create(&self) -> Session {
        let session = Session::new(Self::generate_token(), Utc::now());
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.token.clone(), session.clone());
        tracing::debug!("Created session");
        session
    }

    /// Returns the live session for `token` and marks it as seen. An expired
    /// session is dropped and reported as absent.
    pub fn get(&self, token: &str) -> Option<Session> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        let expired = match sessions.get_mut(token) {
            Some(session) if !session.is_expired(self.idle, now) => {
                session.last_seen = now;
                return Some(session.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            sessions.remove(token);
            tracing::info!("Session expired");
        }
        None
    }

    /// Applies `change` to the session behind `token`, if it is still live.
    pub fn update<R>(&self, token: &str, change: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        match sessions.get_mut(token) {
            Some(session) if !session.is_expired(self.idle, now) => {
                session.last_seen = now;
                Some(change(session))
            }
            _ => None,
        }
    }

    pub fn invalidate(&self, token: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .is_some()
    }

    pub fn clean_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(self.idle, now));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
