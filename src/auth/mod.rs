pub mod authentication;
pub mod otp;
pub mod password;
pub mod permissions;
pub mod session;
pub mod user;

pub use authentication::*;
pub use otp::{NewAccount, OtpChallenge, OtpError, OtpPurpose, PendingAction};
pub use password::{hash_secret, verify_secret};
pub use permissions::*;
pub use session::{Identity, SESSION_COOKIE, Session, SessionStore};
pub use user::*;
