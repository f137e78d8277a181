//! Authentication module for Rollcall
//!
//! Provides the session policy: who is logged in, login lockout after
//! repeated failures, and idle timeout. Credential checks go through the
//! [`AccountStore`](crate::store::AccountStore).
//!
//! # Security Model
//!
//! - Passwords are Argon2id hashes, compared in constant time
//! - Unknown usernames and wrong passwords produce the same error
//! - Lockout after consecutive failures blocks further attempts until a cooldown elapses
//! - Idle timeout logs the user out on the next access

mod lockout;
mod session;

pub use lockout::{LockoutPolicy, MAX_COOLDOWN_SECS};
pub use session::{Session, SessionConfig};

use std::time::Duration;

/// Observable state of a [`Session`]
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nobody is logged in
    #[default]
    LoggedOut,
    /// Authenticated with an active (non-idle) session
    LoggedIn { principal: String },
    /// Logins are refused for the remaining duration
    Locked { remaining: Duration },
}

impl SessionState {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, SessionState::LoggedIn { .. })
    }
}
