//! Session context for one user
//!
//! A session tracks who is logged in, when they were last active and how
//! many logins have failed in a row. It is an ordinary value owned by the
//! caller (one per connection or terminal), never global state.
//!
//! Every check of the principal also checks the idle timeout, so an expired
//! session is logged out the moment it is next used.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rollcall_core::{Account, AccountUpdate, Error, ProfileUpdate, Result};

use super::{LockoutPolicy, SessionState};
use crate::store::AccountStore;

/// Session timeout configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
    /// Warning period before timeout in seconds (for UI notifications)
    pub warning_period_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,  // 5 minutes
            warning_period_secs: 60, // 1 minute warning
        }
    }
}

impl SessionConfig {
    /// Create a stricter configuration for shared terminals
    pub fn strict() -> Self {
        Self {
            idle_timeout_secs: 120,
            warning_period_secs: 30,
        }
    }

    /// Create a more lenient configuration for development
    pub fn development() -> Self {
        Self {
            idle_timeout_secs: 1800,
            warning_period_secs: 300,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn warning_period(&self) -> Duration {
        Duration::from_secs(self.warning_period_secs)
    }
}

/// Authentication state for one user context
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    lockout: LockoutPolicy,
    /// Logged-in username
    principal: Option<String>,
    /// When the principal was last active
    last_activity: Instant,
    /// Consecutive failed logins
    failed_attempts: u32,
    /// Logins are refused until this instant
    locked_until: Option<Instant>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default(), LockoutPolicy::default())
    }
}

impl Session {
    /// Create a logged-out session
    pub fn new(config: SessionConfig, lockout: LockoutPolicy) -> Self {
        Self {
            config,
            lockout,
            principal: None,
            last_activity: Instant::now(),
            failed_attempts: 0,
            locked_until: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn lockout_policy(&self) -> &LockoutPolicy {
        &self.lockout
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Current state, without refreshing activity or clearing anything
    pub fn state(&self) -> SessionState {
        self.state_at(Instant::now())
    }

    pub fn state_at(&self, now: Instant) -> SessionState {
        if let Some(until) = self.locked_until {
            if now < until {
                return SessionState::Locked {
                    remaining: until - now,
                };
            }
        }

        match &self.principal {
            Some(principal) if !self.is_idle_at(now) => SessionState::LoggedIn {
                principal: principal.clone(),
            },
            _ => SessionState::LoggedOut,
        }
    }

    /// Log in with a username and password
    pub fn authenticate(
        &mut self,
        store: &AccountStore,
        username: &str,
        password: &str,
    ) -> Result<()> {
        self.authenticate_at(store, username, password, Instant::now())
    }

    /// Log in at an explicit instant
    ///
    /// While locked, credentials are not even checked. Any existing
    /// principal is logged out first, so a failed attempt never leaves the
    /// previous user logged in.
    pub fn authenticate_at(
        &mut self,
        store: &AccountStore,
        username: &str,
        password: &str,
        now: Instant,
    ) -> Result<()> {
        if let Some(until) = self.locked_until {
            if now < until {
                let remaining = until - now;
                warn!(
                    username,
                    remaining_secs = remaining.as_secs(),
                    "Login refused while locked"
                );
                return Err(Error::TooManyAttempts {
                    retry_after_secs: ceil_secs(remaining),
                });
            }
            debug!("Lockout cooldown elapsed");
            self.locked_until = None;
            self.failed_attempts = 0;
        }

        if let Some(previous) = self.principal.take() {
            debug!(previous = %previous, "Replacing logged-in user");
        }

        if store.verify(username, password) {
            self.principal = Some(username.to_string());
            self.failed_attempts = 0;
            self.last_activity = now;
            info!(username, "Logged in");
            return Ok(());
        }

        self.failed_attempts += 1;
        if self.lockout.is_locked(self.failed_attempts) {
            let cooldown = self.lockout.cooldown();
            self.locked_until = now
                .checked_add(cooldown)
                .or_else(|| now.checked_add(LockoutPolicy::default().cooldown()));
            warn!(
                failed_attempts = self.failed_attempts,
                cooldown_secs = cooldown.as_secs(),
                "Too many failed logins - session locked"
            );
        } else {
            info!(failed_attempts = self.failed_attempts, "Failed login");
        }
        Err(Error::InvalidCredentials)
    }

    /// Log out. Always succeeds, even when nobody is logged in.
    pub fn logout(&mut self) {
        if let Some(principal) = self.principal.take() {
            info!(username = %principal, "Logged out");
        }
    }

    /// The logged-in username, refreshing activity
    pub fn current_user(&mut self) -> Result<String> {
        self.require_principal_at(Instant::now())
    }

    /// Check the principal at an explicit instant
    ///
    /// Reports `SessionExpired` (and logs the user out) once the session has
    /// been idle for longer than the timeout; otherwise refreshes activity.
    pub fn require_principal_at(&mut self, now: Instant) -> Result<String> {
        let Some(principal) = self.principal.clone() else {
            return Err(Error::NotLoggedIn);
        };

        if self.is_idle_at(now) {
            self.principal = None;
            info!(username = %principal, "Session expired after idle timeout");
            return Err(Error::SessionExpired);
        }

        self.last_activity = now;
        Ok(principal)
    }

    /// Get seconds until idle timeout
    pub fn idle_seconds_remaining(&self) -> u64 {
        self.idle_remaining().as_secs()
    }

    /// Check if a logged-in session is within the warning period
    pub fn should_warn(&self) -> bool {
        self.principal.is_some()
            && !self.is_idle_at(Instant::now())
            && self.idle_remaining() <= self.config.warning_period()
    }

    fn idle_remaining(&self) -> Duration {
        self.config
            .idle_timeout()
            .saturating_sub(self.last_activity.elapsed())
    }

    /// Profile of the logged-in user
    pub fn profile(&mut self, store: &AccountStore) -> Result<Account> {
        let username = self.current_user()?;
        store.get(&username)
    }

    /// Edit the logged-in user's profile
    pub fn update_profile(
        &mut self,
        store: &AccountStore,
        update: ProfileUpdate,
    ) -> Result<Account> {
        let username = self.current_user()?;
        store.update(&username, AccountUpdate::profile(update))
    }

    /// Change the logged-in user's password after re-checking the current one
    pub fn change_password(
        &mut self,
        store: &AccountStore,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let username = self.current_user()?;
        if !store.verify(&username, current_password) {
            return Err(Error::InvalidCredentials);
        }
        store.reset_password(&username, new_password)?;
        Ok(())
    }

    /// Set one of the logged-in user's preferences
    pub fn set_preference(
        &mut self,
        store: &AccountStore,
        key: &str,
        value: &str,
    ) -> Result<Account> {
        let username = self.current_user()?;
        store.set_preference(&username, key, value)
    }

    pub fn remove_preference(&mut self, store: &AccountStore, key: &str) -> Result<Account> {
        let username = self.current_user()?;
        store.remove_preference(&username, key)
    }

    /// Delete the logged-in user's account, then log out
    pub fn delete_account(&mut self, store: &AccountStore) -> Result<()> {
        let username = self.current_user()?;
        store.delete(&username)?;
        self.logout();
        Ok(())
    }

    fn is_idle_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) > self.config.idle_timeout()
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
