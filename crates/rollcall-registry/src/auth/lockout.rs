//! Login lockout policy for brute-force protection
//!
//! After `threshold` consecutive failed logins the session is locked for
//! `cooldown_secs`. Once the cooldown has elapsed the failure counter starts
//! again from zero.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest cooldown applied, whatever the configuration says (one year)
pub const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 60 * 60;

/// Lockout policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger a lockout
    pub threshold: u32,
    /// Lockout duration in seconds
    pub cooldown_secs: u64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: 3,
            cooldown_secs: 30,
        }
    }
}

impl LockoutPolicy {
    /// Create a strict policy (locks out sooner, for longer)
    pub fn strict() -> Self {
        Self {
            threshold: 2,
            cooldown_secs: 300,
        }
    }

    /// Create a lenient policy (more attempts allowed)
    pub fn lenient() -> Self {
        Self {
            threshold: 5,
            cooldown_secs: 15,
        }
    }

    /// Lockout duration, capped at [`MAX_COOLDOWN_SECS`]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs.min(MAX_COOLDOWN_SECS))
    }

    /// Check if the given failure count locks the session
    pub fn is_locked(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.threshold.max(1)
    }

    /// Attempts left before the lockout triggers
    pub fn attempts_remaining(&self, failed_attempts: u32) -> u32 {
        self.threshold.max(1).saturating_sub(failed_attempts)
    }

    /// Get a human-readable description of the current lockout state
    pub fn describe_lockout(&self, failed_attempts: u32) -> String {
        if self.is_locked(failed_attempts) {
            let secs = self.cooldown().as_secs();
            if secs < 60 {
                format!("Locked for {} seconds", secs)
            } else if secs < 3600 {
                format!("Locked for {} minutes", secs / 60)
            } else {
                format!("Locked for {} hours", secs / 3600)
            }
        } else {
            format!(
                "{} attempts remaining",
                self.attempts_remaining(failed_attempts)
            )
        }
    }
}
