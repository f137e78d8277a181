//! Rollcall Registry - Account store and session policy
//!
//! This crate provides:
//! - The CSV-backed [`AccountStore`] with atomic persistence
//! - Session handling with login lockout and idle timeout ([`auth`])
//! - Configuration loading ([`RegistryConfig`])
//!
//! Every store mutation rewrites the whole data file through a temporary
//! file and a rename, so a crash never leaves a half-written file behind.

pub mod auth;
pub mod config;
pub mod store;

pub use auth::{LockoutPolicy, Session, SessionConfig, SessionState};
pub use config::{ConfigError, RegistryConfig, StorageConfig};
pub use store::{AccountSnapshot, AccountStore, ImportReport};

pub use rollcall_core::{Error, Result};
