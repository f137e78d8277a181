//! Rollcall Core - Account types, password hashing and storage format
//!
//! This crate provides the building blocks shared by the account registry:
//! - Account, profile and update types
//! - The error taxonomy used across the workspace
//! - Argon2id password hashing
//! - The CSV record format used for storage, export and import
//! - Monthly registration growth series

pub mod account;
pub mod error;
pub mod growth;
pub mod password;
pub mod record;

pub use account::{
    Account, AccountUpdate, Gender, NewAccount, PreferenceEdit, Preferences, Profile,
    ProfileUpdate, UserType,
};
pub use error::{Error, Result};
pub use growth::{monthly_registrations, MonthlyCount, YearMonth};
pub use password::PasswordPolicy;
pub use record::{read_accounts, write_accounts, COLUMNS};
