//! Account, profile and update types

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-account settings, ordered by key
pub type Preferences = BTreeMap<String, String>;

/// Kind of business the account represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UserType {
    #[default]
    Retailer,
    Wholesaler,
    Distributor,
}

impl UserType {
    pub const ALL: [UserType; 3] = [
        UserType::Retailer,
        UserType::Wholesaler,
        UserType::Distributor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Retailer => "Retailer",
            UserType::Wholesaler => "Wholesaler",
            UserType::Distributor => "Distributor",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        UserType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown user type: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Gender::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown gender: {s}")))
    }
}

/// Personal, contact and identity details of an account holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_type: UserType,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    /// Aadhaar (national identity) number
    pub aadhaar_number: String,
    /// PAN (tax identity) number
    pub pan_number: String,
}

impl Profile {
    /// Check that every required text field is filled in.
    pub fn validate(&self) -> Result<()> {
        check_required([
            ("first name", Some(&self.first_name)),
            ("last name", Some(&self.last_name)),
            ("email", Some(&self.email)),
            ("phone number", Some(&self.phone_number)),
            ("address", Some(&self.address)),
            ("city", Some(&self.city)),
            ("state", Some(&self.state)),
            ("postal code", Some(&self.postal_code)),
            ("aadhaar number", Some(&self.aadhaar_number)),
            ("PAN number", Some(&self.pan_number)),
        ])
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fail with the names of required fields that are present but blank.
fn check_required(fields: [(&str, Option<&String>); 10]) -> Result<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.is_some_and(|v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// A stored account
///
/// The username and registration date are fixed at creation; the store
/// never applies an update that touches them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub username: String,
    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub profile: Profile,
    pub registered_on: NaiveDate,
    pub preferences: Preferences,
}

/// Registration input
#[derive(Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub profile: Profile,
}

impl NewAccount {
    pub fn new(username: impl Into<String>, password: impl Into<String>, profile: Profile) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            profile,
        }
    }

    /// Validate the username and profile. Password strength is checked
    /// separately by [`crate::PasswordPolicy::check`].
    pub fn validate(&self) -> Result<()> {
        validate_username(&self.username)?;
        self.profile.validate()
    }
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("profile", &self.profile)
            .finish()
    }
}

/// Usernames must be non-blank and carry no surrounding whitespace.
pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(Error::InvalidInput("username is required".into()));
    }
    if username.trim() != username {
        return Err(Error::InvalidInput(
            "username must not start or end with whitespace".into(),
        ));
    }
    if username.chars().any(char::is_control) {
        return Err(Error::InvalidInput(
            "username must not contain control characters".into(),
        ));
    }
    Ok(())
}

/// Field-level profile changes; `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub user_type: Option<UserType>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub aadhaar_number: Option<String>,
    pub pan_number: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ProfileUpdate::default()
    }

    /// Reject blank values for the fields this update sets. Fields it
    /// leaves alone are not checked.
    pub fn validate(&self) -> Result<()> {
        check_required([
            ("first name", self.first_name.as_ref()),
            ("last name", self.last_name.as_ref()),
            ("email", self.email.as_ref()),
            ("phone number", self.phone_number.as_ref()),
            ("address", self.address.as_ref()),
            ("city", self.city.as_ref()),
            ("state", self.state.as_ref()),
            ("postal code", self.postal_code.as_ref()),
            ("aadhaar number", self.aadhaar_number.as_ref()),
            ("PAN number", self.pan_number.as_ref()),
        ])
    }

    pub fn apply(self, profile: &mut Profile) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut profile.user_type, self.user_type);
        set(&mut profile.first_name, self.first_name);
        set(&mut profile.last_name, self.last_name);
        set(&mut profile.date_of_birth, self.date_of_birth);
        set(&mut profile.gender, self.gender);
        set(&mut profile.email, self.email);
        set(&mut profile.phone_number, self.phone_number);
        set(&mut profile.address, self.address);
        set(&mut profile.city, self.city);
        set(&mut profile.state, self.state);
        set(&mut profile.postal_code, self.postal_code);
        set(&mut profile.aadhaar_number, self.aadhaar_number);
        set(&mut profile.pan_number, self.pan_number);
    }
}

/// A single change to an account's preferences
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceEdit {
    Set { key: String, value: String },
    Remove { key: String },
    ReplaceAll(Preferences),
}

impl PreferenceEdit {
    pub fn apply(self, preferences: &mut Preferences) {
        match self {
            PreferenceEdit::Set { key, value } => {
                preferences.insert(key, value);
            }
            PreferenceEdit::Remove { key } => {
                preferences.remove(&key);
            }
            PreferenceEdit::ReplaceAll(all) => *preferences = all,
        }
    }

    fn validate(&self) -> Result<()> {
        let check = |key: &str| {
            if key.trim().is_empty() {
                Err(Error::InvalidInput("preference key is required".into()))
            } else {
                Ok(())
            }
        };
        match self {
            PreferenceEdit::Set { key, .. } | PreferenceEdit::Remove { key } => check(key),
            PreferenceEdit::ReplaceAll(all) => all.keys().try_for_each(|k| check(k)),
        }
    }
}

/// Field-level mutation of an existing account
///
/// Username and registration date have no slot here and so can never change.
#[derive(Clone, Default)]
pub struct AccountUpdate {
    /// New plaintext password, hashed by the store before it is kept
    pub password: Option<String>,
    pub profile: ProfileUpdate,
    pub preferences: Vec<PreferenceEdit>,
}

impl AccountUpdate {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Default::default()
        }
    }

    pub fn profile(profile: ProfileUpdate) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }

    pub fn set_preference(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            preferences: vec![PreferenceEdit::Set {
                key: key.into(),
                value: value.into(),
            }],
            ..Default::default()
        }
    }

    pub fn remove_preference(key: impl Into<String>) -> Self {
        Self {
            preferences: vec![PreferenceEdit::Remove { key: key.into() }],
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.profile.is_empty() && self.preferences.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.profile.validate()?;
        self.preferences.iter().try_for_each(PreferenceEdit::validate)
    }

    /// Apply the profile and preference changes. The password, if any, is
    /// handled by the caller because it has to be hashed first.
    ///
    /// Only the fields being set are validated, so an account with a blank
    /// field from an older file can still be edited.
    pub fn apply_fields(self, account: &mut Account) -> Result<()> {
        self.validate()?;

        self.profile.apply(&mut account.profile);
        for edit in self.preferences {
            edit.apply(&mut account.preferences);
        }
        Ok(())
    }
}

impl fmt::Debug for AccountUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountUpdate")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("profile", &self.profile)
            .field("preferences", &self.preferences)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_profile() -> Profile {
        Profile {
            user_type: UserType::Wholesaler,
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 12).unwrap(),
            gender: Gender::Female,
            email: "asha@example.com".into(),
            phone_number: "+91 98450 00000".into(),
            address: "12 MG Road".into(),
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            postal_code: "560001".into(),
            aadhaar_number: "1234 5678 9012".into(),
            pan_number: "ABCDE1234F".into(),
        }
    }

    pub(crate) fn sample_account(username: &str, registered_on: NaiveDate) -> Account {
        Account {
            username: username.into(),
            password_hash: "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaA".into(),
            profile: sample_profile(),
            registered_on,
            preferences: Preferences::new(),
        }
    }

    #[test]
    fn test_profile_validation_lists_missing_fields() {
        let mut profile = sample_profile();
        profile.city = "  ".into();
        profile.pan_number.clear();

        let err = profile.validate().unwrap_err().to_string();
        assert!(err.contains("city"));
        assert!(err.contains("PAN number"));
        assert!(!err.contains("email"));
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("asha").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username(" asha").is_err());
        assert!(validate_username("as\nha").is_err());
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!("retailer".parse::<UserType>().unwrap(), UserType::Retailer);
        assert_eq!("DISTRIBUTOR".parse::<UserType>().unwrap(), UserType::Distributor);
        assert_eq!("female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("manager".parse::<UserType>().is_err());
    }

    #[test]
    fn test_profile_update_touches_only_given_fields() {
        let mut profile = sample_profile();
        let update = ProfileUpdate {
            city: Some("Mysuru".into()),
            user_type: Some(UserType::Distributor),
            ..Default::default()
        };
        update.apply(&mut profile);

        assert_eq!(profile.city, "Mysuru");
        assert_eq!(profile.user_type, UserType::Distributor);
        assert_eq!(profile.first_name, "Asha");
    }

    #[test]
    fn test_apply_fields_rejects_blanking_required_field() {
        let mut account = sample_account("asha", NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        let before = account.clone();
        let update = AccountUpdate::profile(ProfileUpdate {
            email: Some(String::new()),
            ..Default::default()
        });

        assert!(update.apply_fields(&mut account).is_err());
        assert_eq!(account, before);
    }

    #[test]
    fn test_untouched_blank_field_does_not_block_update() {
        let mut account = sample_account("asha", NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        account.profile.city.clear();

        AccountUpdate::set_preference("theme", "dark")
            .apply_fields(&mut account)
            .unwrap();
        assert_eq!(account.preferences.get("theme").map(String::as_str), Some("dark"));

        let fill_city = AccountUpdate::profile(ProfileUpdate {
            city: Some("Mysuru".into()),
            ..Default::default()
        });
        fill_city.apply_fields(&mut account).unwrap();
        assert!(account.profile.validate().is_ok());
    }

    #[test]
    fn test_preference_edits() {
        let mut prefs = Preferences::new();
        PreferenceEdit::Set { key: "theme".into(), value: "dark".into() }.apply(&mut prefs);
        PreferenceEdit::Set { key: "lang".into(), value: "kn".into() }.apply(&mut prefs);
        PreferenceEdit::Remove { key: "theme".into() }.apply(&mut prefs);

        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs.get("lang").map(String::as_str), Some("kn"));
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let new = NewAccount::new("asha", "s3cret-pass", sample_profile());
        assert!(!format!("{new:?}").contains("s3cret-pass"));

        let update = AccountUpdate::password("n3w-pass-word");
        assert!(!format!("{update:?}").contains("n3w-pass-word"));
    }

    #[test]
    fn test_blank_preference_key_rejected() {
        assert!(AccountUpdate::set_preference(" ", "x").validate().is_err());
        assert!(AccountUpdate::set_preference("theme", "").validate().is_ok());
    }
}
