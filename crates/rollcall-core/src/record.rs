//! CSV record format
//!
//! One account per row, one column per field, with a header row. The same
//! format is used for the data file, for export and for import. Dates are
//! written as `YYYY-MM-DD` and preferences as a JSON object in one cell.

use std::collections::HashSet;
use std::io::{Read, Write};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::account::{validate_username, Account, Gender, Preferences, Profile, UserType};
use crate::error::{Error, Result};
use crate::password::is_phc_hash;

/// Column names, in the order they are written
pub const COLUMNS: [&str; 17] = [
    "Username",
    "Password Hash",
    "User Type",
    "First Name",
    "Last Name",
    "Date of Birth",
    "Gender",
    "Email",
    "Phone Number",
    "Address",
    "City",
    "State",
    "Postal Code",
    "Aadhaar Number",
    "PAN Number",
    "Registration Date",
    "Preferences",
];

/// Flat row layout (csv cannot serialize nested structs)
#[derive(Debug, Serialize, Deserialize)]
struct AccountRecord {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Password Hash")]
    password_hash: String,
    #[serde(rename = "User Type")]
    user_type: UserType,
    #[serde(rename = "First Name")]
    first_name: String,
    #[serde(rename = "Last Name")]
    last_name: String,
    #[serde(rename = "Date of Birth")]
    date_of_birth: NaiveDate,
    #[serde(rename = "Gender")]
    gender: Gender,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Phone Number")]
    phone_number: String,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Postal Code")]
    postal_code: String,
    #[serde(rename = "Aadhaar Number")]
    aadhaar_number: String,
    #[serde(rename = "PAN Number")]
    pan_number: String,
    #[serde(rename = "Registration Date")]
    registration_date: NaiveDate,
    #[serde(rename = "Preferences", default, with = "json_cell")]
    preferences: Preferences,
}

mod json_cell {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::account::Preferences;

    pub fn serialize<S>(prefs: &Preferences, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if prefs.is_empty() {
            return serializer.serialize_str("");
        }
        let json = serde_json::to_string(prefs).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&json)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Preferences, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.trim().is_empty() {
            return Ok(Preferences::new());
        }
        serde_json::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<&Account> for AccountRecord {
    fn from(account: &Account) -> Self {
        let p = &account.profile;
        Self {
            username: account.username.clone(),
            password_hash: account.password_hash.clone(),
            user_type: p.user_type,
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            date_of_birth: p.date_of_birth,
            gender: p.gender,
            email: p.email.clone(),
            phone_number: p.phone_number.clone(),
            address: p.address.clone(),
            city: p.city.clone(),
            state: p.state.clone(),
            postal_code: p.postal_code.clone(),
            aadhaar_number: p.aadhaar_number.clone(),
            pan_number: p.pan_number.clone(),
            registration_date: account.registered_on,
            preferences: account.preferences.clone(),
        }
    }
}

impl AccountRecord {
    fn into_account(self, row: usize) -> Result<Account> {
        validate_username(&self.username)
            .map_err(|e| Error::InvalidInput(format!("row {row}: {e}")))?;
        if !is_phc_hash(&self.password_hash) {
            return Err(Error::InvalidInput(format!(
                "row {row}: password hash for {} is not a PHC string",
                self.username
            )));
        }

        Ok(Account {
            username: self.username,
            password_hash: self.password_hash,
            profile: Profile {
                user_type: self.user_type,
                first_name: self.first_name,
                last_name: self.last_name,
                date_of_birth: self.date_of_birth,
                gender: self.gender,
                email: self.email,
                phone_number: self.phone_number,
                address: self.address,
                city: self.city,
                state: self.state,
                postal_code: self.postal_code,
                aadhaar_number: self.aadhaar_number,
                pan_number: self.pan_number,
            },
            registered_on: self.registration_date,
            preferences: self.preferences,
        })
    }
}

/// Write accounts as CSV, header first. An empty iterator still writes the
/// header so the file stays self-describing.
pub fn write_accounts<'a, W, I>(writer: W, accounts: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a Account>,
{
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(COLUMNS)?;
    for account in accounts {
        wtr.serialize(AccountRecord::from(account))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse every row of a CSV document into accounts, in file order.
///
/// Any malformed row fails the whole read with `InvalidInput`; duplicate
/// usernames are returned as-is and left to the caller's merge rule.
pub fn read_accounts<R: Read>(reader: R) -> Result<Vec<Account>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = COLUMNS
        .iter()
        .copied()
        .filter(|c| *c != "Preferences" && !headers.iter().any(|h| h == *c))
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "missing columns: {}",
            missing.join(", ")
        )));
    }

    let mut accounts = Vec::new();
    for (index, result) in rdr.deserialize::<AccountRecord>().enumerate() {
        // Row 1 is the header
        let row = index + 2;
        let record = result.map_err(|e| {
            if e.is_io_error() {
                Error::StorageUnavailable(e.to_string())
            } else {
                Error::InvalidInput(format!("row {row}: {e}"))
            }
        })?;
        accounts.push(record.into_account(row)?);
    }
    Ok(accounts)
}

/// Usernames that occur more than once, in order of their second occurrence.
pub fn duplicate_usernames(accounts: &[Account]) -> Vec<&str> {
    let mut seen = HashSet::new();
    accounts
        .iter()
        .filter(|a| !seen.insert(a.username.as_str()))
        .map(|a| a.username.as_str())
        .collect()
}
