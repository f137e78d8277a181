//! CSV-backed account store
//!
//! Keeps every account in memory, keyed by username, and rewrites the whole
//! data file after each mutation. The write goes to a temporary sibling file
//! which is synced and then renamed over the live file. The in-memory state
//! is only replaced once the rename has succeeded, so a failed write leaves
//! both the file and memory exactly as they were.
//!
//! All mutations hold one lock for the whole read-modify-persist cycle.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Local;
use tracing::{debug, info, warn};

use rollcall_core::{
    monthly_registrations, read_accounts, record, write_accounts, Account, AccountUpdate, Error,
    MonthlyCount, NewAccount, PasswordPolicy, Preferences, Result,
};

use crate::config::RegistryConfig;

/// Checked against the dummy hash when a username is unknown, so the
/// response costs the same as a wrong password.
const DUMMY_PASSWORD: &str = "rollcall-dummy-password";

/// Account store backed by a single CSV file
pub struct AccountStore {
    /// Data file path
    path: PathBuf,
    /// Hashing cost and strength rules
    policy: PasswordPolicy,
    /// Hash used to verify unknown usernames
    dummy_hash: String,
    accounts: Mutex<BTreeMap<String, Account>>,
}

/// Immutable copy of the store taken by [`AccountStore::list`]
///
/// Iterate it as often as needed; it never changes after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSnapshot {
    accounts: Vec<Account>,
}

impl AccountSnapshot {
    /// Accounts in username order
    pub fn iter(&self) -> std::slice::Iter<'_, Account> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> + '_ {
        self.accounts.iter().map(|a| a.username.as_str())
    }
}

impl<'a> IntoIterator for &'a AccountSnapshot {
    type Item = &'a Account;
    type IntoIter = std::slice::Iter<'a, Account>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for AccountSnapshot {
    type Item = Account;
    type IntoIter = std::vec::IntoIter<Account>;

    fn into_iter(self) -> Self::IntoIter {
        self.accounts.into_iter()
    }
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Usernames added to the store
    pub imported: Vec<String>,
    /// Usernames skipped because they already existed (in the store or
    /// earlier in the same file)
    pub skipped: Vec<String>,
}

impl ImportReport {
    pub fn has_conflicts(&self) -> bool {
        !self.skipped.is_empty()
    }
}

impl AccountStore {
    /// Open the store at the configured data file
    pub fn open(config: &RegistryConfig) -> Result<Self> {
        Self::open_at(&config.storage.data_file, config.password.clone())
    }

    /// Open (or start) a store at `path`
    ///
    /// A missing file gives an empty store. A file that cannot be parsed is
    /// moved aside to `<file>.corrupt` (or `<file>.corrupt.N` when that is
    /// taken) and the store starts empty.
    pub fn open_at(path: impl Into<PathBuf>, policy: PasswordPolicy) -> Result<Self> {
        let path = path.into();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let accounts = load_accounts(&path)?;
        let dummy_hash = policy.hash(DUMMY_PASSWORD)?;

        info!(
            path = %path.display(),
            accounts = accounts.len(),
            "Opened account store"
        );

        Ok(Self {
            path,
            policy,
            dummy_hash,
            accounts: Mutex::new(accounts),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.lock().contains_key(username)
    }

    /// Register a new account
    pub fn create(&self, new_account: NewAccount) -> Result<Account> {
        new_account.validate()?;
        self.policy.check(&new_account.password)?;

        // Cheap early rejection; checked again under the lock
        if self.contains(&new_account.username) {
            return Err(Error::DuplicateUsername(new_account.username));
        }

        let account = Account {
            password_hash: self.policy.hash(&new_account.password)?,
            username: new_account.username,
            profile: new_account.profile,
            registered_on: Local::now().date_naive(),
            preferences: Preferences::new(),
        };

        let account = self.mutate(|accounts| {
            if accounts.contains_key(&account.username) {
                return Err(Error::DuplicateUsername(account.username.clone()));
            }
            accounts.insert(account.username.clone(), account.clone());
            Ok(account)
        })?;

        info!(username = %account.username, "Registered account");
        Ok(account)
    }

    /// Get an account by username
    pub fn get(&self, username: &str) -> Result<Account> {
        self.lock()
            .get(username)
            .cloned()
            .ok_or_else(|| Error::NotFound(username.to_string()))
    }

    /// Apply field-level changes to an account
    pub fn update(&self, username: &str, mut update: AccountUpdate) -> Result<Account> {
        update.validate()?;

        // Cheap early rejection; checked again under the lock
        if !self.contains(username) {
            return Err(Error::NotFound(username.to_string()));
        }

        // Hash outside the lock
        let new_hash = match update.password.take() {
            Some(password) => {
                self.policy.check(&password)?;
                Some(self.policy.hash(&password)?)
            }
            None => None,
        };
        let password_changed = new_hash.is_some();

        let account = self.mutate(|accounts| {
            let mut account = accounts
                .get(username)
                .cloned()
                .ok_or_else(|| Error::NotFound(username.to_string()))?;

            update.apply_fields(&mut account)?;
            if let Some(hash) = new_hash {
                account.password_hash = hash;
            }

            accounts.insert(account.username.clone(), account.clone());
            Ok(account)
        })?;

        info!(username, password_changed, "Updated account");
        Ok(account)
    }

    /// Replace an account's password
    pub fn reset_password(&self, username: &str, new_password: &str) -> Result<Account> {
        self.update(username, AccountUpdate::password(new_password))
    }

    /// Set one preference
    pub fn set_preference(&self, username: &str, key: &str, value: &str) -> Result<Account> {
        self.update(username, AccountUpdate::set_preference(key, value))
    }

    /// Remove one preference
    pub fn remove_preference(&self, username: &str, key: &str) -> Result<Account> {
        self.update(username, AccountUpdate::remove_preference(key))
    }

    /// Delete an account
    pub fn delete(&self, username: &str) -> Result<()> {
        self.mutate(|accounts| {
            accounts
                .remove(username)
                .map(|_| ())
                .ok_or_else(|| Error::NotFound(username.to_string()))
        })?;

        info!(username, "Deleted account");
        Ok(())
    }

    /// Snapshot of all accounts, in username order
    pub fn list(&self) -> AccountSnapshot {
        AccountSnapshot {
            accounts: self.lock().values().cloned().collect(),
        }
    }

    /// Check a username and password
    ///
    /// Unknown usernames are verified against a dummy hash, so the result
    /// and its cost do not reveal whether the account exists.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let stored = self.lock().get(username).map(|a| a.password_hash.clone());
        let known = stored.is_some();
        let hash = stored.unwrap_or_else(|| self.dummy_hash.clone());

        match self.policy.verify(password, &hash) {
            Ok(matched) => matched && known,
            Err(e) => {
                warn!(username, error = %e, "Stored password hash is unreadable");
                false
            }
        }
    }

    /// Registrations per month
    pub fn growth(&self) -> Vec<MonthlyCount> {
        monthly_registrations(&self.list())
    }

    /// Write every account to `writer` in the storage format
    pub fn export<W: Write>(&self, writer: W) -> Result<usize> {
        let snapshot = self.list();
        write_accounts(writer, &snapshot)?;
        debug!(accounts = snapshot.len(), "Exported accounts");
        Ok(snapshot.len())
    }

    /// Export to a file, atomically replacing any existing file
    pub fn export_to_path(&self, path: &Path) -> Result<usize> {
        let snapshot = self.list();
        write_atomically(path, snapshot.iter())?;
        info!(path = %path.display(), accounts = snapshot.len(), "Exported accounts");
        Ok(snapshot.len())
    }

    /// Merge accounts from CSV into the store
    ///
    /// The input is parsed completely before anything changes; a malformed
    /// input leaves the store untouched. New usernames are added, existing
    /// ones are kept and reported as skipped. The file is written once.
    pub fn import<R: Read>(&self, reader: R) -> Result<ImportReport> {
        let incoming = read_accounts(reader)?;

        let report = self.mutate(|accounts| {
            let mut report = ImportReport::default();
            for account in incoming {
                if accounts.contains_key(&account.username) {
                    report.skipped.push(account.username);
                    continue;
                }
                report.imported.push(account.username.clone());
                accounts.insert(account.username.clone(), account);
            }
            Ok(report)
        })?;

        if report.has_conflicts() {
            warn!(
                skipped = report.skipped.len(),
                usernames = ?report.skipped,
                "Import skipped existing usernames"
            );
        }
        info!(imported = report.imported.len(), "Imported accounts");
        Ok(report)
    }

    pub fn import_from_path(&self, path: &Path) -> Result<ImportReport> {
        let file = File::open(path)?;
        self.import(BufReader::new(file))
    }

    /// Run a mutation against a copy of the accounts, persist the copy and
    /// only then make it current. The lock is held throughout.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Account>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        write_atomically(&self.path, next.values())?;
        *guard = next;
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Account>> {
        // State is only swapped after a successful write, so a poisoned
        // lock still guards consistent data.
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `<path><suffix>` next to `path`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("accounts"));
    name.push(suffix);
    path.with_file_name(name)
}

/// First unused `<path>.corrupt`, `<path>.corrupt.1`, ... so earlier
/// quarantined files are never overwritten
fn quarantine_path(path: &Path) -> PathBuf {
    let first = sibling(path, ".corrupt");
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| sibling(path, &format!(".corrupt.{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

fn load_accounts(path: &Path) -> Result<BTreeMap<String, Account>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No data file yet - starting empty");
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(e.into()),
    };

    let loaded = match read_accounts(bytes.as_slice()) {
        Ok(loaded) => loaded,
        Err(e) => {
            let quarantine = quarantine_path(path);
            warn!(
                path = %path.display(),
                moved_to = %quarantine.display(),
                error = %e,
                "Data file is malformed - starting with an empty store"
            );
            fs::rename(path, &quarantine)?;
            return Ok(BTreeMap::new());
        }
    };

    for username in record::duplicate_usernames(&loaded) {
        warn!(username, "Duplicate username in data file - keeping the first row");
    }

    let mut accounts = BTreeMap::new();
    for account in loaded {
        accounts.entry(account.username.clone()).or_insert(account);
    }
    Ok(accounts)
}

fn write_atomically<'a, I>(path: &Path, accounts: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Account>,
{
    let temp_path = sibling(path, ".tmp");
    let result = write_and_rename(path, &temp_path, accounts);
    if let Err(e) = &result {
        warn!(path = %path.display(), error = %e, "Failed to persist accounts");
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_and_rename<'a, I>(path: &Path, temp_path: &Path, accounts: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Account>,
{
    let mut writer = BufWriter::new(File::create(temp_path)?);
    write_accounts(&mut writer, accounts)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);

    // Set restrictive permissions (Unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(temp_path, path)?;
    Ok(())
}
