//! Property-based tests for the account store using proptest
//!
//! Every case hashes passwords, so the case counts are kept low.

use chrono::NaiveDate;
use proptest::prelude::*;
use rollcall_core::{Gender, NewAccount, PasswordPolicy, Profile, UserType};
use rollcall_registry::AccountStore;
use tempfile::tempdir;

// ============================================
// Strategies
// ============================================

fn arb_username() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.]{0,15}"
}

/// Non-blank text that may contain CSV-hostile characters
fn arb_text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 ,\"'./#-]{0,30}"
}

fn arb_user_type() -> impl Strategy<Value = UserType> {
    prop_oneof![
        Just(UserType::Retailer),
        Just(UserType::Wholesaler),
        Just(UserType::Distributor),
    ]
}

fn arb_gender() -> impl Strategy<Value = Gender> {
    prop_oneof![Just(Gender::Male), Just(Gender::Female), Just(Gender::Other)]
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1940i32..2010, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_profile() -> impl Strategy<Value = Profile> {
    (
        (arb_user_type(), arb_text(), arb_text(), arb_date(), arb_gender()),
        (arb_text(), arb_text(), arb_text(), arb_text()),
        (arb_text(), arb_text(), arb_text(), arb_text()),
    )
        .prop_map(
            |(
                (user_type, first_name, last_name, date_of_birth, gender),
                (email, phone_number, address, city),
                (state, postal_code, aadhaar_number, pan_number),
            )| Profile {
                user_type,
                first_name,
                last_name,
                date_of_birth,
                gender,
                email,
                phone_number,
                address,
                city,
                state,
                postal_code,
                aadhaar_number,
                pan_number,
            },
        )
}

fn open_store(dir: &tempfile::TempDir, name: &str) -> AccountStore {
    AccountStore::open_at(dir.path().join(name), PasswordPolicy::testing()).unwrap()
}

// ============================================
// Store Properties
// ============================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// A created account reads back with its profile unchanged, before and
    /// after a reload from disk
    #[test]
    fn create_then_get_preserves_profile(
        username in arb_username(),
        profile in arb_profile(),
    ) {
        let dir = tempdir().unwrap();
        let store = open_store(&dir, "accounts.csv");

        store
            .create(NewAccount::new(username.clone(), "long enough", profile.clone()))
            .unwrap();

        prop_assert_eq!(&store.get(&username).unwrap().profile, &profile);

        let reopened = open_store(&dir, "accounts.csv");
        prop_assert_eq!(&reopened.get(&username).unwrap().profile, &profile);
    }

    /// Export followed by import into an empty store gives the same set
    #[test]
    fn export_import_reproduces_account_set(
        accounts in prop::collection::btree_map(arb_username(), arb_profile(), 1..4),
        prefs in prop::collection::btree_map("[a-z]{1,8}", arb_text(), 0..3),
    ) {
        let dir = tempdir().unwrap();
        let source = open_store(&dir, "source.csv");

        for (username, profile) in &accounts {
            source
                .create(NewAccount::new(username.clone(), "long enough", profile.clone()))
                .unwrap();
        }
        let first = accounts.keys().next().unwrap();
        for (key, value) in &prefs {
            source.set_preference(first, key, value).unwrap();
        }

        let mut exported = Vec::new();
        source.export(&mut exported).unwrap();

        let target = open_store(&dir, "target.csv");
        let report = target.import(exported.as_slice()).unwrap();

        prop_assert_eq!(report.imported.len(), accounts.len());
        prop_assert!(!report.has_conflicts());
        prop_assert_eq!(target.list(), source.list());
    }

    /// A second registration under an existing name never changes the store
    #[test]
    fn duplicate_create_is_rejected(
        username in arb_username(),
        first in arb_profile(),
        second in arb_profile(),
    ) {
        let dir = tempdir().unwrap();
        let store = open_store(&dir, "accounts.csv");

        let original = store
            .create(NewAccount::new(username.clone(), "long enough", first))
            .unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let result = store.create(NewAccount::new(username.clone(), "other password", second));
        prop_assert!(
            matches!(result, Err(rollcall_core::Error::DuplicateUsername(_))),
            "expected DuplicateUsername"
        );
        prop_assert_eq!(store.get(&username).unwrap(), original);
        prop_assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }
}
