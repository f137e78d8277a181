//! Rollcall - account registration and management CLI

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall_core::{Account, Gender, NewAccount, Profile, ProfileUpdate, UserType};
use rollcall_registry::{AccountStore, RegistryConfig, Session};

/// Rollcall - user registration backed by a CSV file
#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Register and manage user accounts stored in a CSV file")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the account data file (overrides the config)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new account
    Register {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Show one account
    Show {
        username: String,
    },

    /// List all accounts
    List,

    /// Log in and print the profile
    ///
    /// Each invocation uses a fresh session, so failed logins are not
    /// counted across runs and the lockout never triggers from the CLI.
    Login {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,
    },

    /// Log in and change profile fields
    Edit {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,

        #[command(flatten)]
        changes: ProfileChangeArgs,
    },

    /// Set a new password for an account
    ResetPassword {
        #[arg(long)]
        username: String,

        #[arg(long)]
        new_password: String,
    },

    /// Log in and set (or remove) a preference
    SetPref {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        key: String,

        /// Value to store; omit together with --remove to delete the key
        #[arg(long, required_unless_present = "remove")]
        value: Option<String>,

        #[arg(long, conflicts_with = "value")]
        remove: bool,
    },

    /// Log in and delete the account
    Delete {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,
    },

    /// Export all accounts as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Import accounts from a CSV file; existing usernames are skipped
    Import {
        #[arg(long)]
        input: PathBuf,
    },

    /// Registrations per month
    Growth,
}

/// Profile fields for registration
#[derive(Args)]
struct ProfileArgs {
    /// Retailer, Wholesaler or Distributor
    #[arg(long, default_value = "Retailer")]
    user_type: UserType,

    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,

    /// YYYY-MM-DD
    #[arg(long)]
    date_of_birth: NaiveDate,

    /// Male, Female or Other
    #[arg(long, default_value = "Other")]
    gender: Gender,

    #[arg(long)]
    email: String,

    #[arg(long)]
    phone_number: String,

    #[arg(long)]
    address: String,

    #[arg(long)]
    city: String,

    #[arg(long)]
    state: String,

    #[arg(long)]
    postal_code: String,

    #[arg(long)]
    aadhaar_number: String,

    #[arg(long)]
    pan_number: String,
}

impl From<ProfileArgs> for Profile {
    fn from(args: ProfileArgs) -> Self {
        Profile {
            user_type: args.user_type,
            first_name: args.first_name,
            last_name: args.last_name,
            date_of_birth: args.date_of_birth,
            gender: args.gender,
            email: args.email,
            phone_number: args.phone_number,
            address: args.address,
            city: args.city,
            state: args.state,
            postal_code: args.postal_code,
            aadhaar_number: args.aadhaar_number,
            pan_number: args.pan_number,
        }
    }
}

/// Profile fields to change; omitted flags are left as they are
#[derive(Args)]
struct ProfileChangeArgs {
    #[arg(long)]
    user_type: Option<UserType>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    date_of_birth: Option<NaiveDate>,
    #[arg(long)]
    gender: Option<Gender>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone_number: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    postal_code: Option<String>,
    #[arg(long)]
    aadhaar_number: Option<String>,
    #[arg(long)]
    pan_number: Option<String>,
}

impl From<ProfileChangeArgs> for ProfileUpdate {
    fn from(args: ProfileChangeArgs) -> Self {
        ProfileUpdate {
            user_type: args.user_type,
            first_name: args.first_name,
            last_name: args.last_name,
            date_of_birth: args.date_of_birth,
            gender: args.gender,
            email: args.email,
            phone_number: args.phone_number,
            address: args.address,
            city: args.city,
            state: args.state,
            postal_code: args.postal_code,
            aadhaar_number: args.aadhaar_number,
            pan_number: args.pan_number,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall=info,rollcall_registry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RegistryConfig::load(path)?,
        None => RegistryConfig::load_default()?,
    };
    if let Some(data_file) = cli.data_file.clone() {
        config.storage.data_file = data_file;
    }

    let store = AccountStore::open(&config)
        .with_context(|| format!("opening {}", config.storage.data_file.display()))?;
    let json = cli.json;

    match cli.command {
        Commands::Register {
            username,
            password,
            profile,
        } => {
            let account = store.create(NewAccount::new(username, password, profile.into()))?;
            if json {
                print_json(&account)?;
            } else {
                println!(
                    "Registered {} on {}",
                    account.username, account.registered_on
                );
            }
        }

        Commands::Show { username } => {
            let account = store.get(&username)?;
            if json {
                print_json(&account)?;
            } else {
                print_account(&account);
            }
        }

        Commands::List => {
            let snapshot = store.list();
            if json {
                print_json(&snapshot.iter().collect::<Vec<_>>())?;
            } else if snapshot.is_empty() {
                println!("No accounts registered");
            } else {
                for account in &snapshot {
                    println!(
                        "{:<20} {:<12} {:<30} {}",
                        account.username,
                        account.profile.user_type.as_str(),
                        account.profile.email,
                        account.registered_on
                    );
                }
            }
        }

        Commands::Login { username, password } => {
            let mut session = login(&config, &store, &username, &password)?;
            let account = session.profile(&store)?;
            if json {
                print_json(&account)?;
            } else {
                println!("Welcome, {}!", account.profile.full_name());
                print_account(&account);
            }
        }

        Commands::Edit {
            username,
            password,
            changes,
        } => {
            let update = ProfileUpdate::from(changes);
            if update.is_empty() {
                anyhow::bail!("nothing to change");
            }
            let mut session = login(&config, &store, &username, &password)?;
            let account = session.update_profile(&store, update)?;
            if json {
                print_json(&account)?;
            } else {
                println!("Profile updated");
                print_account(&account);
            }
        }

        Commands::ResetPassword {
            username,
            new_password,
        } => {
            store.reset_password(&username, &new_password)?;
            println!("Password updated for {}", username);
        }

        Commands::SetPref {
            username,
            password,
            key,
            value,
            remove,
        } => {
            let mut session = login(&config, &store, &username, &password)?;
            let account = match value {
                Some(value) if !remove => session.set_preference(&store, &key, &value)?,
                _ => session.remove_preference(&store, &key)?,
            };
            if json {
                print_json(&account.preferences)?;
            } else {
                for (key, value) in &account.preferences {
                    println!("{} = {}", key, value);
                }
            }
        }

        Commands::Delete { username, password } => {
            let mut session = login(&config, &store, &username, &password)?;
            session.delete_account(&store)?;
            println!("Deleted {}", username);
        }

        Commands::Export { output } => match output {
            Some(path) => {
                let count = store.export_to_path(&path)?;
                info!(path = %path.display(), count, "Export written");
                if !json {
                    println!("Exported {} accounts to {}", count, path.display());
                }
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                store.export(&mut handle)?;
                handle.flush()?;
            }
        },

        Commands::Import { input } => {
            let report = store.import_from_path(&input)?;
            if json {
                print_json(&ImportSummary {
                    imported: &report.imported,
                    skipped: &report.skipped,
                })?;
            } else {
                println!("Imported {} accounts", report.imported.len());
                if report.has_conflicts() {
                    warn!("Some usernames already existed and were skipped");
                    println!("Skipped existing usernames: {}", report.skipped.join(", "));
                }
            }
        }

        Commands::Growth => {
            let series = store.growth();
            if json {
                print_json(&series)?;
            } else if series.is_empty() {
                println!("No registrations yet");
            } else {
                for point in &series {
                    println!("{}  {:>5}", point.month, point.count);
                }
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct ImportSummary<'a> {
    imported: &'a [String],
    skipped: &'a [String],
}

/// Authenticate through a fresh session. Nothing carries the failure
/// count between invocations, so the CLI is not throttled.
fn login(
    config: &RegistryConfig,
    store: &AccountStore,
    username: &str,
    password: &str,
) -> anyhow::Result<Session> {
    let mut session = config.new_session();
    session.authenticate(store, username, password)?;
    Ok(session)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_account(account: &Account) {
    let p = &account.profile;
    println!("Username:          {}", account.username);
    println!("User type:         {}", p.user_type);
    println!("Name:              {}", p.full_name());
    println!("Date of birth:     {}", p.date_of_birth);
    println!("Gender:            {}", p.gender);
    println!("Email:             {}", p.email);
    println!("Phone number:      {}", p.phone_number);
    println!("Address:           {}", p.address);
    println!("City:              {}", p.city);
    println!("State:             {}", p.state);
    println!("Postal code:       {}", p.postal_code);
    println!("Aadhaar number:    {}", p.aadhaar_number);
    println!("PAN number:        {}", p.pan_number);
    println!("Registered on:     {}", account.registered_on);
    if !account.preferences.is_empty() {
        println!("Preferences:");
        for (key, value) in &account.preferences {
            println!("  {} = {}", key, value);
        }
    }
}
