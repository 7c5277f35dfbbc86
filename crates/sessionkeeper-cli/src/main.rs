//! sessionkeeper - keeps an API login session fresh from the command line.
//!
//! `login` authenticates and stores the password in the OS keychain and the
//! session in an encrypted vault. `token` prints a bearer token, logging in
//! again only when the stored session has gone stale.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sessionkeeper_core::utils::{format_remaining, format_timestamp, mask_token};
use sessionkeeper_core::{
    Config, CredentialStore, Credentials, HolderState, HttpAuthenticator, SessionHolder,
    SessionRecord, SessionVault, TokenSession,
};

// ============================================================================
// Constants
// ============================================================================

/// Directory for an additional log file, off unless set
const ENV_LOG_DIR: &str = "SESSIONKEEPER_LOG_DIR";

/// Vault passphrase; the account password is used when unset
const ENV_VAULT_PASSPHRASE: &str = "SESSIONKEEPER_VAULT_PASSPHRASE";

const LOG_FILE_NAME: &str = "sessionkeeper.log";

const USAGE: &str = "\
Usage: sessionkeeper <command>

Commands:
  login    Authenticate and remember the session
  token    Print a valid access token, logging in again if needed
  status   Show the stored session and time left
  logout   Forget the stored session and password
  help     Show this message

Environment:
  SESSIONKEEPER_AUTH_URL           Token endpoint (overrides config)
  SESSIONKEEPER_USERNAME           Username (overrides config)
  SESSIONKEEPER_VAULT_PASSPHRASE   Vault passphrase (defaults to the password)
  SESSIONKEEPER_LOG_DIR            Also write logs to this directory
  RUST_LOG                         Log filter, e.g. debug";

type Holder = SessionHolder<HttpAuthenticator>;

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    let mut config = Config::load()?;
    config.apply_env();

    match command {
        "login" => login(&mut config).await,
        "token" => token(&config).await,
        "status" => status(&config),
        "logout" => logout(&config),
        "help" | "-h" | "--help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", other)
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn login(config: &mut Config) -> Result<()> {
    println!("\n=== sessionkeeper login ===\n");

    let username = match config.last_username.clone() {
        Some(last_user) => {
            let input = prompt(&format!("Username [{}]: ", last_user))?;
            if input.is_empty() {
                last_user
            } else {
                input
            }
        }
        None => prompt_username()?,
    };

    let password = if CredentialStore::has_credentials(&username) {
        let input = prompt("Use stored password? [Y/n]: ")?;
        if input.to_lowercase() != "n" {
            CredentialStore::get_password(&username)?
        } else {
            prompt_password()?
        }
    } else {
        prompt_password()?
    };

    let credentials = Credentials::new(username.clone(), password);
    let mut holder = build_holder(config, credentials)?;

    println!("\nAuthenticating...");
    holder.login().await?;

    if let Err(e) = CredentialStore::store(holder.credentials()) {
        warn!(error = %e, "Failed to store credentials in keychain");
    }

    config.last_username = Some(username);
    config.save()?;

    save_session(config, &holder)?;
    info!("Login complete");
    println!("Login successful!\n");
    Ok(())
}

async fn token(config: &Config) -> Result<()> {
    let username = require_username(config)?;
    let credentials = match CredentialStore::load(&username) {
        Ok(credentials) => credentials,
        Err(e) => {
            warn!(error = %e, "No stored password, prompting");
            Credentials::new(username, prompt_password()?)
        }
    };

    let mut holder = build_holder(config, credentials)?;
    restore_session(config, &mut holder);

    let session = holder.get_session().await?;
    save_session(config, &holder)?;

    println!("{}", session.access_token);
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let Some(username) = config.last_username.clone() else {
        println!("Not logged in.");
        return Ok(());
    };
    let credentials = match CredentialStore::load(&username) {
        Ok(credentials) => credentials,
        Err(_) => {
            println!("Not logged in ({} has no stored password).", username);
            return Ok(());
        }
    };

    let mut holder = build_holder(config, credentials)?;
    restore_session(config, &mut holder);

    println!("User:         {}", username);
    println!("Endpoint:     {}", config.auth_url.as_deref().unwrap_or("(not set)"));
    match holder.state() {
        HolderState::Uninitialized => println!("Session:      none"),
        HolderState::Active => {
            if let Some(record) = holder.snapshot() {
                print_record(&record);
            }
            let remaining = holder.time_until_expiry().unwrap_or_else(chrono::Duration::zero);
            println!("Refresh in:   {}", format_remaining(remaining));
        }
    }
    Ok(())
}

fn logout(config: &Config) -> Result<()> {
    SessionVault::new(config.vault_path()?).clear()?;

    if let Some(ref username) = config.last_username {
        if CredentialStore::has_credentials(username) {
            CredentialStore::delete(username)?;
        }
    }

    println!("Logged out.");
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn build_holder(config: &Config, credentials: Credentials) -> Result<Holder> {
    let auth_url = config
        .auth_url
        .clone()
        .context("No token endpoint configured (set auth_url or SESSIONKEEPER_AUTH_URL)")?;
    let authenticator = HttpAuthenticator::new(auth_url, config.request_timeout())?;
    Ok(SessionHolder::new(credentials, authenticator, config.policy()?))
}

fn vault_passphrase(credentials: &Credentials) -> String {
    std::env::var(ENV_VAULT_PASSPHRASE)
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| credentials.secret().to_string())
}

/// Seed the holder from the vault. A vault that cannot be read is not fatal:
/// the holder simply logs in again.
fn restore_session(config: &Config, holder: &mut Holder) {
    let path = match config.vault_path() {
        Ok(path) => path,
        Err(e) => {
            warn!(error = %e, "No vault location");
            return;
        }
    };
    let passphrase = vault_passphrase(holder.credentials());
    match SessionVault::new(path).load::<TokenSession>(&passphrase) {
        Ok(Some(record)) if record.session.identifier == holder.credentials().identifier() => {
            holder.restore(record);
        }
        Ok(Some(_)) => warn!("Stored session belongs to another user, ignoring"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to load session vault"),
    }
}

fn save_session(config: &Config, holder: &Holder) -> Result<()> {
    if let Some(record) = holder.snapshot() {
        let passphrase = vault_passphrase(holder.credentials());
        SessionVault::new(config.vault_path()?).save(&record, &passphrase)?;
    }
    Ok(())
}

fn print_record(record: &SessionRecord<TokenSession>) {
    println!("Token:        {}", mask_token(&record.session.access_token));
    println!("Logged in:    {}", format_timestamp(record.established_at));
    println!("Last used:    {}", format_timestamp(record.last_active));
    if let Some(at) = record.session.expires_at() {
        println!("Server says:  valid until {}", format_timestamp(at));
    }
}

fn require_username(config: &Config) -> Result<String> {
    config
        .last_username
        .clone()
        .context("No user configured - run `sessionkeeper login` first")
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_username() -> Result<String> {
    let username = prompt("Username: ")?;
    if username.is_empty() {
        bail!("Username cannot be empty");
    }
    Ok(username)
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}
