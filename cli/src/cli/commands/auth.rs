//! Authentication command handlers.

use std::io::BufRead;
use std::time::Duration;

use reqwest::Client;

use crate::auth::{
    open_browser, poll_for_token, start_device_flow, Credential, CredentialStore,
    HttpTokenEndpoint, TokenRefresher,
};
use crate::config::settings::env;
use crate::config::{credentials_path, AuthConfig, HttpConfig};
use crate::error::{AuthError, Result};

fn http_client(http: &HttpConfig) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(http.user_agent.as_str())
        .timeout(Duration::from_secs(http.timeout_secs))
        .build()?)
}

fn open_store(config: &AuthConfig) -> Result<CredentialStore> {
    Ok(CredentialStore::new(credentials_path(config)?))
}

/// Handle the `campus-auth auth login` command.
pub async fn handle_login(config: &AuthConfig, account: &str, no_browser: bool) -> Result<()> {
    let endpoint = HttpTokenEndpoint::new(http_client(&config.http)?, &config.oauth)?;
    let store = open_store(config)?;

    // Step 1: Start device flow
    let session = start_device_flow(&endpoint).await?;

    // Step 2: Display instructions
    if let Some(message) = &session.message {
        eprintln!("{message}");
    } else {
        eprintln!("To authenticate {account}, please visit:");
        eprintln!();
        eprintln!("  {}", session.verification_uri);
        eprintln!();
        eprintln!("And enter code: {}", session.user_code);
    }
    eprintln!();

    // Step 3: Open browser (unless disabled)
    if !no_browser {
        if open_browser(&session) {
            eprintln!("Browser opened automatically.");
        } else {
            eprintln!("Could not open browser. Please visit the URL manually.");
        }
        eprintln!();
    }

    // Step 4: Poll for token
    eprintln!("Waiting for authorization...");
    let tokens = poll_for_token(&endpoint, &session, tokio::time::sleep).await?;

    // Step 5: Store credentials
    store.save(account, &Credential::OAuth2(tokens))?;

    eprintln!("Successfully logged in as {account}.");
    Ok(())
}

/// Handle the `campus-auth auth password` command.
pub fn handle_password(config: &AuthConfig, account: &str) -> Result<()> {
    let password = match std::env::var(env::PASSWORD) {
        Ok(password) if !password.is_empty() => password,
        _ => read_password_line(std::io::stdin().lock())?,
    };

    open_store(config)?.save(account, &Credential::Basic { password })?;
    eprintln!("Password stored for {account}.");
    Ok(())
}

fn read_password_line(mut input: impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();

    if password.is_empty() {
        return Err(AuthError::CredentialStorage(
            "no password given on stdin".to_string(),
        ));
    }
    Ok(password)
}

/// Handle the `campus-auth auth token` command.
///
/// Prints the access token alone on stdout.
pub async fn handle_token(config: &AuthConfig, account: &str) -> Result<()> {
    let endpoint = HttpTokenEndpoint::new(http_client(&config.http)?, &config.oauth)?;
    let store = open_store(config)?;

    let token = TokenRefresher::new(&endpoint, &store)
        .access_token_for(account)
        .await
        .ok_or_else(|| AuthError::NotAuthenticated {
            account: account.to_string(),
        })?;

    println!("{token}");
    Ok(())
}

/// Handle the `campus-auth auth status` command.
pub fn handle_status(config: &AuthConfig, account: Option<&str>) -> Result<()> {
    let store = open_store(config)?;
    let accounts = match account {
        Some(account) => vec![account.to_string()],
        None => store.accounts(),
    };

    if accounts.is_empty() {
        println!("No stored credentials in {}", store.path().display());
        println!();
        println!("Run 'campus-auth auth login --account <email>' to authenticate.");
        return Ok(());
    }

    for account in &accounts {
        match store.load(account) {
            Some(credential) => println!("{}", describe(account, &credential)),
            None => println!("{account}: not logged in"),
        }
    }

    Ok(())
}

fn describe(account: &str, credential: &Credential) -> String {
    match credential {
        Credential::Basic { .. } => format!("{account}: {} (password stored)", credential.kind()),
        Credential::OAuth2(tokens) => {
            let state = match (tokens.is_expired(), tokens.can_refresh()) {
                (false, _) => "valid",
                (true, true) => "expired, refreshable",
                (true, false) => "expired",
            };
            format!(
                "{account}: {} ({state}, expires {})",
                credential.kind(),
                tokens.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            )
        }
    }
}

/// Handle the `campus-auth auth logout` command.
pub fn handle_logout(config: &AuthConfig, account: &str) -> Result<()> {
    let store = open_store(config)?;

    if store.load(account).is_some() {
        store.clear(account)?;
        println!("Logged out {account}.");
    } else {
        println!("No credential stored for {account}.");
    }

    Ok(())
}
