//! User login for the chat loop and API token management for the backends.

use tracing::info;

use crate::core::config::Config;
use crate::core::keyring::{KeyringAccessError, KeyringStore};
use crate::core::models::Endpoint;
use crate::core::session::Session;

pub mod ui;

use self::ui::{prompt_confirmation, prompt_token, ConfirmationChoice, UiError};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("username must not be empty")]
    EmptyUsername,

    #[error("user '{0}' is not allowed to log in")]
    NotAllowed(String),
}

/// Decides whether a username may start chatting.
pub trait Authenticator: Send + Sync {
    /// The canonical username on success.
    fn authenticate(&self, username: &str) -> Result<String, AuthError>;
}

/// Allowlist from the `users` config key. An empty list admits anyone with a
/// non-empty name.
#[derive(Debug, Clone, Default)]
pub struct ConfigAuthenticator {
    users: Vec<String>,
}

impl ConfigAuthenticator {
    pub fn new(users: Vec<String>) -> Self {
        Self { users }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.users.clone())
    }
}

impl Authenticator for ConfigAuthenticator {
    fn authenticate(&self, username: &str) -> Result<String, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        if self.users.is_empty() {
            return Ok(username.to_string());
        }
        self.users
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(username))
            .cloned()
            .ok_or_else(|| AuthError::NotAllowed(username.to_string()))
    }
}

/// Authenticate and mark the session as logged in.
pub fn login(
    session: &mut Session,
    authenticator: &dyn Authenticator,
    username: &str,
) -> Result<(), AuthError> {
    let username = authenticator.authenticate(username)?;
    info!(%username, "user logged in");
    session.logged_in = true;
    session.username = Some(username);
    Ok(())
}

pub fn logout(session: &mut Session) {
    if let Some(username) = session.username.take() {
        info!(%username, "user logged out");
    }
    session.logged_in = false;
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error(transparent)]
    Prompt(#[from] UiError),

    #[error("keyring access failed: {0}")]
    Keyring(#[from] KeyringAccessError),
}

/// Interactive `mmchat auth <endpoint>`: read a token and store it in the
/// system keyring.
pub fn store_endpoint_token(store: &KeyringStore, endpoint: Endpoint) -> Result<(), TokenError> {
    let token = prompt_token(endpoint.display_name())?;
    store.store_token(endpoint, &token)?;
    println!("✅ Token for {} saved to the system keyring.", endpoint.display_name());
    Ok(())
}

/// Interactive `mmchat deauth <endpoint>`.
pub fn remove_endpoint_token(store: &KeyringStore, endpoint: Endpoint) -> Result<(), TokenError> {
    let question = format!(
        "Remove the stored token for {}? (y/N): ",
        endpoint.display_name()
    );
    match prompt_confirmation(&question)? {
        ConfirmationChoice::Yes => {
            if store.delete_token(endpoint)? {
                println!("🗑️  Removed token for {}.", endpoint.display_name());
            } else {
                println!("No stored token for {}.", endpoint.display_name());
            }
        }
        ConfirmationChoice::No | ConfirmationChoice::Cancel => println!("Cancelled."),
    }
    Ok(())
}
