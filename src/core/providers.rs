use thiserror::Error;
use tracing::warn;

use crate::core::keyring::KeyringAccessError;
use crate::core::models::Endpoint;

const QUICK_FIXES: &[&str] = &[
    "mmchat auth openai              # Store a token in the system keyring",
    "export OPENAI_API_KEY=sk-...    # Use environment variable",
    "export GEMINI_API_KEY=...       # Gemini key (GOOGLE_API_KEY also works)",
];

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No API key configured for {endpoint}. Set {} or run 'mmchat auth {endpoint}'.", env_vars(*endpoint).join(" or "))]
    Missing { endpoint: Endpoint },

    #[error("Unable to read stored credentials for {endpoint}: {source}")]
    Keyring {
        endpoint: Endpoint,
        source: KeyringAccessError,
    },
}

impl CredentialError {
    pub fn quick_fixes(&self) -> &'static [&'static str] {
        QUICK_FIXES
    }
}

/// Where stored API tokens come from.
pub trait CredentialSource: Send + Sync {
    fn get_token(&self, endpoint: Endpoint) -> Result<Option<String>, KeyringAccessError>;
}

/// Environment variables consulted for an endpoint, in priority order.
pub fn env_vars(endpoint: Endpoint) -> &'static [&'static str] {
    match endpoint {
        Endpoint::OpenAi => &["OPENAI_API_KEY"],
        Endpoint::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
    }
}

pub fn resolve_api_key<S: CredentialSource + ?Sized>(
    source: &S,
    endpoint: Endpoint,
) -> Result<String, CredentialError> {
    resolve_api_key_with(source, endpoint, |name| std::env::var(name).ok())
}

/// Stored token first, then the environment. A keyring outage falls back to
/// the environment; any other keyring failure is returned.
pub fn resolve_api_key_with<S, F>(
    source: &S,
    endpoint: Endpoint,
    env: F,
) -> Result<String, CredentialError>
where
    S: CredentialSource + ?Sized,
    F: Fn(&str) -> Option<String>,
{
    match source.get_token(endpoint) {
        Ok(Some(token)) if !token.is_empty() => return Ok(token),
        Ok(_) => {}
        Err(err) if err.is_recoverable() => {
            warn!(
                %endpoint,
                error = %err,
                "unable to access stored credentials; falling back to environment variables"
            );
        }
        Err(source) => return Err(CredentialError::Keyring { endpoint, source }),
    }

    env_vars(endpoint)
        .iter()
        .find_map(|name| env(name).filter(|value| !value.is_empty()))
        .ok_or(CredentialError::Missing { endpoint })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StaticSource(Option<&'static str>);

    impl CredentialSource for StaticSource {
        fn get_token(&self, _endpoint: Endpoint) -> Result<Option<String>, KeyringAccessError> {
            Ok(self.0.map(str::to_string))
        }
    }

    struct OutageSource;

    impl CredentialSource for OutageSource {
        fn get_token(&self, _endpoint: Endpoint) -> Result<Option<String>, KeyringAccessError> {
            let backend_error = std::io::Error::other("mock backend unavailable");
            Err(keyring::Error::NoStorageAccess(Box::new(backend_error)).into())
        }
    }

    struct PermanentFailureSource;

    impl CredentialSource for PermanentFailureSource {
        fn get_token(&self, _endpoint: Endpoint) -> Result<Option<String>, KeyringAccessError> {
            Err(keyring::Error::BadEncoding(Vec::new()).into())
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn stored_token_wins_over_environment() {
        let key = resolve_api_key_with(
            &StaticSource(Some("sk-stored")),
            Endpoint::OpenAi,
            env(&[("OPENAI_API_KEY", "sk-env")]),
        )
        .unwrap();
        assert_eq!(key, "sk-stored");
    }

    #[test]
    fn gemini_falls_back_to_google_api_key() {
        let key = resolve_api_key_with(
            &StaticSource(None),
            Endpoint::Gemini,
            env(&[("GOOGLE_API_KEY", "g-env")]),
        )
        .unwrap();
        assert_eq!(key, "g-env");
    }

    #[test]
    fn recoverable_keyring_failure_uses_env_credentials() {
        let key = resolve_api_key_with(
            &OutageSource,
            Endpoint::OpenAi,
            env(&[("OPENAI_API_KEY", "sk-env")]),
        )
        .unwrap();
        assert_eq!(key, "sk-env");
    }

    #[test]
    fn permanent_keyring_failure_is_propagated() {
        let err = resolve_api_key_with(
            &PermanentFailureSource,
            Endpoint::OpenAi,
            env(&[("OPENAI_API_KEY", "sk-env")]),
        )
        .unwrap_err();
        assert!(matches!(err, CredentialError::Keyring { .. }));
    }

    #[test]
    fn missing_credentials_name_the_variables() {
        let err = resolve_api_key_with(&StaticSource(None), Endpoint::Gemini, env(&[])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No API key configured for gemini. Set GEMINI_API_KEY or GOOGLE_API_KEY or run 'mmchat auth gemini'."
        );
        assert!(!err.quick_fixes().is_empty());
    }
}
