use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::audio::OpenAiTranscriber;
use crate::auth::{self, AuthError, ConfigAuthenticator};
use crate::core::app::App;
use crate::core::backends::HttpBackendFactory;
use crate::core::chat::ChatService;
use crate::core::config::{Config, ConfigError};
use crate::core::dispatcher::BackendDispatcher;
use crate::core::error::{ChatError, HistoryError, SettingsError};
use crate::core::keyring::KeyringStore;
use crate::core::models::{Endpoint, ModelCatalog};
use crate::core::providers::CredentialSource;
use crate::core::session::{Session, TimestampKeys};
use crate::documents::{DocumentStore, InMemoryDocumentStore};
use crate::history::DbManager;
use crate::utils::logging::{TranscriptError, TranscriptLog};

/// Startup choices from the command line.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub log: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub user: Option<String>,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

/// Session for this process with config defaults and command-line overrides
/// applied.
pub fn initial_session(
    config: &Config,
    catalog: &ModelCatalog,
    endpoint: Option<&str>,
    model: Option<&str>,
) -> Result<Session, SettingsError> {
    let mut session = Session::with_catalog(&config.session, catalog);

    if let Some(endpoint) = endpoint {
        let endpoint: Endpoint = endpoint.parse()?;
        session.set_endpoint(endpoint, catalog);
    }
    if let Some(model) = model {
        session.set_model(model, catalog)?;
    }
    Ok(session)
}

/// Chat service over the real HTTP backends and the on-disk history store.
pub fn build_service(
    config: &Config,
    credentials: Arc<dyn CredentialSource>,
    documents: Arc<dyn DocumentStore>,
) -> Result<ChatService, StartupError> {
    let factory = HttpBackendFactory::new(config.clone(), credentials)?;
    let dispatcher =
        BackendDispatcher::new(Arc::new(factory), ModelCatalog::load(config)).with_documents(documents);
    let db = DbManager::open_default()?;
    Ok(ChatService::new(dispatcher, db, Arc::new(TimestampKeys::new())))
}

pub fn bootstrap_app(options: ChatOptions) -> Result<App, StartupError> {
    let config = Config::load(options.config.as_deref())?;
    let catalog = ModelCatalog::load(&config);
    let session = initial_session(
        &config,
        &catalog,
        options.endpoint.as_deref(),
        options.model.as_deref(),
    )?;

    let credentials: Arc<dyn CredentialSource> = Arc::new(KeyringStore::new());
    let documents: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
    let service = build_service(&config, credentials.clone(), documents.clone())?;

    let mut transcript = TranscriptLog::default();
    if let Some(path) = options.log {
        transcript.set_log_file(path)?;
    }

    let authenticator = Arc::new(ConfigAuthenticator::from_config(&config));
    let transcriber = OpenAiTranscriber::from_config(&config, credentials);

    let mut app = App::new(config, session, service, documents, authenticator)
        .with_transcript(transcript);
    match transcriber {
        Ok(transcriber) => app = app.with_transcriber(Arc::new(transcriber)),
        Err(err) => warn!(error = %err, "audio transcription disabled"),
    }

    if let Some(user) = options.user {
        auth::login(&mut app.session, app.authenticator.as_ref(), &user)?;
    }

    info!(
        endpoint = %app.session.endpoint_to_use,
        model = %app.session.model_to_use,
        "chat session ready"
    );
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SessionDefaults;
    use crate::utils::test_utils::test_catalog;

    #[test]
    fn initial_session_applies_overrides() {
        let config = Config::default();
        let catalog = test_catalog();

        let session = initial_session(&config, &catalog, Some("openai"), Some("gpt-4")).unwrap();
        assert_eq!(session.endpoint_to_use, "openai");
        assert_eq!(session.model_to_use, "gpt-4");
        assert_eq!(session.model_options, catalog.openai);

        let defaults = initial_session(&config, &catalog, None, None).unwrap();
        assert_eq!(defaults, {
            let mut s = Session::new(&SessionDefaults::default());
            s.model_options = catalog.gemini.clone();
            s
        });
    }

    #[test]
    fn initial_session_rejects_unknown_choices() {
        let config = Config::default();
        let catalog = test_catalog();
        assert!(matches!(
            initial_session(&config, &catalog, Some("claude"), None),
            Err(SettingsError::UnknownEndpoint(_))
        ));
        assert!(matches!(
            initial_session(&config, &catalog, None, Some("gpt-4")),
            Err(SettingsError::UnknownModel { .. })
        ));
    }
}
