//! Per-session state.
//!
//! A [`Session`] is the explicit context object every handler receives. The
//! [`SessionStore`] keeps one per active user session and guarantees that a
//! session holds every default before anything reads it.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime, TimeDelta};
use tracing::debug;

use crate::core::backends::ResourceCache;
use crate::core::config::SessionDefaults;
use crate::core::error::SettingsError;
use crate::core::message::Message;
use crate::core::models::{update_model_options, Endpoint, ModelCatalog};
use crate::documents::ChunkingConfig;

/// Session key of a conversation that has not been assigned a real key yet.
pub const NEW_SESSION: &str = "new_session";

pub const MIN_RETRIEVED_DOCUMENTS: usize = 1;
pub const MAX_RETRIEVED_DOCUMENTS: usize = 10;

/// Source of fresh session keys (`get_timestamp`).
pub trait SessionKeySource: Send + Sync {
    fn next_key(&self) -> String;
}

/// Local-time keys with microsecond precision. Keys handed out by one
/// instance are strictly increasing, even when the clock does not advance
/// between calls.
#[derive(Default)]
pub struct TimestampKeys {
    last: Mutex<Option<NaiveDateTime>>,
}

impl TimestampKeys {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionKeySource for TimestampKeys {
    fn next_key(&self) -> String {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut now = Local::now().naive_local();
        if let Some(previous) = *last {
            if now <= previous {
                now = previous + TimeDelta::microseconds(1);
            }
        }
        *last = Some(now);
        now.format("%Y-%m-%d_%H-%M-%S-%6f").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub messages: Vec<Message>,
    pub endpoint_to_use: String,
    pub model_to_use: String,
    pub model_options: Vec<String>,
    pub pdf_chat: bool,
    pub retrieved_documents: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chat_memory_length: usize,
    pub logged_in: bool,
    pub username: Option<String>,
    pub session_key: String,
    pub new_session_key: Option<String>,
}

impl Session {
    pub fn new(defaults: &SessionDefaults) -> Self {
        Self {
            messages: Vec::new(),
            endpoint_to_use: defaults.endpoint.clone(),
            model_to_use: defaults.model.clone(),
            model_options: Vec::new(),
            pdf_chat: false,
            retrieved_documents: defaults.retrieved_documents,
            chunk_size: defaults.chunk_size,
            chunk_overlap: defaults.chunk_overlap,
            chat_memory_length: defaults.chat_memory_length,
            logged_in: false,
            username: None,
            session_key: NEW_SESSION.to_string(),
            new_session_key: None,
        }
    }

    /// Default state with the model options for the default endpoint
    /// resolved against `catalog`.
    pub fn with_catalog(defaults: &SessionDefaults, catalog: &ModelCatalog) -> Self {
        let mut session = Self::new(defaults);
        update_model_options(catalog, &mut session);
        session
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        Endpoint::parse(&self.endpoint_to_use)
    }

    /// Key the current conversation is stored under. An unresolved session
    /// gets a generated key on first call and keeps it until a new session is
    /// started.
    pub fn get_session_key(&mut self, keys: &dyn SessionKeySource) -> String {
        if self.session_key != NEW_SESSION {
            return self.session_key.clone();
        }
        if let Some(key) = &self.new_session_key {
            return key.clone();
        }
        let key = keys.next_key();
        debug!(session_key = %key, "generated session key");
        self.new_session_key = Some(key.clone());
        key
    }

    /// The key messages have been stored under so far, if any.
    pub fn current_session_key(&self) -> Option<&str> {
        if self.session_key != NEW_SESSION {
            Some(self.session_key.as_str())
        } else {
            self.new_session_key.as_deref()
        }
    }

    /// Adopt the generated key once the conversation has been persisted.
    pub(crate) fn resolve_session_key(&mut self, keys: &dyn SessionKeySource) -> String {
        let key = self.get_session_key(keys);
        self.session_key = key.clone();
        self.new_session_key = None;
        key
    }

    /// Start over with an empty transcript; the next key request generates a
    /// new key.
    pub fn start_new_session(&mut self) {
        self.messages.clear();
        self.session_key = NEW_SESSION.to_string();
        self.new_session_key = None;
    }

    /// Enter document chat mode. Cached backend handles are dropped so they
    /// are rebuilt against the current document store.
    pub fn toggle_pdf_chat(&mut self, cache: &ResourceCache) {
        self.pdf_chat = true;
        cache.clear();
    }

    pub fn detoggle_pdf_chat(&mut self) {
        self.pdf_chat = false;
    }

    pub fn set_endpoint(&mut self, endpoint: Endpoint, catalog: &ModelCatalog) {
        self.endpoint_to_use = endpoint.as_str().to_string();
        update_model_options(catalog, self);
    }

    pub fn set_model(&mut self, model: &str, catalog: &ModelCatalog) -> Result<(), SettingsError> {
        let endpoint = self
            .endpoint()
            .ok_or_else(|| SettingsError::UnknownEndpoint(self.endpoint_to_use.clone()))?;
        if !catalog.contains(endpoint, model) {
            return Err(SettingsError::UnknownModel {
                endpoint: endpoint.to_string(),
                model: model.to_string(),
            });
        }
        self.model_to_use = model.to_string();
        Ok(())
    }

    pub fn set_retrieved_documents(&mut self, count: usize) -> Result<(), SettingsError> {
        if !(MIN_RETRIEVED_DOCUMENTS..=MAX_RETRIEVED_DOCUMENTS).contains(&count) {
            return Err(SettingsError::RetrievedDocumentsOutOfRange(count));
        }
        self.retrieved_documents = count;
        Ok(())
    }

    pub fn set_chunking(&mut self, chunk_size: usize, chunk_overlap: usize) -> Result<(), SettingsError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(SettingsError::InvalidChunking {
                chunk_size,
                chunk_overlap,
            });
        }
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        Ok(())
    }

    pub fn set_chat_memory_length(&mut self, length: usize) -> Result<(), SettingsError> {
        if length == 0 {
            return Err(SettingsError::InvalidMemoryLength);
        }
        self.chat_memory_length = length;
        Ok(())
    }

    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

/// Process-local map of live sessions.
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    defaults: SessionDefaults,
    catalog: ModelCatalog,
}

impl SessionStore {
    pub fn new(defaults: SessionDefaults, catalog: ModelCatalog) -> Self {
        Self {
            sessions: HashMap::new(),
            defaults,
            catalog,
        }
    }

    /// Create the session with defaults if it does not exist yet. Calling it
    /// again for the same id leaves the session untouched.
    pub fn initialize(&mut self, id: &str) -> &mut Session {
        let defaults = &self.defaults;
        let catalog = &self.catalog;
        self.sessions.entry(id.to_string()).or_insert_with(|| {
            debug!(session = id, "initializing session state");
            Session::with_catalog(defaults, catalog)
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
