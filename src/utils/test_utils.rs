use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::backends::{BackendFactory, BackendRequest, ChatBackend};
use crate::core::error::ChatError;
use crate::core::models::{Endpoint, ModelCatalog};
use crate::core::session::SessionKeySource;

pub fn test_catalog() -> ModelCatalog {
    ModelCatalog {
        gemini: vec!["gemini-pro".to_string(), "gemini-1.5-flash".to_string()],
        openai: vec!["gpt-3.5-turbo".to_string(), "gpt-4".to_string()],
    }
}

/// Deterministic keys: `key-1`, `key-2`, ...
#[derive(Default)]
pub struct CountingKeys {
    issued: AtomicUsize,
}

impl CountingKeys {
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl SessionKeySource for CountingKeys {
    fn next_key(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        format!("key-{n}")
    }
}

/// Backend that answers every request with a canned result and records what
/// it was sent. Clones share the recording.
#[derive(Clone)]
pub struct MockBackend {
    endpoint: Endpoint,
    reply: Result<String, String>,
    requests: Arc<Mutex<Vec<BackendRequest>>>,
}

impl MockBackend {
    pub fn replying(endpoint: Endpoint, reply: &str) -> Self {
        Self {
            endpoint,
            reply: Ok(reply.to_string()),
            requests: Arc::default(),
        }
    }

    pub fn failing(endpoint: Endpoint, message: &str) -> Self {
        Self {
            endpoint,
            reply: Err(message.to_string()),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    async fn complete(&self, request: &BackendRequest) -> Result<String, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(ChatError::Upstream {
                backend: self.endpoint.to_string(),
                status: Some(429),
                message: message.clone(),
            }),
        }
    }
}

/// Hands out the same [`MockBackend`] for every endpoint.
pub struct MockFactory {
    backend: MockBackend,
    created: AtomicUsize,
}

impl MockFactory {
    pub fn new(backend: MockBackend) -> Self {
        Self {
            backend,
            created: AtomicUsize::new(0),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl BackendFactory for MockFactory {
    fn create(&self, _endpoint: Endpoint) -> Result<Arc<dyn ChatBackend>, ChatError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.backend.clone()))
    }
}

/// App wired to a mock backend, in-memory history and an open allowlist.
pub fn create_test_app(backend: MockBackend) -> crate::core::app::App {
    use crate::auth::ConfigAuthenticator;
    use crate::core::chat::ChatService;
    use crate::core::config::{Config, SessionDefaults};
    use crate::core::dispatcher::BackendDispatcher;
    use crate::core::models::update_model_options;
    use crate::core::session::Session;
    use crate::documents::InMemoryDocumentStore;
    use crate::history::DbManager;

    let catalog = test_catalog();
    let documents = Arc::new(InMemoryDocumentStore::new());
    let dispatcher = BackendDispatcher::new(Arc::new(MockFactory::new(backend)), catalog.clone())
        .with_documents(documents.clone());
    let service = ChatService::new(
        dispatcher,
        DbManager::in_memory(),
        Arc::new(CountingKeys::default()),
    );
    let mut session = Session::new(&SessionDefaults::default());
    update_model_options(&catalog, &mut session);

    crate::core::app::App::new(
        Config::default(),
        session,
        service,
        documents,
        Arc::new(ConfigAuthenticator::default()),
    )
}
