//! Per-turn backend selection.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::core::backends::{BackendFactory, BackendRequest, ImageAttachment, ResourceCache};
use crate::core::error::ChatError;
use crate::core::message::Message;
use crate::core::models::{Endpoint, ModelCatalog};
use crate::core::session::Session;
use crate::documents::{DocumentChunk, DocumentStore};

const CONTEXT_PREAMBLE: &str = "Answer the user's question using the following excerpts from their uploaded documents when they are relevant. If the excerpts do not contain the answer, say so.";

pub struct BackendDispatcher {
    factory: Arc<dyn BackendFactory>,
    cache: Arc<ResourceCache>,
    catalog: ModelCatalog,
    documents: Option<Arc<dyn DocumentStore>>,
}

impl BackendDispatcher {
    pub fn new(factory: Arc<dyn BackendFactory>, catalog: ModelCatalog) -> Self {
        Self {
            factory,
            cache: Arc::new(ResourceCache::default()),
            catalog,
            documents: None,
        }
    }

    /// Enable retrieval of document context in document chat mode.
    pub fn with_documents(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Endpoint and model to dispatch to, or `UnsupportedBackend` when the
    /// session points at something we cannot serve.
    pub fn resolve_target(&self, session: &Session) -> Result<(Endpoint, String), ChatError> {
        let unsupported = || ChatError::UnsupportedBackend {
            endpoint: session.endpoint_to_use.clone(),
            model: Some(session.model_to_use.clone()).filter(|m| !m.is_empty()),
        };
        let endpoint = session.endpoint().ok_or_else(unsupported)?;
        if !self.catalog.contains(endpoint, &session.model_to_use) {
            return Err(unsupported());
        }
        Ok((endpoint, session.model_to_use.clone()))
    }

    /// Produce the assistant reply for one turn. `chat_history` must already
    /// end with the user message for this turn; it is not modified.
    pub async fn chat(
        &self,
        session: &Session,
        user_input: &str,
        chat_history: &[Message],
        image: Option<&ImageAttachment>,
    ) -> Result<String, ChatError> {
        if user_input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }
        let (endpoint, model) = self.resolve_target(session)?;
        let backend = self.cache.get_or_create(endpoint, self.factory.as_ref())?;

        let request = BackendRequest {
            model,
            system: self.document_context(session, user_input),
            messages: memory_window(chat_history, session.chat_memory_length).to_vec(),
            image: image.cloned(),
        };

        debug!(
            %endpoint,
            model = %request.model,
            history = request.messages.len(),
            "dispatching turn"
        );
        let started = Instant::now();
        let reply = backend.complete(&request).await?;
        info!(
            %endpoint,
            model = %request.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend replied"
        );
        Ok(reply)
    }

    fn document_context(&self, session: &Session, user_input: &str) -> Option<String> {
        if !session.pdf_chat {
            return None;
        }
        let store = self.documents.as_ref()?;
        let chunks = store.retrieve(user_input, session.retrieved_documents);
        debug!(retrieved = chunks.len(), "document context");
        format_context(&chunks)
    }
}

/// The current user message plus the last `chat_memory_length` exchanges.
pub fn memory_window(history: &[Message], chat_memory_length: usize) -> &[Message] {
    let keep = chat_memory_length.saturating_mul(2).saturating_add(1);
    &history[history.len().saturating_sub(keep)..]
}

fn format_context(chunks: &[DocumentChunk]) -> Option<String> {
    if chunks.is_empty() {
        return None;
    }
    let mut context = String::from(CONTEXT_PREAMBLE);
    for (index, chunk) in chunks.iter().enumerate() {
        context.push_str(&format!("\n\n[{}] {}\n{}", index + 1, chunk.source, chunk.text));
    }
    Some(context)
}
