//! API clients for the recognized backends.
//!
//! Every backend sits behind [`ChatBackend`]. Handles are built by a
//! [`BackendFactory`] and kept in a [`ResourceCache`] until the cache is
//! invalidated.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::api::summarize_api_error;
use crate::core::config::Config;
use crate::core::error::ChatError;
use crate::core::message::Message;
use crate::core::models::Endpoint;
use crate::core::providers::{resolve_api_key, CredentialSource};

pub mod gemini;
pub mod openai;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

/// Everything a backend needs for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub model: String,
    /// Instruction placed ahead of the conversation (retrieved document
    /// context in document chat mode).
    pub system: Option<String>,
    pub messages: Vec<Message>,
    /// Attached to the latest user message.
    pub image: Option<ImageAttachment>,
}

impl BackendRequest {
    /// Index of the message an image attaches to.
    pub fn image_target(&self) -> Option<usize> {
        self.image
            .as_ref()
            .and_then(|_| self.messages.iter().rposition(Message::is_user))
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn endpoint(&self) -> Endpoint;

    /// Submit the request once and return the generated text.
    async fn complete(&self, request: &BackendRequest) -> Result<String, ChatError>;
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to read image {}: {source}", path.display())]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported image format (expected JPEG or PNG)")]
    UnsupportedFormat,
}

/// Raw bytes of an uploaded JPEG or PNG image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl ImageAttachment {
    /// Detect the format from magic bytes, then from the file name.
    pub fn from_bytes(bytes: Vec<u8>, file_name: Option<&str>) -> Result<Self, AttachmentError> {
        let mime_type = sniff_image_type(&bytes)
            .or_else(|| file_name.and_then(image_type_from_name))
            .ok_or(AttachmentError::UnsupportedFormat)?;
        Ok(Self { bytes, mime_type })
    }

    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let bytes = std::fs::read(path).map_err(|source| AttachmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes, path.file_name().and_then(|n| n.to_str()))
    }

    pub fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else {
        None
    }
}

fn image_type_from_name(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Builds backend handles on demand.
pub trait BackendFactory: Send + Sync {
    fn create(&self, endpoint: Endpoint) -> Result<Arc<dyn ChatBackend>, ChatError>;
}

/// Factory for the real HTTP clients. API keys are resolved when a handle is
/// built, so a key added after startup is picked up once the cache is cleared.
pub struct HttpBackendFactory {
    client: reqwest::Client,
    config: Config,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpBackendFactory {
    pub fn new(config: Config, credentials: Arc<dyn CredentialSource>) -> Result<Self, ChatError> {
        let client = build_http_client(&config)?;
        Ok(Self {
            client,
            config,
            credentials,
        })
    }
}

pub fn build_http_client(config: &Config) -> Result<reqwest::Client, ChatError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()
        .map_err(|err| ChatError::upstream("http", err.to_string()))
}

impl BackendFactory for HttpBackendFactory {
    fn create(&self, endpoint: Endpoint) -> Result<Arc<dyn ChatBackend>, ChatError> {
        let api_key = resolve_api_key(self.credentials.as_ref(), endpoint)
            .map_err(|err| ChatError::upstream(endpoint.as_str(), err.to_string()))?;
        let base_url = self.config.base_url(endpoint).to_string();
        debug!(%endpoint, %base_url, "building backend client");
        let backend: Arc<dyn ChatBackend> = match endpoint {
            Endpoint::OpenAi => Arc::new(OpenAiBackend::new(self.client.clone(), base_url, api_key)),
            Endpoint::Gemini => Arc::new(GeminiBackend::new(self.client.clone(), base_url, api_key)),
        };
        Ok(backend)
    }
}

/// Cache of constructed backend handles, one per endpoint.
#[derive(Default)]
pub struct ResourceCache {
    backends: Mutex<HashMap<Endpoint, Arc<dyn ChatBackend>>>,
    generation: AtomicU64,
}

impl ResourceCache {
    fn lock(&self) -> MutexGuard<'_, HashMap<Endpoint, Arc<dyn ChatBackend>>> {
        self.backends
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_or_create(
        &self,
        endpoint: Endpoint,
        factory: &dyn BackendFactory,
    ) -> Result<Arc<dyn ChatBackend>, ChatError> {
        let mut backends = self.lock();
        if let Some(backend) = backends.get(&endpoint) {
            return Ok(Arc::clone(backend));
        }
        let backend = factory.create(endpoint)?;
        backends.insert(endpoint, Arc::clone(&backend));
        Ok(backend)
    }

    /// Drop every cached handle; the next request rebuilds them.
    pub fn clear(&self) {
        let mut backends = self.lock();
        debug!(cached = backends.len(), "clearing backend resource cache");
        backends.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Bumped on every [`ResourceCache::clear`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Send a prepared request and decode a JSON body, mapping every failure to
/// [`ChatError::Upstream`].
pub(crate) async fn send_json<T: DeserializeOwned>(
    backend: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, ChatError> {
    let response = request
        .send()
        .await
        .map_err(|err| ChatError::from_reqwest(backend, err))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(ChatError::Upstream {
            backend: backend.to_string(),
            status: Some(status.as_u16()),
            message: summarize_api_error(&body),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|err| ChatError::from_reqwest(backend, err))?;
    serde_json::from_str(&body)
        .map_err(|err| ChatError::upstream(backend, format!("malformed response: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{MockBackend, MockFactory};

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn image_type_is_sniffed_before_extension() {
        let png = ImageAttachment::from_bytes(PNG_HEADER.to_vec(), Some("photo.jpg")).unwrap();
        assert_eq!(png.mime_type, "image/png");

        let jpeg = ImageAttachment::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0], None).unwrap();
        assert_eq!(jpeg.mime_type, "image/jpeg");

        let by_name = ImageAttachment::from_bytes(vec![1, 2, 3], Some("scan.JPEG")).unwrap();
        assert_eq!(by_name.mime_type, "image/jpeg");

        assert!(matches!(
            ImageAttachment::from_bytes(vec![1, 2, 3], Some("notes.gif")),
            Err(AttachmentError::UnsupportedFormat)
        ));
    }

    #[test]
    fn data_url_embeds_base64_payload() {
        let image = ImageAttachment::from_bytes(vec![0xFF, 0xD8, 0xFF], None).unwrap();
        assert_eq!(image.data_url(), "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn image_targets_latest_user_message() {
        let request = BackendRequest {
            model: "m".into(),
            system: None,
            messages: vec![
                Message::user("first"),
                Message::assistant("reply"),
                Message::user("second"),
            ],
            image: Some(ImageAttachment::from_bytes(PNG_HEADER.to_vec(), None).unwrap()),
        };
        assert_eq!(request.image_target(), Some(2));

        let without_image = BackendRequest {
            image: None,
            ..request
        };
        assert_eq!(without_image.image_target(), None);
    }

    #[test]
    fn cache_reuses_handles_until_cleared() {
        let factory = MockFactory::new(MockBackend::replying(Endpoint::OpenAi, "ok"));
        let cache = ResourceCache::default();

        cache.get_or_create(Endpoint::OpenAi, &factory).unwrap();
        cache.get_or_create(Endpoint::OpenAi, &factory).unwrap();
        assert_eq!(factory.created(), 1);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 1);

        cache.get_or_create(Endpoint::OpenAi, &factory).unwrap();
        assert_eq!(factory.created(), 2);
    }
}
