//! Speech-to-text for recorded audio clips.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::api::TranscriptionResponse;
use crate::core::backends::{build_http_client, send_json};
use crate::core::config::Config;
use crate::core::error::{ChatError, IngestionError};
use crate::core::models::Endpoint;
use crate::core::providers::{resolve_api_key, CredentialSource};
use crate::utils::url::construct_api_url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AudioClip {
    pub fn from_path(path: &Path) -> Result<Self, IngestionError> {
        let bytes = std::fs::read(path).map_err(|source| IngestionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());
        Ok(Self { file_name, bytes })
    }

    fn mime_type(&self) -> &'static str {
        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("mp3") | Some("mpga") | Some("mpeg") => "audio/mpeg",
            Some("m4a") | Some("mp4") => "audio/mp4",
            Some("ogg") | Some("oga") => "audio/ogg",
            Some("webm") => "audio/webm",
            Some("flac") => "audio/flac",
            _ => "audio/wav",
        }
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, ChatError>;
}

/// Whisper-style `audio/transcriptions` client.
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    /// Build from configuration, resolving the OpenAI key the same way the
    /// chat backends do.
    pub fn from_config(config: &Config, credentials: Arc<dyn CredentialSource>) -> Result<Self, ChatError> {
        let api_key = resolve_api_key(credentials.as_ref(), Endpoint::OpenAi)
            .map_err(|err| ChatError::upstream("transcription", err.to_string()))?;
        Ok(Self::new(
            build_http_client(config)?,
            config.base_url(Endpoint::OpenAi).to_string(),
            api_key,
            config.transcription.model.clone(),
        ))
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, ChatError> {
        let part = Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name.clone())
            .mime_str(clip.mime_type())
            .map_err(|err| ChatError::from_reqwest("transcription", err))?;
        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        debug!(file = %clip.file_name, bytes = clip.bytes.len(), model = %self.model, "sending audio");
        let request = self
            .client
            .post(construct_api_url(&self.base_url, "audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form);
        let response: TranscriptionResponse = send_json("transcription", request).await?;
        info!(chars = response.text.len(), "audio transcribed");
        Ok(response.text)
    }
}
