//! Everything the interactive chat loop operates on.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::audio::{AudioClip, Transcriber};
use crate::auth::Authenticator;
use crate::core::backends::ImageAttachment;
use crate::core::chat::ChatService;
use crate::core::config::Config;
use crate::core::error::ChatError;
use crate::core::message::Message;
use crate::core::session::Session;
use crate::documents::DocumentStore;
use crate::utils::logging::TranscriptLog;

pub struct App {
    pub config: Config,
    pub session: Session,
    pub service: ChatService,
    pub documents: Arc<dyn DocumentStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub transcript: TranscriptLog,
    /// Attached to the next turn, then dropped.
    pub pending_image: Option<ImageAttachment>,
    notices: Vec<String>,
}

impl App {
    pub fn new(
        config: Config,
        session: Session,
        service: ChatService,
        documents: Arc<dyn DocumentStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            config,
            session,
            service,
            documents,
            authenticator,
            transcriber: None,
            transcript: TranscriptLog::default(),
            pending_image: None,
            notices: Vec::new(),
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_transcript(mut self, transcript: TranscriptLog) -> Self {
        self.transcript = transcript;
        self
    }

    /// Queue a status line for the user.
    pub fn notify(&mut self, message: impl Into<String>) {
        self.notices.push(message.into());
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn user_display_name(&self) -> &str {
        self.session.username.as_deref().unwrap_or("You")
    }

    /// Run one turn with any pending image and mirror it to the transcript
    /// log.
    pub async fn send(&mut self, input: &str) -> Result<Vec<Message>, ChatError> {
        let image = self.pending_image.take();
        let before = self.session.messages.len();
        let result = self.service.run_turn(&mut self.session, input, image).await;

        let user_name = self.user_display_name().to_string();
        for message in &self.session.messages[before.min(self.session.messages.len())..] {
            if let Err(err) = self.transcript.log_message(message, &user_name) {
                warn!(error = %err, "transcript write failed");
            }
        }
        result
    }

    pub async fn transcribe(&self, path: &Path) -> Result<String, ChatError> {
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            ChatError::upstream(
                "transcription",
                "not configured (set OPENAI_API_KEY or run `mmchat auth openai`)",
            )
        })?;
        let clip = AudioClip::from_path(path)?;
        transcriber.transcribe(&clip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{create_test_app, MockBackend};
    use crate::core::models::Endpoint;

    #[tokio::test]
    async fn pending_image_is_used_once() {
        let backend = MockBackend::replying(Endpoint::Gemini, "A cat.");
        let mut app = create_test_app(backend.clone());
        app.pending_image = Some(ImageAttachment::from_bytes(vec![0xFF, 0xD8, 0xFF], None).unwrap());

        app.send("What is this?").await.unwrap();
        app.send("And now?").await.unwrap();

        let requests = backend.requests();
        assert!(requests[0].image.is_some());
        assert!(requests[1].image.is_none());
        assert!(app.pending_image.is_none());
    }

    #[tokio::test]
    async fn transcribe_without_transcriber_reports_configuration() {
        let app = create_test_app(MockBackend::replying(Endpoint::Gemini, "x"));
        let err = app.transcribe(Path::new("missing.wav")).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn turns_are_written_to_active_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.log");
        let mut app = create_test_app(MockBackend::replying(Endpoint::Gemini, "Hi there!"))
            .with_transcript(TranscriptLog::new(Some(path.clone())));
        app.session.username = Some("alice".into());

        app.send("Hello").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "alice: Hello\n\nHi there!\n\n"
        );
    }
}
