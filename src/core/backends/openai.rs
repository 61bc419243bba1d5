use async_trait::async_trait;
use tracing::debug;

use super::{send_json, BackendRequest, ChatBackend};
use crate::api::{
    ChatCompletionRequest, ChatCompletionResponse, ChatContent, ChatContentPart, ChatMessage,
    ImageUrl,
};
use crate::core::error::ChatError;
use crate::core::models::Endpoint;
use crate::utils::url::construct_api_url;

/// Client for OpenAI-compatible `chat/completions` endpoints.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

pub(crate) fn build_messages(request: &BackendRequest) -> Vec<ChatMessage> {
    let image_target = request.image_target();
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = &request.system {
        messages.push(ChatMessage {
            role: "system",
            content: ChatContent::Text(system.clone()),
        });
    }

    for (index, message) in request.messages.iter().enumerate() {
        let content = match (&request.image, image_target == Some(index)) {
            (Some(image), true) => ChatContent::Parts(vec![
                ChatContentPart::Text {
                    text: message.content.clone(),
                },
                ChatContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url(),
                    },
                },
            ]),
            _ => ChatContent::Text(message.content.clone()),
        };
        messages.push(ChatMessage {
            role: message.role.as_str(),
            content,
        });
    }

    messages
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn endpoint(&self) -> Endpoint {
        Endpoint::OpenAi
    }

    async fn complete(&self, request: &BackendRequest) -> Result<String, ChatError> {
        let backend = Endpoint::OpenAi.as_str();
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: build_messages(request),
            stream: false,
        };
        debug!(
            model = %request.model,
            messages = body.messages.len(),
            image = request.image.is_some(),
            "sending chat completion"
        );

        let http_request = self
            .client
            .post(construct_api_url(&self.base_url, "chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        let response: ChatCompletionResponse = send_json(backend, http_request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::upstream(backend, "response contained no choices"))?;

        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ChatError::upstream(
                backend,
                format!(
                    "empty response (finish reason: {})",
                    choice.finish_reason.as_deref().unwrap_or("unknown")
                ),
            )),
        }
    }
}
