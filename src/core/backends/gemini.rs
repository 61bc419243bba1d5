use async_trait::async_trait;
use tracing::debug;

use super::{send_json, BackendRequest, ChatBackend};
use crate::api::gemini::{Blob, Content, GenerateContentRequest, GenerateContentResponse, Part};
use crate::core::error::ChatError;
use crate::core::models::Endpoint;
use crate::utils::url::construct_api_url;

/// Client for the Gemini `generateContent` API.
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

/// Gemini expects the conversation to open with a user turn and to alternate
/// roles. Leading model turns are dropped and consecutive turns with the same
/// role are merged into one content with several parts.
pub(crate) fn build_request(request: &BackendRequest) -> GenerateContentRequest {
    let image_target = request.image_target();

    let mut contents: Vec<Content> = Vec::new();
    for (index, message) in request.messages.iter().enumerate() {
        let role = message.role.gemini_role();
        if contents.is_empty() && !message.is_user() {
            continue;
        }
        let mut parts = vec![Part::Text {
            text: message.content.clone(),
        }];
        if let (Some(image), true) = (&request.image, image_target == Some(index)) {
            parts.push(Part::InlineData {
                inline_data: Blob {
                    mime_type: image.mime_type.to_string(),
                    data: image.base64(),
                },
            });
        }
        match contents.last_mut() {
            Some(last) if last.role == Some(role) => last.parts.extend(parts),
            _ => contents.push(Content {
                role: Some(role),
                parts,
            }),
        }
    }

    GenerateContentRequest {
        contents,
        system_instruction: request.system.as_ref().map(|text| Content {
            role: None,
            parts: vec![Part::Text { text: text.clone() }],
        }),
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn endpoint(&self) -> Endpoint {
        Endpoint::Gemini
    }

    async fn complete(&self, request: &BackendRequest) -> Result<String, ChatError> {
        let backend = Endpoint::Gemini.as_str();
        let body = build_request(request);
        debug!(
            model = %request.model,
            contents = body.contents.len(),
            image = request.image.is_some(),
            "sending generateContent"
        );

        let url = construct_api_url(
            &self.base_url,
            &format!("models/{}:generateContent", request.model),
        );
        let http_request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let response: GenerateContentResponse = send_json(backend, http_request).await?;
        if let Some(text) = response.text() {
            return Ok(text);
        }

        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .map(|reason| format!("prompt blocked: {reason}"))
            .or_else(|| {
                response
                    .candidates
                    .first()
                    .and_then(|c| c.finish_reason.clone())
                    .map(|reason| format!("empty response (finish reason: {reason})"))
            })
            .unwrap_or_else(|| "response contained no candidates".to_string());
        Err(ChatError::upstream(backend, reason))
    }
}
