use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::models::Endpoint;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Usernames allowed to log in. Empty means any non-empty username.
    #[serde(default)]
    pub users: Vec<String>,
    /// Per-backend model lists that replace the built-in catalog entries
    #[serde(default)]
    pub models: ModelOverrides,
    #[serde(default)]
    pub endpoints: EndpointSettings,
    /// Defaults applied when a session is first initialized
    #[serde(default)]
    pub session: SessionDefaults,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ModelOverrides {
    pub gemini: Option<Vec<String>>,
    pub openai: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct EndpointSettings {
    pub gemini: Option<EndpointConfig>,
    pub openai: Option<EndpointConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionDefaults {
    pub endpoint: String,
    pub model: String,
    pub retrieved_documents: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chat_memory_length: usize,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::Gemini.as_str().to_string(),
            model: "gemini-pro".to_string(),
            retrieved_documents: 4,
            chunk_size: 1000,
            chunk_overlap: 200,
            chat_memory_length: 4,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub model: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn base_url(&self, endpoint: Endpoint) -> &str {
        let configured = match endpoint {
            Endpoint::Gemini => self.endpoints.gemini.as_ref(),
            Endpoint::OpenAi => self.endpoints.openai.as_ref(),
        };
        match configured {
            Some(cfg) => cfg.base_url.as_str(),
            None => match endpoint {
                Endpoint::Gemini => DEFAULT_GEMINI_BASE_URL,
                Endpoint::OpenAi => DEFAULT_OPENAI_BASE_URL,
            },
        }
    }

    pub fn set_base_url(&mut self, endpoint: Endpoint, base_url: impl Into<String>) {
        let entry = Some(EndpointConfig {
            base_url: base_url.into(),
        });
        match endpoint {
            Endpoint::Gemini => self.endpoints.gemini = entry,
            Endpoint::OpenAi => self.endpoints.openai = entry,
        }
    }

    pub fn print_all(&self) {
        println!("Current configuration:");
        for endpoint in Endpoint::ALL {
            println!("  {} base-url: {}", endpoint, self.base_url(endpoint));
        }
        let defaults = &self.session;
        println!("  session endpoint: {}", defaults.endpoint);
        println!("  session model: {}", defaults.model);
        println!("  retrieved-documents: {}", defaults.retrieved_documents);
        println!(
            "  chunking: {} (overlap {})",
            defaults.chunk_size, defaults.chunk_overlap
        );
        println!("  chat-memory-length: {}", defaults.chat_memory_length);
        println!("  transcription model: {}", self.transcription.model);
        if self.users.is_empty() {
            println!("  users: (any)");
        } else {
            println!("  users: {}", self.users.join(", "));
        }
    }
}
