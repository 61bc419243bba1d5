//! Error taxonomy for a chat turn and the collaborators it touches.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single turn. None of these are fatal to the process: the
/// chat loop reports them and keeps accepting input.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The backend rejected the request or the transport failed.
    #[error("{backend} request failed{}: {message}", status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    Upstream {
        backend: String,
        status: Option<u16>,
        message: String,
    },

    /// The selected endpoint/model combination is not one we can dispatch to.
    #[error("unsupported backend '{endpoint}'{}", model.as_ref().map(|m| format!(" with model '{m}'")).unwrap_or_default())]
    UnsupportedBackend {
        endpoint: String,
        model: Option<String>,
    },

    #[error("message must not be empty")]
    EmptyInput,

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

impl ChatError {
    pub fn upstream(backend: impl Into<String>, message: impl Into<String>) -> Self {
        ChatError::Upstream {
            backend: backend.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn from_reqwest(backend: &str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        ChatError::Upstream {
            backend: backend.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("failed to read document {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("document '{name}' is not readable text")]
    Unreadable { name: String },

    #[error("invalid chunking: size {chunk_size}, overlap {chunk_overlap}")]
    InvalidChunking {
        chunk_size: usize,
        chunk_overlap: usize,
    },
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("chat history I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("chat history at {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("chat history at {} belongs to session '{found}', not '{expected}'", path.display())]
    KeyMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("could not determine a data directory for chat history")]
    NoDataDir,
}

/// Rejected UI setting. The session is left unchanged when one of these is
/// returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown endpoint '{0}' (expected gemini or openai)")]
    UnknownEndpoint(String),

    #[error("model '{model}' is not available for {endpoint}")]
    UnknownModel { endpoint: String, model: String },

    #[error("retrieved documents must be between 1 and 10, got {0}")]
    RetrievedDocumentsOutOfRange(usize),

    #[error("chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidChunking {
        chunk_size: usize,
        chunk_overlap: usize,
    },

    #[error("chat memory length must be at least 1")]
    InvalidMemoryLength,
}
