//! Document ingestion and retrieval for document chat mode.
//!
//! Uploaded files are split into overlapping character windows and kept in
//! memory. Retrieval ranks chunks by how many distinct query terms they
//! contain.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::RwLock;

use tracing::{debug, info};

use crate::core::error::IngestionError;
use crate::core::session::Session;

/// A file handed to ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, IngestionError> {
        let bytes = std::fs::read(path).map_err(|source| IngestionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn validate(self) -> Result<Self, IngestionError> {
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(IngestionError::InvalidChunking {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// Name of the file the chunk came from.
    pub source: String,
    pub text: String,
}

pub trait DocumentStore: Send + Sync {
    /// Chunk and index the files. Returns the number of chunks added. Either
    /// every file is added or none is.
    fn add_documents(
        &self,
        files: &[UploadedFile],
        chunking: ChunkingConfig,
    ) -> Result<usize, IngestionError>;

    /// Up to `k` chunks relevant to `query`, best first.
    fn retrieve(&self, query: &str, k: usize) -> Vec<DocumentChunk>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ingest with the chunking parameters of the session.
pub fn add_documents_to_db(
    store: &dyn DocumentStore,
    files: &[UploadedFile],
    session: &Session,
) -> Result<usize, IngestionError> {
    store.add_documents(files, session.chunking())
}

/// Split into windows of `chunk_size` characters, each starting
/// `chunk_size - chunk_overlap` characters after the previous one.
pub fn split_text(text: &str, chunking: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.iter().all(|c| c.is_whitespace()) {
        return Vec::new();
    }
    let step = chunking.chunk_size - chunking.chunk_overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunking.chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn query_terms(query: &str) -> BTreeSet<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    chunks: RwLock<Vec<DocumentChunk>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn add_documents(
        &self,
        files: &[UploadedFile],
        chunking: ChunkingConfig,
    ) -> Result<usize, IngestionError> {
        let chunking = chunking.validate()?;
        let mut pending = Vec::new();
        for file in files {
            let text = std::str::from_utf8(&file.bytes).map_err(|_| IngestionError::Unreadable {
                name: file.name.clone(),
            })?;
            let pieces = split_text(text, chunking);
            debug!(file = %file.name, chunks = pieces.len(), "chunked document");
            pending.extend(pieces.into_iter().map(|text| DocumentChunk {
                source: file.name.clone(),
                text,
            }));
        }

        let added = pending.len();
        let mut chunks = self.chunks.write().unwrap_or_else(|p| p.into_inner());
        chunks.extend(pending);
        info!(files = files.len(), added, total = chunks.len(), "documents ingested");
        Ok(added)
    }

    fn retrieve(&self, query: &str, k: usize) -> Vec<DocumentChunk> {
        let terms = query_terms(query);
        if terms.is_empty() || k == 0 {
            return Vec::new();
        }
        let chunks = self.chunks.read().unwrap_or_else(|p| p.into_inner());
        let mut scored: Vec<(usize, &DocumentChunk)> = chunks
            .iter()
            .map(|chunk| {
                let haystack = chunk.text.to_lowercase();
                let score = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (score, chunk)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(k)
            .map(|(_, chunk)| chunk.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.chunks.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}
