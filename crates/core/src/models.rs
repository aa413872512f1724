use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-supplied document held by a session corpus. Immutable once
/// added; identity is the `id`, `filename` and `type_tag` are
/// descriptive only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub type_tag: String,
    pub text: String,
    pub added_at: DateTime<Utc>,
}

/// Document metadata without the full text, as returned by
/// `Corpus::list_documents`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentInfo {
    pub id: String,
    pub filename: String,
    pub type_tag: String,
}

/// One bounded, possibly overlapping span of a document's text.
///
/// The `id` is the chunk's position in the corpus-wide chunk sequence
/// at the most recent rebuild, and is the only way a hit is resolved
/// back to its document. Two chunks may carry identical text, so
/// provenance is never derived from content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    pub document_id: String,
    pub text: String,
    /// Ordinal of this chunk within its own document.
    pub ordinal: usize,
}

/// A ranked retrieval hit with source attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f32,
    pub source_filename: String,
    pub document_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A text-generation model as reported by an answer provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}
