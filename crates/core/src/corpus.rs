use crate::chunking::{chunk_text, ChunkingConfig};
use crate::embeddings::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::models::{Chunk, Document, DocumentInfo, RetrievedChunk};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct CorpusOptions {
    pub chunking: ChunkingConfig,
    /// Deadline for the one embedding call a rebuild makes. `None`
    /// means no deadline.
    pub embed_timeout: Option<Duration>,
}

/// The per-session aggregate of documents, derived chunks, and the
/// current vector index snapshot.
///
/// Every mutation regenerates chunks and index from the full document
/// set, then swaps both in as one step, so a reader can never observe
/// a chunk list whose length disagrees with the index. When the
/// embedding provider fails mid-rebuild the triggering mutation is
/// rolled back and the corpus is exactly its pre-call state.
///
/// Mutations take `&mut self` and queries `&self`; callers that share
/// a corpus across tasks wrap it in a lock (see `session`).
pub struct Corpus {
    embedder: Arc<dyn EmbeddingProvider>,
    options: CorpusOptions,
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
    index: Option<VectorIndex>,
}

impl Corpus {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, options: CorpusOptions) -> Self {
        Self {
            embedder,
            options,
            documents: Vec::new(),
            chunks: Vec::new(),
            index: None,
        }
    }

    /// Append a document and rebuild. If the rebuild fails the append
    /// is rolled back.
    pub async fn add_document(
        &mut self,
        id: impl Into<String>,
        filename: impl Into<String>,
        type_tag: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<()> {
        self.documents.push(Document {
            id: id.into(),
            filename: filename.into(),
            type_tag: type_tag.into(),
            text: text.into(),
            added_at: Utc::now(),
        });

        if let Err(error) = self.rebuild().await {
            self.documents.pop();
            return Err(error);
        }

        Ok(())
    }

    /// Remove a document by id and rebuild. Returns `false` when the
    /// id is unknown; that is a no-op, not an error. A failed rebuild
    /// restores the document at its original position.
    pub async fn remove_document(&mut self, id: &str) -> Result<bool> {
        let Some(position) = self.documents.iter().position(|document| document.id == id)
        else {
            return Ok(false);
        };

        let removed = self.documents.remove(position);

        if let Err(error) = self.rebuild().await {
            self.documents.insert(position, removed);
            return Err(error);
        }

        Ok(true)
    }

    /// Top-k chunks for a question, each attributed to its owning
    /// document. An empty corpus answers with an empty list.
    pub async fn query(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let Some(index) = &self.index else {
            return Ok(Vec::new());
        };

        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let question = [question.to_string()];
        let mut vectors = self.embed_with_deadline(&question).await?;
        let query_vector = match vectors.pop() {
            Some(vector) if vectors.is_empty() => vector,
            _ => {
                return Err(RagError::Embedding(
                    "provider did not return exactly one vector for the query".to_string(),
                ))
            }
        };

        let filenames: HashMap<&str, &str> = self
            .documents
            .iter()
            .map(|document| (document.id.as_str(), document.filename.as_str()))
            .collect();

        let hits = index.search(&query_vector, k)?;
        let results = hits
            .into_iter()
            .map(|(position, score)| {
                // Resolution goes position -> chunk -> owning document;
                // chunk text can repeat across documents, so content is
                // never compared.
                let chunk = &self.chunks[position];
                RetrievedChunk {
                    text: chunk.text.clone(),
                    score,
                    source_filename: filenames
                        .get(chunk.document_id.as_str())
                        .copied()
                        .unwrap_or_default()
                        .to_string(),
                    document_id: chunk.document_id.clone(),
                }
            })
            .collect();

        Ok(results)
    }

    /// Document metadata in insertion order, without the full text.
    pub fn list_documents(&self) -> Vec<DocumentInfo> {
        self.documents
            .iter()
            .map(|document| DocumentInfo {
                id: document.id.clone(),
                filename: document.filename.clone(),
                type_tag: document.type_tag.clone(),
            })
            .collect()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Regenerate chunks, embeddings, and index from the current
    /// document set. Everything is built off to the side; the visible
    /// chunk list and index are replaced only once both are complete.
    async fn rebuild(&mut self) -> Result<()> {
        let mut chunks = Vec::new();
        for document in &self.documents {
            let pieces = chunk_text(&document.text, &self.options.chunking)?;
            for (ordinal, text) in pieces.into_iter().enumerate() {
                chunks.push(Chunk {
                    id: chunks.len(),
                    document_id: document.id.clone(),
                    text,
                    ordinal,
                });
            }
        }

        if chunks.is_empty() {
            self.chunks = chunks;
            self.index = None;
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embed_with_deadline(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let index = VectorIndex::build(vectors)?;

        self.chunks = chunks;
        self.index = Some(index);
        Ok(())
    }

    async fn embed_with_deadline(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self.options.embed_timeout {
            Some(deadline) => tokio::time::timeout(deadline, self.embedder.embed(texts))
                .await
                .map_err(|_| RagError::EmbeddingTimeout(deadline))?,
            None => self.embedder.embed(texts).await,
        }
    }
}
