pub mod chunking;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod llm;
pub mod loaders;
pub mod models;
pub mod session;

pub use chunking::{chunk_text, ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use corpus::{Corpus, CorpusOptions};
pub use embeddings::{EmbeddingProvider, HashEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ProviderError, RagError};
pub use index::VectorIndex;
pub use llm::{
    build_prompt, fallback_models, generate_answer, huggingface_fallback_models, AnswerProvider,
    HuggingFaceProvider, OpenAiCompatProvider, DEFAULT_ENDPOINT, DEFAULT_HUGGINGFACE_MODEL,
    DEFAULT_MODEL, HUGGINGFACE_ENDPOINT,
};
pub use loaders::{discover_supported_files, load_document, DocumentKind, LoadedDocument};
pub use models::{
    ChatMessage, ChatRole, Chunk, Document, DocumentInfo, ModelInfo, RetrievedChunk,
};
pub use session::{Session, SessionRegistry};
