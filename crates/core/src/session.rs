use crate::corpus::{Corpus, CorpusOptions};
use crate::embeddings::EmbeddingProvider;
use crate::models::ChatMessage;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// One user's conversation state: a corpus, its chat history, and the
/// activity timestamp the registry expires on.
///
/// The corpus sits behind an `RwLock` so uploads and chat requests for
/// the same session serialize correctly: mutations take the write half
/// for the whole rebuild, queries share the read half, and a reader can
/// never observe a half-built index.
pub struct Session {
    corpus: RwLock<Corpus>,
    history: Mutex<Vec<ChatMessage>>,
    last_active: Mutex<DateTime<Utc>>,
}

impl Session {
    fn new(corpus: Corpus) -> Self {
        Self {
            corpus: RwLock::new(corpus),
            history: Mutex::new(Vec::new()),
            last_active: Mutex::new(Utc::now()),
        }
    }

    pub fn corpus(&self) -> &RwLock<Corpus> {
        &self.corpus
    }

    pub fn touch(&self) {
        let mut last_active = self.last_active.lock().expect("session clock poisoned");
        *last_active = Utc::now();
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        *self.last_active.lock().expect("session clock poisoned")
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().expect("session history poisoned").clone()
    }

    pub fn record_exchange(&self, question: impl Into<String>, answer: impl Into<String>) {
        let mut history = self.history.lock().expect("session history poisoned");
        history.push(ChatMessage::user(question));
        history.push(ChatMessage::assistant(answer));
    }
}

/// Maps session keys to live sessions and owns their lifecycle. The
/// registry only ever calls the corpus's public operations; sessions
/// are discarded wholesale on expiry or explicit end.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    embedder: Arc<dyn EmbeddingProvider>,
    options: CorpusOptions,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        options: CorpusOptions,
        ttl: Duration,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            embedder,
            options,
            ttl,
        }
    }

    /// Fetch the session for `key`, creating an empty one on first
    /// use. Touches the activity timestamp either way.
    pub fn get_or_create(&self, key: &str) -> Arc<Session> {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        let session = sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Session::new(Corpus::new(
                    self.embedder.clone(),
                    self.options.clone(),
                )))
            })
            .clone();
        drop(sessions);

        session.touch();
        session
    }

    /// Explicitly end a session. Returns whether one existed.
    pub fn end(&self, key: &str) -> bool {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .remove(key)
            .is_some()
    }

    /// Drop every session idle longer than the TTL. Returns how many
    /// were removed.
    pub fn sweep_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        let before = sessions.len();
        sessions.retain(|_, session| session.last_active() >= cutoff);
        before - sessions.len()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().expect("session registry poisoned").len()
    }
}
