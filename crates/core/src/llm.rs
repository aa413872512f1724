use crate::error::ProviderError;
use crate::models::{ChatMessage, ChatRole, ModelInfo, RetrievedChunk};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::Mutex;

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// OpenAI-compatible chat endpoint for Hugging Face hosted inference.
pub const HUGGINGFACE_ENDPOINT: &str = "https://router.huggingface.co/v1";
pub const HUGGINGFACE_HUB: &str = "https://huggingface.co";
pub const DEFAULT_HUGGINGFACE_MODEL: &str = "meta-llama/Llama-3.2-3B-Instruct";

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const MAX_HISTORY_MESSAGES: usize = 6;

const GROQ_FALLBACK_MODEL_IDS: [&str; 4] = [
    "llama-3.3-70b-versatile",
    "llama-3.1-8b-instant",
    "mixtral-8x7b-32768",
    "gemma2-9b-it",
];

const HUGGINGFACE_FALLBACK_MODEL_IDS: [&str; 5] = [
    "meta-llama/Llama-3.2-3B-Instruct",
    "meta-llama/Llama-3.1-8B-Instruct",
    "mistralai/Mistral-7B-Instruct-v0.3",
    "microsoft/Phi-3-mini-4k-instruct",
    "Qwen/Qwen2.5-7B-Instruct",
];

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant that answers questions based on the provided documents.
Rules:
- Only use information from the provided context
- If the answer isn't in the context, say \"I don't have that information in the uploaded documents\"
- Be concise and helpful
- Cite sources when possible";

/// Models advertised when the live Groq listing cannot be fetched.
/// Names come from the same prettifier as live entries so the two can
/// never disagree in casing.
pub fn fallback_models() -> Vec<ModelInfo> {
    GROQ_FALLBACK_MODEL_IDS
        .into_iter()
        .map(|id| ModelInfo {
            id: id.to_string(),
            name: prettify_model_id(id),
        })
        .collect()
}

/// Models advertised when the Hugging Face hub listing cannot be
/// fetched.
pub fn huggingface_fallback_models() -> Vec<ModelInfo> {
    HUGGINGFACE_FALLBACK_MODEL_IDS
        .into_iter()
        .map(|id| ModelInfo {
            id: id.to_string(),
            name: hub_model_name(id),
        })
        .collect()
}

/// Assemble the system and user prompts handed to the generation
/// endpoint: retrieved context with source markers, then the tail of
/// the conversation, then the question.
pub fn build_prompt(
    question: &str,
    context: &[RetrievedChunk],
    history: &[ChatMessage],
) -> (String, String) {
    let context_text = if context.is_empty() {
        "No documents uploaded yet.".to_string()
    } else {
        context
            .iter()
            .map(|chunk| format!("[Source: {}]\n{}", chunk.source_filename, chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let recent = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
    let history_text = history[recent..]
        .iter()
        .map(|message| {
            let speaker = match message.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "Assistant",
            };
            format!("{speaker}: {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let history_block = if history_text.is_empty() {
        String::new()
    } else {
        format!("Previous conversation:\n{history_text}\n\n")
    };

    let user_prompt = format!(
        "Context from documents:\n{context_text}\n\n{history_block}Question: {question}\n\nAnswer based on the context above:"
    );

    (SYSTEM_PROMPT.to_string(), user_prompt)
}

/// Downstream answer-generation boundary: takes assembled prompts,
/// returns generated text. Not part of the retrieval core.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, ProviderError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;
}

/// Chat-completions client for any OpenAI-compatible endpoint (Groq by
/// default). Live model listings are cached for the provider's
/// lifetime; the fallback list is never cached.
pub struct OpenAiCompatProvider {
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: Client,
    cached_models: Mutex<Option<Vec<ModelInfo>>>,
}

impl OpenAiCompatProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            client: Client::new(),
            cached_models: Mutex::new(None),
        }
    }

    async fn fetch_model_listing(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/models", self.endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::BackendResponse {
                backend: self.endpoint.clone(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parse_model_listing(&parsed))
    }
}

#[async_trait]
impl AnswerProvider for OpenAiCompatProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey(self.endpoint.clone()));
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system_prompt },
                    { "role": "user", "content": user_prompt },
                ],
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::BackendResponse {
                backend: self.endpoint.clone(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| content.to_string())
            .ok_or_else(|| ProviderError::BackendResponse {
                backend: self.endpoint.clone(),
                details: "response had no message content".to_string(),
            })
    }

    /// Live model listing, falling back to a static list when the
    /// endpoint is unreachable or returns nothing usable.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let mut cached = self.cached_models.lock().await;
        if let Some(models) = cached.as_ref() {
            return Ok(models.clone());
        }

        match self.fetch_model_listing().await {
            Ok(models) if !models.is_empty() => {
                *cached = Some(models.clone());
                Ok(models)
            }
            _ => Ok(fallback_models()),
        }
    }
}

/// Hugging Face hosted inference. Generation goes through the
/// OpenAI-compatible router, but the model listing comes from the hub
/// API, whose response shape is its own.
pub struct HuggingFaceProvider {
    chat: OpenAiCompatProvider,
    hub: String,
    api_key: String,
    client: Client,
    cached_models: Mutex<Option<Vec<ModelInfo>>>,
}

impl HuggingFaceProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            chat: OpenAiCompatProvider::new(HUGGINGFACE_ENDPOINT, api_key.clone(), model),
            hub: HUGGINGFACE_HUB.to_string(),
            api_key,
            client: Client::new(),
            cached_models: Mutex::new(None),
        }
    }

    async fn fetch_model_listing(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let mut request = self
            .client
            .get(format!("{}/api/models", self.hub))
            .query(&[
                ("pipeline_tag", "text-generation"),
                ("filter", "conversational"),
                ("inference", "warm"),
                ("sort", "downloads"),
                ("direction", "-1"),
                ("limit", "30"),
            ]);

        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::BackendResponse {
                backend: self.hub.clone(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parse_hub_model_listing(&parsed))
    }
}

#[async_trait]
impl AnswerProvider for HuggingFaceProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        self.chat.generate(system_prompt, user_prompt).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let mut cached = self.cached_models.lock().await;
        if let Some(models) = cached.as_ref() {
            return Ok(models.clone());
        }

        match self.fetch_model_listing().await {
            Ok(models) if !models.is_empty() => {
                *cached = Some(models.clone());
                Ok(models)
            }
            _ => Ok(huggingface_fallback_models()),
        }
    }
}

/// Convenience wrapper: assemble the prompt from retrieval output and
/// history, then call the provider.
pub async fn generate_answer(
    provider: &dyn AnswerProvider,
    question: &str,
    context: &[RetrievedChunk],
    history: &[ChatMessage],
) -> Result<String, ProviderError> {
    let (system_prompt, user_prompt) = build_prompt(question, context, history);
    provider.generate(&system_prompt, &user_prompt).await
}

fn parse_model_listing(parsed: &Value) -> Vec<ModelInfo> {
    let entries = parsed
        .pointer("/data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut models: Vec<ModelInfo> = entries
        .iter()
        .filter_map(|entry| entry.pointer("/id").and_then(Value::as_str))
        .filter(|id| {
            let lowered = id.to_lowercase();
            // Audio models are useless for text generation.
            !lowered.contains("whisper") && !lowered.contains("tts")
        })
        .map(|id| ModelInfo {
            id: id.to_string(),
            name: prettify_model_id(id),
        })
        .collect();

    models.sort_by(|left, right| left.name.cmp(&right.name));
    models
}

/// The hub returns a bare array of model records keyed by `modelId`.
/// Only chat-capable models are kept.
fn parse_hub_model_listing(parsed: &Value) -> Vec<ModelInfo> {
    let entries = parsed.as_array().cloned().unwrap_or_default();

    entries
        .iter()
        .filter_map(|entry| {
            entry
                .pointer("/modelId")
                .or_else(|| entry.pointer("/id"))
                .and_then(Value::as_str)
        })
        .filter(|id| {
            let lowered = id.to_lowercase();
            ["instruct", "chat", "it"]
                .iter()
                .any(|marker| lowered.contains(marker))
        })
        .map(|id| ModelInfo {
            id: id.to_string(),
            name: hub_model_name(id),
        })
        .collect()
}

/// Title-case a dashed model id: first letter of every word upper,
/// the rest lower, digits untouched.
fn prettify_model_id(id: &str) -> String {
    let mut pretty = String::with_capacity(id.len());
    let mut previous_is_alpha = false;

    for character in id.chars() {
        let character = if character == '-' { ' ' } else { character };
        if character.is_alphabetic() && !previous_is_alpha {
            pretty.extend(character.to_uppercase());
        } else if character.is_alphabetic() {
            pretty.extend(character.to_lowercase());
        } else {
            pretty.push(character);
        }
        previous_is_alpha = character.is_alphabetic();
    }

    pretty
}

/// Hub ids keep their repo casing; the display name is the final path
/// segment with dashes spaced out.
fn hub_model_name(id: &str) -> String {
    id.rsplit('/')
        .next()
        .unwrap_or(id)
        .replace('-', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    fn hit(filename: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            score: 0.9,
            source_filename: filename.to_string(),
            document_id: "doc-1".to_string(),
        }
    }

    #[test]
    fn prompt_includes_context_with_source_markers() {
        let context = vec![hit("a.txt", "alpha facts"), hit("b.md", "beta facts")];
        let (_, user_prompt) = build_prompt("what is alpha?", &context, &[]);

        assert!(user_prompt.contains("[Source: a.txt]\nalpha facts"));
        assert!(user_prompt.contains("[Source: b.md]\nbeta facts"));
        assert!(user_prompt.contains("Question: what is alpha?"));
        assert!(!user_prompt.contains("Previous conversation:"));
    }

    #[test]
    fn prompt_without_context_says_so() {
        let (_, user_prompt) = build_prompt("anything?", &[], &[]);
        assert!(user_prompt.contains("No documents uploaded yet."));
    }

    #[test]
    fn prompt_keeps_only_the_six_most_recent_messages() {
        let history: Vec<ChatMessage> = (0..10)
            .map(|index| {
                if index % 2 == 0 {
                    ChatMessage::user(format!("question {index}"))
                } else {
                    ChatMessage::assistant(format!("answer {index}"))
                }
            })
            .collect();

        let (_, user_prompt) = build_prompt("next?", &[], &history);
        assert!(!user_prompt.contains("question 2"));
        assert!(user_prompt.contains("User: question 4"));
        assert!(user_prompt.contains("Assistant: answer 9"));
    }

    #[test]
    fn model_listing_filters_audio_models_and_sorts() {
        let parsed = serde_json::json!({
            "data": [
                { "id": "whisper-large-v3" },
                { "id": "mixtral-8x7b-32768" },
                { "id": "gemma2-9b-it" },
                { "id": "playai-tts" },
            ]
        });

        let models = parse_model_listing(&parsed);
        let ids: Vec<&str> = models.iter().map(|model| model.id.as_str()).collect();
        assert_eq!(ids, vec!["gemma2-9b-it", "mixtral-8x7b-32768"]);
        assert_eq!(models[1].name, "Mixtral 8X7B 32768");
    }

    #[test]
    fn hub_listing_keeps_only_chat_capable_models() {
        let parsed = serde_json::json!([
            { "modelId": "meta-llama/Llama-3.2-3B-Instruct" },
            { "modelId": "org/some-base-model" },
            { "modelId": "Qwen/Qwen2.5-7B-Chat" },
        ]);

        let models = parse_hub_model_listing(&parsed);
        let ids: Vec<&str> = models.iter().map(|model| model.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["meta-llama/Llama-3.2-3B-Instruct", "Qwen/Qwen2.5-7B-Chat"]
        );
        assert_eq!(models[0].name, "Llama 3.2 3B Instruct");
    }

    #[test]
    fn model_id_is_title_cased_word_by_word() {
        assert_eq!(
            prettify_model_id("llama-3.3-70b-versatile"),
            "Llama 3.3 70B Versatile"
        );
        assert_eq!(prettify_model_id("gemma2-9b-it"), "Gemma2 9B It");
    }

    #[test]
    fn fallback_names_match_the_live_prettifier() {
        for model in fallback_models() {
            assert_eq!(model.name, prettify_model_id(&model.id));
        }
        for model in huggingface_fallback_models() {
            assert_eq!(model.name, hub_model_name(&model.id));
        }
        assert!(!fallback_models().is_empty());
        assert!(!huggingface_fallback_models().is_empty());
    }

    #[tokio::test]
    async fn generation_without_an_api_key_fails_fast() {
        let provider = OpenAiCompatProvider::new(DEFAULT_ENDPOINT, "", DEFAULT_MODEL);
        let result = provider.generate("system", "user").await;
        assert!(matches!(result, Err(ProviderError::MissingApiKey(_))));

        let provider = HuggingFaceProvider::new("", DEFAULT_HUGGINGFACE_MODEL);
        let result = provider.generate("system", "user").await;
        assert!(matches!(result, Err(ProviderError::MissingApiKey(_))));
    }
}
