use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use doc_chat_core::{
    chunk_text, discover_supported_files, generate_answer, load_document, AnswerProvider,
    ChunkingConfig, Corpus, CorpusOptions, HashEmbedder, HuggingFaceProvider,
    OpenAiCompatProvider, SessionRegistry, DEFAULT_ENDPOINT, DEFAULT_HUGGINGFACE_MODEL,
    DEFAULT_MODEL,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SESSION_TTL_MINUTES: i64 = 30;

/// Answer-generation backends the CLI knows how to talk to.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderKind {
    Groq,
    Huggingface,
}

impl ProviderKind {
    fn default_model(self) -> &'static str {
        match self {
            Self::Groq => DEFAULT_MODEL,
            Self::Huggingface => DEFAULT_HUGGINGFACE_MODEL,
        }
    }

    fn env_key(self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::Huggingface => "HF_API_KEY",
        }
    }

    fn build(
        self,
        endpoint: Option<String>,
        api_key: String,
        model: String,
    ) -> Box<dyn AnswerProvider> {
        match self {
            Self::Groq => Box::new(OpenAiCompatProvider::new(
                endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                api_key,
                model,
            )),
            Self::Huggingface => Box::new(HuggingFaceProvider::new(api_key, model)),
        }
    }
}

fn resolve_api_key(kind: ProviderKind, flag: Option<String>) -> String {
    flag.or_else(|| std::env::var(kind.env_key()).ok())
        .unwrap_or_default()
}

#[derive(Parser)]
#[command(name = "doc-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Target size of each chunk, in characters.
    #[arg(long, default_value = "500")]
    chunk_size: usize,

    /// Overlapping characters between consecutive chunks.
    #[arg(long, default_value = "50")]
    overlap: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Load documents, ask one question, print the ranked spans.
    Ask {
        /// Files or folders to load (folders are walked recursively).
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,
        /// The question to ask.
        #[arg(long)]
        question: String,
        /// Number of spans to retrieve.
        #[arg(long, default_value = "3")]
        top_k: usize,
        /// Also generate an answer through the chat-completions endpoint.
        #[arg(long, default_value_t = false)]
        answer: bool,
        /// Answer-generation backend.
        #[arg(long, value_enum, default_value_t = ProviderKind::Groq)]
        provider: ProviderKind,
        /// Model id for answer generation; defaults per provider.
        #[arg(long)]
        model: Option<String>,
        /// OpenAI-compatible endpoint base URL (groq provider only).
        #[arg(long)]
        endpoint: Option<String>,
        /// API key; falls back to GROQ_API_KEY or HF_API_KEY.
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Interactive question loop over the loaded documents.
    Chat {
        /// Files or folders to load (folders are walked recursively).
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,
        /// Number of spans to retrieve per question.
        #[arg(long, default_value = "3")]
        top_k: usize,
        /// Answer-generation backend.
        #[arg(long, value_enum, default_value_t = ProviderKind::Groq)]
        provider: ProviderKind,
        /// Model id for answer generation; defaults per provider.
        #[arg(long)]
        model: Option<String>,
        /// OpenAI-compatible endpoint base URL (groq provider only).
        #[arg(long)]
        endpoint: Option<String>,
        /// API key; falls back to GROQ_API_KEY or HF_API_KEY. Without
        /// one, only retrieved spans are shown.
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Print the chunks a single file produces.
    Inspect {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let chunking = ChunkingConfig::new(cli.chunk_size, cli.overlap)?;
    let options = CorpusOptions {
        chunking,
        embed_timeout: Some(std::time::Duration::from_secs(30)),
    };

    info!(started_at = %Utc::now().to_rfc3339(), "doc-chat boot");

    match cli.command {
        Command::Ask {
            files,
            question,
            top_k,
            answer,
            provider,
            model,
            endpoint,
            api_key,
        } => {
            let mut corpus = Corpus::new(Arc::new(HashEmbedder::default()), options);
            load_into_corpus(&mut corpus, &files).await?;

            let hits = corpus.query(&question, top_k).await?;
            if hits.is_empty() {
                println!("no matching spans found");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "[{}] score={:.4} source={}",
                    rank + 1,
                    hit.score,
                    hit.source_filename
                );
                println!("{}\n", hit.text);
            }

            if answer {
                let api_key = resolve_api_key(provider, api_key);
                let model = model.unwrap_or_else(|| provider.default_model().to_string());
                let backend = provider.build(endpoint, api_key, model);
                let generated = generate_answer(backend.as_ref(), &question, &hits, &[]).await?;
                println!("answer:\n{generated}");
            }
        }
        Command::Chat {
            files,
            top_k,
            provider,
            model,
            endpoint,
            api_key,
        } => {
            let registry = SessionRegistry::new(
                Arc::new(HashEmbedder::default()),
                options,
                Duration::minutes(SESSION_TTL_MINUTES),
            );
            let session_key = uuid::Uuid::new_v4().to_string();
            let session = registry.get_or_create(&session_key);

            {
                let mut corpus = session.corpus().write().await;
                load_into_corpus(&mut corpus, &files).await?;
            }

            let api_key = resolve_api_key(provider, api_key);
            let backend = if api_key.is_empty() {
                warn!("no api key configured; showing retrieved spans only");
                None
            } else {
                let model = model.unwrap_or_else(|| provider.default_model().to_string());
                Some(provider.build(endpoint, api_key, model))
            };

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut stdout = tokio::io::stdout();

            loop {
                stdout.write_all(b"you> ").await?;
                stdout.flush().await?;

                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let question = line.trim();
                if question.is_empty() || question == "exit" {
                    break;
                }

                session.touch();
                let hits = {
                    let corpus = session.corpus().read().await;
                    corpus.query(question, top_k).await?
                };

                for hit in &hits {
                    println!("  [{}] score={:.4}", hit.source_filename, hit.score);
                }

                match &backend {
                    Some(backend) => {
                        let history = session.history();
                        match generate_answer(backend.as_ref(), question, &hits, &history).await {
                            Ok(generated) => {
                                println!("assistant> {generated}");
                                session.record_exchange(question, generated);
                            }
                            Err(error) => warn!(%error, "answer generation failed"),
                        }
                    }
                    None => {
                        for hit in &hits {
                            println!("{}\n", hit.text);
                        }
                    }
                }
            }

            registry.end(&session_key);
        }
        Command::Inspect { file } => {
            let document = load_document(&file)?;
            let chunks = chunk_text(&document.text, &chunking)?;
            println!(
                "{} ({}): {} chunks",
                document.filename,
                document.type_tag,
                chunks.len()
            );
            for (index, chunk) in chunks.iter().enumerate() {
                println!("--- chunk {} ({} chars)", index, chunk.chars().count());
                println!("{chunk}");
            }
        }
    }

    Ok(())
}

async fn load_into_corpus(corpus: &mut Corpus, files: &[PathBuf]) -> anyhow::Result<()> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for file in files {
        if file.is_dir() {
            paths.extend(discover_supported_files(file));
        } else {
            paths.push(file.clone());
        }
    }

    if paths.is_empty() {
        anyhow::bail!("no supported documents found");
    }

    for path in &paths {
        match load_one(corpus, path).await {
            Ok(()) => {}
            Err(error) => warn!(path = %path.display(), %error, "skipped document"),
        }
    }

    if corpus.is_empty() {
        anyhow::bail!("no documents could be loaded");
    }

    info!(
        documents = corpus.document_count(),
        chunks = corpus.chunk_count(),
        "corpus ready"
    );
    Ok(())
}

async fn load_one(corpus: &mut Corpus, path: &Path) -> anyhow::Result<()> {
    let document = load_document(path)?;
    info!(filename = %document.filename, type_tag = %document.type_tag, "loaded document");
    corpus
        .add_document(
            document.id,
            document.filename,
            document.type_tag,
            document.text,
        )
        .await?;
    Ok(())
}
