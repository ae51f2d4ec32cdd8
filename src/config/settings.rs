use anyhow::Result;
use std::env;
use std::path::PathBuf;

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Anthropic,
    OpenAi,
}

/// One configured LLM backend. The ordered list is assembled here once at
/// startup and passed into the failover router; nothing downstream reads
/// the environment.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug)]
pub struct Settings {
    pub database_url: String,
    pub usage_dir: PathBuf,
    pub backends: Vec<BackendSettings>,
}

impl Settings {
    pub fn new() -> Result<Self> {
        // .env from the working directory, if present
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;

        let usage_dir = PathBuf::from(env::var("USAGE_DIR").unwrap_or_else(|_| "usage".to_string()));

        let mut backends = Vec::new();
        if let Ok(api_key) = env::var("ANTHROPIC_API_KEY") {
            if !api_key.is_empty() {
                backends.push(BackendSettings {
                    kind: BackendKind::Anthropic,
                    model: env::var("ANTHROPIC_MODEL")
                        .unwrap_or_else(|_| DEFAULT_ANTHROPIC_MODEL.to_string()),
                    base_url: String::new(),
                    api_key,
                });
            }
        }
        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            if !api_key.is_empty() {
                backends.push(BackendSettings {
                    kind: BackendKind::OpenAi,
                    model: env::var("OPENAI_MODEL")
                        .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
                    base_url: env::var("OPENAI_BASE_URL")
                        .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string()),
                    api_key,
                });
            }
        }

        // LLM_PRIMARY=openai promotes the OpenAI-compatible backend to the
        // front of the failover order
        if env::var("LLM_PRIMARY").as_deref() == Ok("openai") {
            backends.sort_by_key(|b| b.kind != BackendKind::OpenAi);
        }

        if backends.is_empty() {
            log::warn!("no LLM API keys configured; categorization will always return null");
        }

        Ok(Self {
            database_url,
            usage_dir,
            backends,
        })
    }
}
