pub mod anthropic;
mod error;
pub mod ollama;
pub mod openai;
mod scan;
mod transport;
mod types;

pub use error::ProviderError;
pub use types::{ChatMessage, Client, Delta, Fragments, StartFuture};

use anthropic::{Anthropic, DEFAULT_CLAUDE_MODEL};
use ollama::Ollama;
use openai::OpenAiCompatible;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Provider selection as resolved from flags, environment and config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// `groq`, `ollama` or `claude` (any case); empty means `groq`.
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Ollama server address.
    pub host: Option<String>,
    /// Replaces the fixed endpoint URL of the cloud providers.
    pub api_base: Option<String>,
}

/// The supported backends. Chosen once by [`build`].
#[derive(Debug, Clone)]
pub enum Backend {
    Groq(OpenAiCompatible),
    Ollama(Ollama),
    Claude(Anthropic),
}

impl Backend {
    /// URL the backend posts to.
    pub fn endpoint(&self) -> String {
        match self {
            Backend::Groq(c) => c.endpoint().to_string(),
            Backend::Ollama(c) => c.chat_url(),
            Backend::Claude(c) => c.endpoint().to_string(),
        }
    }
}

impl Client for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Groq(c) => c.name(),
            Backend::Ollama(c) => c.name(),
            Backend::Claude(c) => c.name(),
        }
    }

    fn model(&self) -> &str {
        match self {
            Backend::Groq(c) => c.model(),
            Backend::Ollama(c) => c.model(),
            Backend::Claude(c) => c.model(),
        }
    }

    fn stream<'a>(
        &'a self,
        cancel: CancellationToken,
        system: &'a str,
        user: &'a str,
    ) -> StartFuture<'a> {
        match self {
            Backend::Groq(c) => c.stream(cancel, system, user),
            Backend::Ollama(c) => c.stream(cancel, system, user),
            Backend::Claude(c) => c.stream(cancel, system, user),
        }
    }
}

/// Build the backend named by `cfg.provider`.
///
/// Fails without touching the network when the name is unknown or a cloud
/// provider has no API key.
pub fn build(http: reqwest::Client, cfg: &ProviderConfig) -> Result<Backend, ProviderError> {
    let model = cfg.model.trim();
    let api_base = cfg.api_base.as_deref().map(str::trim).filter(|s| !s.is_empty());

    match cfg.provider.trim().to_lowercase().as_str() {
        "ollama" => Ok(Backend::Ollama(Ollama::new(
            http,
            cfg.host.clone(),
            model.to_string(),
        ))),
        "groq" | "" => {
            let api_key = require_key(cfg, "groq")?;
            let model = if model.is_empty() { DEFAULT_GROQ_MODEL } else { model };
            let mut c = OpenAiCompatible::new(http, api_key, model.to_string());
            if let Some(base) = api_base {
                c = c.with_endpoint(base);
            }
            Ok(Backend::Groq(c))
        }
        "claude" => {
            let api_key = require_key(cfg, "claude")?;
            let model = if model.is_empty() { DEFAULT_CLAUDE_MODEL } else { model };
            let mut c = Anthropic::new(http, api_key, model.to_string());
            if let Some(base) = api_base {
                c = c.with_endpoint(base);
            }
            Ok(Backend::Claude(c))
        }
        _ => Err(ProviderError::config(format!(
            "unknown ai_provider {:?} (valid: groq, ollama, claude)",
            cfg.provider
        ))),
    }
}

fn require_key(cfg: &ProviderConfig, provider: &str) -> Result<String, ProviderError> {
    match cfg.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(ProviderError::config(format!(
            "api_key is required for {provider} provider"
        ))),
    }
}
