use super::scan::{spawn_pump, EventProtocol, EventStream};
use super::{transport, ChatMessage, Client, Delta, StartFuture};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Client for OpenAI-compatible chat completion APIs (Groq by default).
#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiCompatible {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
            endpoint: GROQ_CHAT_URL.to_string(),
        }
    }

    /// Point the client at another OpenAI-compatible chat completions URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Client for OpenAiCompatible {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn stream<'a>(
        &'a self,
        cancel: CancellationToken,
        system: &'a str,
        user: &'a str,
    ) -> StartFuture<'a> {
        Box::pin(async move {
            let body = ChatCompletionRequest {
                model: &self.model,
                messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
                stream: true,
            };
            let headers = [("authorization", format!("Bearer {}", self.api_key))];

            let resp = transport::post(&self.http, &self.endpoint, &headers, &body, &cancel).await?;
            Ok(spawn_pump(
                resp.bytes_stream(),
                EventStream::new(ChatCompletionChunks),
                cancel,
            ))
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: ChoiceDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceDelta {
    #[serde(default)]
    content: Option<String>,
}

/// `data: {"choices":[...]}` frames terminated by `data: [DONE]`.
#[derive(Debug)]
struct ChatCompletionChunks;

impl EventProtocol for ChatCompletionChunks {
    const SENTINEL: Option<&'static str> = Some("[DONE]");

    fn on_data(&self, _event: Option<&str>, payload: &str) -> Delta {
        let chunk: ChatCompletionChunk = match serde_json::from_str(payload) {
            Ok(c) => c,
            Err(e) => {
                tracing::trace!(error = %e, "skipping malformed chunk");
                return Delta::Skip;
            }
        };
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Delta::Skip;
        };
        if choice.finish_reason.as_deref() == Some("stop") {
            return Delta::Terminal;
        }
        Delta::text(choice.delta.content.unwrap_or_default())
    }
}
