use super::scan::{spawn_pump, LineDecoder};
use super::{transport, ChatMessage, Client, Delta, StartFuture};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct Ollama {
    http: reqwest::Client,
    host: String,
    model: String,
}

impl Ollama {
    /// A blank `host` falls back to [`DEFAULT_OLLAMA_HOST`].
    pub fn new(http: reqwest::Client, host: Option<String>, model: String) -> Self {
        let host = host
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());
        Self { http, host, model }
    }

    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.host.trim_end_matches('/'))
    }
}

impl Client for Ollama {
    fn name(&self) -> &'static str {
        "ollama"
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
            let body = ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
                stream: true,
            };

            let resp = transport::post(&self.http, &self.chat_url(), &[], &body, &cancel).await?;
            // Ollama streams newline-delimited JSON rather than SSE.
            Ok(spawn_pump(resp.bytes_stream(), ChatLines, cancel))
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponseLine {
    #[serde(default)]
    message: Option<LineMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct LineMessage {
    #[serde(default)]
    content: String,
}

/// One JSON object per line; `done: true` closes the stream.
#[derive(Debug)]
struct ChatLines;

impl LineDecoder for ChatLines {
    fn decode(&mut self, line: &str) -> Delta {
        let line = line.trim();
        if line.is_empty() {
            return Delta::Skip;
        }
        let parsed: ChatResponseLine = match serde_json::from_str(line) {
            Ok(p) => p,
            Err(e) => {
                tracing::trace!(error = %e, "skipping malformed line");
                return Delta::Skip;
            }
        };
        let text = parsed.message.map(|m| m.content).unwrap_or_default();
        match (parsed.done, text.is_empty()) {
            (true, true) => Delta::Terminal,
            (true, false) => Delta::Final(text),
            (false, _) => Delta::text(text),
        }
    }
}
