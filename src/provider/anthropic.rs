//! Anthropic Messages API client.
//!
//! Unlike OpenAI-style streams, every data line is preceded by an
//! `event: <type>` line. Text arrives on `content_block_delta` events and the
//! stream ends with `message_stop`; there is no `[DONE]` sentinel.

use super::scan::{spawn_pump, EventProtocol, EventStream};
use super::{transport, ChatMessage, Client, Delta, StartFuture};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-6";
pub const MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone)]
pub struct Anthropic {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl Anthropic {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
            endpoint: MESSAGES_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Client for Anthropic {
    fn name(&self) -> &'static str {
        "claude"
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
            let body = MessagesRequest {
                model: &self.model,
                max_tokens: MAX_TOKENS,
                system,
                messages: vec![ChatMessage::user(user)],
                stream: true,
            };
            let headers = [
                ("x-api-key", self.api_key.clone()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ];

            let resp = transport::post(&self.http, &self.endpoint, &headers, &body, &cancel).await?;
            Ok(spawn_pump(
                resp.bytes_stream(),
                EventStream::new(MessageEvents),
                cancel,
            ))
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    delta: BlockDelta,
}

#[derive(Debug, Deserialize)]
struct BlockDelta {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug)]
struct MessageEvents;

impl EventProtocol for MessageEvents {
    const SENTINEL: Option<&'static str> = None;

    fn on_event(&self, event: &str) -> Delta {
        if event == "message_stop" {
            Delta::Terminal
        } else {
            Delta::Skip
        }
    }

    fn on_data(&self, event: Option<&str>, payload: &str) -> Delta {
        if event != Some("content_block_delta") {
            return Delta::Skip;
        }
        match serde_json::from_str::<ContentBlockDelta>(payload) {
            Ok(d) if d.delta.kind == "text_delta" => Delta::text(d.delta.text),
            Ok(_) => Delta::Skip,
            Err(e) => {
                tracing::trace!(error = %e, "skipping malformed content_block_delta");
                Delta::Skip
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use tokio_stream::StreamExt;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> Anthropic {
        Anthropic::new(reqwest::Client::new(), "sk-ant-test".into(), "claude-test".into())
            .with_endpoint(format!("{}/v1/messages", server.uri()))
    }

    async fn mount_sse(server: &MockServer, body: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream"),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn only_text_deltas_produce_text() {
        let p = MessageEvents;
        let text =
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Yo"}}"#;
        assert_eq!(
            p.on_data(Some("content_block_delta"), text),
            Delta::Text("Yo".into())
        );
        assert_eq!(p.on_data(Some("message_start"), text), Delta::Skip);
        assert_eq!(p.on_data(None, text), Delta::Skip);
        assert_eq!(
            p.on_data(
                Some("content_block_delta"),
                r#"{"delta":{"type":"input_json_delta","partial_json":"{"}}"#
            ),
            Delta::Skip
        );
        assert_eq!(p.on_data(Some("content_block_delta"), "nope"), Delta::Skip);
        assert_eq!(p.on_event("message_stop"), Delta::Terminal);
        assert_eq!(p.on_event("ping"), Delta::Skip);
    }

    #[tokio::test]
    async fn sends_version_headers_and_separate_system() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_json(serde_json::json!({
                "model": "claude-test",
                "max_tokens": 8192,
                "system": "sys",
                "messages": [{"role": "user", "content": "question"}],
                "stream": true,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
                "text/event-stream",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let got: Vec<String> = client(&server)
            .stream(CancellationToken::new(), "sys", "question")
            .await
            .unwrap()
            .collect()
            .await;
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn streams_text_until_message_stop() {
        let server = MockServer::start().await;
        mount_sse(
            &server,
            concat!(
                "event: message_start\n",
                "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\n",
                "event: ping\n\n",
                "event: content_block_delta\n",
                "data: {\"delta\":{\"type\":\"text_delta\",\"text\":\"Yo\"}}\n\n",
                "event: content_block_delta\n",
                "data: {broken\n\n",
                "event: content_block_delta\n",
                "data: {\"delta\":{\"type\":\"text_delta\",\"text\":\"!\"}}\n\n",
                "event: message_stop\n",
                "event: content_block_delta\n",
                "data: {\"delta\":{\"type\":\"text_delta\",\"text\":\"late\"}}\n\n",
            ),
        )
        .await;

        let got: Vec<String> = client(&server)
            .stream(CancellationToken::new(), "s", "u")
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(got, vec!["Yo", "!"]);
    }

    #[tokio::test]
    async fn server_error_is_reported_at_startup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("server error"))
            .mount(&server)
            .await;

        let err = client(&server)
            .stream(CancellationToken::new(), "s", "u")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ProviderError::Remote { status: 500, .. }));
        assert!(msg.contains("500") && msg.contains("server error"), "{msg}");
    }

    #[tokio::test]
    async fn cancelling_before_draining_yields_nothing() {
        let server = MockServer::start().await;
        mount_sse(
            &server,
            concat!(
                "event: content_block_delta\n",
                "data: {\"delta\":{\"type\":\"text_delta\",\"text\":\"Yo\"}}\n\n",
            ),
        )
        .await;

        let cancel = CancellationToken::new();
        let frags = client(&server).stream(cancel.clone(), "s", "u").await.unwrap();
        cancel.cancel();

        let got: Vec<String> = frags.collect().await;
        assert!(got.is_empty());
    }
}
