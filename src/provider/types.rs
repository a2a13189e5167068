use super::ProviderError;
use futures_core::Stream;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Pending fragments a producer may queue before it waits on the consumer.
pub const FRAGMENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// OpenAI-style message object, also accepted by Ollama and Anthropic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Result of decoding one frame of a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// A non-empty fragment to emit.
    Text(String),
    /// Emit this fragment, then end the stream.
    Final(String),
    /// End the stream now.
    Terminal,
    /// Nothing to emit: malformed frame, uninteresting event or empty content.
    Skip,
}

impl Delta {
    /// Wraps `text` as a fragment, or `Skip` when it is empty.
    pub fn text(text: String) -> Self {
        if text.is_empty() {
            Delta::Skip
        } else {
            Delta::Text(text)
        }
    }
}

/// Text fragments of one call, in arrival order.
///
/// The stream ends when the remote side signals completion, when the
/// connection closes, or as soon as the call's cancellation token fires.
/// Fragments still buffered at cancellation are discarded.
#[derive(Debug)]
pub struct Fragments {
    rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
}

impl Fragments {
    pub(crate) fn channel(cancel: CancellationToken) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        (tx, Self { rx, cancel })
    }
}

impl Stream for Fragments {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        if self.cancel.is_cancelled() {
            self.rx.close();
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

pub type StartFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Fragments, ProviderError>> + Send + 'a>>;

/// Client interface every caller depends on.
///
/// `stream` resolves once the remote service has accepted the request. Startup
/// failures come back as the error; anything that goes wrong after that only
/// ends the returned stream early.
pub trait Client {
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    /// Send a single system + user exchange and stream the reply.
    fn stream<'a>(
        &'a self,
        cancel: CancellationToken,
        system: &'a str,
        user: &'a str,
    ) -> StartFuture<'a>;
}
