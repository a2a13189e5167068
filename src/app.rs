use crate::{config, provider};
use anyhow::Context;
use futures_core::Stream;
use provider::{Backend, Client};
use std::io::Write;
use tokio_stream::StreamExt;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful terminal assistant. Be concise. Use plain text, no markdown headers.
When relevant, prefer showing commands over explaining them.";

pub fn build_provider(
    http: &reqwest::Client,
    cfg: Option<&config::Config>,
    overrides: config::Overrides,
) -> anyhow::Result<Backend> {
    let pc = config::resolve(cfg, overrides);
    let backend = provider::build(http.clone(), &pc)?;
    tracing::debug!(
        provider = backend.name(),
        model = backend.model(),
        endpoint = %backend.endpoint(),
        "selected provider"
    );
    Ok(backend)
}

/// Piped input goes first, separated from the question by a blank line.
pub fn compose_question(piped: Option<&str>, question: &str) -> String {
    match piped {
        Some(p) if !p.is_empty() => format!("{p}\n\n{question}"),
        _ => question.to_string(),
    }
}

/// Write fragments as they arrive, flushing after each, then end the line.
pub async fn print_stream<S, W>(mut fragments: S, out: &mut W) -> anyhow::Result<()>
where
    S: Stream<Item = String> + Unpin,
    W: Write,
{
    while let Some(chunk) = fragments.next().await {
        out.write_all(chunk.as_bytes()).context("failed to write output")?;
        out.flush().context("failed to flush output")?;
    }
    writeln!(out).context("failed to write output")?;
    Ok(())
}
