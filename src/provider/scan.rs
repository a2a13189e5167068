//! Line-oriented decoding of streaming response bodies.
//!
//! A [`LineBuffer`] turns arbitrary body chunks into complete lines, a
//! [`LineDecoder`] turns each line into a [`Delta`], and [`spawn_pump`] runs
//! the two on a producer task that feeds a [`Fragments`] stream.
//!
//! Event-stream bodies go through [`EventStream`], which pairs the
//! [`SseScanner`] state machine with a protocol's [`EventProtocol`] rules.

use super::{Delta, Fragments};
use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Longest line accepted from a response body, terminator excluded.
pub(crate) const MAX_LINE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
#[error("response line exceeds {} bytes", MAX_LINE)]
pub(crate) struct LineTooLong;

/// Accumulates body chunks and yields complete lines without their `\n` /
/// `\r\n` terminator.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
    // Bytes before this offset are known to hold no newline.
    scanned: usize,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, LineTooLong> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        let mut start = 0;

        while let Some(off) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + off;
            let line = trim_cr(&self.buf[start..end]);
            if line.len() > MAX_LINE {
                return Err(LineTooLong);
            }
            out.extend(utf8_line(line));
            start = end + 1;
            self.scanned = start;
        }

        self.buf.drain(..start);
        self.scanned = self.buf.len();
        if self.buf.len() > MAX_LINE + 1 {
            return Err(LineTooLong);
        }
        Ok(out)
    }

    /// Flush whatever is left once the body has ended.
    pub(crate) fn finish(&mut self) -> Result<Option<String>, LineTooLong> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        let line = trim_cr(&rest);
        if line.len() > MAX_LINE {
            return Err(LineTooLong);
        }
        if line.is_empty() {
            return Ok(None);
        }
        Ok(utf8_line(line))
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn utf8_line(line: &[u8]) -> Option<String> {
    match std::str::from_utf8(line) {
        Ok(s) => Some(s.to_string()),
        Err(e) => {
            tracing::trace!(error = %e, "dropping non UTF-8 line");
            None
        }
    }
}

/// One classified event-stream line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseLine<'a> {
    /// An `event:` line; the scanner now reports this type for later data.
    Event(&'a str),
    /// A non-empty `data:` payload and the event type in effect for it.
    Data {
        event: Option<&'a str>,
        payload: &'a str,
    },
}

/// Event-stream line classifier carrying the current event type.
#[derive(Debug, Default)]
pub(crate) struct SseScanner {
    event: Option<String>,
}

impl SseScanner {
    /// Classify `line`, updating the current event type on `event:` lines.
    ///
    /// Blank lines, comments, `id:`/`retry:` fields and empty payloads give
    /// `None`.
    pub(crate) fn classify<'a>(&'a mut self, line: &'a str) -> Option<SseLine<'a>> {
        if let Some(rest) = line.strip_prefix("event:") {
            let name = rest.trim();
            self.event = Some(name.to_string());
            return Some(SseLine::Event(name));
        }

        let payload = line.strip_prefix("data:")?.trim();
        if payload.is_empty() {
            return None;
        }
        Some(SseLine::Data {
            event: self.event.as_deref(),
            payload,
        })
    }
}

/// Turns one line of a response body into a [`Delta`].
pub(crate) trait LineDecoder: Send + 'static {
    fn decode(&mut self, line: &str) -> Delta;
}

/// Protocol rules for an event-stream body.
pub(crate) trait EventProtocol: Send + 'static {
    /// Literal `data:` payload that ends the stream, if the protocol has one.
    const SENTINEL: Option<&'static str>;

    /// Called for every `event:` line.
    fn on_event(&self, _event: &str) -> Delta {
        Delta::Skip
    }

    /// Called for every `data:` payload other than the sentinel.
    fn on_data(&self, event: Option<&str>, payload: &str) -> Delta;
}

/// Event-stream decoder: [`SseScanner`] state plus a protocol.
#[derive(Debug)]
pub(crate) struct EventStream<P> {
    scanner: SseScanner,
    protocol: P,
}

impl<P: EventProtocol> EventStream<P> {
    pub(crate) fn new(protocol: P) -> Self {
        Self {
            scanner: SseScanner::default(),
            protocol,
        }
    }
}

impl<P: EventProtocol> LineDecoder for EventStream<P> {
    fn decode(&mut self, line: &str) -> Delta {
        match self.scanner.classify(line) {
            None => Delta::Skip,
            Some(SseLine::Event(event)) => self.protocol.on_event(event),
            Some(SseLine::Data { payload, .. }) if P::SENTINEL == Some(payload) => {
                Delta::Terminal
            }
            Some(SseLine::Data { event, payload }) => self.protocol.on_data(event, payload),
        }
    }
}

/// Spawn the producer task for one call and return its fragment stream.
///
/// The task owns `body`; it is dropped, releasing the connection, whenever
/// the task returns.
pub(crate) fn spawn_pump<S, B, E, D>(body: S, decoder: D, cancel: CancellationToken) -> Fragments
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    D: LineDecoder,
{
    let (tx, fragments) = Fragments::channel(cancel.clone());
    tokio::spawn(async move {
        let reason = pump(body, decoder, &tx, &cancel).await;
        tracing::debug!(reason, "response stream finished");
    });
    fragments
}

async fn pump<S, B, E, D>(
    body: S,
    mut decoder: D,
    tx: &mpsc::Sender<String>,
    cancel: &CancellationToken,
) -> &'static str
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    D: LineDecoder,
{
    let mut body = std::pin::pin!(body);
    let mut lines = LineBuffer::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return "cancelled",
            _ = tx.closed() => return "consumer dropped",
            next = body.next() => next,
        };

        let (batch, eof) = match next {
            Some(Ok(chunk)) => (lines.push(chunk.as_ref()), false),
            Some(Err(e)) => {
                tracing::debug!(error = %e, "response body read failed");
                return "read error";
            }
            None => (lines.finish().map(|l| l.into_iter().collect()), true),
        };
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                tracing::debug!(error = %e, "response body framing failed");
                return "line too long";
            }
        };

        for line in batch {
            if cancel.is_cancelled() {
                return "cancelled";
            }
            let (text, last) = match decoder.decode(&line) {
                Delta::Skip => continue,
                Delta::Terminal => return "terminal frame",
                Delta::Text(text) => (text, false),
                Delta::Final(text) => (text, true),
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return "cancelled",
                sent = tx.send(text) => {
                    if sent.is_err() {
                        return "consumer dropped";
                    }
                }
            }
            if last {
                return "terminal frame";
            }
        }

        if eof {
            return "end of body";
        }
    }
}
