/// Failures visible to the caller of [`Client::stream`](super::Client::stream).
///
/// All of these happen before any fragment is produced. Problems after the
/// stream has started only end it early.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider selection or credentials are unusable; no request was made.
    #[error("{0}")]
    Config(String),

    /// The request could not be built or the connection failed.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with an HTTP error status.
    #[error("server returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// The call was cancelled before the service answered.
    #[error("request cancelled")]
    Cancelled,
}

impl ProviderError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
