use super::ProviderError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Send a JSON POST and hand back the open response.
///
/// Statuses >= 400 are read to completion and turned into
/// [`ProviderError::Remote`]; the caller only ever sees a live body.
pub(crate) async fn post<B: Serialize + ?Sized>(
    http: &reqwest::Client,
    url: &str,
    headers: &[(&'static str, String)],
    body: &B,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, ProviderError> {
    let mut req = http.post(url).json(body);
    for (name, value) in headers {
        req = req.header(*name, value.as_str());
    }

    tracing::debug!(%url, "starting streaming request");

    let sent = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        sent = req.send() => sent,
    };
    let resp = sent.map_err(|source| ProviderError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = resp.status();
    if status.as_u16() >= 400 {
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(%url, %status, "request rejected");
        return Err(ProviderError::Remote {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}
