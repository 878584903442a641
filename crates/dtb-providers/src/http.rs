//! Shared HTTP plumbing: client construction and retry of transient failures.

use std::{future::Future, time::Duration};

use dtb_core::{errors::Error, utils::sleep_cancellable, Result};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

const MAX_RETRIES: u32 = 2;
const BASE_BACKOFF: Duration = Duration::from_secs(1);

pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::External(format!("http client build error: {e}")))
}

/// Result of one attempt.
pub(crate) enum Failure {
    /// Worth another try (connect error, timeout, 408, 429, 5xx).
    Transient(Error),
    Fatal(Error),
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// 1s, 2s, 4s, ...
pub(crate) fn backoff(retry: u32) -> Duration {
    BASE_BACKOFF * 2u32.saturating_pow(retry)
}

/// Run `op` until it succeeds, fails fatally, or runs out of retries.
/// Cancellation is honoured during each attempt and each backoff.
pub(crate) async fn retry<T, F, Fut>(
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, Failure>>,
{
    let mut retries = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            out = op() => out,
        };

        match outcome {
            Ok(v) => return Ok(v),
            Err(Failure::Fatal(e)) => return Err(e),
            Err(Failure::Transient(e)) if retries < MAX_RETRIES => {
                let delay = backoff(retries);
                retries += 1;
                tracing::warn!(
                    request = label,
                    error = %e,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying"
                );
                sleep_cancellable(cancel, delay).await?;
            }
            Err(Failure::Transient(e)) => return Err(e),
        }
    }
}

/// Send the request built by `build`, retrying transient failures.
/// Non-success statuses become errors carrying a snippet of the body.
pub(crate) async fn send(
    cancel: &CancellationToken,
    label: &str,
    build: impl Fn() -> reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    retry(cancel, label, || {
        let request = build();
        async move {
            let resp = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    let err = Error::External(format!("{label} request error: {e}"));
                    return Err(if e.is_connect() || e.is_timeout() {
                        Failure::Transient(err)
                    } else {
                        Failure::Fatal(err)
                    });
                }
            };

            let status = resp.status();
            if status.is_success() {
                return Ok(resp);
            }

            let body = resp.text().await.unwrap_or_default();
            let err = Error::External(format!(
                "{label} returned unsuccessful status code {status}: {}",
                body.chars().take(200).collect::<String>()
            ));
            Err(if is_transient_status(status) {
                Failure::Transient(err)
            } else {
                Failure::Fatal(err)
            })
        }
    })
    .await
}
