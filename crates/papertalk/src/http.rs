//! JSON-over-HTTP calls shared by the embedding and generation providers.
//!
//! # Retry Strategy
//!
//! With `max_retries > 0`, transient errors are retried with exponential
//! backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! With the default `max_retries = 0` every failure is returned as-is.

use std::time::Duration;

/// A configured endpoint for one provider.
pub(crate) struct JsonEndpoint {
    client: reqwest::Client,
    url: String,
    bearer: Option<String>,
    max_retries: u32,
    /// Provider label used in error messages (e.g. `"OpenAI"`).
    label: &'static str,
}

impl JsonEndpoint {
    pub(crate) fn new(
        label: &'static str,
        url: String,
        bearer: Option<String>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url,
            bearer,
            max_retries,
            label,
        })
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// POST `body` and return the parsed JSON response.
    ///
    /// Errors are returned as display strings; callers wrap them in the
    /// pipeline error variant for their stage.
    pub(crate) async fn post(&self, body: &serde_json::Value) -> Result<serde_json::Value, String> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    provider = self.label,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(&self.url)
                .header("Content-Type", "application/json")
                .json(body);
            if let Some(key) = &self.bearer {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<serde_json::Value>().await.map_err(|e| {
                            format!("{} returned an unreadable response: {}", self.label, e)
                        });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = format!("{} API error {}: {}", self.label, status, body_text);

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(format!(
                        "{} connection error (is it reachable at {}?): {}",
                        self.label, self.url, e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| format!("{} request failed after retries", self.label)))
    }
}

/// Delay before retry number `attempt` (1-based).
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

/// Join a base URL and an API path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
