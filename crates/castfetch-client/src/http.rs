//! Retrying HTTP transport shared by every CDN/patch-service request.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use reqwest::Response;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const INITIAL_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 10_000;
const BACKOFF_MULTIPLIER: f64 = 2.0;
const JITTER_FACTOR: f64 = 0.1;

pub struct Transport {
    client: reqwest::Client,
    max_retries: u32,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap,
        clippy::unused_self
    )]
    fn backoff(&self, attempt: u32) -> Duration {
        let base = INITIAL_BACKOFF_MS as f64 * BACKOFF_MULTIPLIER.powi(attempt as i32);
        let capped = base.min(MAX_BACKOFF_MS as f64);
        let jitter_range = capped * JITTER_FACTOR;
        let jitter = rand::random::<f64>() * 2.0 * jitter_range - jitter_range;
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }

    /// GET `url`, retrying transient failures (connect/timeout errors and
    /// 5xx responses) with exponential backoff and jitter. 4xx responses are
    /// not retried.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let mut last_status = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let wait = self.backoff(attempt - 1);
                debug!(url, attempt, ?wait, "retrying request");
                sleep(wait).await;
            }

            match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status().is_server_error() && attempt < self.max_retries => {
                    warn!(url, status = %resp.status(), "server error, will retry");
                    last_status = Some(resp.status().as_u16());
                }
                Ok(resp) => {
                    return Err(Error::FetchFailed {
                        url: url.to_owned(),
                        status: Some(resp.status().as_u16()),
                    });
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    warn!(url, error = %e, "transient error, will retry");
                }
                Err(e) if e.is_timeout() => return Err(Error::FetchTimeout { url: url.to_owned() }),
                Err(e) => return Err(Error::Http(e)),
            }
        }
        Err(Error::FetchFailed {
            url: url.to_owned(),
            status: last_status,
        })
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.get(url).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.get(url).await?;
        Ok(resp.text().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let transport = Transport {
            client: reqwest::Client::new(),
            max_retries: 5,
        };
        // With jitter disabled we'd expect 100, 200, 400... but jitter is
        // always on here, so just check monotonic growth bounds.
        let b0 = transport.backoff(0);
        let b5 = transport.backoff(5);
        assert!(b0.as_millis() <= 130);
        assert!(b5.as_millis() <= u128::from(MAX_BACKOFF_MS) + (u128::from(MAX_BACKOFF_MS) / 10) + 1);
    }
}
