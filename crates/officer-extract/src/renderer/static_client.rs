//! Static page loading over plain HTTP.
//!
//! A single GET with no script execution, so it is blind to anything the target
//! assembles client-side.

use super::{LoadedPage, RenderClient};
use crate::error::{ExtractError, Result};
use crate::hydration::HydrationOutcome;
use async_trait::async_trait;
use std::time::Duration;

/// HTTP client used in static mode.
#[derive(Clone)]
pub struct StaticClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl StaticClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .build()
            .map_err(|e| ExtractError::Transport {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, timeout })
    }

    /// Perform a single GET. Non-2xx statuses are errors.
    pub async fn get(&self, url: &str) -> Result<LoadedPage> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(ExtractError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = resp.text().await.map_err(|e| self.classify(url, e))?;

        Ok(LoadedPage {
            requested_url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            body,
            payloads: Vec::new(),
            hydration: HydrationOutcome::NotChecked,
        })
    }

    fn classify(&self, url: &str, e: reqwest::Error) -> ExtractError {
        if e.is_timeout() {
            ExtractError::Timeout {
                url: url.to_string(),
                after_ms: self.timeout.as_millis() as u64,
            }
        } else {
            ExtractError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl RenderClient for StaticClient {
    async fn load(&mut self, url: &str) -> Result<LoadedPage> {
        self.get(url).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
