//! Page loading abstraction.
//!
//! `RenderClient` hides whether a page is fetched with a plain HTTP GET or
//! rendered in headless Chromium. Pipeline stages only see `LoadedPage`.

pub mod chromium;
pub mod network;
pub mod static_client;

use crate::config::{ExtractConfig, RenderMode};
use crate::error::Result;
use crate::hydration::HydrationOutcome;
use async_trait::async_trait;
use serde_json::Value;

/// Desktop Chrome UA used when nothing else is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";

/// Outcome of loading one locator.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub requested_url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// Raw body (static) or rendered document HTML (rendered).
    pub body: String,
    /// JSON captured from background calls, in arrival order.
    pub payloads: Vec<Value>,
    pub hydration: HydrationOutcome,
}

impl LoadedPage {
    /// Whether the body itself is a JSON document.
    pub fn is_json(&self) -> bool {
        if let Some(ct) = &self.content_type {
            if ct.to_ascii_lowercase().contains("json") {
                return true;
            }
        }
        matches!(self.body.trim_start().chars().next(), Some('{') | Some('['))
    }

    /// Parse the body as JSON when it is one.
    pub fn json_body(&self) -> Option<Value> {
        if !self.is_json() {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }
}

/// Browser fingerprint presented by rendered mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
    pub viewport: (u32, u32),
    /// Apply automation-detection countermeasures.
    pub stealth: bool,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport: (1366, 768),
            stealth: true,
        }
    }
}

/// A page loader holding at most one browsing session.
///
/// Implementations are driven by a single logical flow and are never
/// shared across concurrent navigations.
#[async_trait]
pub trait RenderClient: Send {
    /// Load a locator and wait until its content is ready.
    async fn load(&mut self, url: &str) -> Result<LoadedPage>;
    /// Release the session and any open page handles.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Build the client selected by `cfg.mode`.
pub async fn connect(cfg: &ExtractConfig) -> Result<Box<dyn RenderClient>> {
    match cfg.mode {
        RenderMode::Static => Ok(Box::new(static_client::StaticClient::new(
            cfg.timeouts.navigation,
            &cfg.identity.user_agent,
        )?)),
        RenderMode::Rendered => {
            let options = chromium::ChromiumOptions::from_config(cfg)?;
            Ok(Box::new(chromium::ChromiumClient::launch(options).await?))
        }
    }
}
