//! Rendered page loading through headless Chromium (chromiumoxide).
//!
//! One browser and one tab are reused for every load. Each load subscribes
//! to CDP network events before navigating; the subscription feeds both the
//! quiescence tracker and the response tap, and is torn down when the load
//! returns.

use super::network::NetworkLog;
use super::{ClientIdentity, LoadedPage, RenderClient};
use crate::config::ExtractConfig;
use crate::error::{ExtractError, Result};
use crate::hydration::{self, HydrationOutcome, HydrationTarget, RELOAD_CONTROL_TEXT};
use crate::tap::{self, ObservedResponse, ResponseTap};
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, RequestId, ResourceType,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Hides the most common automation tells before any page script runs.
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(Navigator.prototype, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
window.chrome = window.chrome || { runtime: {} };
"#;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. OFFICER_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("OFFICER_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common install locations
    let mut candidates = Vec::new();
    if cfg!(target_os = "macos") {
        candidates.push(PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ));
        candidates.push(PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".cache/officer-extract/chromium/chrome-linux64/chrome"));
    }
    candidates.into_iter().find(|c| c.exists())
}

/// Settings for rendered loads.
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub navigation_timeout: Duration,
    pub settle_idle: Duration,
    pub settle_timeout: Duration,
    pub identity: ClientIdentity,
    pub tap_pattern: String,
    pub content_selector: Option<String>,
    pub stall_marker: String,
    pub executable: Option<PathBuf>,
}

impl ChromiumOptions {
    pub fn from_config(cfg: &ExtractConfig) -> Result<Self> {
        // fail before launching anything if the tap pattern is unusable
        ResponseTap::new(&cfg.tap_pattern)
            .map_err(|e| ExtractError::Browser(format!("invalid tap pattern: {e}")))?;

        Ok(Self {
            navigation_timeout: cfg.timeouts.navigation,
            settle_idle: cfg.timeouts.settle_idle,
            settle_timeout: cfg.timeouts.settle_timeout,
            identity: cfg.identity.clone(),
            tap_pattern: cfg.tap_pattern.clone(),
            content_selector: cfg.content_selector.clone(),
            stall_marker: cfg.stall_marker.clone(),
            executable: None,
        })
    }
}

/// Network observations for one in-flight load.
struct LoadState {
    network: NetworkLog,
    tap: ResponseTap,
}

type SharedState = Arc<Mutex<LoadState>>;

fn lock(state: &SharedState) -> std::sync::MutexGuard<'_, LoadState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

enum NetEvent {
    Started(String),
    Ended(String),
    Response(Arc<EventResponseReceived>),
}

/// Aborts the event pump when the load scope ends, on every path.
struct PumpGuard(JoinHandle<()>);

impl Drop for PumpGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Chromium-backed render client holding a single reusable tab.
pub struct ChromiumClient {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    options: ChromiumOptions,
}

impl ChromiumClient {
    /// Launch a headless Chromium instance configured with the client identity.
    pub async fn launch(options: ChromiumOptions) -> Result<Self> {
        let chrome_path = options
            .executable
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                ExtractError::Browser(
                    "Chromium not found; set OFFICER_CHROMIUM_PATH or use --mode static".into(),
                )
            })?;

        let identity = &options.identity;
        let (width, height) = identity.viewport;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: width > height,
                has_touch: false,
            })
            .request_timeout(options.navigation_timeout)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", identity.user_agent));
        if identity.stealth {
            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-infobars")
                .arg("--no-first-run")
                .arg("--no-default-browser-check");
        }
        let config = builder
            .build()
            .map_err(|e| ExtractError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ExtractError::Browser(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(ExtractError::Browser(format!("failed to create new page: {e}")));
            }
        };

        if identity.stealth {
            let params = AddScriptToEvaluateOnNewDocumentParams {
                source: STEALTH_SCRIPT.to_string(),
                include_command_line_api: None,
                world_name: None,
                run_immediately: None,
            };
            if let Err(e) = page.execute(params).await {
                warn!("failed to install stealth script: {e}");
            }
        }

        info!(width, height, stealth = identity.stealth, "Chromium session ready");
        Ok(Self {
            browser,
            page,
            handler,
            options,
        })
    }

    /// Subscribe to network events and pump them into shared state.
    async fn subscribe(&self) -> Result<(SharedState, PumpGuard)> {
        let tap = ResponseTap::new(&self.options.tap_pattern)
            .map_err(|e| ExtractError::Browser(format!("invalid tap pattern: {e}")))?;
        let state = Arc::new(Mutex::new(LoadState {
            network: NetworkLog::new(Instant::now()),
            tap,
        }));

        let cdp = |e: CdpError| {
            ExtractError::Browser(format!("failed to subscribe to network events: {e}"))
        };
        let started = self.page.event_listener::<EventRequestWillBeSent>().await.map_err(cdp)?;
        let finished = self.page.event_listener::<EventLoadingFinished>().await.map_err(cdp)?;
        let failed = self.page.event_listener::<EventLoadingFailed>().await.map_err(cdp)?;
        let responses = self.page.event_listener::<EventResponseReceived>().await.map_err(cdp)?;

        let streams: Vec<BoxStream<'static, NetEvent>> = vec![
            started.map(|e| NetEvent::Started(e.request_id.inner().clone())).boxed(),
            finished.map(|e| NetEvent::Ended(e.request_id.inner().clone())).boxed(),
            failed.map(|e| NetEvent::Ended(e.request_id.inner().clone())).boxed(),
            responses.map(NetEvent::Response).boxed(),
        ];
        let mut events = stream::select_all(streams);

        let pump_state = Arc::clone(&state);
        let pump = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let now = Instant::now();
                let mut s = lock(&pump_state);
                match event {
                    NetEvent::Started(id) => s.network.request_started(&id, now),
                    NetEvent::Ended(id) => s.network.request_ended(&id, now),
                    NetEvent::Response(ev) => {
                        let status = u16::try_from(ev.response.status).unwrap_or(0);
                        if matches!(ev.r#type, ResourceType::Document) {
                            s.network.document_response(status);
                        }
                        s.tap.observe(ObservedResponse {
                            request_id: ev.request_id.inner().clone(),
                            url: ev.response.url.clone(),
                            status,
                            mime_type: ev.response.mime_type.clone(),
                        });
                    }
                }
            }
        });

        Ok((state, PumpGuard(pump)))
    }

    /// Fetch bodies of tapped responses and keep those that parse as JSON.
    async fn drain_tap(&self, state: &SharedState) -> Vec<serde_json::Value> {
        let candidates = lock(state).tap.candidates().to_vec();
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut bodies = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let params = GetResponseBodyParams::new(RequestId::new(candidate.request_id.clone()));
            let body = match self.page.execute(params).await {
                Ok(resp) => decode_body(&resp.result.body, resp.result.base64_encoded),
                Err(e) => {
                    debug!(url = %candidate.url, "tapped response body unavailable: {e}");
                    None
                }
            };
            bodies.push(body);
        }

        let payloads = tap::parse_payloads(bodies);
        debug!(candidates = candidates.len(), payloads = payloads.len(), "drained response tap");
        payloads
    }

    /// Poll for `selector` until found or the settle cap elapses.
    async fn wait_for_selector(&self, selector: &str, url: &str) {
        let deadline = Instant::now() + self.options.settle_timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return;
            }
            if Instant::now() >= deadline {
                warn!(url, selector, "content selector did not appear; continuing");
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

async fn wait_settled(state: &SharedState, idle: Duration, cap: Duration) -> bool {
    let deadline = Instant::now() + cap;
    loop {
        let now = Instant::now();
        if lock(state).network.is_quiet(idle, now) {
            return true;
        }
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// A CDP request timeout during navigation is a page timeout, not a transport fault.
fn navigation_error(url: &str, e: CdpError, after: Duration) -> ExtractError {
    match e {
        CdpError::Timeout => ExtractError::Timeout {
            url: url.to_string(),
            after_ms: after.as_millis() as u64,
        },
        other => ExtractError::Transport {
            url: url.to_string(),
            message: format!("navigation failed: {other}"),
        },
    }
}

fn decode_body(body: &str, base64_encoded: bool) -> Option<String> {
    if !base64_encoded {
        return Some(body.to_string());
    }
    base64::engine::general_purpose::STANDARD
        .decode(body)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

/// The loaded tab as seen by the hydration guard.
struct HydratingPage<'a> {
    page: &'a Page,
    state: &'a SharedState,
    idle: Duration,
    cap: Duration,
}

#[async_trait]
impl HydrationTarget for HydratingPage<'_> {
    async fn snapshot(&mut self) -> Option<String> {
        self.page.content().await.ok()
    }

    async fn invoke_reload(&mut self) -> bool {
        let script = format!(
            "(() => {{ const b = Array.from(document.querySelectorAll('button')).find(b => (b.textContent || '').includes({text:?})); if (!b) return false; b.click(); return true; }})()",
            text = RELOAD_CONTROL_TEXT
        );
        let clicked = match self.page.evaluate(script).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(_) => false,
        };
        if clicked {
            lock(self.state).network.touch(Instant::now());
        }
        clicked
    }

    async fn wait_settled(&mut self) {
        wait_settled(self.state, self.idle, self.cap).await;
    }
}

#[async_trait]
impl RenderClient for ChromiumClient {
    async fn load(&mut self, url: &str) -> Result<LoadedPage> {
        let (state, _pump) = self.subscribe().await?;
        let timeout = self.options.navigation_timeout;

        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(navigation_error(url, e, timeout)),
            Err(_) => {
                return Err(ExtractError::Timeout {
                    url: url.to_string(),
                    after_ms: timeout.as_millis() as u64,
                })
            }
        }

        let (idle, cap) = (self.options.settle_idle, self.options.settle_timeout);
        if !wait_settled(&state, idle, cap).await {
            let in_flight = lock(&state).network.in_flight();
            warn!(url, in_flight, "network never went quiet; extracting what rendered");
        }

        let status = lock(&state).network.document_status().unwrap_or(200);
        if !(200..300).contains(&status) {
            return Err(ExtractError::Http {
                url: url.to_string(),
                status,
            });
        }

        if let Some(selector) = self.options.content_selector.clone() {
            self.wait_for_selector(&selector, url).await;
        }

        let hydration = {
            let mut target = HydratingPage {
                page: &self.page,
                state: &state,
                idle,
                cap,
            };
            hydration::guard(&mut target, &self.options.stall_marker, url).await
        };

        let body = self
            .page
            .content()
            .await
            .map_err(|e| ExtractError::Browser(format!("failed to read document: {e}")))?;
        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());
        let payloads = self.drain_tap(&state).await;

        Ok(LoadedPage {
            requested_url: url.to_string(),
            final_url,
            status,
            content_type: Some("text/html".to_string()),
            body,
            payloads,
            hydration,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let Self {
            mut browser,
            page,
            handler,
            ..
        } = *self;
        let _ = page.close().await;
        let _ = browser.close().await;
        let _ = browser.wait().await;
        handler.abort();
        info!("Chromium session closed");
        Ok(())
    }
}
