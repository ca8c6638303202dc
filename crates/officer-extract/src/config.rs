//! Configuration resolution.
//!
//! Precedence: CLI flags, then `OFFICER_*` environment variables, then the
//! defaults below.

use crate::renderer::ClientIdentity;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://stfc.space";
pub const DEFAULT_LIST_PATH: &str = "/officers";
pub const DEFAULT_TAP_PATTERN: &str = r"/api/.*officer";
pub const DEFAULT_CONTENT_SELECTOR: &str = "h1";

/// File name of the stub list written by the list stage.
pub const STUBS_FILE: &str = "officers.json";
/// File name of the enriched dataset.
pub const DATASET_FILE: &str = "officer_details.json";

/// How pages are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Plain HTTP GET, no script execution.
    Static,
    /// Headless Chromium with hydration handling and response capture.
    Rendered,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" | "http" => Ok(Self::Static),
            "rendered" | "browser" | "chromium" => Ok(Self::Rendered),
            other => Err(format!("unknown render mode '{other}' (expected static|rendered)")),
        }
    }
}

/// Bounds applied to every wait.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Navigation / request bound.
    pub navigation: Duration,
    /// Network must stay idle this long to count as settled.
    pub settle_idle: Duration,
    /// Cap on settling and selector waits.
    pub settle_timeout: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            settle_idle: Duration::from_millis(500),
            settle_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub base_url: String,
    pub list_path: String,
    pub data_dir: PathBuf,
    pub mode: RenderMode,
    pub timeouts: Timeouts,
    pub page_delay: Duration,
    pub item_delay: Duration,
    pub identity: ClientIdentity,
    pub tap_pattern: String,
    pub content_selector: Option<String>,
    pub stall_marker: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            list_path: DEFAULT_LIST_PATH.to_string(),
            data_dir: PathBuf::from("data"),
            mode: RenderMode::Rendered,
            timeouts: Timeouts::default(),
            page_delay: Duration::from_millis(1000),
            item_delay: Duration::from_millis(750),
            identity: ClientIdentity::default(),
            tap_pattern: DEFAULT_TAP_PATTERN.to_string(),
            content_selector: Some(DEFAULT_CONTENT_SELECTOR.to_string()),
            stall_marker: crate::hydration::DEFAULT_STALL_MARKER.to_string(),
        }
    }
}

impl ExtractConfig {
    /// Defaults overlaid with any `OFFICER_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = read_env_string("OFFICER_BASE_URL") {
            cfg.base_url = v;
        }
        if let Some(v) = read_env_string("OFFICER_LIST_PATH") {
            cfg.list_path = v;
        }
        if let Some(v) = read_env_string("OFFICER_DATA_DIR").or_else(|| read_env_string("DATA_PATH")) {
            cfg.data_dir = PathBuf::from(v);
        }
        if let Some(mode) = read_env_string("OFFICER_RENDER_MODE").and_then(|v| v.parse().ok()) {
            cfg.mode = mode;
        }

        let t = &mut cfg.timeouts;
        t.navigation = read_env_ms("OFFICER_TIMEOUT_MS", t.navigation);
        t.settle_idle = read_env_ms("OFFICER_SETTLE_IDLE_MS", t.settle_idle);
        t.settle_timeout = read_env_ms("OFFICER_SETTLE_TIMEOUT_MS", t.settle_timeout);
        cfg.page_delay = read_env_ms("OFFICER_PAGE_DELAY_MS", cfg.page_delay);
        cfg.item_delay = read_env_ms("OFFICER_ITEM_DELAY_MS", cfg.item_delay);

        if let Some(v) = read_env_string("OFFICER_USER_AGENT") {
            cfg.identity.user_agent = v;
        }
        if let Some((w, h)) = read_env_string("OFFICER_VIEWPORT").and_then(|v| parse_viewport(&v).ok()) {
            cfg.identity.viewport = (w, h);
        }
        if let Some(v) = read_env_string("OFFICER_TAP_PATTERN") {
            cfg.tap_pattern = v;
        }

        cfg
    }

    pub fn stubs_path(&self) -> PathBuf {
        self.data_dir.join(STUBS_FILE)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(DATASET_FILE)
    }

    /// Base origin without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Parse `"1366x768"` into `(1366, 768)`.
pub fn parse_viewport(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("viewport '{s}' must look like WIDTHxHEIGHT"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("bad viewport width in '{s}'"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("bad viewport height in '{s}'"))?;
    if w == 0 || h == 0 {
        return Err(format!("viewport '{s}' must be non-zero"));
    }
    Ok((w, h))
}

fn read_env_ms(name: &str, default_value: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default_value)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_viewport() {
        assert_eq!(parse_viewport("1366x768"), Ok((1366, 768)));
        assert_eq!(parse_viewport(" 800X600 "), Ok((800, 600)));
        assert!(parse_viewport("1366").is_err());
        assert!(parse_viewport("0x768").is_err());
        assert!(parse_viewport("axb").is_err());
    }

    #[test]
    fn test_render_mode_parsing() {
        assert_eq!("static".parse::<RenderMode>(), Ok(RenderMode::Static));
        assert_eq!("Chromium".parse::<RenderMode>(), Ok(RenderMode::Rendered));
        assert!("lynx".parse::<RenderMode>().is_err());
    }

    #[test]
    fn test_default_paths_and_bounds() {
        let cfg = ExtractConfig {
            base_url: "https://stfc.space/".into(),
            ..Default::default()
        };
        assert_eq!(cfg.base(), "https://stfc.space");
        assert_eq!(cfg.stubs_path(), PathBuf::from("data/officers.json"));
        assert_eq!(cfg.dataset_path(), PathBuf::from("data/officer_details.json"));
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(60));
    }
}
