//! Detection and one-shot recovery of the non-functional fallback shell.
//!
//! When the target's client application fails to bootstrap it renders a
//! recovery prompt instead of content. The guard clicks the prompt's reload
//! control once and re-waits; a persisting stall only degrades the page.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

/// Sentinel text shown by the fallback shell.
pub const DEFAULT_STALL_MARKER: &str = "If you are stuck here, press the Reload Button";

/// Text of the recovery control inside the fallback shell.
pub const RELOAD_CONTROL_TEXT: &str = "Reload";

/// What the guard observed for one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrationOutcome {
    /// Static load; no client code ran.
    NotChecked,
    /// No stall marker present.
    Ready,
    /// Stall marker cleared after one reload.
    Recovered,
    /// Stall marker persisted; extraction proceeds on whatever rendered.
    Stalled,
}

/// The page operations the guard needs.
#[async_trait]
pub trait HydrationTarget: Send {
    /// Current document markup. Errors count as "no markup".
    async fn snapshot(&mut self) -> Option<String>;
    /// Click the recovery control. Returns false when no control was found.
    async fn invoke_reload(&mut self) -> bool;
    /// Wait (bounded) for the network to settle again.
    async fn wait_settled(&mut self);
}

/// Whether `html` shows the stall marker.
pub fn is_stalled(html: &str, marker: &str) -> bool {
    !marker.is_empty() && html.contains(marker)
}

/// Check for the stall marker and attempt recovery at most once.
pub async fn guard(target: &mut dyn HydrationTarget, marker: &str, url: &str) -> HydrationOutcome {
    let stalled = match target.snapshot().await {
        Some(html) => is_stalled(&html, marker),
        None => false,
    };
    if !stalled {
        return HydrationOutcome::Ready;
    }

    info!(url, "fallback shell detected, invoking reload control");
    if !target.invoke_reload().await {
        warn!(url, "stall marker present but no reload control found");
        return HydrationOutcome::Stalled;
    }
    target.wait_settled().await;

    match target.snapshot().await {
        Some(html) if !is_stalled(&html, marker) => HydrationOutcome::Recovered,
        _ => {
            warn!(url, "page still stalled after reload; continuing with partial content");
            HydrationOutcome::Stalled
        }
    }
}
