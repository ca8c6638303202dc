//! Field extraction from loaded pages.
//!
//! All entry points are synchronous: `scraper`'s document types are `!Send`,
//! so a parsed document never lives across an await point.

pub mod dom;
pub mod json;
pub mod list;

use crate::model::EntityDetail;
use crate::renderer::LoadedPage;
use serde::Serialize;
use tracing::debug;

/// Which path produced a detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Mapped from a captured or served JSON payload.
    Json,
    /// Scraped from rendered markup.
    Dom,
}

/// Produce an `EntityDetail` for a loaded detail page.
///
/// A captured payload that describes this entity wins over DOM scraping of
/// the same page; a body that is itself JSON counts as a payload too.
/// `identity` holds the values the entity is known by (stub id, locator
/// segment). The final URL's last segment is always added to it.
pub fn extract_detail(page: &LoadedPage, identity: &[&str]) -> (EntityDetail, ExtractionMode) {
    let segment = list::last_segment(&page.final_url);
    let mut keys: Vec<&str> = identity.to_vec();
    if let Some(s) = segment.as_deref() {
        keys.push(s);
    }

    for payload in page.payloads.iter().cloned().chain(page.json_body()) {
        if let Some(detail) = json::map_detail(&payload, &page.final_url, &keys) {
            return (detail, ExtractionMode::Json);
        }
        debug!(url = %page.final_url, "payload does not describe this entity");
    }
    (dom::scrape_detail(&page.body, &page.final_url), ExtractionMode::Dom)
}

/// Resolve a possibly relative locator against `base`.
pub(crate) fn absolutize(locator: &str, base: &str) -> String {
    match url::Url::parse(base).and_then(|b| b.join(locator)) {
        Ok(u) => u.to_string(),
        Err(_) => locator.to_string(),
    }
}
