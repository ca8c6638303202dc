//! Per-entity detail enrichment.
//!
//! Each stub is loaded and extracted on its own. A failure on one entity is
//! logged and reported back; it never stops the remaining entities.

use super::Clock;
use crate::error::{ExtractError, Result};
use crate::extract::list::last_segment;
use crate::extract::{extract_detail, ExtractionMode};
use crate::model::{EntryStub, Record};
use crate::renderer::RenderClient;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// An entity left out of the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntity {
    pub id: String,
    /// Error class, see `ExtractError::kind`.
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct EnrichOutcome {
    /// Records in stub order.
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedEntity>,
}

pub struct Enricher<'a> {
    base: &'a str,
    item_delay: Duration,
    clock: Clock,
}

impl<'a> Enricher<'a> {
    pub fn new(base: &'a str, item_delay: Duration, clock: Clock) -> Self {
        Self {
            base,
            item_delay,
            clock,
        }
    }

    /// Absolute locator for a stub; absolute paths pass through unchanged.
    ///
    /// Only `http` and `https` locators are loadable.
    pub fn resolve(&self, stub: &EntryStub) -> Result<String> {
        let locator_error = |message: String| ExtractError::Locator {
            locator: stub.path.clone(),
            message,
        };
        let resolved = match url::Url::parse(&stub.path) {
            Ok(abs) => abs,
            Err(_) => url::Url::parse(&format!("{}/", self.base.trim_end_matches('/')))
                .and_then(|base| base.join(&stub.path))
                .map_err(|e| locator_error(e.to_string()))?,
        };
        match resolved.scheme() {
            "http" | "https" => Ok(resolved.to_string()),
            other => Err(locator_error(format!("unsupported scheme `{other}`"))),
        }
    }

    pub async fn enrich(&self, client: &mut dyn RenderClient, stubs: Vec<EntryStub>) -> EnrichOutcome {
        let total = stubs.len();
        let mut outcome = EnrichOutcome::default();

        for (i, stub) in stubs.into_iter().enumerate() {
            if i > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }

            let id = stub.id.clone();
            match self.enrich_one(client, stub).await {
                Ok((record, mode)) => {
                    debug!(id = %id, ?mode, "enriched");
                    outcome.records.push(record);
                }
                Err(e) => {
                    warn!(id = %id, kind = e.kind(), error = %e, "skipping entity");
                    outcome.skipped.push(SkippedEntity {
                        id,
                        kind: e.kind().to_string(),
                        reason: e.to_string(),
                    });
                }
            }

            if (i + 1) % 25 == 0 {
                info!(done = i + 1, total, "enrichment progress");
            }
        }

        info!(
            enriched = outcome.records.len(),
            skipped = outcome.skipped.len(),
            "enrichment finished"
        );
        outcome
    }

    async fn enrich_one(&self, client: &mut dyn RenderClient, stub: EntryStub) -> Result<(Record, ExtractionMode)> {
        let url = self.resolve(&stub)?;
        let page = client.load(&url).await?;
        let segment = last_segment(&stub.path);
        let mut identity = vec![stub.id.as_str()];
        identity.extend(segment.as_deref());
        let (detail, mode) = extract_detail(&page, &identity);
        let record = Record::merge(stub, detail, page.final_url, (self.clock)());
        Ok((record, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn enricher() -> Enricher<'static> {
        Enricher::new("https://stfc.space", Duration::ZERO, Arc::new(chrono::Utc::now))
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let e = enricher();
        assert_eq!(
            e.resolve(&EntryStub::new("1", "/officers/1")).unwrap(),
            "https://stfc.space/officers/1"
        );
        assert_eq!(
            e.resolve(&EntryStub::new("2", "officers/2")).unwrap(),
            "https://stfc.space/officers/2"
        );
        assert_eq!(
            e.resolve(&EntryStub::new("3", "https://mirror.test/o/3")).unwrap(),
            "https://mirror.test/o/3"
        );
    }

    #[test]
    fn test_resolve_rejects_non_http_schemes() {
        let e = enricher();
        for path in ["javascript:void(0)", "mailto:kirk@enterprise.test", "ftp://stfc.space/o/1"] {
            assert!(
                matches!(e.resolve(&EntryStub::new("1", path)), Err(ExtractError::Locator { .. })),
                "{path} resolved"
            );
        }
    }

    #[test]
    fn test_resolve_bad_base() {
        let e = Enricher::new("::", Duration::ZERO, Arc::new(chrono::Utc::now));
        assert!(matches!(
            e.resolve(&EntryStub::new("1", "/officers/1")),
            Err(ExtractError::Locator { .. })
        ));
    }
}
