//! Paginated list discovery.

use crate::error::{ExtractError, Result};
use crate::extract::list::parse_list_page;
use crate::model::EntryStub;
use crate::renderer::RenderClient;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A list crawl that failed part-way. Stubs gathered before the failure are discarded.
#[derive(thiserror::Error, Debug)]
#[error("list crawl aborted on page {page} ({discarded} stubs discarded): {source}")]
pub struct CrawlAborted {
    pub page: u32,
    pub discarded: usize,
    #[source]
    pub source: ExtractError,
}

/// Crawls `?page=1`, `?page=2`, ... until the list says stop.
pub struct ListCrawler<'a> {
    base: &'a str,
    list_path: &'a str,
    page_delay: Duration,
}

impl<'a> ListCrawler<'a> {
    pub fn new(base: &'a str, list_path: &'a str, page_delay: Duration) -> Self {
        Self {
            base: base.trim_end_matches('/'),
            list_path,
            page_delay,
        }
    }

    /// Locator for page `n`, keeping any query parameters already on the list path.
    pub fn page_url(&self, n: u32) -> Result<String> {
        let raw = format!("{}{}", self.base, self.list_path);
        let mut url = url::Url::parse(&raw).map_err(|e| ExtractError::Locator {
            locator: raw.clone(),
            message: e.to_string(),
        })?;

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "page")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair("page", &n.to_string());
        Ok(url.to_string())
    }

    /// Run the crawl to completion. Stubs come back in discovery order, unique by id.
    pub async fn crawl(&self, client: &mut dyn RenderClient) -> std::result::Result<Vec<EntryStub>, CrawlAborted> {
        let mut stubs: Vec<EntryStub> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut page_no: u32 = 1;

        loop {
            let abort = |source: ExtractError, discarded: usize| CrawlAborted {
                page: page_no,
                discarded,
                source,
            };

            let url = self.page_url(page_no).map_err(|e| abort(e, stubs.len()))?;
            debug!(page = page_no, %url, "loading list page");

            let loaded = match client.load(&url).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(page = page_no, error = %e, "list page failed");
                    return Err(abort(e, stubs.len()));
                }
            };

            let parsed = parse_list_page(&loaded);
            if parsed.stubs.is_empty() {
                info!(page = page_no, total = stubs.len(), "empty list page, crawl finished");
                break;
            }

            let rows = parsed.stubs.len();
            let mut fresh = 0usize;
            for stub in parsed.stubs {
                if seen.insert(stub.id.clone()) {
                    stubs.push(stub);
                    fresh += 1;
                }
            }
            info!(page = page_no, rows, new = fresh, total = stubs.len(), "list page parsed");

            if !parsed.pagination.continues() {
                debug!(page = page_no, pagination = ?parsed.pagination, "no next page");
                break;
            }

            page_no += 1;
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        Ok(stubs)
    }
}
