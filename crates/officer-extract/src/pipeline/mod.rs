//! Stage orchestration: list discovery, detail enrichment, persistence.
//!
//! One `RenderClient` is opened per stage and always closed before the stage
//! returns, whether it succeeded or not.

pub mod enricher;
pub mod list_crawler;

pub use enricher::{EnrichOutcome, Enricher, SkippedEntity};
pub use list_crawler::{CrawlAborted, ListCrawler};

use crate::config::ExtractConfig;
use crate::model::{Dataset, EntryStub};
use crate::output::DatasetWriter;
use crate::renderer::RenderClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Timestamp source; injected so runs can be made byte-reproducible.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Wall-clock `Clock`.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// A clock frozen at `ts`.
pub fn fixed_clock(ts: DateTime<Utc>) -> Clock {
    Arc::new(move || ts)
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Unique stubs known to the run.
    pub discovered: usize,
    pub enriched: usize,
    pub skipped: Vec<SkippedEntity>,
}

/// Runs stages against a configured site.
pub struct Pipeline {
    config: ExtractConfig,
    writer: DatasetWriter,
    clock: Clock,
}

impl Pipeline {
    pub fn new(config: ExtractConfig, clock: Clock) -> Self {
        let writer = DatasetWriter::new(config.stubs_path(), config.dataset_path());
        Self {
            config,
            writer,
            clock,
        }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    pub fn writer(&self) -> &DatasetWriter {
        &self.writer
    }

    /// Discover stubs and write the stub file. Nothing is written on abort.
    pub async fn run_list(&self, client: Box<dyn RenderClient>) -> anyhow::Result<Vec<EntryStub>> {
        let result = self.discover(client).await?;
        self.writer.write_stubs(&result)?;
        Ok(result)
    }

    /// Enrich the stubs from the stub file and write the dataset.
    pub async fn run_details(&self, client: Box<dyn RenderClient>) -> anyhow::Result<RunSummary> {
        let stubs = match self.writer.read_stubs() {
            Ok(stubs) => stubs,
            Err(e) => {
                close(client).await;
                return Err(e.into());
            }
        };
        self.enrich_and_write(client, unique_stubs(stubs)).await
    }

    /// List then details, each stage with its own client from `connect`.
    pub async fn run_all<F, Fut>(&self, mut connect: F) -> anyhow::Result<RunSummary>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = crate::error::Result<Box<dyn RenderClient>>>,
    {
        let stubs = self.run_list(connect().await?).await?;
        self.enrich_and_write(connect().await?, stubs).await
    }

    async fn discover(&self, mut client: Box<dyn RenderClient>) -> Result<Vec<EntryStub>, CrawlAborted> {
        let crawler = ListCrawler::new(self.config.base(), &self.config.list_path, self.config.page_delay);
        let result = crawler.crawl(client.as_mut()).await;
        close(client).await;

        match &result {
            Ok(stubs) => info!(count = stubs.len(), "list discovery complete"),
            Err(e) => warn!(page = e.page, discarded = e.discarded, "list discovery aborted"),
        }
        result
    }

    async fn enrich_and_write(
        &self,
        mut client: Box<dyn RenderClient>,
        stubs: Vec<EntryStub>,
    ) -> anyhow::Result<RunSummary> {
        let discovered = stubs.len();
        let enricher = Enricher::new(self.config.base(), self.config.item_delay, self.clock.clone());
        let outcome = enricher.enrich(client.as_mut(), stubs).await;
        close(client).await;

        let dataset = Dataset::new(self.config.base(), (self.clock)(), outcome.records);
        self.writer.write_dataset(&dataset)?;

        Ok(RunSummary {
            discovered,
            enriched: dataset.count,
            skipped: outcome.skipped,
        })
    }
}

/// Drop repeated ids from a hand-edited or stale stub file; first one wins.
fn unique_stubs(stubs: Vec<EntryStub>) -> Vec<EntryStub> {
    let total = stubs.len();
    let mut seen = HashSet::new();
    let unique: Vec<EntryStub> = stubs.into_iter().filter(|s| seen.insert(s.id.clone())).collect();
    if unique.len() < total {
        warn!(dropped = total - unique.len(), "stub file lists duplicate ids");
    }
    unique
}

async fn close(client: Box<dyn RenderClient>) {
    if let Err(e) = client.close().await {
        warn!(error = %e, "failed to close render client");
    }
}
