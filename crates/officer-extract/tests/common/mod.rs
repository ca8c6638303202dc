//! Shared fixtures: a scripted render client and catalog markup builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use officer_extract::config::ExtractConfig;
use officer_extract::error::{ExtractError, Result};
use officer_extract::hydration::HydrationOutcome;
use officer_extract::renderer::{LoadedPage, RenderClient};

pub const BASE: &str = "https://catalog.test";

// ─────────────────────── scripted client ───────────────────────

#[derive(Clone)]
pub enum Reply {
    Html(String),
    Json(String),
    Timeout,
    Status(u16),
}

/// What the client saw, shared with the test after the client is moved away.
#[derive(Default)]
pub struct Journal {
    pub loads: Vec<String>,
    pub closed: usize,
}

#[derive(Clone, Default)]
pub struct Script {
    replies: Arc<HashMap<String, Reply>>,
    pub journal: Arc<Mutex<Journal>>,
}

impl Script {
    pub fn new(replies: Vec<(String, Reply)>) -> Self {
        Self {
            replies: Arc::new(replies.into_iter().collect()),
            journal: Arc::default(),
        }
    }

    pub fn client(&self) -> Box<dyn RenderClient> {
        Box::new(ScriptedClient {
            script: self.clone(),
        })
    }

    pub fn loads(&self) -> Vec<String> {
        self.journal.lock().unwrap().loads.clone()
    }

    pub fn closed(&self) -> usize {
        self.journal.lock().unwrap().closed
    }
}

pub struct ScriptedClient {
    script: Script,
}

#[async_trait]
impl RenderClient for ScriptedClient {
    async fn load(&mut self, url: &str) -> Result<LoadedPage> {
        self.script.journal.lock().unwrap().loads.push(url.to_string());

        let reply = self
            .script
            .replies
            .get(url)
            .cloned()
            .unwrap_or(Reply::Status(404));

        let (content_type, body) = match reply {
            Reply::Html(body) => ("text/html", body),
            Reply::Json(body) => ("application/json", body),
            Reply::Timeout => {
                return Err(ExtractError::Timeout {
                    url: url.to_string(),
                    after_ms: 60_000,
                })
            }
            Reply::Status(status) => {
                return Err(ExtractError::Http {
                    url: url.to_string(),
                    status,
                })
            }
        };

        Ok(LoadedPage {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            status: 200,
            content_type: Some(content_type.to_string()),
            body,
            payloads: Vec::new(),
            hydration: HydrationOutcome::Ready,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.script.journal.lock().unwrap().closed += 1;
        Ok(())
    }
}

// ─────────────────────── markup ───────────────────────

pub fn list_url(page: u32) -> String {
    format!("{BASE}/officers?page={page}")
}

pub fn detail_url(id: &str) -> String {
    format!("{BASE}/officers/{id}")
}

/// A list page with one card per id and an enabled next control.
pub fn list_page(ids: &[&str]) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<a class="officer-card" data-id="{id}" href="/officers/{id}"><span class="officer-card__name">Officer {id}</span><span class="officer-card__rarity">Common</span></a>"#
            )
        })
        .collect();
    format!(
        r##"<html><body><main>{cards}</main><nav class="pagination"><a class="next" href="?next">Next</a></nav></body></html>"##
    )
}

pub fn detail_page(id: &str) -> String {
    format!(
        r#"<html><body>
        <h1>Officer {id}</h1>
        <div><span>Rarity</span><span>Epic</span></div>
        <div><span>Group</span><span>Crew {id}</span></div>
        <div><h3>Officer Ability</h3><p>Ability of {id}</p></div>
        <div><h3>Traits</h3><ul><li>Starfleet</li></ul></div>
        </body></html>"#
    )
}

pub fn fixed_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 8, 30, 0).unwrap()
}

pub fn config(data_dir: &std::path::Path) -> ExtractConfig {
    let mut cfg = ExtractConfig {
        base_url: BASE.to_string(),
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    };
    cfg.page_delay = std::time::Duration::ZERO;
    cfg.item_delay = std::time::Duration::ZERO;
    cfg
}
