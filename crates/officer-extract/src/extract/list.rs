//! List page parsing: entry stubs plus the pagination signal.

use super::absolutize;
use super::dom::element_text;
use crate::model::{non_empty, EntryStub};
use crate::renderer::LoadedPage;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;

const ROW_SELECTOR: &str = ".officer-card";
const NEXT_CONTROLS: &[&str] = &["[rel=\"next\"]", ".pagination .next"];
const LIST_ENVELOPES: &[&str] = &["officers", "data", "items", "results"];
const LOCATOR_KEYS: &[&str] = &["path", "url", "link", "href"];

/// What a list page says about the page after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// A usable "next" control or flag is present.
    Enabled,
    /// The control is present but disabled.
    Disabled,
    /// Markup without any next control.
    Absent,
    /// JSON without pagination metadata; only an empty page ends the crawl.
    Unknown,
}

impl Pagination {
    /// Whether the crawl should request the following page.
    pub fn continues(self) -> bool {
        matches!(self, Self::Enabled | Self::Unknown)
    }
}

/// Parsed list page in row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    pub stubs: Vec<EntryStub>,
    pub pagination: Pagination,
}

/// Parse a list page, preferring a captured payload with rows, then a JSON body, then markup.
pub fn parse_list_page(page: &LoadedPage) -> ListPage {
    if let Some(list) = page
        .payloads
        .iter()
        .map(|payload| parse_json(payload, &page.final_url))
        .find(|list| !list.stubs.is_empty())
    {
        return list;
    }
    if let Some(body) = page.json_body() {
        return parse_json(&body, &page.final_url);
    }
    parse_html(&page.body, &page.final_url)
}

/// Markup list rows and the next-page control.
pub fn parse_html(html: &str, page_url: &str) -> ListPage {
    let doc = Html::parse_document(html);
    let mut stubs = Vec::new();

    if let Ok(rows) = Selector::parse(ROW_SELECTOR) {
        for row in doc.select(&rows) {
            match stub_from_row(row, page_url) {
                Some(stub) => stubs.push(stub),
                None => debug!(page = page_url, "list row without a detail link"),
            }
        }
    }

    ListPage {
        stubs,
        pagination: html_pagination(&doc),
    }
}

fn stub_from_row(row: ElementRef<'_>, page_url: &str) -> Option<EntryStub> {
    let link = match row.value().attr("href") {
        Some(href) => Some((href.to_string(), row)),
        None => Selector::parse("a[href]").ok().and_then(|sel| {
            row.select(&sel)
                .next()
                .and_then(|a| a.value().attr("href").map(|h| (h.to_string(), a)))
        }),
    };
    let (path, anchor) = link?;
    let path = non_empty(path)?;

    let id = row
        .value()
        .attr("data-id")
        .map(str::to_string)
        .and_then(non_empty)
        .or_else(|| last_segment(&path))?;

    let name = sub_text(row, ".officer-card__name").or_else(|| non_empty(element_text(anchor)));

    let mut stub = EntryStub::new(id, path);
    stub.name = name;
    stub.rarity = sub_text(row, ".officer-card__rarity");
    stub.group = sub_text(row, ".officer-card__group");
    stub.portrait = Selector::parse("img[src]")
        .ok()
        .and_then(|sel| row.select(&sel).next())
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| non_empty(src.to_string()))
        .map(|src| absolutize(&src, page_url));
    Some(stub)
}

fn sub_text(el: ElementRef<'_>, css: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    el.select(&sel).next().map(element_text).and_then(non_empty)
}

/// Last non-empty path segment, ignoring any query or fragment.
pub(crate) fn last_segment(locator: &str) -> Option<String> {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn html_pagination(doc: &Html) -> Pagination {
    let control = NEXT_CONTROLS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|sel| doc.select(&sel).next());

    match control {
        None => Pagination::Absent,
        Some(el) if is_disabled(el) => Pagination::Disabled,
        Some(_) => Pagination::Enabled,
    }
}

fn is_disabled(el: ElementRef<'_>) -> bool {
    let v = el.value();
    v.attr("disabled").is_some()
        || v.attr("aria-disabled").is_some_and(|a| a.eq_ignore_ascii_case("true"))
        || v.classes().any(|c| c == "disabled" || c.ends_with("--disabled"))
}

/// JSON list: a bare array or an object wrapping one.
pub fn parse_json(payload: &Value, page_url: &str) -> ListPage {
    let (rows, pagination) = match payload {
        Value::Array(rows) => (rows.as_slice(), Pagination::Unknown),
        Value::Object(obj) => {
            let rows = LIST_ENVELOPES
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_array))
                .map(Vec::as_slice)
                .unwrap_or_default();
            (rows, json_pagination(payload))
        }
        _ => (&[][..], Pagination::Unknown),
    };

    let stubs = rows
        .iter()
        .filter_map(|row| {
            let stub = stub_from_json(row, page_url);
            if stub.is_none() {
                debug!(page = page_url, "list entry without id or locator");
            }
            stub
        })
        .collect();

    ListPage { stubs, pagination }
}

fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => non_empty(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn stub_from_json(row: &Value, page_url: &str) -> Option<EntryStub> {
    let obj = row.as_object()?;
    let id = obj.get("id").and_then(scalar)?;
    let path = LOCATOR_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(scalar))
        .or_else(|| {
            obj.get("slug")
                .and_then(scalar)
                .map(|slug| format!("{}/{slug}", list_dir(page_url)))
        })?;

    let mut stub = EntryStub::new(id, path);
    stub.name = obj.get("name").and_then(scalar);
    stub.rarity = obj.get("rarity").and_then(scalar);
    stub.group = obj.get("group").or_else(|| obj.get("crew")).and_then(scalar);
    stub.portrait = ["portrait", "image", "img"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(scalar))
        .map(|src| absolutize(&src, page_url));
    Some(stub)
}

/// Path of the list page without its query, for slug-only entries.
fn list_dir(page_url: &str) -> String {
    match url::Url::parse(page_url) {
        Ok(u) => u.path().trim_end_matches('/').to_string(),
        Err(_) => String::new(),
    }
}

fn json_pagination(payload: &Value) -> Pagination {
    let flag = |v: &Value| match v {
        Value::Bool(b) => Some(*b),
        Value::Null => Some(false),
        Value::String(s) => Some(!s.trim().is_empty()),
        Value::Number(_) => Some(true),
        _ => None,
    };

    let signal = payload
        .get("next")
        .and_then(flag)
        .or_else(|| payload.get("has_more").and_then(flag))
        .or_else(|| payload.get("hasMore").and_then(flag))
        .or_else(|| {
            let p = payload.get("pagination")?;
            ["next", "hasNext", "has_next"]
                .iter()
                .find_map(|k| p.get(*k).and_then(flag))
        });

    match signal {
        Some(true) => Pagination::Enabled,
        Some(false) => Pagination::Disabled,
        None => Pagination::Unknown,
    }
}
