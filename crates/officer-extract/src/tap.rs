//! Passive capture of the application's own data calls.
//!
//! A `ResponseTap` lives for exactly one page load: it is created before
//! navigation, fed every observed response, drained once the load settles
//! and then dropped.

use regex::{Regex, RegexBuilder};
use serde_json::Value;

/// A background response seen while a page was loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    /// Engine-level handle used to fetch the body later.
    pub request_id: String,
    pub url: String,
    pub status: u16,
    pub mime_type: String,
}

/// Buffered observer for one page load.
#[derive(Debug)]
pub struct ResponseTap {
    pattern: Regex,
    candidates: Vec<ObservedResponse>,
}

impl ResponseTap {
    /// Case-insensitive endpoint pattern.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            pattern,
            candidates: Vec::new(),
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    /// Buffer a response if it targets the data endpoint with a 2xx status.
    pub fn observe(&mut self, response: ObservedResponse) -> bool {
        if !(200..300).contains(&response.status) || !self.matches(&response.url) {
            return false;
        }
        if self.candidates.iter().any(|c| c.request_id == response.request_id) {
            return false;
        }
        self.candidates.push(response);
        true
    }

    /// Responses buffered so far, in arrival order.
    pub fn candidates(&self) -> &[ObservedResponse] {
        &self.candidates
    }

    /// Consume the tap, returning its buffered responses.
    pub fn into_candidates(self) -> Vec<ObservedResponse> {
        self.candidates
    }
}

/// Bodies that parse as a JSON object or array, in candidate order.
///
/// `None` entries are responses whose body could not be retrieved. A load can
/// observe list and detail calls alike; the extractor picks among them.
pub fn parse_payloads<I>(bodies: I) -> Vec<Value>
where
    I: IntoIterator<Item = Option<String>>,
{
    bodies
        .into_iter()
        .flatten()
        .filter_map(|body| match serde_json::from_str::<Value>(&body) {
            Ok(v @ Value::Object(_)) | Ok(v @ Value::Array(_)) => Some(v),
            _ => None,
        })
        .collect()
}
