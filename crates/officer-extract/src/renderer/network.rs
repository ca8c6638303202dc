//! In-flight request bookkeeping for network quiescence.
//!
//! Fed from CDP network events during a rendered load. The page is
//! considered settled once nothing has been in flight for the idle window.

use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Request lifecycle counters for one page load.
#[derive(Debug)]
pub struct NetworkLog {
    in_flight: HashSet<String>,
    last_activity: Instant,
    /// Status of the main document response, once seen.
    document_status: Option<u16>,
}

impl NetworkLog {
    pub fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_activity: now,
            document_status: None,
        }
    }

    pub fn request_started(&mut self, request_id: &str, now: Instant) {
        self.in_flight.insert(request_id.to_string());
        self.last_activity = now;
    }

    /// Called for both finished and failed loads.
    pub fn request_ended(&mut self, request_id: &str, now: Instant) {
        if self.in_flight.remove(request_id) {
            self.last_activity = now;
        }
    }

    /// Record the main document status; only the first one counts.
    pub fn document_response(&mut self, status: u16) {
        if self.document_status.is_none() {
            self.document_status = Some(status);
        }
    }

    pub fn document_status(&self) -> Option<u16> {
        self.document_status
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// True once nothing is in flight and the network has been quiet for `idle`.
    pub fn is_quiet(&self, idle: Duration, now: Instant) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_activity) >= idle
    }

    /// Restart the idle window, e.g. after triggering a reload.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }
}
