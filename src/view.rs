//! Per-page view state. Every range change starts a new generation; results
//! that arrive for an older generation are dropped, so a slow response for a
//! range the user already left can never overwrite newer data.

use crate::errors::{FetchError, RangeError};
use crate::fetch::Fetcher;
use crate::pages::{Page, Section, SectionState};
use crate::range::{DateRange, RangeInfo, RangeSelection, RangeToken, resolve_selection};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Issued by a range change; fetch results must present it to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub range: DateRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewState {
    pub page: Page,
    pub generation: u64,
    pub selection: Option<RangeSelection>,
    pub range: Option<RangeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    pub sections: BTreeMap<&'static str, SectionState>,
}

impl ViewState {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            generation: 0,
            selection: None,
            range: None,
            validation_error: None,
            banner: None,
            sections: BTreeMap::new(),
        }
    }

    /// Applies a new selection. An invalid one is recorded and leaves the
    /// rendered sections alone.
    pub fn range_changed(
        &mut self,
        selection: RangeSelection,
        now: DateTime<Utc>,
    ) -> Result<Ticket, RangeError> {
        let range = match resolve_selection(selection, now) {
            Ok(range) => range,
            Err(err) => {
                self.selection_rejected(&err);
                return Err(err);
            }
        };

        self.generation += 1;
        self.selection = Some(selection);
        self.range = Some(RangeInfo::new(range, now.date_naive()));
        self.validation_error = None;
        self.banner = None;
        self.sections = self
            .page
            .sections()
            .iter()
            .map(|section| (section.key, SectionState::Loading))
            .collect();

        Ok(Ticket {
            generation: self.generation,
            range,
        })
    }

    pub fn selection_rejected(&mut self, err: &RangeError) {
        self.validation_error = Some(err.to_string());
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.generation == self.generation
            && self.range.as_ref().map(|info| info.current) == Some(ticket.range)
    }

    /// Returns `false` when the result was stale and dropped.
    pub fn fetch_succeeded(&mut self, ticket: &Ticket, key: &'static str, data: Value) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.sections.insert(key, SectionState::Ready { data });
        true
    }

    /// Returns `false` when the result was stale and dropped.
    pub fn fetch_failed(&mut self, ticket: &Ticket, section: &Section, err: &FetchError) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        if section.primary {
            self.banner = Some(err.banner().to_string());
        }
        self.sections.insert(
            section.key,
            SectionState::NoData {
                reason: err.to_string(),
            },
        );
        true
    }
}

/// Owns one page's view state and the fetch tasks feeding it.
#[derive(Clone)]
pub struct PageController {
    page: Page,
    fetcher: Fetcher,
    sections: Arc<Vec<Section>>,
    state: Arc<Mutex<ViewState>>,
    in_flight: Arc<Mutex<Vec<AbortHandle>>>,
}

impl PageController {
    pub fn new(page: Page, fetcher: Fetcher) -> Self {
        Self {
            page,
            fetcher,
            sections: Arc::new(page.sections()),
            state: Arc::new(Mutex::new(ViewState::new(page))),
            in_flight: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub async fn select(&self, selection: RangeSelection) -> Result<ViewState, RangeError> {
        self.select_at(selection, Utc::now()).await
    }

    /// Starts a new generation: aborts whatever is still running for the
    /// previous one and spawns one task per section.
    pub async fn select_at(
        &self,
        selection: RangeSelection,
        now: DateTime<Utc>,
    ) -> Result<ViewState, RangeError> {
        let mut in_flight = self.in_flight.lock().await;

        let ticket = {
            let mut state = self.state.lock().await;
            match state.range_changed(selection, now) {
                Ok(ticket) => ticket,
                Err(err) => {
                    debug!(page = %self.page, "rejected selection: {err}");
                    return Err(err);
                }
            }
        };

        let aborted = in_flight.len();
        for handle in in_flight.drain(..) {
            handle.abort();
        }

        for section in self.sections.iter() {
            let pending = section.run(&self.fetcher, ticket.range);
            let state = Arc::clone(&self.state);
            let section = section.clone();
            let page = self.page;

            let task = tokio::spawn(async move {
                let result = pending.await;
                let mut state = state.lock().await;
                let applied = match result {
                    Ok(data) => state.fetch_succeeded(&ticket, section.key, data),
                    Err(err) => {
                        warn!(%page, section = section.key, "section failed: {err}");
                        state.fetch_failed(&ticket, &section, &err)
                    }
                };
                if !applied {
                    debug!(
                        %page,
                        section = section.key,
                        generation = ticket.generation,
                        "dropped stale result"
                    );
                }
            });
            in_flight.push(task.abort_handle());
        }

        info!(
            page = %self.page,
            generation = ticket.generation,
            from = %ticket.range.start_day(),
            to = %ticket.range.end_day(),
            aborted,
            "range selected"
        );
        Ok(self.snapshot().await)
    }

    /// Records a selection that failed validation before it could be applied.
    pub async fn reject(&self, err: &RangeError) {
        debug!(page = %self.page, "rejected selection: {err}");
        self.state.lock().await.selection_rejected(err);
    }

    /// Loads today's data the first time a page is looked at.
    pub async fn ensure_started(&self) -> ViewState {
        let untouched = self.state.lock().await.generation == 0;
        if untouched {
            let today = RangeSelection::Token {
                range: RangeToken::Today,
            };
            if let Ok(state) = self.select(today).await {
                return state;
            }
        }
        self.snapshot().await
    }

    pub async fn snapshot(&self) -> ViewState {
        self.state.lock().await.clone()
    }
}
