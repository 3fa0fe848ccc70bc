//! Test doubles shared by the unit tests.

use crate::page::{Page, SharedPage};
use crate::sites::{AdapterIdentity, LinkedInAdapter, SiteAdapter};
use crate::transport::{ContentMessage, ServiceResponse, Transport, TransportError};
use crate::types::{Listing, MatchEntry};
use async_trait::async_trait;
use ego_tree::NodeId;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use url::Url;

pub(crate) const SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/?keywords=rust";

/// LinkedIn search results with one card per job id
pub(crate) fn linkedin_results(ids: &[u64]) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<li class="jobs-search-results__list-item"><div class="job-card-container" data-job-id="{id}"><div class="title-row"><a class="job-card-list__title" href="/jobs/view/{id}/?refId=abc">Job {id}</a></div></div></li>"#
            )
        })
        .collect();

    format!(
        r#"<html><body><div class="jobs-search-results-list"><ul>{cards}</ul></div></body></html>"#
    )
}

pub(crate) fn linkedin_page(ids: &[u64]) -> SharedPage {
    page_at(SEARCH_URL, &linkedin_results(ids))
}

pub(crate) fn page_at(url: &str, document: &str) -> SharedPage {
    Page::parse(Url::parse(url).unwrap(), document).into_shared()
}

/// Canonical LinkedIn URL of a job id as used by the fixtures
pub(crate) fn job_url(id: u64) -> String {
    format!("https://www.linkedin.com/jobs/view/{}/", id)
}

/// Real adapter that counts how often the page is inspected
pub(crate) struct CountingAdapter {
    inner: Rc<dyn SiteAdapter>,
    pub listing_checks: Cell<usize>,
    pub extractions: Cell<usize>,
}

impl CountingAdapter {
    pub fn linkedin() -> Rc<Self> {
        Rc::new(Self {
            inner: Rc::new(LinkedInAdapter),
            listing_checks: Cell::new(0),
            extractions: Cell::new(0),
        })
    }
}

impl SiteAdapter for CountingAdapter {
    fn identity(&self) -> AdapterIdentity {
        self.inner.identity()
    }

    fn is_listing_page(&self, page: &Page) -> bool {
        self.listing_checks.set(self.listing_checks.get() + 1);
        self.inner.is_listing_page(page)
    }

    fn extract_listings(&self, page: &Page) -> Vec<Listing> {
        self.extractions.set(self.extractions.get() + 1);
        self.inner.extract_listings(page)
    }

    fn listing_container(&self, page: &Page) -> Option<NodeId> {
        self.inner.listing_container(page)
    }

    fn badge_target(&self, page: &Page, listing: &Listing) -> Option<NodeId> {
        self.inner.badge_target(page, listing)
    }

    fn has_badge(&self, page: &Page, listing: &Listing) -> bool {
        self.inner.has_badge(page, listing)
    }

    fn inject_badge(&self, page: &mut Page, listing: &Listing, score: f64) -> bool {
        self.inner.inject_badge(page, listing, score)
    }
}

/// Scripted transport. Queued results are returned first; after that
/// match checks answer with the configured matches and submissions succeed.
pub(crate) struct FakeTransport {
    pub sent: RefCell<Vec<ContentMessage>>,
    script: RefCell<VecDeque<Result<ServiceResponse, TransportError>>>,
    matches: RefCell<Vec<MatchEntry>>,
}

impl FakeTransport {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            sent: RefCell::new(Vec::new()),
            script: RefCell::new(VecDeque::new()),
            matches: RefCell::new(Vec::new()),
        })
    }

    pub fn set_matches(&self, entries: &[(&str, f64)]) {
        *self.matches.borrow_mut() = entries
            .iter()
            .map(|(url, score)| MatchEntry {
                url: url.to_string(),
                score: *score,
            })
            .collect();
    }

    pub fn push(&self, result: Result<ServiceResponse, TransportError>) {
        self.script.borrow_mut().push_back(result);
    }

    pub fn check_count(&self) -> usize {
        self.sent
            .borrow()
            .iter()
            .filter(|m| matches!(m, ContentMessage::CheckJobMatches { .. }))
            .count()
    }

    /// Every URL sent for indexing, in order
    pub fn submitted_urls(&self) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|m| match m {
                ContentMessage::SubmitLinks { urls } => Some(urls.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[async_trait(?Send)]
impl Transport for FakeTransport {
    async fn send(&self, message: &ContentMessage) -> Result<ServiceResponse, TransportError> {
        self.sent.borrow_mut().push(message.clone());

        let scripted = self.script.borrow_mut().pop_front();
        if let Some(result) = scripted {
            return result;
        }

        Ok(match message {
            ContentMessage::CheckJobMatches { .. } => {
                ServiceResponse::ok(json!({ "matches": self.matches.borrow().clone() }))
            }
            ContentMessage::SubmitLinks { urls } => {
                ServiceResponse::ok(json!({ "submitted": urls.len(), "skipped": 0 }))
            }
        })
    }
}
