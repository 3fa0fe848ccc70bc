//! Site adapters for the supported job boards.
//!
//! Each adapter knows one board's markup:
//! - LinkedIn: search results under `/jobs/`
//! - Glassdoor: `JobCard_*` module classes
//! - NationaleVacatureBank: `nvb_*` module classes, the card is the link
//! - WerkZoeken: plain markup under `div.vacancies-wrapper`

pub mod common;
pub mod glassdoor;
pub mod linkedin;
pub mod nationalevacaturebank;
pub mod werkzoeken;

use crate::page::Page;
use crate::types::{Listing, Platform};
use ego_tree::NodeId;
use std::rc::Rc;
use tracing::debug;

pub use glassdoor::GlassdoorAdapter;
pub use linkedin::LinkedInAdapter;
pub use nationalevacaturebank::NationaleVacatureBankAdapter;
pub use werkzoeken::WerkZoekenAdapter;

/// Who an adapter is and which hosts it serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterIdentity {
    /// Short name used in logs
    pub name: &'static str,
    pub platform: Platform,
}

impl AdapterIdentity {
    /// Whether this adapter serves `hostname` (case-insensitive)
    pub fn matches_host(&self, hostname: &str) -> bool {
        hostname
            .to_lowercase()
            .contains(self.platform.host_fragment())
    }
}

/// Reads listings from, and writes badges into, one job board's pages
pub trait SiteAdapter {
    fn identity(&self) -> AdapterIdentity;

    /// Whether the page shows job listings at all
    fn is_listing_page(&self, page: &Page) -> bool;

    /// All listings currently on the page, in document order.
    ///
    /// Cards without a usable link are skipped; they never fail the scan.
    fn extract_listings(&self, page: &Page) -> Vec<Listing>;

    /// Element that wraps the result list, when the board has one
    fn listing_container(&self, page: &Page) -> Option<NodeId>;

    /// Element the badge is prepended to
    fn badge_target(&self, _page: &Page, listing: &Listing) -> Option<NodeId> {
        Some(listing.element)
    }

    fn has_badge(&self, page: &Page, listing: &Listing) -> bool {
        common::has_badge(page, listing.element)
    }

    /// Insert a badge for `score`. Returns false when nothing was inserted,
    /// either because the listing already carries one or its anchor is gone.
    fn inject_badge(&self, page: &mut Page, listing: &Listing, score: f64) -> bool {
        if self.has_badge(page, listing) {
            return false;
        }

        match self.badge_target(page, listing) {
            Some(target) => common::insert_badge(page, target, score),
            None => {
                debug!(
                    "{}: no badge anchor for {}",
                    self.identity().name,
                    listing.url
                );
                false
            }
        }
    }
}

/// Ordered set of adapters; the first one whose identity matches the host wins
pub struct SiteRegistry {
    adapters: Vec<Rc<dyn SiteAdapter>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self {
            adapters: vec![
                Rc::new(LinkedInAdapter),
                Rc::new(GlassdoorAdapter),
                Rc::new(NationaleVacatureBankAdapter),
                Rc::new(WerkZoekenAdapter),
            ],
        }
    }

    /// Adapter for a hostname, if any board matches
    pub fn adapter_for_host(&self, hostname: &str) -> Option<Rc<dyn SiteAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.identity().matches_host(hostname))
            .cloned()
    }

    pub fn adapter_for_page(&self, page: &Page) -> Option<Rc<dyn SiteAdapter>> {
        self.adapter_for_host(&page.hostname())
    }

    /// Names of the registered adapters, in dispatch order
    pub fn names(&self) -> Vec<&'static str> {
        self.adapters
            .iter()
            .map(|adapter| adapter.identity().name)
            .collect()
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new()
    }
}
