//! Glassdoor job search.
//!
//! Glassdoor ships CSS-module class names (`JobCard_jobTitle__1a2b3`), so every
//! selector matches on the class prefix only.

use super::common::{href_of, parent_of, select_cards};
use super::{AdapterIdentity, SiteAdapter};
use crate::page::{selector, Page};
use crate::types::{Listing, Platform};
use ego_tree::NodeId;
use lazy_static::lazy_static;
use scraper::Selector;
use tracing::trace;

lazy_static! {
    static ref CARDS: Vec<Selector> = vec![selector(r#"[class^="JobCard_jobCardContainer"]"#)];
    static ref TITLE_LINK: Selector = selector(r#"a[class^="JobCard_jobTitle"]"#);
    static ref TITLE_ANY: Selector = selector(r#"[class^="JobCard_jobTitle"]"#);
    static ref COMPANY: Selector = selector(r#"[class^="EmployerProfile_compactEmployerName"]"#);
    static ref LOCATION: Selector = selector(r#"[class^="JobCard_location"]"#);
    static ref CONTAINER: Selector = selector(r#"[class^="JobsList_jobsList"]"#);
}

pub struct GlassdoorAdapter;

impl SiteAdapter for GlassdoorAdapter {
    fn identity(&self) -> AdapterIdentity {
        AdapterIdentity {
            name: "glassdoor",
            platform: Platform::Glassdoor,
        }
    }

    fn is_listing_page(&self, page: &Page) -> bool {
        let path = page.path();
        path.contains("/Job/") || path.contains("/job-listing/") || page.exists(&CARDS[0])
    }

    fn extract_listings(&self, page: &Page) -> Vec<Listing> {
        let mut listings = Vec::new();

        for card in select_cards(page, &CARDS) {
            let Some(link) = page.first_in(card, &TITLE_LINK) else {
                trace!("Skipping Glassdoor card without title link");
                continue;
            };
            let Some(url) = href_of(page, link) else {
                continue;
            };

            let mut listing = Listing::new(url, card);
            listing.title = page.text(link);
            listing.company = page.first_in(card, &COMPANY).and_then(|n| page.text(n));
            listing.location = page.first_in(card, &LOCATION).and_then(|n| page.text(n));
            listings.push(listing);
        }

        listings
    }

    fn listing_container(&self, page: &Page) -> Option<NodeId> {
        page.first(&CONTAINER)
    }

    fn badge_target(&self, page: &Page, listing: &Listing) -> Option<NodeId> {
        parent_of(page, listing.element, &TITLE_ANY).or(Some(listing.element))
    }
}
