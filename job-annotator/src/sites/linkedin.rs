//! LinkedIn job search.
//!
//! LinkedIn reshuffles its result markup often, so cards are found through an
//! ordered list of selectors and the first one that matches anything wins.

use super::common::{collapse_duplicate, href_of, parent_of, select_cards, text_in};
use super::{AdapterIdentity, SiteAdapter};
use crate::page::{selector, Page};
use crate::types::{Listing, Platform};
use ego_tree::NodeId;
use lazy_static::lazy_static;
use scraper::Selector;
use tracing::trace;

lazy_static! {
    static ref CARDS: Vec<Selector> = [
        ".job-card-container",
        ".jobs-search-results__list-item",
        "[data-job-id]",
        ".job-card-list__entity-lockup",
        ".scaffold-layout__list-item",
        "li.jobs-search-results__list-item",
    ]
    .iter()
    .map(|css| selector(css))
    .collect();

    static ref VIEW_LINK: Selector = selector(r#"a[href*="/jobs/view/"]"#);
    static ref JOBS_LINK: Selector = selector(r#"a[href*="/jobs/"]"#);

    static ref TITLE: Selector = selector(
        ".job-card-list__title, .artdeco-entity-lockup__title, .job-card-container__link, h3"
    );
    static ref COMPANY: Selector = selector(
        ".job-card-container__company-name, .artdeco-entity-lockup__subtitle, \
         .job-card-container__primary-description, h4"
    );
    static ref LOCATION: Selector = selector(
        ".job-card-container__metadata-item, .job-card-container__metadata-wrapper span"
    );

    static ref CONTAINER: Selector = selector(
        ".jobs-search-results-list, .scaffold-layout__list, .jobs-search-results__list"
    );

    static ref LIST_TITLE: Selector = selector(".job-card-list__title");
    static ref LOCKUP_TITLE: Selector = selector(".artdeco-entity-lockup__title");
}

pub struct LinkedInAdapter;

impl LinkedInAdapter {
    fn listing_from_card(&self, page: &Page, card: NodeId) -> Option<Listing> {
        let link = page
            .first_in(card, &VIEW_LINK)
            .or_else(|| page.first_in(card, &JOBS_LINK))?;
        let url = href_of(page, link)?;

        let mut listing = Listing::new(url, card);
        // Cards carry a hidden copy of the title for screen readers
        listing.title = text_in(page, card, &TITLE).map(|title| collapse_duplicate(&title));
        listing.company = text_in(page, card, &COMPANY);
        listing.location = text_in(page, card, &LOCATION);
        Some(listing)
    }
}

impl SiteAdapter for LinkedInAdapter {
    fn identity(&self) -> AdapterIdentity {
        AdapterIdentity {
            name: "linkedin",
            platform: Platform::LinkedIn,
        }
    }

    fn is_listing_page(&self, page: &Page) -> bool {
        page.path().starts_with("/jobs/")
    }

    fn extract_listings(&self, page: &Page) -> Vec<Listing> {
        select_cards(page, &CARDS)
            .into_iter()
            .filter_map(|card| {
                let listing = self.listing_from_card(page, card);
                if listing.is_none() {
                    trace!("Skipping LinkedIn card without job link");
                }
                listing
            })
            .collect()
    }

    fn listing_container(&self, page: &Page) -> Option<NodeId> {
        page.first(&CONTAINER)
    }

    fn badge_target(&self, page: &Page, listing: &Listing) -> Option<NodeId> {
        parent_of(page, listing.element, &LIST_TITLE)
            .or_else(|| parent_of(page, listing.element, &LOCKUP_TITLE))
            .or(Some(listing.element))
    }
}
