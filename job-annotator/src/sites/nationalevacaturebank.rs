//! Nationale Vacaturebank search results. Each result card is itself the link.

use super::common::{href_of, parent_of, select_cards, text_in};
use super::{AdapterIdentity, SiteAdapter};
use crate::page::{selector, Page};
use crate::types::{Listing, Platform};
use ego_tree::NodeId;
use lazy_static::lazy_static;
use scraper::Selector;

lazy_static! {
    static ref RESULTS: Selector = selector(r#"[class^="nvb_searchResults"]"#);
    static ref CARDS: Vec<Selector> =
        vec![selector(r#"ul[class^="nvb_searchResults"] a[class^="nvb_searchResult"]"#)];
    static ref TITLE: Selector = selector("h2");
    static ref COMPANY: Selector = selector(r#"[class^="nvb_company"] a, [class^="nvb_company"]"#);
    static ref LOCATION: Selector = selector(r#"[class^="nvb_location"], [class^="nvb_city"]"#);
}

pub struct NationaleVacatureBankAdapter;

impl SiteAdapter for NationaleVacatureBankAdapter {
    fn identity(&self) -> AdapterIdentity {
        AdapterIdentity {
            name: "nationalevacaturebank",
            platform: Platform::NationaleVacatureBank,
        }
    }

    fn is_listing_page(&self, page: &Page) -> bool {
        page.path().contains("/vacature/") || page.exists(&RESULTS)
    }

    fn extract_listings(&self, page: &Page) -> Vec<Listing> {
        select_cards(page, &CARDS)
            .into_iter()
            .filter_map(|card| {
                let url = href_of(page, card)?;
                let mut listing = Listing::new(url, card);
                listing.title = text_in(page, card, &TITLE);
                listing.company = text_in(page, card, &COMPANY);
                listing.location = text_in(page, card, &LOCATION);
                Some(listing)
            })
            .collect()
    }

    fn listing_container(&self, page: &Page) -> Option<NodeId> {
        page.first(&RESULTS)
    }

    fn badge_target(&self, page: &Page, listing: &Listing) -> Option<NodeId> {
        parent_of(page, listing.element, &TITLE).or(Some(listing.element))
    }
}
