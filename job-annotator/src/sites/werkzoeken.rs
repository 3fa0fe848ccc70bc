//! WerkZoeken.nl vacancy lists.
//!
//! Cards are links inside `div.vacancies-wrapper`. The company name is nested
//! inside the location span ("Utrecht - <span>Acme</span>"), so the location
//! is whatever remains once the company text is removed.

use super::common::{href_of, parent_of, select_cards, text_in};
use super::{AdapterIdentity, SiteAdapter};
use crate::page::{selector, Page};
use crate::types::{Listing, Platform};
use ego_tree::NodeId;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::Selector;

lazy_static! {
    static ref WRAPPER: Selector = selector("div.vacancies-wrapper");
    static ref CARDS: Vec<Selector> =
        vec![selector(r#"div.vacancies-wrapper div:not([class]) a[href*="/vacature"]"#)];
    static ref TITLE: Selector = selector("h2");
    static ref LOCATION: Selector = selector("span.location");
    static ref COMPANY: Selector = selector(r#"span[class^="fake-link"]"#);

    static ref TRAILING_SEPARATOR: Regex = Regex::new(r"\s*[-–]\s*$").unwrap();
}

pub struct WerkZoekenAdapter;

impl WerkZoekenAdapter {
    /// Company and location from the combined location span
    fn company_and_location(&self, page: &Page, card: NodeId) -> (Option<String>, Option<String>) {
        let Some(span) = page.first_in(card, &LOCATION) else {
            return (None, None);
        };

        let full = page.raw_text(span);
        let company_node = page.first_in(span, &COMPANY);
        let company = company_node.and_then(|node| page.text(node));

        let location = match company_node {
            Some(node) => {
                let without = full.replacen(&page.raw_text(node), "", 1);
                TRAILING_SEPARATOR
                    .replace(without.trim(), "")
                    .trim()
                    .to_string()
            }
            None => full.trim().to_string(),
        };

        let location = if location.is_empty() { None } else { Some(location) };
        (company, location)
    }
}

impl SiteAdapter for WerkZoekenAdapter {
    fn identity(&self) -> AdapterIdentity {
        AdapterIdentity {
            name: "werkzoeken",
            platform: Platform::WerkZoeken,
        }
    }

    fn is_listing_page(&self, page: &Page) -> bool {
        page.path().contains("/vacature") || page.exists(&WRAPPER)
    }

    fn extract_listings(&self, page: &Page) -> Vec<Listing> {
        select_cards(page, &CARDS)
            .into_iter()
            .filter_map(|card| {
                let url = href_of(page, card)?;
                let (company, location) = self.company_and_location(page, card);

                let mut listing = Listing::new(url, card);
                listing.title = text_in(page, card, &TITLE);
                listing.company = company;
                listing.location = location;
                Some(listing)
            })
            .collect()
    }

    fn listing_container(&self, page: &Page) -> Option<NodeId> {
        page.first(&WRAPPER)
    }

    fn badge_target(&self, page: &Page, listing: &Listing) -> Option<NodeId> {
        parent_of(page, listing.element, &TITLE).or(Some(listing.element))
    }
}
