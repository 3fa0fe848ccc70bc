//! Helpers shared by the site adapters.
//!
//! Adapters hold no state of their own; everything they have in common
//! (selector fallback, text cleanup, badge markup) lives here as free functions.

use crate::page::{selector, Page};
use crate::types::BadgeTier;
use ego_tree::NodeId;
use lazy_static::lazy_static;
use scraper::Selector;
use tracing::{debug, trace};

/// Class carried by every injected badge; its presence marks a listing as done
pub const BADGE_CLASS: &str = "jsa-match-badge";

lazy_static! {
    static ref BADGE: Selector = selector(".jsa-match-badge");
}

/// Cards matched by the first selector that matches anything.
///
/// Sites ship new markup without notice, so adapters list the current
/// selector first and older ones after it.
pub fn select_cards(page: &Page, selectors: &[Selector]) -> Vec<NodeId> {
    for (index, selector) in selectors.iter().enumerate() {
        let cards = page.select(selector);
        if !cards.is_empty() {
            trace!("Card selector #{} matched {} cards", index, cards.len());
            return cards;
        }
    }
    Vec::new()
}

/// Trimmed text of the first descendant of `node` matching `selector`
pub fn text_in(page: &Page, node: NodeId, selector: &Selector) -> Option<String> {
    page.first_in(node, selector)
        .and_then(|found| page.text(found))
}

/// Absolute URL from the `href` of `link`
pub fn href_of(page: &Page, link: NodeId) -> Option<String> {
    page.attr(link, "href")
        .and_then(|href| page.resolve_href(&href))
}

/// Parent of the first descendant matching `selector`
pub fn parent_of(page: &Page, node: NodeId, selector: &Selector) -> Option<NodeId> {
    page.first_in(node, selector)
        .and_then(|found| page.parent(found))
}

/// Undo accidental text duplication.
///
/// Some sites render a visible title plus an accessibility copy of it, so the
/// text content reads "FooFoo" or "Senior Engineer Senior Engineer". When the
/// string splits into two identical halves (by characters, or else by words)
/// only the first half is kept.
pub fn collapse_duplicate(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let half = chars.len() / 2;
    let first: String = chars[..half].iter().collect();
    let second: String = chars[half..].iter().collect();
    if !first.is_empty() && first == second {
        return first;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > 2 && words.len() % 2 == 0 {
        let (first, second) = words.split_at(words.len() / 2);
        if first == second {
            return first.join(" ");
        }
    }

    text.to_string()
}

/// Markup for a badge of the given score
pub fn badge_markup(score: f64) -> String {
    let tier = BadgeTier::from_score(score);
    let class = match tier.modifier_class() {
        Some(modifier) => format!("{} {}", BADGE_CLASS, modifier),
        None => BADGE_CLASS.to_string(),
    };

    format!(
        r#"<div class="{}"><span class="jsa-match-badge-text">JSA: {}</span></div>"#,
        class,
        tier.label()
    )
}

/// Whether a badge already sits somewhere inside `node`
pub fn has_badge(page: &Page, node: NodeId) -> bool {
    page.contains(node, &BADGE)
}

/// Prepend a badge to `target`. Returns false when the target vanished.
pub fn insert_badge(page: &mut Page, target: NodeId, score: f64) -> bool {
    match page.prepend_fragment(target, &badge_markup(score)) {
        Some(_) => true,
        None => {
            debug!("Badge target {:?} no longer in page", target);
            false
        }
    }
}
