//! The live page: URL plus a mutable HTML tree.
//!
//! Site adapters read listings from it and the matcher writes badges into it.
//! Node handles (`NodeId`) stay valid until the body is replaced, which is how
//! a page re-render is modelled.

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Node, Selector};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;
use url::Url;

/// Page shared between the detector and the matcher.
///
/// Everything runs on one cooperative thread, so a `RefCell` is enough.
pub type SharedPage = Rc<RefCell<Page>>;

pub struct Page {
    url: Url,
    html: Html,
}

impl Page {
    /// Parse a full HTML document served at `url`
    pub fn parse(url: Url, document: &str) -> Self {
        Self {
            url,
            html: Html::parse_document(document),
        }
    }

    pub fn into_shared(self) -> SharedPage {
        Rc::new(RefCell::new(self))
    }

    /// Lower-cased hostname ("" when the URL has none)
    pub fn hostname(&self) -> String {
        self.url.host_str().unwrap_or_default().to_lowercase()
    }

    /// Path component of the page URL
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Scheme, host and port, e.g. `https://www.linkedin.com`
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Re-render the page from new markup. All earlier node handles become stale.
    pub fn replace_document(&mut self, document: &str) {
        self.html = Html::parse_document(document);
    }

    /// Serialize the current tree, badges included
    pub fn html(&self) -> String {
        self.html.html()
    }

    fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(node).and_then(ElementRef::wrap)
    }

    /// All elements in the document matching `selector`, in document order
    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        // Walk the tree rather than the arena: inserted badges live at the
        // end of the arena but not at the end of the document
        self.html
            .root_element()
            .select(selector)
            .map(|el| el.id())
            .collect()
    }

    /// Whether any element in the document matches `selector`
    pub fn exists(&self, selector: &Selector) -> bool {
        self.first(selector).is_some()
    }

    /// First element in the document matching `selector`
    pub fn first(&self, selector: &Selector) -> Option<NodeId> {
        self.html
            .root_element()
            .select(selector)
            .next()
            .map(|el| el.id())
    }

    /// First descendant of `node` matching `selector`
    pub fn first_in(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        self.element(node)?
            .select(selector)
            .next()
            .map(|el| el.id())
    }

    /// Whether `node` has a descendant matching `selector`
    pub fn contains(&self, node: NodeId, selector: &Selector) -> bool {
        self.first_in(node, selector).is_some()
    }

    /// Trimmed text content of `node`, `None` when missing or blank
    pub fn text(&self, node: NodeId) -> Option<String> {
        let text: String = self.element(node)?.text().collect();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Raw text content of `node`, untrimmed
    pub fn raw_text(&self, node: NodeId) -> String {
        self.element(node)
            .map(|el| el.text().collect())
            .unwrap_or_default()
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?.attr(name).map(str::to_string)
    }

    /// Closest ancestor that is an element
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.html
            .tree
            .get(node)?
            .ancestors()
            .find(|ancestor| ancestor.value().is_element())
            .map(|ancestor| ancestor.id())
    }

    /// Resolve an `href` as found in the page to an absolute URL.
    ///
    /// Absolute URLs pass through untouched so the canonicalizer sees exactly
    /// what the site linked to.
    pub fn resolve_href(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }

        if href.starts_with("//") {
            return Some(format!("{}:{}", self.url.scheme(), href));
        }

        if href.starts_with('/') {
            return Some(format!("{}{}", self.origin(), href));
        }

        if Url::parse(href).is_ok() {
            return Some(href.to_string());
        }

        self.url.join(href).ok().map(String::from)
    }

    /// Insert parsed markup as the first children of `target`.
    ///
    /// Returns the handle of the first inserted node.
    pub fn prepend_fragment(&mut self, target: NodeId, fragment: &str) -> Option<NodeId> {
        let parsed = Html::parse_fragment(fragment);
        let wrapper = parsed.root_element();
        let mut first = None;

        // Prepending in reverse keeps the fragment's order
        for child in wrapper.children().rev() {
            let id = self
                .html
                .tree
                .get_mut(target)?
                .prepend(child.value().clone())
                .id();
            copy_subtree(&mut self.html, id, child);
            first = Some(id);
        }

        trace!("Inserted fragment under {:?}", target);
        first
    }
}

fn copy_subtree(html: &mut Html, parent: NodeId, source: ego_tree::NodeRef<'_, Node>) {
    for child in source.children() {
        let id = match html.tree.get_mut(parent) {
            Some(mut node) => node.append(child.value().clone()).id(),
            None => return,
        };
        copy_subtree(html, id, child);
    }
}

/// Parse a selector known at compile time
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, body: &str) -> Page {
        Page::parse(
            Url::parse(url).unwrap(),
            &format!("<html><body>{}</body></html>", body),
        )
    }

    #[test]
    fn test_resolve_href() {
        let page = page("https://www.linkedin.com/jobs/search/?k=rust", "");

        assert_eq!(
            page.resolve_href("/jobs/view/1/"),
            Some("https://www.linkedin.com/jobs/view/1/".to_string())
        );
        assert_eq!(
            page.resolve_href("https://other.com/x?a=1"),
            Some("https://other.com/x?a=1".to_string())
        );
        assert_eq!(
            page.resolve_href("//cdn.linkedin.com/x"),
            Some("https://cdn.linkedin.com/x".to_string())
        );
        assert_eq!(
            page.resolve_href("view/2"),
            Some("https://www.linkedin.com/jobs/search/view/2".to_string())
        );
        assert_eq!(page.resolve_href("   "), None);
    }

    #[test]
    fn test_text_and_attr() {
        let page = page(
            "https://example.com/",
            r#"<div class="card"><a href="/j/1">  Rust  Engineer </a><span class="empty">  </span></div>"#,
        );

        let card = page.first(&selector(".card")).unwrap();
        let link = page.first_in(card, &selector("a")).unwrap();
        assert_eq!(page.text(link).as_deref(), Some("Rust  Engineer"));
        assert_eq!(page.attr(link, "href").as_deref(), Some("/j/1"));

        let empty = page.first_in(card, &selector(".empty")).unwrap();
        assert_eq!(page.text(empty), None);
        assert_eq!(page.parent(link), Some(card));
    }

    #[test]
    fn test_prepend_fragment() {
        let mut page = page(
            "https://example.com/",
            r#"<div class="card"><h2>Title</h2></div>"#,
        );
        let card = page.first(&selector(".card")).unwrap();

        let inserted = page
            .prepend_fragment(card, r#"<div class="badge"><span>JSA</span></div>"#)
            .unwrap();

        assert!(page.contains(card, &selector(".badge > span")));
        assert_eq!(page.parent(inserted), Some(card));
        let html = page.html();
        assert!(html.contains(r#"<div class="card"><div class="badge"><span>JSA</span></div><h2>"#));
    }

    #[test]
    fn test_replace_document() {
        let mut page = page("https://example.com/", r#"<p class="a">one</p>"#);
        assert!(page.exists(&selector(".a")));

        page.replace_document("<html><body><p class=\"b\">two</p></body></html>");
        assert!(!page.exists(&selector(".a")));
        assert!(page.exists(&selector(".b")));
    }
}
