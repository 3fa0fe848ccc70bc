//! Match cache, periodic refresh and link submission.
//!
//! The matcher keeps the service's current match list in memory, keyed by
//! canonical URL, and badges listings by plain lookup. Network traffic only
//! happens on the refresh timer and on the fire-and-forget submission path,
//! never while annotating.
//!
//! Every refresh replaces the cache as a whole. A failed refresh leaves the
//! previous cache in place until the next successful one.

use crate::canonical::CanonicalRules;
use crate::config::Config;
use crate::page::SharedPage;
use crate::sites::SiteAdapter;
use crate::transport::{ContentMessage, ServiceResponse, Transport, TransportError};
use crate::types::{Listing, Platform};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Matcher tuning, usually taken from [`Config`]
#[derive(Debug, Clone)]
pub struct MatcherSettings {
    /// Minimum score requested from the service
    pub min_score: f64,
    /// Time between refreshes after the initial fetch
    pub refresh_interval: Duration,
    /// Wait before retrying a service that was not ready
    pub retry_backoff: Duration,
    /// Attempts per request, first try included
    pub max_attempts: u32,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for MatcherSettings {
    fn from(config: &Config) -> Self {
        Self {
            min_score: config.matching.min_score,
            refresh_interval: config.timing.refresh_interval(),
            retry_backoff: config.timing.retry_backoff(),
            max_attempts: config.matching.max_attempts,
        }
    }
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatcherStats {
    /// Cache lookups made while annotating
    pub lookups: u64,
    /// Badges inserted
    pub badges: u64,
    /// Successful refreshes
    pub refreshes: u64,
}

/// Runs when the service reports that this page's context is gone
pub type TeardownHook = Box<dyn FnOnce()>;

/// Cheap to clone; clones share state.
///
/// Must be used from inside a `tokio::task::LocalSet`.
#[derive(Clone)]
pub struct Matcher {
    inner: Rc<MatcherInner>,
}

struct MatcherInner {
    adapter: Rc<dyn SiteAdapter>,
    page: SharedPage,
    transport: Rc<dyn Transport>,
    rules: CanonicalRules,
    settings: MatcherSettings,
    /// Derived from the page hostname, not from the adapter
    platform: Option<Platform>,

    cache: RefCell<HashMap<String, f64>>,
    submitted: RefCell<HashSet<String>>,
    refresh_timer: RefCell<Option<JoinHandle<()>>>,
    released: Cell<bool>,
    teardown: RefCell<Option<TeardownHook>>,
    stats: Cell<MatcherStats>,
}

impl Matcher {
    pub fn new(
        adapter: Rc<dyn SiteAdapter>,
        page: SharedPage,
        transport: Rc<dyn Transport>,
        rules: CanonicalRules,
        settings: MatcherSettings,
    ) -> Self {
        let hostname = page
            .try_borrow()
            .map(|page| page.hostname())
            .unwrap_or_default();
        let platform = Platform::from_hostname(&hostname);

        let identity = adapter.identity();
        if platform != Some(identity.platform) {
            warn!(
                "Adapter {} serves {} but hostname {} maps to {:?}",
                identity.name, identity.platform, hostname, platform
            );
        }

        Self {
            inner: Rc::new(MatcherInner {
                adapter,
                page,
                transport,
                rules,
                settings,
                platform,
                cache: RefCell::new(HashMap::new()),
                submitted: RefCell::new(HashSet::new()),
                refresh_timer: RefCell::new(None),
                released: Cell::new(false),
                teardown: RefCell::new(None),
                stats: Cell::new(MatcherStats::default()),
            }),
        }
    }

    /// Install the hook run after an invalidation cleanup
    pub fn set_teardown_hook(&self, hook: impl FnOnce() + 'static) {
        *self.inner.teardown.borrow_mut() = Some(Box::new(hook));
    }

    /// Platform the service is asked about (`None` for unknown hosts)
    pub fn platform(&self) -> Option<Platform> {
        self.inner.platform
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }

    pub fn stats(&self) -> MatcherStats {
        self.inner.stats.get()
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.borrow().len()
    }

    pub fn submitted_len(&self) -> usize {
        self.inner.submitted.borrow().len()
    }

    /// Cached score for a raw URL
    pub fn cached_score(&self, url: &str) -> Option<f64> {
        let canonical = self.inner.rules.canonicalize(url, self.inner.platform);
        self.inner.cache.borrow().get(&canonical).copied()
    }

    /// Fetch the match list once, then keep it fresh on the refresh interval
    pub async fn initialize(&self) {
        self.refresh().await;

        if self.is_released() || self.inner.refresh_timer.borrow().is_some() {
            return;
        }

        let handle = tokio::task::spawn_local(run_refresh_timer(
            Rc::downgrade(&self.inner),
            self.inner.settings.refresh_interval,
        ));
        *self.inner.refresh_timer.borrow_mut() = Some(handle);
        debug!(
            "Refreshing matches every {:?}",
            self.inner.settings.refresh_interval
        );
    }

    /// Replace the cache with the service's current match list
    pub async fn refresh(&self) {
        if self.is_released() {
            trace!("Refresh after cleanup ignored");
            return;
        }

        let message = ContentMessage::CheckJobMatches {
            min_score: Some(self.inner.settings.min_score),
            platform_source: self
                .inner
                .platform
                .map(|platform| platform.source_name().to_string()),
        };

        let response = match self.send_with_retry(&message).await {
            Ok(response) => response,
            Err(TransportError::ContextInvalidated) => return,
            Err(e) => {
                if !self.is_released() {
                    error!("Failed to fetch matches: {}", e);
                }
                return;
            }
        };

        // Results arriving after cleanup are dropped
        if self.is_released() {
            return;
        }

        let matches = match response.matches() {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Match service declined match request: {}", e);
                return;
            }
        };

        let fresh: HashMap<String, f64> = matches
            .into_iter()
            .map(|entry| {
                let canonical = self.inner.rules.canonicalize(&entry.url, self.inner.platform);
                (canonical, entry.score)
            })
            .collect();

        debug!("Match cache refreshed with {} entries", fresh.len());
        *self.inner.cache.borrow_mut() = fresh;

        let mut stats = self.inner.stats.get();
        stats.refreshes += 1;
        self.inner.stats.set(stats);
    }

    /// Badge cached matches and queue new URLs for indexing.
    ///
    /// Listings that already carry a badge are skipped entirely. Never waits
    /// on the network.
    pub fn check_and_annotate(&self, listings: Vec<Listing>) {
        if self.is_released() {
            trace!("Annotation after cleanup ignored");
            return;
        }

        let inner = &self.inner;
        let mut to_submit = Vec::new();
        let mut stats = inner.stats.get();

        {
            let mut page = match inner.page.try_borrow_mut() {
                Ok(page) => page,
                Err(e) => {
                    warn!("Page busy, skipping annotation pass: {}", e);
                    return;
                }
            };
            let cache = inner.cache.borrow();
            let mut submitted = inner.submitted.borrow_mut();

            for listing in &listings {
                if inner.adapter.has_badge(&page, listing) {
                    continue;
                }

                let canonical = inner.rules.canonicalize(&listing.url, inner.platform);
                stats.lookups += 1;

                if let Some(&score) = cache.get(&canonical) {
                    if inner.adapter.inject_badge(&mut page, listing, score) {
                        stats.badges += 1;
                        debug!("Badged {} ({:.2})", canonical, score);
                    }
                }

                if submitted.insert(canonical.clone()) {
                    to_submit.push(canonical);
                }
            }
        }

        inner.stats.set(stats);

        if !to_submit.is_empty() {
            self.submit(to_submit);
        }
    }

    /// Stop refreshing and drop all cached state. Safe to call repeatedly.
    pub fn cleanup(&self) {
        let inner = &self.inner;
        if inner.released.replace(true) {
            return;
        }

        if let Some(handle) = inner.refresh_timer.borrow_mut().take() {
            handle.abort();
        }
        inner.cache.borrow_mut().clear();
        inner.submitted.borrow_mut().clear();
        debug!("Matcher cleaned up");
    }

    /// Send in the background; the outcome only matters for logs
    fn submit(&self, urls: Vec<String>) {
        let matcher = self.clone();
        tokio::task::spawn_local(async move {
            let count = urls.len();
            let message = ContentMessage::SubmitLinks { urls };
            match matcher.send_with_retry(&message).await {
                Ok(response) => match response.submit_result() {
                    Ok(result) => debug!(
                        "Submitted {} links ({} new, {} known)",
                        count, result.submitted, result.skipped
                    ),
                    Err(e) => debug!("Link submission declined: {}", e),
                },
                Err(e) => debug!("Link submission failed: {}", e),
            }
        });
    }

    async fn send_with_retry(
        &self,
        message: &ContentMessage,
    ) -> Result<ServiceResponse, TransportError> {
        let max_attempts = self.inner.settings.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if self.is_released() {
                return Err(TransportError::Failed("Matcher released".to_string()));
            }

            match self.inner.transport.send(message).await {
                Ok(response) => return Ok(response),
                Err(TransportError::ContextInvalidated) => {
                    info!("Match service context invalidated, stopping annotations");
                    self.invalidate();
                    return Err(TransportError::ContextInvalidated);
                }
                Err(TransportError::NotReady) if attempt < max_attempts => {
                    debug!(
                        "Match service not ready (attempt {}/{}), retrying",
                        attempt, max_attempts
                    );
                    attempt += 1;
                    tokio::time::sleep(self.inner.settings.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn invalidate(&self) {
        self.cleanup();
        let hook = self.inner.teardown.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl Drop for MatcherInner {
    fn drop(&mut self) {
        if let Some(handle) = self.refresh_timer.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_refresh_timer(matcher: Weak<MatcherInner>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = matcher.upgrade() else {
            break;
        };
        let matcher = Matcher { inner };
        if matcher.is_released() {
            break;
        }
        matcher.refresh().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::{GlassdoorAdapter, LinkedInAdapter};
    use crate::testing::{job_url, linkedin_page, linkedin_results, page_at, FakeTransport};
    use tokio::task::LocalSet;

    fn matcher_for(page: SharedPage, transport: Rc<FakeTransport>) -> Matcher {
        Matcher::new(
            Rc::new(LinkedInAdapter),
            page,
            transport,
            CanonicalRules::default(),
            MatcherSettings::default(),
        )
    }

    fn scan(matcher: &Matcher, page: &SharedPage) {
        let listings = LinkedInAdapter.extract_listings(&page.borrow());
        matcher.check_and_annotate(listings);
    }

    fn badge_count(page: &SharedPage) -> usize {
        page.borrow().html().matches("jsa-match-badge-text").count()
    }

    /// Let spawned submissions run
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_canonical_lookup_bridges_query_strings() {
        LocalSet::new()
            .run_until(async {
                let page = page_at(
                    "https://www.linkedin.com/jobs/search/",
                    r#"<div class="job-card-container"><div class="row"><a class="job-card-list__title" href="https://www.linkedin.com/jobs/view/123?refId=abc">Rust</a></div></div>"#,
                );
                let transport = FakeTransport::new();
                transport.set_matches(&[("https://www.linkedin.com/jobs/view/123", 0.85)]);
                let matcher = matcher_for(page.clone(), transport.clone());

                matcher.initialize().await;
                assert_eq!(
                    matcher.cached_score("https://www.linkedin.com/jobs/view/123?refId=abc"),
                    Some(0.85)
                );

                scan(&matcher, &page);
                let html = page.borrow().html();
                assert!(html.contains("jsa-match-badge--gold"));
                assert!(html.contains("JSA: Excellent match!"));
                assert_eq!(matcher.stats().badges, 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_site_link_on_glassdoor_is_badged() {
        LocalSet::new()
            .run_until(async {
                let page = page_at(
                    "https://www.glassdoor.nl/Job/rust-jobs.htm",
                    r#"<div class="JobCard_jobCardContainer__a"><div class="JobCard_headerRow"><a class="JobCard_jobTitle__b" href="https://partner.example.com/apply?id=7">Rust</a></div></div>"#,
                );
                let transport = FakeTransport::new();
                transport.set_matches(&[("https://partner.example.com/apply", 0.9)]);
                let matcher = Matcher::new(
                    Rc::new(GlassdoorAdapter),
                    page.clone(),
                    transport.clone(),
                    CanonicalRules::default(),
                    MatcherSettings::default(),
                );

                matcher.initialize().await;
                assert_eq!(matcher.platform(), Some(Platform::Glassdoor));

                let listings = GlassdoorAdapter.extract_listings(&page.borrow());
                matcher.check_and_annotate(listings);
                settle().await;

                assert_eq!(matcher.stats().badges, 1);
                assert_eq!(badge_count(&page), 1);
                assert_eq!(
                    transport.submitted_urls(),
                    vec!["https://partner.example.com/apply".to_string()]
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_carries_platform_and_min_score() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new();
                let matcher = matcher_for(linkedin_page(&[]), transport.clone());
                matcher.initialize().await;

                assert_eq!(
                    transport.sent.borrow()[0],
                    ContentMessage::CheckJobMatches {
                        min_score: Some(0.5),
                        platform_source: Some("LinkedIn".to_string()),
                    }
                );

                // Unknown host: no platform filter
                let transport = FakeTransport::new();
                let page = page_at("https://jobs.example.com/jobs/", "<html></html>");
                let matcher = matcher_for(page, transport.clone());
                assert_eq!(matcher.platform(), None);
                matcher.refresh().await;
                assert_eq!(
                    transport.sent.borrow()[0],
                    ContentMessage::CheckJobMatches {
                        min_score: Some(0.5),
                        platform_source: None,
                    }
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_badged_listing_is_skipped() {
        LocalSet::new()
            .run_until(async {
                let page = linkedin_page(&[1]);
                let transport = FakeTransport::new();
                transport.set_matches(&[(&job_url(1), 0.7)]);
                let matcher = matcher_for(page.clone(), transport.clone());
                matcher.initialize().await;

                scan(&matcher, &page);
                assert_eq!(matcher.stats().lookups, 1);
                assert_eq!(badge_count(&page), 1);

                // Cache now says something else; the badge stays and no lookup happens
                transport.set_matches(&[(&job_url(1), 0.95)]);
                matcher.refresh().await;
                scan(&matcher, &page);
                scan(&matcher, &page);

                assert_eq!(matcher.stats().lookups, 1);
                assert_eq!(badge_count(&page), 1);
                assert!(page.borrow().html().contains("jsa-match-badge--green"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_refresh_replaces_cache() {
        LocalSet::new()
            .run_until(async {
                let page = linkedin_page(&[1, 2]);
                let transport = FakeTransport::new();
                transport.set_matches(&[(&job_url(1), 0.8), (&job_url(2), 0.6)]);
                let matcher = matcher_for(page.clone(), transport.clone());

                matcher.initialize().await;
                assert_eq!(matcher.cache_len(), 2);

                transport.set_matches(&[]);
                tokio::time::sleep(Duration::from_secs(121)).await;
                assert_eq!(transport.check_count(), 2);
                assert_eq!(matcher.cache_len(), 0);

                scan(&matcher, &page);
                assert_eq!(badge_count(&page), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_cache() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new();
                transport.set_matches(&[(&job_url(1), 0.8)]);
                let matcher = matcher_for(linkedin_page(&[1]), transport.clone());
                matcher.initialize().await;

                transport.push(Err(TransportError::Failed("boom".to_string())));
                matcher.refresh().await;
                assert_eq!(matcher.cached_score(&job_url(1)), Some(0.8));

                transport.push(Ok(ServiceResponse::error("Not authenticated")));
                matcher.refresh().await;
                assert_eq!(matcher.cached_score(&job_url(1)), Some(0.8));
                assert_eq!(matcher.stats().refreshes, 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_is_retried_once() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new();
                transport.set_matches(&[(&job_url(1), 0.8)]);
                transport.push(Err(TransportError::NotReady));
                let matcher = matcher_for(linkedin_page(&[1]), transport.clone());

                let started = Instant::now();
                matcher.refresh().await;
                assert_eq!(transport.check_count(), 2);
                assert!(started.elapsed() >= Duration::from_millis(100));
                assert_eq!(matcher.cache_len(), 1);

                // Attempts are bounded
                transport.push(Err(TransportError::NotReady));
                transport.push(Err(TransportError::NotReady));
                transport.push(Err(TransportError::NotReady));
                matcher.refresh().await;
                assert_eq!(transport.check_count(), 4);
                assert_eq!(matcher.cache_len(), 1);
                assert!(!matcher.is_released());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_tears_down() {
        LocalSet::new()
            .run_until(async {
                let page = linkedin_page(&[1]);
                let transport = FakeTransport::new();
                transport.set_matches(&[(&job_url(1), 0.8)]);
                let matcher = matcher_for(page.clone(), transport.clone());
                let torn_down = Rc::new(Cell::new(0));
                let flag = torn_down.clone();
                matcher.set_teardown_hook(move || flag.set(flag.get() + 1));

                matcher.initialize().await;
                transport.push(Err(TransportError::ContextInvalidated));
                tokio::time::sleep(Duration::from_secs(121)).await;

                assert!(matcher.is_released());
                assert_eq!(torn_down.get(), 1);
                assert_eq!(matcher.cache_len(), 0);

                // Nothing runs any more
                let sent = transport.sent.borrow().len();
                tokio::time::sleep(Duration::from_secs(600)).await;
                scan(&matcher, &page);
                settle().await;
                assert_eq!(transport.sent.borrow().len(), sent);
                assert_eq!(badge_count(&page), 0);
                assert_eq!(torn_down.get(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_stops_lookups_and_network() {
        LocalSet::new()
            .run_until(async {
                let page = linkedin_page(&[1, 2]);
                let transport = FakeTransport::new();
                transport.set_matches(&[(&job_url(1), 0.8)]);
                let matcher = matcher_for(page.clone(), transport.clone());
                matcher.initialize().await;

                matcher.cleanup();
                matcher.cleanup();
                assert_eq!(matcher.cache_len(), 0);
                assert_eq!(matcher.submitted_len(), 0);

                let sent = transport.sent.borrow().len();
                let lookups = matcher.stats().lookups;

                scan(&matcher, &page);
                matcher.refresh().await;
                tokio::time::sleep(Duration::from_secs(600)).await;

                assert_eq!(transport.sent.borrow().len(), sent);
                assert_eq!(matcher.stats().lookups, lookups);
                assert_eq!(badge_count(&page), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_url_submitted_once() {
        LocalSet::new()
            .run_until(async {
                let page = linkedin_page(&[1, 2, 3]);
                let transport = FakeTransport::new();
                let matcher = matcher_for(page.clone(), transport.clone());
                matcher.initialize().await;

                for _ in 0..100 {
                    scan(&matcher, &page);
                }
                settle().await;

                let mut urls = transport.submitted_urls();
                urls.sort();
                assert_eq!(urls, vec![job_url(1), job_url(2), job_url(3)]);
                assert_eq!(matcher.submitted_len(), 3);

                // New cards after a re-render are submitted, old ones are not
                page.borrow_mut().replace_document(&linkedin_results(&[3, 4]));
                scan(&matcher, &page);
                settle().await;
                assert_eq!(transport.submitted_urls().len(), 4);
                assert_eq!(transport.submitted_urls()[3], job_url(4));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_failure_is_swallowed() {
        LocalSet::new()
            .run_until(async {
                let page = linkedin_page(&[1]);
                let transport = FakeTransport::new();
                transport.set_matches(&[(&job_url(1), 0.66)]);
                let matcher = matcher_for(page.clone(), transport.clone());
                matcher.initialize().await;

                transport.push(Err(TransportError::Failed("indexer down".to_string())));
                scan(&matcher, &page);
                settle().await;

                assert_eq!(badge_count(&page), 1);
                assert_eq!(matcher.submitted_len(), 1);
                assert!(!matcher.is_released());
            })
            .await;
    }
}
