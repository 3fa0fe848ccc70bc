//! Wires the detector and the matcher for one page.

use crate::config::Config;
use crate::detector::{Detector, DetectorState};
use crate::matcher::{Matcher, MatcherSettings};
use crate::page::SharedPage;
use crate::sites::{SiteAdapter, SiteRegistry};
use crate::transport::Transport;
use std::rc::Rc;
use tracing::{debug, info};

/// Annotation session for a single page
pub struct Annotator {
    adapter: Rc<dyn SiteAdapter>,
    detector: Detector,
    matcher: Matcher,
}

impl Annotator {
    /// Set up annotation for `page`.
    ///
    /// Returns `None` when annotation is disabled or no adapter serves the
    /// page's host; nothing is scheduled in that case.
    pub fn attach(
        page: SharedPage,
        registry: &SiteRegistry,
        transport: Rc<dyn Transport>,
        config: &Config,
    ) -> Option<Self> {
        if !config.general.enabled {
            info!("Annotation is disabled in configuration");
            return None;
        }

        let adapter = match page.try_borrow() {
            Ok(page) => registry.adapter_for_page(&page),
            Err(_) => None,
        };
        let Some(adapter) = adapter else {
            debug!(
                "No site adapter for this page (supported: {})",
                registry.names().join(", ")
            );
            return None;
        };

        let matcher = Matcher::new(
            Rc::clone(&adapter),
            page.clone(),
            transport,
            config.canonical.clone(),
            MatcherSettings::from(config),
        );

        let sink = matcher.clone();
        let detector = Detector::new(
            Rc::clone(&adapter),
            page,
            config.timing.scan_interval(),
            move |listings| sink.check_and_annotate(listings),
        );

        // A dead service context ends scanning too
        matcher.set_teardown_hook(detector.stop_handle());

        info!("Attached {} adapter", adapter.identity().name);
        Some(Self {
            adapter,
            detector,
            matcher,
        })
    }

    /// Load the match list, then start scanning
    pub async fn run(&self) {
        self.matcher.initialize().await;
        if self.matcher.is_released() {
            return;
        }
        self.detector.start();
    }

    /// Stop scanning and drop all match state
    pub fn shutdown(&self) {
        self.detector.stop();
        self.matcher.cleanup();
    }

    /// Whether scanning is still going on
    pub fn is_active(&self) -> bool {
        self.detector.state() == DetectorState::Active && !self.matcher.is_released()
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.identity().name
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }
}
