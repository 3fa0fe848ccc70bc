//! Polling listing detector.
//!
//! The detector re-reads the page on a fixed interval and hands every
//! non-empty batch of listings to a callback. It remembers nothing between
//! scans: the same listing is reported on every tick and the receiver is
//! expected to skip what it has already handled (badged listings).
//!
//! Lifecycle: `Idle` -> `Active` -> `Stopped`. A page that is not a listing
//! page keeps the detector idle for good; no timer is armed.

use crate::page::SharedPage;
use crate::sites::SiteAdapter;
use crate::types::Listing;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};

/// Receives each non-empty batch of listings
pub type ListingCallback = Rc<dyn Fn(Vec<Listing>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Not started, or started on a page without listings
    Idle,
    /// Scanning on the interval
    Active,
    /// Timer cancelled and callback released
    Stopped,
}

/// Polls one page through one site adapter.
///
/// Must be started from inside a `tokio::task::LocalSet`.
#[derive(Clone)]
pub struct Detector {
    inner: Rc<DetectorInner>,
}

struct DetectorInner {
    adapter: Rc<dyn SiteAdapter>,
    page: SharedPage,
    interval: Duration,
    state: Cell<DetectorState>,
    /// `start` only ever takes effect once
    started: Cell<bool>,
    callback: RefCell<Option<ListingCallback>>,
    timer: RefCell<Option<JoinHandle<()>>>,
    scans: Cell<u64>,
}

impl Detector {
    pub fn new(
        adapter: Rc<dyn SiteAdapter>,
        page: SharedPage,
        interval: Duration,
        callback: impl Fn(Vec<Listing>) + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(DetectorInner {
                adapter,
                page,
                interval,
                state: Cell::new(DetectorState::Idle),
                started: Cell::new(false),
                callback: RefCell::new(Some(Rc::new(callback))),
                timer: RefCell::new(None),
                scans: Cell::new(0),
            }),
        }
    }

    pub fn state(&self) -> DetectorState {
        self.inner.state.get()
    }

    /// Number of scans performed so far
    pub fn scan_count(&self) -> u64 {
        self.inner.scans.get()
    }

    /// Scan now, then keep scanning on the interval.
    ///
    /// Does nothing on a page the adapter does not consider a listing page,
    /// and nothing on any call after the first.
    pub fn start(&self) {
        let inner = &self.inner;
        if inner.started.replace(true) {
            debug!("{}: detector already started", inner.name());
            return;
        }

        let listing_page = match inner.page.try_borrow() {
            Ok(page) => inner.adapter.is_listing_page(&page),
            Err(e) => {
                error!("{}: page unavailable at start: {}", inner.name(), e);
                false
            }
        };
        if !listing_page {
            debug!("{}: not a listing page, detector stays idle", inner.name());
            return;
        }

        inner.state.set(DetectorState::Active);
        info!(
            "{}: scanning for listings every {:?}",
            inner.name(),
            inner.interval
        );
        inner.scan();

        // The callback may have stopped us already
        if inner.state.get() != DetectorState::Active {
            return;
        }

        let handle = tokio::task::spawn_local(run_timer(Rc::downgrade(inner), inner.interval));
        *inner.timer.borrow_mut() = Some(handle);
    }

    /// Cancel the timer and release the callback. Safe to call repeatedly.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Closure that stops this detector if it still exists
    pub fn stop_handle(&self) -> impl Fn() + 'static {
        let weak = Rc::downgrade(&self.inner);
        move || {
            if let Some(inner) = weak.upgrade() {
                inner.stop();
            }
        }
    }

    /// One scan outside the timer cadence. Ignored once stopped.
    pub fn rescan(&self) {
        if self.inner.state.get() == DetectorState::Stopped {
            trace!("{}: rescan after stop ignored", self.inner.name());
            return;
        }
        self.inner.scan();
    }
}

impl DetectorInner {
    fn name(&self) -> &'static str {
        self.adapter.identity().name
    }

    fn scan(&self) {
        self.scans.set(self.scans.get() + 1);

        let listings = match self.page.try_borrow() {
            Ok(page) => self.adapter.extract_listings(&page),
            Err(e) => {
                // Skip this tick; the timer keeps running
                error!("{}: error scanning for listings: {}", self.name(), e);
                return;
            }
        };

        if listings.is_empty() {
            trace!("{}: no listings on page", self.name());
            return;
        }

        trace!("{}: found {} listings", self.name(), listings.len());

        // Clone out so the callback may stop the detector
        let callback = self.callback.borrow().clone();
        if let Some(callback) = callback {
            callback(listings);
        }
    }

    fn stop(&self) {
        if self.state.replace(DetectorState::Stopped) == DetectorState::Stopped {
            return;
        }

        if let Some(handle) = self.timer.borrow_mut().take() {
            handle.abort();
        }
        self.callback.borrow_mut().take();
        debug!("{}: detector stopped", self.name());
    }
}

impl Drop for DetectorInner {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_timer(detector: Weak<DetectorInner>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = detector.upgrade() else {
            break;
        };
        if inner.state.get() != DetectorState::Active {
            break;
        }
        inner.scan();
    }
}
