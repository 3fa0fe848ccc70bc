//! Job Annotator - résumé match badges for job boards
//!
//! This crate reads job listings from supported job boards and marks the
//! ones the match service scores highly for the active résumé:
//!
//! - **Sites**: one adapter per board turns its markup into listings
//! - **Detector**: polls the page and reports listings on a fixed interval
//! - **Matcher**: caches the service's match list and inserts badges
//!
//! # Architecture
//!
//! Everything for one page runs on a single thread inside a tokio `LocalSet`.
//! The match list is fetched up front and refreshed every couple of minutes;
//! badging a listing is a cache lookup keyed by canonical URL, so the scan
//! loop never waits on the network.

pub mod annotator;
pub mod canonical;
pub mod config;
pub mod detector;
pub mod matcher;
pub mod page;
pub mod sites;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use annotator::Annotator;
pub use canonical::{canonicalize, CanonicalRules, HostRule, QueryPolicy};
pub use config::Config;
pub use detector::{Detector, DetectorState};
pub use matcher::{Matcher, MatcherSettings, MatcherStats};
pub use page::{Page, SharedPage};
pub use sites::{AdapterIdentity, SiteAdapter, SiteRegistry};
pub use transport::{
    ContentMessage, ServiceResponse, SocketTransport, Transport, TransportError,
};
pub use types::{BadgeTier, Listing, MatchEntry, Platform};
