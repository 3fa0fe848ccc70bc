//! Platform-aware URL canonicalization.
//!
//! The scoring service indexes every job under a canonical URL produced by its
//! own canonicalizer. Listings observed on a page must be mapped to the exact
//! same string, otherwise a cache lookup misses and no badge appears even
//! though the service has a match. The rule table below therefore has to stay
//! identical to the server-side table for every platform.
//!
//! Algorithm:
//! 1. Escape every `%` that is not followed by two hex digits as `%25`
//! 2. Parse; unparseable input is returned unchanged
//! 3. Lower-case the hostname (path and query keep their case)
//! 4. Strip or keep the query string according to the first matching host rule
//! 5. Serialize

use crate::types::Platform;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::trace;
use url::Url;

lazy_static! {
    // A '%' optionally followed by a valid two-digit escape
    static ref PERCENT_ESCAPE: Regex = Regex::new(r"%([0-9A-Fa-f]{2})?").unwrap();

    static ref DEFAULT_RULES: CanonicalRules = CanonicalRules::default();
}

/// What to do with the query string of a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryPolicy {
    /// Drop all query parameters
    Strip,
    /// Keep query parameters verbatim
    Keep,
}

/// One entry of the rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRule {
    /// Lower-case fragment matched against the hostname
    pub host: String,
    /// Policy applied when the fragment matches
    pub query: QueryPolicy,
}

impl HostRule {
    pub fn new(host: &str, query: QueryPolicy) -> Self {
        Self {
            host: host.to_string(),
            query,
        }
    }
}

/// Ordered canonicalization rule table.
///
/// Also the `[canonical]` section of the configuration file, so a platform
/// whose server-side rule differs can be added by config rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRules {
    #[serde(default = "default_rules")]
    pub rules: Vec<HostRule>,

    /// Policy for hosts that match no rule
    #[serde(default = "default_query_policy")]
    pub default_query: QueryPolicy,
}

impl Default for CanonicalRules {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            default_query: default_query_policy(),
        }
    }
}

fn default_rules() -> Vec<HostRule> {
    vec![
        HostRule::new("linkedin", QueryPolicy::Strip),
        HostRule::new("werkzoeken", QueryPolicy::Strip),
        HostRule::new("glassdoor", QueryPolicy::Keep),
        HostRule::new("nationalevacaturebank", QueryPolicy::Keep),
    ]
}

fn default_query_policy() -> QueryPolicy {
    QueryPolicy::Strip
}

impl CanonicalRules {
    /// Map a raw URL to its canonical form. Never fails.
    ///
    /// Only the URL's own hostname selects the rule. `platform_hint` names the
    /// page the URL was seen on and never changes the result, so an off-site
    /// link on a query-keeping board still gets the unknown-host policy.
    pub fn canonicalize(&self, raw: &str, platform_hint: Option<Platform>) -> String {
        if raw.is_empty() {
            return String::new();
        }

        let repaired = repair_percent_encoding(raw);

        let mut parsed = match Url::parse(&repaired) {
            Ok(url) => url,
            Err(e) => {
                trace!("Leaving unparseable URL as-is ({}): {}", e, raw);
                return raw.to_string();
            }
        };

        // Special schemes already come back lower-cased; others keep their case
        if let Some(host) = parsed.host_str() {
            let lowered = host.to_lowercase();
            if lowered != host && parsed.set_host(Some(&lowered)).is_err() {
                return raw.to_string();
            }
        }

        let host = parsed.host_str().unwrap_or_default().to_string();
        let policy = self.policy_for(&host);
        if let Some(platform) = platform_hint {
            if Platform::from_hostname(&host) != Some(platform) {
                trace!("{} link seen on a {} page, policy {:?}", host, platform, policy);
            }
        }
        if policy == QueryPolicy::Strip {
            parsed.set_query(None);
        }

        parsed.into()
    }

    /// Query policy for a (lower-case) hostname
    pub fn policy_for(&self, host: &str) -> QueryPolicy {
        self.rules
            .iter()
            .find(|rule| host.contains(&rule.host))
            .map(|rule| rule.query)
            .unwrap_or(self.default_query)
    }
}

/// Canonicalize with the built-in rule table
pub fn canonicalize(raw: &str, platform_hint: Option<Platform>) -> String {
    DEFAULT_RULES.canonicalize(raw, platform_hint)
}

/// Escape stray `%` characters so strict URL parsing accepts the input.
///
/// `"job-80-100%-at-company"` becomes `"job-80-100%25-at-company"`; valid
/// escapes such as `%20` are left alone.
pub fn repair_percent_encoding(raw: &str) -> Cow<'_, str> {
    PERCENT_ESCAPE.replace_all(raw, |caps: &Captures| {
        if caps.get(1).is_some() {
            caps[0].to_string()
        } else {
            "%25".to_string()
        }
    })
}
