//! Core types shared by the detector, the matcher and the site adapters.
//!
//! This module defines listings as seen on a page, match entries as returned
//! by the scoring service, the platform identity derived from a hostname, and
//! the badge tiers.

use ego_tree::NodeId;
use serde::{Deserialize, Serialize};

/// Badge tier boundary for the top tier
pub const TOP_TIER_SCORE: f64 = 0.75;

/// Badge tier boundary for the mid tier
pub const MID_TIER_SCORE: f64 = 0.65;

/// A job board whose listings we know how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    LinkedIn,
    Glassdoor,
    NationaleVacatureBank,
    WerkZoeken,
}

impl Platform {
    /// All platforms, in hostname dispatch order
    pub const ALL: [Platform; 4] = [
        Platform::LinkedIn,
        Platform::Glassdoor,
        Platform::NationaleVacatureBank,
        Platform::WerkZoeken,
    ];

    /// Lower-case fragment that identifies the platform inside a hostname
    pub fn host_fragment(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Glassdoor => "glassdoor",
            Platform::NationaleVacatureBank => "nationalevacaturebank",
            Platform::WerkZoeken => "werkzoeken",
        }
    }

    /// Source name as indexed by the scoring service.
    ///
    /// These strings are a wire contract: the service filters on them verbatim.
    pub fn source_name(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "LinkedIn",
            Platform::Glassdoor => "Glassdoor",
            Platform::NationaleVacatureBank => "NationaleVacatureBank",
            Platform::WerkZoeken => "WerkZoeken",
        }
    }

    /// Derive the platform from a page hostname (case-insensitive substring match)
    pub fn from_hostname(hostname: &str) -> Option<Platform> {
        let hostname = hostname.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|platform| hostname.contains(platform.host_fragment()))
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.source_name())
    }
}

/// A job listing found on the current page.
///
/// `element` is a handle into the page tree, valid for the scan that produced
/// it. Listings are never kept across scans.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    /// Absolute URL of the job posting, as linked from the page
    pub url: String,
    /// Job title
    pub title: Option<String>,
    /// Hiring company
    pub company: Option<String>,
    /// Job location
    pub location: Option<String>,
    /// The listing card in the page tree
    pub element: NodeId,
}

impl Listing {
    pub fn new(url: String, element: NodeId) -> Self {
        Self {
            url,
            title: None,
            company: None,
            location: None,
            element,
        }
    }
}

/// A job the scoring service considers a match for the active résumé
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    /// URL as indexed by the service
    pub url: String,
    /// Similarity score in [0, 1]
    pub score: f64,
}

/// Visual tier of a match badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTier {
    /// Score >= 0.75
    Top,
    /// 0.65 <= score < 0.75
    Mid,
    /// Anything above the service threshold but below 0.65
    Base,
}

impl BadgeTier {
    pub fn from_score(score: f64) -> Self {
        if score >= TOP_TIER_SCORE {
            BadgeTier::Top
        } else if score >= MID_TIER_SCORE {
            BadgeTier::Mid
        } else {
            BadgeTier::Base
        }
    }

    /// Modifier class added next to the badge marker class
    pub fn modifier_class(&self) -> Option<&'static str> {
        match self {
            BadgeTier::Top => Some("jsa-match-badge--gold"),
            BadgeTier::Mid => Some("jsa-match-badge--green"),
            BadgeTier::Base => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BadgeTier::Top => "Excellent match!",
            BadgeTier::Mid => "Good match!",
            BadgeTier::Base => "Worth checking out!",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_hostname() {
        assert_eq!(
            Platform::from_hostname("www.linkedin.com"),
            Some(Platform::LinkedIn)
        );
        assert_eq!(
            Platform::from_hostname("NL.LinkedIn.com"),
            Some(Platform::LinkedIn)
        );
        assert_eq!(
            Platform::from_hostname("www.glassdoor.nl"),
            Some(Platform::Glassdoor)
        );
        assert_eq!(
            Platform::from_hostname("www.nationalevacaturebank.nl"),
            Some(Platform::NationaleVacatureBank)
        );
        assert_eq!(
            Platform::from_hostname("www.werkzoeken.nl"),
            Some(Platform::WerkZoeken)
        );
        assert_eq!(Platform::from_hostname("example.com"), None);
    }

    #[test]
    fn test_source_names() {
        assert_eq!(Platform::LinkedIn.source_name(), "LinkedIn");
        assert_eq!(
            Platform::NationaleVacatureBank.to_string(),
            "NationaleVacatureBank"
        );
    }

    #[test]
    fn test_badge_tier_boundaries() {
        assert_eq!(BadgeTier::from_score(0.85), BadgeTier::Top);
        assert_eq!(BadgeTier::from_score(0.75), BadgeTier::Top);
        assert_eq!(BadgeTier::from_score(0.7499), BadgeTier::Mid);
        assert_eq!(BadgeTier::from_score(0.65), BadgeTier::Mid);
        assert_eq!(BadgeTier::from_score(0.6499), BadgeTier::Base);
        assert_eq!(BadgeTier::from_score(0.5), BadgeTier::Base);
    }

    #[test]
    fn test_match_entry_deserialize() {
        let entry: MatchEntry =
            serde_json::from_str(r#"{"url":"https://example.com/job/1","score":0.85}"#).unwrap();
        assert_eq!(entry.url, "https://example.com/job/1");
        assert_eq!(entry.score, 0.85);
    }
}
