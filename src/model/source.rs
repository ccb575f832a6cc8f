//! Broadcaster identities and their resolved crawl limits

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::ConfigError;

/// A broadcaster whose catalogue can be crawled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Ard,
    ArteDe,
    ArteFr,
    Br,
    #[serde(rename = "3sat")]
    DreiSat,
    Dw,
    Funk,
    Hr,
    Kika,
    Mdr,
    Ndr,
    Orf,
    Phoenix,
    Rbb,
    Sr,
    Srf,
    SrfPodcast,
    Swr,
    Wdr,
    Zdf,
    ZdfTivi,
}

impl Source {
    /// Every known source, in declaration order
    pub const ALL: [Source; 21] = [
        Self::Ard,
        Self::ArteDe,
        Self::ArteFr,
        Self::Br,
        Self::DreiSat,
        Self::Dw,
        Self::Funk,
        Self::Hr,
        Self::Kika,
        Self::Mdr,
        Self::Ndr,
        Self::Orf,
        Self::Phoenix,
        Self::Rbb,
        Self::Sr,
        Self::Srf,
        Self::SrfPodcast,
        Self::Swr,
        Self::Wdr,
        Self::Zdf,
        Self::ZdfTivi,
    ];

    /// The identifier used in configuration files and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            Self::Ard => "ard",
            Self::ArteDe => "arte-de",
            Self::ArteFr => "arte-fr",
            Self::Br => "br",
            Self::DreiSat => "3sat",
            Self::Dw => "dw",
            Self::Funk => "funk",
            Self::Hr => "hr",
            Self::Kika => "kika",
            Self::Mdr => "mdr",
            Self::Ndr => "ndr",
            Self::Orf => "orf",
            Self::Phoenix => "phoenix",
            Self::Rbb => "rbb",
            Self::Sr => "sr",
            Self::Srf => "srf",
            Self::SrfPodcast => "srf-podcast",
            Self::Swr => "swr",
            Self::Wdr => "wdr",
            Self::Zdf => "zdf",
            Self::ZdfTivi => "zdf-tivi",
        }
    }

    /// Human readable broadcaster name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ard => "ARD",
            Self::ArteDe => "ARTE.DE",
            Self::ArteFr => "ARTE.FR",
            Self::Br => "BR",
            Self::DreiSat => "3Sat",
            Self::Dw => "DW",
            Self::Funk => "Funk.net",
            Self::Hr => "HR",
            Self::Kika => "KiKA",
            Self::Mdr => "MDR",
            Self::Ndr => "NDR",
            Self::Orf => "ORF",
            Self::Phoenix => "PHOENIX",
            Self::Rbb => "RBB",
            Self::Sr => "SR",
            Self::Srf => "SRF",
            Self::SrfPodcast => "SRF.Podcast",
            Self::Swr => "SWR",
            Self::Wdr => "WDR",
            Self::Zdf => "ZDF",
            Self::ZdfTivi => "ZDF-tivi",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Source {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|source| source.id() == wanted || source.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ConfigError::UnknownSource(s.to_string()))
    }
}

/// Resolved per-source limits
///
/// Built once from the configuration defaults and the per-source overrides,
/// then shared read-only by everything crawling that source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Queues at or below this size are processed without splitting
    pub max_units_per_task: usize,

    /// Highest sub-page number probed for paginated overview pages
    pub max_subpages: u32,

    /// Sustained request rate for this source
    pub max_requests_per_second: f64,

    /// Timeout for a single request
    pub socket_timeout: Duration,

    /// How many days back day-based overview pages reach
    pub max_days_past: u32,

    /// How many days ahead day-based overview pages reach
    pub max_days_future: u32,

    /// Pause between retries of a request answered with HTTP 429
    pub retry_backoff: Duration,
}

impl SourceConfig {
    /// The split threshold used by crawl tasks; never below one
    pub fn split_threshold(&self) -> usize {
        self.max_units_per_task.max(1)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_units_per_task: 50,
            max_subpages: 3,
            max_requests_per_second: 1.0,
            socket_timeout: Duration::from_secs(60),
            max_days_past: 6,
            max_days_future: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_id_and_name() {
        assert_eq!("ard".parse::<Source>().unwrap(), Source::Ard);
        assert_eq!("3sat".parse::<Source>().unwrap(), Source::DreiSat);
        assert_eq!("ARTE.DE".parse::<Source>().unwrap(), Source::ArteDe);
        assert_eq!(" Zdf-Tivi ".parse::<Source>().unwrap(), Source::ZdfTivi);
        assert!(matches!(
            "nope".parse::<Source>(),
            Err(ConfigError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_ids_are_unique() {
        let mut ids: Vec<_> = Source::ALL.iter().map(|s| s.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), Source::ALL.len());
    }

    #[test]
    fn test_split_threshold_never_zero() {
        let config = SourceConfig {
            max_units_per_task: 0,
            ..SourceConfig::default()
        };
        assert_eq!(config.split_threshold(), 1);
        assert_eq!(SourceConfig::default().split_threshold(), 50);
    }
}
