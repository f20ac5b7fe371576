//! # Data Model
//! Channel identities, candidate sources, probe outcomes and the ranked
//! per-channel selection handed to the playlist writer.
//!
//! URL-derived hints (`QualityHint::from_text`, `ProtocolHint::from_url`) live
//! here so both the playlist parser and the prober can share them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Equality key for "the same logical channel": display name plus an
/// optional external guide id (`tvg-id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelIdentity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guide_id: Option<String>,
}

impl ChannelIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guide_id: None,
        }
    }

    pub fn with_guide_id(mut self, guide_id: impl Into<String>) -> Self {
        self.guide_id = Some(guide_id.into());
        self
    }
}

impl fmt::Display for ChannelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.guide_id {
            Some(id) => write!(f, "{} [{}]", self.name, id),
            None => f.write_str(&self.name),
        }
    }
}

/// Coarse picture tier. Ordering is ascending: `Unknown < Sd < ... < Uhd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityHint {
    #[default]
    Unknown,
    Sd,
    Hd,
    Fhd,
    Uhd,
}

impl QualityHint {
    /// Numeric tier used by the scorer (Unknown = 0 .. UHD = 4).
    pub fn tier(self) -> u8 {
        match self {
            QualityHint::Unknown => 0,
            QualityHint::Sd => 1,
            QualityHint::Hd => 2,
            QualityHint::Fhd => 3,
            QualityHint::Uhd => 4,
        }
    }

    /// Map a vertical resolution (e.g. the `1080` of `1920x1080`) to a tier.
    pub fn from_height(height: u32) -> Self {
        match height {
            0 => QualityHint::Unknown,
            h if h >= 2160 => QualityHint::Uhd,
            h if h >= 1080 => QualityHint::Fhd,
            h if h >= 720 => QualityHint::Hd,
            _ => QualityHint::Sd,
        }
    }

    /// Resolution heuristics over free text (URL or channel name).
    ///
    /// Checked from the highest tier down so `fhd`/`uhd` never fall through
    /// to the plain `hd` marker.
    pub fn from_text(text: &str) -> Self {
        let s = text.to_ascii_lowercase();
        let has_token = |needle: &str| {
            s.match_indices(needle).any(|(i, _)| {
                let before = s[..i].chars().next_back();
                let after = s[i + needle.len()..].chars().next();
                // numeric markers may carry a scan suffix: 1080p, 1080i
                let numeric = needle.starts_with(|c: char| c.is_ascii_digit());
                let after_ok = match after {
                    None => true,
                    Some('p' | 'i') if numeric => true,
                    Some(c) => !c.is_ascii_alphanumeric(),
                };
                !before.is_some_and(|c| c.is_ascii_alphanumeric()) && after_ok
            })
        };

        if ["4k", "2160", "uhd"].iter().any(|n| has_token(n)) {
            QualityHint::Uhd
        } else if ["1080", "fhd", "fullhd"].iter().any(|n| has_token(n)) {
            QualityHint::Fhd
        } else if ["720", "hd"].iter().any(|n| has_token(n)) {
            QualityHint::Hd
        } else if ["576", "480", "360", "sd"].iter().any(|n| has_token(n)) {
            QualityHint::Sd
        } else {
            QualityHint::Unknown
        }
    }
}

/// Transport family guessed from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolHint {
    /// HLS (`.m3u8`) manifest.
    Hls,
    /// MPEG-DASH (`.mpd`) manifest.
    Dash,
    /// Plain progressive transfer or anything unrecognised.
    #[default]
    Generic,
}

impl ProtocolHint {
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        let path = lower.split(['?', '#']).next().unwrap_or_default();
        if path.ends_with(".m3u8") || lower.contains(".m3u8?") || lower.contains("/hls/") {
            ProtocolHint::Hls
        } else if path.ends_with(".mpd") || lower.contains(".mpd?") {
            ProtocolHint::Dash
        } else {
            ProtocolHint::Generic
        }
    }

    /// Streaming-manifest formats get the protocol bonus in the scorer.
    pub fn is_manifest(self) -> bool {
        matches!(self, ProtocolHint::Hls | ProtocolHint::Dash)
    }
}

/// Information derivable from the playlist text alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct StaticMetadata {
    pub quality: QualityHint,
    pub protocol: ProtocolHint,
}

impl StaticMetadata {
    /// Derive hints from the URL, falling back to the channel name for quality.
    pub fn derive(url: &str, name: &str) -> Self {
        let quality = match QualityHint::from_text(url) {
            QualityHint::Unknown => QualityHint::from_text(name),
            q => q,
        };
        Self {
            quality,
            protocol: ProtocolHint::from_url(url),
        }
    }
}

/// One candidate source for a channel, rebuilt fresh every run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub identity: ChannelIdentity,
    pub url: String,
    #[serde(default)]
    pub meta: StaticMetadata,
}

impl Candidate {
    /// Build a candidate with metadata derived from the URL and name.
    pub fn new(identity: ChannelIdentity, url: impl Into<String>) -> Self {
        let url = url.into();
        let meta = StaticMetadata::derive(&url, &identity.name);
        Self {
            identity,
            url,
            meta,
        }
    }
}

/// Outcome of a single probe. Never persisted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeResult {
    pub alive: bool,
    pub latency_secs: f64,
    pub quality: QualityHint,
}

impl ProbeResult {
    pub fn alive(latency_secs: f64, quality: QualityHint) -> Self {
        Self {
            alive: true,
            latency_secs,
            quality,
        }
    }

    /// The collapsed result for any transport, protocol or timeout failure.
    pub fn dead(timeout_secs: f64) -> Self {
        Self {
            alive: false,
            latency_secs: timeout_secs,
            quality: QualityHint::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSource {
    pub url: String,
    pub score: f64,
}

/// Capped primary/backup lists for one channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub primary: Vec<RankedSource>,
    pub backup: Vec<RankedSource>,
}

impl Selection {
    /// Slice a fully ranked list: first `primary_cap` entries, then the next
    /// `backup_cap`. The union is always a prefix of `ranked`.
    pub fn from_ranked(mut ranked: Vec<RankedSource>, primary_cap: usize, backup_cap: usize) -> Self {
        ranked.truncate(primary_cap.saturating_add(backup_cap));
        let backup = if ranked.len() > primary_cap {
            ranked.split_off(primary_cap)
        } else {
            Vec::new()
        };
        Self {
            primary: ranked,
            backup,
        }
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.backup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.backup.is_empty()
    }

    /// Primary then backup, in rank order.
    pub fn iter(&self) -> impl Iterator<Item = &RankedSource> {
        self.primary.iter().chain(self.backup.iter())
    }
}

/// Output row: one channel and its selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSelection {
    pub identity: ChannelIdentity,
    pub selection: Selection,
}
