//! # Label Transforms
//!
//! Maps raw atom labels to platform-aware display forms:
//! - `x.com:alice` → `@alice` with an avatar URL
//! - `0x5290…9ee7` for long hex addresses
//! - URLs without scheme, `www.` and trailing slash
//!
//! A transform is a pure function of the label, so results are cached
//! without expiry. The transformer is an explicitly constructed service;
//! share it with `Arc` instead of reaching for a global.

use crate::pattern::{AtomPattern, social_parts};
use crate::{AtomMatch, AtomSummary, DisplayInfo};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Known platforms: (domain, platform name, handle prefix, avatar base).
const PLATFORMS: &[(&str, &str, &str, &str)] = &[
    ("x.com", "x", "@", "https://unavatar.io/x/"),
    ("twitter.com", "x", "@", "https://unavatar.io/x/"),
    ("github.com", "github", "", "https://github.com/"),
    ("youtube.com", "youtube", "@", "https://unavatar.io/youtube/"),
    ("instagram.com", "instagram", "@", "https://unavatar.io/instagram/"),
    ("reddit.com", "reddit", "u/", "https://unavatar.io/reddit/"),
    ("linkedin.com", "linkedin", "", "https://unavatar.io/linkedin/"),
];

/// The display form of a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLabel {
    pub text: String,
    pub info: Option<DisplayInfo>,
}

/// Caching label transformer.
#[derive(Debug, Default)]
pub struct LabelTransformer {
    cache: Mutex<BTreeMap<String, DisplayLabel>>,
}

impl LabelTransformer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Display form of `label`, computed once per distinct label.
    pub fn transform(&self, label: &str) -> DisplayLabel {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(label) {
            return hit.clone();
        }
        let computed = compute(label);
        cache.insert(label.to_string(), computed.clone());
        computed
    }

    /// Fill `display_label` and `display_info` of a match.
    pub fn decorate_match(&self, atom: &mut AtomMatch) {
        let display = self.display_for(&atom.label, &atom.data);
        atom.display_label = Some(display.text);
        atom.display_info = display.info;
    }

    /// Fill `display_label` of a relationship atom.
    pub fn decorate_summary(&self, atom: &mut AtomSummary) {
        atom.display_label = Some(self.display_for(&atom.label, &atom.data).text);
    }

    /// Prefer the transform of the raw data when it recognizes a shape,
    /// otherwise fall back to the label.
    fn display_for(&self, label: &str, data: &str) -> DisplayLabel {
        if !data.is_empty() {
            let from_data = self.transform(data);
            if from_data.info.is_some() || from_data.text != data.trim() {
                return from_data;
            }
        }
        self.transform(label)
    }

    /// Number of cached transforms.
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn compute(label: &str) -> DisplayLabel {
    let trimmed = label.trim();

    if let Some((domain, user)) = social_parts(trimmed) {
        let domain = domain.strip_prefix("www.").unwrap_or(domain);
        if let Some((_, platform, prefix, avatar)) =
            PLATFORMS.iter().find(|(d, ..)| *d == domain)
        {
            let avatar_url = if *platform == "github" {
                format!("{avatar}{user}.png")
            } else {
                format!("{avatar}{user}")
            };
            return DisplayLabel {
                text: format!("{prefix}{user}"),
                info: Some(DisplayInfo {
                    platform: Some((*platform).to_string()),
                    username: Some(user.to_string()),
                    avatar_url: Some(avatar_url),
                }),
            };
        }
        if domain.is_empty() {
            return DisplayLabel {
                text: format!("@{user}"),
                info: Some(DisplayInfo {
                    platform: None,
                    username: Some(user.to_string()),
                    avatar_url: None,
                }),
            };
        }
    }

    if AtomPattern::HexAddress.matches(trimmed) {
        let head = &trimmed[..6];
        let tail = &trimmed[trimmed.len() - 4..];
        return DisplayLabel {
            text: format!("{head}…{tail}"),
            info: None,
        };
    }

    if AtomPattern::Url.matches(trimmed) {
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
        return DisplayLabel {
            text: without_www.trim_end_matches('/').to_string(),
            info: None,
        };
    }

    DisplayLabel {
        text: trimmed.to_string(),
        info: None,
    }
}
