//! # Atom Data Patterns
//!
//! Classifies the raw data of an atom into the shapes detectors emit:
//! social handles (`x.com:alice`, `@alice`), hex addresses and URLs.
//! The ranking engine uses the class to widen its sample when an atom has
//! no relationships of its own.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// Compiled once. A pattern that fails to compile matches nothing.
static SOCIAL_HANDLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:((?:[a-z0-9-]+\.)+[a-z]{2,}):([A-Za-z0-9_.\-]+)|@([A-Za-z0-9_.]+))$").ok()
});

static HEX_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").ok());

static URL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^https?://\S+$").ok());

/// Shape of an atom's raw data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomPattern {
    SocialHandle,
    HexAddress,
    Url,
}

impl AtomPattern {
    /// Classify raw atom data. Returns `None` for free text.
    #[must_use]
    pub fn classify(data: &str) -> Option<Self> {
        let data = data.trim();
        [Self::HexAddress, Self::Url, Self::SocialHandle]
            .into_iter()
            .find(|p| p.matches(data))
    }

    /// Whether `data` has this shape.
    #[must_use]
    pub fn matches(self, data: &str) -> bool {
        let regex = match self {
            Self::SocialHandle => &*SOCIAL_HANDLE,
            Self::HexAddress => &*HEX_ADDRESS,
            Self::Url => &*URL,
        };
        regex.as_ref().is_some_and(|r| r.is_match(data.trim()))
    }
}

/// Split a social handle into `(platform domain, username)`.
///
/// `@alice` has no domain and yields `("", "alice")`.
pub(crate) fn social_parts(data: &str) -> Option<(&str, &str)> {
    let caps = SOCIAL_HANDLE.as_ref()?.captures(data)?;
    match (caps.get(1), caps.get(2), caps.get(3)) {
        (Some(domain), Some(user), _) => Some((domain.as_str(), user.as_str())),
        (_, _, Some(user)) => Some(("", user.as_str())),
        _ => None,
    }
}
