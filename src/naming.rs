//! Deterministic instance naming derived from a workload tag.
//!
//! Names are a pure function of the tag and an ordinal. Re-running a create
//! with the same tag and count yields the same names, so callers can target a
//! known instance later and the provider rejects accidental duplicates.

use std::fmt;

/// Maximum length of a [`SafeName`], in characters.
pub const SAFE_NAME_MAX_LEN: usize = 50;

const SEPARATORS: [char; 4] = ['/', ':', '.', '_'];

/// Resource-safe prefix derived from a workload tag.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SafeName(String);

impl SafeName {
    /// Returns the normalised name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalises a workload tag into a [`SafeName`].
///
/// Each of `/`, `:`, `.` and `_` becomes `-`, the result is lower-cased and
/// truncated to [`SAFE_NAME_MAX_LEN`] characters.
///
/// # Examples
///
/// ```
/// use betaboot::naming::normalize;
///
/// assert_eq!(normalize("MyOrg/App:1.0").as_str(), "myorg-app-1-0");
/// ```
#[must_use]
pub fn normalize(tag: &str) -> SafeName {
    let replaced: String = tag
        .chars()
        .map(|ch| if SEPARATORS.contains(&ch) { '-' } else { ch })
        .collect();
    SafeName(
        replaced
            .to_lowercase()
            .chars()
            .take(SAFE_NAME_MAX_LEN)
            .collect(),
    )
}

/// Produces `count` instance names of the form `{SafeName}-{i}`.
#[must_use]
pub fn names_for(tag: &str, count: usize) -> Vec<String> {
    let prefix = normalize(tag);
    (0..count).map(|index| format!("{prefix}-{index}")).collect()
}
