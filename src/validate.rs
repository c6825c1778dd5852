//! Device tag and coordinate checks.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::RawLocation;

// ---

fn tag_regex() -> &'static Regex {
    // ---
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    // ASCII digits only; `\d` would also accept other Unicode digits.
    TAG_RE.get_or_init(|| Regex::new(r"^Tag ([0-9]+)$").expect("invalid regex"))
}

/// `"Tag "` followed by one or more decimal digits, nothing else.
pub fn is_valid_tag(name: &str) -> bool {
    tag_regex().is_match(name)
}

/// The digit group of a valid tag, e.g. `"42"` for `"Tag 42"`.
pub fn extract_tag_id(name: &str) -> Option<&str> {
    // ---
    tag_regex()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Latitude and longitude both present and not NaN. `0,0` is valid.
pub fn has_valid_coordinates(loc: &RawLocation) -> bool {
    loc.coordinates().is_some()
}
