//! Title derivation for carried-forward work items. Keeps every generation of
//! a copied item visibly distinct from its predecessor.

use once_cell::sync::Lazy;
use regex::Regex;

/// Parenthesized generation counter, e.g. `"Story A (3)"`.
static GENERATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)\)").unwrap());

/// Trailing dotted sprint number, e.g. `"Feature 2.1"`.
static SPRINT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.\d+)$").unwrap());

/// Whether a title ends in a dotted sprint-number token. Parents with such
/// titles get copied into the next sprint rather than moved in place.
pub fn has_sprint_suffix(title: &str) -> bool {
    SPRINT_SUFFIX.is_match(title)
}

/// Derive the title for the next generation of a carried-forward item.
///
/// Priority order: bump an existing `(N)` counter; otherwise swap a trailing
/// sprint number for the destination's; otherwise start a counter at `(1)`.
pub fn next_title(old_title: &str, destination_name: &str) -> String {
    if let Some(caps) = GENERATION.captures(old_title) {
        let n: u64 = caps[1].parse().unwrap_or(0);
        let stripped = old_title.replacen(&caps[0], "", 1);
        return format!("{}({})", stripped, n + 1);
    }
    if let Some(caps) = SPRINT_SUFFIX.captures(old_title) {
        let next = SPRINT_SUFFIX
            .captures(destination_name)
            .map(|d| d[1].to_string())
            .unwrap_or_default();
        return format!("{}{}", old_title.replacen(&caps[1], "", 1), next);
    }
    format!("{} (1)", old_title.trim_end())
}
