//! Snippet synthesis helpers shared by the enhancers
//!
//! Editor snippet bodies use `$1`, `$2`, ... (or `${1:placeholder}`) as
//! tab-stops. Within one body the stops are numbered from 1 with no gaps.

use std::sync::LazyLock;

use regex::Regex;

use crate::schema::Snippet;

/// Discriminator field of an action; covered by the snippet anchor
pub const DISCRIMINATOR_FIELD: &str = "verb";

/// Separator between snippet body fragments
pub const FRAGMENT_SEPARATOR: &str = ",\n";

/// `^(a|b|c)$` with no nested groups
static ENUM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\^\(([^()]*)\)\$$").expect("enum pattern regex"));

static TAB_STOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(?:(\d+)|\{(\d+)(?::[^}]*)?\})").expect("tab-stop regex"));

/// Monotonic tab-stop numbering for one snippet body
#[derive(Debug, Default)]
pub struct TabStops {
    last: u32,
}

impl TabStops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of the next tab-stop, starting at 1
    pub fn next_stop(&mut self) -> u32 {
        self.last += 1;
        self.last
    }

    /// How many stops have been handed out
    pub fn count(&self) -> u32 {
        self.last
    }
}

/// Body fragment that anchors the discriminator value the editor matches on
pub fn anchor_fragment(variant: &str) -> String {
    format!("^\"{variant}\"")
}

/// `"field": "$n"`
pub fn field_fragment(field: &str, stop: u32) -> String {
    format!("\"{field}\": \"${stop}\"")
}

/// Build the snippet for one union variant from its required field names.
///
/// The discriminator field is skipped; every other field gets the next tab-stop.
pub fn variant_snippet<'a>(variant: &str, required: impl IntoIterator<Item = &'a str>) -> Snippet {
    let mut stops = TabStops::new();
    let mut fragments = vec![anchor_fragment(variant)];
    for field in required {
        if field == DISCRIMINATOR_FIELD {
            continue;
        }
        fragments.push(field_fragment(field, stops.next_stop()));
    }
    Snippet::text(variant, fragments.join(FRAGMENT_SEPARATOR))
}

/// Split an anchored alternation pattern (`^(foo|bar)$`) into its alternatives.
///
/// Empty alternatives are kept: `^(|a)$` admits the empty string. Returns
/// `None` for any other pattern shape.
pub fn enum_alternatives(pattern: &str) -> Option<Vec<&str>> {
    let interior = ENUM_PATTERN.captures(pattern)?.get(1)?.as_str();
    Some(interior.split('|').collect())
}

/// One `{label: alt, body: alt}` snippet per alternative of an enum-like pattern
pub fn enum_snippets(pattern: &str) -> Option<Vec<Snippet>> {
    let alternatives = enum_alternatives(pattern)?;
    Some(alternatives.into_iter().map(|alt| Snippet::text(alt, alt)).collect())
}

/// Tab-stop numbers in the order they appear in a snippet body
pub fn tab_stops(body: &str) -> Vec<u32> {
    TAB_STOP
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Whether the stops in a body are exactly `1..=k`, each used once, in order
pub fn has_contiguous_tab_stops(body: &str) -> bool {
    tab_stops(body)
        .into_iter()
        .enumerate()
        .all(|(i, stop)| stop as usize == i + 1)
}
