//! Per-page matcher contract.

use crate::session::SerializedMatches;

/// Result of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    /// Number of matches found.
    pub count: usize,
    /// Opaque match locations.
    pub serialized: SerializedMatches,
}

/// Finds and highlights occurrences of a query in one page.
///
/// Implementations own the page's highlight markers. A scan discards the
/// markers of any previous scan.
pub trait Matcher: Send {
    /// Scans the page for `query` and highlights every match.
    fn scan(&mut self, query: &str) -> MatchSet;

    /// Visually focuses match `index` (scrolls to it, emphasizes it).
    fn focus(&mut self, index: usize);

    /// Drops the focus emphasis while keeping highlights.
    fn blur(&mut self);

    /// Removes every highlight marker.
    fn clear(&mut self);
}
