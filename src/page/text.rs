//! Plain-text matcher.

use crate::session::SerializedMatches;

use super::matcher::{MatchSet, Matcher};

/// [`Matcher`] over a fixed text, matching non-overlapping substrings.
///
/// Serializes its matches as a JSON array of byte offsets. Stands in for a
/// DOM matcher in tests, benchmarks and headless bridges.
#[derive(Debug, Clone, Default)]
pub struct TextMatcher {
    text: String,
    offsets: Vec<usize>,
    focused: Option<usize>,
}

impl TextMatcher {
    /// Creates a matcher over `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offsets: Vec::new(),
            focused: None,
        }
    }

    /// Byte offsets of the highlighted matches.
    #[inline]
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Emphasized match, if any.
    #[inline]
    #[must_use]
    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    /// Replaces the text, as a page navigation would.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.clear();
    }
}

impl Matcher for TextMatcher {
    fn scan(&mut self, query: &str) -> MatchSet {
        self.focused = None;
        self.offsets = if query.is_empty() {
            Vec::new()
        } else {
            self.text.match_indices(query).map(|(offset, _)| offset).collect()
        };

        MatchSet {
            count: self.offsets.len(),
            serialized: SerializedMatches::new(
                serde_json::to_string(&self.offsets).unwrap_or_default(),
            ),
        }
    }

    fn focus(&mut self, index: usize) {
        if index < self.offsets.len() {
            self.focused = Some(index);
        }
    }

    fn blur(&mut self) {
        self.focused = None;
    }

    fn clear(&mut self) {
        self.offsets.clear();
        self.focused = None;
    }
}
