//! Page context side of the protocol.
//!
//! Each tab runs one page context that answers the coordinator's page
//! commands. [`PageAgent`] implements that side over any [`Matcher`]:
//!
//! - tagged requests pass through a [`TransactionGuard`] first
//! - scans delegate to the matcher and remember the scan's epoch
//! - the local focus index lives in the agent between calls
//!
//! [`TextMatcher`] is a plain-text matcher for headless use.

// ============================================================================
// Submodules
// ============================================================================

/// Page context request handler.
pub mod agent;

/// Out-of-order delivery protection.
pub mod guard;

/// Per-page matcher contract.
pub mod matcher;

/// Plain-text matcher.
pub mod text;

// ============================================================================
// Re-exports
// ============================================================================

pub use agent::PageAgent;
pub use guard::TransactionGuard;
pub use matcher::{MatchSet, Matcher};
pub use text::TextMatcher;
