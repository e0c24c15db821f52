//! Search coordinator module.
//!
//! The coordinator owns one window's [`SearchSession`](crate::session::SearchSession)
//! and drives every page through the [`Messenger`](crate::transport::Messenger).
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Coordinator`] | Session owner and event handler |
//! | [`CoordinatorBuilder`] | Fluent configuration builder |
//! | [`CoordinatorOptions`] | Timeouts, persistence and broadcast switches |
//! | [`SearchOutcome`] | Result of a cross-tab search |
//! | [`AdvanceOutcome`] | Result of a next/previous step |
//! | [`SubmitOutcome`] | Result of a search-box submit |
//!
//! # Search
//!
//! A search walks the tabs in traversal order (starting at the active tab)
//! one at a time until a tab reports a match. That tab is activated and its
//! first match focused. The remaining tabs are then scanned concurrently.
//! Tabs that fail or time out count as zero matches.

// ============================================================================
// Submodules
// ============================================================================

/// Next/previous navigation.
pub mod advance;

/// Fluent builder pattern for coordinator configuration.
pub mod builder;

/// Core coordinator type.
pub mod core;

/// UI commands, browser events and the event loop.
pub mod events;

/// Coordinator tunables.
pub mod options;

/// Cross-tab search.
pub mod search;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use advance::AdvanceOutcome;
pub use builder::CoordinatorBuilder;
pub use core::Coordinator;
pub use events::SubmitOutcome;
pub use options::{CoordinatorOptions, DEFAULT_MAX_IN_FLIGHT, DEFAULT_REQUEST_TIMEOUT};
pub use search::{ReportOutcome, SearchOutcome};
