//! Search session state.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `state` | [`SearchSession`], [`TabMatchState`] and the pushed [`SessionSnapshot`] |
//! | `store` | [`TabStateStore`], per-tab state with global offsets |
//! | `navigation` | Traversal order and cross-tab lookup |

// ============================================================================
// Submodules
// ============================================================================

/// Tab traversal order.
pub mod navigation;

/// Session and per-tab match state.
pub mod state;

/// Per-tab state store.
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use navigation::{active_tab, next_tab_with_matches, traversal_order};
pub use state::{
    LayoverPosition, SearchSession, SerializedMatches, SessionSnapshot, TabMatchState,
};
pub use store::{MergeEffect, TabStateStore, TabUpdate};
