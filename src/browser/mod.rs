//! Browser entities module.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`BrowserWindow`] | One window behind the extension connection |
//! | [`TabInfo`] | One tab of a tab listing |
//! | [`TabOrderResolver`] | Live tab listing and activation |

// ============================================================================
// Submodules
// ============================================================================

/// Browser tab listing and activation.
pub mod tabs;

/// Browser window handle.
pub mod window;

// ============================================================================
// Re-exports
// ============================================================================

pub use tabs::{TabInfo, TabOrderResolver};
pub use window::BrowserWindow;
