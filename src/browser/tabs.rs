//! Browser tab listing and activation.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::TabId;

// ============================================================================
// TabInfo
// ============================================================================

/// One tab as reported by the browser's tab query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    /// Tab identifier.
    #[serde(rename = "tabId")]
    pub tab_id: TabId,
    /// Position in the window's native tab strip.
    pub index: u32,
    /// Whether the tab is the focused one.
    #[serde(default)]
    pub active: bool,
}

// ============================================================================
// TabOrderResolver
// ============================================================================

/// Live view of a window's tabs.
///
/// Every call goes back to the browser; results are never cached, so a
/// tab opened or closed between calls is reflected in the next listing.
#[async_trait]
pub trait TabOrderResolver: Send + Sync {
    /// Lists the window's tabs in native order.
    ///
    /// # Errors
    ///
    /// Transport failures or a malformed reply.
    async fn list_tabs(&self) -> Result<Vec<TabInfo>>;

    /// Makes a tab the visible one.
    ///
    /// # Errors
    ///
    /// Transport failures or an error reply (for example, the tab is gone).
    async fn activate_tab(&self, tab_id: TabId) -> Result<()>;
}
