//! Request and Response message types.
//!
//! Defines the message format for requests sent by the coordinator and the
//! responses page contexts (or the extension background) send back.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::browser::TabInfo;
use crate::error::{Error, Result};
use crate::identifiers::{Epoch, RequestId, TabId, TransactionId};
use crate::session::SerializedMatches;

use super::{BrowserCommand, Command, PageCommand, PageNotice};

// ============================================================================
// Constants
// ============================================================================

/// Error code for pages that refuse script access.
pub const ERROR_UNREACHABLE: &str = "unreachable";

/// Error code for messages discarded by the transaction-id rule.
pub const ERROR_STALE_TRANSACTION: &str = "stale transaction";

// ============================================================================
// Request
// ============================================================================

/// A request from the coordinator.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "tabId": 1,
///   "transactionId": 12,
///   "epoch": 3,
///   "method": "page.scanAndHighlight",
///   "params": { ... }
/// }
/// ```
///
/// Browser commands carry no `tabId`, `transactionId` or `epoch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Target tab (page commands only).
    #[serde(rename = "tabId", default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,

    /// Ordering tag for state-changing page commands.
    #[serde(
        rename = "transactionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_id: Option<TransactionId>,

    /// Session epoch the request belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<Epoch>,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a page request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn page(
        tab_id: TabId,
        transaction_id: TransactionId,
        epoch: Epoch,
        command: PageCommand,
    ) -> Self {
        Self {
            id: RequestId::generate(),
            tab_id: Some(tab_id),
            transaction_id: Some(transaction_id),
            epoch: Some(epoch),
            command: Command::Page(command),
        }
    }

    /// Creates a browser request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn browser(command: BrowserCommand) -> Self {
        Self {
            id: RequestId::generate(),
            tab_id: None,
            transaction_id: None,
            epoch: None,
            command: Command::Browser(command),
        }
    }

    /// Returns the wire method name.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.command.method()
    }
}

// ============================================================================
// Notice
// ============================================================================

/// A fire-and-forget message to one page context.
///
/// # Format
///
/// ```json
/// { "type": "notice", "tabId": 1, "method": "page.tabBecameActive" }
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Notice {
    /// Message type marker (always "notice").
    #[serde(rename = "type", default = "notice_type")]
    pub notice_type: NoticeType,

    /// Target tab.
    #[serde(rename = "tabId")]
    pub tab_id: TabId,

    /// Notification kind.
    #[serde(flatten)]
    pub notice: PageNotice,
}

/// Discriminator for [`Notice`] messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeType {
    /// Fire-and-forget notice.
    Notice,
}

fn notice_type() -> NoticeType {
    NoticeType::Notice
}

impl Notice {
    /// Creates a notice for a tab.
    #[inline]
    #[must_use]
    pub fn new(tab_id: TabId, notice: PageNotice) -> Self {
        Self {
            notice_type: NoticeType::Notice,
            tab_id,
            notice,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response to a [`Request`].
///
/// # Format
///
/// Success:
/// ```json
/// { "id": "uuid", "type": "success", "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": "uuid", "type": "error", "error": "unreachable", "message": "..." }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Response type.
    #[serde(rename = "type")]
    pub response_type: ResponseType,

    /// Result data (if success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error code (if error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Error message (if error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    /// Creates a success response carrying `result`.
    #[inline]
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            response_type: ResponseType::Success,
            result: Some(result),
            error: None,
            message: None,
        }
    }

    /// Creates an empty success response.
    #[inline]
    #[must_use]
    pub fn ack(id: RequestId) -> Self {
        Self::success(id, json!({}))
    }

    /// Creates an error response.
    #[inline]
    #[must_use]
    pub fn error(id: RequestId, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            response_type: ResponseType::Error,
            result: None,
            error: Some(code.into()),
            message: Some(message.into()),
        }
    }

    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_type == ResponseType::Success
    }

    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// - [`Error::Unreachable`] for the `unreachable` code
    /// - [`Error::StaleTransaction`] for the `stale transaction` code
    /// - [`Error::Protocol`] for any other error response
    pub fn into_result(self) -> Result<Value> {
        match self.response_type {
            ResponseType::Success => Ok(self.result.unwrap_or(Value::Null)),
            ResponseType::Error => {
                let error_code = self.error.unwrap_or_else(|| "unknown error".to_string());
                let message = self.message.unwrap_or_else(|| error_code.clone());
                Err(match error_code.as_str() {
                    ERROR_UNREACHABLE => Error::unreachable(message),
                    ERROR_STALE_TRANSACTION => Error::stale_transaction(message),
                    _ => Error::protocol(message),
                })
            }
        }
    }

    /// Deserializes the result into a typed value.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Response::into_result`], or [`Error::Json`]
    /// when the result does not match `T`.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.into_result()?;
        Ok(serde_json::from_value(value)?)
    }

    /// Gets a u64 value from the result.
    ///
    /// Returns 0 if key not found or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    }
}

// ============================================================================
// ResponseType
// ============================================================================

/// Response type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Successful response.
    Success,
    /// Error response.
    Error,
}

// ============================================================================
// Typed Results
// ============================================================================

/// Result of `page.scanAndHighlight`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Number of matches on the page.
    pub match_count: usize,
    /// Opaque match locations produced by the matcher.
    #[serde(default)]
    pub serialized_matches: SerializedMatches,
    /// Focused match index within the page.
    #[serde(default)]
    pub current_index: usize,
}

/// Result of `page.advanceLocal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceResult {
    /// Number of matches on the page.
    pub match_count: usize,
    /// Focused match index after the step.
    pub current_index: usize,
    /// Whether the step wrapped past the end (or start).
    pub wrapped: bool,
}

/// Result of `tabs.query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabsResult {
    /// Tabs in native window order.
    #[serde(default)]
    pub tabs: Vec<TabInfo>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(id: u32) -> TabId {
        TabId::new(id).expect("valid tab id")
    }

    #[test]
    fn test_page_request_serialization() {
        let request = Request::page(
            tab(3),
            TransactionId::new(12),
            Epoch::new(2),
            PageCommand::ClearHighlights,
        );
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["method"], "page.clearHighlights");
        assert_eq!(json["tabId"], 3);
        assert_eq!(json["transactionId"], 12);
        assert_eq!(json["epoch"], 2);
        assert_eq!(request.method(), "page.clearHighlights");
    }

    #[test]
    fn test_browser_request_omits_page_fields() {
        let request = Request::browser(BrowserCommand::QueryTabs);
        let json = serde_json::to_string(&request).expect("serialize");

        assert!(json.contains("tabs.query"));
        assert!(!json.contains("tabId"));
        assert!(!json.contains("transactionId"));
        assert!(!json.contains("epoch"));
    }

    #[test]
    fn test_notice_serialization() {
        let notice = Notice::new(tab(5), PageNotice::TabBecameInactive);
        let json = serde_json::to_value(notice).expect("serialize");

        assert_eq!(json["type"], "notice");
        assert_eq!(json["tabId"], 5);
        assert_eq!(json["method"], "page.tabBecameInactive");
    }

    #[test]
    fn test_success_response() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "success",
            "result": {"matchCount": 3, "serializedMatches": "[1,2,3]", "currentIndex": 0}
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert!(response.is_success());
        assert_eq!(response.get_u64("matchCount"), 3);

        let scan: ScanResult = response.parse().expect("scan result");
        assert_eq!(scan.match_count, 3);
        assert_eq!(scan.serialized_matches.as_str(), "[1,2,3]");
    }

    #[test]
    fn test_unreachable_error_response() {
        let response = Response::error(RequestId::generate(), ERROR_UNREACHABLE, "about:config");
        assert!(response.is_error());
        assert!(matches!(
            response.into_result(),
            Err(Error::Unreachable { .. })
        ));
    }

    #[test]
    fn test_stale_error_response() {
        let response = Response::error(RequestId::generate(), ERROR_STALE_TRANSACTION, "3 <= 4");
        assert!(matches!(
            response.into_result(),
            Err(Error::StaleTransaction { .. })
        ));
    }

    #[test]
    fn test_unknown_error_response() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "error",
            "error": "boom"
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert!(matches!(response.into_result(), Err(Error::Protocol { .. })));
    }

    #[test]
    fn test_ack_parses_as_unit_result() {
        let response = Response::ack(RequestId::generate());
        assert!(response.into_result().is_ok());
    }

    #[test]
    fn test_tabs_result_parse() {
        let response = Response::success(
            RequestId::generate(),
            json!({"tabs": [
                {"tabId": 1, "index": 0, "active": false},
                {"tabId": 2, "index": 1, "active": true}
            ]}),
        );

        let tabs: TabsResult = response.parse().expect("tabs");
        assert_eq!(tabs.tabs.len(), 2);
        assert!(tabs.tabs[1].active);
        assert_eq!(tabs.tabs[0].tab_id, tab(1));
    }
}
