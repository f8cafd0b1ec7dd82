//! Result envelope returned by every mutating endpoint.

use serde::{Deserialize, Serialize};

/// `{ "success": bool, "data"?: T, "error"?: string }`.
///
/// Handlers return `ActionResult::ok(data)` on success; error responses are
/// built from the same shape so clients branch on `success` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResult<T> {
    /// A successful result carrying `data`.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed result with a user-facing message.
    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl ActionResult<()> {
    /// A successful result with no payload.
    #[must_use]
    pub const fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_shape() {
        let json = serde_json::to_value(ActionResult::ok(5)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 5}));
    }

    #[test]
    fn test_err_shape() {
        let json = serde_json::to_value(ActionResult::<()>::err("Product not found")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "Product not found"})
        );
    }

    #[test]
    fn test_done_shape() {
        let json = serde_json::to_value(ActionResult::done()).unwrap();
        assert_eq!(json, serde_json::json!({"success": true}));
    }
}
