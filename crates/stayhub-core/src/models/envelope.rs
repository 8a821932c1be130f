//! The `{ code, message, data }` response envelope.

use serde::{Deserialize, Serialize};

/// Envelope code signalling success.
pub const SUCCESS_CODE: i64 = 200;

/// Every REST response body is wrapped in this envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub const fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Human-readable message, or a placeholder when the server sent none.
    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or("request failed")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope() {
        let env: ApiEnvelope<Vec<i64>> =
            serde_json::from_str(r#"{"code": 200, "message": "ok", "data": [1, 2]}"#).unwrap();
        assert!(env.is_success());
        assert_eq!(env.data.unwrap(), vec![1, 2]);
    }

    #[test]
    fn failure_without_data() {
        let env: ApiEnvelope<Vec<i64>> =
            serde_json::from_str(r#"{"code": 500, "message": "boom"}"#).unwrap();
        assert!(!env.is_success());
        assert!(env.data.is_none());
        assert_eq!(env.message_or_default(), "boom");
    }

    #[test]
    fn payload_type_needs_no_default() {
        let env: ApiEnvelope<crate::models::Chat> = serde_json::from_str(
            r#"{"code": 200, "data": {"id": 5, "hostId": 9, "guestId": 4}}"#,
        )
        .unwrap();
        assert_eq!(env.data.unwrap().id, 5);

        let empty: ApiEnvelope<crate::models::Chat> =
            serde_json::from_str(r#"{"code": 404, "message": "no chat"}"#).unwrap();
        assert!(empty.data.is_none());
    }
}
