//! services/api/src/web/envelope.rs
//!
//! Every response body, success or failure, is wrapped as
//! `{ "success": bool, "data"?: T, "message"?: string }`.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// 200 with the payload wrapped.
pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::OK, Json(Envelope::ok(data)))
}

/// 201 with the payload wrapped.
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, Json(Envelope::ok(data)))
}

/// 200 with a payload and a human-readable note.
pub fn ok_with_message<T: Serialize>(
    data: T,
    message: impl Into<String>,
) -> impl IntoResponse {
    (StatusCode::OK, Json(Envelope::ok(data).with_message(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_omits_data() {
        let body = serde_json::to_value(Envelope::<()>::failure("nope")).unwrap();
        assert_eq!(body, json!({ "success": false, "message": "nope" }));
    }

    #[test]
    fn success_omits_message_unless_given() {
        let body = serde_json::to_value(Envelope::ok(3)).unwrap();
        assert_eq!(body, json!({ "success": true, "data": 3 }));
        let body = serde_json::to_value(Envelope::ok(3).with_message("done")).unwrap();
        assert_eq!(body, json!({ "success": true, "data": 3, "message": "done" }));
    }
}
