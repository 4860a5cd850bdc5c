use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::stations::DispatchError;

/// `{success, data?, count?, error?}` body shared by all station routes.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            count: None,
            error: None,
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: Some(data.len()),
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            count: None,
            error: Some(message.into()),
        }
    }
}

pub fn status_for(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::InvalidSlot(_) => StatusCode::BAD_REQUEST,
        DispatchError::TokenUnavailable | DispatchError::Unauthorized => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::Vendor(_) => StatusCode::BAD_GATEWAY,
        DispatchError::Declined(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (status_for(&self), Json(ApiResponse::error(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resilience::FailureReason;

    #[test]
    fn envelope_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::list(vec![1, 2])).unwrap();
        assert_eq!(body, json!({"success": true, "data": [1, 2], "count": 2}));

        let body = serde_json::to_value(ApiResponse::error("boom")).unwrap();
        assert_eq!(body, json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn dispatch_errors_map_to_status_codes() {
        assert_eq!(status_for(&DispatchError::InvalidSlot(9)), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&DispatchError::TokenUnavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(&DispatchError::Unauthorized), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(&DispatchError::Vendor(FailureReason::Timeout)), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&DispatchError::Declined(3)), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
