//! Uniform response envelope returned by every client verb.

use crate::error::AppError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// `success == false` implies `data` is `None` and `error` is set; `success == true` implies `error` is `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Success without a payload (delete, table creation).
    pub fn empty() -> Self {
        ApiResponse {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Turn a failed envelope back into an error.
    pub fn with_raise(self) -> Result<Self, AppError> {
        if self.success {
            Ok(self)
        } else {
            Err(AppError::Failed(self.error.unwrap_or_default()))
        }
    }

    /// Payload of a successful envelope; fails on an unsuccessful one or a missing payload.
    pub fn into_data(self) -> Result<T, AppError> {
        self.with_raise()?
            .data
            .ok_or_else(|| AppError::Failed("response carried no data".into()))
    }
}

impl<T> From<Result<T, AppError>> for ApiResponse<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(e) => ApiResponse::fail(e.to_string()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        };
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_carries_no_data() {
        let resp: ApiResponse<String> = Err(AppError::NotFound("users bob".into())).into();
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.error.as_deref(), Some("users bob not found"));
    }

    #[test]
    fn success_carries_no_error() {
        let resp: ApiResponse<u32> = Ok(7).into();
        assert!(resp.success);
        assert_eq!(resp.data, Some(7));
        assert!(resp.error.is_none());
    }

    #[test]
    fn with_raise_surfaces_the_message() {
        let err = ApiResponse::<()>::fail("projects x already exists")
            .with_raise()
            .unwrap_err();
        assert!(matches!(err, AppError::Failed(ref m) if m == "projects x already exists"));
        assert!(ApiResponse::<()>::empty().with_raise().is_ok());
        assert!(ApiResponse::<()>::empty().into_data().is_err());
    }

    #[test]
    fn serializes_nulls_explicitly() {
        let v = serde_json::to_value(ApiResponse::<()>::fail("nope")).unwrap();
        assert_eq!(v, serde_json::json!({"success": false, "data": null, "error": "nope"}));
    }

    #[test]
    fn http_status_follows_success() {
        assert_eq!(ApiResponse::ok(1).into_response().status(), StatusCode::OK);
        assert_eq!(
            ApiResponse::<u8>::fail("bad").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
