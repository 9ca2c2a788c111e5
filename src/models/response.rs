use actix_web::{body::BoxBody, http::StatusCode, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::AppError;

/// One structured entry in an error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Pagination {
    pub page: u64,
    pub size: u64,
    pub total_count: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, size: u64, total_count: u64) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total_count.div_ceil(size)
        };
        Self {
            page,
            size,
            total_count,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[schema(value_type = Object)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct PaginatedSuccessResponse {
    pub success: bool,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Value>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub errors: Vec<ErrorDetail>,
}

/// Envelope returned by every service operation. Callers branch on the
/// variant (or `success` on the wire), never on a fault.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Success(SuccessResponse),
    Paginated(PaginatedSuccessResponse),
    Error(ErrorResponse),
}

impl ApiResponse {
    pub fn success(code: u16, message: impl Into<String>, data: Value) -> Self {
        ApiResponse::Success(SuccessResponse {
            success: true,
            code,
            message: Some(message.into()),
            data,
        })
    }

    pub fn paginated(
        code: u16,
        message: impl Into<String>,
        data: Vec<Value>,
        pagination: Pagination,
    ) -> Self {
        ApiResponse::Paginated(PaginatedSuccessResponse {
            success: true,
            code,
            message: Some(message.into()),
            data,
            pagination,
        })
    }

    /// Error envelope with a single entry whose message is `message`.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        ApiResponse::Error(ErrorResponse {
            success: false,
            code,
            message: Some(message.clone()),
            errors: vec![ErrorDetail {
                message,
                detail: None,
            }],
        })
    }

    /// Attaches a detail to the first error entry. No-op on success variants.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        if let ApiResponse::Error(ref mut err) = self {
            if let Some(first) = err.errors.first_mut() {
                first.detail = Some(detail.into());
            }
        }
        self
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ApiResponse::Error(_))
    }

    pub fn code(&self) -> u16 {
        match self {
            ApiResponse::Success(r) => r.code,
            ApiResponse::Paginated(r) => r.code,
            ApiResponse::Error(r) => r.code,
        }
    }

    pub fn into_http(self) -> HttpResponse {
        let status =
            StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::build(status).json(self)
    }
}

impl From<AppError> for ApiResponse {
    fn from(err: AppError) -> Self {
        ApiResponse::error(err.code(), err.to_string()).with_detail(err.detail())
    }
}

impl Responder for ApiResponse {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        self.into_http()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let resp = ApiResponse::success(201, "User created successfully", json!({"user": {"id": "x"}}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["code"], json!(201));
        assert_eq!(value["data"]["user"]["id"], json!("x"));
        assert!(value.get("errors").is_none());
    }

    #[test]
    fn test_error_shape() {
        let resp = ApiResponse::error(409, "Username already exists");
        assert!(!resp.is_success());
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["errors"][0]["message"], json!("Username already exists"));
        assert!(value["errors"][0].get("detail").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_paginated_shape() {
        let resp = ApiResponse::paginated(200, "ok", vec![json!({"id": "a"})], Pagination::new(1, 10, 21));
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value["data"].is_array());
        assert_eq!(value["pagination"]["total_pages"], json!(3));
        assert_eq!(value["pagination"]["total_count"], json!(21));
    }

    #[test]
    fn test_pagination_zero_size() {
        assert_eq!(Pagination::new(1, 0, 5).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
    }

    #[test]
    fn test_from_app_error() {
        let resp: ApiResponse = AppError::Upstream("video backend down".into()).into();
        assert_eq!(resp.code(), 502);
        match resp {
            ApiResponse::Error(err) => {
                assert_eq!(err.errors.len(), 1);
                assert_eq!(err.errors[0].detail.as_deref(), Some("video backend down"));
            }
            other => panic!("expected error envelope, got {:?}", other),
        }
    }

    #[test]
    fn test_http_status_follows_code() {
        let http = ApiResponse::error(401, "Invalid credentials").into_http();
        assert_eq!(http.status(), StatusCode::UNAUTHORIZED);
        let http = ApiResponse::error(1000, "nonsense").into_http();
        assert_eq!(http.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
