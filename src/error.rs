//! Error Handling Module
//!
//! Provides type-safe error handling with proper HTTP status code mapping.
//! Domain errors (`VerificationError`, `StoreError`, ...) are converted here so handlers can use `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::db::StoreError;
use crate::services::{MergeError, VerificationError};

/// API 에러 타입
///
/// # Status Mapping
///
/// - 클라이언트 에러: 400 (검증 실패, 검증 불가 상태, 사용자 누락), 404 (없는 계좌)
/// - ACH 서비스 장애: 502
/// - 서버 에러: 500
///
/// 민감한 내부 정보는 클라이언트에 노출하지 않음
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Not eligible: {0}")]
    NotEligible(String),

    // ============ 404 Not Found ============
    #[error("Resource not found: {0}")]
    NotFound(String),

    // ============ 502 Bad Gateway ============
    #[error("ACH service error: {0}")]
    BadGateway(String),

    // ============ 500 Internal Server Error ============
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    InternalError,
}

/// API 에러 응답 구조
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            // 4xx 클라이언트 에러
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            ApiError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(msg.clone()),
            ),
            ApiError::NotEligible(msg) => (
                StatusCode::BAD_REQUEST,
                "NOT_ELIGIBLE",
                "Depository is not eligible".to_string(),
                Some(msg.clone()),
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
                None,
            ),

            // 5xx
            ApiError::BadGateway(msg) => {
                tracing::warn!("ACH service error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "ACH_SERVICE_ERROR",
                    "ACH service request failed".to_string(),
                    None,
                )
            }
            ApiError::DatabaseError(_) => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!("Database error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                    None,
                )
            }
            ApiError::InternalError => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DepositoryNotFound(id) => ApiError::NotFound(format!("depository {}", id)),
            StoreError::NotOwner { id, .. } => ApiError::NotFound(format!("depository {}", id)),
            StoreError::InvalidStatusTransition { .. } => ApiError::NotEligible(err.to_string()),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::DepositoryNotFound(id) => ApiError::NotFound(format!("depository {}", id)),
            VerificationError::DepositoryNotEligible { .. } => ApiError::NotEligible(err.to_string()),
            VerificationError::NoMicroDeposits
            | VerificationError::IncorrectGuessCount(_)
            | VerificationError::IncorrectGuesses => ApiError::ValidationError(err.to_string()),
            VerificationError::SubmissionFailed(e) => ApiError::BadGateway(e.to_string()),
            VerificationError::Store(e) => e.into(),
            VerificationError::AmountGenerationFailed(_) | VerificationError::Ach(_) => {
                tracing::error!("Verification error: {:?}", err);
                ApiError::InternalError
            }
        }
    }
}

impl From<MergeError> for ApiError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Store(e) => e.into(),
            other => {
                tracing::error!("Merge error: {:?}", other);
                ApiError::InternalError
            }
        }
    }
}

/// anyhow 에러를 ApiError로 변환
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Anyhow error: {:?}", err);
        ApiError::InternalError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DepositoryId;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (VerificationError::IncorrectGuesses.into(), StatusCode::BAD_REQUEST),
            (VerificationError::NoMicroDeposits.into(), StatusCode::BAD_REQUEST),
            (
                VerificationError::DepositoryNotEligible {
                    id: DepositoryId::new("a"),
                    reason: "status is verified".into(),
                }
                .into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                VerificationError::DepositoryNotFound(DepositoryId::new("a")).into(),
                StatusCode::NOT_FOUND,
            ),
            (StoreError::DepositoryNotFound(DepositoryId::new("a")).into(), StatusCode::NOT_FOUND),
            (StoreError::Corrupt("bad".into()).into(), StatusCode::INTERNAL_SERVER_ERROR),
            (
                VerificationError::SubmissionFailed(crate::services::AchClientError::Rejected("x".into())).into(),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
