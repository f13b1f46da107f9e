use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::ServiceError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthorized => AppError::Unauthorized(err.to_string()),
            ServiceError::Validation(e) => AppError::Validation(e.to_string()),
            ServiceError::NotFound(what) => AppError::NotFound(what),
            ServiceError::DuplicateSerial(_) => AppError::Conflict(err.to_string()),
            ServiceError::Store(msg) => {
                tracing::error!(error = %msg, "Ledger store failure");
                AppError::Storage(msg)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("productName: must not be empty".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("transaction code KNT-X not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_error_status_code() {
        let error = AppError::Conflict("serial taken".to_string());
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_storage_error_status_code() {
        let error = AppError::Storage("connection refused".to_string());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthorized_error_status_code() {
        let error = AppError::Unauthorized("admin access required".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_service_error_mapping() {
        let err: AppError =
            ServiceError::Validation(ValidationError::new("adminName", "must not be empty")).into();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("adminName")));

        let err: AppError = ServiceError::DuplicateSerial("SN-1".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: AppError = ServiceError::Unauthorized.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err: AppError = ServiceError::Store("down".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: AppError = ServiceError::NotFound("serial number SN-1 not found".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_not_found_error_response() {
        let error = AppError::NotFound("serial number SN-1 not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
