use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pricekeeper_core::errors::{DatabaseError, Error as CoreError};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::InvalidConfigValue(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::Database(DatabaseError::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = Json(json!({
            "code": status.as_u16(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricekeeper_core::errors::ValidationError;

    #[test]
    fn test_status_mapping() {
        let validation = ApiError::from(CoreError::Validation(ValidationError::InvalidInput(
            "confirm".to_string(),
        )));
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);

        let missing = ApiError::from(CoreError::NotFound("provider FOO".to_string()));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let db = ApiError::from(CoreError::Database(DatabaseError::QueryFailed(
            "locked".to_string(),
        )));
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
