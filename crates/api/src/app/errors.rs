use axum::http::StatusCode;
use axum::response::IntoResponse;

use stockroom_core::DomainError;
use stockroom_infra::{AdjustError, StoreError};

use crate::app::dto::ErrorResponse;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Domain(e) => domain_error_to_response(e),
        other => {
            tracing::error!(error = %other, "product store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", other.to_string())
        }
    }
}

pub fn adjust_error_to_response(err: AdjustError) -> axum::response::Response {
    match err {
        AdjustError::Domain(e) => domain_error_to_response(e),
        AdjustError::Store(e) => store_error_to_response(e),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(ErrorResponse {
            error: code.to_string(),
            message: message.into(),
        }),
    )
        .into_response()
}
