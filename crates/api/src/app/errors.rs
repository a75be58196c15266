use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_core::DomainError;
use stockroom_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Domain(e) => domain_error_to_response(e),
        LedgerError::Busy(msg) => json_error(StatusCode::SERVICE_UNAVAILABLE, "busy", msg),
        LedgerError::Store(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::InsufficientStock {
            item,
            scope,
            requested,
            available,
        } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": message,
                "item": item,
                "scope": scope,
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        DomainError::UnknownItem(_) => json_error(StatusCode::NOT_FOUND, "unknown_item", message),
        DomainError::UnknownLocation(_) => json_error(StatusCode::NOT_FOUND, "unknown_location", message),
        DomainError::UnknownCategory(_) => json_error(StatusCode::NOT_FOUND, "unknown_category", message),
        DomainError::NoBom(_) => json_error(StatusCode::NOT_FOUND, "no_bom", message),
        DomainError::InvalidQuantity { field, .. } => {
            field_error(StatusCode::BAD_REQUEST, "invalid_quantity", field, message)
        }
        DomainError::Validation { field, .. } => {
            field_error(StatusCode::BAD_REQUEST, "validation_error", field, message)
        }
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn field_error(
    status: StatusCode,
    code: &'static str,
    field: impl Into<String>,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "field": field.into(),
        })),
    )
        .into_response()
}
