//! Request extractors that answer with the API's JSON error bodies.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::Response;

use crate::app::errors;

const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// `axum::Json`, but a body that does not parse becomes a 400 with
/// `{error, message, field}` instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_to_response(rejection)),
        }
    }
}

pub fn rejection_to_response(rejection: JsonRejection) -> Response {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let text = err.body_text();
            let detail = text.strip_prefix(DATA_ERROR_PREFIX).unwrap_or(&text);
            let (field, message) = split_field(detail);
            let code = if is_quantity_field(&field) {
                "invalid_quantity"
            } else {
                "validation_error"
            };
            errors::field_error(StatusCode::BAD_REQUEST, code, field, message)
        }
        other => errors::field_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "body",
            other.body_text(),
        ),
    }
}

/// Pull the offending field out of a serde message such as
/// `amount: invalid type: floating point ...` or ``missing field `name` ...``.
fn split_field(detail: &str) -> (String, String) {
    if let Some((path, message)) = detail.split_once(": ") {
        if !path.is_empty() && !path.contains(char::is_whitespace) {
            return (path.to_string(), message.to_string());
        }
    }
    if let Some(rest) = detail.strip_prefix("missing field `") {
        if let Some((name, _)) = rest.split_once('`') {
            return (name.to_string(), detail.to_string());
        }
    }
    ("body".to_string(), detail.to_string())
}

fn is_quantity_field(field: &str) -> bool {
    let leaf = field.rsplit('.').next().unwrap_or(field);
    leaf == "amount" || leaf == "quantity" || field.starts_with("components")
}
