use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use stockroom_core::CategoryId;

use crate::app::dto::{self, parse_id};
use crate::app::errors;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.run(|ledger| ledger.categories()).await {
        Ok(categories) => Json(categories).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::CategoryRequest>,
) -> axum::response::Response {
    match services.run(move |ledger| ledger.create_category(body.into())).await {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::CategoryRequest>,
) -> axum::response::Response {
    let id = match parse_id::<CategoryId>("id", &id) {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.run(move |ledger| ledger.update_category(id, body.into())).await {
        Ok(category) => Json(category).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Items filed under the category are left uncategorized.
pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id::<CategoryId>("id", &id) {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.run(move |ledger| ledger.delete_category(id)).await {
        Ok(category) => Json(category).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
