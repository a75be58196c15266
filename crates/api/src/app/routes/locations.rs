use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockroom_core::LocationId;

use crate::app::dto::{self, parse_id};
use crate::app::errors;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_locations).post(create_location))
        .route(
            "/:id",
            get(get_location).put(update_location).delete(delete_location),
        )
}

pub async fn list_locations(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.run(|ledger| ledger.locations()).await {
        Ok(locations) => Json(locations).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id::<LocationId>("id", &id) {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.run(move |ledger| ledger.location(id)).await {
        Ok(location) => Json(location).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn create_location(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::LocationRequest>,
) -> axum::response::Response {
    match services.run(move |ledger| ledger.create_location(body.into())).await {
        Ok(location) => (StatusCode::CREATED, Json(location)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::LocationRequest>,
) -> axum::response::Response {
    let id = match parse_id::<LocationId>("id", &id) {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.run(move |ledger| ledger.update_location(id, body.into())).await {
        Ok(location) => Json(location).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Fails with a conflict while any item still holds units here.
pub async fn delete_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id::<LocationId>("id", &id) {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.run(move |ledger| ledger.delete_location(id)).await {
        Ok(location) => Json(location).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
