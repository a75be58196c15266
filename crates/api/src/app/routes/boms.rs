use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use stockroom_core::{DomainError, ItemId, Quantity};
use stockroom_infra::{BomView, BomWrite, LedgerResult, StockLedger};

use crate::app::dto;
use crate::app::errors;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_boms).post(create_bom))
        .route("/:barcode", get(get_bom).put(update_bom).delete(delete_bom))
        .route("/:barcode/cost", get(bom_cost))
        .route("/:barcode/requirements", get(bom_requirements))
}

pub async fn list_boms(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.run(|ledger| ledger.boms()).await {
        Ok(boms) => Json(boms).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Path(barcode): Path<String>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let product = ledger.resolve_item(&barcode)?;
            ledger.bom(product)
        })
        .await;

    match result {
        Ok(bom) => Json(bom).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Create-only: an existing recipe for the product is a conflict.
pub async fn create_bom(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::BomRequest>,
) -> axum::response::Response {
    let Some(barcode) = body.product_barcode.clone().filter(|b| !b.trim().is_empty()) else {
        return errors::field_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "product_barcode",
            "product_barcode is required",
        );
    };

    match services
        .run(move |ledger| write(ledger, BomWrite::Create, &barcode, body))
        .await
    {
        Ok(bom) => (StatusCode::CREATED, Json(bom)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Replace the recipe's whole component map.
pub async fn update_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Path(barcode): Path<String>,
    ApiJson(body): ApiJson<dto::BomRequest>,
) -> axum::response::Response {
    match services
        .run(move |ledger| write(ledger, BomWrite::Replace, &barcode, body))
        .await
    {
        Ok(bom) => Json(bom).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Path(barcode): Path<String>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let product = ledger.resolve_item(&barcode)?;
            ledger.delete_bom(product)
        })
        .await;

    match result {
        Ok(entry) => Json(json!({ "deleted": true, "entry": entry })).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn bom_cost(
    Extension(services): Extension<Arc<AppServices>>,
    Path(barcode): Path<String>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let product = ledger.resolve_item(&barcode)?;
            Ok((product, ledger.bom_cost(product)?))
        })
        .await;

    match result {
        Ok((product, cost)) => Json(json!({
            "product_id": product,
            "total_cost": cost,
        }))
        .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn bom_requirements(
    Extension(services): Extension<Arc<AppServices>>,
    Path(barcode): Path<String>,
    Query(query): Query<dto::RequirementsQuery>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let count = Quantity::positive("quantity", query.quantity.unwrap_or(1))?;
            let product = ledger.resolve_item(&barcode)?;
            let requirements = ledger.bom_requirements(product, count)?;
            let bom = ledger.bom(product)?;
            let lines: Vec<_> = bom
                .components
                .into_iter()
                .map(|line| {
                    json!({
                        "item_id": line.item_id,
                        "barcode": line.barcode,
                        "part_id": line.part_id,
                        "quantity": requirements.get(&line.item_id).map(|q| q.get()).unwrap_or(0),
                    })
                })
                .collect();
            Ok(json!({ "product_id": product, "quantity": count, "components": lines }))
        })
        .await;

    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

fn write(
    ledger: &StockLedger,
    mode: BomWrite,
    barcode: &str,
    body: dto::BomRequest,
) -> LedgerResult<BomView> {
    let product = ledger.resolve_item(barcode)?;
    let mut components: BTreeMap<ItemId, Quantity> = BTreeMap::new();
    for (component, qty) in &body.components {
        let id = ledger.resolve_item(component)?;
        let field = format!("components.{component}");
        if components.insert(id, Quantity::positive(&field, *qty)?).is_some() {
            return Err(DomainError::validation(field, "component listed twice").into());
        }
    }
    ledger.write_bom(mode, product, body.description, components)
}
