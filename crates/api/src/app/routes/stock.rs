use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use stockroom_core::{CategoryId, DomainError, LocationId, Quantity};
use stockroom_infra::{AssembleRequest, LedgerResult, StockFilter, StockLedger};
use stockroom_inventory::StockStatus;

use crate::app::dto::{self, parse_id, parse_optional_id};
use crate::app::errors;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stock).post(create_item))
        .route("/adjust", post(adjust))
        .route("/transfer", post(transfer))
        .route("/scrap", post(scrap))
        .route("/assemble", post(assemble))
        .route("/barcode/:barcode", get(get_by_barcode))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
}

pub async fn list_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::StockQuery>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let filter = stock_filter(ledger, &query)?;
            ledger.list_stock(&filter)
        })
        .await;

    match result {
        Ok(views) => Json(views).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let item = ledger.resolve_item(&id)?;
            ledger.stock(item)
        })
        .await;

    match result {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_by_barcode(
    Extension(services): Extension<Arc<AppServices>>,
    Path(barcode): Path<String>,
) -> axum::response::Response {
    match services.run(move |ledger| ledger.stock_by_barcode(&barcode)).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::ItemRequest>,
) -> axum::response::Response {
    let (draft, levels) = match body.into_parts() {
        Ok(parts) => parts,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .run(move |ledger| ledger.create_item(draft, levels.unwrap_or_default()))
        .await
    {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::ItemRequest>,
) -> axum::response::Response {
    let (draft, levels) = match body.into_parts() {
        Ok(parts) => parts,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let result = services
        .run(move |ledger| {
            let item = ledger.resolve_item(&id)?;
            ledger.update_item(item, draft, levels)
        })
        .await;

    match result {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let item = ledger.resolve_item(&id)?;
            ledger.delete_item(item)
        })
        .await;

    match result {
        Ok(entry) => Json(json!({ "deleted": true, "entry": entry })).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn adjust(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::AdjustRequest>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let amount = Quantity::positive("amount", body.amount)?;
            let location = parse_id::<LocationId>("location_id", &body.location_id)?;
            let item = ledger.resolve_item(&body.part_id)?;
            let entry = ledger.adjust(item, location, body.mode.signed(amount), body.reason)?;
            Ok((entry, ledger.stock(item)?))
        })
        .await;

    match result {
        Ok((entry, stock)) => Json(json!({ "entry": entry, "stock": stock })).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::TransferRequest>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let quantity = Quantity::positive("quantity", body.quantity)?;
            let from = parse_id::<LocationId>("location_id", &body.location_id)?;
            let to = parse_id::<LocationId>("to_location_id", &body.to_location_id)?;
            let item = ledger.resolve_item(&body.stock_id)?;
            let entry = ledger.transfer(item, from, to, quantity, body.reason)?;
            Ok((entry, ledger.stock(item)?))
        })
        .await;

    match result {
        Ok((entry, stock)) => Json(json!({ "entry": entry, "stock": stock })).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn scrap(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::ScrapRequest>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let quantity = Quantity::positive("quantity", body.quantity)?;
            let location = parse_id::<LocationId>("location_id", &body.location_id)?;
            let item = ledger.resolve_item(&body.stock_id)?;
            let entry = ledger.scrap(item, location, quantity, body.reason)?;
            Ok((entry, ledger.stock(item)?))
        })
        .await;

    match result {
        Ok((entry, stock)) => Json(json!({ "entry": entry, "stock": stock })).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn assemble(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::AssembleRequest>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let quantity = Quantity::positive("quantity", body.quantity)?;
            let target = parse_id::<LocationId>("to_location_id", &body.to_location_id)?;
            let source =
                parse_optional_id::<LocationId>("from_location_id", body.from_location_id.as_deref())?;
            let product = ledger.resolve_item(&body.product_barcode)?;
            let entry = ledger.assemble(AssembleRequest {
                product,
                quantity,
                target,
                source,
                reason: body.reason,
            })?;
            Ok((entry, ledger.stock(product)?))
        })
        .await;

    match result {
        Ok((entry, stock)) => Json(json!({ "entry": entry, "stock": stock })).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Build a list filter. `category` may be an id or a (case-insensitive) name.
fn stock_filter(ledger: &StockLedger, query: &dto::StockQuery) -> LedgerResult<StockFilter> {
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<CategoryId>() {
            Ok(id) => Some(id),
            Err(_) => {
                let by_name: BTreeMap<String, CategoryId> = ledger
                    .categories()?
                    .into_iter()
                    .map(|c| (c.name.to_lowercase(), c.id))
                    .collect();
                let id = by_name
                    .get(&raw.to_lowercase())
                    .copied()
                    .ok_or_else(|| DomainError::UnknownCategory(raw.to_string()))?;
                Some(id)
            }
        },
    };
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<StockStatus>()?),
    };

    Ok(StockFilter {
        category,
        status,
        location: parse_optional_id("location", query.location.as_deref())?,
    })
}
