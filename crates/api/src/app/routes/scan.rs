use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};
use serde_json::json;

use stockroom_core::{LocationId, Quantity};

use crate::app::dto::{self, parse_optional_id};
use crate::app::errors;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;

/// `POST /scan`: adjust by barcode.
pub async fn scan(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::ScanRequest>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let amount = Quantity::positive("amount", body.amount)?;
            let location =
                parse_optional_id::<LocationId>("location_id", body.location_id.as_deref())?;
            let entry = ledger.scan(&body.barcode, body.action.signed(amount), location)?;
            let stock = ledger.stock_by_barcode(&body.barcode)?;
            Ok((entry, stock))
        })
        .await;

    match result {
        Ok((entry, stock)) => Json(json!({ "entry": entry, "stock": stock })).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
