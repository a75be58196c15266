use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockroom_audit::{ActionKind, AuditFilter, Pagination};

use crate::app::dto::{self, parse_order, parse_timestamp};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(query_logs))
        .route("/replay", get(verify_replay))
}

/// `GET /stock_logs`: filtered, paginated audit entries.
pub async fn query_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::LogQuery>,
) -> axum::response::Response {
    let result = services
        .run(move |ledger| {
            let item = match query.item.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(reference) => Some(ledger.resolve_item(reference)?),
            };
            let action = match query.action.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(raw.parse::<ActionKind>()?),
            };
            let filter = AuditFilter {
                item,
                action,
                barcode: query.barcode.filter(|b| !b.trim().is_empty()),
                from: parse_timestamp("from", query.from.as_deref())?,
                to: parse_timestamp("to", query.to.as_deref())?,
            };
            let order = parse_order(query.order.as_deref())?;
            ledger.audit(&filter, order, Pagination::new(query.limit, query.offset))
        })
        .await;

    match result {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// `GET /stock_logs/replay`: fold the journal and compare with live stock.
pub async fn verify_replay(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.run(|ledger| ledger.verify_replay()).await {
        Ok(report) => {
            if !report.consistent() {
                tracing::error!(entries = report.entries, "journal replay diverges from live stock");
            }
            Json(report).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
