use axum::{routing::post, Router};

pub mod boms;
pub mod categories;
pub mod locations;
pub mod logs;
pub mod scan;
pub mod stock;
pub mod system;

/// Router for all ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/scan", post(scan::scan))
        .nest("/stock", stock::router())
        .nest("/boms", boms::router())
        .nest("/stock_logs", logs::router())
        .nest("/locations", locations::router())
        .nest("/categories", categories::router())
}
