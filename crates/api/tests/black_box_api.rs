use reqwest::StatusCode;
use serde_json::{json, Value};

use stockroom_api::config::ServerConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = stockroom_api::app::build_app(&ServerConfig::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).json(&body).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(Value::Null))
}

async fn get(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let res = client.get(url).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(Value::Null))
}

async fn create_location(client: &reqwest::Client, server: &TestServer, name: &str) -> String {
    let (status, body) = post(
        client,
        server.url("/locations"),
        json!({ "name": name, "type": "Internal Location" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn create_item(
    client: &reqwest::Client,
    server: &TestServer,
    part_id: &str,
    barcode: Option<&str>,
    placements: &[(&str, i64)],
) -> String {
    let locations: Vec<Value> = placements
        .iter()
        .map(|(location, qty)| json!({ "location_id": location, "quantity": qty }))
        .collect();
    let (status, body) = post(
        client,
        server.url("/stock"),
        json!({
            "partId": part_id,
            "name": format!("Part {part_id}"),
            "barcode": barcode,
            "cost": "1.50",
            "locations": locations,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

fn quantity_at(stock: &Value, location: &str) -> u64 {
    stock["placements"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["location_id"] == location)
        .map(|p| p["quantity"].as_u64().unwrap())
        .unwrap_or(0)
}

#[tokio::test]
async fn health_is_public_and_ok() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn assembly_consumes_components_and_logs_one_entry() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let shelf = create_location(&client, &server, "Shelf").await;
    let a = create_item(&client, &server, "A", None, &[(shelf.as_str(), 10)]).await;
    let b = create_item(&client, &server, "B", None, &[(shelf.as_str(), 10)]).await;
    create_item(&client, &server, "X", Some("X-100"), &[]).await;

    let (status, bom) = post(
        &client,
        server.url("/boms"),
        json!({ "product_barcode": "X-100", "components": { "A": 2, "B": 1 } }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{bom}");
    assert_eq!(bom["components"].as_array().unwrap().len(), 2);

    let (status, cost) = get(&client, server.url("/boms/X-100/cost")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cost["total_cost"], "4.50");

    let (status, body) = post(
        &client,
        server.url("/stock/assemble"),
        json!({ "product_barcode": "X-100", "quantity": 3, "to_location_id": shelf }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["entry"]["action"], "assemble");
    assert_eq!(body["entry"]["details"]["components"], json!({ "A": 6, "B": 3 }));
    assert_eq!(quantity_at(&body["stock"], &shelf), 3);

    let (_, a_stock) = get(&client, server.url(&format!("/stock/{a}"))).await;
    let (_, b_stock) = get(&client, server.url(&format!("/stock/{b}"))).await;
    assert_eq!(quantity_at(&a_stock, &shelf), 4);
    assert_eq!(quantity_at(&b_stock, &shelf), 7);

    let (status, logs) = get(&client, server.url("/stock_logs?action=assemble")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["total"], 1);

    let (_, replay) = get(&client, server.url("/stock_logs/replay")).await;
    assert_eq!(replay["placements_match"], true);
    assert_eq!(replay["scrap_counts_match"], true);
}

#[tokio::test]
async fn errors_map_to_status_and_code() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let bin = create_location(&client, &server, "Bin").await;
    create_item(&client, &server, "R-1", Some("111"), &[(bin.as_str(), 2)]).await;

    let (status, body) = post(
        &client,
        server.url("/stock/adjust"),
        json!({ "partId": "R-1", "amount": 5, "mode": "remove", "location_id": bin }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["available"], 2);

    let (status, body) = post(
        &client,
        server.url("/stock/adjust"),
        json!({ "partId": "R-1", "amount": 0, "mode": "add", "location_id": bin }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_quantity");
    assert_eq!(body["field"], "amount");

    let (status, body) = get(&client, server.url("/stock/NOPE")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "unknown_item");

    let (status, body) = post(
        &client,
        server.url("/stock/assemble"),
        json!({ "product_barcode": "111", "quantity": 1, "to_location_id": bin }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no_bom");

    let res = client.delete(server.url(&format!("/locations/{bin}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Rejected mutations leave the journal untouched.
    let (_, logs) = get(&client, server.url("/stock_logs")).await;
    assert_eq!(logs["total"], 1);
    assert_eq!(logs["entries"][0]["action"], "item_create");
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let bin = create_location(&client, &server, "Bin").await;
    create_item(&client, &server, "R-1", None, &[(bin.as_str(), 2)]).await;

    let (status, body) = post(
        &client,
        server.url("/stock/adjust"),
        json!({ "partId": "R-1", "amount": 2.5, "mode": "add", "location_id": bin }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_quantity");
    assert_eq!(body["field"], "amount");

    let (status, body) = post(
        &client,
        server.url("/stock/adjust"),
        json!({ "partId": "R-1", "amount": 1, "mode": "sideways", "location_id": bin }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["field"], "mode");

    let res = client
        .post(server.url("/stock/adjust"))
        .header("content-type", "application/json")
        .body(r#"{"partId": "R-1","#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["field"], "body");

    let (_, logs) = get(&client, server.url("/stock_logs")).await;
    assert_eq!(logs["total"], 1);
}

#[tokio::test]
async fn transfer_scrap_and_scan_update_placements() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let front = create_location(&client, &server, "Front").await;
    let back = create_location(&client, &server, "Back").await;
    let id = create_item(&client, &server, "C-7", Some("777"), &[(front.as_str(), 10)]).await;

    let (status, body) = post(
        &client,
        server.url("/stock/transfer"),
        json!({ "stock_id": id, "location_id": front, "to_location_id": back, "quantity": 4, "reason": "restock" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(quantity_at(&body["stock"], &front), 6);
    assert_eq!(quantity_at(&body["stock"], &back), 4);
    assert_eq!(body["stock"]["total"], 10);

    let (status, body) = post(
        &client,
        server.url("/stock/scrap"),
        json!({ "stock_id": id, "location_id": back, "quantity": 1, "reason": "damaged" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["stock"]["scrap_count"], 1);

    // Held at two locations, so the scanner must name one.
    let (status, body) = post(&client, server.url("/scan"), json!({ "barcode": "777", "action": "add" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "location_id");

    let (status, body) = post(
        &client,
        server.url("/scan"),
        json!({ "barcode": "777", "action": "remove", "amount": 2, "location_id": front }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(quantity_at(&body["stock"], &front), 4);

    let (_, by_barcode) = get(&client, server.url("/stock/barcode/777")).await;
    assert_eq!(by_barcode["total"], 7);

    let (_, logs) = get(&client, server.url(&format!("/stock_logs?item={id}&order=desc&limit=2"))).await;
    assert_eq!(logs["total"], 4);
    assert_eq!(logs["has_more"], true);
    assert_eq!(logs["entries"][0]["action"], "remove");
    assert_eq!(logs["entries"][1]["action"], "scrap");
}

#[tokio::test]
async fn concurrent_adjustments_both_land() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let bin = create_location(&client, &server, "Bin").await;
    let id = create_item(&client, &server, "K-1", None, &[(bin.as_str(), 10)]).await;

    let add = post(
        &client,
        server.url("/stock/adjust"),
        json!({ "partId": id, "amount": 5, "mode": "add", "location_id": bin }),
    );
    let remove = post(
        &client,
        server.url("/stock/adjust"),
        json!({ "partId": id, "amount": 3, "mode": "remove", "location_id": bin }),
    );
    let ((s1, _), (s2, _)) = tokio::join!(add, remove);
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);

    let (_, stock) = get(&client, server.url(&format!("/stock/{id}"))).await;
    assert_eq!(quantity_at(&stock, &bin), 12);
}

#[tokio::test]
async fn stock_list_filters_by_status_and_location() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let bin = create_location(&client, &server, "Bin").await;
    let other = create_location(&client, &server, "Other").await;
    create_item(&client, &server, "FULL", None, &[(bin.as_str(), 50)]).await;
    create_item(&client, &server, "LOW", None, &[(other.as_str(), 2)]).await;
    create_item(&client, &server, "NONE", None, &[(bin.as_str(), 0)]).await;

    let (_, low) = get(&client, server.url("/stock?status=low_stock")).await;
    let low = low.as_array().unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0]["part_id"], "LOW");

    let (_, at_bin) = get(&client, server.url(&format!("/stock?location={bin}"))).await;
    assert_eq!(at_bin.as_array().unwrap().len(), 1);

    let (status, body) = get(&client, server.url("/stock?status=sideways")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "status");
}
