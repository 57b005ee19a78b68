use std::sync::Arc;

use depot_infra::{EngineSettings, InMemoryLedgerStore, InventoryEngine, LedgerStore};
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a fresh in-memory store, on an ephemeral port.
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let engine = Arc::new(InventoryEngine::new(store, EngineSettings::default()));
        let app = depot_api::app::build_app(engine);
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

async fn create_product(client: &reqwest::Client, srv: &TestServer, quantity: i64) -> Value {
    let res = client
        .post(srv.url("/products"))
        .json(&json!({
            "name": "Pallet wrap",
            "description": "500mm",
            "price": 10,
            "quantity": quantity,
            "unit": "roll",
            "category": "packaging",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn post_movement(
    client: &reqwest::Client,
    srv: &TestServer,
    product_id: &str,
    kind: &str,
    quantity: i64,
) -> reqwest::Response {
    client
        .post(srv.url("/transactions"))
        .json(&json!({
            "product_id": product_id,
            "type": kind,
            "quantity": quantity,
            "date": "2024-03-10T09:30:00Z",
        }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn product_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_product(&client, &srv, 4).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["quantity"], 4);
    assert_eq!(created["price"], 10);

    let res = client
        .patch(srv.url(&format!("/products/{id}")))
        .json(&json!({ "price": 0, "name": "Stretch wrap" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["price"], 0);
    assert_eq!(updated["name"], "Stretch wrap");
    assert_eq!(updated["quantity"], 4);

    let listed: Value = client
        .get(srv.url("/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let res = client
        .delete(srv.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn empty_patch_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let created = create_product(&client, &srv, 0).await;
    let id = created["id"].as_str().unwrap();

    let res = client
        .patch(srv.url(&format!("/products/{id}")))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn movements_and_statistics() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let created = create_product(&client, &srv, 20).await;
    let id = created["id"].as_str().unwrap();

    let res = post_movement(&client, &srv, id, "in", 3).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let tx: Value = res.json().await.unwrap();
    assert_eq!(tx["kind"], "in");
    assert_eq!(tx["unit_price"], 10);

    let res = post_movement(&client, &srv, id, "out", 2).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    // End day is inclusive at the HTTP boundary.
    let stats: Value = client
        .get(srv.url("/statistics?start_date=2024-03-01&end_date=2024-03-10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["monthly_in"], 3);
    assert_eq!(stats["monthly_value_in"], 30);
    assert_eq!(stats["monthly_out"], 2);
    assert_eq!(stats["monthly_value_out"], 20);
    assert_eq!(stats["total_products"], 1);
    assert_eq!(stats["total_value"], 210);

    let txs: Value = client
        .get(srv.url(&format!(
            "/transactions?start_date=2024-03-10&end_date=2024-03-10&product_id={id}"
        )))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(txs.as_array().unwrap().len(), 2);

    let txs: Value = client
        .get(srv.url("/transactions?start_date=2024-03-11&end_date=2024-03-31"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(txs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn overdraw_is_unprocessable() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let created = create_product(&client, &srv, 5).await;
    let id = created["id"].as_str().unwrap();

    let res = post_movement(&client, &srv, id, "out", 6).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");

    let product: Value = client
        .get(srv.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(product["quantity"], 5);
}

#[tokio::test]
async fn malformed_movements_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let created = create_product(&client, &srv, 5).await;
    let id = created["id"].as_str().unwrap();

    for (kind, qty) in [("IN", 1), ("out", 0), ("in", -3)] {
        let res = post_movement(&client, &srv, id, kind, qty).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{kind} {qty}");
    }

    let res = post_movement(&client, &srv, "not-a-uuid", "in", 1).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(srv.url("/statistics?start_date=2024-03-10"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(srv.url("/statistics?start_date=2024-03-10&end_date=2024-03-01"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    for path in ["/statistics", "/transactions"] {
        let res = client
            .get(srv.url(&format!(
                "{path}?start_date=2024-03-01&end_date=%2B262142-12-31"
            )))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{path}");
    }
}

#[tokio::test]
async fn reconcile_records_the_difference() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let created = create_product(&client, &srv, 8).await;
    let id = created["id"].as_str().unwrap();

    let res = client
        .post(srv.url(&format!("/products/{id}/reconcile")))
        .json(&json!({ "counted_quantity": 11, "description": "cycle count" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["transaction"]["kind"], "in");
    assert_eq!(body["transaction"]["quantity"], 3);

    let res = client
        .post(srv.url(&format!("/products/{id}/reconcile")))
        .json(&json!({ "counted_quantity": 11 }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert!(body["transaction"].is_null());
}
